mod args;

use clap::Parser;
use num_complex::Complex;

use args::{parse_states_deg, Args};
use drs4_dsbs::dsbs::{GainCorrection, ObservationSet, Spectrum, C64};
use drs4_dsbs::gain::estimate_gain;
use drs4_dsbs::separate::separate_sidebands;
use drs4_dsbs::utils::{fit_line, safe_arg, unwrap_phase, DynError};

/// Injected LSB-path gain error: amplitude plus a per-channel phase ramp,
/// the signature of a residual delay between the two IF paths.
fn injected_gain(args: &Args, chan: usize) -> C64 {
    let phase = (args.gain_phase + args.gain_slope * chan as f64).to_radians();
    Complex::from_polar(args.gain_amp, phase)
}

/// Combined DSB observation of (usb, lsb) through the injected gain at one
/// switch state.
fn combined_spectrum(args: &Args, usb: &[C64], lsb: &[C64], phi: f64) -> Spectrum {
    let w = Complex::from_polar(1.0, phi);
    let values = (0..args.channels)
        .map(|k| w * usb[k] + injected_gain(args, k) * w.conj() * lsb[k])
        .collect();
    Spectrum::new(values, phi)
}

fn gaussian_line(channels: usize, center: f64, width: f64, amplitude: f64) -> Vec<C64> {
    (0..channels)
        .map(|k| {
            let x = (k as f64 - center) / width;
            Complex::new(amplitude * (-x * x).exp(), 0.0)
        })
        .collect()
}

fn report_correction(args: &Args, correction: &GainCorrection) {
    let channels = correction.channels();
    let degenerate = correction.degenerate_channels();
    println!("[estimate] {} channels, {} degenerate", channels, degenerate);

    let ratios: Vec<C64> = (0..channels)
        .filter_map(|k| correction.ratio(k))
        .collect();
    if ratios.is_empty() {
        println!("[estimate] no usable channel, skipping gain summary");
        return;
    }
    let mean_amp = ratios.iter().map(|g| g.norm()).sum::<f64>() / ratios.len() as f64;
    println!(
        "[estimate] mean |g| = {:.6} (injected {:.6})",
        mean_amp, args.gain_amp
    );

    // Fit the unwrapped ratio phase against channel index, the same way a
    // residual delay is read off a cross-spectrum phase slope.
    let phases: Vec<f64> = ratios.iter().map(safe_arg).collect();
    let unwrapped = unwrap_phase(&phases);
    let chans: Vec<f64> = (0..unwrapped.len()).map(|k| k as f64).collect();
    if let Some((slope, intercept)) = fit_line(&chans, &unwrapped) {
        println!(
            "[estimate] gain phase slope {:+.5} deg/chan (injected {:+.5}), phase at chan 0 {:+.3} deg",
            slope.to_degrees(),
            args.gain_slope,
            intercept.to_degrees()
        );
    }
}

fn run(args: &Args) -> Result<(), DynError> {
    let states_rad: Vec<f64> = parse_states_deg(&args.cal_states)?
        .iter()
        .map(|deg| deg.to_radians())
        .collect();
    println!(
        "[setup] {} channels, cal states [{}] deg, injected gain {:.3} * exp(i*{:.1} deg)",
        args.channels, args.cal_states, args.gain_amp, args.gain_phase
    );

    // Calibration cycle: balanced reference in both sidebands.
    let reference = vec![Complex::new(1.0, 0.0); args.channels];
    let cal = ObservationSet::new(
        states_rad
            .iter()
            .map(|&phi| combined_spectrum(args, &reference, &reference, phi))
            .collect(),
    );
    let correction = estimate_gain(&cal, args.threshold)?;
    report_correction(args, &correction);

    // Science cycle: one spectral line per sideband.
    let channels = args.channels;
    let width = (channels as f64 / 40.0).max(1.0);
    let usb_truth = gaussian_line(channels, channels as f64 / 3.0, width, 1.0);
    let lsb_truth = gaussian_line(channels, 2.0 * channels as f64 / 3.0, width, 0.6);
    let science = ObservationSet::new(
        states_rad
            .iter()
            .map(|&phi| {
                combined_spectrum(args, &usb_truth, &lsb_truth, phi)
                    .with_variance(vec![args.noise_variance; channels])
            })
            .collect(),
    );
    let pair = separate_sidebands(&science, &correction)?;

    let mut max_usb_residual = 0.0f64;
    let mut max_lsb_residual = 0.0f64;
    for chan in 0..channels {
        if pair.degenerate[chan] {
            continue;
        }
        max_usb_residual = max_usb_residual.max((pair.usb[chan] - usb_truth[chan]).norm());
        max_lsb_residual = max_lsb_residual.max((pair.lsb[chan] - lsb_truth[chan]).norm());
    }
    let usable = pair.usable_channels();
    let mean_variance = if usable > 0 {
        pair.usb_variance
            .iter()
            .zip(&pair.degenerate)
            .filter(|(_, &flag)| !flag)
            .map(|(&v, _)| v)
            .sum::<f64>()
            / usable as f64
    } else {
        f64::INFINITY
    };
    println!("[separate] {} of {} channels usable", usable, channels);
    println!(
        "[separate] max residual USB {:.3e}, LSB {:.3e}",
        max_usb_residual, max_lsb_residual
    );
    println!(
        "[separate] mean propagated USB variance {:.3e} (input {:.3e})",
        mean_variance, args.noise_variance
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
