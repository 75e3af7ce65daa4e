//! Per-channel complex-gain estimation from a calibration cycle.
//!
//! The calibration source injects a balanced, unit-normalized reference into
//! both sidebands, so an observation at phase-switch state φ measures, per
//! channel,
//!
//! ```text
//! d(φ) = c·e^{+iφ} + b·e^{−iφ}
//! ```
//!
//! with `c` and `b` the complex gains of the USB and LSB signal paths.
//! Each channel is fitted independently by least squares over the N
//! observations; for N = 2 the normal equations reduce exactly to direct
//! inversion of the 2×2 system.

use num_complex::Complex;
use rayon::prelude::*;

use crate::dsbs::{degenerate_value, DsbsError, GainCorrection, ObservationSet, C64};
use crate::utils::{
    gram_conditioning, solve_hermitian2, wrap_phase, PARALLEL_CHANNEL_THRESHOLD,
};

/// Conditioning value below which a channel is flagged degenerate when the
/// caller has no better threshold. Equals sin²Δφ ≈ (0.01 rad)² for a
/// two-state calibration.
pub const DEFAULT_DEGENERACY_THRESHOLD: f64 = 1e-4;

struct ChannelFit {
    usb: C64,
    lsb: C64,
    conditioning: f64,
}

impl ChannelFit {
    fn degenerate(conditioning: f64) -> Self {
        Self {
            usb: degenerate_value(),
            lsb: degenerate_value(),
            conditioning,
        }
    }
}

/// Estimate the per-channel sideband-path gains from one calibration cycle.
///
/// Fails with `InsufficientStates` for fewer than two observations and with
/// `ChannelMismatch` when the member spectra disagree in channel count.
/// Channels whose calibration geometry falls below `degeneracy_threshold`
/// (states too close in phase, or too few finite measurements) are flagged
/// with the NaN sentinel instead of aborting the whole fit.
pub fn estimate_gain(
    observations: &ObservationSet,
    degeneracy_threshold: f64,
) -> Result<GainCorrection, DsbsError> {
    if observations.len() < 2 {
        return Err(DsbsError::InsufficientStates(observations.len()));
    }
    let channels = observations.channels()?;

    // The switch states are shared by every channel of the cycle.
    let phases: Vec<f64> = observations
        .spectra
        .iter()
        .map(|spectrum| wrap_phase(spectrum.phase_state))
        .collect();

    let fits: Vec<ChannelFit> = if channels >= PARALLEL_CHANNEL_THRESHOLD {
        (0..channels)
            .into_par_iter()
            .map(|chan| fit_channel(observations, &phases, chan, degeneracy_threshold))
            .collect()
    } else {
        (0..channels)
            .map(|chan| fit_channel(observations, &phases, chan, degeneracy_threshold))
            .collect()
    };

    let mut usb_path = Vec::with_capacity(channels);
    let mut lsb_path = Vec::with_capacity(channels);
    let mut conditioning = Vec::with_capacity(channels);
    let mut degenerate = 0usize;
    for fit in fits {
        if !fit.usb.is_finite() {
            degenerate += 1;
        }
        usb_path.push(fit.usb);
        lsb_path.push(fit.lsb);
        conditioning.push(fit.conditioning);
    }
    if degenerate > 0 {
        log::warn!("gain estimation flagged {degenerate} of {channels} channels degenerate");
    }

    Ok(GainCorrection {
        usb_path,
        lsb_path,
        conditioning,
        degeneracy_threshold,
    })
}

/// Least-squares fit of (c, b) for one channel via the 2×2 complex normal
/// equations. Non-finite measurements are excluded; the fit needs at least
/// two finite values to be solvable.
fn fit_channel(
    observations: &ObservationSet,
    phases: &[f64],
    chan: usize,
    degeneracy_threshold: f64,
) -> ChannelFit {
    let zero = Complex::new(0.0, 0.0);
    let mut count = 0.0f64;
    let mut s = zero; // Σ e^{+2iφ}; (AᴴA)₁₂ = conj(s)
    let mut r1 = zero; // Σ e^{−iφ}·d
    let mut r2 = zero; // Σ e^{+iφ}·d
    for (spectrum, &phi) in observations.spectra.iter().zip(phases) {
        let d = spectrum.values[chan];
        if !d.is_finite() {
            continue;
        }
        let w = Complex::from_polar(1.0, phi);
        count += 1.0;
        s += w * w;
        r1 += w.conj() * d;
        r2 += w * d;
    }
    if count < 2.0 {
        return ChannelFit::degenerate(0.0);
    }

    let conditioning = gram_conditioning(count, count, s.conj());
    if conditioning < degeneracy_threshold {
        return ChannelFit::degenerate(conditioning);
    }

    let (usb, lsb) = solve_hermitian2(count, count, s.conj(), r1, r2);
    ChannelFit {
        usb,
        lsb,
        conditioning,
    }
}
