//! Sideband separation of a science measurement using an estimated
//! `GainCorrection`.
//!
//! A science measurement is the combined DSB observation of one cycle: a
//! small set of spectra taken at the cycle's phase-switch states. Per
//! channel the measurements obey
//!
//! ```text
//! d(φ_j) = c·e^{+iφ_j}·U + b·e^{−iφ_j}·L
//! ```
//!
//! and the separator solves for (U, L) with the calibrated (c, b). Spectra
//! sharing a state are combined by the least-squares solve itself; with
//! exactly two distinct states the solve is direct 2×2 inversion. Channels
//! are independent and processed in input order.

use num_complex::Complex;
use rayon::prelude::*;

use crate::dsbs::{
    degenerate_value, DsbsError, GainCorrection, ObservationSet, SeparatedSpectrumPair, C64,
};
use crate::utils::{gram_conditioning, wrap_phase, PARALLEL_CHANNEL_THRESHOLD};

struct ChannelSeparation {
    usb: C64,
    lsb: C64,
    usb_variance: f64,
    lsb_variance: f64,
    degenerate: bool,
}

impl ChannelSeparation {
    fn degenerate() -> Self {
        Self {
            usb: degenerate_value(),
            lsb: degenerate_value(),
            usb_variance: f64::INFINITY,
            lsb_variance: f64::INFINITY,
            degenerate: true,
        }
    }
}

/// Separate a combined science measurement into its USB and LSB components.
///
/// Fails with `ChannelMismatch` when the science spectra and the correction
/// disagree in channel count, with `InsufficientStates` for fewer than two
/// science spectra, and with `AllChannelsDegenerate` when no channel yields
/// a usable result. Individual degenerate channels propagate the NaN
/// sentinel with infinite variance; no default gain is ever substituted.
pub fn separate_sidebands(
    science: &ObservationSet,
    correction: &GainCorrection,
) -> Result<SeparatedSpectrumPair, DsbsError> {
    if science.len() < 2 {
        return Err(DsbsError::InsufficientStates(science.len()));
    }
    let channels = science.channels()?;
    if channels != correction.channels() {
        return Err(DsbsError::ChannelMismatch {
            expected: correction.channels(),
            actual: channels,
        });
    }

    let phases: Vec<f64> = science
        .spectra
        .iter()
        .map(|spectrum| wrap_phase(spectrum.phase_state))
        .collect();

    let solved: Vec<ChannelSeparation> = if channels >= PARALLEL_CHANNEL_THRESHOLD {
        (0..channels)
            .into_par_iter()
            .map(|chan| separate_channel(science, &phases, correction, chan))
            .collect()
    } else {
        (0..channels)
            .map(|chan| separate_channel(science, &phases, correction, chan))
            .collect()
    };

    let mut pair = SeparatedSpectrumPair {
        usb: Vec::with_capacity(channels),
        lsb: Vec::with_capacity(channels),
        usb_variance: Vec::with_capacity(channels),
        lsb_variance: Vec::with_capacity(channels),
        degenerate: Vec::with_capacity(channels),
    };
    let mut degenerate = 0usize;
    for chan in solved {
        if chan.degenerate {
            degenerate += 1;
        }
        pair.usb.push(chan.usb);
        pair.lsb.push(chan.lsb);
        pair.usb_variance.push(chan.usb_variance);
        pair.lsb_variance.push(chan.lsb_variance);
        pair.degenerate.push(chan.degenerate);
    }

    if degenerate == channels {
        return Err(DsbsError::AllChannelsDegenerate(channels));
    }
    if degenerate > 0 {
        log::warn!("separation left {degenerate} of {channels} channels degenerate");
    }
    Ok(pair)
}

/// Solve one channel and propagate the measurement variance through the
/// pseudo-inverse rows (output variance is input variance scaled by the
/// squared magnitudes of the inverse-mapping coefficients).
fn separate_channel(
    science: &ObservationSet,
    phases: &[f64],
    correction: &GainCorrection,
    chan: usize,
) -> ChannelSeparation {
    if correction.is_degenerate(chan) {
        return ChannelSeparation::degenerate();
    }
    let c = correction.usb_path[chan];
    let b = correction.lsb_path[chan];

    // Normal equations BᴴB·x = Bᴴd with rows B_j = [c·e^{+iφ_j}, b·e^{−iφ_j}].
    let zero = Complex::new(0.0, 0.0);
    let mut count = 0.0f64;
    let mut t = zero; // Σ e^{+2iφ} over finite measurements
    let mut r1 = zero;
    let mut r2 = zero;
    for (spectrum, &phi) in science.spectra.iter().zip(phases) {
        let d = spectrum.values[chan];
        if !d.is_finite() {
            continue;
        }
        let w = Complex::from_polar(1.0, phi);
        count += 1.0;
        t += w * w;
        r1 += (c * w).conj() * d;
        r2 += (b * w.conj()).conj() * d;
    }
    if count < 2.0 {
        return ChannelSeparation::degenerate();
    }

    let norm1 = c.norm_sqr() * count;
    let norm2 = b.norm_sqr() * count;
    let m = c.conj() * b * t.conj(); // (BᴴB)₁₂
    if gram_conditioning(norm1, norm2, m) < correction.degeneracy_threshold {
        return ChannelSeparation::degenerate();
    }

    // Explicit inverse of the 2×2 Gram matrix, reused for the variance sweep.
    let det = norm1 * norm2 - m.norm_sqr();
    let inv11 = norm2 / det;
    let inv12 = -m / det;
    let inv21 = -m.conj() / det;
    let inv22 = norm1 / det;

    let usb = r1 * inv11 + inv12 * r2;
    let lsb = inv21 * r1 + r2 * inv22;

    let mut usb_variance = 0.0;
    let mut lsb_variance = 0.0;
    for (spectrum, &phi) in science.spectra.iter().zip(phases) {
        let d = spectrum.values[chan];
        if !d.is_finite() {
            continue;
        }
        let sigma2 = spectrum
            .variance
            .as_ref()
            .map(|variance| variance[chan])
            .unwrap_or(0.0);
        if sigma2 == 0.0 {
            continue;
        }
        let w = Complex::from_polar(1.0, phi);
        let col1 = (c * w).conj();
        let col2 = (b * w.conj()).conj();
        let p1 = inv11 * col1 + inv12 * col2;
        let p2 = inv21 * col1 + inv22 * col2;
        usb_variance += p1.norm_sqr() * sigma2;
        lsb_variance += p2.norm_sqr() * sigma2;
    }

    ChannelSeparation {
        usb,
        lsb,
        usb_variance,
        lsb_variance,
        degenerate: false,
    }
}
