use num_complex::Complex;
use thiserror::Error;

use crate::utils::wrap_phase;

pub type C64 = Complex<f64>;

/// Sentinel written into channels whose calibration geometry is too close
/// to singular to yield a trustworthy value.
pub(crate) fn degenerate_value() -> C64 {
    Complex::new(f64::NAN, f64::NAN)
}

#[derive(Debug, Error)]
pub enum DsbsError {
    /// Fewer calibration/science states than the solve requires.
    #[error("at least 2 phase-switch states are required, got {0}")]
    InsufficientStates(usize),

    /// Spectra that must be used together disagree in channel count.
    #[error("channel count mismatch: expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Every channel came out degenerate, nothing usable to return.
    #[error("all {0} channels are degenerate, nothing to separate")]
    AllChannelsDegenerate(usize),
}

/// One combined DSB spectrum: the complex correlator output of the two IF
/// signal paths, one value per frequency channel, taken at a single
/// phase-switch state.
#[derive(Clone, Debug)]
pub struct Spectrum {
    /// Complex value per channel.
    pub values: Vec<C64>,
    /// Phase-switch state in radians, wrapped to [0, 2π).
    pub phase_state: f64,
    /// Measurement time in seconds. Metadata only, the solvers never read it.
    pub timestamp: f64,
    /// Per-channel noise variance of `values`, when known.
    pub variance: Option<Vec<f64>>,
}

impl Spectrum {
    pub fn new(values: Vec<C64>, phase_state_rad: f64) -> Self {
        Self {
            values,
            phase_state: wrap_phase(phase_state_rad),
            timestamp: 0.0,
            variance: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_variance(mut self, variance: Vec<f64>) -> Self {
        self.variance = Some(variance);
        self
    }

    pub fn channels(&self) -> usize {
        self.values.len()
    }
}

/// A finite collection of spectra from one calibration or science cycle,
/// each tagged with its phase-switch state.
#[derive(Clone, Debug, Default)]
pub struct ObservationSet {
    pub spectra: Vec<Spectrum>,
}

impl ObservationSet {
    pub fn new(spectra: Vec<Spectrum>) -> Self {
        Self { spectra }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Common channel count of the member spectra. Fails when any member
    /// (or its variance vector) disagrees with the first.
    pub fn channels(&self) -> Result<usize, DsbsError> {
        let expected = match self.spectra.first() {
            Some(spectrum) => spectrum.channels(),
            None => return Ok(0),
        };
        for spectrum in &self.spectra {
            if spectrum.channels() != expected {
                return Err(DsbsError::ChannelMismatch {
                    expected,
                    actual: spectrum.channels(),
                });
            }
            if let Some(variance) = &spectrum.variance {
                if variance.len() != expected {
                    return Err(DsbsError::ChannelMismatch {
                        expected,
                        actual: variance.len(),
                    });
                }
            }
        }
        Ok(expected)
    }
}

/// Per-channel complex gains of the two sideband responses, estimated from
/// one calibration cycle. Immutable once computed; superseded at the next
/// cycle. Degenerate channels carry NaN in both paths.
#[derive(Clone, Debug)]
pub struct GainCorrection {
    /// Complex gain of the USB signal path per channel.
    pub usb_path: Vec<C64>,
    /// Complex gain of the LSB signal path per channel.
    pub lsb_path: Vec<C64>,
    /// Normalized Gram determinant of each channel's calibration fit,
    /// in [0, 1]. Equals sin²(φ₁−φ₂) for a two-state calibration.
    pub conditioning: Vec<f64>,
    /// Threshold the conditioning was flagged against.
    pub degeneracy_threshold: f64,
}

impl GainCorrection {
    pub fn channels(&self) -> usize {
        self.usb_path.len()
    }

    pub fn is_degenerate(&self, chan: usize) -> bool {
        !self.usb_path[chan].is_finite() || !self.lsb_path[chan].is_finite()
    }

    pub fn degenerate_channels(&self) -> usize {
        (0..self.channels()).filter(|&k| self.is_degenerate(k)).count()
    }

    /// Reduced single-ratio form of the correction, g = lsb_path / usb_path.
    /// None for degenerate channels.
    pub fn ratio(&self, chan: usize) -> Option<C64> {
        if self.is_degenerate(chan) {
            return None;
        }
        let g = self.lsb_path[chan] / self.usb_path[chan];
        g.is_finite().then_some(g)
    }
}

/// Separated USB/LSB spectra with linearly propagated per-channel variance.
/// Degenerate channels hold NaN values, infinite variance, and a set flag.
#[derive(Clone, Debug)]
pub struct SeparatedSpectrumPair {
    pub usb: Vec<C64>,
    pub lsb: Vec<C64>,
    pub usb_variance: Vec<f64>,
    pub lsb_variance: Vec<f64>,
    pub degenerate: Vec<bool>,
}

impl SeparatedSpectrumPair {
    pub fn channels(&self) -> usize {
        self.usb.len()
    }

    pub fn usable_channels(&self) -> usize {
        self.degenerate.iter().filter(|&&flag| !flag).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn flat(value: C64, channels: usize, state: f64) -> Spectrum {
        Spectrum::new(vec![value; channels], state)
    }

    #[test]
    fn spectrum_wraps_phase_state_on_construction() {
        let spectrum = flat(Complex::new(1.0, 0.0), 4, 2.0 * PI + 0.5);
        assert!((spectrum.phase_state - 0.5).abs() < 1e-12);
        let spectrum = flat(Complex::new(1.0, 0.0), 4, -PI / 2.0);
        assert!((spectrum.phase_state - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn observation_set_rejects_uneven_channel_counts() {
        let set = ObservationSet::new(vec![
            flat(Complex::new(1.0, 0.0), 4, 0.0),
            flat(Complex::new(1.0, 0.0), 5, 1.0),
        ]);
        match set.channels() {
            Err(DsbsError::ChannelMismatch { expected: 4, actual: 5 }) => {}
            other => panic!("expected ChannelMismatch, got {other:?}"),
        }
    }

    #[test]
    fn observation_set_rejects_short_variance_vector() {
        let bad = flat(Complex::new(1.0, 0.0), 4, 1.0).with_variance(vec![0.1; 3]);
        let set = ObservationSet::new(vec![flat(Complex::new(1.0, 0.0), 4, 0.0), bad]);
        assert!(matches!(
            set.channels(),
            Err(DsbsError::ChannelMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn ratio_is_none_for_degenerate_channel() {
        let correction = GainCorrection {
            usb_path: vec![Complex::new(1.0, 0.0), degenerate_value()],
            lsb_path: vec![Complex::new(0.0, 2.0), degenerate_value()],
            conditioning: vec![1.0, 0.0],
            degeneracy_threshold: 1e-4,
        };
        let g = correction.ratio(0).unwrap();
        assert!((g - Complex::new(0.0, 2.0)).norm() < 1e-12);
        assert!(correction.ratio(1).is_none());
        assert_eq!(correction.degenerate_channels(), 1);
    }
}
