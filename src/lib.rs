//! Digital sideband separation for DRS4-class 2SB receivers.
//!
//! A dual-sideband (DSB) measurement combines the upper and lower sideband
//! through the two IF signal paths of the receiver. Per frequency channel,
//! an observation taken at phase-switch state φ measures
//!
//! ```text
//! d(φ) = c·e^{+iφ}·U + b·e^{−iφ}·L
//! ```
//!
//! where `U`/`L` are the true USB/LSB components and `c`/`b` are the
//! frequency-dependent complex gains of the two sideband responses
//! (ideal: both 1). [`estimate_gain`] fits `(c, b)` per channel from a
//! calibration cycle observing a balanced reference source;
//! [`separate_sidebands`] inverts the mapping for a science measurement and
//! propagates its noise variance. Channels whose calibration geometry is
//! too close to singular carry a NaN sentinel instead of an unstable value,
//! so one bad channel never invalidates the spectrum.
//!
//! ```rust
//! use num_complex::Complex;
//! use drs4_dsbs::{estimate_gain, separate_sidebands, ObservationSet, Spectrum};
//!
//! let states = [0.0_f64, std::f64::consts::FRAC_PI_2];
//! let gain = Complex::new(1.05, 0.1); // LSB-path gain error
//!
//! // Calibration: balanced reference observed at both switch states.
//! let cal = ObservationSet::new(
//!     states
//!         .iter()
//!         .map(|&phi| {
//!             let w = Complex::from_polar(1.0, phi);
//!             Spectrum::new(vec![w + gain * w.conj(); 8], phi)
//!         })
//!         .collect(),
//! );
//! let correction = estimate_gain(&cal, 1e-4).unwrap();
//!
//! // Science: a CW tone in the USB of channel 3, nothing in the LSB.
//! let science = ObservationSet::new(
//!     states
//!         .iter()
//!         .map(|&phi| {
//!             let w = Complex::from_polar(1.0, phi);
//!             let values = (0..8)
//!                 .map(|k| if k == 3 { w } else { Complex::new(0.0, 0.0) })
//!                 .collect();
//!             Spectrum::new(values, phi)
//!         })
//!         .collect(),
//! );
//! let pair = separate_sidebands(&science, &correction).unwrap();
//! assert!((pair.usb[3] - Complex::new(1.0, 0.0)).norm() < 1e-10);
//! assert!(pair.lsb[3].norm() < 1e-10);
//! ```

pub mod dsbs;
pub mod gain;
pub mod separate;
pub mod utils;

pub use dsbs::{
    C64, DsbsError, GainCorrection, ObservationSet, SeparatedSpectrumPair, Spectrum,
};
pub use gain::{estimate_gain, DEFAULT_DEGENERACY_THRESHOLD};
pub use separate::separate_sidebands;
