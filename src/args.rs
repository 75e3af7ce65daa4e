use clap::Parser;

use drs4_dsbs::gain::DEFAULT_DEGENERACY_THRESHOLD;
use drs4_dsbs::utils::DynError;

pub const DEFAULT_CAL_STATES_DEG: &str = "0,90";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Synthetic end-to-end demo of DRS4 digital sideband separation",
    long_about = None,
    after_help = "Examples:\n  drs4-dsbs --channels 1024 --gain-amp 1.05 --gain-phase 12\n  drs4-dsbs --cal-states 0,60,120 --gain-slope 0.02\n  drs4-dsbs --cal-states 0,0.1 --threshold 1e-2\n"
)]
pub struct Args {
    /// Number of frequency channels in the synthetic spectra
    #[arg(long, default_value_t = 512)]
    pub channels: usize,

    /// Calibration phase-switch states (degrees, comma separated)
    #[arg(long, default_value = DEFAULT_CAL_STATES_DEG)]
    pub cal_states: String,

    /// Amplitude of the injected LSB-path gain error
    #[arg(long, default_value_t = 1.05)]
    pub gain_amp: f64,

    /// Phase of the injected LSB-path gain error at channel 0 (degrees)
    #[arg(long, allow_hyphen_values = true, default_value_t = 15.0)]
    pub gain_phase: f64,

    /// Per-channel phase slope of the gain error (degrees/channel),
    /// mimicking a residual delay between the two IF paths
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.05)]
    pub gain_slope: f64,

    /// Conditioning threshold below which a channel is flagged degenerate
    #[arg(long, default_value_t = DEFAULT_DEGENERACY_THRESHOLD)]
    pub threshold: f64,

    /// Noise variance attached to the synthetic science spectra
    #[arg(long, default_value_t = 1e-4)]
    pub noise_variance: f64,
}

pub fn parse_states_deg(csv: &str) -> Result<Vec<f64>, DynError> {
    let states: Result<Vec<f64>, _> = csv
        .split(',')
        .map(|token| token.trim().parse::<f64>())
        .collect();
    let states = states.map_err(|e| format!("Invalid --cal-states value '{csv}': {e}"))?;
    if states.len() < 2 {
        return Err("--cal-states needs at least two comma-separated states".into());
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::parse_states_deg;

    #[test]
    fn parse_states_accepts_spaces_and_negatives() {
        let states = parse_states_deg("0, 90, -45").unwrap();
        assert_eq!(states, vec![0.0, 90.0, -45.0]);
    }

    #[test]
    fn parse_states_rejects_single_state_and_garbage() {
        assert!(parse_states_deg("0").is_err());
        assert!(parse_states_deg("0,abc").is_err());
    }
}
