pub mod algorithm;
pub mod config;

pub use algorithm::{calculate_lag, check_inputs, correlate};
pub use config::{MarkerConfig, MatchMode};
