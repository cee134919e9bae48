//! Runtime configuration: serial ports from the environment, timing from [`Timing`].

use std::env;

use crate::policy::{BoundedRetry, PeriodicRetry};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    NotANumber { name: &'static str, value: String },
}

/// Interval and retry budget of the control loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Minimum gap between detection lines while connected.
    pub report_interval_ms: u32,
    /// Minimum gap between disconnection notices.
    pub disconnected_notice_ms: u32,
    pub config_retry: PeriodicRetry,
    pub engineering_retry: BoundedRetry,
    /// Pause before the first engineering-mode attempt.
    pub engineering_settle_ms: u32,
    /// Pause between a successful configuration read and its report.
    pub config_settle_ms: u32,
    /// Safety bound on frames decoded per cycle.
    pub max_polls_per_cycle: u32,
    /// Idle time between cycles of the host loop.
    pub cycle_pause_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            report_interval_ms: 500,
            disconnected_notice_ms: 5_000,
            config_retry: PeriodicRetry { interval_ms: 30_000 },
            engineering_retry: BoundedRetry { attempts: 3, delay_ms: 1_000 },
            engineering_settle_ms: 1_000,
            config_settle_ms: 500,
            max_polls_per_cycle: 10,
            cycle_pause_ms: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// `RADAR_PORT`
    pub radar_port: String,
    /// `RADAR_BAUD`
    pub radar_baud: u32,
    /// `MONITOR_PORT`; status goes to stdout when unset.
    pub monitor_port: Option<String>,
    /// `MONITOR_BAUD`
    pub monitor_baud: u32,
    pub timing: Timing,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            radar_port: "/dev/ttyUSB0".to_string(),
            radar_baud: 256_000,
            monitor_port: None,
            monitor_baud: 115_200,
            timing: Timing::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any name -> value lookup; unset names keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(port) = lookup("RADAR_PORT") {
            config.radar_port = port;
        }
        if let Some(baud) = lookup("RADAR_BAUD") {
            config.radar_baud = parse_number("RADAR_BAUD", baud)?;
        }
        config.monitor_port = lookup("MONITOR_PORT").filter(|port| !port.is_empty());
        if let Some(baud) = lookup("MONITOR_BAUD") {
            config.monitor_baud = parse_number("MONITOR_BAUD", baud)?;
        }
        Ok(config)
    }
}

fn parse_number(name: &'static str, value: String) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::NotANumber { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = MonitorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.timing.engineering_retry.attempts, 3);
        assert_eq!(config.timing.config_retry.interval_ms, 30_000);
    }

    #[test]
    fn reads_ports_and_bauds() {
        let config = MonitorConfig::from_lookup(lookup(&[
            ("RADAR_PORT", "/dev/serial0"),
            ("RADAR_BAUD", " 115200 "),
            ("MONITOR_PORT", "/dev/ttyACM0"),
        ]))
        .unwrap();
        assert_eq!(config.radar_port, "/dev/serial0");
        assert_eq!(config.radar_baud, 115_200);
        assert_eq!(config.monitor_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.monitor_baud, 115_200);
    }

    #[test]
    fn rejects_bad_baud() {
        let err = MonitorConfig::from_lookup(lookup(&[("RADAR_BAUD", "fast")])).unwrap_err();
        assert!(matches!(err, ConfigError::NotANumber { name: "RADAR_BAUD", .. }));
    }

    #[test]
    fn bad_environment_surfaces_as_monitor_error() {
        let err: crate::MonitorError = MonitorConfig::from_lookup(lookup(&[("MONITOR_BAUD", "")]))
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            crate::MonitorError::Config(ConfigError::NotANumber { name: "MONITOR_BAUD", .. })
        ));
    }
}
