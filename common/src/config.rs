use std::{io::ErrorKind, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::PidGains};

/// Widest temperature the two-digit wire encoding can carry.
pub const WIRE_TEMP_LIMIT: i32 = 99;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub sample_period_ms: u64,
    pub indicator_period_ms: u64,
    pub status_period_ms: u64,
    pub serial: SerialConfig,
    pub initial: InitialState,
    pub limits: ProtocolLimits,
    pub plant: PlantConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 250,
            indicator_period_ms: 500,
            status_period_ms: 10_000,
            serial: SerialConfig::default(),
            initial: InitialState::default(),
            limits: ProtocolLimits::default(),
            plant: PlantConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub listen_addr: String,
    pub rx_capacity: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7878".to_string(),
            rx_capacity: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialState {
    pub system_on: bool,
    pub desired_temp_c: i32,
    pub current_temp_c: i32,
    pub gains: PidGains,
    pub verbose: bool,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            system_on: false,
            desired_temp_c: 28,
            current_temp_c: 28,
            gains: PidGains::default(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProtocolLimits {
    pub min_desired_c: i32,
    pub max_desired_c: i32,
    pub max_gain: f32,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            min_desired_c: -WIRE_TEMP_LIMIT,
            max_desired_c: WIRE_TEMP_LIMIT,
            max_gain: 100.0,
        }
    }
}

impl ProtocolLimits {
    pub fn accepts_desired(&self, temp_c: i32) -> bool {
        (self.min_desired_c..=self.max_desired_c).contains(&temp_c)
    }

    pub fn accepts_gain(&self, gain: f32) -> bool {
        gain.is_finite() && (0.0..=self.max_gain).contains(&gain)
    }
}

/// First-order thermal model used when the node runs without hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    pub ambient_c: f32,
    pub heating_c_per_s: f32,
    pub cooling_per_s: f32,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            ambient_c: 21.0,
            heating_c_per_s: 0.8,
            cooling_per_s: 0.02,
        }
    }
}

impl NodeConfig {
    /// Reads a JSON config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read(path) {
            Ok(raw) => {
                let mut config = serde_json::from_slice::<NodeConfig>(&raw)?;
                config.sanitize();
                Ok(config)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn sanitize(&mut self) {
        self.sample_period_ms = self.sample_period_ms.clamp(10, 60_000);
        self.indicator_period_ms = self.indicator_period_ms.clamp(50, 60_000);
        self.status_period_ms = self.status_period_ms.max(1_000);
        self.serial.sanitize();
        self.limits.sanitize();

        let limits = self.limits;
        self.initial.desired_temp_c = self
            .initial
            .desired_temp_c
            .clamp(limits.min_desired_c, limits.max_desired_c);
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    /// PID integration step, matched to the acquisition period.
    pub fn pid_dt_s(&self) -> f32 {
        self.sample_period_ms as f32 / 1_000.0
    }
}

impl SerialConfig {
    pub fn sanitize(&mut self) {
        // Must at least hold the longest request frame.
        self.rx_capacity = self.rx_capacity.clamp(11, 256);
    }
}

impl ProtocolLimits {
    pub fn sanitize(&mut self) {
        self.min_desired_c = self.min_desired_c.clamp(-WIRE_TEMP_LIMIT, WIRE_TEMP_LIMIT);
        self.max_desired_c = self.max_desired_c.clamp(self.min_desired_c, WIRE_TEMP_LIMIT);
        if !self.max_gain.is_finite() || self.max_gain <= 0.0 {
            self.max_gain = 100.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_orders_desired_limits() {
        let mut config = NodeConfig::default();
        config.limits.min_desired_c = 50;
        config.limits.max_desired_c = 10;
        config.initial.desired_temp_c = 120;

        config.sanitize();

        assert_eq!(config.limits.min_desired_c, 50);
        assert_eq!(config.limits.max_desired_c, 50);
        assert_eq!(config.initial.desired_temp_c, 50);
    }

    #[test]
    fn sanitize_keeps_rx_buffer_large_enough_for_gain_frames() {
        let mut config = NodeConfig::default();
        config.serial.rx_capacity = 4;

        config.sanitize();

        assert_eq!(config.serial.rx_capacity, 11);
    }

    #[test]
    fn partial_json_falls_back_to_section_defaults() {
        let raw = r#"{"sample_period_ms": 500, "indicator_period_ms": 500, "status_period_ms": 5000}"#;
        let config: NodeConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.serial.rx_capacity, 20);
        assert_eq!(config.initial.desired_temp_c, 28);
        assert!((config.pid_dt_s() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = NodeConfig::load(Path::new("/nonexistent/heatnode/node.json")).unwrap();
        assert_eq!(config.sample_period_ms, 250);
    }

    #[test]
    fn gain_limits_reject_negative_and_nan() {
        let limits = ProtocolLimits::default();
        assert!(limits.accepts_gain(1.23));
        assert!(!limits.accepts_gain(-0.5));
        assert!(!limits.accepts_gain(f32::NAN));
    }
}
