use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.1,
            kd: 0.05,
        }
    }
}

impl PidGains {
    pub fn get(&self, selector: GainSelector) -> f32 {
        match selector {
            GainSelector::Kp => self.kp,
            GainSelector::Ki => self.ki,
            GainSelector::Kd => self.kd,
        }
    }

    /// Returns a copy with only the selected member replaced.
    pub fn with(mut self, selector: GainSelector, value: f32) -> Self {
        match selector {
            GainSelector::Kp => self.kp = value,
            GainSelector::Ki => self.ki = value,
            GainSelector::Kd => self.kd = value,
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainSelector {
    Kp,
    Ki,
    Kd,
}

impl GainSelector {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Kp => b'p',
            Self::Ki => b'i',
            Self::Kd => b'd',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'p' => Some(Self::Kp),
            b'i' => Some(Self::Ki),
            b'd' => Some(Self::Kd),
            _ => None,
        }
    }
}

/// Field-by-field copy of the store. Fields are read one lock at a time, so
/// the snapshot is not consistent across fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StoreSnapshot {
    #[serde(rename = "systemOn")]
    pub system_on: bool,
    #[serde(rename = "desiredTemp")]
    pub desired_temp: i32,
    #[serde(rename = "currentTemp")]
    pub current_temp: i32,
    #[serde(rename = "heatOn")]
    pub heat_on: bool,
    pub gains: PidGains,
    pub verbose: bool,
}
