use serde::Serialize;

use crate::store::ControlStore;

/// Degrees either side of the setpoint that still count as "at temperature".
pub const AT_TEMP_BAND_C: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndicatorPattern {
    pub power: bool,
    #[serde(rename = "atTemp")]
    pub at_temp: bool,
    pub below: bool,
    pub above: bool,
}

impl IndicatorPattern {
    /// Everything dark while the system is off.
    pub fn from_state(system_on: bool, current_c: i32, desired_c: i32) -> Self {
        if !system_on {
            return Self::default();
        }
        let diff = current_c - desired_c;
        Self {
            power: true,
            at_temp: diff.abs() <= AT_TEMP_BAND_C,
            below: diff < -AT_TEMP_BAND_C,
            above: diff > AT_TEMP_BAND_C,
        }
    }

    pub fn read(store: &ControlStore) -> Self {
        Self::from_state(store.system_on(), store.current_temp(), store.desired_temp())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPress {
    Power,
    Raise,
    Lower,
}

impl ButtonPress {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "power" | "p" => Some(Self::Power),
            "up" | "+" => Some(Self::Raise),
            "down" | "-" => Some(Self::Lower),
            _ => None,
        }
    }

    /// Raise and lower only act while the system is on, and never move the
    /// setpoint past `min_c..=max_c`. Returns whether the store changed.
    pub fn apply(self, store: &ControlStore, min_c: i32, max_c: i32) -> bool {
        match self {
            Self::Power => {
                store.set_system_on(!store.system_on());
                true
            }
            Self::Raise | Self::Lower if !store.system_on() => false,
            Self::Raise | Self::Lower => {
                let current = store.desired_temp();
                let step = if self == Self::Raise { 1 } else { -1 };
                let next = (current + step).clamp(min_c, max_c);
                if next == current {
                    return false;
                }
                store.set_desired_temp(next);
                true
            }
        }
    }
}
