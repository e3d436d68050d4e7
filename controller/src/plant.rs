use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use heatnode_common::{HeaterOutput, PlantConfig, SensorError, TemperatureSensor};

/// Readings outside this window are treated as a faulty sensor.
const PLAUSIBLE_C: std::ops::RangeInclusive<i32> = -40..=125;

/// Longest single integration step, so a stalled task does not overshoot.
const MAX_STEP_S: f32 = 1.0;

#[derive(Debug)]
struct PlantState {
    temp_c: f32,
    heater_on: bool,
    updated: Instant,
}

/// First-order room model standing in for the sensor and heater. The heater
/// adds a constant rate; losses pull the room towards ambient.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    config: PlantConfig,
    state: Arc<Mutex<PlantState>>,
}

impl SimulatedPlant {
    pub fn new(config: PlantConfig, start_c: f32) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(PlantState {
                temp_c: start_c,
                heater_on: false,
                updated: Instant::now(),
            })),
        }
    }

    pub fn sensor(&self) -> PlantSensor {
        PlantSensor(self.clone())
    }

    pub fn heater(&self) -> PlantHeater {
        PlantHeater(self.clone())
    }

    pub fn temperature(&self) -> f32 {
        self.advance_to(Instant::now()).0
    }

    fn advance_to(&self, now: Instant) -> (f32, bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut remaining = now.saturating_duration_since(state.updated).as_secs_f32();
        while remaining > 0.0 {
            let dt = remaining.min(MAX_STEP_S);
            state.temp_c = step(&self.config, state.temp_c, state.heater_on, dt);
            remaining -= dt;
        }
        state.updated = now;
        (state.temp_c, state.heater_on)
    }

    fn switch(&self, on: bool) {
        self.advance_to(Instant::now());
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .heater_on = on;
    }
}

fn step(config: &PlantConfig, temp_c: f32, heater_on: bool, dt_s: f32) -> f32 {
    let heating = if heater_on { config.heating_c_per_s } else { 0.0 };
    let losses = (temp_c - config.ambient_c) * config.cooling_per_s;
    temp_c + (heating - losses) * dt_s
}

pub struct PlantSensor(SimulatedPlant);

impl TemperatureSensor for PlantSensor {
    fn read_celsius(&mut self) -> Result<i32, SensorError> {
        let reading = self.0.temperature().round() as i32;
        if PLAUSIBLE_C.contains(&reading) {
            Ok(reading)
        } else {
            Err(SensorError::Implausible(reading))
        }
    }
}

pub struct PlantHeater(SimulatedPlant);

impl HeaterOutput for PlantHeater {
    fn set_heater(&mut self, on: bool) {
        self.0.switch(on);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config() -> PlantConfig {
        PlantConfig {
            ambient_c: 20.0,
            heating_c_per_s: 1.0,
            cooling_per_s: 0.1,
        }
    }

    #[test]
    fn heater_raises_temperature() {
        let config = config();
        let mut temp = 20.0;
        for _ in 0..10 {
            temp = step(&config, temp, true, 1.0);
        }
        assert!(temp > 25.0);
    }

    #[test]
    fn room_cools_towards_ambient() {
        let config = config();
        let mut temp = 30.0;
        for _ in 0..200 {
            temp = step(&config, temp, false, 1.0);
            assert!(temp >= config.ambient_c);
        }
        assert!((temp - config.ambient_c).abs() < 0.01);
    }

    #[test]
    fn sensor_reports_rounded_temperature() {
        let plant = SimulatedPlant::new(PlantConfig::default(), 22.4);
        assert_eq!(plant.sensor().read_celsius(), Ok(22));
    }

    #[test]
    fn implausible_reading_is_an_error() {
        let plant = SimulatedPlant::new(PlantConfig::default(), 400.0);
        assert_eq!(
            plant.sensor().read_celsius(),
            Err(SensorError::Implausible(400))
        );
    }
}
