use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    error::SensorError,
    pid::{PidController, PidTerms},
    signal::WakeSignal,
    store::ControlStore,
};

/// Temperature source, read once per acquisition period.
pub trait TemperatureSensor: Send {
    fn read_celsius(&mut self) -> Result<i32, SensorError>;
}

/// Heater drive, written only when its state should change.
pub trait HeaterOutput: Send {
    fn set_heater(&mut self, on: bool);
}

pub struct Acquisition<S> {
    store: Arc<ControlStore>,
    sensor: S,
    ready: Arc<WakeSignal>,
}

impl<S: TemperatureSensor> Acquisition<S> {
    pub fn new(store: Arc<ControlStore>, sensor: S, ready: Arc<WakeSignal>) -> Self {
        Self {
            store,
            sensor,
            ready,
        }
    }

    /// Takes one sample. A failed read leaves `current_temp` untouched and
    /// does not wake the controller.
    pub fn step(&mut self) -> Result<i32, SensorError> {
        match self.sensor.read_celsius() {
            Ok(temp_c) => {
                self.store.set_current_temp(temp_c);
                if self.store.verbose() {
                    info!("read temperature: {temp_c} C");
                }
                self.ready.raise();
                Ok(temp_c)
            }
            Err(err) => {
                if self.store.verbose() {
                    warn!(
                        "sensor read failed, keeping {} C: {err}",
                        self.store.current_temp()
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn run(mut self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let _ = self.step();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatDecision {
    pub terms: PidTerms,
    pub heat_on: bool,
}

pub struct PidStage {
    store: Arc<ControlStore>,
    pid: PidController,
    dt_s: f32,
    measurement_ready: Arc<WakeSignal>,
    actuate: Arc<WakeSignal>,
}

impl PidStage {
    pub fn new(
        store: Arc<ControlStore>,
        dt_s: f32,
        measurement_ready: Arc<WakeSignal>,
        actuate: Arc<WakeSignal>,
    ) -> Self {
        Self {
            store,
            pid: PidController::new(),
            dt_s,
            measurement_ready,
            actuate,
        }
    }

    pub fn controller(&self) -> &PidController {
        &self.pid
    }

    pub fn step(&mut self) -> HeatDecision {
        let measured = self.store.current_temp();
        let desired = self.store.desired_temp();
        let gains = self.store.gains();

        let terms = self
            .pid
            .step(gains, desired as f32, measured as f32, self.dt_s);
        let heat_on = terms.output() > 0.0 && self.store.system_on();
        self.store.set_heat_on(heat_on);

        if self.store.verbose() {
            info!(
                "pid decided heater {} (current {measured} C, desired {desired} C, output {:.2})",
                if heat_on { "ON" } else { "OFF" },
                terms.output()
            );
        }

        self.actuate.raise();
        HeatDecision { terms, heat_on }
    }

    pub async fn run(mut self) {
        loop {
            self.measurement_ready.wait().await;
            self.step();
        }
    }
}

pub struct Actuation<H> {
    store: Arc<ControlStore>,
    output: H,
    applied: bool,
    actuate: Arc<WakeSignal>,
}

impl<H: HeaterOutput> Actuation<H> {
    /// The output is assumed to start switched off.
    pub fn new(store: Arc<ControlStore>, output: H, actuate: Arc<WakeSignal>) -> Self {
        Self {
            store,
            output,
            applied: false,
            actuate,
        }
    }

    pub fn applied(&self) -> bool {
        self.applied
    }

    /// Returns the new output state when a write happened.
    pub fn step(&mut self) -> Option<bool> {
        let target = self.store.system_on() && self.store.heat_on();
        if target == self.applied {
            return None;
        }

        self.output.set_heater(target);
        self.applied = target;

        if self.store.verbose() {
            if self.store.system_on() {
                info!("heater turned {}", if target { "ON" } else { "OFF" });
            } else {
                info!("system off, heater off");
            }
        }
        Some(target)
    }

    pub async fn run(mut self) {
        loop {
            self.actuate.wait().await;
            self.step();
        }
    }
}

pub struct PipelineHandles {
    pub acquisition: JoinHandle<()>,
    pub pid: JoinHandle<()>,
    pub actuation: JoinHandle<()>,
}

impl PipelineHandles {
    pub fn abort(&self) {
        self.acquisition.abort();
        self.pid.abort();
        self.actuation.abort();
    }
}

/// Spawns the three stages on the current runtime.
pub fn spawn<S, H>(
    store: Arc<ControlStore>,
    sensor: S,
    heater: H,
    period: Duration,
    dt_s: f32,
) -> PipelineHandles
where
    S: TemperatureSensor + 'static,
    H: HeaterOutput + 'static,
{
    let measurement_ready = Arc::new(WakeSignal::new());
    let actuate = Arc::new(WakeSignal::new());

    let acquisition = Acquisition::new(store.clone(), sensor, measurement_ready.clone());
    let pid = PidStage::new(store.clone(), dt_s, measurement_ready, actuate.clone());
    let actuation = Actuation::new(store, heater, actuate);

    PipelineHandles {
        acquisition: tokio::spawn(acquisition.run(period)),
        pid: tokio::spawn(pid.run()),
        actuation: tokio::spawn(actuation.run()),
    }
}
