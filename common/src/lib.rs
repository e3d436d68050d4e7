pub mod assembler;
pub mod config;
pub mod error;
pub mod indicators;
pub mod pid;
pub mod pipeline;
pub mod processor;
pub mod protocol;
pub mod serial;
pub mod signal;
pub mod store;
pub mod types;

pub use assembler::{AssemblerState, Frame, FrameAssembler};
pub use config::{InitialState, NodeConfig, PlantConfig, ProtocolLimits, SerialConfig};
pub use error::{AckStatus, ConfigError, ProtocolError, SensorError};
pub use indicators::{ButtonPress, IndicatorPattern};
pub use pid::{PidController, PidTerms};
pub use pipeline::{HeaterOutput, TemperatureSensor};
pub use processor::CommandProcessor;
pub use protocol::{Command, CommandKind, Response};
pub use signal::WakeSignal;
pub use store::ControlStore;
pub use types::{GainSelector, PidGains, StoreSnapshot};
