use std::sync::Arc;

use crate::{
    config::ProtocolLimits,
    error::{AckStatus, ProtocolError},
    protocol::{Command, Response},
    store::ControlStore,
};

/// Executes validated request frames against the store.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    store: Arc<ControlStore>,
    limits: ProtocolLimits,
}

impl CommandProcessor {
    pub fn new(store: Arc<ControlStore>, limits: ProtocolLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &Arc<ControlStore> {
        &self.store
    }

    /// Handles one complete frame. `out` is cleared and receives exactly one
    /// response frame, an error ACK included. Refused frames never touch the
    /// store; accepted ones perform at most one store write.
    pub fn process(&self, frame: &[u8], out: &mut Vec<u8>) -> Result<Command, ProtocolError> {
        out.clear();
        let result = Command::parse(frame).and_then(|command| self.execute(command));
        let response = match result {
            Ok((_, response)) => response,
            Err(err) => Response::Ack(err.status()),
        };
        response.encode(out);
        result.map(|(command, _)| command)
    }

    fn execute(&self, command: Command) -> Result<(Command, Response), ProtocolError> {
        let response = match command {
            Command::GetCurrent => Response::Current(self.store.current_temp()),
            Command::GetDesired => Response::Desired(self.store.desired_temp()),
            Command::SetDesired(temp_c) => {
                if !self.limits.accepts_desired(temp_c) {
                    return Err(ProtocolError::ValueOutOfRange);
                }
                self.store.set_desired_temp(temp_c);
                Response::Ack(AckStatus::Ok)
            }
            Command::SetGain(selector, value) => {
                if !self.limits.accepts_gain(value) {
                    return Err(ProtocolError::ValueOutOfRange);
                }
                self.store.update_gain(selector, value);
                Response::Ack(AckStatus::Ok)
            }
            Command::ToggleVerbose => {
                self.store.toggle_verbose();
                Response::Ack(AckStatus::Ok)
            }
        };
        Ok((command, response))
    }
}
