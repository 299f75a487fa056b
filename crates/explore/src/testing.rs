//! Test doubles shared by this crate's unit tests and its scenario test
//! suite in `tests/`.

use bus::{BusAdapter, BusError};
use types::{ExecutionCommand, Mission};

#[derive(Debug, Default)]
pub struct RecordingBus {
    pub missions: Vec<Mission>,
    pub commands: Vec<ExecutionCommand>,
}

impl BusAdapter for RecordingBus {
    fn publish_mission(&mut self, mission: &Mission) -> Result<(), BusError> {
        self.missions.push(mission.clone());
        Ok(())
    }

    fn publish_execution(&mut self, command: &ExecutionCommand) -> Result<(), BusError> {
        self.commands.push(command.clone());
        Ok(())
    }
}
