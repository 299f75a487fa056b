//! Typed event stream emitted by the controller, replacing the ad-hoc
//! publish/subscribe surface described in spec.md §9.

use types::Goal;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub is_exploring: bool,
    pub is_paused: bool,
    pub frontiers_count: usize,
    pub explored_area: f64,
    pub explored_percentage: f64,
    pub elapsed_time: f64,
    pub distance_from_start: f64,
    pub current_goal: Option<Goal>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExplorationEvent {
    Started,
    Paused,
    Resumed,
    Stopped { reason: String },
    Returned,
    Status(StatusSnapshot),
}

/// Output sink the controller is constructed with. A production binary
/// wires this to whatever the surrounding UI/gateway layer needs; tests
/// use an in-memory recorder.
pub trait EventSink {
    fn emit(&mut self, event: ExplorationEvent);
}

/// An `EventSink` that keeps every emitted event, for tests and offline
/// replay tooling.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<ExplorationEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: ExplorationEvent) {
        self.events.push(event);
    }
}
