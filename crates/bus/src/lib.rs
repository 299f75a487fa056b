//! The `BusAdapter` trait contract and mission envelope synthesis.
//!
//! This crate defines the boundary the controller publishes through; it
//! does not implement MQTT, WebSocket, or any other transport. A
//! production binary supplies its own `BusAdapter` wired to the real
//! message bus.

use thiserror::Error;
use types::{ExecutionCommand, Mission, Vec3, Waypoint};

const WAYPOINT_SPACING: f64 = 2.0;
const MIN_WAYPOINTS: usize = 2;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// The controller's view of the bus: publish outbound messages, receive
/// inbound pose/cloud events through whatever callback mechanism the
/// transport crate wires up (out of scope here).
pub trait BusAdapter {
    fn publish_mission(&mut self, mission: &Mission) -> Result<(), BusError>;
    fn publish_execution(&mut self, command: &ExecutionCommand) -> Result<(), BusError>;
}

/// Linearly interpolate waypoints from `from` to `to`, one every
/// `WAYPOINT_SPACING` meters of xy distance, with at least
/// `MIN_WAYPOINTS` waypoints. Z is interpolated linearly too; yaw is
/// always 0 (spec does not define heading for exploration waypoints).
pub fn interpolate_waypoints(from: Vec3, to: Vec3) -> Vec<Waypoint> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let horizontal_distance = (dx * dx + dy * dy).sqrt();

    let segments = (horizontal_distance / WAYPOINT_SPACING).ceil() as usize;
    let count = segments.max(MIN_WAYPOINTS - 1) + 1;

    (0..count)
        .map(|i| {
            let t = if count <= 1 {
                1.0
            } else {
                i as f64 / (count - 1) as f64
            };
            Waypoint::new(Vec3::new(
                from.x + dx * t,
                from.y + dy * t,
                from.z + (to.z - from.z) * t,
            ))
        })
        .collect()
}

/// Build the mission envelope for a goal, given a caller-supplied unique
/// id (the controller generates this from its `Clock`, formatted
/// `"exploration_<monotonic-ms>"`).
pub fn build_mission(id: impl Into<String>, from: Vec3, to: Vec3) -> Mission {
    Mission {
        id: id.into(),
        tasks: interpolate_waypoints(from, to),
    }
}

/// Build the single-waypoint return-home mission.
pub fn build_return_home_mission(id: impl Into<String>, home: Vec3) -> Mission {
    Mission {
        id: id.into(),
        tasks: vec![Waypoint::new(home)],
    }
}

/// Canonical exploration mission id for a monotonic millisecond
/// timestamp.
pub fn exploration_mission_id(now_ms: u64) -> String {
    format!("exploration_{now_ms}")
}

/// Canonical return-home mission id for a monotonic millisecond
/// timestamp.
pub fn return_home_mission_id(now_ms: u64) -> String {
    format!("return_home_{now_ms}")
}
