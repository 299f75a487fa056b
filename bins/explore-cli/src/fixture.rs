//! Recorded-event fixtures for offline replay, so the controller's
//! planning loop can be exercised and inspected without a live bus.

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use types::{CloudPoint, Vec3};

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub start: Vec3,
    pub events: Vec<TimedEvent>,
}

#[derive(Debug, Deserialize)]
pub struct TimedEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayEvent {
    Odometry { x: f64, y: f64, z: f64 },
    Cloud { points: Vec<CloudPoint> },
}

pub fn load(path: &Path) -> Result<Fixture> {
    let content = std::fs::read_to_string(path)?;
    let fixture: Fixture = serde_json::from_str(&content)?;
    Ok(fixture)
}
