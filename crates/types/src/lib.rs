//! Shared message and configuration types for the exploration engine.

use serde::{Deserialize, Serialize};

/// A point in world-frame meters, Z up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Horizontal (xy) Euclidean distance to another point.
    pub fn distance_xy(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An integer grid cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridCoord {
    pub gx: i32,
    pub gy: i32,
}

impl GridCoord {
    pub fn new(gx: i32, gy: i32) -> Self {
        Self { gx, gy }
    }
}

/// A single sample from the vehicle's streaming point cloud, in the
/// vehicle's current frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CloudPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
}

/// A batch of point-cloud samples delivered as one event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<CloudPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<f64>,
}

/// Vehicle velocity, used only for stuck detection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Pose payload as received at the bus boundary. Accepts either a
/// top-level position or a nested `pose.position`, per spec §3/§9, and is
/// normalized into a single `Vec3` by `Odometry::position()`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Odometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<NestedPose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NestedPose {
    pub position: Vec3,
}

impl Odometry {
    /// Construct from a plain top-level position (the common case).
    pub fn from_position(pos: Vec3) -> Self {
        Self {
            x: Some(pos.x),
            y: Some(pos.y),
            z: Some(pos.z),
            pose: None,
            velocity: None,
        }
    }

    /// Canonical position, accepting either shape. Returns `None` if
    /// neither the top-level fields nor `pose.position` are present,
    /// which the controller treats as a malformed event to ignore
    /// (spec §7).
    pub fn position(&self) -> Option<Vec3> {
        if let (Some(x), Some(y), Some(z)) = (self.x, self.y, self.z) {
            return Some(Vec3::new(x, y, z));
        }
        self.pose.map(|p| p.position)
    }
}

/// A single waypoint task within a mission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Vec3,
    pub yaw: f64,
}

impl Waypoint {
    pub fn new(position: Vec3) -> Self {
        Self { position, yaw: 0.0 }
    }
}

/// A mission envelope published to the bus (spec §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub tasks: Vec<Waypoint>,
}

/// Execution command actions (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExecutionAction {
    Start = 0,
    Pause = 1,
    Resume = 2,
    Stop = 3,
    Clear = 4,
}

/// An execution command bound to a mission ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCommand {
    pub id: String,
    pub action: ExecutionAction,
}

/// A clustered frontier candidate (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frontier {
    pub x: f64,
    pub y: f64,
    pub size: usize,
}

/// The scorer's chosen next goal (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub density: f64,
    pub path_clear: bool,
}

/// A goal blacklisted after repeated arrival failure (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnreachableRecord {
    pub x: f64,
    pub y: f64,
}

/// A goal the vehicle has successfully arrived at (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VisitedGoal {
    pub x: f64,
    pub y: f64,
}

/// A 2D axis-aligned box, used for the optional hard boundary (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: (f64, f64),
    pub max: (f64, f64),
}

impl BoundingBox {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min.0 && x <= self.max.0 && y >= self.min.1 && y <= self.max.1
    }
}

/// The five scoring weights of spec §4.3, each expected in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub info_gain: f64,
    pub distance: f64,
    pub consistency: f64,
    pub density: f64,
    pub history: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            info_gain: 0.4,
            distance: 0.3,
            consistency: 0.15,
            density: 0.1,
            history: 0.2,
        }
    }
}

/// Error raised by a setter that rejects an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("weight {field} = {value} out of range [0.0, 1.0]")]
pub struct WeightRangeError {
    pub field: &'static str,
    pub value: f64,
}

impl ScoringWeights {
    /// Validate every weight lies in `[0.0, 1.0]` (spec §9).
    pub fn validate(&self) -> Result<(), WeightRangeError> {
        let fields = [
            ("info_gain", self.info_gain),
            ("distance", self.distance),
            ("consistency", self.consistency),
            ("density", self.density),
            ("history", self.history),
        ];
        for (field, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(WeightRangeError { field, value });
            }
        }
        Ok(())
    }
}

/// Closed polygon used for the ROI filter (spec §4.3 filter #1).
pub type Polygon = Vec<(f64, f64)>;

/// All tunables of the exploration engine (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub resolution: f64,
    pub grid_width: usize,
    pub grid_height: usize,
    pub max_distance: f64,
    pub max_duration: f64,
    pub cluster_radius: f64,
    pub min_cluster_size: usize,
    pub exploration_height: f64,
    pub update_interval: f64,
    pub boundary_min: Option<(f64, f64)>,
    pub boundary_max: Option<(f64, f64)>,
    pub enable_z_exploration: bool,
    pub min_height: f64,
    pub max_height: f64,
    pub use_roi: bool,
    #[serde(skip)]
    pub roi_polygon: Option<Polygon>,
    pub scoring_weights: ScoringWeights,
    pub robot_radius: f64,
    pub max_goal_attempts: u32,
    pub arrival_timeout: f64,
    pub stuck_velocity_threshold: f64,
    pub stuck_duration: f64,
    pub arrival_radius: f64,
    pub receding_horizon_radius: f64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            resolution: 0.2,
            grid_width: 100,
            grid_height: 100,
            max_distance: 30.0,
            max_duration: 600.0,
            cluster_radius: 0.6,
            min_cluster_size: 3,
            exploration_height: 1.0,
            update_interval: 1.0,
            boundary_min: None,
            boundary_max: None,
            enable_z_exploration: false,
            min_height: 0.5,
            max_height: 2.0,
            use_roi: false,
            roi_polygon: None,
            scoring_weights: ScoringWeights::default(),
            robot_radius: 0.3,
            max_goal_attempts: 5,
            arrival_timeout: 8.0,
            stuck_velocity_threshold: 0.1,
            stuck_duration: 3.0,
            arrival_radius: 0.3,
            receding_horizon_radius: 1.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odometry_accepts_top_level_position() {
        let odom = Odometry::from_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(odom.position(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn odometry_accepts_nested_pose_position() {
        let json = r#"{"pose": {"position": {"x": 4.0, "y": 5.0, "z": 6.0}}}"#;
        let odom: Odometry = serde_json::from_str(json).unwrap();
        assert_eq!(odom.position(), Some(Vec3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn odometry_missing_position_is_none() {
        let odom = Odometry::default();
        assert_eq!(odom.position(), None);
    }

    #[test]
    fn scoring_weights_default_is_valid() {
        assert!(ScoringWeights::default().validate().is_ok());
    }

    #[test]
    fn scoring_weights_rejects_out_of_range() {
        let weights = ScoringWeights {
            info_gain: 1.5,
            ..ScoringWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn bounding_box_contains() {
        let bb = BoundingBox {
            min: (0.0, 0.0),
            max: (5.0, 5.0),
        };
        assert!(bb.contains(2.5, 2.5));
        assert!(!bb.contains(6.0, 1.0));
    }

    #[test]
    fn vec3_distance_xy_ignores_z() {
        let a = Vec3::new(0.0, 0.0, 100.0);
        let b = Vec3::new(3.0, 4.0, -100.0);
        assert!((a.distance_xy(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn mission_serde_roundtrip() {
        let mission = Mission {
            id: "exploration_12345".to_string(),
            tasks: vec![Waypoint::new(Vec3::new(1.0, 2.0, 1.0))],
        };
        let json = serde_json::to_string(&mission).unwrap();
        let decoded: Mission = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, mission);
    }
}
