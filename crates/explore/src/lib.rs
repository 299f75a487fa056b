//! The exploration controller: the state machine that drives the
//! continuous planning loop described in the data model (grid update,
//! frontier detection, scoring, mission publish, arrival/stuck/timeout
//! handling, and autonomous return-to-home).

mod clock;
mod controller;
mod events;
pub mod testing;

pub use clock::{Clock, FakeClock, SystemClock};
pub use controller::{ControlResult, ExplorationController, MapData, StartOptions};
pub use events::{EventSink, ExplorationEvent, RecordingSink, StatusSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBus;
    use types::{ExplorationConfig, Odometry, PointCloud, Vec3};

    fn controller() -> ExplorationController<RecordingBus, RecordingSink, FakeClock> {
        ExplorationController::new(
            ExplorationConfig::default(),
            RecordingBus::default(),
            RecordingSink::default(),
            FakeClock::new(),
        )
    }

    #[test]
    fn start_exploration_requires_a_known_position() {
        let mut c = controller();
        let result = c.start_exploration(StartOptions::default());
        assert!(!result.success);
    }

    #[test]
    fn start_exploration_seeds_a_free_disk() {
        let mut c = controller();
        let result = c.start_exploration(StartOptions {
            start_position: Some(Vec3::new(0.0, 0.0, 1.0)),
            ..Default::default()
        });
        assert!(result.success);
        assert!(c.is_exploring());
        let expected = std::f64::consts::PI * (15.0 * 0.2) * (15.0 * 0.2);
        assert!((c.get_map_data().free_count as f64 * 0.2 * 0.2 - expected).abs() < 5.0);
    }

    #[test]
    fn cannot_start_twice() {
        let mut c = controller();
        c.start_exploration(StartOptions {
            start_position: Some(Vec3::new(0.0, 0.0, 1.0)),
            ..Default::default()
        });
        let second = c.start_exploration(StartOptions::default());
        assert!(!second.success);
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let mut c = controller();
        c.start_exploration(StartOptions {
            start_position: Some(Vec3::new(0.0, 0.0, 1.0)),
            ..Default::default()
        });
        assert!(c.pause_exploration().success);
        assert!(c.is_paused());
        assert!(c.resume_exploration().success);
        assert!(!c.is_paused());
    }

    #[test]
    fn scoring_weights_setter_validates_range() {
        let mut c = controller();
        let bad = types::ScoringWeights { info_gain: 5.0, ..types::ScoringWeights::default() };
        assert!(c.set_scoring_weights(bad).is_err());
    }

    #[test]
    fn on_point_cloud_ignored_without_current_position_does_not_panic() {
        let mut c = controller();
        c.on_point_cloud(PointCloud::default());
    }

    #[test]
    fn on_odometry_with_malformed_pose_is_ignored() {
        let mut c = controller();
        c.on_odometry(Odometry::default());
        assert!(c.current_goal().is_none());
    }

    #[test]
    fn reset_far_from_start_issues_return_home_then_clears_state() {
        let mut c = controller();
        c.start_exploration(StartOptions {
            start_position: Some(Vec3::new(0.0, 0.0, 1.0)),
            ..Default::default()
        });
        c.on_odometry(Odometry::from_position(Vec3::new(5.0, 0.0, 1.0)));

        c.reset();

        assert!(!c.is_exploring());
        assert!(!c.is_returning_home());
        assert!(c.current_goal().is_none());
        assert!(c.visited_goals().is_empty());
        assert!(c.unreachable_goals().is_empty());

        let return_mission = c.bus().missions.last().expect("reset from far away should publish a return-home mission");
        assert_eq!(return_mission.tasks.len(), 1);
        assert!((return_mission.tasks[0].position.x - 0.0).abs() < 1e-9);

        assert_eq!(c.get_map_data().free_count, 0);
    }

    #[test]
    fn reset_near_start_does_not_publish_a_mission() {
        let mut c = controller();
        c.start_exploration(StartOptions {
            start_position: Some(Vec3::new(0.0, 0.0, 1.0)),
            ..Default::default()
        });

        c.reset();

        assert!(!c.is_exploring());
        assert!(c.bus().missions.is_empty());
    }
}
