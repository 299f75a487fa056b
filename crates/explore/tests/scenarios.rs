//! Scenario tests exercising the controller end to end, each named after
//! a sequence of events/assertions rather than an internal unit.

use explore::testing::RecordingBus;
use explore::{ExplorationController, FakeClock, RecordingSink, StartOptions};
use types::{CloudPoint, ExplorationConfig, Odometry, PointCloud, Vec3};

type Controller = ExplorationController<RecordingBus, RecordingSink, FakeClock>;

const UPDATE_INTERVAL_MS: u64 = 1100;
const ARRIVAL_TIMEOUT_MS: u64 = 8100;

fn start_at(x: f64, y: f64, z: f64) -> Controller {
    let mut c = ExplorationController::new(
        ExplorationConfig::default(),
        RecordingBus::default(),
        RecordingSink::default(),
        FakeClock::new(),
    );
    let result = c.start_exploration(StartOptions {
        start_position: Some(Vec3::new(x, y, z)),
        ..Default::default()
    });
    assert!(result.success, "{}", result.message);
    c
}

fn odom(x: f64, y: f64, z: f64) -> Odometry {
    Odometry::from_position(Vec3::new(x, y, z))
}

/// Advance the fake clock past the planning throttle and deliver a cloud
/// event, forcing a planning step off the disk seeded at start.
fn trigger_planning(c: &mut Controller) {
    c.clock().advance_ms(UPDATE_INTERVAL_MS);
    c.on_point_cloud(PointCloud::default());
}

/// S1 — disk seeding: a fresh `startExploration` seeds roughly a
/// 30x30-cell free disk around the start position.
#[test]
fn s1_disk_seeding() {
    let c = start_at(0.0, 0.0, 1.0);
    let map = c.get_map_data();
    let explored = map.free_count as f64 * map.resolution * map.resolution;
    let expected = std::f64::consts::PI * (15.0 * 0.2) * (15.0 * 0.2);
    assert!((explored - expected).abs() < 5.0, "explored was {explored}, expected ~{expected}");
}

/// S2 — frontier after one ray: a single raytrace to an occupied cell
/// produces at least one frontier cluster.
#[test]
fn s2_frontier_after_one_ray() {
    let mut c = start_at(0.0, 0.0, 1.0);
    let mut points = vec![CloudPoint { x: 8.0, y: 0.0, z: 1.0, intensity: None }];
    points.extend((0..99).map(|_| CloudPoint { x: 0.0, y: 0.0, z: 6.0, intensity: None }));
    c.on_point_cloud(PointCloud { points, stamp: None });

    let status = c.get_status();
    assert!(status.frontiers_count >= 1);
}

/// S3 — arrival: pose drifting to within 0.3m of the current goal marks
/// it visited and clears `isWaitingForArrival`.
#[test]
fn s3_arrival() {
    let mut c = start_at(0.0, 0.0, 1.0);
    trigger_planning(&mut c);
    let goal = c.current_goal().expect("planning should have picked a goal off the seeded disk");

    let before = c.visited_goals().len();
    c.on_odometry(odom(goal.x - 0.15, goal.y, goal.z));
    assert_eq!(c.visited_goals().len(), before + 1);
    assert!(!c.is_waiting_for_arrival());
}

/// S4 — arrival timeout: repeated timeouts at the same goal eventually
/// blacklist it.
#[test]
fn s4_arrival_timeout_blacklists_after_max_attempts() {
    let mut c = start_at(0.0, 0.0, 1.0);
    trigger_planning(&mut c);
    let goal = c.current_goal().expect("planning should have picked a goal off the seeded disk");

    for _ in 0..12 {
        c.clock().advance_ms(ARRIVAL_TIMEOUT_MS);
        c.on_point_cloud(PointCloud::default());
    }

    let blacklisted = c
        .unreachable_goals()
        .iter()
        .any(|r| (r.x - goal.x).abs() < 0.2 && (r.y - goal.y).abs() < 0.2);
    assert!(blacklisted, "expected goal ({}, {}) to be blacklisted", goal.x, goal.y);
}

/// S5 — stuck detection: holding position while waiting for arrival is
/// handled identically to an arrival timeout.
#[test]
fn s5_stuck_detection_records_an_attempt() {
    let mut c = start_at(0.0, 0.0, 1.0);
    trigger_planning(&mut c);
    assert!(c.current_goal().is_some());

    for _ in 0..33 {
        c.clock().advance_ms(100);
        c.on_odometry(odom(0.0, 0.0, 1.0));
    }

    assert!(!c.is_waiting_for_arrival());
}

/// Receding horizon: approaching within 1.5m of the current goal, without
/// reaching the 0.3m arrival radius, triggers an early replan instead of
/// waiting for arrival or a timeout.
#[test]
fn s8_receding_horizon_replans_before_arrival() {
    let mut c = start_at(0.0, 0.0, 1.0);
    trigger_planning(&mut c);
    let goal = c.current_goal().expect("planning should have picked a goal off the seeded disk");
    let missions_before = c.bus().missions.len();

    let dx = 0.0 - goal.x;
    let dy = 0.0 - goal.y;
    let mag = (dx * dx + dy * dy).sqrt();
    let (ux, uy) = (dx / mag, dy / mag);
    let near_x = goal.x + ux * 1.4;
    let near_y = goal.y + uy * 1.4;

    c.on_odometry(odom(near_x, near_y, goal.z));
    assert!(c.visited_goals().is_empty(), "1.4m is outside the arrival radius, not a visit");

    c.clock().advance_ms(10);
    c.on_point_cloud(PointCloud::default());

    assert!(
        c.bus().missions.len() > missions_before,
        "receding horizon should have published a new mission before arrival"
    );
    assert!(c.is_waiting_for_arrival());
}

/// S6 — ROI filter: a region of interest that excludes every seeded
/// frontier leaves no valid candidate, and planning stops gracefully.
#[test]
fn s6_roi_filter_rejects_all_candidates() {
    let mut c = start_at(0.0, 0.0, 1.0);
    c.set_roi(vec![(100.0, 100.0), (105.0, 100.0), (105.0, 105.0), (100.0, 105.0)]);

    trigger_planning(&mut c);

    assert!(c.current_goal().is_none());
    assert!(!c.is_exploring());
}

/// S7 — auto return-home: a manual stop far from the start position
/// issues a return-home mission, and arriving there emits `Returned`.
#[test]
fn s7_auto_return_home() {
    let mut c = start_at(0.0, 0.0, 1.0);
    c.on_odometry(odom(5.0, 0.0, 1.0));
    let result = c.stop_exploration();
    assert!(result.success);
    assert!(c.is_returning_home());

    let return_mission = c.bus().missions.last().expect("a return-home mission should have been published");
    assert_eq!(return_mission.tasks.len(), 1);
    assert!((return_mission.tasks[0].position.x - 0.0).abs() < 1e-9);

    c.on_odometry(odom(0.2, 0.0, 1.0));
    assert!(!c.is_returning_home());
}
