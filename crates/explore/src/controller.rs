//! The exploration controller: the state machine that ties the grid,
//! frontier detector, scorer, and bus adapter together into a single
//! planning loop.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use bus::{build_mission, build_return_home_mission, exploration_mission_id, return_home_mission_id, BusAdapter};
use frontier::detect_frontiers;
use grid::{cell, OccupancyGrid};
use scorer::{select_goal, ScoringContext};
use types::{
    BoundingBox, ExecutionAction, ExecutionCommand, ExplorationConfig, Goal, Polygon, PointCloud,
    ScoringWeights, UnreachableRecord, Vec3, VisitedGoal, WeightRangeError,
};

use crate::clock::Clock;
use crate::events::{EventSink, ExplorationEvent, StatusSnapshot};

const SEED_DISK_RADIUS_CELLS: i32 = 15;
const ARRIVAL_RADIUS: f64 = 0.3;
const RETURN_HOME_RADIUS: f64 = 0.5;
const STOP_DISTANCE_THRESHOLD: f64 = 1.0;
const START_COMMAND_DELAY_MS: u64 = 500;
const MIN_CLOUD_POINTS_FOR_BOUNDS: usize = 100;
const CLOUD_STRIDE: usize = 10;
const CLOUD_Z_FILTER: f64 = 1.0;
const BOUNDS_SHRINK: f64 = 1.5;

/// Optional overrides accepted by `start_exploration`, merged over the
/// controller's existing `ExplorationConfig`.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub start_position: Option<Vec3>,
    pub max_distance: Option<f64>,
    pub max_duration: Option<f64>,
    pub exploration_height: Option<f64>,
    pub enable_z_exploration: Option<bool>,
    pub min_height: Option<f64>,
    pub max_height: Option<f64>,
    pub boundary_min: Option<(f64, f64)>,
    pub boundary_max: Option<(f64, f64)>,
}

/// Uniform return value for the control surface, mirroring the
/// `{success, message}` shape named in the bus adapter contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResult {
    pub success: bool,
    pub message: String,
}

impl ControlResult {
    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// A plain snapshot of the occupancy grid suitable for a UI to render.
#[derive(Debug, Clone)]
pub struct MapData {
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub cells: Vec<i8>,
    pub unknown_count: usize,
    pub free_count: usize,
    pub occupied_count: usize,
}

/// Key goal attempts by position rounded to the nearest 0.1 m, matching
/// the "rounded (x, y) key" of the controller's data model.
fn goal_key(x: f64, y: f64) -> (i64, i64) {
    ((x * 10.0).round() as i64, (y * 10.0).round() as i64)
}

fn distance_xy(a: (f64, f64), b: (f64, f64)) -> f64 {
    geometry::distance(a.0, a.1, b.0, b.1)
}

pub struct ExplorationController<B, S, C>
where
    B: BusAdapter,
    S: EventSink,
    C: Clock,
{
    config: ExplorationConfig,
    grid: OccupancyGrid,
    bus: B,
    sink: S,
    clock: C,

    is_exploring: bool,
    is_paused: bool,
    is_returning_home: bool,
    is_waiting_for_arrival: bool,
    is_preparing_next_goal: bool,

    start_pos: Option<Vec3>,
    current_pos: Option<Vec3>,
    current_goal: Option<Goal>,
    current_mission_id: Option<String>,

    start_time_ms: Option<u64>,
    mission_start_time_ms: Option<u64>,
    last_update_time_ms: u64,
    pending_start: Option<(String, u64)>,

    last_goal_direction: Option<(f64, f64)>,
    last_velocity_check: Option<((f64, f64), u64)>,
    stuck_start_time_ms: Option<u64>,

    goal_attempts: HashMap<(i64, i64), u32>,
    unreachable_goals: Vec<UnreachableRecord>,
    visited_goals: Vec<VisitedGoal>,
    scene_bounds: Option<BoundingBox>,

    last_status_emit_ms: u64,
}

impl<B, S, C> ExplorationController<B, S, C>
where
    B: BusAdapter,
    S: EventSink,
    C: Clock,
{
    pub fn new(config: ExplorationConfig, bus: B, sink: S, clock: C) -> Self {
        let grid = OccupancyGrid::new(config.grid_width, config.grid_height, config.resolution, config.robot_radius);
        Self {
            config,
            grid,
            bus,
            sink,
            clock,
            is_exploring: false,
            is_paused: false,
            is_returning_home: false,
            is_waiting_for_arrival: false,
            is_preparing_next_goal: false,
            start_pos: None,
            current_pos: None,
            current_goal: None,
            current_mission_id: None,
            start_time_ms: None,
            mission_start_time_ms: None,
            last_update_time_ms: 0,
            pending_start: None,
            last_goal_direction: None,
            last_velocity_check: None,
            stuck_start_time_ms: None,
            goal_attempts: HashMap::new(),
            unreachable_goals: Vec::new(),
            visited_goals: Vec::new(),
            scene_bounds: None,
            last_status_emit_ms: 0,
        }
    }

    pub fn is_exploring(&self) -> bool {
        self.is_exploring
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn is_returning_home(&self) -> bool {
        self.is_returning_home
    }

    pub fn is_waiting_for_arrival(&self) -> bool {
        self.is_waiting_for_arrival
    }

    pub fn current_goal(&self) -> Option<Goal> {
        self.current_goal
    }

    pub fn visited_goals(&self) -> &[VisitedGoal] {
        &self.visited_goals
    }

    pub fn unreachable_goals(&self) -> &[UnreachableRecord] {
        &self.unreachable_goals
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ---- control surface -------------------------------------------------

    pub fn start_exploration(&mut self, opts: StartOptions) -> ControlResult {
        if self.is_exploring {
            return ControlResult::fail("already exploring");
        }

        let start_pos = match opts.start_position.or(self.current_pos) {
            Some(pos) => pos,
            None => return ControlResult::fail("no known position"),
        };

        if let Some(v) = opts.max_distance {
            self.config.max_distance = v;
        }
        if let Some(v) = opts.max_duration {
            self.config.max_duration = v;
        }
        if let Some(v) = opts.exploration_height {
            self.config.exploration_height = v;
        }
        if let Some(v) = opts.enable_z_exploration {
            self.config.enable_z_exploration = v;
        }
        if let Some(v) = opts.min_height {
            self.config.min_height = v;
        }
        if let Some(v) = opts.max_height {
            self.config.max_height = v;
        }
        if let Some(v) = opts.boundary_min {
            self.config.boundary_min = Some(v);
        }
        if let Some(v) = opts.boundary_max {
            self.config.boundary_max = Some(v);
        }

        self.grid.reset();
        self.grid.seed_free_disk(start_pos.x, start_pos.y, SEED_DISK_RADIUS_CELLS);

        let now = self.clock.now_ms();
        self.start_pos = Some(start_pos);
        self.current_pos = Some(start_pos);
        self.current_goal = None;
        self.current_mission_id = None;
        self.pending_start = None;
        self.is_exploring = true;
        self.is_paused = false;
        self.is_returning_home = false;
        self.is_waiting_for_arrival = false;
        self.is_preparing_next_goal = false;
        self.start_time_ms = Some(now);

        // A first planning opportunity 500ms after start, regardless of
        // when the first cloud event actually lands.
        let interval_ms = (self.config.update_interval * 1000.0) as u64;
        self.last_update_time_ms = now.saturating_sub(interval_ms.saturating_sub(START_COMMAND_DELAY_MS));

        info!(x = start_pos.x, y = start_pos.y, "exploration started");
        self.sink.emit(ExplorationEvent::Started);
        ControlResult::ok("started")
    }

    pub fn pause_exploration(&mut self) -> ControlResult {
        if !self.is_exploring {
            return ControlResult::fail("not exploring");
        }
        self.is_paused = true;
        self.sink.emit(ExplorationEvent::Paused);
        ControlResult::ok("paused")
    }

    pub fn resume_exploration(&mut self) -> ControlResult {
        if !self.is_exploring {
            return ControlResult::fail("not exploring");
        }
        self.is_paused = false;
        self.sink.emit(ExplorationEvent::Resumed);
        ControlResult::ok("resumed")
    }

    pub fn stop_exploration(&mut self) -> ControlResult {
        if !self.is_exploring && !self.is_returning_home {
            return ControlResult::fail("not exploring");
        }
        self.do_stop("manual");
        ControlResult::ok("stopped")
    }

    pub fn reset(&mut self) {
        self.do_stop("reset");

        // A reset is a hard clear, not just a stop: unlike a plain
        // `stopExploration`, it discards the return-home mission in
        // flight along with every other piece of accumulated state.
        self.is_returning_home = false;
        self.current_goal = None;
        self.current_mission_id = None;
        self.pending_start = None;
        self.start_pos = None;
        self.last_goal_direction = None;
        self.last_velocity_check = None;
        self.stuck_start_time_ms = None;
        self.scene_bounds = None;
        self.grid.reset();
        self.visited_goals.clear();
        self.unreachable_goals.clear();
        self.goal_attempts.clear();
        info!("exploration reset");
    }

    pub fn set_roi(&mut self, polygon: Polygon) {
        self.config.use_roi = true;
        self.config.roi_polygon = Some(polygon);
    }

    pub fn clear_roi(&mut self) {
        self.config.use_roi = false;
        self.config.roi_polygon = None;
    }

    pub fn set_scoring_weights(&mut self, weights: ScoringWeights) -> Result<(), WeightRangeError> {
        weights.validate()?;
        self.config.scoring_weights = weights;
        Ok(())
    }

    pub fn get_scoring_weights(&self) -> ScoringWeights {
        self.config.scoring_weights
    }

    pub fn get_status(&self) -> StatusSnapshot {
        self.status_snapshot()
    }

    pub fn get_map_data(&self) -> MapData {
        let counts = self.grid.counts();
        MapData {
            width: self.grid.width,
            height: self.grid.height,
            resolution: self.grid.resolution,
            origin_x: self.grid.origin_x,
            origin_y: self.grid.origin_y,
            cells: (0..self.grid.width * self.grid.height)
                .map(|i| {
                    let gx = (i % self.grid.width) as i32;
                    let gy = (i / self.grid.width) as i32;
                    self.grid.get(gx, gy)
                })
                .collect(),
            unknown_count: counts.unknown,
            free_count: counts.free,
            occupied_count: counts.occupied,
        }
    }

    // ---- event ingestion --------------------------------------------------

    pub fn on_point_cloud(&mut self, cloud: PointCloud) {
        let now = self.clock.now_ms();
        self.flush_pending_start(now);

        if let Some(pos) = self.current_pos {
            self.update_map(&cloud, pos);
        }

        if self.is_waiting_for_arrival {
            if self.is_preparing_next_goal {
                // Within the receding-horizon radius of the current goal:
                // replan immediately instead of waiting for arrival.
                self.planning_step(now);
            } else if let Some(mission_start) = self.mission_start_time_ms {
                let elapsed_s = now.saturating_sub(mission_start) as f64 / 1000.0;
                if elapsed_s > self.config.arrival_timeout {
                    warn!(elapsed_s, "arrival timeout");
                    self.record_goal_failure();
                }
            }
        } else if self.is_exploring && !self.is_paused {
            let interval_ms = (self.config.update_interval * 1000.0) as u64;
            if now.saturating_sub(self.last_update_time_ms) >= interval_ms {
                self.planning_step(now);
            }
        }
    }

    pub fn on_odometry(&mut self, odom: types::Odometry) {
        let now = self.clock.now_ms();
        self.flush_pending_start(now);

        let Some(pos) = odom.position() else {
            debug!("ignoring odometry event with no position");
            return;
        };
        self.current_pos = Some(pos);

        if self.is_returning_home {
            if let Some(home) = self.start_pos {
                if distance_xy((pos.x, pos.y), (home.x, home.y)) < RETURN_HOME_RADIUS {
                    self.is_returning_home = false;
                    info!("returned home");
                    self.sink.emit(ExplorationEvent::Returned);
                }
            }
        }

        if self.is_waiting_for_arrival {
            self.check_stuck(pos, now);
            self.check_arrival(pos);
        }

        self.maybe_emit_status(now);
    }

    // ---- internal mechanics ------------------------------------------------

    fn check_stuck(&mut self, pos: Vec3, now: u64) {
        if let Some((last_pos, last_time)) = self.last_velocity_check {
            let dt_s = now.saturating_sub(last_time) as f64 / 1000.0;
            if dt_s > 0.0 {
                let v = distance_xy((pos.x, pos.y), last_pos) / dt_s;
                if v < self.config.stuck_velocity_threshold {
                    let stuck_start = *self.stuck_start_time_ms.get_or_insert(last_time);
                    let stuck_for_s = now.saturating_sub(stuck_start) as f64 / 1000.0;
                    if stuck_for_s >= self.config.stuck_duration {
                        warn!(stuck_for_s, "stuck detected");
                        self.record_goal_failure();
                        self.stuck_start_time_ms = None;
                    }
                } else {
                    self.stuck_start_time_ms = None;
                }
            }
        }
        self.last_velocity_check = Some(((pos.x, pos.y), now));
    }

    fn check_arrival(&mut self, pos: Vec3) {
        let Some(goal) = self.current_goal else { return };
        let d = distance_xy((pos.x, pos.y), (goal.x, goal.y));
        if d < ARRIVAL_RADIUS {
            info!(x = goal.x, y = goal.y, "goal reached");
            self.visited_goals.push(VisitedGoal { x: goal.x, y: goal.y });
            self.goal_attempts.remove(&goal_key(goal.x, goal.y));
            self.is_waiting_for_arrival = false;
            self.is_preparing_next_goal = false;
            self.stuck_start_time_ms = None;
        } else if d < self.config.receding_horizon_radius {
            self.is_preparing_next_goal = true;
        }
    }

    fn record_goal_failure(&mut self) {
        if let Some(goal) = self.current_goal {
            let key = goal_key(goal.x, goal.y);
            let count = self.goal_attempts.entry(key).or_insert(0);
            *count += 1;
            if *count >= self.config.max_goal_attempts {
                warn!(x = goal.x, y = goal.y, attempts = *count, "goal blacklisted");
                self.unreachable_goals.push(UnreachableRecord { x: goal.x, y: goal.y });
            }
        }
        self.is_waiting_for_arrival = false;
        self.stuck_start_time_ms = None;
    }

    fn planning_step(&mut self, now: u64) {
        let Some(pos) = self.current_pos else { return };
        let Some(start) = self.start_pos else { return };
        let Some(start_time) = self.start_time_ms else { return };

        let elapsed_s = now.saturating_sub(start_time) as f64 / 1000.0;
        if elapsed_s > self.config.max_duration {
            self.do_stop("timeout");
            return;
        }
        if distance_xy((pos.x, pos.y), (start.x, start.y)) > self.config.max_distance {
            self.do_stop("max_distance");
            return;
        }

        let frontiers = detect_frontiers(
            &self.grid,
            pos.x,
            pos.y,
            self.config.max_distance,
            self.config.cluster_radius,
            self.config.min_cluster_size,
        );
        if frontiers.is_empty() {
            self.do_stop("complete");
            return;
        }

        let configured_bounds = match (self.config.boundary_min, self.config.boundary_max) {
            (Some(min), Some(max)) => Some(BoundingBox { min, max }),
            _ => None,
        };
        let ctx = ScoringContext {
            current_x: pos.x,
            current_y: pos.y,
            weights: self.config.scoring_weights,
            unreachable_goals: &self.unreachable_goals,
            visited_goals: &self.visited_goals,
            last_goal_direction: self.last_goal_direction,
            roi_polygon: if self.config.use_roi {
                self.config.roi_polygon.as_deref()
            } else {
                None
            },
            scene_bounds: self.scene_bounds,
            configured_bounds,
            explored_area: self.grid.explored_area(),
            exploration_height: self.config.exploration_height,
            enable_z_exploration: self.config.enable_z_exploration,
            min_height: self.config.min_height,
            max_height: self.config.max_height,
        };

        let goal = match select_goal(&self.grid, &frontiers, &ctx) {
            Some(goal) => goal,
            None => {
                self.do_stop("no_valid_frontier");
                return;
            }
        };

        let dx = goal.x - pos.x;
        let dy = goal.y - pos.y;
        let mag = (dx * dx + dy * dy).sqrt();
        if mag > f64::EPSILON {
            self.last_goal_direction = Some((dx / mag, dy / mag));
        }

        self.current_goal = Some(goal);
        self.is_waiting_for_arrival = true;
        self.is_preparing_next_goal = false;
        self.mission_start_time_ms = Some(now);
        self.last_update_time_ms = now;

        let mission_id = exploration_mission_id(now);
        let mission = build_mission(mission_id.clone(), pos, Vec3::new(goal.x, goal.y, goal.z));
        self.publish_mission(mission, now);

        info!(x = goal.x, y = goal.y, z = goal.z, "goal selected");
        self.maybe_emit_status(now);
    }

    fn do_stop(&mut self, reason: &str) {
        self.is_exploring = false;
        self.is_paused = false;
        self.is_waiting_for_arrival = false;
        self.is_preparing_next_goal = false;

        let distance = match (self.current_pos, self.start_pos) {
            (Some(pos), Some(start)) => distance_xy((pos.x, pos.y), (start.x, start.y)),
            _ => 0.0,
        };

        if let (Some(start), true) = (self.start_pos, distance > STOP_DISTANCE_THRESHOLD) {
            info!(reason, distance, "stopping, returning home");
            if let Some(mission_id) = self.current_mission_id.take() {
                let _ = self.bus.publish_execution(&ExecutionCommand { id: mission_id, action: ExecutionAction::Stop });
            }
            let now = self.clock.now_ms();
            let mission_id = return_home_mission_id(now);
            let mission = build_return_home_mission(mission_id, start);
            self.is_returning_home = true;
            self.publish_mission(mission, now);
        } else {
            info!(reason, "stopped");
            self.sink.emit(ExplorationEvent::Stopped { reason: reason.to_string() });
        }
    }

    fn publish_mission(&mut self, mission: types::Mission, now: u64) {
        self.current_mission_id = Some(mission.id.clone());
        if let Err(err) = self.bus.publish_mission(&mission) {
            warn!(?err, "mission publish failed");
        }
        self.pending_start = Some((mission.id.clone(), now + START_COMMAND_DELAY_MS));
    }

    fn flush_pending_start(&mut self, now: u64) {
        if let Some((id, due)) = self.pending_start.clone() {
            if now >= due {
                if let Err(err) = self.bus.publish_execution(&ExecutionCommand { id, action: ExecutionAction::Start }) {
                    warn!(?err, "execution publish failed");
                }
                self.pending_start = None;
            }
        }
    }

    fn update_map(&mut self, cloud: &PointCloud, vehicle: Vec3) {
        for (i, point) in cloud.points.iter().enumerate() {
            if i % CLOUD_STRIDE != 0 {
                continue;
            }
            if (point.z - vehicle.z).abs() > CLOUD_Z_FILTER {
                continue;
            }
            let (gx, gy) = self.grid.world_to_grid(point.x, point.y);
            if !self.grid.in_map(gx, gy) {
                continue;
            }
            self.grid.raytrace(vehicle.x, vehicle.y, point.x, point.y);
            self.grid.set(gx, gy, cell::OCCUPIED);
        }
        self.grid.inflate_obstacles();

        if self.scene_bounds.is_none() && cloud.points.len() >= MIN_CLOUD_POINTS_FOR_BOUNDS {
            self.derive_scene_bounds(cloud);
        }
    }

    fn derive_scene_bounds(&mut self, cloud: &PointCloud) {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut min_z = f64::INFINITY;
        let mut max_z = f64::NEG_INFINITY;
        for p in &cloud.points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
            min_z = min_z.min(p.z);
            max_z = max_z.max(p.z);
        }

        self.scene_bounds = Some(BoundingBox {
            min: (min_x + BOUNDS_SHRINK, min_y + BOUNDS_SHRINK),
            max: (max_x - BOUNDS_SHRINK, max_y - BOUNDS_SHRINK),
        });
        self.config.min_height = (min_z + 0.3).max(0.5);
        self.config.max_height = (max_z - 0.5).min(2.5);
        debug!(?self.scene_bounds, "scene bounds derived");
    }

    fn status_snapshot(&self) -> StatusSnapshot {
        let frontiers_count = match self.current_pos {
            Some(pos) => detect_frontiers(
                &self.grid,
                pos.x,
                pos.y,
                self.config.max_distance,
                self.config.cluster_radius,
                self.config.min_cluster_size,
            )
            .len(),
            None => 0,
        };
        let explored_area = self.grid.explored_area();
        let total_area = self.grid.width as f64 * self.grid.height as f64 * self.grid.resolution * self.grid.resolution;
        let elapsed_time = match self.start_time_ms {
            Some(start) => self.clock.now_ms().saturating_sub(start) as f64 / 1000.0,
            None => 0.0,
        };
        let distance_from_start = match (self.current_pos, self.start_pos) {
            (Some(pos), Some(start)) => distance_xy((pos.x, pos.y), (start.x, start.y)),
            _ => 0.0,
        };

        StatusSnapshot {
            is_exploring: self.is_exploring,
            is_paused: self.is_paused,
            frontiers_count,
            explored_area,
            explored_percentage: if total_area > 0.0 { (explored_area / total_area) * 100.0 } else { 0.0 },
            elapsed_time,
            distance_from_start,
            current_goal: self.current_goal,
        }
    }

    fn maybe_emit_status(&mut self, now: u64) {
        const STATUS_INTERVAL_MS: u64 = 2000;
        if now.saturating_sub(self.last_status_emit_ms) < STATUS_INTERVAL_MS {
            return;
        }
        self.last_status_emit_ms = now;
        let snapshot = self.status_snapshot();
        self.sink.emit(ExplorationEvent::Status(snapshot));
    }
}
