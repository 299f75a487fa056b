//! Candidate filtering and multi-criterion scoring.
//!
//! Frontier centroids survive an ordered chain of rejection filters
//! (ROI, blacklist, path clarity, window-trap, in-cell occupancy,
//! distance bounds, boundary), then the survivors are ranked by a
//! weighted sum of info-gain, distance cost, history penalty, density
//! penalty, and direction-consistency bonus. The argmax wins ties by
//! insertion order (the first candidate reaching the max score).

use geometry::{bresenham_line, distance, point_in_polygon};
use grid::{cell, OccupancyGrid};
use types::{BoundingBox, Frontier, Goal, ScoringWeights, UnreachableRecord, VisitedGoal};

const BLACKLIST_RADIUS: f64 = 2.0;
const WINDOW_TRAP_AREA_THRESHOLD: f64 = 50.0;
const WINDOW_TRAP_RADIUS: f64 = 1.5;
const MIN_DISTANCE: f64 = 0.5;
const MAX_DISTANCE: f64 = 15.0;
const HISTORY_RADIUS: f64 = 2.0;
const HISTORY_REJECT_RADIUS: f64 = 0.3;
const DENSITY_RADIUS: f64 = 2.0;

/// Everything the scorer needs about current exploration state, beyond
/// the grid and the candidate list itself.
pub struct ScoringContext<'a> {
    pub current_x: f64,
    pub current_y: f64,
    pub weights: ScoringWeights,
    pub unreachable_goals: &'a [UnreachableRecord],
    pub visited_goals: &'a [VisitedGoal],
    pub last_goal_direction: Option<(f64, f64)>,
    pub roi_polygon: Option<&'a [(f64, f64)]>,
    pub scene_bounds: Option<BoundingBox>,
    pub configured_bounds: Option<BoundingBox>,
    pub explored_area: f64,
    pub exploration_height: f64,
    pub enable_z_exploration: bool,
    pub min_height: f64,
    pub max_height: f64,
}

/// Filter and score `candidates`, returning the best surviving goal.
pub fn select_goal(grid: &OccupancyGrid, candidates: &[Frontier], ctx: &ScoringContext) -> Option<Goal> {
    let mut best: Option<(Goal, f64)> = None;

    for candidate in candidates {
        if !passes_filters(grid, candidate, ctx) {
            continue;
        }
        let z = select_height(candidate.x, candidate.y, ctx);
        let density = local_density(grid, candidate.x, candidate.y);
        let score = score_candidate(candidate, ctx, density);

        let beats_current = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if beats_current {
            best = Some((
                Goal {
                    x: candidate.x,
                    y: candidate.y,
                    z,
                    density,
                    path_clear: true,
                },
                score,
            ));
        }
    }

    best.map(|(goal, _)| goal)
}

fn passes_filters(grid: &OccupancyGrid, candidate: &Frontier, ctx: &ScoringContext) -> bool {
    // 1. ROI
    if let Some(polygon) = ctx.roi_polygon {
        if !point_in_polygon(candidate.x, candidate.y, polygon) {
            return false;
        }
    }

    // 2. Blacklist proximity
    for rec in ctx.unreachable_goals {
        if distance(candidate.x, candidate.y, rec.x, rec.y) < BLACKLIST_RADIUS {
            return false;
        }
    }

    // 3. Path clarity over the inflated grid
    let (gx0, gy0) = grid.world_to_grid(ctx.current_x, ctx.current_y);
    let (gx1, gy1) = grid.world_to_grid(candidate.x, candidate.y);
    for (gx, gy) in bresenham_line(gx0, gy0, gx1, gy1) {
        if grid.get_inflated(gx, gy) != cell::FREE {
            return false;
        }
    }

    // 4. Window-trap, only once the map has opened up
    if ctx.explored_area > WINDOW_TRAP_AREA_THRESHOLD {
        let has_nearby_obstacle = occupied_within_radius(grid, candidate.x, candidate.y, WINDOW_TRAP_RADIUS);
        if !has_nearby_obstacle {
            return false;
        }
    }

    // 5. In-cell occupancy
    let (gx, gy) = grid.world_to_grid(candidate.x, candidate.y);
    if grid.get(gx, gy) == cell::OCCUPIED {
        return false;
    }

    // 6. Distance bounds
    let d = distance(ctx.current_x, ctx.current_y, candidate.x, candidate.y);
    if !(MIN_DISTANCE..=MAX_DISTANCE).contains(&d) {
        return false;
    }

    // 7. Boundary: reject if outside either the derived scene bounds or
    // an explicitly configured boundary box.
    if let Some(bounds) = ctx.scene_bounds {
        if !bounds.contains(candidate.x, candidate.y) {
            return false;
        }
    }
    if let Some(bounds) = ctx.configured_bounds {
        if !bounds.contains(candidate.x, candidate.y) {
            return false;
        }
    }

    // History reject radius: candidates this close to a prior visit are
    // dead regardless of score.
    for v in ctx.visited_goals {
        if distance(candidate.x, candidate.y, v.x, v.y) < HISTORY_REJECT_RADIUS {
            return false;
        }
    }

    true
}

fn occupied_within_radius(grid: &OccupancyGrid, x: f64, y: f64, radius: f64) -> bool {
    let cells = radius / grid.resolution;
    let r = cells.ceil() as i32;
    let (cx, cy) = grid.world_to_grid(x, y);
    for dy in -r..=r {
        for dx in -r..=r {
            let (gx, gy) = (cx + dx, cy + dy);
            let (wx, wy) = grid.grid_to_world(gx, gy);
            if distance(x, y, wx, wy) > radius {
                continue;
            }
            if grid.get(gx, gy) == cell::OCCUPIED {
                return true;
            }
        }
    }
    false
}

fn select_height(x: f64, y: f64, ctx: &ScoringContext) -> f64 {
    if !ctx.enable_z_exploration {
        return ctx.exploration_height.clamp(ctx.min_height, ctx.max_height);
    }
    let mut levels = Vec::new();
    let mut h = ctx.min_height;
    while h <= ctx.max_height {
        levels.push(h);
        h += 0.5;
    }
    if levels.is_empty() {
        return ctx.exploration_height.clamp(ctx.min_height, ctx.max_height);
    }
    let key = (x * 10.0).floor() as i64 + (y * 10.0).floor() as i64;
    let idx = (discrete_hash(key) as usize) % levels.len();
    levels[idx].clamp(ctx.min_height, ctx.max_height)
}

/// Deterministic integer hash (Knuth multiplicative), used so the same
/// (x, y) always maps to the same discrete height level.
fn discrete_hash(n: i64) -> u64 {
    (n as u64).wrapping_mul(2_654_435_761)
}

fn score_candidate(candidate: &Frontier, ctx: &ScoringContext, density: f64) -> f64 {
    let d = distance(ctx.current_x, ctx.current_y, candidate.x, candidate.y);
    let distance_cost = 1.0 / (1.0 + d);
    let info_gain = (candidate.size as f64 / 50.0).min(1.0);

    let history_penalty: f64 = ctx
        .visited_goals
        .iter()
        .map(|v| distance(candidate.x, candidate.y, v.x, v.y))
        .filter(|&dist| dist < HISTORY_RADIUS)
        .map(|dist| 0.5 * (1.0 - dist / HISTORY_RADIUS))
        .sum();

    let direction_bonus = match ctx.last_goal_direction {
        Some((dx, dy)) => {
            let to_candidate = (candidate.x - ctx.current_x, candidate.y - ctx.current_y);
            let mag = (to_candidate.0 * to_candidate.0 + to_candidate.1 * to_candidate.1).sqrt();
            if mag < f64::EPSILON {
                0.0
            } else {
                let unit = (to_candidate.0 / mag, to_candidate.1 / mag);
                let dot = unit.0 * dx + unit.1 * dy;
                dot.max(0.0) * ctx.weights.consistency
            }
        }
        None => 0.0,
    };

    ctx.weights.distance * distance_cost + ctx.weights.info_gain * info_gain
        - ctx.weights.history * history_penalty
        - ctx.weights.density * density
        + direction_bonus
}

fn local_density(grid: &OccupancyGrid, x: f64, y: f64) -> f64 {
    let r = (DENSITY_RADIUS / grid.resolution).ceil() as i32;
    let (cx, cy) = grid.world_to_grid(x, y);
    let mut occupied = 0usize;
    let mut unknown = 0usize;
    let mut total = 0usize;
    for dy in -r..=r {
        for dx in -r..=r {
            let (gx, gy) = (cx + dx, cy + dy);
            let (wx, wy) = grid.grid_to_world(gx, gy);
            if distance(x, y, wx, wy) > DENSITY_RADIUS {
                continue;
            }
            total += 1;
            match grid.get(gx, gy) {
                cell::OCCUPIED => occupied += 1,
                cell::UNKNOWN => unknown += 1,
                _ => {}
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    (occupied as f64 / total as f64 + 0.3 * unknown as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        unreachable: &'a [UnreachableRecord],
        visited: &'a [VisitedGoal],
        roi: Option<&'a [(f64, f64)]>,
    ) -> ScoringContext<'a> {
        ScoringContext {
            current_x: 0.0,
            current_y: 0.0,
            weights: ScoringWeights::default(),
            unreachable_goals: unreachable,
            visited_goals: visited,
            last_goal_direction: None,
            roi_polygon: roi,
            scene_bounds: None,
            configured_bounds: None,
            explored_area: 0.0,
            exploration_height: 1.0,
            enable_z_exploration: false,
            min_height: 0.5,
            max_height: 2.0,
        }
    }

    fn open_grid() -> OccupancyGrid {
        let mut g = OccupancyGrid::new(200, 200, 0.2, 0.3);
        g.seed_free_disk(0.0, 0.0, 90);
        g.inflate_obstacles();
        g
    }

    #[test]
    fn picks_the_only_survivor() {
        let grid = open_grid();
        let candidates = vec![Frontier { x: 3.0, y: 0.0, size: 10 }];
        let c = ctx(&[], &[], None);
        let goal = select_goal(&grid, &candidates, &c).unwrap();
        assert!((goal.x - 3.0).abs() < 1e-9);
    }

    #[test]
    fn blacklist_rejects_nearby_candidate() {
        let grid = open_grid();
        let unreachable = [UnreachableRecord { x: 3.1, y: 0.0 }];
        let candidates = vec![Frontier { x: 3.0, y: 0.0, size: 10 }];
        let c = ctx(&unreachable, &[], None);
        assert!(select_goal(&grid, &candidates, &c).is_none());
    }

    #[test]
    fn distance_bounds_reject_too_close_and_too_far() {
        let grid = open_grid();
        let candidates = vec![
            Frontier { x: 0.1, y: 0.0, size: 10 },
            Frontier { x: 16.0, y: 0.0, size: 10 },
        ];
        let c = ctx(&[], &[], None);
        assert!(select_goal(&grid, &candidates, &c).is_none());
    }

    #[test]
    fn roi_filter_keeps_only_candidate_inside_polygon() {
        let grid = open_grid();
        let polygon = [(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0)];
        let candidates = vec![
            Frontier { x: 2.5, y: 2.5, size: 10 },
            Frontier { x: 10.0, y: 10.0, size: 10 },
        ];
        let c = ctx(&[], &[], Some(&polygon));
        let goal = select_goal(&grid, &candidates, &c).unwrap();
        assert!((goal.x - 2.5).abs() < 1e-9);
        assert!((goal.y - 2.5).abs() < 1e-9);
    }

    #[test]
    fn history_reject_radius_drops_recently_visited() {
        let grid = open_grid();
        let visited = [VisitedGoal { x: 3.0, y: 0.0 }];
        let candidates = vec![Frontier { x: 3.05, y: 0.0, size: 10 }];
        let c = ctx(&[], &visited, None);
        assert!(select_goal(&grid, &candidates, &c).is_none());
    }

    #[test]
    fn higher_info_gain_candidate_wins_when_distance_equal() {
        let grid = open_grid();
        let candidates = vec![
            Frontier { x: 3.0, y: 0.0, size: 5 },
            Frontier { x: 0.0, y: 3.0, size: 50 },
        ];
        let c = ctx(&[], &[], None);
        let goal = select_goal(&grid, &candidates, &c).unwrap();
        assert!((goal.y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn height_selection_is_deterministic_for_same_xy() {
        let mut ctx_z = ctx(&[], &[], None);
        ctx_z.enable_z_exploration = true;
        ctx_z.min_height = 0.5;
        ctx_z.max_height = 2.0;
        let z1 = select_height(1.23, 4.56, &ctx_z);
        let z2 = select_height(1.23, 4.56, &ctx_z);
        assert_eq!(z1, z2);
        assert!(z1 >= 0.5 && z1 <= 2.0);
    }
}
