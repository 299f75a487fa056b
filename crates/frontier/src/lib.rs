//! Frontier cell detection and clustering.
//!
//! A frontier cell is a free cell with at least one unknown 8-neighbor:
//! the boundary between what the grid has observed and what it hasn't.
//! Raw frontier cells are clustered by greedy single-linkage so the
//! scorer works with a handful of candidate centroids instead of every
//! individual cell.

use geometry::distance;
use grid::{cell, OccupancyGrid};
use types::Frontier;

/// Detect and cluster frontier cells within `max_distance` meters of
/// `(vehicle_x, vehicle_y)`.
///
/// `cluster_radius` is the single-linkage radius in meters;
/// `min_cluster_size` discards clusters with fewer raw member cells.
pub fn detect_frontiers(
    grid: &OccupancyGrid,
    vehicle_x: f64,
    vehicle_y: f64,
    max_distance: f64,
    cluster_radius: f64,
    min_cluster_size: usize,
) -> Vec<Frontier> {
    let raw_points = raw_frontier_cells(grid, vehicle_x, vehicle_y, max_distance);
    cluster(&raw_points, cluster_radius, min_cluster_size)
}

/// Raw frontier cell world positions inside the search window, in
/// discovery (row-major) order.
fn raw_frontier_cells(
    grid: &OccupancyGrid,
    vehicle_x: f64,
    vehicle_y: f64,
    max_distance: f64,
) -> Vec<(f64, f64)> {
    let (cx, cy) = grid.world_to_grid(vehicle_x, vehicle_y);
    let half_side = (max_distance / grid.resolution).ceil() as i32;

    let lo_x = (cx - half_side).max(1);
    let hi_x = (cx + half_side).min(grid.width as i32 - 2);
    let lo_y = (cy - half_side).max(1);
    let hi_y = (cy + half_side).min(grid.height as i32 - 2);

    let mut points = Vec::new();
    for gy in lo_y..=hi_y {
        for gx in lo_x..=hi_x {
            if grid.get(gx, gy) != cell::FREE {
                continue;
            }
            if has_unknown_neighbor(grid, gx, gy) {
                points.push(grid.grid_to_world(gx, gy));
            }
        }
    }
    points
}

fn has_unknown_neighbor(grid: &OccupancyGrid, gx: i32, gy: i32) -> bool {
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            if grid.get(gx + dx, gy + dy) == cell::UNKNOWN {
                return true;
            }
        }
    }
    false
}

/// Greedy single-linkage clustering by discovery order: for each
/// unvisited point, open a cluster and absorb every later unvisited
/// point within `radius` meters, then discard clusters smaller than
/// `min_size`.
fn cluster(points: &[(f64, f64)], radius: f64, min_size: usize) -> Vec<Frontier> {
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let mut members = vec![points[i]];
        for j in (i + 1)..points.len() {
            if visited[j] {
                continue;
            }
            let (x0, y0) = points[i];
            let (x1, y1) = points[j];
            if distance(x0, y0, x1, y1) <= radius {
                visited[j] = true;
                members.push(points[j]);
            }
        }
        if members.len() < min_size {
            continue;
        }
        let n = members.len() as f64;
        let (sum_x, sum_y) = members
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        clusters.push(Frontier {
            x: sum_x / n,
            y: sum_y / n,
            size: members.len(),
        });
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_frontiers_on_empty_grid() {
        let grid = OccupancyGrid::new(100, 100, 0.2, 0.3);
        let frontiers = detect_frontiers(&grid, 0.0, 0.0, 30.0, 0.6, 3);
        assert!(frontiers.is_empty());
    }

    #[test]
    fn single_ray_produces_one_cluster_near_expected_centroid() {
        let mut grid = OccupancyGrid::new(100, 100, 0.2, 0.3);
        let (gx1, gy1) = grid.world_to_grid(8.0, 0.0);
        grid.raytrace(0.0, 0.0, 8.0, 0.0);
        grid.set(gx1, gy1, grid::cell::OCCUPIED);

        let frontiers = detect_frontiers(&grid, 0.0, 0.0, 30.0, 0.6, 1);
        assert_eq!(frontiers.len(), 1);
        let f = frontiers[0];
        assert!((f.x - 7.9).abs() < 0.3, "centroid x was {}", f.x);
        assert!(f.y.abs() < 0.3, "centroid y was {}", f.y);
    }

    #[test]
    fn clusters_below_min_size_are_discarded() {
        let mut grid = OccupancyGrid::new(100, 100, 0.2, 0.3);
        grid.raytrace(0.0, 0.0, 2.0, 0.0);
        let (gx, gy) = grid.world_to_grid(2.0, 0.0);
        grid.set(gx, gy, grid::cell::OCCUPIED);

        let frontiers = detect_frontiers(&grid, 0.0, 0.0, 30.0, 0.6, 100);
        assert!(frontiers.is_empty());
    }

    #[test]
    fn clustering_merges_nearby_points() {
        let points = vec![(0.0, 0.0), (0.1, 0.1), (10.0, 10.0)];
        let clusters = cluster(&points, 0.6, 1);
        assert_eq!(clusters.len(), 2);
        let sizes: Vec<usize> = clusters.iter().map(|c| c.size).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }
}
