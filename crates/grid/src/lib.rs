//! 2D occupancy grid with obstacle inflation for the exploration engine.
//!
//! Cells hold a ternary occupancy estimate (unknown, free, occupied). A
//! parallel inflated grid, recomputed after every map update, expands
//! occupied cells by the vehicle's radius so the scorer can reason about
//! a physical body rather than a point.

use geometry::bresenham_line;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("invalid resolution: {0}")]
    InvalidResolution(f64),
}

/// Cell occupancy states.
pub mod cell {
    pub const UNKNOWN: i8 = 0;
    pub const FREE: i8 = 1;
    pub const OCCUPIED: i8 = -1;
}

/// Running counts of each cell state. Always sums to `width * height`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellCounts {
    pub unknown: usize,
    pub free: usize,
    pub occupied: usize,
}

impl CellCounts {
    fn record(&mut self, old: i8, new: i8) {
        self.decrement(old);
        self.increment(new);
    }

    fn increment(&mut self, value: i8) {
        match value {
            cell::FREE => self.free += 1,
            cell::OCCUPIED => self.occupied += 1,
            _ => self.unknown += 1,
        }
    }

    fn decrement(&mut self, value: i8) {
        match value {
            cell::FREE => self.free -= 1,
            cell::OCCUPIED => self.occupied -= 1,
            _ => self.unknown -= 1,
        }
    }
}

/// A 2D raster of cells with world<->grid coordinate transforms,
/// Bresenham raytracing, and obstacle inflation.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    raw: Vec<i8>,
    inflated: Vec<i8>,
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    inflation_radius_cells: i32,
    counts: CellCounts,
}

impl OccupancyGrid {
    /// Create a grid of `width` x `height` cells at `resolution`
    /// meters/cell, centered on the world origin.
    ///
    /// Returns `GridError::InvalidResolution` if `resolution` is not
    /// strictly positive.
    pub fn try_new(
        width: usize,
        height: usize,
        resolution: f64,
        robot_radius: f64,
    ) -> Result<Self, GridError> {
        if resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }
        Ok(Self::new(width, height, resolution, robot_radius))
    }

    /// Create a grid, panicking only on the programmer error of a
    /// non-positive resolution. Prefer `try_new` at configuration
    /// boundaries where `resolution` is not already validated.
    pub fn new(width: usize, height: usize, resolution: f64, robot_radius: f64) -> Self {
        let origin_x = -(width as f64) * resolution / 2.0;
        let origin_y = -(height as f64) * resolution / 2.0;
        let inflation_radius_cells = (robot_radius / resolution).ceil() as i32;
        Self {
            raw: vec![cell::UNKNOWN; width * height],
            inflated: vec![cell::UNKNOWN; width * height],
            width,
            height,
            resolution,
            origin_x,
            origin_y,
            inflation_radius_cells,
            counts: CellCounts {
                unknown: width * height,
                free: 0,
                occupied: 0,
            },
        }
    }

    pub fn counts(&self) -> CellCounts {
        self.counts
    }

    pub fn world_to_grid(&self, x: f64, y: f64) -> (i32, i32) {
        (
            ((x - self.origin_x) / self.resolution).floor() as i32,
            ((y - self.origin_y) / self.resolution).floor() as i32,
        )
    }

    pub fn grid_to_world(&self, gx: i32, gy: i32) -> (f64, f64) {
        (
            (gx as f64 + 0.5) * self.resolution + self.origin_x,
            (gy as f64 + 0.5) * self.resolution + self.origin_y,
        )
    }

    pub fn in_map(&self, gx: i32, gy: i32) -> bool {
        gx >= 0 && gy >= 0 && (gx as usize) < self.width && (gy as usize) < self.height
    }

    fn index(&self, gx: i32, gy: i32) -> usize {
        gy as usize * self.width + gx as usize
    }

    /// Raw cell state, or `cell::OCCUPIED` if `(gx, gy)` falls outside the
    /// grid (a conservative default for planning).
    pub fn get(&self, gx: i32, gy: i32) -> i8 {
        if !self.in_map(gx, gy) {
            return cell::OCCUPIED;
        }
        self.raw[self.index(gx, gy)]
    }

    /// Inflated cell state, same out-of-map convention as `get`.
    pub fn get_inflated(&self, gx: i32, gy: i32) -> i8 {
        if !self.in_map(gx, gy) {
            return cell::OCCUPIED;
        }
        self.inflated[self.index(gx, gy)]
    }

    /// Set the raw state of a cell, updating the running counts. No-op if
    /// out of map.
    pub fn set(&mut self, gx: i32, gy: i32, value: i8) {
        if !self.in_map(gx, gy) {
            return;
        }
        let idx = self.index(gx, gy);
        let old = self.raw[idx];
        if old == value {
            return;
        }
        self.raw[idx] = value;
        self.counts.record(old, value);
    }

    /// Bresenham raytrace from `(x0, y0)` to `(x1, y1)`. Every visited cell
    /// that is not already occupied is marked free; the caller sets the
    /// endpoint's occupancy separately. The end cell is included in the
    /// walk but its state is left to the caller's final `set`.
    pub fn raytrace(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        let (gx0, gy0) = self.world_to_grid(x0, y0);
        let (gx1, gy1) = self.world_to_grid(x1, y1);
        let step_cap = self.width.max(self.height) * 4;
        for (i, (gx, gy)) in bresenham_line(gx0, gy0, gx1, gy1).into_iter().enumerate() {
            if i >= step_cap {
                break;
            }
            if !self.in_map(gx, gy) {
                continue;
            }
            if self.get(gx, gy) != cell::OCCUPIED {
                self.set(gx, gy, cell::FREE);
            }
        }
    }

    /// Recompute the inflated grid from `raw`: every raw-occupied cell
    /// marks all cells within the inflation disk as occupied. Raw-occupied
    /// cells are always inflated-occupied, and an inflated cell is never
    /// downgraded to free once set.
    pub fn inflate_obstacles(&mut self) {
        self.inflated.copy_from_slice(&self.raw);
        let r = self.inflation_radius_cells;
        if r <= 0 {
            return;
        }
        let occupied_cells: Vec<(i32, i32)> = (0..self.height as i32)
            .flat_map(|gy| (0..self.width as i32).map(move |gx| (gx, gy)))
            .filter(|&(gx, gy)| self.raw[self.index(gx, gy)] == cell::OCCUPIED)
            .collect();

        for (ox, oy) in occupied_cells {
            for dy in -r..=r {
                for dx in -r..=r {
                    if (dx * dx + dy * dy) as f64 > (r * r) as f64 {
                        continue;
                    }
                    let (gx, gy) = (ox + dx, oy + dy);
                    if !self.in_map(gx, gy) {
                        continue;
                    }
                    let idx = self.index(gx, gy);
                    self.inflated[idx] = cell::OCCUPIED;
                }
            }
        }
    }

    /// Seed a free-space disk of `radius_cells` around the world point
    /// `(x, y)`, so the planning loop has frontiers to find at startup.
    pub fn seed_free_disk(&mut self, x: f64, y: f64, radius_cells: i32) {
        let (cx, cy) = self.world_to_grid(x, y);
        for dy in -radius_cells..=radius_cells {
            for dx in -radius_cells..=radius_cells {
                if dx * dx + dy * dy > radius_cells * radius_cells {
                    continue;
                }
                self.set(cx + dx, cy + dy, cell::FREE);
            }
        }
    }

    /// Area of free + occupied cells, in square meters.
    pub fn explored_area(&self) -> f64 {
        (self.counts.free + self.counts.occupied) as f64 * self.resolution * self.resolution
    }

    /// Zero both arrays and reset the running counts.
    pub fn reset(&mut self) {
        self.raw.fill(cell::UNKNOWN);
        self.inflated.fill(cell::UNKNOWN);
        self.counts = CellCounts {
            unknown: self.width * self.height,
            free: 0,
            occupied: 0,
        };
    }
}
