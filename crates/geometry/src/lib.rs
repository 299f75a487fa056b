//! 2D geometry primitives shared by the grid, frontier, and scorer crates.
//!
//! Everything here is a pure free function over `f64` coordinates or grid
//! indices so the occupancy grid, frontier detector, and goal scorer share
//! one implementation instead of three.

use nalgebra::Vector2;

/// Euclidean distance between two points.
pub fn distance(x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    let d = Vector2::new(x1 - x0, y1 - y0);
    d.norm()
}

/// Enumerate integer grid cells along the line from `(x0, y0)` to
/// `(x1, y1)` using Bresenham's algorithm. The start cell is included;
/// the end cell is included. Callers that need "up to but not including
/// the endpoint" should drop the last element themselves.
pub fn bresenham_line(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
    let mut cells = Vec::new();
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        cells.push((x, y));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

/// Ray-casting point-in-polygon test. `polygon` is a closed ring given as
/// an ordered list of vertices (it need not repeat the first vertex at
/// the end). Points exactly on an edge are not guaranteed to return
/// `true` or `false` consistently, which matches the standard even-odd
/// rule caveat.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[(f64, f64)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        let intersects = ((yi > y) != (yj > y))
            && (x < (xj - xi) * (y - yi) / (yj - yi) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Signed area of a closed polygon via the shoelace formula. Positive for
/// counter-clockwise vertex order, negative for clockwise.
pub fn polygon_signed_area(polygon: &[(f64, f64)]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let n = polygon.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x0, y0) = polygon[i];
        let (x1, y1) = polygon[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    sum * 0.5
}

/// Unsigned polygon area, vertex order independent.
pub fn polygon_area(polygon: &[(f64, f64)]) -> f64 {
    polygon_signed_area(polygon).abs()
}
