use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// An infinite line in the board plane, anchored at a camera's warped tip
/// and directed along the warped barrel axis (barrel → tip).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoardLine {
    pub anchor: Point2<f64>,
    pub dir: Vector2<f64>,
}

impl BoardLine {
    /// Build a line, normalizing the direction. Returns `None` for a
    /// degenerate (near-zero) direction vector.
    pub fn new(anchor: Point2<f64>, dir: Vector2<f64>) -> Option<Self> {
        let n = dir.norm();
        if n < 1e-12 {
            return None;
        }
        Some(Self {
            anchor,
            dir: dir / n,
        })
    }

    /// Perpendicular distance from `p` to this line.
    #[inline]
    pub fn perp_distance(&self, p: &Point2<f64>) -> f64 {
        let to_p = p - self.anchor;
        (self.dir.x * to_p.y - self.dir.y * to_p.x).abs()
    }

    /// Point at signed parameter `t` along the direction.
    #[inline]
    pub fn at(&self, t: f64) -> Point2<f64> {
        self.anchor + self.dir * t
    }
}

/// Intersect two lines. Returns `None` when the directions are parallel
/// within `parallel_eps` (the magnitude of the 2D cross product of the unit
/// directions, i.e. the sine of the angle between them).
pub fn intersect_lines(a: &BoardLine, b: &BoardLine, parallel_eps: f64) -> Option<Point2<f64>> {
    let cross = a.dir.x * b.dir.y - a.dir.y * b.dir.x;
    if cross.abs() < parallel_eps {
        return None;
    }
    let d = b.anchor - a.anchor;
    let t = (d.x * b.dir.y - d.y * b.dir.x) / cross;
    Some(a.at(t))
}
