use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::angle::normalize_angle;

/// Polar form of a board-plane point.
///
/// `theta` is radians counter-clockwise from the +x axis; the segment-20
/// wedge sits at the top of the board (π/2) for a standard calibration.
/// `radius` is in normalized units (1.0 = outer double edge).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarCoord {
    pub radius: f64,
    pub theta: f64,
}

impl PolarCoord {
    pub fn new(radius: f64, theta: f64) -> Self {
        Self {
            radius,
            theta: normalize_angle(theta),
        }
    }

    pub fn from_cartesian(p: &Point2<f64>) -> Self {
        Self {
            radius: p.coords.norm(),
            theta: normalize_angle(p.y.atan2(p.x)),
        }
    }

    pub fn to_cartesian(self) -> Point2<f64> {
        Point2::new(self.radius * self.theta.cos(), self.radius * self.theta.sin())
    }

    /// Same radius, different angle.
    pub fn with_theta(self, theta: f64) -> Self {
        Self::new(self.radius, theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn round_trip() {
        let p = Point2::new(-0.3, 0.72);
        let back = PolarCoord::from_cartesian(&p).to_cartesian();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn top_of_board_is_half_pi() {
        let polar = PolarCoord::from_cartesian(&Point2::new(0.0, 0.8));
        assert_relative_eq!(polar.theta, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(polar.radius, 0.8, epsilon = 1e-12);
    }
}
