//! Circular (wraparound-safe) angle arithmetic.
//!
//! Angles are radians, counter-clockwise, normalized to `[0, 2π)`. All
//! averaging goes through summed unit vectors; naive arithmetic means are
//! wrong at the 0/2π seam and must not be used anywhere in the cascade.

use std::f64::consts::{PI, TAU};

/// Normalize an angle to `[0, 2π)`.
#[inline]
pub fn normalize_angle(theta: f64) -> f64 {
    let r = theta.rem_euclid(TAU);
    if r.is_nan() {
        0.0
    } else {
        r
    }
}

/// Signed circular difference `a - b`, wrapped to `(-π, π]`.
#[inline]
pub fn circular_diff(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TAU);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Weighted circular mean of `(theta, weight)` pairs.
///
/// Returns `None` when the weights cancel out (empty input or an exactly
/// balanced antipodal set), which callers must treat as "no direction".
pub fn circular_mean(samples: &[(f64, f64)]) -> Option<f64> {
    let mut sx = 0.0;
    let mut sy = 0.0;
    for &(theta, w) in samples {
        if w <= 0.0 {
            continue;
        }
        sx += w * theta.cos();
        sy += w * theta.sin();
    }
    if sx.hypot(sy) < 1e-12 {
        return None;
    }
    Some(normalize_angle(sy.atan2(sx)))
}

/// Minimal arc containing all angles, in radians (0 for fewer than 2 samples).
///
/// Computed as `2π - largest gap` between circularly sorted samples, so a
/// tight cluster straddling the seam still reports a small spread.
pub fn circular_spread(angles: &[f64]) -> f64 {
    if angles.len() < 2 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = angles.iter().map(|&a| normalize_angle(a)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut max_gap = sorted[0] + TAU - sorted[sorted.len() - 1];
    for pair in sorted.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > max_gap {
            max_gap = gap;
        }
    }
    TAU - max_gap
}

/// Circular standard deviation around the unweighted circular mean.
pub fn circular_std(angles: &[f64]) -> f64 {
    if angles.len() < 2 {
        return 0.0;
    }
    let samples: Vec<(f64, f64)> = angles.iter().map(|&a| (a, 1.0)).collect();
    let Some(mean) = circular_mean(&samples) else {
        return 0.0;
    };
    let sum_sq: f64 = angles
        .iter()
        .map(|&a| {
            let d = circular_diff(a, mean);
            d * d
        })
        .sum();
    (sum_sq / angles.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn deg(d: f64) -> f64 {
        d.to_radians()
    }

    #[test]
    fn mean_handles_seam() {
        // 359 deg and 1 deg must average to 0 deg, not 180.
        let m = circular_mean(&[(deg(359.0), 1.0), (deg(1.0), 1.0)]).unwrap();
        assert!(m < deg(0.5) || m > deg(359.5), "mean was {} rad", m);
    }

    #[test]
    fn mean_respects_weights() {
        let m = circular_mean(&[(deg(0.0), 3.0), (deg(90.0), 1.0)]).unwrap();
        assert!(m > deg(0.0) && m < deg(45.0));
    }

    #[test]
    fn mean_of_balanced_antipodes_is_none() {
        assert!(circular_mean(&[(0.0, 1.0), (PI, 1.0)]).is_none());
        assert!(circular_mean(&[]).is_none());
    }

    #[test]
    fn diff_wraps() {
        assert_relative_eq!(circular_diff(deg(1.0), deg(359.0)), deg(2.0), epsilon = 1e-12);
        assert_relative_eq!(circular_diff(deg(359.0), deg(1.0)), deg(-2.0), epsilon = 1e-12);
        assert_relative_eq!(circular_diff(deg(180.0), 0.0), PI, epsilon = 1e-12);
    }

    #[test]
    fn spread_across_seam_is_small() {
        let s = circular_spread(&[deg(358.0), deg(1.0), deg(3.0)]);
        assert_relative_eq!(s, deg(5.0), epsilon = 1e-9);
    }

    #[test]
    fn spread_of_wide_set() {
        let s = circular_spread(&[0.0, deg(120.0), deg(240.0)]);
        assert_relative_eq!(s, deg(240.0), epsilon = 1e-9);
    }

    #[test]
    fn std_of_tight_cluster() {
        let s = circular_std(&[deg(359.0), deg(0.0), deg(1.0)]);
        assert!(s < deg(1.0));
    }
}
