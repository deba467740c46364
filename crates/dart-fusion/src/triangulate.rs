//! Pairwise and confidence-weighted line triangulation.

use log::debug;
use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use dart_fusion_core::{intersect_lines, BoardLine};

use crate::candidate::CameraCandidate;
use crate::config::FusionConfig;

/// Intersection of one camera pair in the board plane.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PairIntersection {
    /// Indices into the candidate slice.
    pub cameras: (usize, usize),
    pub point: Point2<f64>,
    /// Mean perpendicular distance from each camera's line to the other
    /// camera's tip. Zero when both tips sit exactly on the crossing.
    pub residual: f64,
}

/// Weighted least-squares fusion over all usable cameras.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightedFusion {
    pub point: Point2<f64>,
    /// Weight-averaged perpendicular distance from the point to each line.
    pub residual: f64,
    /// `(candidate index, weight)` for every included camera.
    pub weights: Vec<(usize, f64)>,
}

/// All pairwise intersections among the candidates at `indices`, excluding
/// near-parallel pairs and intersections far outside the board.
pub(crate) fn pair_intersections(
    candidates: &[CameraCandidate],
    indices: &[usize],
    cfg: &FusionConfig,
) -> Vec<PairIntersection> {
    let lines: Vec<(usize, BoardLine)> = indices
        .iter()
        .filter_map(|&i| candidates[i].line().map(|l| (i, l)))
        .collect();

    let mut out = Vec::new();
    for (a, &(i, ref la)) in lines.iter().enumerate() {
        for &(j, ref lb) in &lines[a + 1..] {
            let Some(point) = intersect_lines(la, lb, cfg.parallel_eps) else {
                continue;
            };
            if point.coords.norm() > cfg.max_intersection_radius {
                continue;
            }
            let residual = 0.5
                * (la.perp_distance(&candidates[j].tip) + lb.perp_distance(&candidates[i].tip));
            out.push(PairIntersection {
                cameras: (i, j),
                point,
                residual,
            });
        }
    }
    out
}

/// The pair with the lowest residual.
pub(crate) fn best_pair(pairs: &[PairIntersection]) -> Option<&PairIntersection> {
    pairs
        .iter()
        .min_by(|a, b| a.residual.total_cmp(&b.residual))
}

/// Weight assigned to a camera for the weighted solve, or `None` when the
/// camera is excluded outright.
fn fusion_weight(confidence: f64, cfg: &FusionConfig) -> Option<f64> {
    if confidence >= cfg.weighted_min_confidence {
        Some(confidence.min(cfg.weight_cap))
    } else if cfg.soft_include_weak && confidence > 0.0 {
        Some((confidence * cfg.soft_include_scale).min(cfg.weight_cap))
    } else {
        None
    }
}

/// Confidence-weighted least-squares intersection: the point minimizing
/// `Σ wᵢ · d⊥(x, lineᵢ)²`, solved from the 2×2 normal equations
/// `Σ wᵢ nᵢnᵢᵀ x = Σ wᵢ nᵢnᵢᵀ pᵢ` with `nᵢ` the unit normal of line `i`.
///
/// Returns `None` when fewer than two cameras carry weight or the system is
/// singular (all weighted lines parallel).
pub(crate) fn weighted_fusion(
    candidates: &[CameraCandidate],
    indices: &[usize],
    cfg: &FusionConfig,
) -> Option<WeightedFusion> {
    let mut weights = Vec::new();
    let mut a = Matrix2::<f64>::zeros();
    let mut b = Vector2::<f64>::zeros();

    for &i in indices {
        let cand = &candidates[i];
        let Some(w) = fusion_weight(cand.confidence, cfg) else {
            continue;
        };
        let Some(line) = cand.line() else {
            continue;
        };
        let n = Vector2::new(-line.dir.y, line.dir.x);
        let nn = n * n.transpose();
        a += nn * w;
        b += nn * w * cand.tip.coords;
        weights.push((i, w));
    }

    if weights.len() < 2 {
        return None;
    }
    let solution = a.lu().solve(&b)?;
    let point = Point2::from(solution);
    if !point.coords.iter().all(|v| v.is_finite()) {
        debug!("weighted fusion produced a non-finite point, discarding");
        return None;
    }

    let residual = residual_at(&point, candidates, &weights);
    Some(WeightedFusion {
        point,
        residual,
        weights,
    })
}

/// Weight-averaged perpendicular distance from `point` to each weighted line.
pub(crate) fn residual_at(
    point: &Point2<f64>,
    candidates: &[CameraCandidate],
    weights: &[(usize, f64)],
) -> f64 {
    let mut sum = 0.0;
    let mut total = 0.0;
    for &(i, w) in weights {
        if let Some(line) = candidates[i].line() {
            sum += w * line.perp_distance(point);
            total += w;
        }
    }
    if total > 0.0 {
        sum / total
    } else {
        0.0
    }
}
