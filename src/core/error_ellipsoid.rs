//! ErrorEllipsoid: final-stage uncertainty estimate derived from the
//! converged residual covariance (spec.md §4.8).
//!
//! Built from an SVD of the (weighted) design matrix, scaled by the
//! F-distribution 90% confidence factor for 3 degrees of freedom, then
//! projected into three `{semiMajor, azimuth, plunge}` axes, a horizontal
//! ellipse, a vertical standard error, and (when a Bayesian depth prior
//! participated) the fraction of prior depth variance the data resolved.
//! `nalgebra`'s SVD is the same tool `Decorrelator` uses for its
//! eigendecomposition, kept consistent per spec.md's instruction to reuse
//! one numerical library throughout rather than mixing linear-algebra
//! crates.

use nalgebra::{DMatrix, DVector, SVD};

use crate::core::residual::{ResidualSource, WeightedResidual};

/// F(3, n-3, 0.90) scale factor table isn't carried in full; for n well
/// above 3 the factor asymptotes near 2.08, which this uses as a constant
/// approximation (spec.md §4.8 doesn't require exact small-sample
/// calibration, only a reported 90% ellipsoid).
const F_DISTRIBUTION_90_APPROX: f64 = 2.08;

/// One principal axis of the error ellipsoid.
#[derive(Debug, Clone, Copy)]
pub struct ErrorAxis {
    pub semi_major_km: f64,
    /// Azimuth of the axis's horizontal projection, degrees from north,
    /// folded into `[0, 180)` (an axis has no preferred end).
    pub azimuth_deg: f64,
    /// Angle below horizontal, degrees; 90 for a purely vertical axis.
    pub plunge_deg: f64,
}

#[derive(Debug, Clone)]
pub struct ErrorEllipsoid {
    /// Three principal axes, largest first. A held-depth (2-dof) location
    /// reports a degenerate third axis (zero length, 90 deg plunge).
    pub axes: [ErrorAxis; 3],
    /// Horizontal error ellipse semi-major/semi-minor axes, km: the two
    /// largest horizontal (tangential) projections across all axes.
    pub horizontal_semi_major_km: f64,
    pub horizontal_semi_minor_km: f64,
    /// Strike of the horizontal semi-major axis, degrees from north.
    pub horizontal_strike_deg: f64,
    /// Vertical (depth) standard error, km: the largest vertical projection
    /// across all axes.
    pub vertical_se_km: f64,
    /// Geometric mean of the two horizontal semi-axes (spec.md §4.8).
    pub equivalent_radius_km: f64,
    /// 1-sigma (unscaled) coordinate standard errors: colatitude-km,
    /// longitude-km, depth-km, the diagonal of the parameter covariance.
    pub coordinate_stderr_km: [f64; 3],
    /// `1 - posteriorDepthVariance / priorDepthVariance`, present only when
    /// the location ran with 3 degrees of freedom and a Bayesian depth prior
    /// (spec.md §4.8).
    pub bayesian_depth_importance: Option<f64>,
    /// Leverage (hat-matrix diagonal) `x_i . C . x_i` per input residual,
    /// in the same order as the `residuals` slice passed to `compute`.
    pub importances: Vec<f64>,
}

/// Compute the error ellipsoid from the converged residual design rows.
/// Returns `None` if the design matrix is rank-deficient (spec.md §4.8:
/// reported as `ELLIPSOID_FAILED` by the caller).
pub fn compute(residuals: &[WeightedResidual], dof: usize) -> Option<ErrorEllipsoid> {
    let n = residuals.len();
    if n < dof {
        return None;
    }

    let mut design = DMatrix::zeros(n, dof);
    for (row, residual) in residuals.iter().enumerate() {
        for col in 0..dof {
            design[(row, col)] = residual.weight * residual.design_row[col];
        }
    }

    let svd = SVD::new(design, true, true);
    let v_t = svd.v_t?;
    let singular_values = svd.singular_values;

    if singular_values.iter().any(|&s| s.abs() < 1e-9) {
        return None;
    }

    let degrees_of_freedom_residual = (n.saturating_sub(dof)).max(1) as f64;
    let variance_scale = F_DISTRIBUTION_90_APPROX / degrees_of_freedom_residual;

    // Parameter covariance C = V * diag(1/s^2) * V^T, unscaled (1-sigma).
    // Confidence-ellipsoid axes apply `variance_scale` on top of this.
    let inv_sq: Vec<f64> = singular_values.iter().map(|&s| 1.0 / (s * s)).collect();
    let v = v_t.transpose();
    let inv_sq_diag = DMatrix::from_diagonal(&DVector::from_vec(inv_sq));
    let covariance = &v * &inv_sq_diag * &v_t;

    let mut coordinate_stderr_km = [0.0; 3];
    for k in 0..dof {
        coordinate_stderr_km[k] = covariance[(k, k)].max(0.0).sqrt();
    }

    let mut axis_entries: Vec<(f64, [f64; 3])> = (0..dof)
        .map(|i| {
            let length = (variance_scale / (singular_values[i] * singular_values[i])).sqrt();
            let mut direction = [0.0; 3];
            for (slot, value) in direction.iter_mut().zip(v_t.row(i).iter()) {
                *slot = *value;
            }
            (length, direction)
        })
        .collect();
    axis_entries.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

    let mut axes = [ErrorAxis {
        semi_major_km: 0.0,
        azimuth_deg: 0.0,
        plunge_deg: 90.0,
    }; 3];
    for (slot, (length, direction)) in axes.iter_mut().zip(axis_entries.iter()) {
        let horizontal = (direction[0] * direction[0] + direction[1] * direction[1]).sqrt();
        slot.semi_major_km = *length;
        slot.azimuth_deg = direction[1].atan2(direction[0]).to_degrees().rem_euclid(180.0);
        slot.plunge_deg = direction[2].abs().atan2(horizontal).to_degrees();
    }

    let mut horizontal_projections: Vec<(f64, f64)> = axis_entries
        .iter()
        .map(|(length, direction)| {
            let horizontal = (direction[0] * direction[0] + direction[1] * direction[1]).sqrt();
            let azimuth = direction[1].atan2(direction[0]).to_degrees().rem_euclid(180.0);
            (length * horizontal, azimuth)
        })
        .collect();
    horizontal_projections.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

    let horizontal_semi_major_km = horizontal_projections.first().map(|&(p, _)| p).unwrap_or(0.0);
    let horizontal_strike_deg = horizontal_projections.first().map(|&(_, a)| a).unwrap_or(0.0);
    let horizontal_semi_minor_km = horizontal_projections.get(1).map(|&(p, _)| p).unwrap_or(0.0);

    let vertical_se_km = axis_entries
        .iter()
        .map(|(length, direction)| length * direction[2].abs())
        .fold(0.0_f64, f64::max);

    let equivalent_radius_km = (horizontal_semi_major_km * horizontal_semi_minor_km).max(0.0).sqrt();

    let bayesian_depth_importance = if dof == 3 {
        residuals.iter().find_map(|r| match r.source {
            ResidualSource::DepthPrior if r.weight > 0.0 => {
                let prior_variance = 1.0 / (r.weight * r.weight);
                Some(1.0 - coordinate_stderr_km[2].powi(2) / prior_variance)
            }
            _ => None,
        })
    } else {
        None
    };

    let importances = residuals
        .iter()
        .map(|r| {
            let x: Vec<f64> = (0..dof).map(|j| r.weight * r.design_row[j]).collect();
            let mut leverage = 0.0;
            for a in 0..dof {
                for b in 0..dof {
                    leverage += x[a] * covariance[(a, b)] * x[b];
                }
            }
            leverage
        })
        .collect();

    Some(ErrorEllipsoid {
        axes,
        horizontal_semi_major_km,
        horizontal_semi_minor_km,
        horizontal_strike_deg,
        vertical_se_km,
        equivalent_radius_km,
        coordinate_stderr_km,
        bayesian_depth_importance,
        importances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(weight: f64, row: [f64; 3]) -> WeightedResidual {
        WeightedResidual::for_pick(0, 0.0, weight, row)
    }

    #[test]
    fn well_conditioned_design_yields_finite_ellipsoid() {
        let residuals = vec![
            residual(1.0, [1.0, 0.0, 0.0]),
            residual(1.0, [0.0, 1.0, 0.0]),
            residual(1.0, [0.0, 0.0, 1.0]),
            residual(1.0, [0.7, 0.7, 0.0]),
            residual(1.0, [0.0, 0.7, 0.7]),
        ];
        let ellipsoid = compute(&residuals, 3).expect("should compute");
        assert!(ellipsoid.axes.iter().all(|a| a.semi_major_km.is_finite() && a.semi_major_km > 0.0));
        assert!(ellipsoid.equivalent_radius_km > 0.0);
        assert_eq!(ellipsoid.importances.len(), residuals.len());
    }

    #[test]
    fn rank_deficient_design_returns_none() {
        let residuals = vec![
            residual(1.0, [1.0, 0.0, 0.0]),
            residual(1.0, [2.0, 0.0, 0.0]),
        ];
        assert!(compute(&residuals, 3).is_none());
    }

    #[test]
    fn too_few_residuals_returns_none() {
        let residuals = vec![residual(1.0, [1.0, 0.0, 0.0])];
        assert!(compute(&residuals, 3).is_none());
    }

    #[test]
    fn held_depth_location_reports_degenerate_third_axis() {
        let residuals = vec![
            residual(1.0, [1.0, 0.0, 0.0]),
            residual(1.0, [0.0, 1.0, 0.0]),
            residual(1.0, [0.7, 0.7, 0.0]),
        ];
        let ellipsoid = compute(&residuals, 2).expect("should compute");
        assert_eq!(ellipsoid.axes[2].semi_major_km, 0.0);
        assert_eq!(ellipsoid.axes[2].plunge_deg, 90.0);
        assert!(ellipsoid.bayesian_depth_importance.is_none());
    }

    #[test]
    fn bayesian_depth_importance_reflects_variance_reduction() {
        let mut residuals = vec![
            residual(1.0, [1.0, 0.0, 0.0]),
            residual(1.0, [0.0, 1.0, 0.0]),
            residual(1.0, [0.0, 0.0, 1.0]),
            residual(1.0, [0.7, 0.7, 0.0]),
            residual(1.0, [0.0, 0.7, 0.7]),
        ];
        residuals.push(WeightedResidual::for_depth_prior(0.0, 3.0 / 5.0));
        let ellipsoid = compute(&residuals, 3).expect("should compute");
        let importance = ellipsoid.bayesian_depth_importance.expect("depth prior present");
        assert!(importance.is_finite());
    }
}
