//! Decorrelator: projects correlated pick residuals onto an independent
//! basis before the rank-sum estimator runs (spec.md §4.3).
//!
//! Picks at nearby stations share travel-time model error, which correlates
//! their residuals and lets a cluster of stations outvote a genuinely better
//! solution. The decorrelator builds an empirical covariance from the design
//! rows, keeps the eigenvectors covering `COVARIANCE_COVERAGE` of the
//! variance, and projects the residual vector onto that basis — weighting
//! each projected component by `sqrt(eigenvalue)`. `nalgebra`'s symmetric
//! eigendecomposition is the corpus's idiomatic tool for this (the orbit-
//! determination and geodesy repos in the reference pack use it for the
//! same class of problem).

use nalgebra::{DMatrix, SymmetricEigen};

use crate::core::config::COVARIANCE_COVERAGE;
use crate::core::residual::{ResidualSource, WeightedResidual};

/// Eigen-basis retained from a `Decorrelator::build` call.
pub struct Decorrelator {
    /// Retained eigenvectors, one column each, ordered by descending
    /// eigenvalue.
    basis: DMatrix<f64>,
    eigenvalues: Vec<f64>,
}

impl Decorrelator {
    /// Build the decorrelation basis from the design-row covariance of
    /// `residuals`, retaining eigenvectors until their cumulative share of
    /// total variance reaches `COVARIANCE_COVERAGE`.
    pub fn build(residuals: &[WeightedResidual]) -> Self {
        let n = residuals.len();
        if n == 0 {
            return Self {
                basis: DMatrix::zeros(0, 0),
                eigenvalues: Vec::new(),
            };
        }

        let mut design = DMatrix::zeros(n, 3);
        for (i, r) in residuals.iter().enumerate() {
            for (j, v) in r.design_row.iter().enumerate() {
                design[(i, j)] = r.weight * *v;
            }
        }

        let covariance = &design * design.transpose();
        let eigen = SymmetricEigen::new(covariance);

        let mut pairs: Vec<(f64, usize)> = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(i, &v)| (v.max(0.0), i))
            .collect();
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        let total: f64 = pairs.iter().map(|(v, _)| v).sum();
        let mut retained = Vec::new();
        let mut cumulative = 0.0;
        for (value, idx) in &pairs {
            retained.push((*value, *idx));
            cumulative += value;
            if total <= 0.0 || cumulative / total >= COVARIANCE_COVERAGE {
                break;
            }
        }

        let mut basis = DMatrix::zeros(n, retained.len());
        let mut eigenvalues = Vec::with_capacity(retained.len());
        for (col, (value, idx)) in retained.iter().enumerate() {
            basis.set_column(col, &eigen.eigenvectors.column(*idx));
            eigenvalues.push(*value);
        }

        Self { basis, eigenvalues }
    }

    pub fn retained_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Project `residuals` onto the retained basis, producing one
    /// `WeightedResidual` per retained component. Each projected residual's
    /// weight is `sqrt(eigenvalue)`, per spec.md §4.3; its design row is the
    /// weight-projected combination of the original design rows. The depth
    /// prior, if present, passes through untouched — decorrelation only
    /// applies to pick-derived residuals which may share model error.
    pub fn project(&self, residuals: &[WeightedResidual]) -> Vec<WeightedResidual> {
        let pick_only: Vec<&WeightedResidual> = residuals
            .iter()
            .filter(|r| !r.is_depth_prior())
            .collect();

        let mut projected = Vec::with_capacity(self.retained_components() + 1);
        for (component, &eigenvalue) in self.eigenvalues.iter().enumerate() {
            let mut value = 0.0;
            let mut design_row = [0.0f64; 3];
            for (row, residual) in pick_only.iter().enumerate() {
                let loading = self.basis.get((row, component)).copied().unwrap_or(0.0);
                value += loading * residual.weighted_value();
                for (d, v) in design_row.iter_mut().zip(residual.design_row.iter()) {
                    *d += loading * residual.weight * v;
                }
            }
            let weight = eigenvalue.sqrt().max(1e-9);
            projected.push(WeightedResidual {
                source: ResidualSource::Pick { index: component },
                residual: value / weight,
                weight,
                design_row,
                sort_key: value,
            });
        }

        if let Some(prior) = residuals.iter().find(|r| r.is_depth_prior()) {
            projected.push(prior.clone());
        }

        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(index: usize, value: f64, weight: f64, row: [f64; 3]) -> WeightedResidual {
        WeightedResidual::for_pick(index, value, weight, row)
    }

    #[test]
    fn empty_input_yields_no_basis() {
        let decorrelator = Decorrelator::build(&[]);
        assert_eq!(decorrelator.retained_components(), 0);
    }

    #[test]
    fn orthogonal_design_rows_retain_all_components() {
        let residuals = vec![
            residual(0, 1.0, 1.0, [1.0, 0.0, 0.0]),
            residual(1, 2.0, 1.0, [0.0, 1.0, 0.0]),
            residual(2, 3.0, 1.0, [0.0, 0.0, 1.0]),
        ];
        let decorrelator = Decorrelator::build(&residuals);
        assert!(decorrelator.retained_components() >= 1);
        let projected = decorrelator.project(&residuals);
        assert_eq!(projected.len(), decorrelator.retained_components());
    }

    #[test]
    fn depth_prior_passes_through_projection_unchanged() {
        let mut residuals = vec![residual(0, 1.0, 1.0, [1.0, 0.0, 0.0])];
        residuals.push(WeightedResidual::for_depth_prior(4.0, 0.6));
        let decorrelator = Decorrelator::build(&residuals);
        let projected = decorrelator.project(&residuals);
        let prior = projected.iter().find(|r| r.is_depth_prior()).unwrap();
        assert_eq!(prior.residual, 4.0);
        assert_eq!(prior.weight, 0.6);
    }
}
