//! RankSumEstimator: the robust (L1-like) location estimator at the center
//! of each `Stepper` iteration (spec.md §4.2).
//!
//! Classical least-squares is sensitive to a handful of badly-misassociated
//! picks; the rank-sum estimator instead works on the *ranks* of weighted
//! residuals, which caps the influence of any single outlier. No reference
//! repo implements rank-sum estimation directly, so this follows spec.md
//! §4.2's description, expressed in the design-row idiom established by
//! [`crate::core::residual`].

use crate::core::residual::WeightedResidual;

/// Median, dispersion, and steepest-descent direction derived from a set of
/// weighted residuals.
#[derive(Debug, Clone)]
pub struct RankSumEstimator {
    dof: usize,
}

impl RankSumEstimator {
    pub fn new(dof: usize) -> Self {
        Self { dof }
    }

    /// Weighted median of `weight * residual` across all entries: the value
    /// `m` where the cumulative weight of entries below `m` first reaches
    /// half the total weight (spec.md §4.2).
    pub fn compute_median(&self, residuals: &[WeightedResidual]) -> f64 {
        if residuals.is_empty() {
            return 0.0;
        }
        let mut paired: Vec<(f64, f64)> = residuals
            .iter()
            .map(|r| (r.weighted_value(), r.weight))
            .collect();
        paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let total: f64 = paired.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let half = total / 2.0;
        let mut cumulative = 0.0;
        for (value, weight) in &paired {
            cumulative += weight;
            if cumulative >= half {
                return *value;
            }
        }
        paired.last().map(|(v, _)| *v).unwrap_or(0.0)
    }

    /// De-median the residual values in place, returning a new vector with
    /// the median subtracted from each weighted value (spec.md §4.2: the
    /// estimator operates on de-medianed residuals so the dispersion penalty
    /// is shift-invariant).
    pub fn de_median_residuals(&self, residuals: &[WeightedResidual], median: f64) -> Vec<f64> {
        residuals.iter().map(|r| r.weighted_value() - median).collect()
    }

    /// De-median the design matrix: subtracts the weighted column means from
    /// each design row, so the steepest-descent direction is computed from
    /// rows centered the same way `de_median_residuals` centers the residual
    /// values themselves (spec.md §4.2).
    pub fn de_median_design_matrix(&self, residuals: &[WeightedResidual]) -> Vec<[f64; 3]> {
        let total_weight: f64 = residuals.iter().map(|r| r.weight).sum();
        if residuals.is_empty() || total_weight <= 0.0 {
            return residuals.iter().map(|r| r.design_row).collect();
        }

        let mut means = [0.0f64; 3];
        for r in residuals {
            for (mean, value) in means.iter_mut().zip(r.design_row.iter()) {
                *mean += r.weight * value;
            }
        }
        for mean in means.iter_mut() {
            *mean /= total_weight;
        }

        residuals
            .iter()
            .map(|r| {
                let mut row = r.design_row;
                for (value, mean) in row.iter_mut().zip(means.iter()) {
                    *value -= mean;
                }
                row
            })
            .collect()
    }

    /// Rank-sum dispersion value: sum of the piecewise-linear penalty
    /// `rho(x) = |x|` applied to de-medianed weighted residuals, normalized
    /// by count. Monotone, odd-symmetric, convex — the same property a
    /// proper rank-sum rho function must have (spec.md §4.2).
    pub fn compute_dispersion_value(&self, de_medianed: &[f64]) -> f64 {
        if de_medianed.is_empty() {
            return 0.0;
        }
        let sum: f64 = de_medianed.iter().map(|x| x.abs()).sum();
        sum / de_medianed.len() as f64
    }

    /// Steepest-descent direction: rank-weighted sum of design rows,
    /// normalized to unit length. Ties in weighted residual value receive
    /// averaged ranks (spec.md §4.2's tie-break rule) so that repeated
    /// values don't bias the direction toward arbitrary tie order.
    pub fn comp_steepest_desc_dir(&self, residuals: &[WeightedResidual]) -> Vec<f64> {
        let n = residuals.len();
        if n == 0 {
            return vec![0.0; self.dof];
        }

        let design_rows = self.de_median_design_matrix(residuals);

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            residuals[a]
                .weighted_value()
                .partial_cmp(&residuals[b].weighted_value())
                .unwrap()
        });

        // Average ranks for tied weighted values, 1-indexed.
        let mut ranks = vec![0.0f64; n];
        let mut i = 0;
        while i < n {
            let mut j = i;
            while j + 1 < n
                && residuals[order[j + 1]].weighted_value() == residuals[order[i]].weighted_value()
            {
                j += 1;
            }
            let avg_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
            for slot in order.iter().take(j + 1).skip(i) {
                ranks[*slot] = avg_rank;
            }
            i = j + 1;
        }

        let centered_rank = |rank: f64| -> f64 { rank - (n as f64 + 1.0) / 2.0 };

        let mut direction = vec![0.0f64; self.dof];
        for (idx, design_row) in design_rows.iter().enumerate() {
            let weight = centered_rank(ranks[idx]);
            for (d, row_val) in direction.iter_mut().zip(design_row.iter().take(self.dof)) {
                *d += weight * row_val;
            }
        }

        let norm = direction.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 1e-12 {
            for d in direction.iter_mut() {
                *d /= norm;
            }
        }
        direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::residual::WeightedResidual;

    fn residual(value: f64, design_row: [f64; 3]) -> WeightedResidual {
        WeightedResidual::for_pick(0, value, 1.0, design_row)
    }

    #[test]
    fn median_of_symmetric_residuals_is_zero() {
        let estimator = RankSumEstimator::new(3);
        let residuals = vec![
            residual(-1.0, [1.0, 0.0, 0.0]),
            residual(0.0, [1.0, 0.0, 0.0]),
            residual(1.0, [1.0, 0.0, 0.0]),
        ];
        let median = estimator.compute_median(&residuals);
        assert!((median - 0.0).abs() < 1e-9);
    }

    #[test]
    fn median_respects_weights() {
        let estimator = RankSumEstimator::new(3);
        let residuals = vec![
            WeightedResidual::for_pick(0, 0.0, 10.0, [1.0, 0.0, 0.0]),
            WeightedResidual::for_pick(1, 5.0, 0.1, [1.0, 0.0, 0.0]),
        ];
        let median = estimator.compute_median(&residuals);
        assert!(median < 1.0, "heavy weight near zero should dominate median");
    }

    #[test]
    fn dispersion_is_zero_when_all_residuals_equal_median() {
        let estimator = RankSumEstimator::new(3);
        let residuals = vec![residual(2.0, [1.0, 0.0, 0.0]); 4];
        let median = estimator.compute_median(&residuals);
        let de_medianed = estimator.de_median_residuals(&residuals, median);
        let dispersion = estimator.compute_dispersion_value(&de_medianed);
        assert!(dispersion < 1e-9);
    }

    #[test]
    fn steepest_descent_direction_is_unit_length() {
        let estimator = RankSumEstimator::new(3);
        let residuals = vec![
            residual(-2.0, [1.0, 0.0, 0.0]),
            residual(1.0, [0.0, 1.0, 0.0]),
            residual(3.0, [0.0, 0.0, 1.0]),
        ];
        let direction = estimator.comp_steepest_desc_dir(&residuals);
        let norm: f64 = direction.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tied_residuals_receive_averaged_ranks_without_panicking() {
        let estimator = RankSumEstimator::new(2);
        let residuals = vec![
            residual(1.0, [1.0, 0.0, 0.0]),
            residual(1.0, [0.0, 1.0, 0.0]),
            residual(5.0, [1.0, 1.0, 0.0]),
        ];
        let direction = estimator.comp_steepest_desc_dir(&residuals);
        assert_eq!(direction.len(), 2);
    }
}
