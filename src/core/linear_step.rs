//! LinearStep: the trial-step line search run after `RankSumEstimator`
//! produces a descent direction (spec.md §4.5).
//!
//! Rather than trusting a single linearized step length, the locator
//! evaluates dispersion at a handful of trial lengths along the descent
//! direction and bisects toward the best one, capped at `MAX_BISECT`
//! iterations. This is the same bracket-and-bisect shape as the damping
//! loop in `Stepper`, just applied to step length instead of step size.

use crate::core::config::MAX_BISECT;
use crate::core::rank_sum::RankSumEstimator;
use crate::core::residual::WeightedResidual;

/// Result of a completed line search.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub accepted_length: f64,
    pub median_residual: f64,
    pub dispersion: f64,
}

/// Evaluates dispersion along a fixed direction as a function of trial
/// residuals supplied by the caller (`Stepper` owns the actual geometry
/// update; `LinearStep` only knows how to search a 1-D dispersion curve).
pub struct LinearStep {
    dof: usize,
}

impl LinearStep {
    pub fn new(dof: usize) -> Self {
        Self { dof }
    }

    /// Search for the step length minimizing dispersion, given a closure
    /// that re-evaluates residuals at a trial step length. `initial_length`
    /// is the first trial; `max_length` bounds the search per the active
    /// stage's `max_step_length`.
    ///
    /// The search takes an initial step, and so long as dispersion keeps
    /// decreasing, doubles the trial length (capped at `max_length`). Once a
    /// trial increases dispersion, it bisects between the last accepted
    /// length and the failing one until the bracket narrows below
    /// `MAX_BISECT` iterations or a relative tolerance.
    pub fn search(
        &self,
        initial_length: f64,
        max_length: f64,
        mut evaluate: impl FnMut(f64) -> Vec<WeightedResidual>,
    ) -> StepOutcome {
        let estimator = RankSumEstimator::new(self.dof);
        let dispersion_at = |residuals: &[WeightedResidual], estimator: &RankSumEstimator| -> (f64, f64) {
            let median = estimator.compute_median(residuals);
            let de_medianed = estimator.de_median_residuals(residuals, median);
            (median, estimator.compute_dispersion_value(&de_medianed))
        };

        let zero_residuals = evaluate(0.0);
        let (zero_median, zero_dispersion) = dispersion_at(&zero_residuals, &estimator);

        let mut best_length = 0.0;
        let mut best_median = zero_median;
        let mut best_dispersion = zero_dispersion;

        let mut trial_length = initial_length.abs().min(max_length).max(1e-6);
        let mut lower = 0.0;
        let mut upper = None;

        for _ in 0..MAX_BISECT {
            let residuals = evaluate(trial_length);
            let (median, dispersion) = dispersion_at(&residuals, &estimator);

            if dispersion < best_dispersion {
                best_length = trial_length;
                best_median = median;
                best_dispersion = dispersion;
                lower = trial_length;
                match upper {
                    None => {
                        let doubled = trial_length * 2.0;
                        if doubled >= max_length {
                            break;
                        }
                        trial_length = doubled;
                    }
                    Some(u) => {
                        trial_length = (trial_length + u) / 2.0;
                    }
                }
            } else {
                upper = Some(trial_length);
                trial_length = (lower + trial_length) / 2.0;
            }

            if let Some(u) = upper {
                if (u - lower).abs() < 1e-3 {
                    break;
                }
            }
        }

        StepOutcome {
            accepted_length: best_length,
            median_residual: best_median,
            dispersion: best_dispersion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A synthetic 1-D dispersion bowl: minimum at `length == 10.0`.
    fn bowl_residuals(length: f64) -> Vec<WeightedResidual> {
        let offset = (length - 10.0).abs();
        vec![WeightedResidual::for_pick(0, offset, 1.0, [1.0, 0.0, 0.0])]
    }

    #[test]
    fn search_converges_toward_dispersion_minimum() {
        let search = LinearStep::new(3);
        let outcome = search.search(1.0, 50.0, bowl_residuals);
        assert!(
            (outcome.accepted_length - 10.0).abs() < 2.0,
            "expected near 10.0, got {}",
            outcome.accepted_length
        );
    }

    #[test]
    fn search_never_exceeds_max_length() {
        let search = LinearStep::new(3);
        let outcome = search.search(5.0, 8.0, bowl_residuals);
        assert!(outcome.accepted_length <= 8.0 + 1e-6);
    }

    #[test]
    fn search_stays_at_zero_when_no_improvement_exists() {
        let search = LinearStep::new(3);
        let flat = |_len: f64| vec![WeightedResidual::for_pick(0, 1.0, 1.0, [1.0, 0.0, 0.0])];
        let outcome = search.search(1.0, 10.0, flat);
        assert_eq!(outcome.accepted_length, 0.0);
    }
}
