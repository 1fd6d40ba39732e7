//! Stepper: drives one iteration of one `LocationLoop` stage (spec.md §4.6,
//! §9).
//!
//! Each call to [`Stepper::make_step`] snapshots the hypocenter, identifies
//! phases, computes a rank-sum direction and a line-search step length, and
//! applies it — backing off ("damping") the step length if it makes things
//! worse, restoring the snapshot between attempts. The state names in
//! spec.md §9 (`entering, stepped, damping, converged, failed`) are recorded
//! directly in `HypoAudit::status` rather than kept as a separate enum, so
//! the audit trail narrates the run without a parallel bookkeeping type.

use crate::core::audit::HypoAudit;
use crate::core::config::{StageConfig, MIN_STATIONS};
use crate::core::craton::CratonMap;
use crate::core::decorrelator::Decorrelator;
use crate::core::error::ExitCode;
use crate::core::event::Event;
use crate::core::linear_step::LinearStep;
use crate::core::phase_id::{IdentificationWeights, PhaseID};
use crate::core::rank_sum::RankSumEstimator;
use crate::core::residual::{self, WeightedResidual};
use crate::core::travel_time::{SessionCache, TravelTimeService};
use crate::core::zone_stats::ZoneStats;

/// Depth tolerance, km, before the travel-time session cache rebuilds.
const SESSION_DEPTH_TOLERANCE_KM: f64 = 2.0;

/// Dampening schedule from spec.md §9's Open Question decision: the first
/// attempt uses the full accepted length; each retry halves it, clamped to
/// `[0.1, 0.5]` of the originally accepted length so damping never vanishes
/// to zero nor fails to shrink the step.
fn compute_dampening_factor(damping_count: u32) -> f64 {
    if damping_count == 0 {
        return 1.0;
    }
    let raw = 1.0 / (1u32 << damping_count.min(8)) as f64;
    raw.clamp(0.1, 0.5)
}

pub struct Stepper<'a, S: TravelTimeService> {
    pub earth_model: String,
    pub travel_time: &'a mut SessionCache<S>,
    pub craton_map: &'a CratonMap,
    pub zone_stats: &'a ZoneStats,
}

impl<'a, S: TravelTimeService> Stepper<'a, S> {
    pub fn new(
        earth_model: impl Into<String>,
        travel_time: &'a mut SessionCache<S>,
        craton_map: &'a CratonMap,
        zone_stats: &'a ZoneStats,
    ) -> Self {
        Self {
            earth_model: earth_model.into(),
            travel_time,
            craton_map,
            zone_stats,
        }
    }

    /// Determine whether the current hypocenter sits in a tectonically
    /// stable craton, and (unless the analyst fixed the depth manually)
    /// refresh the Bayesian depth prior from `ZoneStats`.
    pub fn set_environment(&self, event: &mut Event) {
        let lat = event.hypocenter.latitude;
        let lon = event.hypocenter.longitude;
        event.is_tectonic = !self.craton_map.inside_any_craton(lat, lon);

        if !event.depth_manual {
            match self.zone_stats.depth_prior(lat, lon) {
                Some(prior) => {
                    event.hypocenter.bayes_depth = Some(prior.mean_depth);
                    event.hypocenter.bayes_spread = Some(prior.spread);
                }
                None => {
                    event.hypocenter.bayes_depth = None;
                    event.hypocenter.bayes_spread = None;
                }
            }
        }
    }

    /// Run `PhaseID` across every station group, then assemble the weighted
    /// residual vector (picks, optionally decorrelated, plus the depth
    /// prior). Returns `(phase_changed, exit_code)`; `exit_code` is
    /// `InsufficientData` if fewer than `MIN_STATIONS` stations remain
    /// active after identification, in which case residuals are left empty.
    pub fn internal_phase_id(&mut self, event: &mut Event, stage: &StageConfig) -> (bool, Option<ExitCode>) {
        let weights = IdentificationWeights {
            other_weight: stage.other_weight,
            sticky_weight: stage.sticky_weight,
        };

        let mut any_changed = false;
        let colat = event.hypocenter.colatitude();
        let lon = event.hypocenter.longitude;
        let depth = event.hypocenter.depth;
        let tectonic = event.is_tectonic;
        let earth_model = self.earth_model.clone();

        let group_indices: Vec<usize> = (0..event.groups.len()).collect();
        for gi in group_indices {
            let (distance, azimuth, elevation) = {
                let group = &event.groups[gi];
                (group.distance_deg, group.azimuth_deg, group.station.elevation_km)
            };
            let Ok(theoretical) = self.travel_time.phases(
                &earth_model,
                depth,
                tectonic,
                distance,
                azimuth,
                elevation,
            ) else {
                continue;
            };
            let identifier = PhaseID::new(weights, event.hypocenter.origin_time, distance, &theoretical);
            let group = &event.groups[gi];
            let changed = identifier.identify(group, &mut event.picks, stage.reidentify);
            any_changed |= changed;

            let origin_time = event.hypocenter.origin_time;
            let indices = event.groups[gi].pick_indices.clone();
            for index in indices {
                if !event.picks[index].is_active() {
                    continue;
                }
                let current_phase = event.picks[index].current_phase.clone();
                if let Some(predicted) = theoretical.iter().find(|t| t.phase_code == current_phase) {
                    let predicted_arrival = origin_time + predicted.travel_time;
                    event.picks[index].residual = event.picks[index].arrival_time - predicted_arrival;
                }
            }
        }
        let _ = (colat, lon);

        if event.used_station_count() < MIN_STATIONS {
            return (any_changed, Some(ExitCode::InsufficientData));
        }

        let pick_residuals: Vec<(usize, f64, f64, [f64; 3])> = event
            .groups
            .iter()
            .flat_map(|g| g.pick_indices.iter().copied())
            .filter(|&i| event.picks[i].is_active())
            .map(|i| {
                let pick = &event.picks[i];
                (i, pick.residual, pick.weight.max(1e-6), design_row_for_pick(event, i))
            })
            .collect();

        let depth_prior = match (event.hypocenter.depth_residual(), event.hypocenter.depth_weight()) {
            (Some(r), Some(w)) if !event.depth_held => Some((r, w)),
            _ => None,
        };

        let residuals = residual::assemble(pick_residuals, depth_prior);
        event.save_weighted_residuals(residuals);

        (any_changed, None)
    }

    /// Run one full step attempt: snapshot, compute direction/length via the
    /// rank-sum estimator and line search, apply with damping backoff.
    /// Returns the terminal status for this step.
    pub fn make_step(&mut self, event: &mut Event, stage_index: usize, stage: &StageConfig, iteration: u32) -> ExitCode {
        let snapshot = HypoAudit::snapshot(&event.hypocenter, stage_index, iteration, "entering");
        event.audit.push(snapshot.clone());

        self.set_environment(event);
        let (phase_changed, abort) = self.internal_phase_id(event, stage);
        if let Some(code) = abort {
            return code;
        }
        if phase_changed && stage.reidentify && iteration > 0 {
            return ExitCode::PhaseIdChanged;
        }

        let residuals = if event.use_decorrelation {
            let decorrelator = Decorrelator::build(&event.residuals);
            let projected = decorrelator.project(&event.residuals);
            event.projected_residuals = projected.clone();
            projected
        } else {
            event.residuals.clone()
        };
        if residuals.is_empty() {
            return ExitCode::InsufficientData;
        }

        let dof = event.hypocenter.dof;
        let estimator = RankSumEstimator::new(dof);
        let direction = estimator.comp_steepest_desc_dir(&residuals);

        let entry_median = estimator.compute_median(&residuals);
        let entry_de_medianed = estimator.de_median_residuals(&residuals, entry_median);
        let entry_dispersion = estimator.compute_dispersion_value(&entry_de_medianed);

        let linear_step = LinearStep::new(dof);
        let origin_snapshot = event.hypocenter.clone();
        let outcome = linear_step.search(stage.max_step_length / 4.0, stage.max_step_length, |length| {
            let mut trial = origin_snapshot.clone();
            trial.apply_step(length, &direction, 0.0);
            trial_residuals(event, &trial)
        });

        // spec.md §4.6 step 4: apply the step together with the line-search
        // median as the origin-time correction, then re-run identification
        // and compare dispersion before/after to decide adopt vs. damp
        // (steps 5-7). Damping halves the step and time shift together and
        // re-checks; it gives up after a bounded number of attempts with a
        // status that reflects how close the last candidate came to
        // converging.
        let mut damping_count = 0u32;
        loop {
            let factor = compute_dampening_factor(damping_count);
            let candidate_length = outcome.accepted_length * factor;
            let candidate_dt = outcome.median_residual * factor;

            event.hypocenter = origin_snapshot.clone();
            event.hypocenter.apply_step(candidate_length, &direction, candidate_dt);
            event.hypocenter.damping_count = damping_count;
            event.refresh_groups();

            if snapshot.matches_primary_coordinates(&event.hypocenter) {
                event.audit.push(HypoAudit::snapshot(&event.hypocenter, stage_index, iteration, "failed"));
                return ExitCode::DidNotMove;
            }
            let status = if damping_count == 0 { "stepped" } else { "damping" };
            event.audit.push(HypoAudit::snapshot(&event.hypocenter, stage_index, iteration, status));

            let (re_changed, re_abort) = self.internal_phase_id(event, stage);
            if let Some(code) = re_abort {
                return code;
            }
            if re_changed {
                event.hypocenter.dispersion = entry_dispersion;
                event.audit.push(HypoAudit::snapshot(&event.hypocenter, stage_index, iteration, "converged"));
                return ExitCode::PhaseIdChanged;
            }

            let post_residuals = if event.use_decorrelation {
                let decorrelator = Decorrelator::build(&event.residuals);
                let projected = decorrelator.project(&event.residuals);
                event.projected_residuals = projected.clone();
                projected
            } else {
                event.residuals.clone()
            };
            if post_residuals.is_empty() {
                return ExitCode::InsufficientData;
            }
            let post_median = estimator.compute_median(&post_residuals);
            let post_de_medianed = estimator.de_median_residuals(&post_residuals, post_median);
            let post_dispersion = estimator.compute_dispersion_value(&post_de_medianed);

            if post_dispersion < entry_dispersion {
                event.hypocenter.dispersion = post_dispersion;
                event.audit.push(HypoAudit::snapshot(&event.hypocenter, stage_index, iteration, "converged"));
                return ExitCode::Success;
            }

            if damping_count >= 6 {
                event.hypocenter = origin_snapshot.clone();
                event.hypocenter.dispersion = entry_dispersion;
                event.refresh_groups();
                event.audit.push(HypoAudit::snapshot(&event.hypocenter, stage_index, iteration, "failed"));
                return if candidate_length.abs() <= stage.convergence_limit {
                    ExitCode::NearlyConverged
                } else if post_dispersion > entry_dispersion * 2.0 {
                    ExitCode::UnstableSolution
                } else {
                    ExitCode::DidNotConverge
                };
            }
            damping_count += 1;
        }
    }
}

/// Design row for a pick's residual against the current hypocenter: unit
/// sensitivity to colatitude/longitude/depth steps, approximated from the
/// group's azimuth (spec.md §4.1's linearization).
fn design_row_for_pick(event: &Event, pick_index: usize) -> [f64; 3] {
    let group = event
        .groups
        .iter()
        .find(|g| g.pick_indices.contains(&pick_index));
    match group {
        Some(g) => {
            let az = g.azimuth_deg.to_radians();
            [az.cos(), az.sin(), 0.3]
        }
        None => [0.0, 0.0, 0.0],
    }
}

/// Recompute residuals for a trial hypocenter without mutating `event`,
/// reusing each pick's currently assigned theoretical arrival time offset
/// (an approximation: the line search evaluates dispersion, not a full
/// re-identification, per spec.md §4.5's scope).
fn trial_residuals(event: &Event, trial: &crate::core::hypocenter::Hypocenter) -> Vec<WeightedResidual> {
    let pick_residuals: Vec<(usize, f64, f64, [f64; 3])> = event
        .groups
        .iter()
        .flat_map(|g| g.pick_indices.iter().copied())
        .filter(|&i| event.picks[i].is_active())
        .map(|i| {
            let pick = &event.picks[i];
            let dt = trial.origin_time - event.hypocenter.origin_time;
            (i, pick.residual - dt, pick.weight.max(1e-6), design_row_for_pick(event, i))
        })
        .collect();
    let depth_prior = match (trial.depth_residual(), trial.depth_weight()) {
        (Some(r), Some(w)) if !event.depth_held => Some((r, w)),
        _ => None,
    };
    residual::assemble(pick_residuals, depth_prior)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pick::AuthorType;
    use crate::core::station::{Station, StationId};
    use crate::core::travel_time::Ak135TravelTimeTable;

    fn sample_event() -> Event {
        let hypo = crate::core::hypocenter::Hypocenter::new(0.0, 35.0, -100.0, 10.0, 3);
        let stations = vec![
            Station::new(StationId::new("IU", "ANMO", ""), 35.5, -100.5, 1.7),
            Station::new(StationId::new("IU", "COLA", ""), 36.0, -101.0, 0.2),
            Station::new(StationId::new("IU", "TUC", ""), 34.5, -99.5, 0.9),
        ];
        let picks = vec![
            Pick::new(StationId::new("IU", "ANMO", ""), "IU", "auto", AuthorType::ContribAuto, 40.0, "P"),
            Pick::new(StationId::new("IU", "COLA", ""), "IU", "auto", AuthorType::ContribAuto, 45.0, "P"),
            Pick::new(StationId::new("IU", "TUC", ""), "IU", "auto", AuthorType::ContribAuto, 42.0, "P"),
        ];
        Event::new(hypo, stations, picks)
    }

    use crate::core::pick::Pick;

    #[test]
    fn set_environment_flags_tectonic_outside_cratons() {
        let craton_map = CratonMap::default();
        let zone_stats = ZoneStats::empty();
        let table = Ak135TravelTimeTable::default();
        let mut cache = SessionCache::new(table, SESSION_DEPTH_TOLERANCE_KM);
        let stepper = Stepper::new("ak135", &mut cache, &craton_map, &zone_stats);
        let mut event = sample_event();
        stepper.set_environment(&mut event);
        assert!(event.is_tectonic);
    }

    #[test]
    fn internal_phase_id_aborts_with_too_few_stations() {
        let craton_map = CratonMap::default();
        let zone_stats = ZoneStats::empty();
        let table = Ak135TravelTimeTable::default();
        let mut cache = SessionCache::new(table, SESSION_DEPTH_TOLERANCE_KM);
        let mut stepper = Stepper::new("ak135", &mut cache, &craton_map, &zone_stats);
        let mut event = sample_event();
        event.picks[0].flags.used = false;
        event.picks[1].flags.used = false;
        stepper.set_environment(&mut event);
        let stage = StageConfig::default_profile().remove(0);
        let (_, abort) = stepper.internal_phase_id(&mut event, &stage);
        assert_eq!(abort, Some(ExitCode::InsufficientData));
    }

    #[test]
    fn make_step_moves_hypocenter_or_reports_terminal_status() {
        let craton_map = CratonMap::default();
        let zone_stats = ZoneStats::empty();
        let table = Ak135TravelTimeTable::default();
        let mut cache = SessionCache::new(table, SESSION_DEPTH_TOLERANCE_KM);
        let mut stepper = Stepper::new("ak135", &mut cache, &craton_map, &zone_stats);
        let mut event = sample_event();
        let stage = StageConfig::default_profile().remove(0);
        let status = stepper.make_step(&mut event, 0, &stage, 0);
        assert!(matches!(
            status,
            ExitCode::Success
                | ExitCode::DidNotMove
                | ExitCode::InsufficientData
                | ExitCode::DidNotConverge
                | ExitCode::NearlyConverged
                | ExitCode::UnstableSolution
                | ExitCode::PhaseIdChanged
        ));
    }

    #[test]
    fn successful_step_applies_line_search_median_as_time_shift() {
        let craton_map = CratonMap::default();
        let zone_stats = ZoneStats::empty();
        let table = Ak135TravelTimeTable::default();
        let mut cache = SessionCache::new(table, SESSION_DEPTH_TOLERANCE_KM);
        let mut stepper = Stepper::new("ak135", &mut cache, &craton_map, &zone_stats);
        let mut event = sample_event();
        let stage = StageConfig::default_profile().remove(0);
        let status = stepper.make_step(&mut event, 0, &stage, 0);
        if status == ExitCode::Success {
            assert_ne!(
                event.hypocenter.time_shift, 0.0,
                "median_residual from the line search must drive the origin-time correction"
            );
        }
    }
}
