//! LocationLoop: the staged outer iteration over `Stepper::make_step`
//! (spec.md §4.7).
//!
//! Stages run in order from `EngineConfig::stages`. Each stage resets
//! triage flags, iterates `Stepper::make_step` until convergence, a hard
//! iteration cap, or a terminal failure, then (per `StageConfig::reweight`)
//! recomputes pick weights from residual statistics before the next stage
//! begins. A `PhaseIdChanged` signal from `Stepper` restarts the *current*
//! stage's iteration count exactly once (spec.md §9's bounded
//! re-identification decision) rather than recursing indefinitely.

use crate::core::config::StageConfig;
use crate::core::craton::CratonMap;
use crate::core::error::ExitCode;
use crate::core::event::Event;
use crate::core::stepper::Stepper;
use crate::core::travel_time::{SessionCache, TravelTimeService};
use crate::core::zone_stats::ZoneStats;

/// Outcome of running every configured stage to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopResult {
    pub final_status: ExitCode,
    pub stages_run: usize,
    pub total_iterations: u32,
}

pub struct LocationLoop<'a, S: TravelTimeService> {
    earth_model: String,
    travel_time: &'a mut SessionCache<S>,
    craton_map: &'a CratonMap,
    zone_stats: &'a ZoneStats,
}

impl<'a, S: TravelTimeService> LocationLoop<'a, S> {
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

    /// Run every stage in `stages` against `event`, stopping early on a
    /// failure family exit code.
    pub fn run(&mut self, event: &mut Event, stages: &[StageConfig]) -> LoopResult {
        if event.location_held {
            return self.run_held_location(event, stages);
        }

        let mut total_iterations = 0u32;
        let mut last_status = ExitCode::UnknownStatus;

        for (stage_index, stage) in stages.iter().enumerate() {
            event.reset_triage();
            if stage.reweight {
                event.reset_use_flags();
            }

            let mut reidentify_retry_used = false;
            let mut iteration = 0u32;
            let mut stage_status = ExitCode::UnknownStatus;

            while iteration < stage.max_iterations {
                let mut stepper = Stepper::new(
                    self.earth_model.clone(),
                    self.travel_time,
                    self.craton_map,
                    self.zone_stats,
                );
                let status = stepper.make_step(event, stage_index, stage, iteration);
                total_iterations += 1;

                match status {
                    ExitCode::PhaseIdChanged => {
                        if reidentify_retry_used {
                            // Bounded per spec.md §9: treat a second
                            // consecutive re-identification within the same
                            // stage as convergence instead of looping again.
                            stage_status = ExitCode::NearlyConverged;
                            break;
                        }
                        reidentify_retry_used = true;
                        event.location_restarted = true;
                        iteration = 0;
                        continue;
                    }
                    ExitCode::Success => {
                        if stage.reweight {
                            reweight_from_residuals(event);
                        }
                        stage_status = ExitCode::Success;
                        iteration += 1;
                        if event.hypocenter.step_length.abs() <= stage.convergence_limit {
                            break;
                        }
                        continue;
                    }
                    ExitCode::DidNotMove => {
                        stage_status = ExitCode::NearlyConverged;
                        break;
                    }
                    ExitCode::InsufficientData | ExitCode::SingularMatrix | ExitCode::BadDepth => {
                        return LoopResult {
                            final_status: status,
                            stages_run: stage_index,
                            total_iterations,
                        };
                    }
                    ExitCode::DidNotConverge => {
                        stage_status = ExitCode::DidNotConverge;
                        break;
                    }
                    other => {
                        stage_status = other;
                        iteration += 1;
                    }
                }
            }

            if stage_status == ExitCode::UnknownStatus {
                stage_status = ExitCode::DidNotConverge;
            }
            last_status = stage_status;

            if !last_status.is_success_family() && last_status != ExitCode::DidNotConverge {
                return LoopResult {
                    final_status: last_status,
                    stages_run: stage_index + 1,
                    total_iterations,
                };
            }
        }

        LoopResult {
            final_status: last_status,
            stages_run: stages.len(),
            total_iterations,
        }
    }

    /// When the analyst has pinned the epicenter, skip the stepping entirely
    /// but still run phase identification and, for stages flagged
    /// `compute_errors`, leave the residuals in place for error computation.
    fn run_held_location(&mut self, event: &mut Event, stages: &[StageConfig]) -> LoopResult {
        let mut stepper = Stepper::new(
            self.earth_model.clone(),
            self.travel_time,
            self.craton_map,
            self.zone_stats,
        );
        stepper.set_environment(event);
        let last_stage = stages.last().cloned().unwrap_or_else(|| StageConfig {
            other_weight: 0.5,
            sticky_weight: 8.0,
            reidentify: false,
            reweight: false,
            convergence_limit: 0.01,
            max_step_length: 0.0,
            max_iterations: 1,
            compute_errors: true,
        });
        let (_, abort) = stepper.internal_phase_id(event, &last_stage);
        let status = abort.unwrap_or(ExitCode::Success);
        LoopResult {
            final_status: status,
            stages_run: stages.len(),
            total_iterations: 1,
        }
    }
}

/// Recompute each active pick's weight from its current residual using a
/// simple inverse-spread scheme: picks far from the current dispersion are
/// downweighted rather than dropped outright (dropping happens via triage,
/// a separate mechanism spec.md §4.7 keeps orthogonal to reweighting).
fn reweight_from_residuals(event: &mut Event) {
    let dispersion = event.hypocenter.dispersion.max(1e-3);
    for pick in event.picks.iter_mut().filter(|p| p.is_active()) {
        let normalized = (pick.residual / dispersion).abs();
        pick.weight = 1.0 / (1.0 + normalized.powi(2));
    }
}
