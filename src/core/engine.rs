//! Engine: top-level orchestration tying configuration, auxiliary reference
//! data, and the travel-time service to one `LocationLoop` run per `Event`.
//!
//! Numerical anomalies inside a location run never escape as `Err` — they
//! are reported as an `ExitCode` on the result, per spec.md §7's propagation
//! policy. `Result`/`?` is still used for the I/O boundary (loading
//! auxiliary data), splitting fallible setup from an infallible-by-contract
//! run step.

use crate::core::config::EngineConfig;
use crate::core::error::{ExitCode, Result};
use crate::core::error_ellipsoid::{self, ErrorEllipsoid};
use crate::core::event::Event;
use crate::core::residual::ResidualSource;
use crate::core::location_loop::LocationLoop;
use crate::core::travel_time::{Ak135TravelTimeTable, SessionCache, TravelTimeService};
use crate::core::{AuxCache, AuxiliaryData, CratonMap, ZoneStats};

const SESSION_DEPTH_TOLERANCE_KM: f64 = 2.0;

pub struct Engine<S: TravelTimeService = Ak135TravelTimeTable> {
    pub config: EngineConfig,
    cratons: CratonMap,
    zone_stats: ZoneStats,
    session: SessionCache<S>,
}

impl Engine<Ak135TravelTimeTable> {
    /// Build an engine with the reference travel-time table and the
    /// auxiliary data loaded (and cached) from disk.
    pub fn with_ak135(
        config: EngineConfig,
        aux_cache: &AuxCache,
        craton_polygon_path: &std::path::Path,
        zone_key_path: &std::path::Path,
        zone_stat_path: &std::path::Path,
    ) -> Result<Self> {
        let AuxiliaryData { cratons, zone_stats } =
            aux_cache.load(craton_polygon_path, zone_key_path, zone_stat_path)?;
        Ok(Self {
            config,
            cratons,
            zone_stats,
            session: SessionCache::new(Ak135TravelTimeTable::default(), SESSION_DEPTH_TOLERANCE_KM),
        })
    }

    /// Build an engine with empty auxiliary data (no craton polygons, no
    /// depth priors) — suitable for tests and for deployments that haven't
    /// provisioned the reference files yet.
    pub fn with_ak135_and_empty_aux(config: EngineConfig) -> Self {
        Self {
            config,
            cratons: CratonMap::default(),
            zone_stats: ZoneStats::empty(),
            session: SessionCache::new(Ak135TravelTimeTable::default(), SESSION_DEPTH_TOLERANCE_KM),
        }
    }
}

impl<S: TravelTimeService> Engine<S> {
    pub fn new(config: EngineConfig, cratons: CratonMap, zone_stats: ZoneStats, service: S) -> Self {
        Self {
            config,
            cratons,
            zone_stats,
            session: SessionCache::new(service, SESSION_DEPTH_TOLERANCE_KM),
        }
    }

    /// Run the full staged location on `event`, mutating its hypocenter and
    /// picks in place. Returns the terminal exit code and, if the final
    /// stage requested error computation and converged, the error
    /// ellipsoid.
    pub fn locate(&mut self, event: &mut Event) -> (ExitCode, Option<ErrorEllipsoid>) {
        event.use_decorrelation = self.config.use_decorrelation;

        let mut loop_runner = LocationLoop::new(
            self.config.earth_model.clone(),
            &mut self.session,
            &self.cratons,
            &self.zone_stats,
        );
        let result = loop_runner.run(event, &self.config.stages);

        let wants_errors = self
            .config
            .stages
            .last()
            .map(|s| s.compute_errors)
            .unwrap_or(false);

        let ellipsoid = if wants_errors && result.final_status.is_success_family() {
            let residuals = if event.use_decorrelation && !event.projected_residuals.is_empty() {
                event.projected_residuals.clone()
            } else {
                event.residuals.clone()
            };
            let computed = error_ellipsoid::compute(&residuals, event.hypocenter.dof);
            if let Some(ellipsoid) = &computed {
                for (residual, &importance) in residuals.iter().zip(ellipsoid.importances.iter()) {
                    if let ResidualSource::Pick { index } = residual.source {
                        event.picks[index].importance = importance;
                    }
                }
            }
            computed
        } else {
            None
        };

        let status = if wants_errors && ellipsoid.is_none() && result.final_status.is_success_family() {
            ExitCode::ErrorsNotComputed
        } else {
            result.final_status
        };

        (status, ellipsoid)
    }
}
