//! Core module for the seismic event locator.
//!
//! # Architecture
//!
//! - `error`: engine error types and the exit-code taxonomy
//! - `config`: engine-wide constants and the staged iteration profile
//! - `geo`: coordinate conversions on the reference ellipsoid
//! - `station`, `pick`, `pick_group`: the input data model
//! - `hypocenter`: mutable solution state and its linearized step
//! - `residual`, `audit`: the per-iteration bookkeeping types
//! - `craton`, `zone_stats`, `aux_cache`: persisted auxiliary reference data
//! - `travel_time`: the theoretical-arrival-time collaborator
//! - `rank_sum`, `decorrelator`, `linear_step`: the robust estimator stack
//! - `phase_id`: per-station phase identification
//! - `stepper`, `location_loop`: the iteration state machine
//! - `error_ellipsoid`: final uncertainty estimate
//! - `statistics`: response-contract coverage/error statistics
//! - `event`: the aggregate tying it all together

pub mod audit;
pub mod aux_cache;
pub mod config;
pub mod craton;
pub mod decorrelator;
pub mod engine;
pub mod error;
pub mod error_ellipsoid;
pub mod event;
pub mod geo;
pub mod hypocenter;
pub mod linear_step;
pub mod location_loop;
pub mod phase_id;
pub mod pick;
pub mod pick_group;
pub mod rank_sum;
pub mod residual;
pub mod station;
pub mod statistics;
pub mod stepper;
pub mod travel_time;
pub mod zone_stats;

pub use audit::{AuditTrail, HypoAudit};
pub use aux_cache::{AuxCache, AuxiliaryData};
pub use config::{EngineConfig, LogLevel, StageConfig};
pub use craton::{CratonMap, CratonPolygon};
pub use decorrelator::Decorrelator;
pub use engine::Engine;
pub use error::{EngineError, ExitCode, Result, ResultExt};
pub use error_ellipsoid::{compute as compute_error_ellipsoid, ErrorEllipsoid};
pub use event::Event;
pub use geo::TrigCache;
pub use hypocenter::Hypocenter;
pub use linear_step::{LinearStep, StepOutcome};
pub use location_loop::{LocationLoop, LoopResult};
pub use phase_id::{IdentificationWeights, PhaseID};
pub use pick::{AuthorType, Pick, PickFlags};
pub use pick_group::PickGroup;
pub use rank_sum::RankSumEstimator;
pub use residual::{ResidualSource, WeightedResidual};
pub use station::{Station, StationId};
pub use statistics::{compute as compute_location_statistics, LocationStatistics, StderrComponents};
pub use stepper::Stepper;
pub use travel_time::{Ak135TravelTimeTable, SessionCache, TheoreticalPhase, TravelTimeService};
pub use zone_stats::{DepthPrior, ZoneStats};
