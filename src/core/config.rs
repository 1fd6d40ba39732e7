//! Engine-wide configuration.
//!
//! Threaded explicitly through the engine rather than read from process-wide
//! globals — the source this engine is modeled after carried a global debug
//! level; here it is just another field on [`EngineConfig`].

use serde::{Deserialize, Serialize};

/// Kilometers per degree of arc on the reference ellipsoid, used to convert
/// a linearized colatitude/longitude step into an angular step.
pub const DEG2KM: f64 = 111.19;

/// Minimum permitted hypocenter depth, km.
pub const DEPTH_MIN: f64 = 0.0;

/// Maximum permitted hypocenter depth, km. Chosen as the NEIC-locator-style
/// mantle cutoff: `ZoneStats` cells with `min_depth >= 900` are defined as
/// having no usable prior, which implies routine locations stay well inside
/// 700 km. See SPEC_FULL.md §3.1 for the reasoning (an Open Question in the
/// distilled spec, decided here rather than guessed at call sites).
pub const DEPTH_MAX: f64 = 700.0;

/// Default affinity for a pick with no analyst-set confidence multiplier.
pub const NULLAFFINITY: f64 = 1.0;

/// Degrees within which an existing phase identification is preserved by
/// the no-reidentification path without consulting the full identifier.
pub const ASSOC_TOLERANCE: f64 = 0.5;

/// Fraction of cumulative eigenvalue mass the Decorrelator must retain.
pub const COVARIANCE_COVERAGE: f64 = 0.99;

/// Depth standard error floor used when a Bayesian depth prior's spread
/// would otherwise collapse below a sane minimum.
pub const DEFAULT_DEPTH_SE: f64 = 5.0;

/// Bisection iteration cap for `LinearStep::search`.
pub const MAX_BISECT: u32 = 50;

/// Minimum number of used stations required to attempt identification.
pub const MIN_STATIONS: usize = 3;

/// Zone-stat file header size in bytes, per spec.md §6/§9: the rationale for
/// this exact offset is not documented in the source this was distilled
/// from. Kept as a named constant rather than a bare magic number.
pub const ZONE_STAT_HEADER_BYTES: usize = 40;

/// Logging verbosity, threaded explicitly rather than read from an
/// environment variable at arbitrary call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::core::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(crate::core::error::EngineError::invalid_config(format!(
                "unknown log level: {other}"
            ))),
        }
    }
}

/// One stage of the `LocationLoop`'s staged outer iteration (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Weight applied to observability when the observed phase group
    /// doesn't match the theoretical one.
    pub other_weight: f64,
    /// Hysteresis weight favoring the currently assigned phase code.
    pub sticky_weight: f64,
    /// Whether this stage permits `PhaseID` to change identifications.
    pub reidentify: bool,
    /// Whether this stage recomputes pick weights from residual statistics.
    pub reweight: bool,
    /// Stage convergence limit, `epsilon_s`.
    pub convergence_limit: f64,
    /// Stage step-length limit, `L_max`.
    pub max_step_length: f64,
    /// Iteration cap for this stage.
    pub max_iterations: u32,
    /// Whether this stage should compute final error statistics
    /// (error ellipsoid, stderr components) after converging.
    pub compute_errors: bool,
}

impl StageConfig {
    /// The typical four-stage profile from spec.md §4.7: stage 0 refines
    /// origin time with aggressive re-identification, stages 1-2 tighten
    /// with less re-identification, and the final stage computes error
    /// statistics.
    pub fn default_profile() -> Vec<StageConfig> {
        vec![
            StageConfig {
                other_weight: 0.05,
                sticky_weight: 2.0,
                reidentify: true,
                reweight: true,
                convergence_limit: 2.0,
                max_step_length: 500.0,
                max_iterations: 15,
                compute_errors: false,
            },
            StageConfig {
                other_weight: 0.2,
                sticky_weight: 4.0,
                reidentify: true,
                reweight: true,
                convergence_limit: 0.5,
                max_step_length: 100.0,
                max_iterations: 10,
                compute_errors: false,
            },
            StageConfig {
                other_weight: 0.5,
                sticky_weight: 8.0,
                reidentify: false,
                reweight: true,
                convergence_limit: 0.1,
                max_step_length: 20.0,
                max_iterations: 10,
                compute_errors: false,
            },
            StageConfig {
                other_weight: 0.5,
                sticky_weight: 8.0,
                reidentify: false,
                reweight: false,
                convergence_limit: 0.01,
                max_step_length: 5.0,
                max_iterations: 5,
                compute_errors: true,
            },
        ]
    }
}

/// Top-level configuration threaded through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Earth model name, e.g. `"ak135"`.
    pub earth_model: String,
    /// Logging verbosity.
    pub log_level: LogLevel,
    /// The `LocationLoop` stage table.
    pub stages: Vec<StageConfig>,
    /// Use the decorrelated-residual projection path (spec.md §4.3).
    pub use_decorrelation: bool,
    /// Use SVD (vs. a cheaper approximation) for the error ellipsoid.
    pub use_svd: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            earth_model: "ak135".to_string(),
            log_level: LogLevel::default(),
            stages: StageConfig::default_profile(),
            use_decorrelation: true,
            use_svd: true,
        }
    }
}
