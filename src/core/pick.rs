//! Pick model: one arrival-time observation at a station.

use serde::{Deserialize, Serialize};

use crate::core::config::NULLAFFINITY;
use crate::core::station::StationId;

/// Provenance of a pick's author, used by PhaseID's type-penalty and
/// surface-wave force-association rules (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorType {
    ContribAuto,
    LocalAuto,
    ContribHuman,
    LocalHuman,
}

impl AuthorType {
    /// Picks not made by a human analyst at any agency.
    pub fn is_automatic(self) -> bool {
        matches!(self, AuthorType::ContribAuto | AuthorType::LocalAuto)
    }
}

/// Mutable per-pick flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickFlags {
    /// Included in the current location pass.
    pub used: bool,
    /// Removed for this stage only by triage; cleared between stages.
    pub triage: bool,
    /// A long-period surface-wave pick, eligible for force-association.
    pub surface_wave: bool,
    /// Analyst pinned this pick's phase identification; PhaseID must not
    /// reassign it.
    pub force_association: bool,
}

/// One arrival-time observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub station_id: StationId,
    /// Channel code, e.g. `"BHZ"`. Empty when the source format doesn't
    /// carry one (most hydra legacy feeds).
    #[serde(default)]
    pub channel: String,
    pub agency: String,
    pub author: String,
    pub author_type: AuthorType,
    /// Arrival time, seconds since epoch.
    pub arrival_time: f64,
    /// Phase code as originally reported by the analyst/auto-picker.
    pub observed_phase: String,
    /// Phase code the association step assigned before PhaseID ran.
    pub associated_phase: String,
    /// Phase code PhaseID currently believes this pick is.
    pub current_phase: String,
    /// Analyst confidence multiplier, >= 1.
    pub affinity: f64,
    pub quality: f64,
    /// Residual against the current theoretical arrival time, seconds.
    pub residual: f64,
    /// Weight assigned by the rank-sum estimator.
    pub weight: f64,
    /// Affinity-weighted absolute residual, PhaseID's per-pick figure of
    /// merit (spec.md §4.4 step 6).
    pub statistical_fom: f64,
    /// Leverage (hat-matrix diagonal) of this pick's residual row in the
    /// converged error ellipsoid's design matrix, spec.md §6's per-pick
    /// `importance`. Zero until the final stage computes error statistics.
    pub importance: f64,
    pub flags: PickFlags,
}

impl Pick {
    pub fn new(
        station_id: StationId,
        agency: impl Into<String>,
        author: impl Into<String>,
        author_type: AuthorType,
        arrival_time: f64,
        observed_phase: impl Into<String>,
    ) -> Self {
        let observed_phase = observed_phase.into();
        Self {
            station_id,
            channel: String::new(),
            agency: agency.into(),
            author: author.into(),
            author_type,
            arrival_time,
            associated_phase: observed_phase.clone(),
            current_phase: observed_phase.clone(),
            observed_phase,
            affinity: NULLAFFINITY,
            quality: 1.0,
            residual: 0.0,
            weight: 0.0,
            statistical_fom: 0.0,
            importance: 0.0,
            flags: PickFlags {
                used: true,
                ..Default::default()
            },
        }
    }

    /// Whether this pick currently participates in the location.
    pub fn is_active(&self) -> bool {
        self.flags.used && !self.flags.triage
    }
}
