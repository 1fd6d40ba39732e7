//! Event: the aggregate that ties a hypocenter to its picks and iteration
//! history (spec.md §3).

use crate::core::audit::AuditTrail;
use crate::core::hypocenter::Hypocenter;
use crate::core::pick::Pick;
use crate::core::pick_group::PickGroup;
use crate::core::residual::WeightedResidual;
use crate::core::station::Station;

/// One event under location: a hypocenter, its picks grouped by station, and
/// the bookkeeping `Stepper`/`LocationLoop` mutate between iterations.
#[derive(Debug, Clone)]
pub struct Event {
    pub hypocenter: Hypocenter,
    /// One entry per contributing station, sorted by `(distance_deg,
    /// earliest arrival time)` after each `recompute_geometry` call — a
    /// stable, data-derived order rather than input or hash-map order
    /// (spec.md §9).
    pub groups: Vec<PickGroup>,
    pub picks: Vec<Pick>,
    pub audit: AuditTrail,
    /// Raw weighted residuals from the most recent `Stepper` pass.
    pub residuals: Vec<WeightedResidual>,
    /// Decorrelated projection of `residuals`, if decorrelation is enabled.
    pub projected_residuals: Vec<WeightedResidual>,

    /// Analyst pinned the epicenter; `LocationLoop` skips the location step
    /// entirely but may still recompute errors.
    pub location_held: bool,
    /// Analyst pinned the depth; `Stepper` runs with `dof == 2`.
    pub depth_held: bool,
    /// Depth prior came from the analyst, not `ZoneStats` — `set_environment`
    /// must not overwrite it.
    pub depth_manual: bool,
    pub use_decorrelation: bool,
    /// Set when a stage restarts after a `PhaseIdChanged` signal, so
    /// `LocationLoop` knows to reset its iteration counter once more and no
    /// more (spec.md §9's bounded re-identify decision).
    pub location_restarted: bool,
    /// Whether the current hypocenter falls outside all craton polygons.
    pub is_tectonic: bool,
}

impl Event {
    pub fn new(hypocenter: Hypocenter, stations: Vec<Station>, picks: Vec<Pick>) -> Self {
        let mut groups: Vec<PickGroup> = stations
            .into_iter()
            .map(|station| {
                let indices: Vec<usize> = picks
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.station_id == station.id)
                    .map(|(i, _)| i)
                    .collect();
                PickGroup::new(station, indices, &picks)
            })
            .collect();

        let mut event = Self {
            hypocenter,
            groups: Vec::new(),
            picks,
            audit: AuditTrail::new(64),
            residuals: Vec::new(),
            projected_residuals: Vec::new(),
            location_held: false,
            depth_held: false,
            depth_manual: false,
            use_decorrelation: true,
            location_restarted: false,
            is_tectonic: true,
        };
        event.recompute_geometry(&mut groups);
        event.groups = groups;
        event
    }

    /// Recompute distance/azimuth for every group from the current
    /// hypocenter, then re-sort groups by `(distance_deg, earliest arrival
    /// time)`. Must be called whenever the hypocenter moves.
    pub fn recompute_geometry(&self, groups: &mut [PickGroup]) {
        let colat = self.hypocenter.colatitude();
        let lon = self.hypocenter.longitude;
        for group in groups.iter_mut() {
            group.recompute_geometry(colat, lon);
        }
        groups.sort_by(|a, b| {
            a.distance_deg
                .partial_cmp(&b.distance_deg)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.station_id().cmp(b.station_id()))
        });
    }

    /// Recompute and re-sort this event's own groups in place.
    pub fn refresh_groups(&mut self) {
        let mut groups = std::mem::take(&mut self.groups);
        self.recompute_geometry(&mut groups);
        self.groups = groups;
    }

    /// Clear the per-stage `triage` flag on every pick, restoring any pick
    /// dropped by a prior stage's triage pass to eligibility.
    pub fn reset_triage(&mut self) {
        for pick in self.picks.iter_mut() {
            pick.flags.triage = false;
        }
    }

    /// Reset every pick's `used` flag to `true`, used when a new stage wants
    /// to reconsider picks dropped by prior weighting.
    pub fn reset_use_flags(&mut self) {
        for pick in self.picks.iter_mut() {
            pick.flags.used = true;
        }
    }

    pub fn used_station_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.active_count(&self.picks) > 0)
            .count()
    }

    pub fn save_weighted_residuals(&mut self, residuals: Vec<WeightedResidual>) {
        self.residuals = residuals;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pick::AuthorType;
    use crate::core::station::StationId;

    fn sample_event() -> Event {
        let hypo = Hypocenter::new(0.0, 35.0, -100.0, 10.0, 3);
        let stations = vec![
            Station::new(StationId::new("IU", "ANMO", ""), 34.9, -106.5, 1.7),
            Station::new(StationId::new("IU", "COLA", ""), 64.9, -147.8, 0.2),
        ];
        let picks = vec![
            Pick::new(StationId::new("IU", "ANMO", ""), "IU", "auto", AuthorType::ContribAuto, 100.0, "P"),
            Pick::new(StationId::new("IU", "COLA", ""), "IU", "auto", AuthorType::ContribAuto, 400.0, "P"),
        ];
        Event::new(hypo, stations, picks)
    }

    #[test]
    fn groups_sorted_by_distance_ascending() {
        let event = sample_event();
        assert_eq!(event.groups.len(), 2);
        for pair in event.groups.windows(2) {
            assert!(pair[0].distance_deg <= pair[1].distance_deg);
        }
    }

    #[test]
    fn reset_triage_clears_flag() {
        let mut event = sample_event();
        event.picks[0].flags.triage = true;
        event.reset_triage();
        assert!(!event.picks[0].flags.triage);
    }

    #[test]
    fn used_station_count_reflects_active_picks() {
        let mut event = sample_event();
        assert_eq!(event.used_station_count(), 2);
        event.picks[0].flags.used = false;
        event.picks[1].flags.used = false;
        assert_eq!(event.used_station_count(), 0);
    }
}
