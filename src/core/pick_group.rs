//! PickGroup: all picks from one station, with derived geometry.

use crate::core::geo;
use crate::core::pick::Pick;
use crate::core::station::{Station, StationId};

/// All picks from one station, referenced by index into the owning
/// `Event`'s flat pick list (spec.md §9: no nullable pointers, no
/// unordered-iteration dependence — indices into a `Vec` sorted once at
/// construction time).
#[derive(Debug, Clone)]
pub struct PickGroup {
    pub station: Station,
    /// Indices into `Event::picks`, sorted by arrival time ascending.
    pub pick_indices: Vec<usize>,
    /// Epicentral distance from the current hypocenter, degrees.
    pub distance_deg: f64,
    /// Azimuth from source to station, degrees from north.
    pub azimuth_deg: f64,
}

impl PickGroup {
    /// Build a group for `station`, sorting `pick_indices` by arrival time
    /// using the full pick list for the lookup.
    pub fn new(station: Station, mut pick_indices: Vec<usize>, picks: &[Pick]) -> Self {
        pick_indices.sort_by(|&a, &b| {
            picks[a]
                .arrival_time
                .partial_cmp(&picks[b].arrival_time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            station,
            pick_indices,
            distance_deg: 0.0,
            azimuth_deg: 0.0,
        }
    }

    pub fn station_id(&self) -> &StationId {
        &self.station.id
    }

    /// Recompute distance/azimuth from the given source colatitude/longitude
    /// (degrees). Must be called whenever the hypocenter moves, per
    /// spec.md §3's PickGroup derivation rule.
    pub fn recompute_geometry(&mut self, source_colat_deg: f64, source_lon_deg: f64) {
        let station_colat = self.station.colatitude();
        self.distance_deg = geo::epicentral_distance_deg(
            source_colat_deg,
            source_lon_deg,
            station_colat,
            self.station.longitude,
        );
        self.azimuth_deg = geo::azimuth_deg(
            source_colat_deg,
            source_lon_deg,
            station_colat,
            self.station.longitude,
        );
    }

    /// Number of picks in this group still participating in the location.
    pub fn active_count(&self, picks: &[Pick]) -> usize {
        self.pick_indices
            .iter()
            .filter(|&&i| picks[i].is_active())
            .count()
    }
}
