//! Station model: immutable after intake.

use serde::{Deserialize, Serialize};

/// Identifier for a station: code, network, and optional location code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId {
    pub network: String,
    pub station: String,
    pub location: String,
}

impl StationId {
    pub fn new(network: impl Into<String>, station: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
        }
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}.{}", self.network, self.station)
        } else {
            write!(f, "{}.{}.{}", self.network, self.station, self.location)
        }
    }
}

/// A recording station: immutable after intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    /// Geographic latitude, degrees.
    pub latitude: f64,
    /// Longitude, degrees.
    pub longitude: f64,
    /// Elevation above sea level, km.
    pub elevation_km: f64,
}

impl Station {
    pub fn new(id: StationId, latitude: f64, longitude: f64, elevation_km: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
            elevation_km,
        }
    }

    /// Geocentric colatitude of the station, degrees.
    pub fn colatitude(&self) -> f64 {
        crate::core::geo::colatitude_from_latitude(self.latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_id_display_with_and_without_location() {
        let with_loc = StationId::new("IU", "ANMO", "00");
        assert_eq!(with_loc.to_string(), "IU.ANMO.00");

        let without_loc = StationId::new("IU", "ANMO", "");
        assert_eq!(without_loc.to_string(), "IU.ANMO");
    }

    #[test]
    fn station_colatitude_at_equator() {
        let station = Station::new(StationId::new("XX", "EQ", ""), 0.0, 0.0, 0.0);
        assert!((station.colatitude() - 90.0).abs() < 1e-9);
    }
}
