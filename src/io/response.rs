//! LocationResponse: the JSON output contract (spec.md §6).

use serde::{Deserialize, Serialize};

use crate::core::error::ExitCode;
use crate::core::error_ellipsoid::ErrorEllipsoid;
use crate::core::event::Event;
use crate::core::statistics::{self, StderrComponents};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEllipsoidAxis {
    #[serde(rename = "semiMajor")]
    pub semi_major_km: f64,
    pub azimuth: f64,
    pub plunge: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEllipsoidOutput {
    pub axes: Vec<ErrorEllipsoidAxis>,
    #[serde(rename = "horizontalSemiMajorKm")]
    pub horizontal_semi_major_km: f64,
    #[serde(rename = "horizontalSemiMinorKm")]
    pub horizontal_semi_minor_km: f64,
    #[serde(rename = "horizontalStrikeDeg")]
    pub horizontal_strike_deg: f64,
    #[serde(rename = "verticalSeKm")]
    pub vertical_se_km: f64,
    #[serde(rename = "equivalentRadiusKm")]
    pub equivalent_radius_km: f64,
}

impl From<&ErrorEllipsoid> for ErrorEllipsoidOutput {
    fn from(e: &ErrorEllipsoid) -> Self {
        Self {
            axes: e
                .axes
                .iter()
                .map(|a| ErrorEllipsoidAxis {
                    semi_major_km: a.semi_major_km,
                    azimuth: a.azimuth_deg,
                    plunge: a.plunge_deg,
                })
                .collect(),
            horizontal_semi_major_km: e.horizontal_semi_major_km,
            horizontal_semi_minor_km: e.horizontal_semi_minor_km,
            horizontal_strike_deg: e.horizontal_strike_deg,
            vertical_se_km: e.vertical_se_km,
            equivalent_radius_km: e.equivalent_radius_km,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StderrOutput {
    #[serde(rename = "timeSec")]
    pub time_sec: f64,
    #[serde(rename = "latitudeKm")]
    pub latitude_km: f64,
    #[serde(rename = "longitudeKm")]
    pub longitude_km: f64,
    #[serde(rename = "depthKm")]
    pub depth_km: f64,
    #[serde(rename = "residualSec")]
    pub residual_sec: f64,
}

impl From<StderrComponents> for StderrOutput {
    fn from(s: StderrComponents) -> Self {
        Self {
            time_sec: s.time_sec,
            latitude_km: s.latitude_km,
            longitude_km: s.longitude_km,
            depth_km: s.depth_km,
            residual_sec: s.residual_sec,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickOutput {
    pub network: String,
    pub station: String,
    pub location: String,
    #[serde(default)]
    pub channel: String,
    pub phase: String,
    pub residual: f64,
    pub weight: f64,
    pub used: bool,
    pub importance: f64,
    #[serde(rename = "distanceDeg")]
    pub distance_deg: f64,
    #[serde(rename = "azimuthDeg")]
    pub azimuth_deg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationResponse {
    pub status: ExitCode,
    #[serde(rename = "originTime")]
    pub origin_time: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    #[serde(rename = "isTectonic")]
    pub is_tectonic: bool,
    #[serde(rename = "numStationsAssociated")]
    pub num_stations_associated: usize,
    #[serde(rename = "numStationsUsed")]
    pub num_stations_used: usize,
    #[serde(rename = "numPhasesAssociated")]
    pub num_phases_associated: usize,
    #[serde(rename = "numPhasesUsed")]
    pub num_phases_used: usize,
    #[serde(rename = "azimGap")]
    pub azim_gap: f64,
    #[serde(rename = "robustGap")]
    pub robust_gap: f64,
    #[serde(rename = "minDistance")]
    pub min_distance: f64,
    pub quality: String,
    pub stderr: StderrOutput,
    pub picks: Vec<PickOutput>,
    #[serde(rename = "errorEllipsoid", skip_serializing_if = "Option::is_none")]
    pub error_ellipsoid: Option<ErrorEllipsoidOutput>,
    #[serde(rename = "bayesianDepthImportance", skip_serializing_if = "Option::is_none")]
    pub bayesian_depth_importance: Option<f64>,
}

impl LocationResponse {
    pub fn from_event(event: &Event, status: ExitCode, ellipsoid: Option<ErrorEllipsoid>) -> Self {
        let mut picks = Vec::with_capacity(event.picks.len());
        for group in &event.groups {
            for &index in &group.pick_indices {
                let pick = &event.picks[index];
                picks.push(PickOutput {
                    network: pick.station_id.network.clone(),
                    station: pick.station_id.station.clone(),
                    location: pick.station_id.location.clone(),
                    channel: pick.channel.clone(),
                    phase: pick.current_phase.clone(),
                    residual: pick.residual,
                    weight: pick.weight,
                    used: pick.is_active(),
                    importance: pick.importance,
                    distance_deg: group.distance_deg,
                    azimuth_deg: group.azimuth_deg,
                });
            }
        }

        let stats = statistics::compute(event, ellipsoid.as_ref());
        let bayesian_depth_importance = ellipsoid.as_ref().and_then(|e| e.bayesian_depth_importance);

        Self {
            status,
            origin_time: event.hypocenter.origin_time,
            latitude: event.hypocenter.latitude,
            longitude: event.hypocenter.longitude,
            depth: event.hypocenter.depth,
            is_tectonic: event.is_tectonic,
            num_stations_associated: stats.num_stations_associated,
            num_stations_used: stats.num_stations_used,
            num_phases_associated: stats.num_phases_associated,
            num_phases_used: stats.num_phases_used,
            azim_gap: stats.azimuthal_gap_deg,
            robust_gap: stats.robust_gap_deg,
            min_distance: stats.min_distance_deg,
            quality: stats.quality,
            stderr: stats.stderr.into(),
            picks,
            error_ellipsoid: ellipsoid.as_ref().map(ErrorEllipsoidOutput::from),
            bayesian_depth_importance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hypocenter::Hypocenter;
    use crate::core::pick::{AuthorType, Pick};
    use crate::core::station::{Station, StationId};

    #[test]
    fn response_serializes_status_as_screaming_snake_case() {
        let hypo = Hypocenter::new(0.0, 35.0, -100.0, 10.0, 3);
        let stations = vec![Station::new(StationId::new("IU", "ANMO", ""), 34.9, -106.5, 1.7)];
        let picks = vec![Pick::new(
            StationId::new("IU", "ANMO", ""),
            "IU",
            "auto",
            AuthorType::ContribAuto,
            40.0,
            "P",
        )];
        let event = Event::new(hypo, stations, picks);
        let response = LocationResponse::from_event(&event, ExitCode::Success, None);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"SUCCESS\""));
        assert!(json.contains("\"ANMO\""));
        assert!(json.contains("\"numStationsAssociated\""));
        assert!(json.contains("\"quality\""));
    }

    #[test]
    fn response_omits_bayesian_depth_importance_without_ellipsoid() {
        let hypo = Hypocenter::new(0.0, 35.0, -100.0, 10.0, 3);
        let event = Event::new(hypo, vec![], vec![]);
        let response = LocationResponse::from_event(&event, ExitCode::InsufficientData, None);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("bayesianDepthImportance"));
    }
}
