//! LocationRequest: the JSON input contract (spec.md §6), grounded on the
//! teacher's `core::models` serde structs and on the seismic JSON payload
//! shape used by `other_examples`'s QuakeTracker `seismic.rs`.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::event::Event;
use crate::core::hypocenter::Hypocenter;
use crate::core::pick::{AuthorType, Pick, PickFlags};
use crate::core::station::{Station, StationId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInput {
    #[serde(rename = "originTime")]
    pub origin_time: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    #[serde(rename = "bayesDepth", skip_serializing_if = "Option::is_none")]
    pub bayes_depth: Option<f64>,
    #[serde(rename = "bayesSpread", skip_serializing_if = "Option::is_none")]
    pub bayes_spread: Option<f64>,
    #[serde(rename = "heldLocation", default)]
    pub held_location: bool,
    #[serde(rename = "heldDepth", default)]
    pub held_depth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInput {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub channel: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "elevationKm", default)]
    pub elevation_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickInput {
    pub site: SiteInput,
    pub agency: String,
    pub author: String,
    #[serde(rename = "authorType")]
    pub author_type: AuthorType,
    #[serde(rename = "arrivalTime")]
    pub arrival_time: f64,
    #[serde(rename = "phase")]
    pub observed_phase: String,
    #[serde(default = "default_affinity")]
    pub affinity: f64,
    #[serde(default)]
    pub quality: f64,
    #[serde(rename = "forceAssociation", default)]
    pub force_association: bool,
    #[serde(rename = "surfaceWave", default)]
    pub surface_wave: bool,
    #[serde(default = "default_used")]
    pub used: bool,
}

fn default_used() -> bool {
    true
}

fn default_affinity() -> f64 {
    crate::core::config::NULLAFFINITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRequest {
    pub source: SourceInput,
    pub picks: Vec<PickInput>,
    #[serde(rename = "earthModel", default = "default_earth_model")]
    pub earth_model: String,
}

fn default_earth_model() -> String {
    "ak135".to_string()
}

fn default_quality(q: f64) -> f64 {
    if q > 0.0 {
        q
    } else {
        1.0
    }
}

impl LocationRequest {
    /// Convert this wire request into an `Event`, validating that enough
    /// picks and distinct stations are present to even attempt a location.
    pub fn into_event(self) -> Result<Event> {
        if self.picks.is_empty() {
            return Err(EngineError::bad_input("request has no picks"));
        }

        let dof = if self.source.held_depth { 2 } else { 3 };
        let mut hypo = Hypocenter::new(
            self.source.origin_time,
            self.source.latitude,
            self.source.longitude,
            self.source.depth,
            dof,
        );
        hypo.bayes_depth = self.source.bayes_depth;
        hypo.bayes_spread = self.source.bayes_spread;

        let mut stations: Vec<Station> = Vec::new();
        let mut picks: Vec<Pick> = Vec::new();

        for input in self.picks {
            let station_id = StationId::new(
                input.site.network.clone(),
                input.site.station.clone(),
                input.site.location.clone(),
            );
            if !stations.iter().any(|s: &Station| s.id == station_id) {
                stations.push(Station::new(
                    station_id.clone(),
                    input.site.latitude,
                    input.site.longitude,
                    input.site.elevation_km,
                ));
            }

            let mut pick = Pick::new(
                station_id,
                input.agency,
                input.author,
                input.author_type,
                input.arrival_time,
                input.observed_phase,
            );
            pick.channel = input.site.channel.clone();
            pick.affinity = if input.affinity > 0.0 {
                input.affinity
            } else {
                crate::core::config::NULLAFFINITY
            };
            pick.quality = default_quality(input.quality);
            pick.flags = PickFlags {
                used: input.used,
                triage: false,
                surface_wave: input.surface_wave,
                force_association: input.force_association,
            };
            picks.push(pick);
        }

        let mut event = Event::new(hypo, stations, picks);
        event.location_held = self.source.held_location;
        event.depth_held = self.source.held_depth;
        event.depth_manual = self.source.bayes_depth.is_some();
        Ok(event)
    }
}
