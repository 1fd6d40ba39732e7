//! Travel-time service interface (spec.md §1's external collaborator, made
//! concrete per SPEC_FULL.md §4.9) plus a small deterministic reference
//! implementation so the engine is testable end-to-end without a real
//! seismological travel-time library.

use std::collections::HashMap;

use crate::core::error::{EngineError, Result};

/// One theoretical phase arrival predicted for a given source depth and
/// station geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct TheoreticalPhase {
    pub phase_code: String,
    /// Predicted arrival time, seconds since the event origin time.
    pub travel_time: f64,
    /// Scale parameter of the arrival-time distribution, seconds.
    pub spread: f64,
    /// Prior probability this phase is actually observed at this distance.
    pub observability: f64,
    /// Equivalence class used for soft matching during identification.
    pub phase_group: String,
    /// Secondary equivalence class consulted when the observed phase is a
    /// "generic" primary-group code.
    pub auxiliary_group: String,
    /// `true` if this phase is not observable at the given distance
    /// (distance-discrimination flag).
    pub distance_discriminated: bool,
    /// `true` if this phase is only meaningful at regional distance.
    pub regional: bool,
}

/// External collaborator: given source depth and station geometry, returns
/// an ordered list of theoretical phases (spec.md §1).
pub trait TravelTimeService: Send + Sync {
    fn phases(
        &self,
        depth_km: f64,
        distance_deg: f64,
        azimuth_deg: f64,
        station_elevation_km: f64,
    ) -> Result<Vec<TheoreticalPhase>>;
}

/// Key identifying a cached travel-time table: earth model name plus the
/// depth bucket it was built for.
#[derive(Debug, Clone, PartialEq)]
struct SessionKey {
    earth_model: String,
    depth_km: f64,
    tectonic: bool,
}

/// Per-engine cache of travel-time sessions, rebuilt whenever depth changes
/// beyond a tolerance or the tectonic flag changes (spec.md §5).
pub struct SessionCache<S: TravelTimeService> {
    service: S,
    depth_tolerance_km: f64,
    current: Option<SessionKey>,
    cached_phases: HashMap<(i64, i64), Vec<TheoreticalPhase>>,
}

impl<S: TravelTimeService> SessionCache<S> {
    pub fn new(service: S, depth_tolerance_km: f64) -> Self {
        Self {
            service,
            depth_tolerance_km,
            current: None,
            cached_phases: HashMap::new(),
        }
    }

    /// Returns theoretical phases for the given geometry, rebuilding the
    /// session (and clearing the per-distance cache) if depth moved beyond
    /// tolerance, the earth model changed, or the tectonic flag flipped.
    pub fn phases(
        &mut self,
        earth_model: &str,
        depth_km: f64,
        tectonic: bool,
        distance_deg: f64,
        azimuth_deg: f64,
        station_elevation_km: f64,
    ) -> Result<Vec<TheoreticalPhase>> {
        let needs_rebuild = match &self.current {
            None => true,
            Some(key) => {
                key.earth_model != earth_model
                    || key.tectonic != tectonic
                    || (key.depth_km - depth_km).abs() > self.depth_tolerance_km
            }
        };
        if needs_rebuild {
            self.current = Some(SessionKey {
                earth_model: earth_model.to_string(),
                depth_km,
                tectonic,
            });
            self.cached_phases.clear();
        }

        let dist_key = (distance_deg * 100.0).round() as i64;
        let az_key = (azimuth_deg * 100.0).round() as i64;
        if let Some(hit) = self.cached_phases.get(&(dist_key, az_key)) {
            return Ok(hit.clone());
        }

        let phases = self
            .service
            .phases(depth_km, distance_deg, azimuth_deg, station_elevation_km)?;
        self.cached_phases.insert((dist_key, az_key), phases.clone());
        Ok(phases)
    }
}

/// A piecewise-linear, single-control-point-per-phase travel-time curve
/// covering the regional/teleseismic phases spec.md §4.4 names
/// (P, Pn, Pg, S, Sn, Lg, PKP, PKIKP). Not a substitute for a production
/// earth-model table — a deterministic stand-in that lets `PhaseID`,
/// `Stepper`, and `LocationLoop` be exercised end-to-end.
#[derive(Debug, Clone)]
pub struct Ak135TravelTimeTable {
    /// Apparent velocity, km/s, used to turn distance into a travel time.
    curves: Vec<PhaseCurve>,
}

#[derive(Debug, Clone)]
struct PhaseCurve {
    phase_code: &'static str,
    phase_group: &'static str,
    auxiliary_group: &'static str,
    /// Minimum/maximum distance, degrees, this phase is observable at.
    min_distance: f64,
    max_distance: f64,
    /// Apparent surface velocity, km/s.
    apparent_velocity: f64,
    /// Crossover time at zero distance, seconds (depth-dependent term is
    /// added separately).
    intercept: f64,
    base_spread: f64,
    base_observability: f64,
    regional: bool,
}

impl Default for Ak135TravelTimeTable {
    fn default() -> Self {
        Self {
            curves: vec![
                PhaseCurve {
                    phase_code: "Pg",
                    phase_group: "P",
                    auxiliary_group: "P",
                    min_distance: 0.0,
                    max_distance: 12.0,
                    apparent_velocity: 6.2,
                    intercept: 0.0,
                    base_spread: 0.8,
                    base_observability: 0.7,
                    regional: true,
                },
                PhaseCurve {
                    phase_code: "Pn",
                    phase_group: "P",
                    auxiliary_group: "P",
                    min_distance: 1.0,
                    max_distance: 20.0,
                    apparent_velocity: 8.1,
                    intercept: 4.0,
                    base_spread: 0.7,
                    base_observability: 0.8,
                    regional: true,
                },
                PhaseCurve {
                    phase_code: "P",
                    phase_group: "P",
                    auxiliary_group: "P",
                    min_distance: 15.0,
                    max_distance: 100.0,
                    apparent_velocity: 10.8,
                    intercept: 40.0,
                    base_spread: 0.9,
                    base_observability: 0.95,
                    regional: false,
                },
                PhaseCurve {
                    phase_code: "Sg",
                    phase_group: "S",
                    auxiliary_group: "S",
                    min_distance: 0.0,
                    max_distance: 12.0,
                    apparent_velocity: 3.6,
                    intercept: 0.0,
                    base_spread: 1.2,
                    base_observability: 0.5,
                    regional: true,
                },
                PhaseCurve {
                    phase_code: "Sn",
                    phase_group: "S",
                    auxiliary_group: "S",
                    min_distance: 1.0,
                    max_distance: 22.0,
                    apparent_velocity: 4.6,
                    intercept: 7.0,
                    base_spread: 1.1,
                    base_observability: 0.55,
                    regional: true,
                },
                PhaseCurve {
                    phase_code: "Lg",
                    phase_group: "S",
                    auxiliary_group: "S",
                    min_distance: 3.0,
                    max_distance: 25.0,
                    apparent_velocity: 3.5,
                    intercept: 2.0,
                    base_spread: 1.3,
                    base_observability: 0.4,
                    regional: true,
                },
                PhaseCurve {
                    phase_code: "S",
                    phase_group: "S",
                    auxiliary_group: "S",
                    min_distance: 15.0,
                    max_distance: 100.0,
                    apparent_velocity: 6.0,
                    intercept: 70.0,
                    base_spread: 1.4,
                    base_observability: 0.85,
                    regional: false,
                },
                PhaseCurve {
                    phase_code: "PKIKP",
                    phase_group: "P",
                    auxiliary_group: "PKP",
                    min_distance: 110.0,
                    max_distance: 180.0,
                    apparent_velocity: 15.0,
                    intercept: 1000.0,
                    base_spread: 1.0,
                    base_observability: 0.9,
                    regional: false,
                },
                PhaseCurve {
                    phase_code: "PKP",
                    phase_group: "P",
                    auxiliary_group: "PKP",
                    min_distance: 120.0,
                    max_distance: 180.0,
                    apparent_velocity: 14.0,
                    intercept: 1020.0,
                    base_spread: 1.2,
                    base_observability: 0.6,
                    regional: false,
                },
            ],
        }
    }
}

impl TravelTimeService for Ak135TravelTimeTable {
    fn phases(
        &self,
        depth_km: f64,
        distance_deg: f64,
        _azimuth_deg: f64,
        _station_elevation_km: f64,
    ) -> Result<Vec<TheoreticalPhase>> {
        if !(0.0..=800.0).contains(&depth_km) {
            return Err(EngineError::bad_input(format!(
                "depth {depth_km} km outside travel-time table range"
            )));
        }
        let depth_term = depth_km / 8.0;
        let mut phases: Vec<TheoreticalPhase> = self
            .curves
            .iter()
            .filter(|c| distance_deg >= c.min_distance && distance_deg <= c.max_distance)
            .map(|c| {
                let surface_time = c.intercept + distance_deg * 111.19 / c.apparent_velocity;
                let range = (c.max_distance - c.min_distance).max(1e-6);
                let margin = range * 0.1;
                let near_edge = distance_deg - c.min_distance < margin || c.max_distance - distance_deg < margin;
                TheoreticalPhase {
                    phase_code: c.phase_code.to_string(),
                    travel_time: surface_time + depth_term,
                    spread: c.base_spread,
                    observability: c.base_observability,
                    phase_group: c.phase_group.to_string(),
                    auxiliary_group: c.auxiliary_group.to_string(),
                    distance_discriminated: near_edge,
                    regional: c.regional,
                }
            })
            .collect();
        phases.sort_by(|a, b| a.travel_time.partial_cmp(&b.travel_time).unwrap());
        Ok(phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_sorted_by_travel_time() {
        let table = Ak135TravelTimeTable::default();
        let phases = table.phases(10.0, 30.0, 0.0, 0.0).unwrap();
        assert!(phases.len() >= 2);
        for pair in phases.windows(2) {
            assert!(pair[0].travel_time <= pair[1].travel_time);
        }
    }

    #[test]
    fn phase_near_its_curve_edge_is_distance_discriminated() {
        let table = Ak135TravelTimeTable::default();
        // Pg's range is 0-12 deg; 11.8 sits inside the trailing 10% margin.
        let phases = table.phases(10.0, 11.8, 0.0, 0.0).unwrap();
        let pg = phases.iter().find(|p| p.phase_code == "Pg").unwrap();
        assert!(pg.distance_discriminated);

        let phases = table.phases(10.0, 6.0, 0.0, 0.0).unwrap();
        let pg = phases.iter().find(|p| p.phase_code == "Pg").unwrap();
        assert!(!pg.distance_discriminated);
    }

    #[test]
    fn bad_depth_is_rejected() {
        let table = Ak135TravelTimeTable::default();
        assert!(table.phases(-5.0, 30.0, 0.0, 0.0).is_err());
        assert!(table.phases(5000.0, 30.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn session_cache_rebuilds_only_past_depth_tolerance() {
        struct CountingService {
            calls: std::sync::atomic::AtomicUsize,
            inner: Ak135TravelTimeTable,
        }
        impl TravelTimeService for CountingService {
            fn phases(
                &self,
                depth_km: f64,
                distance_deg: f64,
                azimuth_deg: f64,
                elev: f64,
            ) -> Result<Vec<TheoreticalPhase>> {
                self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                self.inner.phases(depth_km, distance_deg, azimuth_deg, elev)
            }
        }
        let service = CountingService {
            calls: std::sync::atomic::AtomicUsize::new(0),
            inner: Ak135TravelTimeTable::default(),
        };
        let mut cache = SessionCache::new(service, 5.0);
        cache.phases("ak135", 10.0, true, 30.0, 10.0, 0.0).unwrap();
        cache.phases("ak135", 30.0, true, 30.0, 10.0, 0.0).unwrap();
        let calls = cache
            .service
            .calls
            .load(std::sync::atomic::Ordering::SeqCst);
        assert_eq!(calls, 2, "depth moved past tolerance, should rebuild");
    }
}
