//! LocationStatistics: the response contract's coverage and error-statistics
//! fields (spec.md §6) — number of associated/used stations and phases,
//! azimuthal and robust gap, minimum distance, a three-character quality
//! string, and the stderr component breakdown. Computed from the converged
//! `Event` and, once the final stage has run, its `ErrorEllipsoid`.

use crate::core::error_ellipsoid::ErrorEllipsoid;
use crate::core::event::Event;

/// Per-coordinate standard error breakdown (spec.md §6's `stderr` object).
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrComponents {
    pub time_sec: f64,
    pub latitude_km: f64,
    pub longitude_km: f64,
    pub depth_km: f64,
    pub residual_sec: f64,
}

#[derive(Debug, Clone)]
pub struct LocationStatistics {
    pub num_stations_associated: usize,
    pub num_stations_used: usize,
    pub num_phases_associated: usize,
    pub num_phases_used: usize,
    pub azimuthal_gap_deg: f64,
    pub robust_gap_deg: f64,
    pub min_distance_deg: f64,
    /// Three characters: summary, epicenter, depth grade (`'A'`-`'D'`).
    pub quality: String,
    pub stderr: StderrComponents,
}

pub fn compute(event: &Event, ellipsoid: Option<&ErrorEllipsoid>) -> LocationStatistics {
    let num_stations_associated = event.groups.iter().filter(|g| !g.pick_indices.is_empty()).count();
    let num_stations_used = event.used_station_count();
    let num_phases_associated = event.picks.len();
    let num_phases_used = event.picks.iter().filter(|p| p.is_active()).count();

    let mut azimuths: Vec<f64> = event
        .groups
        .iter()
        .filter(|g| g.active_count(&event.picks) > 0)
        .map(|g| g.azimuth_deg)
        .collect();
    azimuths.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let (azimuthal_gap_deg, robust_gap_deg) = compute_gaps(&azimuths);

    let min_distance_deg = event
        .groups
        .iter()
        .filter(|g| g.active_count(&event.picks) > 0)
        .map(|g| g.distance_deg)
        .fold(f64::INFINITY, f64::min);
    let min_distance_deg = if min_distance_deg.is_finite() { min_distance_deg } else { 0.0 };

    let dispersion = event.hypocenter.dispersion;
    let stderr = StderrComponents {
        time_sec: if num_phases_used > 0 {
            dispersion / (num_phases_used as f64).sqrt()
        } else {
            0.0
        },
        latitude_km: ellipsoid.map(|e| e.coordinate_stderr_km[0]).unwrap_or(0.0),
        longitude_km: ellipsoid.map(|e| e.coordinate_stderr_km[1]).unwrap_or(0.0),
        depth_km: ellipsoid.map(|e| e.coordinate_stderr_km[2]).unwrap_or(0.0),
        residual_sec: dispersion,
    };

    let epicenter_grade = grade(num_stations_used, azimuthal_gap_deg, min_distance_deg);
    let depth_grade = if event.depth_held || event.hypocenter.dof < 3 {
        'D'
    } else {
        grade(num_stations_used, azimuthal_gap_deg, min_distance_deg)
    };
    let summary_grade = epicenter_grade.max(depth_grade);
    let quality = format!("{summary_grade}{epicenter_grade}{depth_grade}");

    LocationStatistics {
        num_stations_associated,
        num_stations_used,
        num_phases_associated,
        num_phases_used,
        azimuthal_gap_deg,
        robust_gap_deg,
        min_distance_deg,
        quality,
        stderr,
    }
}

/// Azimuthal gap: the largest consecutive (cyclic) gap between used-station
/// azimuths. Robust gap simulates the loss of any one station: the largest
/// sum of two adjacent gaps (spec.md §6).
fn compute_gaps(sorted_azimuths: &[f64]) -> (f64, f64) {
    let n = sorted_azimuths.len();
    if n < 2 {
        return (360.0, 360.0);
    }
    let gaps: Vec<f64> = (0..n)
        .map(|i| {
            let this = sorted_azimuths[i];
            let next = sorted_azimuths[(i + 1) % n];
            if i + 1 == n {
                next + 360.0 - this
            } else {
                next - this
            }
        })
        .collect();
    let azimuthal_gap_deg = gaps.iter().cloned().fold(0.0, f64::max);
    let robust_gap_deg = if n >= 3 {
        (0..n).map(|i| gaps[i] + gaps[(i + 1) % n]).fold(0.0, f64::max)
    } else {
        azimuthal_gap_deg
    };
    (azimuthal_gap_deg, robust_gap_deg)
}

fn grade(num_stations: usize, gap_deg: f64, min_distance_deg: f64) -> char {
    if num_stations >= 8 && gap_deg < 90.0 && min_distance_deg < 30.0 {
        'A'
    } else if num_stations >= 6 && gap_deg < 135.0 && min_distance_deg < 50.0 {
        'B'
    } else if num_stations >= 4 && gap_deg < 180.0 {
        'C'
    } else {
        'D'
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hypocenter::Hypocenter;
    use crate::core::pick::{AuthorType, Pick};
    use crate::core::station::{Station, StationId};

    fn event_with_stations(azimuths_and_distances: &[(f64, f64)]) -> Event {
        let hypo = Hypocenter::new(0.0, 0.0, 0.0, 10.0, 3);
        let mut stations = Vec::new();
        let mut picks = Vec::new();
        for (i, _) in azimuths_and_distances.iter().enumerate() {
            let id = StationId::new("IU", format!("S{i}"), "");
            stations.push(Station::new(id.clone(), 1.0 + i as f64, 1.0, 0.0));
            picks.push(Pick::new(id, "IU", "auto", AuthorType::ContribAuto, 10.0 + i as f64, "P"));
        }
        let mut event = Event::new(hypo, stations, picks);
        for (group, &(az, dist)) in event.groups.iter_mut().zip(azimuths_and_distances.iter()) {
            group.azimuth_deg = az;
            group.distance_deg = dist;
        }
        event
    }

    #[test]
    fn full_azimuthal_coverage_yields_small_gap() {
        let event = event_with_stations(&[(0.0, 10.0), (90.0, 12.0), (180.0, 15.0), (270.0, 20.0)]);
        let stats = compute(&event, None);
        assert!(stats.azimuthal_gap_deg <= 90.0 + 1e-9);
        assert_eq!(stats.num_stations_used, 4);
    }

    #[test]
    fn single_station_reports_full_gap() {
        let event = event_with_stations(&[(45.0, 10.0)]);
        let stats = compute(&event, None);
        assert_eq!(stats.azimuthal_gap_deg, 360.0);
    }

    #[test]
    fn quality_string_is_three_characters() {
        let event = event_with_stations(&[(0.0, 10.0), (90.0, 12.0), (180.0, 15.0), (270.0, 20.0)]);
        let stats = compute(&event, None);
        assert_eq!(stats.quality.chars().count(), 3);
    }

    #[test]
    fn held_depth_forces_depth_grade_d() {
        let mut event = event_with_stations(&[(0.0, 10.0), (90.0, 12.0), (180.0, 15.0), (270.0, 20.0)]);
        event.depth_held = true;
        let stats = compute(&event, None);
        let depth_grade = stats.quality.chars().nth(2).unwrap();
        assert_eq!(depth_grade, 'D');
    }
}
