//! PhaseID: assigns each active pick in a group the theoretical phase it
//! most plausibly represents (spec.md §4.4).
//!
//! Works one station group at a time. Long-period surface-wave picks are
//! pre-fixed and force-associated before anything else runs: travel-time
//! tables don't carry dispersive surface phases, so there's nothing
//! meaningful to cluster-match them against. The remaining theoretical
//! phases whose time windows overlap are clustered; picks that fall inside a
//! cluster's window are matched to it one-to-one by enumerating
//! order-preserving assignments and keeping the one with the largest
//! cumulative figure of merit. Picks outside every cluster's window fall
//! back to a best-effort per-candidate match so they are never silently
//! dropped.

use crate::core::config::{ASSOC_TOLERANCE, NULLAFFINITY};
use crate::core::pick::Pick;
use crate::core::pick_group::PickGroup;
use crate::core::travel_time::TheoreticalPhase;

/// Multiplier applied when a candidate phase is flagged distance-discriminated
/// (observable only at the fringe of its normal range).
const DISTANCE_DISCRIMINATED_DOWNWEIGHT: f64 = 0.3;

/// Multiplier applied when a human-reviewed pick's observed arrival type (P
/// vs. S) disagrees with the candidate's type. Automatic picks aren't
/// penalized this way — their observed type is far less reliable.
const TYPE_MISMATCH_PENALTY: f64 = 0.05;

/// Boost applied to the first-arriving phase within its group once distance
/// exceeds `FIRST_ARRIVAL_RANGE_DEG` (first arrivals become relatively more
/// reliably picked as regional coda builds up at teleseismic range).
const FIRST_ARRIVAL_BOOST: f64 = 1.5;
const FIRST_ARRIVAL_RANGE_DEG: f64 = 20.0;

/// Observability-modifier weights controlling how strongly group mismatches,
/// affinity, and hysteresis bias the figure-of-merit (spec.md §4.4, driven
/// by the active `StageConfig`).
#[derive(Debug, Clone, Copy)]
pub struct IdentificationWeights {
    pub other_weight: f64,
    pub sticky_weight: f64,
}

/// Runs phase identification across one station's active picks.
pub struct PhaseID<'a> {
    weights: IdentificationWeights,
    origin_time: f64,
    distance_deg: f64,
    theoretical: &'a [TheoreticalPhase],
}

impl<'a> PhaseID<'a> {
    pub fn new(
        weights: IdentificationWeights,
        origin_time: f64,
        distance_deg: f64,
        theoretical: &'a [TheoreticalPhase],
    ) -> Self {
        Self {
            weights,
            origin_time,
            distance_deg,
            theoretical,
        }
    }

    /// Identify phases for the active picks in `group`. Returns `true` if
    /// any used pick's `current_phase` changed.
    ///
    /// Fast path (`reidentify == false`): for each active pick, if its
    /// current phase's predicted arrival still falls within
    /// `ASSOC_TOLERANCE` degrees-equivalent seconds of the observed time,
    /// leave it alone. Otherwise, or when `reidentify` is `true`, run the
    /// full cluster-and-score assignment.
    pub fn identify(&self, group: &PickGroup, picks: &mut [Pick], reidentify: bool) -> bool {
        let active_indices: Vec<usize> = group
            .pick_indices
            .iter()
            .copied()
            .filter(|&i| picks[i].is_active())
            .collect();
        if active_indices.is_empty() {
            return false;
        }

        if !reidentify {
            let mut changed = false;
            for &idx in &active_indices {
                if picks[idx].flags.force_association {
                    continue;
                }
                if !self.current_assignment_within_tolerance(&picks[idx]) {
                    changed |= self.assign_best_cluster(&active_indices, picks);
                    return changed;
                }
            }
            return false;
        }

        self.assign_best_cluster(&active_indices, picks)
    }

    fn current_assignment_within_tolerance(&self, pick: &Pick) -> bool {
        let predicted = self
            .theoretical
            .iter()
            .find(|t| t.phase_code == pick.current_phase);
        match predicted {
            Some(t) => {
                let predicted_arrival = self.origin_time + t.travel_time;
                (pick.arrival_time - predicted_arrival).abs() <= ASSOC_TOLERANCE * 10.0
            }
            None => false,
        }
    }

    /// Step 2: force-associate trusted surface-wave picks to their own
    /// observed phase, skipping cluster-matching entirely. Returns the
    /// indices not handled this way.
    fn prefix_surface_waves(&self, active_indices: &[usize], picks: &mut [Pick]) -> (bool, Vec<usize>) {
        let mut changed = false;
        let mut remaining = Vec::with_capacity(active_indices.len());
        for &idx in active_indices {
            if picks[idx].flags.force_association {
                continue;
            }
            if picks[idx].flags.surface_wave {
                let observed = picks[idx].observed_phase.clone();
                if picks[idx].current_phase != observed {
                    picks[idx].current_phase = observed;
                    changed = true;
                }
                picks[idx].flags.force_association = true;
                picks[idx].statistical_fom = picks[idx].affinity;
                continue;
            }
            remaining.push(idx);
        }
        (changed, remaining)
    }

    /// Cluster overlapping theoretical phases, then within each cluster match
    /// the picks that fall in its time window one-to-one against its
    /// candidates (spec.md §4.4 step 5), keeping the assignment with the
    /// largest cumulative figure of merit. Picks outside every cluster
    /// window, and picks left over once a cluster is exhausted, fall back to
    /// a best-effort per-candidate match.
    fn assign_best_cluster(&self, active_indices: &[usize], picks: &mut [Pick]) -> bool {
        let (mut changed, remaining) = self.prefix_surface_waves(active_indices, picks);
        let clusters = cluster_overlapping(self.theoretical);

        let mut unclustered: Vec<usize> = Vec::new();
        for &idx in &remaining {
            let relative = picks[idx].arrival_time - self.origin_time;
            let in_some_cluster = clusters.iter().any(|cluster| cluster_window(cluster).contains(relative));
            if !in_some_cluster {
                unclustered.push(idx);
            }
        }

        for cluster in &clusters {
            let window = cluster_window(cluster);
            let mut members: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&idx| window.contains(picks[idx].arrival_time - self.origin_time))
                .collect();
            if members.is_empty() {
                continue;
            }
            members.sort_by(|&a, &b| picks[a].arrival_time.partial_cmp(&picks[b].arrival_time).unwrap());

            if let Some(assignment) = self.best_assignment(&members, cluster, picks) {
                for (pick_idx, candidate) in assignment {
                    if picks[pick_idx].current_phase != candidate.phase_code {
                        picks[pick_idx].current_phase = candidate.phase_code.clone();
                        changed = true;
                    }
                    let relative = picks[pick_idx].arrival_time - self.origin_time;
                    let fom = self.figure_of_merit(&picks[pick_idx], candidate, relative);
                    picks[pick_idx].statistical_fom = picks[pick_idx].affinity * fom.abs();
                }
            }
        }

        for &idx in &unclustered {
            let relative = picks[idx].arrival_time - self.origin_time;
            let mut best_code: Option<&str> = None;
            let mut best_fom = f64::NEG_INFINITY;
            for cluster in &clusters {
                for candidate in cluster {
                    let fom = self.figure_of_merit(&picks[idx], candidate, relative);
                    if fom > best_fom {
                        best_fom = fom;
                        best_code = Some(candidate.phase_code.as_str());
                    }
                }
            }
            if let Some(code) = best_code {
                if picks[idx].current_phase != code {
                    picks[idx].current_phase = code.to_string();
                    changed = true;
                }
                picks[idx].statistical_fom = picks[idx].affinity * best_fom.abs();
            }
        }

        changed
    }

    /// One-to-one match between `members` (picks in arrival-time order) and
    /// `cluster` (candidates in travel-time order): enumerate order-preserving
    /// k-permutations of the larger side taken against the smaller, score
    /// each as the product of per-pair figures of merit, and keep the max.
    fn best_assignment<'c>(
        &self,
        members: &[usize],
        cluster: &[&'c TheoreticalPhase],
        picks: &[Pick],
    ) -> Option<Vec<(usize, &'c TheoreticalPhase)>> {
        if members.is_empty() || cluster.is_empty() {
            return None;
        }

        let mut best_score = f64::NEG_INFINITY;
        let mut best: Option<Vec<(usize, &'c TheoreticalPhase)>> = None;

        if members.len() <= cluster.len() {
            let k = members.len();
            for combo in combinations(cluster.len(), k) {
                let pairs: Vec<(usize, &TheoreticalPhase)> = members
                    .iter()
                    .zip(combo.iter())
                    .map(|(&idx, &ci)| (idx, cluster[ci]))
                    .collect();
                let score: f64 = pairs
                    .iter()
                    .map(|&(idx, candidate)| {
                        let relative = picks[idx].arrival_time - self.origin_time;
                        self.figure_of_merit(&picks[idx], candidate, relative)
                    })
                    .product();
                if score > best_score {
                    best_score = score;
                    best = Some(pairs);
                }
            }
        } else {
            let k = cluster.len();
            for combo in combinations(members.len(), k) {
                let pairs: Vec<(usize, &TheoreticalPhase)> = combo
                    .iter()
                    .zip(cluster.iter())
                    .map(|(&mi, &candidate)| (members[mi], candidate))
                    .collect();
                let score: f64 = pairs
                    .iter()
                    .map(|&(idx, candidate)| {
                        let relative = picks[idx].arrival_time - self.origin_time;
                        self.figure_of_merit(&picks[idx], candidate, relative)
                    })
                    .product();
                if score > best_score {
                    best_score = score;
                    best = Some(pairs);
                }
            }
        }

        best
    }

    /// Cauchy-like figure of merit: proximity to the predicted arrival time
    /// scaled by the theoretical phase's spread, modified by group-mismatch
    /// penalty, distance-discrimination downweight, a P/S type penalty for
    /// non-automatic picks, a first-arrival distance boost, affinity, and
    /// sticky hysteresis favoring the pick's current assignment (spec.md
    /// §4.4 step 4-6).
    fn figure_of_merit(&self, pick: &Pick, candidate: &TheoreticalPhase, relative_time: f64) -> f64 {
        let dt = relative_time - candidate.travel_time;
        let scale = candidate.spread.max(1e-6);
        let mut fom = candidate.observability / (1.0 + (dt / scale).powi(2));

        let observed_matches_group =
            pick.observed_phase == candidate.phase_group || pick.observed_phase == candidate.auxiliary_group;
        if !observed_matches_group {
            fom *= self.weights.other_weight;
        }

        if candidate.distance_discriminated {
            fom *= DISTANCE_DISCRIMINATED_DOWNWEIGHT;
        }

        if !pick.author_type.is_automatic() {
            if let (Some(observed_type), Some(candidate_type)) =
                (arrival_type(&pick.observed_phase), arrival_type(&candidate.phase_group))
            {
                if observed_type != candidate_type {
                    fom *= TYPE_MISMATCH_PENALTY;
                }
            }
        }

        if self.distance_deg > FIRST_ARRIVAL_RANGE_DEG && self.is_first_arrival_in_group(candidate) {
            fom *= FIRST_ARRIVAL_BOOST;
        }

        let affinity = if pick.affinity > 0.0 {
            pick.affinity
        } else {
            NULLAFFINITY
        };
        fom *= affinity;

        if pick.current_phase == candidate.phase_code {
            fom *= self.weights.sticky_weight;
        }

        fom
    }

    fn is_first_arrival_in_group(&self, candidate: &TheoreticalPhase) -> bool {
        self.theoretical
            .iter()
            .filter(|t| t.phase_group == candidate.phase_group)
            .min_by(|a, b| a.travel_time.partial_cmp(&b.travel_time).unwrap())
            .map(|first| first.phase_code == candidate.phase_code)
            .unwrap_or(false)
    }
}

fn arrival_type(code: &str) -> Option<char> {
    code.chars().next().map(|c| c.to_ascii_uppercase())
}

#[derive(Debug, Clone, Copy)]
struct TimeWindow {
    start: f64,
    end: f64,
}

impl TimeWindow {
    fn contains(&self, value: f64) -> bool {
        value >= self.start && value <= self.end
    }
}

fn cluster_window(cluster: &[&TheoreticalPhase]) -> TimeWindow {
    let start = cluster
        .iter()
        .map(|c| c.travel_time - c.spread)
        .fold(f64::INFINITY, f64::min);
    let end = cluster
        .iter()
        .map(|c| c.travel_time + c.spread)
        .fold(f64::NEG_INFINITY, f64::max);
    TimeWindow { start, end }
}

/// All order-preserving (strictly increasing index) subsequences of `0..n`
/// with length `k`. Clusters and per-station pick groups are small, so the
/// combinatorial enumeration is cheap in practice.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if k > n {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut current = Vec::with_capacity(k);
    combinations_helper(0, n, k, &mut current, &mut result);
    result
}

fn combinations_helper(start: usize, n: usize, k: usize, current: &mut Vec<usize>, result: &mut Vec<Vec<usize>>) {
    if current.len() == k {
        result.push(current.clone());
        return;
    }
    for i in start..n {
        current.push(i);
        combinations_helper(i + 1, n, k, current, result);
        current.pop();
    }
}

/// Group theoretical phases into clusters of overlapping `[travel_time -
/// spread, travel_time + spread]` windows, sorted by travel time.
fn cluster_overlapping(theoretical: &[TheoreticalPhase]) -> Vec<Vec<&TheoreticalPhase>> {
    let mut sorted: Vec<&TheoreticalPhase> = theoretical.iter().collect();
    sorted.sort_by(|a, b| a.travel_time.partial_cmp(&b.travel_time).unwrap());

    let mut clusters: Vec<Vec<&TheoreticalPhase>> = Vec::new();
    let mut current: Vec<&TheoreticalPhase> = Vec::new();
    let mut window_end = f64::NEG_INFINITY;

    for phase in sorted {
        let start = phase.travel_time - phase.spread;
        if current.is_empty() || start <= window_end {
            window_end = window_end.max(phase.travel_time + phase.spread);
            current.push(phase);
        } else {
            clusters.push(std::mem::take(&mut current));
            window_end = phase.travel_time + phase.spread;
            current.push(phase);
        }
    }
    if !current.is_empty() {
        clusters.push(current);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pick::AuthorType;
    use crate::core::station::{Station, StationId};

    fn theoretical() -> Vec<TheoreticalPhase> {
        vec![
            TheoreticalPhase {
                phase_code: "Pn".to_string(),
                travel_time: 10.0,
                spread: 1.0,
                observability: 0.8,
                phase_group: "P".to_string(),
                auxiliary_group: "P".to_string(),
                distance_discriminated: false,
                regional: true,
            },
            TheoreticalPhase {
                phase_code: "Sn".to_string(),
                travel_time: 18.0,
                spread: 1.5,
                observability: 0.6,
                phase_group: "S".to_string(),
                auxiliary_group: "S".to_string(),
                distance_discriminated: false,
                regional: true,
            },
        ]
    }

    fn group_with_pick(phase: &str, arrival: f64) -> (PickGroup, Vec<Pick>) {
        let station = Station::new(StationId::new("IU", "ANMO", ""), 34.9, -106.5, 1.7);
        let pick = Pick::new(
            StationId::new("IU", "ANMO", ""),
            "IU",
            "auto",
            AuthorType::ContribAuto,
            arrival,
            phase,
        );
        let picks = vec![pick];
        let group = PickGroup::new(station, vec![0], &picks);
        (group, picks)
    }

    #[test]
    fn pick_near_pn_gets_assigned_pn() {
        let theoretical = theoretical();
        let weights = IdentificationWeights {
            other_weight: 0.1,
            sticky_weight: 2.0,
        };
        let identifier = PhaseID::new(weights, 0.0, 5.0, &theoretical);
        let (group, mut picks) = group_with_pick("P", 10.1);
        identifier.identify(&group, &mut picks, true);
        assert_eq!(picks[0].current_phase, "Pn");
    }

    #[test]
    fn force_association_is_never_overridden() {
        let theoretical = theoretical();
        let weights = IdentificationWeights {
            other_weight: 0.1,
            sticky_weight: 2.0,
        };
        let identifier = PhaseID::new(weights, 0.0, 5.0, &theoretical);
        let (group, mut picks) = group_with_pick("P", 10.1);
        picks[0].flags.force_association = true;
        picks[0].current_phase = "Pg".to_string();
        let changed = identifier.identify(&group, &mut picks, true);
        assert!(!changed);
        assert_eq!(picks[0].current_phase, "Pg");
    }

    #[test]
    fn no_reidentify_fast_path_skips_scoring_when_within_tolerance() {
        let theoretical = theoretical();
        let weights = IdentificationWeights {
            other_weight: 0.1,
            sticky_weight: 2.0,
        };
        let identifier = PhaseID::new(weights, 0.0, 5.0, &theoretical);
        let (group, mut picks) = group_with_pick("P", 10.1);
        picks[0].current_phase = "Pn".to_string();
        let changed = identifier.identify(&group, &mut picks, false);
        assert!(!changed);
        assert_eq!(picks[0].current_phase, "Pn");
    }

    #[test]
    fn surface_wave_pick_is_force_associated_to_its_observed_phase() {
        let theoretical = theoretical();
        let weights = IdentificationWeights {
            other_weight: 0.1,
            sticky_weight: 2.0,
        };
        let identifier = PhaseID::new(weights, 0.0, 5.0, &theoretical);
        let (group, mut picks) = group_with_pick("LR", 400.0);
        picks[0].flags.surface_wave = true;
        let changed = identifier.identify(&group, &mut picks, true);
        assert!(changed);
        assert_eq!(picks[0].current_phase, "LR");
        assert!(picks[0].flags.force_association);
    }

    #[test]
    fn one_to_one_matching_never_assigns_two_picks_the_same_phase() {
        let theoretical = vec![TheoreticalPhase {
            phase_code: "Pn".to_string(),
            travel_time: 10.0,
            spread: 1.0,
            observability: 0.8,
            phase_group: "P".to_string(),
            auxiliary_group: "P".to_string(),
            distance_discriminated: false,
            regional: true,
        }];
        let weights = IdentificationWeights {
            other_weight: 0.1,
            sticky_weight: 2.0,
        };
        let identifier = PhaseID::new(weights, 0.0, 5.0, &theoretical);

        let station = Station::new(StationId::new("IU", "ANMO", ""), 34.9, -106.5, 1.7);
        let picks = vec![
            Pick::new(StationId::new("IU", "ANMO", ""), "IU", "auto", AuthorType::ContribAuto, 10.1, "P"),
            Pick::new(StationId::new("IU", "ANMO", ""), "IU", "auto", AuthorType::ContribAuto, 10.3, "P"),
        ];
        let group = PickGroup::new(station, vec![0, 1], &picks);
        let mut picks = picks;
        identifier.identify(&group, &mut picks, true);

        let assigned_pn = picks.iter().filter(|p| p.current_phase == "Pn").count();
        assert!(assigned_pn <= 1, "only one pick may claim the sole candidate phase");
    }

    #[test]
    fn distance_discriminated_candidate_is_downweighted() {
        let discriminated = TheoreticalPhase {
            phase_code: "Pn".to_string(),
            travel_time: 10.0,
            spread: 1.0,
            observability: 0.8,
            phase_group: "P".to_string(),
            auxiliary_group: "P".to_string(),
            distance_discriminated: true,
            regional: true,
        };
        let plain = TheoreticalPhase {
            distance_discriminated: false,
            ..discriminated.clone()
        };
        let weights = IdentificationWeights {
            other_weight: 0.1,
            sticky_weight: 2.0,
        };
        let identifier = PhaseID::new(weights, 0.0, 5.0, &[]);
        let pick = Pick::new(StationId::new("IU", "ANMO", ""), "IU", "auto", AuthorType::ContribAuto, 10.1, "P");
        let with_flag = identifier.figure_of_merit(&pick, &discriminated, 10.1);
        let without_flag = identifier.figure_of_merit(&pick, &plain, 10.1);
        assert!(with_flag < without_flag);
    }
}
