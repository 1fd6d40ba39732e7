//! Hypocenter: the mutable state of the current solution plus geometry
//! caches (spec.md §3, §4.1).

use crate::core::config::{DEPTH_MAX, DEPTH_MIN, DEG2KM};
use crate::core::geo::{self, TrigCache};

/// The hypocenter solution plus the iteration bookkeeping `Stepper` and
/// `LocationLoop` need between calls.
#[derive(Debug, Clone)]
pub struct Hypocenter {
    /// Origin time, seconds since epoch.
    pub origin_time: f64,
    /// Geographic latitude, degrees.
    pub latitude: f64,
    /// Longitude, degrees, normalized to `(-180, 180]`.
    pub longitude: f64,
    /// Depth, km, clamped to `[DEPTH_MIN, DEPTH_MAX]`.
    pub depth: f64,

    /// Bayesian depth prior mean, km, if set (analyst-provided or derived
    /// from `ZoneStats`).
    pub bayes_depth: Option<f64>,
    /// Bayesian depth prior spread, km.
    pub bayes_spread: Option<f64>,

    /// Cached geocentric colatitude, degrees.
    colatitude: f64,
    /// Cached sines/cosines of colatitude and longitude.
    trig: TrigCache,

    /// Degrees of freedom for this stage: 2 (epicenter only) or 3
    /// (epicenter + depth).
    pub dof: usize,

    /// Iteration state, reset at the top of each `Stepper::make_step`.
    pub step_length: f64,
    pub horizontal_step_km: f64,
    pub vertical_step_km: f64,
    pub damping_count: u32,
    /// Linear time shift applied alongside the last spatial step, seconds.
    pub time_shift: f64,
    pub dispersion: f64,
    pub rms_equivalent: f64,
    /// Unit step direction, length `dof`.
    pub step_direction: Vec<f64>,
}

impl Hypocenter {
    pub fn new(origin_time: f64, latitude: f64, longitude: f64, depth: f64, dof: usize) -> Self {
        let depth = depth.clamp(DEPTH_MIN, DEPTH_MAX);
        let longitude = geo::normalize_longitude(longitude);
        let colatitude = geo::colatitude_from_latitude(latitude);
        let trig = TrigCache::new(colatitude, longitude);
        Self {
            origin_time,
            latitude,
            longitude,
            depth,
            bayes_depth: None,
            bayes_spread: None,
            colatitude,
            trig,
            dof,
            step_length: 0.0,
            horizontal_step_km: 0.0,
            vertical_step_km: 0.0,
            damping_count: 0,
            time_shift: 0.0,
            dispersion: 0.0,
            rms_equivalent: 0.0,
            step_direction: vec![0.0; dof],
        }
    }

    pub fn colatitude(&self) -> f64 {
        self.colatitude
    }

    pub fn trig(&self) -> TrigCache {
        self.trig
    }

    /// Residual of the Bayesian depth virtual observation: `bayesDepth -
    /// depth`, `None` if no prior is set.
    pub fn depth_residual(&self) -> Option<f64> {
        self.bayes_depth.map(|bd| bd - self.depth)
    }

    /// Weight of the Bayesian depth virtual observation: `3 / spread`.
    pub fn depth_weight(&self) -> Option<f64> {
        self.bayes_spread.map(|spread| 3.0 / spread)
    }

    /// Recompute the colatitude/trig caches from the current
    /// latitude/longitude. Must be called after any direct mutation of
    /// `latitude`/`longitude` outside of [`Hypocenter::apply_step`].
    pub fn refresh_caches(&mut self) {
        self.colatitude = geo::colatitude_from_latitude(self.latitude);
        self.trig = TrigCache::new(self.colatitude, self.longitude);
    }

    /// Apply a linearized step of length `step_len` along unit direction
    /// `direction` (length 2 or 3), plus a time shift `dt`, per spec.md
    /// §4.1. Handles colatitude wraparound and longitude normalization, and
    /// recomputes the trig caches.
    pub fn apply_step(&mut self, step_len: f64, direction: &[f64], dt: f64) {
        debug_assert_eq!(direction.len(), self.dof);

        let mut colat = self.colatitude + step_len * direction[0] / DEG2KM;
        let sin_colat0 = self.trig.sin_colat.max(1e-9);
        let mut lon = self.longitude + step_len * direction[1] / (DEG2KM * sin_colat0);

        if colat < 0.0 {
            colat = -colat;
            lon += 180.0;
        } else if colat > 180.0 {
            colat = 360.0 - colat;
            lon += 180.0;
        }
        lon = geo::normalize_longitude(lon);

        self.latitude = geo::latitude_from_colatitude(colat);
        self.longitude = lon;

        if self.dof == 3 {
            self.depth = (self.depth + step_len * direction[2]).clamp(DEPTH_MIN, DEPTH_MAX);
        }

        self.origin_time += dt;
        self.step_length = step_len;
        self.time_shift = dt;
        self.step_direction = direction.to_vec();

        self.refresh_caches();
    }

    /// Restore the four primary coordinates (origin time, lat, lon, depth)
    /// from a snapshot. Iteration state is left untouched — callers reset it
    /// explicitly as part of entering a new step attempt.
    pub fn reset_hypo(&mut self, origin_time: f64, latitude: f64, longitude: f64, depth: f64) {
        self.origin_time = origin_time;
        self.latitude = latitude;
        self.longitude = geo::normalize_longitude(longitude);
        self.depth = depth.clamp(DEPTH_MIN, DEPTH_MAX);
        self.refresh_caches();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypo() -> Hypocenter {
        Hypocenter::new(0.0, 35.0, -100.0, 10.0, 3)
    }

    #[test]
    fn depth_clamped_on_construction() {
        let h = Hypocenter::new(0.0, 0.0, 0.0, -50.0, 3);
        assert_eq!(h.depth, DEPTH_MIN);
        let h = Hypocenter::new(0.0, 0.0, 0.0, 5000.0, 3);
        assert_eq!(h.depth, DEPTH_MAX);
    }

    #[test]
    fn apply_step_keeps_depth_and_longitude_in_range() {
        let mut h = hypo();
        for _ in 0..50 {
            h.apply_step(200.0, &[1.0, 1.0, 1.0], 1.0);
            assert!(h.depth >= DEPTH_MIN && h.depth <= DEPTH_MAX);
            assert!(h.longitude > -180.0 && h.longitude <= 180.0);
        }
    }

    #[test]
    fn trig_identity_holds_after_step() {
        let mut h = hypo();
        h.apply_step(50.0, &[0.3, -0.4, 0.8], 0.5);
        let trig = h.trig();
        assert!((trig.sin_colat.powi(2) + trig.cos_colat.powi(2) - 1.0).abs() < 1e-12);
        assert!((trig.sin_lon.powi(2) + trig.cos_lon.powi(2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn depth_prior_derives_residual_and_weight() {
        let mut h = hypo();
        h.bayes_depth = Some(15.0);
        h.bayes_spread = Some(3.0);
        assert_eq!(h.depth_residual(), Some(5.0));
        assert_eq!(h.depth_weight(), Some(1.0));
    }

    #[test]
    fn reset_hypo_restores_primary_coordinates_only() {
        let mut h = hypo();
        h.step_length = 42.0;
        h.reset_hypo(100.0, 10.0, 20.0, 30.0);
        assert_eq!(h.origin_time, 100.0);
        assert_eq!(h.latitude, 10.0);
        assert_eq!(h.longitude, 20.0);
        assert_eq!(h.depth, 30.0);
        assert_eq!(h.step_length, 42.0, "iteration state untouched by reset");
    }
}
