//! HypoAudit: an immutable snapshot of the hypocenter used as a fallback
//! restore point and debugging record (spec.md §3).

use crate::core::hypocenter::Hypocenter;

/// Immutable snapshot of a hypocenter plus iteration coordinates and
/// status, taken at the top of `Stepper::make_step`.
#[derive(Debug, Clone)]
pub struct HypoAudit {
    pub origin_time: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub dispersion: f64,
    pub step_length: f64,
    pub stage: usize,
    pub iteration: u32,
    pub status: String,
}

impl HypoAudit {
    pub fn snapshot(hypo: &Hypocenter, stage: usize, iteration: u32, status: impl Into<String>) -> Self {
        Self {
            origin_time: hypo.origin_time,
            latitude: hypo.latitude,
            longitude: hypo.longitude,
            depth: hypo.depth,
            dispersion: hypo.dispersion,
            step_length: hypo.step_length,
            stage,
            iteration,
            status: status.into(),
        }
    }

    /// Whether `hypo`'s four primary coordinates exactly match this audit
    /// (used by `Stepper::make_step`'s damping loop to detect a no-op
    /// restore, per spec.md §4.6).
    pub fn matches_primary_coordinates(&self, hypo: &Hypocenter) -> bool {
        self.origin_time == hypo.origin_time
            && self.latitude == hypo.latitude
            && self.longitude == hypo.longitude
            && self.depth == hypo.depth
    }
}

/// Fixed-capacity ring buffer of hypocenter audits (spec.md §3).
#[derive(Debug, Clone)]
pub struct AuditTrail {
    capacity: usize,
    entries: std::collections::VecDeque<HypoAudit>,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: std::collections::VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, audit: HypoAudit) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(audit);
    }

    pub fn latest(&self) -> Option<&HypoAudit> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HypoAudit> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut trail = AuditTrail::new(2);
        let hypo = Hypocenter::new(0.0, 0.0, 0.0, 10.0, 3);
        trail.push(HypoAudit::snapshot(&hypo, 0, 1, "entering"));
        trail.push(HypoAudit::snapshot(&hypo, 0, 2, "stepped"));
        trail.push(HypoAudit::snapshot(&hypo, 0, 3, "converged"));
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.latest().unwrap().iteration, 3);
        assert_eq!(trail.iter().next().unwrap().iteration, 2);
    }

    #[test]
    fn matches_primary_coordinates_detects_noop_restore() {
        let hypo = Hypocenter::new(0.0, 10.0, 20.0, 30.0, 3);
        let audit = HypoAudit::snapshot(&hypo, 0, 0, "entering");
        assert!(audit.matches_primary_coordinates(&hypo));

        let mut moved = hypo.clone();
        moved.apply_step(10.0, &[1.0, 0.0, 0.0], 0.0);
        assert!(!audit.matches_primary_coordinates(&moved));
    }
}
