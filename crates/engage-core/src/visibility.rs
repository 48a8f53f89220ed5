use std::collections::HashMap;

use crate::constants::VISIBILITY_THRESHOLD;

/// Handle returned by [`VisibilitySource::observe`]; pass it back to stop observing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObservationHandle(u64);

#[derive(Debug)]
struct Observation {
    handle: ObservationHandle,
    fired: bool,
}

/// Reports the first time each observed region becomes mostly visible.
///
/// Fires at most once per region per observation. Unobserving and observing
/// again starts a fresh observation that may fire again.
#[derive(Debug)]
pub struct VisibilitySource {
    threshold: f64,
    regions: HashMap<String, Observation>,
    next_handle: u64,
}

impl Default for VisibilitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySource {
    pub fn new() -> Self {
        Self {
            threshold: VISIBILITY_THRESHOLD,
            regions: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Start observing `region`. Observing a region twice returns the
    /// existing handle and keeps its fired state.
    pub fn observe(&mut self, region: &str) -> ObservationHandle {
        if let Some(obs) = self.regions.get(region) {
            return obs.handle;
        }
        let handle = ObservationHandle(self.next_handle);
        self.next_handle += 1;
        self.regions.insert(
            region.to_string(),
            Observation {
                handle,
                fired: false,
            },
        );
        handle
    }

    /// Stop observing. Returns `false` for unknown or stale handles.
    pub fn unobserve(&mut self, handle: ObservationHandle) -> bool {
        let before = self.regions.len();
        self.regions.retain(|_, obs| obs.handle != handle);
        self.regions.len() != before
    }

    pub fn is_observed(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    /// Feed an intersection measurement. Returns `true` when this is the
    /// region's first crossing of the threshold in the current observation.
    pub fn report(&mut self, region: &str, visible_fraction: f64) -> bool {
        let Some(obs) = self.regions.get_mut(region) else {
            return false;
        };
        if obs.fired || visible_fraction.is_nan() || visible_fraction < self.threshold {
            return false;
        }
        obs.fired = true;
        tracing::debug!(region, visible_fraction, "region became visible");
        true
    }

    /// Stop observing everything.
    pub fn disconnect(&mut self) {
        self.regions.clear();
    }
}
