use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTOPLAY_RETRY_MS, DISCOVERY_DELAY_MS, HINT_DELAY_MS, HOLD_MS, LOAD_FALLBACK_MS,
    MIN_SPLASH_MS, MOBILE_ALERT_MS, REVEAL_DELAY_MS, SCROLL_RESTORE_MS,
};

/// Every fixed delay used by the page load: onboarding, the hidden-feature
/// gate, scroll restore, the small-screen alert and the autoplay retry.
///
/// All values are milliseconds. Missing fields deserialize to the defaults in
/// [`crate::constants`], so a partial `[timings]` table is valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub min_splash_ms: u64,
    pub load_fallback_ms: u64,
    pub reveal_delay_ms: u64,
    pub hint_delay_ms: u64,
    pub hold_ms: u64,
    pub discovery_delay_ms: u64,
    pub scroll_restore_ms: u64,
    pub mobile_alert_ms: u64,
    pub autoplay_retry_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            min_splash_ms: MIN_SPLASH_MS,
            load_fallback_ms: LOAD_FALLBACK_MS,
            reveal_delay_ms: REVEAL_DELAY_MS,
            hint_delay_ms: HINT_DELAY_MS,
            hold_ms: HOLD_MS,
            discovery_delay_ms: DISCOVERY_DELAY_MS,
            scroll_restore_ms: SCROLL_RESTORE_MS,
            mobile_alert_ms: MOBILE_ALERT_MS,
            autoplay_retry_ms: AUTOPLAY_RETRY_MS,
        }
    }
}
