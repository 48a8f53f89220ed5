use serde::{Deserialize, Serialize};

use crate::constants::SCROLL_COMPLETE_THRESHOLD;

/// A scroll position sample: how far down the page is, out of how much.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    pub fn new(offset: f64, content_height: f64, viewport_height: f64) -> Self {
        Self {
            offset,
            content_height,
            viewport_height,
        }
    }

    /// Fraction of the scrollable distance covered, in `[0, 1]`.
    /// A page that fits in the viewport has no scrollable distance and reports 0.
    pub fn progress(&self) -> f64 {
        let scrollable = self.content_height - self.viewport_height;
        if !(scrollable > 0.0) || !self.offset.is_finite() {
            return 0.0;
        }
        (self.offset / scrollable).clamp(0.0, 1.0)
    }

    /// Whether the reader has gone far enough to count the page as read.
    pub fn is_complete(&self) -> bool {
        self.progress() >= SCROLL_COMPLETE_THRESHOLD
    }
}
