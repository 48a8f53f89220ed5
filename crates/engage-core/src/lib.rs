//! Engagement tracking for the portfolio site.
//!
//! A handful of small cooperating state machines: a one-shot onboarding
//! sequence (splash, reveal, hint), an exploration score accumulated from
//! milestone flags, and a long-press gate that opens a hidden feature.
//! State survives reloads through a session store; the discovery flag and
//! the visitor's device preferences live in a persistent store.
//!
//! Zero I/O. Storage and time are injected; [`EngagementTracker`] is driven by
//! calling its input methods with the current time.

pub mod clock;
pub mod constants;
pub mod engagement;
pub mod export;
pub mod gate;
pub mod onboarding;
pub mod persist;
pub mod preferences;
pub mod scroll;
pub mod storage;
pub mod time;
pub mod timing;
pub mod tracker;
pub mod visibility;

pub use clock::{Millis, Scheduler, Timer, TimerHandle, VirtualScheduler};
pub use constants::{PAGE_REGIONS, keys};
pub use engagement::{EngagementState, case_study_weight, exploration_percentage};
pub use export::{EXPORT_VERSION, EngagementExport, ExportError, export_json, import_json};
pub use gate::{GatePhase, HiddenFeatureGate, Release};
pub use onboarding::{
    HintStatus, OnboardingEvent, OnboardingPhase, OnboardingSequencer, OnboardingState,
};
pub use persist::{Persistence, Scope};
pub use preferences::{Autoplay, AutoplayOutcome, AutoplayPhase, Preferences, clamp_volume};
pub use scroll::ScrollMetrics;
pub use storage::{KeyValueStore, MemoryStore, StorageError};
pub use time::{millis_to_iso8601, now_iso8601, now_unix_millis};
pub use timing::Timings;
pub use tracker::{Dashboard, EngagementTracker, Signal};
pub use visibility::{ObservationHandle, VisibilitySource};
