//! Device-wide visitor preferences and the once-per-session music autoplay.

use serde::Serialize;

use crate::clock::{Millis, Scheduler, Timer, TimerHandle};
use crate::constants::{DEFAULT_AUDIO_VOLUME, keys};
use crate::persist::{Persistence, Scope};

/// Toggles the visitor set on this device. All live in the persistent scope.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Preferences {
    pub lite_mode: bool,
    pub custom_cursor: bool,
    pub audio_playing: bool,
    /// Always within `[0, 1]`.
    pub audio_volume: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            lite_mode: false,
            custom_cursor: false,
            audio_playing: false,
            audio_volume: DEFAULT_AUDIO_VOLUME,
        }
    }
}

impl Preferences {
    /// Missing or malformed values fall back to the defaults.
    pub fn rehydrate(store: &Persistence) -> Self {
        Self {
            lite_mode: store.read_flag(Scope::Persistent, keys::IS_LITE_MODE),
            custom_cursor: store.read_flag(Scope::Persistent, keys::IS_CUSTOM_CURSOR),
            audio_playing: store.read_flag(Scope::Persistent, keys::AUDIO_PLAYING),
            audio_volume: store
                .read_number(Scope::Persistent, keys::AUDIO_VOLUME)
                .map(clamp_volume)
                .unwrap_or(DEFAULT_AUDIO_VOLUME),
        }
    }
}

pub fn clamp_volume(volume: f64) -> f64 {
    volume.clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoplayPhase {
    /// No attempt requested yet on this load.
    Idle,
    /// Waiting for the host to report how an attempt went.
    Attempting { retry: bool },
    /// The first attempt was blocked; the retry timer is armed.
    RetryPending,
    /// Music started, the visitor took over, or it already ran this session.
    Settled,
    /// Both attempts were blocked. The visitor has to start it by hand.
    Blocked,
}

/// What the host's report changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoplayOutcome {
    Ignored,
    Started,
    RetryScheduled,
    GaveUp,
}

/// Browsers often block autoplay. One attempt on mount, one retry after a
/// short delay, then give up until the next session.
#[derive(Debug)]
pub struct Autoplay {
    retry_ms: Millis,
    phase: AutoplayPhase,
    timer: Option<TimerHandle>,
}

impl Autoplay {
    pub fn new(retry_ms: Millis) -> Self {
        Self {
            retry_ms,
            phase: AutoplayPhase::Idle,
            timer: None,
        }
    }

    pub fn phase(&self) -> AutoplayPhase {
        self.phase
    }

    /// The audio control mounted. Returns `true` when the host should try to
    /// start playback; `already_started` covers both this session's earlier
    /// autoplay and music the visitor left playing.
    pub fn begin(&mut self, already_started: bool) -> bool {
        if self.phase != AutoplayPhase::Idle {
            return false;
        }
        if already_started {
            self.phase = AutoplayPhase::Settled;
            return false;
        }
        self.phase = AutoplayPhase::Attempting { retry: false };
        true
    }

    pub fn report(&mut self, started: bool, sched: &mut impl Scheduler<Timer>) -> AutoplayOutcome {
        let AutoplayPhase::Attempting { retry } = self.phase else {
            return AutoplayOutcome::Ignored;
        };
        if started {
            self.phase = AutoplayPhase::Settled;
            return AutoplayOutcome::Started;
        }
        if retry {
            self.phase = AutoplayPhase::Blocked;
            tracing::debug!("autoplay blocked twice, giving up");
            return AutoplayOutcome::GaveUp;
        }
        self.timer = Some(sched.after(self.retry_ms, Timer::AutoplayRetry));
        self.phase = AutoplayPhase::RetryPending;
        AutoplayOutcome::RetryScheduled
    }

    /// Retry timer elapsed. Returns `true` when the host should try again.
    pub fn on_retry(&mut self, handle: TimerHandle) -> bool {
        if self.timer != Some(handle) || self.phase != AutoplayPhase::RetryPending {
            return false;
        }
        self.timer = None;
        self.phase = AutoplayPhase::Attempting { retry: true };
        true
    }

    /// The visitor started or stopped the music themselves.
    pub fn settle(&mut self, sched: &mut impl Scheduler<Timer>) {
        self.teardown(sched);
        self.phase = AutoplayPhase::Settled;
    }

    pub fn teardown(&mut self, sched: &mut impl Scheduler<Timer>) {
        if let Some(h) = self.timer.take() {
            sched.cancel(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualScheduler;

    #[test]
    fn test_defaults_when_nothing_stored() {
        let p = Persistence::in_memory();
        assert_eq!(Preferences::rehydrate(&p), Preferences::default());
        assert_eq!(Preferences::default().audio_volume, 0.5);
    }

    #[test]
    fn test_rehydrate_reads_stored_values() {
        let mut p = Persistence::in_memory();
        p.write_flag(Scope::Persistent, keys::IS_LITE_MODE, true);
        p.write_flag(Scope::Persistent, keys::IS_CUSTOM_CURSOR, false);
        p.write_raw(Scope::Persistent, keys::AUDIO_VOLUME, "0.25");
        let prefs = Preferences::rehydrate(&p);
        assert!(prefs.lite_mode);
        assert!(!prefs.custom_cursor);
        assert_eq!(prefs.audio_volume, 0.25);
    }

    #[test]
    fn test_volume_out_of_range_or_garbage() {
        let mut p = Persistence::in_memory();
        p.write_raw(Scope::Persistent, keys::AUDIO_VOLUME, "7");
        assert_eq!(Preferences::rehydrate(&p).audio_volume, 1.0);
        p.write_raw(Scope::Persistent, keys::AUDIO_VOLUME, "loud");
        assert_eq!(Preferences::rehydrate(&p).audio_volume, 0.5);
    }

    #[test]
    fn test_autoplay_started_first_try() {
        let mut sched = VirtualScheduler::new(0);
        let mut a = Autoplay::new(500);
        assert!(a.begin(false));
        assert_eq!(a.report(true, &mut sched), AutoplayOutcome::Started);
        assert_eq!(a.phase(), AutoplayPhase::Settled);
        assert_eq!(a.report(true, &mut sched), AutoplayOutcome::Ignored);
        assert!(!a.begin(false), "one attempt sequence per load");
    }

    #[test]
    fn test_autoplay_retries_once_then_gives_up() {
        let mut sched = VirtualScheduler::new(0);
        let mut a = Autoplay::new(500);
        a.begin(false);
        assert_eq!(a.report(false, &mut sched), AutoplayOutcome::RetryScheduled);
        assert!(sched.pop_due(499).is_none());
        let (h, t) = sched.pop_due(500).unwrap();
        assert_eq!(t, Timer::AutoplayRetry);
        assert!(a.on_retry(h));
        assert!(!a.on_retry(h));
        assert_eq!(a.report(false, &mut sched), AutoplayOutcome::GaveUp);
        assert_eq!(a.phase(), AutoplayPhase::Blocked);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_autoplay_skipped_when_already_started() {
        let mut a = Autoplay::new(500);
        assert!(!a.begin(true));
        assert_eq!(a.phase(), AutoplayPhase::Settled);
    }

    #[test]
    fn test_settle_cancels_retry() {
        let mut sched = VirtualScheduler::new(0);
        let mut a = Autoplay::new(500);
        a.begin(false);
        a.report(false, &mut sched);
        a.settle(&mut sched);
        assert_eq!(sched.pending(), 0);
        assert_eq!(a.phase(), AutoplayPhase::Settled);
    }
}
