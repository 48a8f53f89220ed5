//! One-shot splash → reveal → hint sequence run on every page load.
//!
//! ```text
//! NotStarted ─┬─▶ Loading ──(host loaded ∧ min splash)──▶ ContentRevealing ──(reveal delay)──▶ Idle(Armed)
//!             │                                                                  │               │ hint delay
//!             │                                                  hint suppressed ▼               ▼
//!             └─(splash already shown this session)──────────────────────▶ Idle(Unarmed)   Idle(Fired)
//!                                                                                                │ dismiss
//!                                                                                                ▼
//!                                                                                          Idle(Dismissed)
//! ```
//!
//! A cancelled hint (hidden feature opened first) ends in `Idle(Cancelled)`.

use serde::Serialize;

use crate::clock::{Scheduler, Timer, TimerHandle};
use crate::timing::Timings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintStatus {
    /// No hint will be shown during this load.
    Unarmed,
    Armed,
    /// Popup is showing.
    Fired,
    Dismissed,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnboardingPhase {
    NotStarted,
    Loading,
    ContentRevealing,
    Idle(HintStatus),
}

/// What the sequencer did; the tracker turns these into storage writes and signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnboardingEvent {
    /// Left `Loading`. The splash must not be shown again this session.
    SplashFinished,
    ContentRevealed,
    HintShown,
    HintDismissed,
}

/// Presentation flags derived from the current phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OnboardingState {
    pub is_loading: bool,
    pub show_content: bool,
    pub website_fully_loaded: bool,
    pub hint_pending: bool,
    pub hint_visible: bool,
}

#[derive(Debug)]
pub struct OnboardingSequencer {
    timings: Timings,
    phase: OnboardingPhase,
    host_loaded: bool,
    min_elapsed: bool,
    hint_suppressed: bool,
    splash_timer: Option<TimerHandle>,
    fallback_timer: Option<TimerHandle>,
    reveal_timer: Option<TimerHandle>,
    hint_timer: Option<TimerHandle>,
}

impl OnboardingSequencer {
    pub fn new(timings: Timings) -> Self {
        Self {
            timings,
            phase: OnboardingPhase::NotStarted,
            host_loaded: false,
            min_elapsed: false,
            hint_suppressed: false,
            splash_timer: None,
            fallback_timer: None,
            reveal_timer: None,
            hint_timer: None,
        }
    }

    pub fn phase(&self) -> OnboardingPhase {
        self.phase
    }

    pub fn state(&self) -> OnboardingState {
        let idle = matches!(self.phase, OnboardingPhase::Idle(_));
        OnboardingState {
            is_loading: self.phase == OnboardingPhase::Loading,
            show_content: idle,
            website_fully_loaded: idle,
            hint_pending: matches!(
                self.phase,
                OnboardingPhase::Idle(HintStatus::Armed | HintStatus::Fired)
            ),
            hint_visible: self.phase == OnboardingPhase::Idle(HintStatus::Fired),
        }
    }

    /// Begin the sequence for this page load.
    ///
    /// `splash_already_shown` skips straight to idle content with no hint.
    /// `hint_suppressed` means the hint was already dismissed this session.
    /// `host_loaded` is true when the host finished loading before we started.
    pub fn start(
        &mut self,
        splash_already_shown: bool,
        hint_suppressed: bool,
        host_loaded: bool,
        sched: &mut impl Scheduler<Timer>,
    ) -> Vec<OnboardingEvent> {
        if self.phase != OnboardingPhase::NotStarted {
            return Vec::new();
        }
        self.hint_suppressed = hint_suppressed;

        if splash_already_shown {
            tracing::debug!("splash already shown this session, revealing immediately");
            self.phase = OnboardingPhase::Idle(HintStatus::Unarmed);
            return vec![OnboardingEvent::ContentRevealed];
        }

        self.phase = OnboardingPhase::Loading;
        self.host_loaded = host_loaded;
        self.splash_timer = Some(sched.after(self.timings.min_splash_ms, Timer::SplashMinimum));
        if !host_loaded {
            self.fallback_timer =
                Some(sched.after(self.timings.load_fallback_ms, Timer::LoadFallback));
        }
        tracing::debug!(host_loaded, "splash started");
        Vec::new()
    }

    /// The host finished loading its resources.
    pub fn host_loaded(&mut self, sched: &mut impl Scheduler<Timer>) -> Vec<OnboardingEvent> {
        if self.phase != OnboardingPhase::Loading || self.host_loaded {
            return Vec::new();
        }
        self.host_loaded = true;
        if let Some(h) = self.fallback_timer.take() {
            sched.cancel(h);
        }
        self.try_finish_splash(sched)
    }

    /// Dispatch one of this sequencer's timers. Other timers are ignored.
    pub fn on_timer(
        &mut self,
        handle: TimerHandle,
        timer: Timer,
        sched: &mut impl Scheduler<Timer>,
    ) -> Vec<OnboardingEvent> {
        match timer {
            Timer::SplashMinimum if self.splash_timer == Some(handle) => {
                self.splash_timer = None;
                self.min_elapsed = true;
                self.try_finish_splash(sched)
            }
            Timer::LoadFallback if self.fallback_timer == Some(handle) => {
                self.fallback_timer = None;
                tracing::debug!("no host load signal, using fallback");
                self.host_loaded = true;
                self.try_finish_splash(sched)
            }
            Timer::Reveal if self.reveal_timer == Some(handle) => {
                self.reveal_timer = None;
                self.reveal(sched)
            }
            Timer::Hint if self.hint_timer == Some(handle) => {
                self.hint_timer = None;
                if self.phase != OnboardingPhase::Idle(HintStatus::Armed) {
                    return Vec::new();
                }
                self.phase = OnboardingPhase::Idle(HintStatus::Fired);
                tracing::debug!("hint shown");
                vec![OnboardingEvent::HintShown]
            }
            _ => Vec::new(),
        }
    }

    /// The visitor closed the hint popup.
    pub fn dismiss_hint(&mut self) -> Option<OnboardingEvent> {
        if self.phase != OnboardingPhase::Idle(HintStatus::Fired) {
            return None;
        }
        self.phase = OnboardingPhase::Idle(HintStatus::Dismissed);
        Some(OnboardingEvent::HintDismissed)
    }

    /// Withdraw the hint: disarm a pending hint timer, close a showing popup,
    /// or make sure a reveal still in progress never arms one.
    /// Returns `true` if a pending or showing hint was withdrawn.
    pub fn cancel_hint(&mut self, sched: &mut impl Scheduler<Timer>) -> bool {
        self.hint_suppressed = true;
        match self.phase {
            OnboardingPhase::Idle(HintStatus::Armed) | OnboardingPhase::Idle(HintStatus::Fired) => {
                if let Some(h) = self.hint_timer.take() {
                    sched.cancel(h);
                }
                self.phase = OnboardingPhase::Idle(HintStatus::Cancelled);
                tracing::debug!("hint cancelled");
                true
            }
            _ => false,
        }
    }

    /// Disarm every timer this sequencer owns.
    pub fn teardown(&mut self, sched: &mut impl Scheduler<Timer>) {
        for h in [
            self.splash_timer.take(),
            self.fallback_timer.take(),
            self.reveal_timer.take(),
            self.hint_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            sched.cancel(h);
        }
    }

    fn try_finish_splash(&mut self, sched: &mut impl Scheduler<Timer>) -> Vec<OnboardingEvent> {
        if self.phase != OnboardingPhase::Loading || !self.host_loaded || !self.min_elapsed {
            return Vec::new();
        }
        if let Some(h) = self.fallback_timer.take() {
            sched.cancel(h);
        }
        self.phase = OnboardingPhase::ContentRevealing;
        self.reveal_timer = Some(sched.after(self.timings.reveal_delay_ms, Timer::Reveal));
        tracing::debug!(at = sched.now(), "splash finished");
        vec![OnboardingEvent::SplashFinished]
    }

    fn reveal(&mut self, sched: &mut impl Scheduler<Timer>) -> Vec<OnboardingEvent> {
        if self.phase != OnboardingPhase::ContentRevealing {
            return Vec::new();
        }
        if self.hint_suppressed {
            self.phase = OnboardingPhase::Idle(HintStatus::Unarmed);
        } else {
            self.hint_timer = Some(sched.after(self.timings.hint_delay_ms, Timer::Hint));
            self.phase = OnboardingPhase::Idle(HintStatus::Armed);
        }
        tracing::debug!(at = sched.now(), phase = ?self.phase, "content revealed");
        vec![OnboardingEvent::ContentRevealed]
    }
}
