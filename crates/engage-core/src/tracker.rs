//! Page-load orchestration of every engagement component.
//!
//! The tracker is the only place that writes storage. Inputs carry the current
//! time and first advance the scheduler to it, so a timer due at the same
//! instant as an input is handled before the input.

use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::clock::{Millis, Scheduler, Timer, TimerHandle, VirtualScheduler};
use crate::constants::{PAGE_REGIONS, VISITOR_NUMBER_MAX, VISITOR_NUMBER_MIN, keys};
use crate::engagement::EngagementState;
use crate::gate::{GatePhase, HiddenFeatureGate, Release};
use crate::onboarding::{OnboardingEvent, OnboardingPhase, OnboardingSequencer, OnboardingState};
use crate::persist::{Persistence, Scope};
use crate::preferences::{Autoplay, AutoplayOutcome, AutoplayPhase, Preferences, clamp_volume};
use crate::scroll::ScrollMetrics;
use crate::timing::Timings;
use crate::visibility::VisibilitySource;

/// Notifications for the presentation layer, in the order they happened.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "signal", content = "value", rename_all = "snake_case")]
pub enum Signal {
    SplashFinished,
    ContentRevealed,
    HintShown,
    HintDismissed,
    /// The reality shift withdrew a pending or showing hint.
    HintCancelled,
    /// Start the full-screen transition into the hidden feature.
    RealityShift,
    /// Show the discovery confirmation popup.
    DiscoveryConfirmed,
    DiscoveryClosed,
    SectionViewed(String),
    CaseStudyViewed(String),
    PortfolioScrollCompleted,
    ExplorationChanged(u8),
    ScrollRestored(f64),
    /// Recommend the desktop site to a small screen.
    MobileAlertShown,
    MobileAlertClosed,
    /// Ask the host to start the background music, then report back.
    AutoplayRequested,
    AudioPlaying(bool),
    VolumeChanged(f64),
    LiteModeChanged(bool),
    CustomCursorChanged(bool),
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::SplashFinished => write!(f, "splash finished"),
            Signal::ContentRevealed => write!(f, "content revealed"),
            Signal::HintShown => write!(f, "hint shown"),
            Signal::HintDismissed => write!(f, "hint dismissed"),
            Signal::HintCancelled => write!(f, "hint cancelled"),
            Signal::RealityShift => write!(f, "reality shift"),
            Signal::DiscoveryConfirmed => write!(f, "discovery confirmed"),
            Signal::DiscoveryClosed => write!(f, "discovery closed"),
            Signal::SectionViewed(id) => write!(f, "section viewed: {id}"),
            Signal::CaseStudyViewed(id) => write!(f, "case study viewed: {id}"),
            Signal::PortfolioScrollCompleted => write!(f, "portfolio scroll completed"),
            Signal::ExplorationChanged(pct) => write!(f, "explored {pct}%"),
            Signal::ScrollRestored(offset) => write!(f, "scroll restored to {offset}"),
            Signal::MobileAlertShown => write!(f, "mobile alert shown"),
            Signal::MobileAlertClosed => write!(f, "mobile alert closed"),
            Signal::AutoplayRequested => write!(f, "autoplay requested"),
            Signal::AudioPlaying(on) => write!(f, "music {}", on_off(*on)),
            Signal::VolumeChanged(volume) => write!(f, "volume {volume}"),
            Signal::LiteModeChanged(on) => write!(f, "lite mode {}", on_off(*on)),
            Signal::CustomCursorChanged(on) => write!(f, "custom cursor {}", on_off(*on)),
        }
    }
}

/// The figures shown in the site's data panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub explored_percentage: u8,
    pub reality_discovered: bool,
    pub visitor_number: u32,
}

pub struct EngagementTracker {
    store: Persistence,
    timings: Timings,
    scheduler: VirtualScheduler<Timer>,
    state: EngagementState,
    explored: u8,
    onboarding: OnboardingSequencer,
    gate: HiddenFeatureGate,
    visibility: VisibilitySource,
    visitor_number: u32,
    discovery_timer: Option<TimerHandle>,
    discovery_visible: bool,
    restore: Option<(TimerHandle, f64)>,
    prefs: Preferences,
    autoplay: Autoplay,
    mobile_alert: Option<TimerHandle>,
    signals: Vec<Signal>,
    torn_down: bool,
}

impl EngagementTracker {
    /// Run one page load against `store`.
    ///
    /// `host_loaded` is whether the host finished loading before the tracker
    /// started; if not, call [`Self::host_loaded`] when it does.
    pub fn load<R: Rng>(
        store: Persistence,
        timings: Timings,
        host_loaded: bool,
        now: Millis,
        rng: &mut R,
    ) -> Self {
        let state = EngagementState::rehydrate(&store);
        let explored = state.exploration_percentage();
        let splash_shown = store.read_flag(Scope::Session, keys::LOADING_SCREEN_SHOWN);
        let remembered = store.read_number(Scope::Session, keys::LAST_SCROLL_POSITION);

        let mut scheduler = VirtualScheduler::new(now);
        let mut onboarding = OnboardingSequencer::new(timings);
        let events = onboarding.start(
            splash_shown,
            state.easter_egg_shown_this_session,
            host_loaded,
            &mut scheduler,
        );

        let mut visibility = VisibilitySource::new();
        for region in PAGE_REGIONS {
            visibility.observe(region);
        }

        let restore = remembered.map(|offset| {
            let handle = scheduler.after(timings.scroll_restore_ms, Timer::ScrollRestore);
            (handle, offset)
        });
        let prefs = Preferences::rehydrate(&store);

        tracing::info!(
            explored,
            splash_shown,
            discovered = state.unknown_reality_discovered,
            "page load"
        );

        let mut tracker = Self {
            store,
            timings,
            scheduler,
            state,
            explored,
            onboarding,
            gate: HiddenFeatureGate::new(timings.hold_ms),
            visibility,
            visitor_number: rng.random_range(VISITOR_NUMBER_MIN..=VISITOR_NUMBER_MAX),
            discovery_timer: None,
            discovery_visible: false,
            restore,
            prefs,
            autoplay: Autoplay::new(timings.autoplay_retry_ms),
            mobile_alert: None,
            signals: Vec::new(),
            torn_down: false,
        };
        tracker.apply_onboarding(events);
        tracker
    }

    // --- Time ---

    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    /// Due time of the next pending timer, if any.
    pub fn next_due(&self) -> Option<Millis> {
        self.scheduler.next_due()
    }

    /// Fire every timer due at or before `now`, in due order.
    pub fn advance_to(&mut self, now: Millis) {
        if self.torn_down {
            return;
        }
        while let Some((handle, timer)) = self.scheduler.pop_due(now) {
            self.dispatch(handle, timer);
        }
        self.scheduler.set_now(now);
    }

    /// Advance until no timers remain. Returns the final time.
    pub fn run_until_idle(&mut self) -> Millis {
        while let Some(due) = self.scheduler.next_due() {
            self.advance_to(due);
        }
        self.now()
    }

    fn dispatch(&mut self, handle: TimerHandle, timer: Timer) {
        match timer {
            Timer::Hold => {
                if self.gate.on_hold_elapsed(handle) {
                    self.trigger_reality_shift();
                }
            }
            Timer::Discovery => {
                if self.discovery_timer == Some(handle) {
                    self.discovery_timer = None;
                    self.discovery_visible = true;
                    self.signals.push(Signal::DiscoveryConfirmed);
                }
            }
            Timer::ScrollRestore => {
                if let Some((h, offset)) = self.restore
                    && h == handle
                {
                    self.restore = None;
                    self.store.remove(Scope::Session, keys::LAST_SCROLL_POSITION);
                    self.signals.push(Signal::ScrollRestored(offset));
                }
            }
            Timer::MobileAlert => {
                if self.mobile_alert == Some(handle) {
                    self.mobile_alert = None;
                    self.signals.push(Signal::MobileAlertClosed);
                }
            }
            Timer::AutoplayRetry => {
                if self.autoplay.on_retry(handle) {
                    self.signals.push(Signal::AutoplayRequested);
                }
            }
            Timer::SplashMinimum | Timer::LoadFallback | Timer::Reveal | Timer::Hint => {
                let events = self.onboarding.on_timer(handle, timer, &mut self.scheduler);
                self.apply_onboarding(events);
            }
        }
    }

    // --- Onboarding ---

    /// The host finished loading its resources.
    pub fn host_loaded(&mut self, now: Millis) {
        if self.torn_down {
            return;
        }
        self.advance_to(now);
        let events = self.onboarding.host_loaded(&mut self.scheduler);
        self.apply_onboarding(events);
    }

    /// Close the hint popup. Returns `false` if no hint was showing.
    pub fn dismiss_hint(&mut self, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        match self.onboarding.dismiss_hint() {
            Some(event) => {
                self.apply_onboarding(vec![event]);
                true
            }
            None => false,
        }
    }

    fn apply_onboarding(&mut self, events: Vec<OnboardingEvent>) {
        for event in events {
            match event {
                OnboardingEvent::SplashFinished => {
                    self.store.write_flag(Scope::Session, keys::LOADING_SCREEN_SHOWN, true);
                    self.signals.push(Signal::SplashFinished);
                }
                OnboardingEvent::ContentRevealed => self.signals.push(Signal::ContentRevealed),
                OnboardingEvent::HintShown => self.signals.push(Signal::HintShown),
                OnboardingEvent::HintDismissed => {
                    self.state.easter_egg_shown_this_session = true;
                    self.store.write_flag(Scope::Session, keys::EASTER_EGG_SHOWN, true);
                    self.signals.push(Signal::HintDismissed);
                }
            }
        }
    }

    // --- Hidden feature ---

    /// Pointer-down or touch-start on the hold target. The target is hidden
    /// behind the splash, so presses during `Loading` are ignored.
    pub fn pointer_down(&mut self, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if self.onboarding.phase() == OnboardingPhase::Loading {
            tracing::debug!(now, "press ignored during splash");
            return false;
        }
        self.gate.press(&mut self.scheduler)
    }

    pub fn pointer_up(&mut self, now: Millis) -> bool {
        self.release(Release::PointerUp, now)
    }

    pub fn pointer_leave(&mut self, now: Millis) -> bool {
        self.release(Release::PointerLeave, now)
    }

    /// End a hold. Returns `true` if an unfinished hold was discarded.
    pub fn release(&mut self, reason: Release, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        self.gate.release(reason, &mut self.scheduler)
    }

    fn trigger_reality_shift(&mut self) {
        let hint_withdrawn = self.onboarding.cancel_hint(&mut self.scheduler);
        self.signals.push(Signal::RealityShift);
        if hint_withdrawn {
            self.signals.push(Signal::HintCancelled);
        }

        self.state.unknown_reality_discovered = true;
        self.store
            .write_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED, true);
        self.state.unknown_reality_visited = true;
        self.store
            .write_flag(Scope::Session, keys::UNKNOWN_REALITY_VISITED, true);
        self.recompute();

        if let Some(h) = self.discovery_timer.take() {
            self.scheduler.cancel(h);
        }
        self.discovery_timer = Some(
            self.scheduler
                .after(self.timings.discovery_delay_ms, Timer::Discovery),
        );
    }

    /// Close the discovery confirmation popup.
    pub fn close_discovery(&mut self, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if !self.discovery_visible {
            return false;
        }
        self.discovery_visible = false;
        self.signals.push(Signal::DiscoveryClosed);
        true
    }

    // --- Milestones ---

    /// Intersection measurement for a page region.
    /// Returns `true` when this newly records the section as viewed.
    pub fn region_visibility(&mut self, region: &str, visible_fraction: f64, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if !self.visibility.report(region, visible_fraction) || !self.state.record_section(region)
        {
            return false;
        }
        self.store.write_string_set(
            Scope::Session,
            keys::VIEWED_SECTIONS,
            &self.state.sections_viewed,
        );
        self.signals.push(Signal::SectionViewed(region.to_string()));
        true
    }

    /// Scroll sample from the main page.
    pub fn portfolio_scrolled(&mut self, metrics: ScrollMetrics, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if self.state.portfolio_scroll_completed || !metrics.is_complete() {
            return false;
        }
        self.state.portfolio_scroll_completed = true;
        self.store
            .write_flag(Scope::Session, keys::PORTFOLIO_SCROLL_COMPLETED, true);
        self.signals.push(Signal::PortfolioScrollCompleted);
        tracing::info!("portfolio scroll completed");
        self.recompute();
        true
    }

    /// Scroll sample from a case-study page; completes it once read through.
    pub fn case_study_scrolled(&mut self, id: &str, metrics: ScrollMetrics, now: Millis) -> bool {
        if !metrics.is_complete() {
            self.advance_to(now);
            return false;
        }
        self.case_study_complete(id, now)
    }

    /// A case study reported completion. Returns `true` if it is new this session.
    pub fn case_study_complete(&mut self, id: &str, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        let id = id.trim();
        if id.is_empty() || !self.state.record_case_study(id) {
            return false;
        }
        self.store.write_string_set(
            Scope::Session,
            keys::VIEWED_CASE_STUDIES,
            &self.state.case_studies_viewed,
        );
        self.signals.push(Signal::CaseStudyViewed(id.to_string()));
        tracing::info!(case_study = id, "case study completed");
        self.recompute();
        true
    }

    /// Remember where the main page was, to restore it on the next load.
    pub fn remember_scroll_position(&mut self, offset: f64) {
        if self.torn_down {
            return;
        }
        self.store
            .write_number(Scope::Session, keys::LAST_SCROLL_POSITION, offset);
    }

    // --- Device and preferences ---

    /// The host measured its screen. A small screen is shown the desktop
    /// recommendation once per session, closing on its own after a while.
    pub fn report_device(&mut self, is_mobile: bool, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if !is_mobile
            || self.mobile_alert.is_some()
            || self.store.read_flag(Scope::Session, keys::MOBILE_ALERT_SHOWN)
        {
            return false;
        }
        self.store.write_flag(Scope::Session, keys::MOBILE_ALERT_SHOWN, true);
        self.mobile_alert = Some(
            self.scheduler
                .after(self.timings.mobile_alert_ms, Timer::MobileAlert),
        );
        self.signals.push(Signal::MobileAlertShown);
        true
    }

    pub fn close_mobile_alert(&mut self, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        let Some(h) = self.mobile_alert.take() else {
            return false;
        };
        self.scheduler.cancel(h);
        self.signals.push(Signal::MobileAlertClosed);
        true
    }

    /// The audio control mounted. Returns `true` when the host should try to
    /// start the music and report back through [`Self::autoplay_result`].
    /// Happens at most once per session, and never over music already playing.
    pub fn audio_ready(&mut self, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        let already_started = self.prefs.audio_playing
            || self.store.read_flag(Scope::Session, keys::MUSIC_AUTO_STARTED);
        if !self.autoplay.begin(already_started) {
            return false;
        }
        self.signals.push(Signal::AutoplayRequested);
        true
    }

    pub fn autoplay_result(&mut self, started: bool, now: Millis) -> AutoplayOutcome {
        if self.torn_down {
            return AutoplayOutcome::Ignored;
        }
        self.advance_to(now);
        let outcome = self.autoplay.report(started, &mut self.scheduler);
        if outcome == AutoplayOutcome::Started {
            self.prefs.audio_playing = true;
            self.store.write_flag(Scope::Session, keys::MUSIC_AUTO_STARTED, true);
            self.signals.push(Signal::AudioPlaying(true));
            tracing::info!("music autoplay started");
        }
        outcome
    }

    /// The visitor toggled the music. Stops any autoplay still in flight.
    pub fn set_audio_playing(&mut self, playing: bool, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        self.autoplay.settle(&mut self.scheduler);
        if self.prefs.audio_playing == playing {
            return false;
        }
        self.prefs.audio_playing = playing;
        self.store.write_flag(Scope::Persistent, keys::AUDIO_PLAYING, playing);
        self.signals.push(Signal::AudioPlaying(playing));
        true
    }

    /// Clamped to `[0, 1]`. Non-finite values are ignored.
    pub fn set_volume(&mut self, volume: f64, now: Millis) -> bool {
        if self.torn_down || !volume.is_finite() {
            return false;
        }
        self.advance_to(now);
        let volume = clamp_volume(volume);
        if self.prefs.audio_volume == volume {
            return false;
        }
        self.prefs.audio_volume = volume;
        self.store.write_number(Scope::Persistent, keys::AUDIO_VOLUME, volume);
        self.signals.push(Signal::VolumeChanged(volume));
        true
    }

    pub fn set_lite_mode(&mut self, on: bool, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if self.prefs.lite_mode == on {
            return false;
        }
        self.prefs.lite_mode = on;
        self.store.write_flag(Scope::Persistent, keys::IS_LITE_MODE, on);
        self.signals.push(Signal::LiteModeChanged(on));
        true
    }

    pub fn set_custom_cursor(&mut self, on: bool, now: Millis) -> bool {
        if self.torn_down {
            return false;
        }
        self.advance_to(now);
        if self.prefs.custom_cursor == on {
            return false;
        }
        self.prefs.custom_cursor = on;
        self.store.write_flag(Scope::Persistent, keys::IS_CUSTOM_CURSOR, on);
        self.signals.push(Signal::CustomCursorChanged(on));
        true
    }

    fn recompute(&mut self) {
        let pct = self.state.exploration_percentage();
        if pct != self.explored {
            tracing::debug!(from = self.explored, to = pct, "exploration changed");
            self.explored = pct;
            self.signals.push(Signal::ExplorationChanged(pct));
        }
    }

    // --- Teardown ---

    /// Disarm every timer and stop observing. Later inputs are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.onboarding.teardown(&mut self.scheduler);
        self.gate.teardown(&mut self.scheduler);
        self.autoplay.teardown(&mut self.scheduler);
        self.mobile_alert = None;
        self.discovery_timer = None;
        self.restore = None;
        let dropped = self.scheduler.cancel_all();
        self.visibility.disconnect();
        self.torn_down = true;
        tracing::debug!(dropped, "tracker torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // --- Views ---

    pub fn drain_signals(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    pub fn state(&self) -> &EngagementState {
        &self.state
    }

    pub fn explored_percentage(&self) -> u8 {
        self.explored
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard {
            explored_percentage: self.explored,
            reality_discovered: self.state.unknown_reality_discovered,
            visitor_number: self.visitor_number,
        }
    }

    pub fn onboarding_state(&self) -> OnboardingState {
        self.onboarding.state()
    }

    pub fn onboarding_phase(&self) -> OnboardingPhase {
        self.onboarding.phase()
    }

    pub fn gate_phase(&self) -> GatePhase {
        self.gate.phase()
    }

    pub fn discovery_visible(&self) -> bool {
        self.discovery_visible
    }

    pub fn mobile_alert_visible(&self) -> bool {
        self.mobile_alert.is_some()
    }

    pub fn preferences(&self) -> Preferences {
        self.prefs
    }

    pub fn autoplay_phase(&self) -> AutoplayPhase {
        self.autoplay.phase()
    }

    pub fn persistence(&self) -> &Persistence {
        &self.store
    }

    /// End the load and hand the stores back, e.g. for the next load.
    pub fn into_persistence(mut self) -> Persistence {
        self.teardown();
        self.store
    }
}
