//! End-to-end behavior of the tracker across page loads and sessions,
//! driven on virtual time over in-memory stores.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use engage_core::{
    EngagementState, EngagementTracker, HintStatus, KeyValueStore, MemoryStore, OnboardingPhase,
    Persistence, Scope, ScrollMetrics, Signal, StorageError, Timings, exploration_percentage, keys,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// A store handle that outlives a single `Persistence`, so one test can run
/// several page loads (or sessions) against the same underlying data.
#[derive(Clone, Default)]
struct Shared(Rc<RefCell<MemoryStore>>);

impl KeyValueStore for Shared {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.borrow().get(key)
    }
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().set(key, value)
    }
    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().remove(key)
    }
    fn entries(&self) -> Result<Vec<(String, String)>, StorageError> {
        self.0.borrow().entries()
    }
}

struct Browser {
    session: Shared,
    device: Shared,
    rng: SmallRng,
}

impl Browser {
    fn new() -> Self {
        Self {
            session: Shared::default(),
            device: Shared::default(),
            rng: SmallRng::seed_from_u64(42),
        }
    }

    /// Open a page load at t=0 with the host already loaded.
    fn load(&mut self) -> EngagementTracker {
        let store = Persistence::new(self.session.clone(), self.device.clone());
        EngagementTracker::load(store, Timings::default(), true, 0, &mut self.rng)
    }

    /// Close the tab: session storage goes, device storage stays.
    fn new_session(&mut self) {
        self.session = Shared::default();
    }
}

fn count(signals: &[Signal], wanted: &Signal) -> usize {
    signals.iter().filter(|s| *s == wanted).count()
}

#[test]
fn partial_credit_matches_weights() {
    let state = EngagementState {
        portfolio_scroll_completed: true,
        case_studies_viewed: ["swiggy", "ola"].iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    assert_eq!(exploration_percentage(&state), 55);
    assert_eq!(exploration_percentage(&state), exploration_percentage(&state));
}

#[test]
fn every_milestone_reaches_exactly_100() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.run_until_idle();

    t.portfolio_scrolled(ScrollMetrics::new(4_500.0, 5_000.0, 500.0), 20_000);
    for id in ["swiggy", "skillup", "connect", "ola"] {
        t.case_study_complete(id, 20_000);
    }
    assert_eq!(t.explored_percentage(), 95);

    let start = t.now();
    t.pointer_down(start);
    t.advance_to(start + 5_000);
    assert_eq!(t.explored_percentage(), 100);
    assert_eq!(t.dashboard().explored_percentage, 100);
}

#[test]
fn hint_fires_exactly_once_in_fresh_session() {
    let mut browser = Browser::new();
    let mut t = browser.load();

    // Splash 3000 + reveal 200 + hint 15000.
    t.advance_to(18_199);
    assert!(!t.onboarding_state().hint_visible);
    t.advance_to(18_200);
    assert!(t.onboarding_state().hint_visible);

    t.advance_to(18_200 + 15_000);
    t.advance_to(120_000);
    let signals = t.drain_signals();
    assert_eq!(count(&signals, &Signal::HintShown), 1);
}

#[test]
fn dismissing_hint_persists_only_at_dismissal() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.advance_to(18_200);
    assert!(!t.persistence().read_flag(Scope::Session, keys::EASTER_EGG_SHOWN));
    assert!(t.dismiss_hint(19_000));
    assert!(t.persistence().read_flag(Scope::Session, keys::EASTER_EGG_SHOWN));
    assert!(t.state().easter_egg_shown_this_session);
}

#[test]
fn hold_released_one_ms_early_changes_nothing() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.run_until_idle();
    t.drain_signals();

    let start = t.now();
    assert!(t.pointer_down(start));
    assert!(t.pointer_up(start + 4_999), "hold discarded");
    t.advance_to(start + 60_000);

    assert!(!t.state().unknown_reality_discovered);
    assert!(!t.state().unknown_reality_visited);
    assert!(!t.persistence().read_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED));
    assert!(!t.persistence().read_flag(Scope::Session, keys::UNKNOWN_REALITY_VISITED));
    assert_eq!(count(&t.drain_signals(), &Signal::RealityShift), 0);
}

#[test]
fn hold_for_full_duration_fires_once() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.run_until_idle();
    t.drain_signals();

    let start = t.now();
    t.pointer_down(start);
    t.advance_to(start + 5_000);
    t.pointer_up(start + 5_001);
    t.advance_to(start + 60_000);

    let signals = t.drain_signals();
    assert_eq!(count(&signals, &Signal::RealityShift), 1);
    assert_eq!(count(&signals, &Signal::DiscoveryConfirmed), 1);
    assert!(t.persistence().read_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED));
    assert!(t.persistence().read_flag(Scope::Session, keys::UNKNOWN_REALITY_VISITED));
}

#[test]
fn repeated_presses_during_hold_do_not_shorten_it() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.run_until_idle();
    let start = t.now();
    assert!(t.pointer_down(start));
    assert!(!t.pointer_down(start + 1_000));
    assert!(!t.pointer_down(start + 2_000));
    t.advance_to(start + 4_999);
    assert!(!t.state().unknown_reality_visited);
    t.advance_to(start + 5_000);
    assert!(t.state().unknown_reality_visited);
}

#[test]
fn pointer_leave_cancels_hold() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    assert!(t.pointer_down(3_100));
    assert!(t.pointer_leave(5_000));
    t.run_until_idle();
    assert!(!t.state().unknown_reality_discovered);
}

#[test]
fn reload_in_same_session_skips_splash_and_hint() {
    let mut browser = Browser::new();
    let mut first = browser.load();
    first.advance_to(3_200);
    drop(first.into_persistence());

    let mut t = browser.load();
    let state = t.onboarding_state();
    assert!(!state.is_loading);
    assert!(state.show_content);
    assert_eq!(t.onboarding_phase(), OnboardingPhase::Idle(HintStatus::Unarmed));
    assert_eq!(t.drain_signals(), vec![Signal::ContentRevealed]);

    assert_eq!(t.run_until_idle(), 0, "no timers armed on a skipped load");
    assert!(t.drain_signals().is_empty());
}

#[test]
fn case_studies_roundtrip_through_reload() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.case_study_complete("connect", 10);
    t.case_study_complete("swiggy", 20);
    drop(t.into_persistence());

    let t = browser.load();
    let expected: BTreeSet<String> = ["swiggy", "connect"].iter().map(|s| s.to_string()).collect();
    assert_eq!(t.state().case_studies_viewed, expected);
    assert_eq!(t.explored_percentage(), 40);
}

#[test]
fn discovery_outlives_session_but_visit_does_not() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.pointer_down(3_000);
    t.run_until_idle();
    assert_eq!(t.explored_percentage(), 5);
    drop(t.into_persistence());

    browser.new_session();
    let t = browser.load();
    assert!(t.dashboard().reality_discovered);
    assert!(!t.state().unknown_reality_visited);
    assert_eq!(t.explored_percentage(), 0);
    assert!(t.onboarding_state().is_loading, "new session shows the splash again");
}

#[test]
fn storage_failure_degrades_silently() {
    let mut device = MemoryStore::new();
    device.set_failing(Some(StorageError::QuotaExceeded));
    let store = Persistence::new(MemoryStore::failing(StorageError::Unavailable), device);
    let mut t = EngagementTracker::load(
        store,
        Timings::default(),
        true,
        0,
        &mut SmallRng::seed_from_u64(1),
    );

    t.case_study_complete("ola", 10);
    t.pointer_down(3_000);
    t.run_until_idle();

    assert_eq!(t.explored_percentage(), 20);
    assert!(t.dashboard().reality_discovered);
    assert!(t.persistence().is_degraded(Scope::Session));
    assert!(t.persistence().is_degraded(Scope::Persistent));
    assert!(
        t.persistence()
            .read_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED),
        "writes stay readable in memory"
    );
}

#[test]
fn corrupted_session_values_read_as_first_visit() {
    let mut browser = Browser::new();
    browser
        .session
        .set(keys::VIEWED_CASE_STUDIES, "[\"swiggy\"")
        .unwrap();
    browser.session.set(keys::LOADING_SCREEN_SHOWN, "yes").unwrap();
    browser.session.set(keys::LAST_SCROLL_POSITION, "top").unwrap();

    let t = browser.load();
    assert!(t.state().case_studies_viewed.is_empty());
    assert!(t.onboarding_state().is_loading);
    assert_eq!(t.explored_percentage(), 0);
}

#[test]
fn slow_host_uses_fallback() {
    let mut browser = Browser::new();
    let store = Persistence::new(browser.session.clone(), browser.device.clone());
    let mut t = EngagementTracker::load(store, Timings::default(), false, 0, &mut browser.rng);
    t.advance_to(4_999);
    assert!(t.onboarding_state().is_loading);
    t.advance_to(5_000);
    assert!(!t.onboarding_state().is_loading);
    assert_eq!(t.drain_signals(), vec![Signal::SplashFinished]);
}

#[test]
fn section_views_survive_reload_and_do_not_refire() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    assert!(t.region_visibility("timeline", 0.85, 10));
    drop(t.into_persistence());

    let mut t = browser.load();
    assert!(!t.region_visibility("timeline", 1.0, 10));
    assert!(t.region_visibility("contact", 1.0, 20));
    assert_eq!(t.state().sections_viewed.len(), 2);
}

#[test]
fn reality_shift_over_visible_hint_reports_cancellation() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.advance_to(18_200);
    assert!(t.onboarding_state().hint_visible);
    t.pointer_down(18_300);
    t.advance_to(23_300);

    let signals = t.drain_signals();
    let shift = signals.iter().position(|s| *s == Signal::RealityShift).unwrap();
    assert_eq!(signals[shift + 1], Signal::HintCancelled);
    assert_eq!(count(&signals, &Signal::HintCancelled), 1);
    assert_eq!(t.onboarding_phase(), OnboardingPhase::Idle(HintStatus::Cancelled));
}

#[test]
fn press_behind_splash_never_opens_the_gate() {
    let mut browser = Browser::new();
    let store = Persistence::new(browser.session.clone(), browser.device.clone());
    let timings = Timings {
        hold_ms: 1_000,
        ..Timings::default()
    };
    let mut t = EngagementTracker::load(store, timings, true, 0, &mut browser.rng);
    assert!(!t.pointer_down(0));
    t.advance_to(1_000);
    assert_eq!(count(&t.drain_signals(), &Signal::RealityShift), 0);
    assert!(!t.persistence().read_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED));
}

#[test]
fn mobile_alert_returns_with_a_new_session() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    assert!(t.report_device(true, 0));
    t.advance_to(5_000);
    assert!(!t.mobile_alert_visible());
    drop(t.into_persistence());

    let mut t = browser.load();
    assert!(!t.report_device(true, 0));
    drop(t.into_persistence());

    browser.new_session();
    let mut t = browser.load();
    assert!(t.report_device(true, 0));
}

#[test]
fn preferences_outlive_session_but_autoplay_marker_does_not() {
    let mut browser = Browser::new();
    let mut t = browser.load();
    t.set_lite_mode(true, 0);
    t.set_volume(0.2, 0);
    assert!(t.audio_ready(0));
    t.autoplay_result(true, 50);
    drop(t.into_persistence());

    let mut t = browser.load();
    assert!(!t.audio_ready(0));
    drop(t.into_persistence());

    browser.new_session();
    let mut t = browser.load();
    let prefs = t.preferences();
    assert!(prefs.lite_mode);
    assert_eq!(prefs.audio_volume, 0.2);
    assert!(!prefs.audio_playing, "autoplay does not record a preference");
    assert!(t.audio_ready(0), "new session tries autoplay again");
}
