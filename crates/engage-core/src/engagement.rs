use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CASE_STUDY_WEIGHTS, MAX_EXPLORATION, PORTFOLIO_SCROLL_WEIGHT, UNKNOWN_REALITY_WEIGHT, keys,
};
use crate::persist::{Persistence, Scope};

/// Milestones reached by the visitor. Every field only ever moves from
/// empty/false towards full/true.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementState {
    pub sections_viewed: BTreeSet<String>,
    pub case_studies_viewed: BTreeSet<String>,
    pub portfolio_scroll_completed: bool,
    pub unknown_reality_visited: bool,
    /// Device-wide; survives the session.
    pub unknown_reality_discovered: bool,
    pub easter_egg_shown_this_session: bool,
}

impl EngagementState {
    /// Read every milestone from storage. Missing or malformed values read as
    /// "not reached".
    pub fn rehydrate(store: &Persistence) -> Self {
        Self {
            sections_viewed: store.read_string_set(Scope::Session, keys::VIEWED_SECTIONS),
            case_studies_viewed: store.read_string_set(Scope::Session, keys::VIEWED_CASE_STUDIES),
            portfolio_scroll_completed: store
                .read_flag(Scope::Session, keys::PORTFOLIO_SCROLL_COMPLETED),
            unknown_reality_visited: store.read_flag(Scope::Session, keys::UNKNOWN_REALITY_VISITED),
            unknown_reality_discovered: store
                .read_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED),
            easter_egg_shown_this_session: store.read_flag(Scope::Session, keys::EASTER_EGG_SHOWN),
        }
    }

    pub fn exploration_percentage(&self) -> u8 {
        exploration_percentage(self)
    }

    /// Returns `true` if the section was not already recorded.
    pub fn record_section(&mut self, id: &str) -> bool {
        self.sections_viewed.insert(id.to_string())
    }

    /// Returns `true` if the case study was not already recorded.
    pub fn record_case_study(&mut self, id: &str) -> bool {
        self.case_studies_viewed.insert(id.to_string())
    }
}

/// Weight a completed case study contributes. Unlisted ids weigh nothing.
pub fn case_study_weight(id: &str) -> u32 {
    CASE_STUDY_WEIGHTS
        .iter()
        .find(|(name, _)| *name == id)
        .map(|(_, w)| *w)
        .unwrap_or(0)
}

/// Exploration score in `0..=100` from the fixed milestone weights.
///
/// Sections viewed and the device-wide discovery flag do not count; only the
/// main-page scroll, the four case studies and this session's visit to the
/// hidden feature do.
pub fn exploration_percentage(state: &EngagementState) -> u8 {
    let mut score = 0u32;
    if state.portfolio_scroll_completed {
        score += PORTFOLIO_SCROLL_WEIGHT;
    }
    score += CASE_STUDY_WEIGHTS
        .iter()
        .filter(|(id, _)| state.case_studies_viewed.contains(*id))
        .map(|(_, w)| w)
        .sum::<u32>();
    if state.unknown_reality_visited {
        score += UNKNOWN_REALITY_WEIGHT;
    }
    score.min(MAX_EXPLORATION as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_case_studies(ids: &[&str]) -> EngagementState {
        EngagementState {
            case_studies_viewed: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(exploration_percentage(&EngagementState::default()), 0);
    }

    #[test]
    fn test_all_milestones_is_exactly_100() {
        let mut s = with_case_studies(&["swiggy", "skillup", "connect", "ola"]);
        s.portfolio_scroll_completed = true;
        s.unknown_reality_visited = true;
        assert_eq!(exploration_percentage(&s), 100);
    }

    #[test]
    fn test_partial_credit() {
        let mut s = with_case_studies(&["swiggy", "ola"]);
        s.portfolio_scroll_completed = true;
        assert_eq!(exploration_percentage(&s), 55);
    }

    #[test]
    fn test_ignores_sections_and_discovery() {
        let mut s = EngagementState::default();
        s.record_section("about");
        s.unknown_reality_discovered = true;
        s.easter_egg_shown_this_session = true;
        assert_eq!(exploration_percentage(&s), 0);
    }

    #[test]
    fn test_unknown_case_study_weighs_nothing() {
        let s = with_case_studies(&["uber", "swiggy"]);
        assert_eq!(exploration_percentage(&s), 20);
        assert_eq!(case_study_weight("uber"), 0);
    }

    #[test]
    fn test_record_reports_novelty() {
        let mut s = EngagementState::default();
        assert!(s.record_case_study("ola"));
        assert!(!s.record_case_study("ola"));
        assert!(s.record_section("home"));
        assert!(!s.record_section("home"));
    }

    #[test]
    fn test_rehydrate() {
        let mut p = Persistence::in_memory();
        p.write_flag(Scope::Session, keys::PORTFOLIO_SCROLL_COMPLETED, true);
        p.write_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED, true);
        p.write_raw(Scope::Session, keys::VIEWED_CASE_STUDIES, r#"["skillup"]"#);
        p.write_raw(Scope::Session, keys::VIEWED_SECTIONS, "{broken");

        let s = EngagementState::rehydrate(&p);
        assert!(s.portfolio_scroll_completed);
        assert!(s.unknown_reality_discovered);
        assert!(!s.unknown_reality_visited);
        assert!(s.sections_viewed.is_empty());
        assert_eq!(s.exploration_percentage(), 40);
    }

    fn arb_state() -> impl Strategy<Value = EngagementState> {
        (
            any::<bool>(),
            any::<bool>(),
            proptest::sample::subsequence(
                vec!["swiggy", "skillup", "connect", "ola", "uber", "zomato"],
                0..=6,
            ),
        )
            .prop_map(|(scrolled, visited, ids)| EngagementState {
                portfolio_scroll_completed: scrolled,
                unknown_reality_visited: visited,
                case_studies_viewed: ids.into_iter().map(String::from).collect(),
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn prop_idempotent(state in arb_state()) {
            prop_assert_eq!(exploration_percentage(&state), exploration_percentage(&state));
        }

        #[test]
        fn prop_bounded(state in arb_state()) {
            prop_assert!(exploration_percentage(&state) <= 100);
        }

        #[test]
        fn prop_adding_milestone_never_decreases(
            state in arb_state(),
            id in prop::sample::select(vec!["swiggy", "skillup", "connect", "ola", "uber"]),
        ) {
            let before = exploration_percentage(&state);

            let mut more = state.clone();
            more.record_case_study(id);
            prop_assert!(exploration_percentage(&more) >= before);

            let mut scrolled = state.clone();
            scrolled.portfolio_scroll_completed = true;
            prop_assert!(exploration_percentage(&scrolled) >= before);

            let mut visited = state;
            visited.unknown_reality_visited = true;
            prop_assert!(exploration_percentage(&visited) >= before);
        }

        #[test]
        fn prop_removing_milestone_never_increases(state in arb_state()) {
            let before = exploration_percentage(&state);
            for id in state.case_studies_viewed.clone() {
                let mut fewer = state.clone();
                fewer.case_studies_viewed.remove(&id);
                prop_assert!(exploration_percentage(&fewer) <= before);
            }
        }
    }
}
