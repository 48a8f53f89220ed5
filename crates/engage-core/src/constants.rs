/// Fraction of a region that must be on screen before it counts as viewed.
pub const VISIBILITY_THRESHOLD: f64 = 0.8;

/// Scroll progress at which a page counts as read through.
pub const SCROLL_COMPLETE_THRESHOLD: f64 = 0.9;

/// Minimum time the splash stays up, regardless of how fast the host loads.
pub const MIN_SPLASH_MS: u64 = 3_000;

/// Host load signal fallback: reveal proceeds even if the host never reports.
pub const LOAD_FALLBACK_MS: u64 = 5_000;

/// Gap between the splash finishing and content being revealed.
pub const REVEAL_DELAY_MS: u64 = 200;

/// Delay from content reveal to the hint popup.
pub const HINT_DELAY_MS: u64 = 15_000;

/// Pointer hold required to open the hidden feature.
pub const HOLD_MS: u64 = 5_000;

/// Delay from the reality shift to the discovery confirmation.
pub const DISCOVERY_DELAY_MS: u64 = 4_500;

/// Delay before a remembered scroll position is restored.
pub const SCROLL_RESTORE_MS: u64 = 100;

/// How long the small-screen alert stays up before closing itself.
pub const MOBILE_ALERT_MS: u64 = 5_000;

/// Wait before the single retry of a blocked music autoplay.
pub const AUTOPLAY_RETRY_MS: u64 = 500;

/// Audio volume when none is stored.
pub const DEFAULT_AUDIO_VOLUME: f64 = 0.5;

/// Visitor numbers shown on the dashboard are drawn from this range.
pub const VISITOR_NUMBER_MIN: u32 = 2_000;
pub const VISITOR_NUMBER_MAX: u32 = 2_999;

/// Main page regions observed for visibility.
pub const PAGE_REGIONS: [&str; 6] = [
    "home",
    "about",
    "timeline",
    "case-studies",
    "design-interests",
    "contact",
];

/// Exploration weight for the main-page scroll milestone.
pub const PORTFOLIO_SCROLL_WEIGHT: u32 = 20;

/// Exploration weight per case study. Ids not listed here carry no weight.
pub const CASE_STUDY_WEIGHTS: [(&str, u32); 4] =
    [("swiggy", 20), ("skillup", 20), ("connect", 20), ("ola", 15)];

/// Exploration weight for having visited the hidden feature this session.
pub const UNKNOWN_REALITY_WEIGHT: u32 = 5;

/// Upper bound on the exploration percentage.
pub const MAX_EXPLORATION: u8 = 100;

/// Storage keys. Session scope unless noted.
pub mod keys {
    pub const LOADING_SCREEN_SHOWN: &str = "loadingScreenShown";
    pub const EASTER_EGG_SHOWN: &str = "easterEggShown";
    pub const UNKNOWN_REALITY_VISITED: &str = "unknownRealityVisited";
    pub const VIEWED_SECTIONS: &str = "viewedSections";
    pub const VIEWED_CASE_STUDIES: &str = "viewedCaseStudies";
    pub const PORTFOLIO_SCROLL_COMPLETED: &str = "portfolioScrollCompleted";
    pub const LAST_SCROLL_POSITION: &str = "lastScrollPosition";
    pub const MOBILE_ALERT_SHOWN: &str = "mobileAlertShown";
    pub const MUSIC_AUTO_STARTED: &str = "musicAutoStarted";

    // Persistent scope.
    pub const UNKNOWN_REALITY_DISCOVERED: &str = "unknownRealityDiscovered";
    pub const IS_LITE_MODE: &str = "isLiteMode";
    pub const IS_CUSTOM_CURSOR: &str = "isCustomCursor";
    pub const AUDIO_PLAYING: &str = "audioPlaying";
    pub const AUDIO_VOLUME: &str = "audioVolume";

    pub const SESSION: [&str; 9] = [
        LOADING_SCREEN_SHOWN,
        EASTER_EGG_SHOWN,
        UNKNOWN_REALITY_VISITED,
        VIEWED_SECTIONS,
        VIEWED_CASE_STUDIES,
        PORTFOLIO_SCROLL_COMPLETED,
        LAST_SCROLL_POSITION,
        MOBILE_ALERT_SHOWN,
        MUSIC_AUTO_STARTED,
    ];

    pub const PERSISTENT: [&str; 5] = [
        UNKNOWN_REALITY_DISCOVERED,
        IS_LITE_MODE,
        IS_CUSTOM_CURSOR,
        AUDIO_PLAYING,
        AUDIO_VOLUME,
    ];
}
