mod runner;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engage_core::{
    AutoplayPhase, EngagementTracker, Millis, Persistence, ScrollMetrics, Timings,
};
use engage_store::{DeviceStore, EngageConfig, default_base_dir};
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Parser)]
#[command(name = "engage", about = "Portfolio engagement tracker CLI")]
struct Cli {
    /// Session id (defaults to the current session)
    #[arg(long, global = true, env = "ENGAGE_SESSION")]
    session: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the dashboard and milestones
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Simulate a page load on virtual time
    Visit {
        /// When the host finishes loading, in ms after the load starts
        #[arg(long, default_value_t = 0)]
        load_ms: Millis,

        /// Stop after this many ms (default: run until no timers remain)
        #[arg(long)]
        wait_ms: Option<Millis>,

        /// Dismiss the hint as soon as it shows
        #[arg(long)]
        dismiss: bool,

        /// Visit from a small screen
        #[arg(long)]
        mobile: bool,

        /// Mount the music player, which tries to autoplay once per session
        #[arg(long)]
        audio: bool,

        /// Have the browser refuse every autoplay attempt
        #[arg(long, requires = "audio")]
        block_autoplay: bool,
    },

    /// Report a page region as visible
    Section {
        /// Region id (home, about, timeline, case-studies, design-interests, contact)
        id: String,

        /// Visible fraction of the region
        #[arg(long, default_value_t = 1.0)]
        fraction: f64,
    },

    /// Report a scroll position on the main page
    Scroll {
        #[arg(long, allow_negative_numbers = true)]
        offset: f64,
        #[arg(long)]
        content: f64,
        #[arg(long)]
        viewport: f64,
    },

    /// Mark a case study as read, directly or from its scroll position
    CaseStudy {
        id: String,
        #[arg(long, requires_all = ["content", "viewport"])]
        offset: Option<f64>,
        #[arg(long, requires = "offset")]
        content: Option<f64>,
        #[arg(long, requires = "offset")]
        viewport: Option<f64>,
    },

    /// Remember a scroll offset to restore on the next load
    RememberScroll {
        #[arg(allow_negative_numbers = true)]
        offset: f64,
    },

    /// Press the hold target for N ms of virtual time, then release
    Hold {
        #[arg(long, default_value_t = 5_000)]
        ms: Millis,
    },

    /// Show or change the device preferences
    Prefs {
        /// Lite mode (true/false)
        #[arg(long)]
        lite: Option<bool>,

        /// Custom cursor (true/false)
        #[arg(long)]
        cursor: Option<bool>,

        /// Background music (true/false)
        #[arg(long)]
        music: Option<bool>,

        /// Music volume, clamped to 0..=1
        #[arg(long)]
        volume: Option<f64>,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Export persisted keys to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import persisted keys from a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },

    /// Drive the tracker in real time from stdin
    Run,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start a fresh session and make it current
    New,
    /// Delete a session's data (the current one unless --session is given)
    Clear,
    /// Show the current session and every session on disk
    Show,
}

fn open_store(cli: &Cli) -> Result<(String, Persistence)> {
    let base = default_base_dir();
    let store = DeviceStore::open(cli.session.as_deref(), Some(&base))
        .context("failed to open device store")?;
    Ok((store.session_id().to_string(), store.into_persistence()))
}

fn load_timings() -> Result<Timings> {
    let config = EngageConfig::load(&default_base_dir()).context("failed to load config.toml")?;
    Ok(config.timings)
}

fn load_tracker(cli: &Cli, host_loaded: bool) -> Result<(String, EngagementTracker)> {
    let (session, store) = open_store(cli)?;
    let timings = load_timings()?;
    let mut rng = SmallRng::from_os_rng();
    let tracker = EngagementTracker::load(store, timings, host_loaded, 0, &mut rng);
    Ok((session, tracker))
}

/// Print signals raised since the last call, stamped with the tracker's clock.
pub(crate) fn print_signals(tracker: &mut EngagementTracker) {
    let now = tracker.now();
    for signal in tracker.drain_signals() {
        println!("{now:>6}ms  {signal}");
    }
}

/// How the simulated visitor and browser answer the page.
#[derive(Clone, Copy, Default)]
struct Host {
    dismiss: bool,
    /// `Some(allowed)` once the music player is mounted.
    autoplay: Option<bool>,
}

impl Host {
    fn reply(self, tracker: &mut EngagementTracker, now: Millis) {
        if self.dismiss && tracker.onboarding_state().hint_visible {
            tracker.dismiss_hint(now);
            print_signals(tracker);
        }
        if let Some(allowed) = self.autoplay
            && matches!(tracker.autoplay_phase(), AutoplayPhase::Attempting { .. })
        {
            if !allowed {
                println!("{now:>6}ms  autoplay blocked");
            }
            tracker.autoplay_result(allowed, now);
            print_signals(tracker);
        }
    }
}

/// Fire timers up to `until`, printing signals as they are raised.
fn step_to(tracker: &mut EngagementTracker, until: Millis, host: Host) {
    while let Some(due) = tracker.next_due()
        && due <= until
    {
        tracker.advance_to(due);
        print_signals(tracker);
        host.reply(tracker, due);
    }
    tracker.advance_to(until);
    print_signals(tracker);
}

fn run_to_idle(tracker: &mut EngagementTracker, host: Host) {
    while let Some(due) = tracker.next_due() {
        step_to(tracker, due, host);
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

fn join(set: &std::collections::BTreeSet<String>) -> String {
    if set.is_empty() {
        "-".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub(crate) fn print_status(session: &str, tracker: &EngagementTracker) {
    let dash = tracker.dashboard();
    let state = tracker.state();
    println!("session:      {session}");
    println!("visitor:      #{}", dash.visitor_number);
    println!("explored:     {}%", dash.explored_percentage);
    println!("discovered:   {}", yes_no(dash.reality_discovered));
    println!("visited:      {}", yes_no(state.unknown_reality_visited));
    println!("portfolio:    {}", yes_no(state.portfolio_scroll_completed));
    println!("case studies: {}", join(&state.case_studies_viewed));
    println!("sections:     {}", join(&state.sections_viewed));
    println!("hint seen:    {}", yes_no(state.easter_egg_shown_this_session));
    print_preferences(tracker);
}

fn print_preferences(tracker: &EngagementTracker) {
    let prefs = tracker.preferences();
    println!("lite mode:    {}", on_off(prefs.lite_mode));
    println!("cursor:       {}", if prefs.custom_cursor { "custom" } else { "system" });
    println!(
        "music:        {} (volume {:.0}%)",
        on_off(prefs.audio_playing),
        prefs.audio_volume * 100.0
    );
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Status { json } => cmd_status(&cli, *json),
        Commands::Visit {
            load_ms,
            wait_ms,
            dismiss,
            mobile,
            audio,
            block_autoplay,
        } => {
            let host = Host {
                dismiss: *dismiss,
                autoplay: audio.then_some(!block_autoplay),
            };
            cmd_visit(&cli, *load_ms, *wait_ms, *mobile, host)
        }
        Commands::Section { id, fraction } => cmd_section(&cli, id, *fraction),
        Commands::Scroll {
            offset,
            content,
            viewport,
        } => cmd_scroll(&cli, ScrollMetrics::new(*offset, *content, *viewport)),
        Commands::CaseStudy {
            id,
            offset,
            content,
            viewport,
        } => {
            let metrics = match (offset, content, viewport) {
                (Some(o), Some(c), Some(v)) => Some(ScrollMetrics::new(*o, *c, *v)),
                _ => None,
            };
            cmd_case_study(&cli, id, metrics)
        }
        Commands::RememberScroll { offset } => cmd_remember_scroll(&cli, *offset),
        Commands::Hold { ms } => cmd_hold(&cli, *ms),
        Commands::Prefs {
            lite,
            cursor,
            music,
            volume,
        } => cmd_prefs(&cli, *lite, *cursor, *music, *volume),
        Commands::Session { action } => cmd_session(&cli, action),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
        Commands::Run => cmd_run(&cli).await,
    }
}

fn cmd_status(cli: &Cli, json: bool) -> Result<()> {
    let (session, tracker) = load_tracker(cli, true)?;
    if json {
        let value = serde_json::json!({
            "session": session,
            "dashboard": tracker.dashboard(),
            "state": tracker.state(),
            "preferences": tracker.preferences(),
        });
        let out = serde_json::to_string_pretty(&value).context("failed to serialize status")?;
        println!("{out}");
    } else {
        print_status(&session, &tracker);
    }
    Ok(())
}

fn cmd_visit(
    cli: &Cli,
    load_ms: Millis,
    wait_ms: Option<Millis>,
    mobile: bool,
    host: Host,
) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, load_ms == 0)?;
    tracker.report_device(mobile, 0);
    if host.autoplay.is_some() {
        tracker.audio_ready(0);
    }
    print_signals(&mut tracker);
    host.reply(&mut tracker, 0);

    if load_ms > 0 {
        step_to(&mut tracker, load_ms, host);
        tracker.host_loaded(load_ms);
        println!("{load_ms:>6}ms  host loaded");
        print_signals(&mut tracker);
    }

    match wait_ms {
        Some(end) => step_to(&mut tracker, end.max(load_ms), host),
        None => run_to_idle(&mut tracker, host),
    }

    let state = tracker.onboarding_state();
    println!(
        "explored {}%, content {}, hint {}",
        tracker.explored_percentage(),
        if state.show_content { "shown" } else { "hidden" },
        if state.hint_visible { "visible" } else { "hidden" },
    );
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_section(cli: &Cli, id: &str, fraction: f64) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, true)?;
    tracker.drain_signals();
    if tracker.region_visibility(id, fraction, 0) {
        print_signals(&mut tracker);
    } else {
        println!("no change ({id} already viewed, unknown or below threshold)");
    }
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_scroll(cli: &Cli, metrics: ScrollMetrics) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, true)?;
    tracker.drain_signals();
    println!("progress {:.0}%", metrics.progress() * 100.0);
    if tracker.portfolio_scrolled(metrics, 0) {
        print_signals(&mut tracker);
    }
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_case_study(cli: &Cli, id: &str, metrics: Option<ScrollMetrics>) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, true)?;
    tracker.drain_signals();
    let recorded = match metrics {
        Some(m) => tracker.case_study_scrolled(id, m, 0),
        None => tracker.case_study_complete(id, 0),
    };
    if recorded {
        print_signals(&mut tracker);
    } else {
        println!("no change");
    }
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_remember_scroll(cli: &Cli, offset: f64) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, true)?;
    tracker.remember_scroll_position(offset);
    println!("remembered scroll position {offset}");
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_hold(cli: &Cli, ms: Millis) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, true)?;
    print_signals(&mut tracker);

    // The hold target sits behind the splash.
    while tracker.onboarding_state().is_loading
        && let Some(due) = tracker.next_due()
    {
        step_to(&mut tracker, due, Host::default());
    }

    let start = tracker.now();
    let end = start + ms;
    tracker.pointer_down(start);
    step_to(&mut tracker, end, Host::default());
    if tracker.pointer_up(end) {
        println!("{end:>6}ms  released early, hold discarded");
    }
    run_to_idle(&mut tracker, Host::default());

    println!("explored {}%", tracker.explored_percentage());
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_prefs(
    cli: &Cli,
    lite: Option<bool>,
    cursor: Option<bool>,
    music: Option<bool>,
    volume: Option<f64>,
) -> Result<()> {
    let (_, mut tracker) = load_tracker(cli, true)?;
    tracker.drain_signals();
    if let Some(on) = lite {
        tracker.set_lite_mode(on, 0);
    }
    if let Some(on) = cursor {
        tracker.set_custom_cursor(on, 0);
    }
    if let Some(on) = music {
        tracker.set_audio_playing(on, 0);
    }
    if let Some(v) = volume {
        tracker.set_volume(v, 0);
    }
    print_signals(&mut tracker);
    print_preferences(&tracker);
    drop(tracker.into_persistence());
    Ok(())
}

fn cmd_session(cli: &Cli, action: &SessionAction) -> Result<()> {
    let base = default_base_dir();
    match action {
        SessionAction::New => {
            let id = DeviceStore::new_session(Some(&base)).context("failed to start session")?;
            println!("new session {id}");
        }
        SessionAction::Clear => {
            let Some(id) = cli
                .session
                .clone()
                .or_else(|| DeviceStore::current_session(Some(&base)))
            else {
                println!("no current session");
                return Ok(());
            };
            if DeviceStore::clear_session(&id, Some(&base)).context("failed to clear session")? {
                println!("cleared session {id}");
            } else {
                println!("no data for session {id}");
            }
        }
        SessionAction::Show => {
            let current = DeviceStore::current_session(Some(&base));
            println!("current:  {}", current.as_deref().unwrap_or("-"));
            for id in DeviceStore::list_sessions(Some(&base)).context("failed to list sessions")? {
                let marker = if current.as_deref() == Some(id.as_str()) { "*" } else { " " };
                println!("{marker} {id}");
            }
        }
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let (_, store) = open_store(cli)?;
    let snapshot = engage_store::export_json_file(&store, path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "exported to {} (explored {}%)",
        path.display(),
        snapshot.explored_percentage
    );
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let (_, mut store) = open_store(cli)?;
    let written =
        engage_store::import_json_file(&mut store, path).context("failed to import JSON")?;
    let explored = engage_core::EngagementState::rehydrate(&store).exploration_percentage();
    println!(
        "imported {written} keys from {}. explored {explored}%",
        path.display()
    );
    Ok(())
}

async fn cmd_run(cli: &Cli) -> Result<()> {
    let (session, store) = open_store(cli)?;
    let timings = load_timings()?;
    tracing::info!(session = %session, "starting real-time driver");
    runner::run(&session, store, timings).await
}
