//! Real-time driver: timers fire on the wall clock, stdin lines are events.

use anyhow::{Context, Result};
use engage_core::{EngagementTracker, Millis, Persistence, ScrollMetrics, Timings};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, Instant};

use crate::{print_signals, print_status};

#[derive(Debug, PartialEq)]
enum Input {
    Load,
    Down,
    Up,
    Leave,
    Dismiss,
    Close,
    Section { id: String, fraction: f64 },
    CaseStudy(String),
    Scroll(ScrollMetrics),
    Mobile,
    CloseAlert,
    Audio,
    Autoplay(bool),
    Music(bool),
    Volume(f64),
    Lite(bool),
    Cursor(bool),
    Status,
    Quit,
}

fn number(word: Option<&str>, what: &str) -> Result<f64, String> {
    let word = word.ok_or_else(|| format!("missing {what}"))?;
    word.parse::<f64>()
        .map_err(|_| format!("invalid {what}: {word}"))
}

fn switch(word: Option<&str>, what: &str) -> Result<bool, String> {
    match word {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(format!("invalid {what}: {other} (expected on or off)")),
        None => Err(format!("missing {what} setting")),
    }
}

fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let input = match cmd {
        "load" => Input::Load,
        "down" => Input::Down,
        "up" => Input::Up,
        "leave" => Input::Leave,
        "dismiss" => Input::Dismiss,
        "close" => Input::Close,
        "mobile" => Input::Mobile,
        "close-alert" => Input::CloseAlert,
        "audio" => Input::Audio,
        "autoplay" => match words.next() {
            Some("ok") => Input::Autoplay(true),
            Some("blocked") => Input::Autoplay(false),
            _ => return Err("autoplay expects ok or blocked".to_string()),
        },
        "music" => Input::Music(switch(words.next(), "music")?),
        "lite" => Input::Lite(switch(words.next(), "lite mode")?),
        "cursor" => Input::Cursor(switch(words.next(), "cursor")?),
        "volume" => Input::Volume(number(words.next(), "volume")?),
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        "section" => {
            let id = words.next().ok_or("missing section id")?.to_string();
            let fraction = match words.next() {
                Some(w) => number(Some(w), "fraction")?,
                None => 1.0,
            };
            Input::Section { id, fraction }
        }
        "case-study" => Input::CaseStudy(words.next().ok_or("missing case study id")?.to_string()),
        "scroll" => Input::Scroll(ScrollMetrics::new(
            number(words.next(), "offset")?,
            number(words.next(), "content height")?,
            number(words.next(), "viewport height")?,
        )),
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(input))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Returns `false` when the driver should stop.
fn handle(tracker: &mut EngagementTracker, session: &str, input: Input, now: Millis) -> bool {
    match input {
        Input::Load => tracker.host_loaded(now),
        Input::Down => {
            tracker.pointer_down(now);
        }
        Input::Up => {
            tracker.pointer_up(now);
        }
        Input::Leave => {
            tracker.pointer_leave(now);
        }
        Input::Dismiss => {
            tracker.dismiss_hint(now);
        }
        Input::Close => {
            tracker.close_discovery(now);
        }
        Input::Section { id, fraction } => {
            tracker.region_visibility(&id, fraction, now);
        }
        Input::CaseStudy(id) => {
            tracker.case_study_complete(&id, now);
        }
        Input::Scroll(metrics) => {
            tracker.portfolio_scrolled(metrics, now);
        }
        Input::Mobile => {
            tracker.report_device(true, now);
        }
        Input::CloseAlert => {
            tracker.close_mobile_alert(now);
        }
        Input::Audio => {
            tracker.audio_ready(now);
        }
        Input::Autoplay(started) => {
            tracker.autoplay_result(started, now);
        }
        Input::Music(on) => {
            tracker.set_audio_playing(on, now);
        }
        Input::Volume(v) => {
            tracker.set_volume(v, now);
        }
        Input::Lite(on) => {
            tracker.set_lite_mode(on, now);
        }
        Input::Cursor(on) => {
            tracker.set_custom_cursor(on, now);
        }
        Input::Status => print_status(session, tracker),
        Input::Quit => return false,
    }
    true
}

pub async fn run(session: &str, store: Persistence, timings: Timings) -> Result<()> {
    let start = Instant::now();
    let elapsed = || start.elapsed().as_millis() as Millis;

    let mut rng = SmallRng::from_os_rng();
    let mut tracker = EngagementTracker::load(store, timings, false, 0, &mut rng);
    print_signals(&mut tracker);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let deadline = tracker
            .next_due()
            .map(|due| start + Duration::from_millis(due));

        tokio::select! {
            _ = sleep_until(deadline) => {
                if let Some(due) = tracker.next_due() {
                    tracker.advance_to(due);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    tracing::debug!("stdin closed");
                    break;
                };
                match parse_line(&line) {
                    Ok(Some(input)) => {
                        if !handle(&mut tracker, session, input, elapsed()) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(msg) => eprintln!("{msg}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
        print_signals(&mut tracker);
    }

    tracker.teardown();
    print_signals(&mut tracker);
    tracing::info!(explored = tracker.explored_percentage(), "driver stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_line("load"), Ok(Some(Input::Load)));
        assert_eq!(parse_line("  down  "), Ok(Some(Input::Down)));
        assert_eq!(parse_line("exit"), Ok(Some(Input::Quit)));
        assert_eq!(parse_line(""), Ok(None));
    }

    #[test]
    fn test_parse_section_with_default_fraction() {
        assert_eq!(
            parse_line("section about"),
            Ok(Some(Input::Section {
                id: "about".into(),
                fraction: 1.0
            }))
        );
        assert_eq!(
            parse_line("section contact 0.5"),
            Ok(Some(Input::Section {
                id: "contact".into(),
                fraction: 0.5
            }))
        );
    }

    #[test]
    fn test_parse_scroll() {
        assert_eq!(
            parse_line("scroll 4500 5000 500"),
            Ok(Some(Input::Scroll(ScrollMetrics::new(4500.0, 5000.0, 500.0))))
        );
        assert!(parse_line("scroll 1 2").unwrap_err().contains("viewport"));
        assert!(parse_line("scroll x 2 3").unwrap_err().contains("offset"));
    }

    #[test]
    fn test_parse_device_and_audio() {
        assert_eq!(parse_line("mobile"), Ok(Some(Input::Mobile)));
        assert_eq!(parse_line("close-alert"), Ok(Some(Input::CloseAlert)));
        assert_eq!(parse_line("autoplay blocked"), Ok(Some(Input::Autoplay(false))));
        assert_eq!(parse_line("music on"), Ok(Some(Input::Music(true))));
        assert_eq!(parse_line("lite off"), Ok(Some(Input::Lite(false))));
        assert_eq!(parse_line("volume 0.75"), Ok(Some(Input::Volume(0.75))));
        assert!(parse_line("cursor maybe").unwrap_err().contains("expected on or off"));
        assert!(parse_line("autoplay").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_line("jump"), Err("unknown command: jump".to_string()));
        assert_eq!(parse_line("case-study"), Err("missing case study id".to_string()));
    }
}
