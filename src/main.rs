//! speakd main entry point
//!
//! The daemon reads commands from stdin, one per line:
//! - `volume <n>`   set the device volume (0-100)
//! - `cache <raw>`  pre-cache a raw speak command in the background
//! - `stop`         stop after a bounded grace period
//! - anything else  speak it now (decoded per the `;` convention)
//!
//! SIGINT/SIGTERM request the same graceful stop. All other failures are
//! logged and the affected request abandoned.

use log::{error, info, warn};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use speakd::cache::{sanitize_cache_dir, Cache};
use speakd::config::Config;
use speakd::engine::queue::AnnounceSettings;
use speakd::engine::{Command, Service, ServiceSettings};
use speakd::player::{create_player, Player, PlayerContext};
use speakd::speech::synth::UnavailableEngine;
use speakd::speech::{create_engine, SpeechEngine};
use speakd::{media, Result};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Global flag set by the stop signal handler
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// SIGINT/SIGTERM handler - requests a graceful stop
extern "C" fn handle_stop(_: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::Relaxed);
}

fn main() {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    // Initialize logger
    if debug_mode {
        // Debug mode: write to speakd.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("speakd.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open speakd.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "speakd version {} starting (debug mode, logging to speakd.log)",
            speakd::VERSION
        );
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    if let Err(e) = run() {
        error!("Fatal error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    // Optional positional argument: explicit config file path
    let config_path: Option<PathBuf> = std::env::args()
        .skip(1)
        .find(|arg| arg != "--debug" && arg != "-d")
        .map(PathBuf::from);

    let config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.path());

    let app_root = std::env::current_dir()?;

    // Mirror pre-shipped announcement/prompt audio into the managed store
    let bundled_media = app_root.join(config.media_dir());
    let store = app_root.join("store");
    if let Err(e) = media::sync(&bundled_media, &store) {
        error!("Media sync failed: {}", e);
    }

    // Cache, confined to the application root
    let cache_dir = sanitize_cache_dir(&app_root, &config.cache_dir());
    info!(
        "Cache {} at {}",
        if config.cache_enabled() { "enabled" } else { "disabled" },
        cache_dir.display()
    );
    let cache = Cache::new(cache_dir, config.cache_enabled());

    let player = build_player(&config, &app_root)?;
    let synth = build_engine(&config, player.requires_artifact());

    // Announcement preemption, disabled when the file is missing
    let announce = config
        .announce_file()
        .and_then(|file| media::resolve_announce(&store, &file))
        .map(|file| AnnounceSettings {
            file,
            idle_timeout: Duration::from_secs(config.announce_timeout_secs()),
            volume_percent: config.announce_volume_percent(),
        });
    if announce.is_some() {
        info!(
            "Announcements enabled, idle timeout {}s",
            config.announce_timeout_secs()
        );
    }

    let mut service = Service::new(
        cache,
        synth,
        player,
        ServiceSettings {
            default_volume: config.default_volume(),
            announce,
        },
    );

    let (tx, rx) = mpsc::channel();

    // Submit the pre-cache manifest once on startup
    match media::load_precache_manifest(&bundled_media) {
        Ok(Some(manifest)) => {
            for raw in manifest.commands {
                let _ = tx.send(Command::CacheText(raw));
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Cannot load pre-cache manifest: {}", e),
    }

    // Graceful stop on SIGINT/SIGTERM
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_stop))
            .map_err(|e| format!("Failed to set SIGINT handler: {}", e))?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_stop))
            .map_err(|e| format!("Failed to set SIGTERM handler: {}", e))?;
    }

    // Stdin feeds the command channel; EOF stops the service
    let stdin_tx = tx.clone();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(command) = parse_line(line) else {
                continue;
            };
            let is_stop = matches!(command, Command::Stop);
            if stdin_tx.send(command).is_err() || is_stop {
                return;
            }
        }
        let _ = stdin_tx.send(Command::Stop);
    });

    info!("speakd {} ready", speakd::VERSION);
    service.run(rx, &STOP_REQUESTED);
    Ok(())
}

/// Map one stdin line to a service command; malformed volume lines are
/// dropped with a warning rather than spoken
fn parse_line(line: &str) -> Option<Command> {
    if let Some(rest) = line.strip_prefix("volume ") {
        return match rest.trim().parse::<u8>() {
            Ok(volume) if volume <= 100 => Some(Command::SetVolume(volume)),
            _ => {
                warn!("Volume must be 0-100, ignoring {:?}", rest.trim());
                None
            }
        };
    }
    if let Some(rest) = line.strip_prefix("cache ") {
        return Some(Command::CacheText(rest.to_string()));
    }
    if line == "stop" {
        return Some(Command::Stop);
    }
    Some(Command::Say(line.to_string()))
}

/// Create the playback backend, falling back to the local target when the
/// configured one cannot be constructed
fn build_player(config: &Config, app_root: &std::path::Path) -> Result<Box<dyn Player>> {
    let ctx = PlayerContext {
        app_root: app_root.to_path_buf(),
        web_url: config.web_url(),
    };
    let target = config.device_target();

    match create_player(target, &ctx) {
        Ok(player) => Ok(player),
        Err(e) if target != speakd::player::DeviceTarget::Local => {
            error!("Cannot create {:?} playback backend: {}", target, e);
            info!("Falling back to local playback");
            create_player(speakd::player::DeviceTarget::Local, &ctx)
        }
        Err(e) => Err(e),
    }
}

/// Create the synthesis backend; when it is unavailable but artifacts are
/// required, a stand-in engine degrades every synthesis to a logged failure
fn build_engine(config: &Config, artifacts_required: bool) -> Box<dyn SpeechEngine> {
    let engine_id = config.engine_id();
    match create_engine(&engine_id) {
        Ok(engine) => engine,
        Err(e) => {
            if artifacts_required {
                error!("Synthesis backend unavailable: {}", e);
            }
            Box::new(UnavailableEngine::new(&engine_id, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_line_in_range() {
        assert!(matches!(parse_line("volume 30"), Some(Command::SetVolume(30))));
        assert!(matches!(parse_line("volume 100"), Some(Command::SetVolume(100))));
    }

    #[test]
    fn test_out_of_range_volume_is_dropped() {
        assert!(parse_line("volume 130").is_none());
        assert!(parse_line("volume loud").is_none());
    }

    #[test]
    fn test_cache_and_stop_lines() {
        assert!(matches!(parse_line("cache en;Hello"), Some(Command::CacheText(_))));
        assert!(matches!(parse_line("stop"), Some(Command::Stop)));
    }

    #[test]
    fn test_anything_else_is_spoken() {
        assert!(matches!(parse_line("7;en;Hello"), Some(Command::Say(_))));
    }
}
