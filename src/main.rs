//! phiclear - PHI session-safety demo driver
//!
//! Opens a few synthetic patient screens, then clears them through a logout or an
//! idle timeout and prints what the coordinator reported.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use phiclear::{
    spawn_idle_watch, ClearCoordinator, PhiState, RegistrationOptions, SessionConfig,
    SessionGuard,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG controls verbosity
    env_logger::init();

    // Parse command-line arguments
    let matches = Command::new("phiclear")
        .version(phiclear::VERSION)
        .about("Clear in-memory PHI on logout or idle timeout")
        .long_about(
            "phiclear wires a clear coordinator to a few synthetic patient screens and \
             triggers a clear through logout or an idle timeout. Set RUST_LOG=debug to \
             see registration and broadcast logging.",
        )
        .arg(
            Arg::new("trigger")
                .long("trigger")
                .value_parser(["logout", "idle"])
                .default_value("logout")
                .help("What ends the session"),
        )
        .arg(
            Arg::new("idle-timeout-ms")
                .long("idle-timeout-ms")
                .value_parser(clap::value_parser!(u64))
                .help("Idle timeout in milliseconds (default from config)"),
        )
        .arg(
            Arg::new("poll-interval-ms")
                .long("poll-interval-ms")
                .value_parser(clap::value_parser!(u64))
                .help("Idle watcher poll interval in milliseconds"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("TOML session config (requires the `config` feature)"),
        )
        .arg(
            Arg::new("inject-failure")
                .long("inject-failure")
                .action(ArgAction::SetTrue)
                .help("Register a listener that panics during reset"),
        )
        .get_matches();

    // Config file first, then command-line overrides
    let mut config = load_config(matches.get_one::<String>("config"))?;
    if let Some(ms) = matches.get_one::<u64>("idle-timeout-ms") {
        config.idle_timeout_ms = *ms;
    }
    if let Some(ms) = matches.get_one::<u64>("poll-interval-ms") {
        config.poll_interval_ms = *ms;
    } else if matches.get_one::<u64>("idle-timeout-ms").is_some() {
        config.poll_interval_ms = config.poll_interval_ms.min(config.idle_timeout_ms);
    }

    let coordinator = ClearCoordinator::new();
    let guard = Arc::new(
        SessionGuard::new(coordinator.clone(), config.clone()).context("invalid session config")?,
    );

    // Synthetic patient screens holding PHI
    let transcript = PhiState::with_options(
        &coordinator,
        RegistrationOptions::new().label("dictation"),
        "Pt reports polyuria x2 weeks".to_string(),
        String::new(),
    );
    let labs = PhiState::with_options(
        &coordinator,
        RegistrationOptions::new().label("lab-results"),
        vec!["A1c 8.7".to_string(), "LDL 131".to_string()],
        Vec::new(),
    );
    let screening = PhiState::with_options(
        &coordinator,
        RegistrationOptions::new().label("phq9-score").priority(-1),
        Some(14u8),
        None,
    );
    let _faulty = matches.get_flag("inject-failure").then(|| {
        coordinator.register_listener_with(
            RegistrationOptions::new().label("faulty-widget"),
            || panic!("simulated reset failure"),
        )
    });

    println!(
        "{} PHI listeners registered, trigger: {}",
        coordinator.listener_count(),
        matches.get_one::<String>("trigger").map_or("logout", String::as_str)
    );

    // End the session and collect the broadcast report
    let report = match matches.get_one::<String>("trigger").map(String::as_str) {
        Some("idle") => {
            let watcher = spawn_idle_watch(Arc::clone(&guard));
            println!("Waiting {:?} for idle timeout...", config.idle_timeout());
            loop {
                tokio::time::sleep(config.poll_interval()).await;
                if !guard.is_active() {
                    break;
                }
            }
            watcher.shutdown().await;
            guard
                .last_report()
                .context("idle watcher stopped without clearing")?
        }
        _ => guard.logout(),
    };

    // Show what each screen looks like after the clear
    println!("Broadcast: {}", report);
    for failure in &report.failures {
        eprintln!("  failed: {} ({}): {}", failure.describe(), failure.kind, failure.message);
    }
    println!("  dictation cleared:   {}", transcript.is_cleared());
    println!("  lab-results cleared: {}", labs.is_cleared());
    println!("  phq9-score cleared:  {}", screening.is_cleared());

    Ok(())
}

#[cfg(feature = "config")]
fn load_config(path: Option<&String>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load(std::path::Path::new(path))
            .with_context(|| format!("loading config from {}", path)),
        None => SessionConfig::load_or_default().context("loading default config"),
    }
}

#[cfg(not(feature = "config"))]
fn load_config(path: Option<&String>) -> Result<SessionConfig> {
    if path.is_some() {
        anyhow::bail!("--config requires phiclear to be built with the `config` feature");
    }
    Ok(SessionConfig::default())
}
