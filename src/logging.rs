//! Logging configuration using tracing.
//!
//! The interactive timeline owns the terminal, so it only logs when a log
//! file is given. One-shot commands log to stderr. `RUST_LOG` overrides the
//! default filter in both cases.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "feedmux=debug,warn"
    } else {
        "feedmux=info,warn"
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(log_file: Option<&Path>, verbose: bool, interactive: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .context("failed to initialize tracing")?;
        }
        None if interactive => {}
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init()
                .context("failed to initialize tracing")?;
        }
    }

    Ok(())
}
