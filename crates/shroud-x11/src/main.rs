//! shroud - Simple X display locker.
//!
//! Blanks every screen of the display, captures keyboard and pointer input
//! exclusively, and releases only after PAM accepts a typed password.
//!
//! Idle-timeout/DPMS policy is deliberately not handled here; configure it
//! with `xset` or another utility so the timeout stays user-controlled.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use shroud_core::{DisplayServer, InputLoop, LockColors, LockManager};
use shroud_x11::X11Display;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Simple X display locker.
#[derive(Parser)]
#[command(name = "shroud")]
#[command(version)]
#[command(about = "Lock every X screen until a password is accepted")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Print version information and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Background color while the password buffer is empty
    #[arg(long, value_name = "COLOR", default_value = "black")]
    idle_color: String,

    /// Background color while the password buffer is non-empty
    #[arg(long, value_name = "COLOR", default_value = "#005577")]
    typing_color: String,
}

fn setup_logging() {
    // Set up tracing with environment filter
    // Use RUST_LOG=debug for verbose output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(feature = "pam")]
fn build_authority() -> Result<shroud_x11::PamAuthority> {
    Ok(shroud_x11::PamAuthority::new())
}

#[cfg(not(feature = "pam"))]
fn build_authority() -> Result<shroud_core::mock::MockAuthority> {
    anyhow::bail!("built without an authentication backend; rebuild with `--features pam`")
}

fn run(cli: Cli) -> Result<ExitCode> {
    let authority = build_authority()?;

    let mut display = X11Display::open().context("cannot open display")?;
    let colors = LockColors {
        idle: cli.idle_color,
        typing: cli.typing_color,
    };

    let mut manager = LockManager::new();
    let mut locks = manager.acquire_all(&mut display, &colors);

    // Locking nothing is worse than not running: it would falsely suggest
    // protection.
    if locks.locked_count() == 0 {
        error!("no screen could be locked");
        return Ok(ExitCode::from(1));
    }
    // tracing's field sugar shadows `display` inside the macro body.
    let screen_total = display.screen_count();
    info!(
        locked = locks.locked_count(),
        screens = screen_total,
        "screens locked, waiting for password"
    );

    let mut input = InputLoop::new();
    let outcome = input.run(&mut display, &locks, &authority);

    // Release on every path, including a broken display connection.
    manager.release_all(&mut display, &mut locks);
    outcome.context("lost the display mid-session")?;

    info!("unlocked");
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
