// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Use library instead of local modules
use tile_scorekeeper::{export_csv, Config, SessionManager};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::load()?;

    match args.get(1).map(String::as_str) {
        Some("report") => {
            init_logging(&config, false)?;
            run_report(&config)
        }
        Some("players") => {
            init_logging(&config, false)?;
            run_players(&config)
        }
        Some("export") => {
            init_logging(&config, false)?;
            let target = args.get(2).context("Usage: tile-scorekeeper export <file.csv>")?;
            run_export(&config, Path::new(target))
        }
        Some(other) => {
            eprintln!("❌ Unknown command: {}", other);
            eprintln!("   Usage: tile-scorekeeper [report | players | export <file.csv>]");
            std::process::exit(2);
        }
        // UI mode (default)
        None => {
            init_logging(&config, true)?;
            run_ui_mode(&config)
        }
    }
}

/// The console owns the terminal, so it only logs to a file
fn init_logging(config: &Config, console: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match (&config.log_file, console) {
        (Some(path), _) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
        (None, true) => {}
        (None, false) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    Ok(())
}

fn run_report(config: &Config) -> Result<()> {
    let manager = SessionManager::from_config(config)?;
    println!("{}", manager.report().to_text());
    Ok(())
}

fn run_players(config: &Config) -> Result<()> {
    let manager = SessionManager::from_config(config)?;

    if manager.players().is_empty() {
        println!("No players yet.");
    }
    for name in manager.players() {
        println!("{}", name);
    }

    Ok(())
}

fn run_export(config: &Config, target: &Path) -> Result<()> {
    let manager = SessionManager::from_config(config)?;
    let rows = export_csv(manager.history().records(), target)?;

    println!("✓ Exported {} rows from {} rounds to {:?}", rows, manager.history().len(), target);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    let manager = SessionManager::from_config(config)?;

    let mut app = ui::App::new(manager);
    ui::run_ui(&mut app)?;

    println!("\n✅ Console closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ Console mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run the server: cargo run --bin scorekeeper-server --features server");
    std::process::exit(1);
}
