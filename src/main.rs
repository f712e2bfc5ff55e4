use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sui_agent::app::App;
use sui_agent::config::load_config;
use sui_agent::keys;
use sui_agent::screen::SimulatedDisplay;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    log::info!("🚀 starting sui-agent with args: {:?}", args);

    if let Some(path) = args.env_file.as_ref() {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load env file {}", path.display()))?;
    }

    let config = load_config().context("Failed to load configuration")?;
    let key_events = keys::spawn_stdin_source();
    let display = Box::new(SimulatedDisplay::new());

    let mut app =
        App::new(&config, display, key_events).context("Failed to initialize appliance")?;
    app.run()?;
    Ok(())
}
