use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use wallcycle_cli::{describe, WallcycleApp};
use wallcycle_core::CycleOutcome;

#[derive(Parser)]
#[command(name = "wallcycle")]
#[command(about = "Wallcycle - periodically downloads and sets a new desktop wallpaper")]
#[command(version)]
struct Cli {
    /// Path to the settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Change the wallpaper once and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let app = WallcycleApp::new(cli.config)?;

    if cli.once {
        let outcome = app.change_blocking();
        println!("{}", describe(&outcome));
        if !matches!(outcome, CycleOutcome::Applied(_)) {
            bail!("wallpaper was not changed");
        }
        return Ok(());
    }

    app.initialize(|outcome| log::info!("{}", describe(outcome)));
    println!("Wallcycle started successfully!");
    app.run()
}
