//! loom - a static site generator for jinja templates that rebuilds only
//! what a change touches.

mod build;
mod cli;
mod compiler;
mod config;
mod data;
mod init;
mod logger;
mod serve;
mod site;
mod utils;
mod watch;

use anyhow::{Context, Result};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use logger::Logger;
use site::Site;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = Logger::new(cli.verbose());
    let config = SiteConfig::load(&cli)?;

    if !cli.is_init() {
        config.validate()?;
    }

    match &cli.command {
        Commands::Init(_) => init::new_site(&config, log),
        Commands::Build(_) => build_site(&mut Site::load(config, log)),
        Commands::Watch(_) => watch_site(config, log),
        Commands::Dev(_) => serve::dev_site(config, log),
        Commands::Serve(_) => serve::serve_site(&config, log),
    }
}

/// Rebuild on change until Ctrl+C; no initial build.
fn watch_site(config: SiteConfig, log: Logger) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to set Ctrl+C handler")?;

    let mut site = Site::load(config, log);
    watch::watch_blocking(&mut site, &shutdown)
}
