//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// loom static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project directory or path to its loom.toml
    #[arg(default_value = ".")]
    pub project: PathBuf,

    /// Log verbosely
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for subcommands that run the development server
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Port to run the development server on (default: 8000)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site into the output directory
    Build(ProjectArgs),

    /// Watch sources and rebuild affected pages (no server)
    Watch(ProjectArgs),

    /// Build, then serve and rebuild on change
    Dev(ServeArgs),

    /// Serve the built output directory
    Serve(ServeArgs),

    /// Initialize a new project
    Init(ProjectArgs),
}

impl Cli {
    fn project_args(&self) -> &ProjectArgs {
        match &self.command {
            Commands::Build(args) | Commands::Watch(args) | Commands::Init(args) => args,
            Commands::Dev(args) | Commands::Serve(args) => &args.project,
        }
    }

    pub fn project(&self) -> &Path {
        &self.project_args().project
    }

    pub fn verbose(&self) -> bool {
        self.project_args().verbose
    }

    /// Port override, only for serving subcommands
    pub fn port(&self) -> Option<u16> {
        match &self.command {
            Commands::Dev(args) | Commands::Serve(args) => args.port,
            _ => None,
        }
    }

    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init(_))
    }
}
