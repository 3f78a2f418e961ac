//! CLI argument definitions using clap

use clap::{Parser, Subcommand, ValueHint};

/// Compose descriptor toolkit: typed model, env interpolation, and configuration validation
#[derive(Parser, Debug)]
#[command(name = "rscompose")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true)]
    pub project_dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a descriptor's configuration
    Validate {
        /// Descriptor file (default: discovered in project dir)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,
        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Print the descriptor normalized to canonical YAML
    Render {
        /// Descriptor file (default: discovered in project dir)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,
    },

    /// Print a service's environment as export lines
    Env {
        /// Service name
        service: String,
        /// Descriptor file (default: discovered in project dir)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: Option<String>,
    },

    /// List published ports
    Ports {
        /// Descriptor file (default: discovered in project dir)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,
    },

    /// List volumes and mounts
    Volumes {
        /// Descriptor file (default: discovered in project dir)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<String>,
    },

    /// List descriptor files below a directory
    Files {
        /// Directory to search (default: project dir)
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Show version and author
    Info,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}
