// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands, their arguments and the global output flags.

use clap::{Parser, Subcommand};
use shipwright::converge::{ContainerAction, ImageAction};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(about = "Converge container images and containers on a single host")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: discover shipwright.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print actions that changed something
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Converge against a simulated empty host instead of the local runtime
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shipwright.yml configuration file
    Init {
        /// Logical name of the example container
        #[arg(long)]
        name: Option<String>,

        /// Image of the example container
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Converge every declared image, then every declared container
    Apply,

    /// Run one action against an image
    Image {
        #[arg(value_enum)]
        action: ImageAction,

        /// Image reference (repository[:tag])
        reference: String,
    },

    /// Run one action against a declared container
    Container {
        #[arg(value_enum)]
        action: ContainerAction,

        /// Logical name as declared in the configuration
        name: String,
    },

    /// Remove dangling images
    Sweep {
        /// Also try every other image, keeping those in use
        #[arg(long)]
        unused: bool,

        /// Stop and remove every generation of these logical names first
        #[arg(long = "force-remove", value_name = "NAME")]
        force_remove: Vec<String>,
    },
}
