//! CLI argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI parser for `architect`.
#[derive(Debug, Parser)]
#[command(
    name = "architect",
    version,
    about = "Scaffold a software project from a natural-language description"
)]
pub struct Cli {
    /// JSON pipeline configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Where a single-stage command writes its JSON artifact.
#[derive(Debug, Clone, Args)]
pub struct ArtifactOut {
    /// Write the artifact to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Project identity shared by `analyze` and `generate`.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project name.
    #[arg(short, long)]
    pub name: String,

    /// Natural-language description of the project.
    #[arg(short, long)]
    pub description: String,

    /// Extra constraints or context for the analysis.
    #[arg(long)]
    pub context: Option<String>,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify a project and extract its requirements.
    Analyze {
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        out: ArtifactOut,
    },
    /// Plan components from an analysis file.
    Architecture {
        /// Analysis JSON produced by `analyze`.
        #[arg(long, value_name = "FILE")]
        analysis: PathBuf,
        /// Preferred technologies (repeatable or comma-separated).
        #[arg(long = "prefer", value_delimiter = ',')]
        preferred: Vec<String>,
        #[command(flatten)]
        out: ArtifactOut,
    },
    /// Lay out the file tree for an architecture plan.
    Structure {
        /// Architecture plan JSON produced by `architecture`.
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,
        /// Free-form layout preference.
        #[arg(long)]
        layout: Option<String>,
        #[command(flatten)]
        out: ArtifactOut,
    },
    /// Generate source files for a structure.
    Code {
        /// Architecture plan JSON.
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,
        /// Project structure JSON produced by `structure`.
        #[arg(long, value_name = "FILE")]
        structure: PathBuf,
        /// Only generate these file paths (repeatable).
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<String>,
        #[command(flatten)]
        out: ArtifactOut,
    },
    /// Resolve package dependencies for a plan.
    Deps {
        /// Architecture plan JSON.
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,
        #[command(flatten)]
        out: ArtifactOut,
    },
    /// Run the full pipeline and write the project.
    Generate {
        #[command(flatten)]
        project: ProjectArgs,
        /// Preferred technologies (repeatable or comma-separated).
        #[arg(long = "prefer", value_delimiter = ',')]
        preferred: Vec<String>,
        /// Free-form layout preference.
        #[arg(long)]
        layout: Option<String>,
        /// Write the project into this directory.
        #[arg(long, value_name = "DIR", conflicts_with = "zip", required_unless_present = "zip")]
        out_dir: Option<PathBuf>,
        /// Write the project as a zip archive.
        #[arg(long, value_name = "FILE")]
        zip: Option<PathBuf>,
        /// Also save the full artifact bundle as JSON.
        #[arg(long, value_name = "FILE")]
        bundle: Option<PathBuf>,
    },
    /// Serve the HTTP API.
    Serve {
        /// Bind address; defaults to the configured host.
        #[arg(long)]
        host: Option<String>,
        /// Bind port; defaults to the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
}
