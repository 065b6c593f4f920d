//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::{Config, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod output;

/// Hypermedia state machine toolkit CLI
#[derive(Parser, Debug)]
#[command(name = "hyperstate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect a model: states, paths and interactions
    Inspect {
        /// Path to model file
        model: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Generate the links a resource representation carries
    Links {
        /// Path to model file
        #[arg(short, long)]
        model: PathBuf,

        /// State answering the request, by id or name
        #[arg(short, long)]
        state: String,

        /// JSON payload file; an object is one entity, an array a collection
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Path parameter binding (repeatable)
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Custom link relation to resolve as well, as a transition id
        /// ("ENTITY.src>ENTITY.tgt")
        #[arg(long)]
        rel: Option<String>,

        /// Base URI for link hrefs (overrides config)
        #[arg(long, env = "HYPERSTATE_BASE_URI")]
        base_uri: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Export a model as a Graphviz DOT graph
    Graph {
        /// Path to model file
        model: PathBuf,

        /// Write the graph here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check a model for structural problems
    Check {
        /// Path to model file
        model: PathBuf,
    },

    /// Resolve which state answers a method and path
    Route {
        /// HTTP method
        method: String,

        /// Request path
        path: String,

        /// Model directory (overrides config)
        #[arg(long)]
        models: Option<PathBuf>,
    },
}

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text table
    Table,
}

/// Execute the CLI command
pub fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Inspect { .. } => commands::inspect::execute(args),
        Commands::Links { .. } => commands::links::execute(args, config),
        Commands::Graph { .. } => commands::graph::execute(args),
        Commands::Check { model } => commands::check::execute(model),
        Commands::Route { .. } => commands::route::execute(args, config),
    }
}
