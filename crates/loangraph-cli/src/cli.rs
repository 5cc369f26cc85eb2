use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loangraph_policy::DecisionMode;

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "loangraph")]
#[command(author, version, about = "Evaluate applicants against declarative credit policies")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "loangraph.yaml", global = true)]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a single applicant and print the decision as JSON
    Evaluate {
        /// Policy file (JSON or YAML)
        #[arg(short, long)]
        policy: Option<String>,

        /// Applicant record (JSON)
        #[arg(short, long)]
        applicant: PathBuf,

        /// Decision mode: first_terminal or reached_terminal
        #[arg(long, value_parser = parse_mode)]
        decision_mode: Option<DecisionMode>,

        /// Treat policy lint warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Evaluate every applicant of a JSON-lines file concurrently
    Batch {
        /// Policy file (JSON or YAML)
        #[arg(short, long)]
        policy: Option<String>,

        /// Applicants, one JSON record per line
        #[arg(short, long)]
        applicants: PathBuf,

        /// Maximum evaluations in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append a hash-chained audit trail to this file
        #[arg(long)]
        audit: Option<String>,

        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        metrics: bool,

        /// Decision mode: first_terminal or reached_terminal
        #[arg(long, value_parser = parse_mode)]
        decision_mode: Option<DecisionMode>,

        /// Treat policy lint warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Export the policy as a node/link graph
    Visualize {
        /// Policy file (JSON or YAML)
        #[arg(short, long)]
        policy: Option<String>,

        /// Write the graph here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load the policy and report authoring problems
    Validate {
        /// Policy file (JSON or YAML)
        #[arg(short, long)]
        policy: Option<String>,

        /// Fail when any warning is found
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    /// Configuration values given on the command line
    pub fn overrides(&self) -> ConfigOverrides {
        match &self.command {
            Commands::Evaluate {
                policy,
                decision_mode,
                strict,
                ..
            } => ConfigOverrides {
                policy: policy.clone(),
                decision_mode: *decision_mode,
                strict: *strict,
                ..ConfigOverrides::default()
            },
            Commands::Batch {
                policy,
                concurrency,
                audit,
                decision_mode,
                strict,
                ..
            } => ConfigOverrides {
                policy: policy.clone(),
                decision_mode: *decision_mode,
                strict: *strict,
                concurrency: *concurrency,
                audit_path: audit.clone(),
            },
            Commands::Visualize { policy, .. } => ConfigOverrides {
                policy: policy.clone(),
                ..ConfigOverrides::default()
            },
            Commands::Validate { policy, strict } => ConfigOverrides {
                policy: policy.clone(),
                strict: *strict,
                ..ConfigOverrides::default()
            },
        }
    }
}

fn parse_mode(s: &str) -> Result<DecisionMode, String> {
    match s {
        "first_terminal" => Ok(DecisionMode::FirstTerminal),
        "reached_terminal" => Ok(DecisionMode::ReachedTerminal),
        other => Err(format!(
            "unknown decision mode '{}' (expected first_terminal or reached_terminal)",
            other
        )),
    }
}
