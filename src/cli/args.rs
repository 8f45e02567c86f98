// src/cli/args.rs
// Command line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::AdvisorConfig;

/// Ask the advisory service a set of questions about one scenario
#[derive(Debug, Clone, Parser)]
#[command(name = "advisor", version, about)]
pub struct CliArgs {
    /// Background scenario the questions refer to
    #[arg(short, long)]
    pub background: Option<String>,

    /// A question to ask (repeatable; numbered in the order given)
    #[arg(short = 'q', long = "question", value_name = "TEXT")]
    pub questions: Vec<String>,

    /// TOML request file with `background` and `questions`
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Service WebSocket URL (overrides ADVISOR_SERVICE_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Model identifier sent with the request (overrides ADVISOR_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Seconds to wait for the connection to open
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Progress lines, then answers and summary
    Text,
    /// One JSON document at the end
    Json,
    /// One JSON line per session update, then the final state
    StreamJson,
}

impl CliArgs {
    /// Command line values win over environment configuration
    pub fn apply_to(&self, config: &mut AdvisorConfig) {
        if let Some(url) = &self.url {
            config.service_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(timeout) = self.timeout {
            config.connect_timeout_secs = timeout;
        }
        if self.verbose {
            config.log_level = "debug".to_string();
        }
    }
}
