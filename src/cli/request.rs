// src/cli/request.rs
// Request input assembled from a TOML file and/or command line flags

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::questions::QuestionSet;

/// Background and questions for one submission
///
/// ```toml
/// background = "Lease classification for Co A"
/// questions = ["Is this a finance lease?", "What discount rate applies?"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub questions: QuestionSet,
}

impl AdvisoryRequest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {:?}", path))?;
        let request: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse request file: {:?}", path))?;
        Ok(request)
    }

    /// File contents first; `--background` replaces, `--question` appends
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut request = match &args.file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(background) = &args.background {
            request.background = background.clone();
        }
        request.questions.extend(args.questions.iter().cloned());
        Ok(request)
    }
}
