//! System prompt assembly from text files

use crate::config::Config;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default prompt directory, relative to the working directory
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Required base prompt file name
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";

/// Separator placed between prompt sections
const SECTION_SEPARATOR: &str = "\n\n";

/// Loads the agent instructions from a prompt directory
#[derive(Debug, Clone)]
pub struct PromptLoader {
    dir: PathBuf,
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPTS_DIR)
    }
}

impl PromptLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the base prompt and append the prompt of every active backend.
    ///
    /// The base file is required. Backend prompt files are optional and are
    /// skipped when missing.
    pub fn load(&self, config: &Config) -> Result<String> {
        let base_path = self.dir.join(SYSTEM_PROMPT_FILE);
        let mut prompt = std::fs::read_to_string(&base_path)
            .with_context(|| format!("Failed to read system prompt: {}", base_path.display()))?;

        for backend in config.active_backends() {
            let path = self.dir.join(backend.backend.prompt_file());
            match std::fs::read_to_string(&path) {
                Ok(section) => {
                    prompt.push_str(SECTION_SEPARATOR);
                    prompt.push_str(&section);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!("No prompt file for {}: {}", backend.backend, path.display());
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to read prompt: {}", path.display()));
                }
            }
        }

        Ok(prompt)
    }
}
