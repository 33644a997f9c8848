use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ctx::MissingVariable;
use crate::error::QuillError;

pub const DEFAULT_MAX_DEPTH: usize = 1000;

fn env_flag(name: &str) -> bool {
    let Ok(value) = env::var(name) else {
        return false;
    };
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok()?.trim().parse().ok()
}

pub fn missing_variable_from_env() -> MissingVariable {
    if env_flag("QUILL_LENIENT_VARS") {
        MissingVariable::Nil
    } else {
        MissingVariable::Raise
    }
}

pub fn max_depth_from_env() -> usize {
    env_usize("QUILL_MAX_DEPTH").unwrap_or(DEFAULT_MAX_DEPTH)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalOptions {
    pub missing_variable: MissingVariable,
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            missing_variable: missing_variable_from_env(),
            max_depth: max_depth_from_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct OptionsFile {
    missing_variable: Option<MissingVariable>,
    max_depth: Option<usize>,
}

impl EvalOptions {
    pub fn with_missing_variable(mut self, missing: MissingVariable) -> Self {
        self.missing_variable = missing;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn from_toml_str(src: &str) -> Result<Self, QuillError> {
        let file: OptionsFile = toml::from_str(src)
            .map_err(|e| QuillError::illegal_argument(format!("invalid options: {}", e)))?;
        let mut options = Self::default();
        if let Some(missing) = file.missing_variable {
            options.missing_variable = missing;
        }
        if let Some(max_depth) = file.max_depth {
            if max_depth == 0 {
                return Err(QuillError::illegal_argument(
                    "invalid options: max-depth must be positive",
                ));
            }
            options.max_depth = max_depth;
        }
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, QuillError> {
        let content = fs::read_to_string(path).map_err(|e| {
            QuillError::illegal_argument(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}
