// Generation run configuration, loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::GenResult;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: Paths,
    #[serde(default)]
    pub generation: Generation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Environment description file (JSON, or TOML by extension).
    pub env_input: PathBuf,
    /// Directory the generated sources are written into.
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Generation {
    /// Drop exception annotations from extern declarations entirely.
    #[serde(default)]
    pub no_exceptions: bool,
    /// Annotation text after `except` on extern declarations.
    /// Defaults to `+` (translate C++ exceptions).
    #[serde(default)]
    pub exception: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> GenResult<Config> {
        let raw = fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// The effective exception annotation for extern declarations.
    pub fn exception_annotation(&self) -> Option<String> {
        if self.generation.no_exceptions {
            return None;
        }
        Some(self.generation.exception.clone().unwrap_or_else(|| "+".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_defaults_to_translated_exceptions() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            env_input = "env.json"
            out_dir = "generated"
            "#,
        )
        .unwrap();
        assert_eq!(config.exception_annotation().as_deref(), Some("+"));
        assert_eq!(config.paths.out_dir, PathBuf::from("generated"));
    }

    #[test]
    fn no_exceptions_overrides_any_annotation() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            env_input = "env.json"
            out_dir = "generated"

            [generation]
            no_exceptions = true
            exception = "+"
            "#,
        )
        .unwrap();
        assert_eq!(config.exception_annotation(), None);
    }

    #[test]
    fn custom_annotation_text_is_kept() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            env_input = "env.json"
            out_dir = "generated"

            [generation]
            exception = "+MemoryError"
            "#,
        )
        .unwrap();
        assert_eq!(config.exception_annotation().as_deref(), Some("+MemoryError"));
    }
}
