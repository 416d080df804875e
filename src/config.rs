//! Analysis configuration
//!
//! Selects how reports are rendered and whether the generic multi-signal
//! report is included. Loaded from an optional JSON file; command-line
//! flags take precedence over the file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Output format for rendered reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Human-readable plain text
    #[default]
    Text,
    /// Structured JSON of every report
    Json,
}

impl FromStr for RenderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(RenderMode::Text),
            "json" => Ok(RenderMode::Json),
            other => Err(Error::config(format!(
                "unknown render mode `{}` (expected `text` or `json`)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub mode: RenderMode,
    /// Include the generic multi-signal summary
    pub show_generic: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Text,
            show_generic: true,
        }
    }
}

impl AnalysisConfig {
    /// Read a configuration file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Apply explicit command-line choices on top of this configuration
    pub fn with_overrides(mut self, mode: Option<RenderMode>, no_generic: bool) -> Self {
        if let Some(mode) = mode {
            self.mode = mode;
        }
        if no_generic {
            self.show_generic = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.mode, RenderMode::Text);
        assert!(config.show_generic);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mode": "json"}}"#).unwrap();
        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.mode, RenderMode::Json);
        assert!(config.show_generic);
    }

    #[test]
    fn test_unknown_field_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"colour": true}}"#).unwrap();
        let err = AnalysisConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let config = AnalysisConfig {
            mode: RenderMode::Json,
            show_generic: true,
        }
        .with_overrides(Some(RenderMode::Text), true);
        assert_eq!(config.mode, RenderMode::Text);
        assert!(!config.show_generic);

        let untouched = AnalysisConfig::default().with_overrides(None, false);
        assert_eq!(untouched, AnalysisConfig::default());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("JSON".parse::<RenderMode>().unwrap(), RenderMode::Json);
        assert!("html".parse::<RenderMode>().is_err());
    }
}
