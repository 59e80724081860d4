//! Engine configuration, loaded from RON.
//!
//! ```ron
//! (
//!     default_status: closed,
//!     open_icon: "▾",
//!     closed_icon: "▸",
//!     deferred_recheck: true,
//! )
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ToggleStatus;

/// Presentation and scheduling settings for toggles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Status of toggles created from the toolbox or by conversion.
    pub default_status: ToggleStatus,
    /// Icon shown next to an open toggle's title.
    pub open_icon: String,
    /// Icon shown next to a closed toggle's title.
    pub closed_icon: String,
    /// Title placeholder for an empty toggle title.
    pub title_placeholder: String,
    /// Affordance shown below a toggle with no members.
    pub placeholder: String,
    /// Defer membership rechecks after host notifications to the next action.
    pub deferred_recheck: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_status: ToggleStatus::Open,
            open_icon: "▾".to_string(),
            closed_icon: "▸".to_string(),
            title_placeholder: "Toggle".to_string(),
            placeholder: "Empty toggle. Click or drop blocks inside.".to_string(),
            deferred_recheck: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_ron_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded engine config");
        Ok(config)
    }

    /// Icon for a toggle in `status`.
    pub fn icon(&self, status: ToggleStatus) -> &str {
        match status {
            ToggleStatus::Open => &self.open_icon,
            ToggleStatus::Closed => &self.closed_icon,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_takes_defaults() {
        let config = EngineConfig::from_ron_str("(default_status: closed, deferred_recheck: true)").unwrap();
        assert_eq!(config.default_status, ToggleStatus::Closed);
        assert!(config.deferred_recheck);
        assert_eq!(config.placeholder, EngineConfig::default().placeholder);
        assert_eq!(config.icon(ToggleStatus::Closed), "▸");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"(open_icon: "-", closed_icon: "+")"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.icon(ToggleStatus::Open), "-");
        assert_eq!(config.icon(ToggleStatus::Closed), "+");
        assert_eq!(config.default_status, ToggleStatus::Open);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            EngineConfig::from_ron_str("(default_status: ajar)"),
            Err(ConfigError::Ron(_))
        ));
        assert!(matches!(
            EngineConfig::load("/nonexistent/oritatami.ron"),
            Err(ConfigError::Io(_))
        ));
    }
}
