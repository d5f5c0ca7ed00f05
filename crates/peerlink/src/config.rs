//! Bridge configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! strict_release = true
//! trace_crossings = false
//! default_options = ["KOTLINCOMPAT"]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::options::MarshalOptions;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Report a release without outstanding retain as `OverRelease`.
    /// When off, the release is logged and ignored.
    pub strict_release: bool,

    /// Emit a `trace` event for every boundary crossing
    pub trace_crossings: bool,

    /// Flag names making up the options generated glue passes when it has
    /// nothing more specific
    pub default_options: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            strict_release: true,
            trace_crossings: false,
            default_options: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> BridgeResult<Self> {
        let config: BridgeConfig = toml::from_str(content)
            .map_err(|e| BridgeError::InvalidValue(format!("bridge config: {}", e)))?;
        config.default_options()?;
        Ok(config)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> BridgeResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::InvalidValue(format!("bridge config: {}", e)))
    }

    /// `default_options` as a bit-set
    pub fn default_options(&self) -> BridgeResult<MarshalOptions> {
        self.default_options
            .iter()
            .try_fold(MarshalOptions::empty(), |acc, name| {
                MarshalOptions::from_name(name)
                    .map(|flag| acc | flag)
                    .ok_or_else(|| BridgeError::InvalidValue(format!("unknown option `{}`", name)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.strict_release);
        assert!(!config.trace_crossings);
        assert_eq!(config.default_options().unwrap(), MarshalOptions::empty());
    }

    #[test]
    fn test_parse_partial() {
        let config = BridgeConfig::from_toml_str("trace_crossings = true\n").unwrap();
        assert!(config.trace_crossings);
        assert!(config.strict_release);
    }

    #[test]
    fn test_parse_options() {
        let config = BridgeConfig::from_toml_str(
            "strict_release = false\ndefault_options = [\"KOTLINCOMPAT\"]\n",
        )
        .unwrap();
        assert!(!config.strict_release);
        assert!(config.default_options().unwrap().is_compat());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = BridgeConfig::from_toml_str("default_options = [\"FAST\"]\n").unwrap_err();
        assert!(err.to_string().contains("FAST"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = BridgeConfig {
            strict_release: false,
            trace_crossings: true,
            default_options: vec!["KOTLINCOMPAT".to_string()],
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), config);
    }
}
