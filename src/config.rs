//! Tool configuration, read from a TOML file.
//!
//! ```toml
//! [disassembly]
//! annotate = true
//! label_prefix = "L"
//! named_system_vars = true
//!
//! [verify]
//! round_trip = true
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ScummError;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub disassembly: DisassemblyConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DisassemblyConfig {
    /// Append `// [offset] opcode` to every statement.
    pub annotate: bool,
    pub label_prefix: String,
    pub named_system_vars: bool,
}

impl Default for DisassemblyConfig {
    fn default() -> Self {
        DisassemblyConfig {
            annotate: false,
            label_prefix: "L".to_string(),
            named_system_vars: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VerifyConfig {
    /// Recompile each disassembled script and compare with the input.
    pub round_trip: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        VerifyConfig { round_trip: true }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, ScummError> {
        let config: Config =
            toml::from_str(source).map_err(|e| ScummError::ConfigError(e.to_string()))?;
        if !is_identifier(&config.disassembly.label_prefix) {
            return Err(ScummError::ConfigError(format!(
                "label_prefix '{}' is not an identifier",
                config.disassembly.label_prefix
            )));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ScummError> {
        debug!("loading configuration from {}", path.display());
        let source = fs::read_to_string(path)?;
        Config::from_toml(&source)
    }

    pub fn to_toml(&self) -> Result<String, ScummError> {
        toml::to_string(self).map_err(|e| ScummError::ConfigError(e.to_string()))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.disassembly.label_prefix, "L");
        assert!(config.verify.round_trip);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [disassembly]
            annotate = true
            label_prefix = "label_"
            "#,
        )
        .unwrap();
        assert!(config.disassembly.annotate);
        assert_eq!(config.disassembly.label_prefix, "label_");
        assert!(config.disassembly.named_system_vars);
    }

    #[test]
    fn test_rejects_bad_prefix() {
        assert!(matches!(
            Config::from_toml("[disassembly]\nlabel_prefix = \"1x\"\n"),
            Err(ScummError::ConfigError(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.verify.round_trip = false;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
