use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::transform::{DuplicatePolicy, FlattenOptions};

/// Project configuration loaded from `.bpo.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BpoConfig {
    /// Authored (nested) blueprint.
    pub input: String,
    /// Where `bpo flatten` writes the flat blueprint.
    pub flat_output: String,
    /// Where `bpo flatten` writes the path index.
    pub index_output: String,
    /// Where `bpo unflatten` writes the rebuilt blueprint.
    pub output: String,
    pub flatten: FlattenConfig,
}

impl Default for BpoConfig {
    fn default() -> Self {
        Self {
            input: "blueprint.json".to_string(),
            flat_output: "blueprint.flat.json".to_string(),
            index_output: "blueprint.index.json".to_string(),
            output: "blueprint.optimized.json".to_string(),
            flatten: FlattenConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    pub duplicate_paths: DuplicatePolicy,
}

impl From<&FlattenConfig> for FlattenOptions {
    fn from(config: &FlattenConfig) -> Self {
        FlattenOptions {
            duplicate_paths: config.duplicate_paths,
        }
    }
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".bpo.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<BpoConfig>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
    let config: BpoConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# bpo configuration
input: blueprint.json               # authored blueprint, may be nested
flat_output: blueprint.flat.json    # flat blueprint for the optimizer
index_output: blueprint.index.json  # flat name -> nested path
output: blueprint.optimized.json    # rebuilt blueprint

flatten:
  duplicate_paths: reject  # reject | last_write_wins
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BpoConfig::default();
        assert_eq!(config.input, "blueprint.json");
        assert_eq!(config.flat_output, "blueprint.flat.json");
        assert_eq!(config.index_output, "blueprint.index.json");
        assert_eq!(config.output, "blueprint.optimized.json");
        assert_eq!(config.flatten.duplicate_paths, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
input: schemas/invoice.json
flat_output: build/flat.json
index_output: build/index.json
output: build/invoice.json
flatten:
  duplicate_paths: last_write_wins
"#;
        let config: BpoConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.input, "schemas/invoice.json");
        assert_eq!(config.flat_output, "build/flat.json");
        assert_eq!(config.index_output, "build/index.json");
        assert_eq!(config.output, "build/invoice.json");
        let options = FlattenOptions::from(&config.flatten);
        assert_eq!(options.duplicate_paths, DuplicatePolicy::LastWriteWins);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: BpoConfig = serde_yaml_ng::from_str("input: invoice.json\n").unwrap();
        assert_eq!(config.input, "invoice.json");
        // Defaults applied
        assert_eq!(config.output, "blueprint.optimized.json");
        assert_eq!(config.flatten.duplicate_paths, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_default_content_parses() {
        let config: BpoConfig = serde_yaml_ng::from_str(default_config_content()).unwrap();
        assert_eq!(config.input, BpoConfig::default().input);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(loaded.is_none());
    }
}
