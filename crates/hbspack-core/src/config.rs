use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "hbsconfig.yaml";
pub const DEFAULT_RUNTIME_MODULE: &str = "handlebars/runtime";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("A {kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("The {kind} '{name}' has an empty import specifier")]
    EmptySpecifier { kind: &'static str, name: String },

    #[error("Invalid {kind} override '{value}', expected NAME=SPECIFIER")]
    InvalidOverride { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Helper and partial import tables, shared read-only by every compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionTable {
    pub helpers: IndexMap<String, String>,
    pub partials: IndexMap<String, String>,
}

impl ExtensionTable {
    pub fn helper(&self, name: &str) -> Option<&str> {
        self.helpers.get(name).map(String::as_str)
    }

    pub fn partial(&self, name: &str) -> Option<&str> {
        self.partials.get(name).map(String::as_str)
    }
}

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Helper name to import specifier
    #[serde(default)]
    pub helpers: IndexMap<String, String>,

    /// Partial name to import specifier
    #[serde(default)]
    pub partials: IndexMap<String, String>,

    /// Passed through to the template compiler
    #[serde(default)]
    pub compile_options: Map<String, Value>,

    /// Module the generated code imports the Handlebars runtime from
    #[serde(default = "default_runtime_module")]
    pub runtime_module: String,

    /// File extensions handled by the loader, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Append the template source map to generated modules (default: false)
    #[serde(default)]
    pub inline_source_map: bool,
}

fn default_runtime_module() -> String {
    DEFAULT_RUNTIME_MODULE.to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["hbs".to_string(), "handlebars".to_string()]
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            helpers: IndexMap::new(),
            partials: IndexMap::new(),
            compile_options: Map::new(),
            runtime_module: default_runtime_module(),
            extensions: default_extensions(),
            inline_source_map: false,
        }
    }
}

const INIT_TEMPLATE: &str = r#"# hbspack configuration

# Helpers templates may call, mapped to the module that default-exports them.
helpers: {}
#  bold: ./helpers/bold.js

# Partials templates may include with {{> name}}.
partials: {}
#  footer: ./partials/footer.hbs

# Options forwarded to the template compiler (noEscape, strict, ...).
compileOptions: {}

runtimeModule: handlebars/runtime

extensions:
  - hbs
  - handlebars

inlineSourceMap: false
"#;

/// Overrides collected from the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub helpers: Vec<(String, String)>,
    pub partials: Vec<(String, String)>,
    pub runtime_module: Option<String>,
    pub inline_source_map: bool,
}

impl CliOverrides {
    /// Parses a `NAME=SPECIFIER` pair.
    pub fn parse_pair(kind: &'static str, value: &str) -> Result<(String, String)> {
        match value.split_once('=') {
            Some((name, spec)) if !name.trim().is_empty() && !spec.trim().is_empty() => {
                Ok((name.trim().to_string(), spec.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidOverride {
                kind,
                value: value.to_string(),
            }),
        }
    }
}

impl PluginConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: PluginConfig = if is_json {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Write a commented default configuration to `path`
    pub fn init_file(path: &Path) -> Result<()> {
        std::fs::write(path, INIT_TEMPLATE).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply CLI overrides; later entries replace earlier ones by name
    pub fn merge(&mut self, overrides: &CliOverrides) {
        for (name, spec) in &overrides.helpers {
            self.helpers.insert(name.clone(), spec.clone());
        }
        for (name, spec) in &overrides.partials {
            self.partials.insert(name.clone(), spec.clone());
        }
        if let Some(runtime) = &overrides.runtime_module {
            self.runtime_module = runtime.clone();
        }
        if overrides.inline_source_map {
            self.inline_source_map = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, table) in [("helper", &self.helpers), ("partial", &self.partials)] {
            for (name, spec) in table {
                if name.trim().is_empty() {
                    return Err(ConfigError::EmptyName { kind });
                }
                if spec.trim().is_empty() {
                    return Err(ConfigError::EmptySpecifier {
                        kind,
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn extension_table(&self) -> ExtensionTable {
        ExtensionTable {
            helpers: self.helpers.clone(),
            partials: self.partials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PluginConfig::default();
        assert!(config.helpers.is_empty());
        assert_eq!(config.runtime_module, "handlebars/runtime");
        assert_eq!(config.extensions, vec!["hbs", "handlebars"]);
        assert!(!config.inline_source_map);
    }

    #[test]
    fn test_deserialize_yaml_keeps_order() {
        let yaml = r#"
helpers:
  upper: ./upper.js
  bold: ./bold.js
compileOptions:
  noEscape: true
"#;
        let config: PluginConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.helpers.keys().collect::<Vec<_>>(),
            vec!["upper", "bold"]
        );
        assert_eq!(config.compile_options["noEscape"], Value::Bool(true));
        assert_eq!(config.runtime_module, DEFAULT_RUNTIME_MODULE);
    }

    #[test]
    fn test_deserialize_json() {
        let json = r#"{ "partials": { "footer": "./footer" }, "inlineSourceMap": true }"#;
        let config: PluginConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.partials["footer"], "./footer");
        assert!(config.inline_source_map);
    }

    #[test]
    fn test_init_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        PluginConfig::init_file(&path).unwrap();
        let config = PluginConfig::from_file(&path).unwrap();
        assert_eq!(config, PluginConfig::default());
    }

    #[test]
    fn test_empty_specifier_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hbsconfig.yaml");
        std::fs::write(&path, "helpers:\n  bold: ''\n").unwrap();
        let err = PluginConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySpecifier { ref name, .. } if name == "bold"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut config = PluginConfig::default();
        config.helpers.insert("bold".into(), "./old".into());
        let overrides = CliOverrides {
            helpers: vec![("bold".into(), "./new".into()), ("upper".into(), "./upper".into())],
            partials: vec![],
            runtime_module: Some("handlebars/dist/handlebars.runtime".into()),
            inline_source_map: true,
        };
        config.merge(&overrides);
        assert_eq!(config.helpers["bold"], "./new");
        assert_eq!(config.helpers.len(), 2);
        assert_eq!(config.runtime_module, "handlebars/dist/handlebars.runtime");
        assert!(config.inline_source_map);
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            CliOverrides::parse_pair("helper", "bold=./bold.js").unwrap(),
            ("bold".to_string(), "./bold.js".to_string())
        );
        assert!(CliOverrides::parse_pair("helper", "bold").is_err());
        assert!(CliOverrides::parse_pair("helper", "=./x").is_err());
    }
}
