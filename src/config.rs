/*!
# Configuration (`onescript.toml`)

Optional project file read by the command line tools. Every key has a
default, so an empty or missing file is valid.

```toml
[parse]
max_skip_tokens = 4
insert_missing = true

[generate]
output = "onescript.lang"
json = "onescript.json"

[files]
extensions = ["os", "bsl"]
```
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::SOURCE_EXTENSIONS;
use crate::parser::ParseConfig;

/// Имя файла конфигурации по умолчанию
pub const CONFIG_FILE_NAME: &str = "onescript.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parse: ParseConfig,
    pub generate: GenerateConfig,
    pub files: FilesConfig,
}

/// Where `onescript generate` writes its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Binary language artifact.
    pub output: PathBuf,
    /// Optional JSON dump of the tables.
    pub json: Option<PathBuf>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("onescript.lang"),
            json: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Extensions of source files picked up from directories.
    pub extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extensions: SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read config from {}", path.as_ref().display())
        })?;
        toml::from_str(&content).with_context(|| {
            format!("Failed to parse TOML config from {}", path.as_ref().display())
        })
    }

    /// Loads `path` if given, otherwise `onescript.toml` from the working
    /// directory when it exists, otherwise the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default = Path::new(CONFIG_FILE_NAME);
                if default.is_file() {
                    Self::load_from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(&path, content).with_context(|| {
            format!("Failed to write config to {}", path.as_ref().display())
        })
    }

    /// Creates a configuration file with default values
    pub fn write_default<P: AsRef<Path>>(path: P, force: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() && !force {
            anyhow::bail!("{} already exists, use --force to overwrite", path.display());
        }
        let config = Self::default();
        config.save_to_file(path)?;
        Ok(config)
    }
}
