//! Optional YAML configuration file.
//!
//! Every field is optional; command-line flags win over the file and the
//! file wins over the built-in defaults below.
//!
//! ```yaml
//! group: se
//! webroot: /standardebooks.org/web
//! weburl: https://standardebooks.org
//! scripts_dir: /standardebooks.org/web/scripts
//! work_dir: /standardebooks.org/tmp
//! catalog_user: www-data
//! cache_hook: /standardebooks.org/web/scripts/rebuild-cache
//! tools:
//!   convert: /usr/local/bin/convert
//! ```
//!
//! # API pattern
//!
//! - `load_at(home)`: reads `<home>/.deploy-ebook/config.yaml` if present
//! - `load_from(path)`: reads an explicit file, which must exist

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::layout;

pub const DEFAULT_GROUP: &str = "se";
pub const DEFAULT_WEBROOT: &str = "/standardebooks.org/web";
pub const DEFAULT_WEBURL: &str = "https://standardebooks.org";

/// Name of the cache hook looked up in the scripts directory.
pub const DEFAULT_CACHE_HOOK: &str = "rebuild-cache";
pub const OPDS_SCRIPT: &str = "generate-opds.php";
pub const RSS_SCRIPT: &str = "generate-rss.php";

/// Contents of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    pub group: Option<String>,
    pub webroot: Option<PathBuf>,
    pub weburl: Option<String>,
    /// Directory holding the cache hook and catalog scripts.
    pub scripts_dir: Option<PathBuf>,
    /// Parent directory for per-repository work directories.
    pub work_dir: Option<PathBuf>,
    /// Run catalog generators as this user (through `sudo -u`).
    pub catalog_user: Option<String>,
    /// Cache hook executable; defaults to `<scripts_dir>/rebuild-cache`.
    pub cache_hook: Option<PathBuf>,
    pub tools: ToolNames,
}

/// Program names (or absolute paths) of the external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolNames {
    pub git: String,
    pub se: String,
    pub convert: String,
    pub rsvg_convert: String,
    pub cavif: String,
    pub php: String,
    pub sudo: String,
    pub getent: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            se: "se".to_string(),
            convert: "convert".to_string(),
            rsvg_convert: "rsvg-convert".to_string(),
            cavif: "cavif".to_string(),
            php: "php".to_string(),
            sudo: "sudo".to_string(),
            getent: "getent".to_string(),
        }
    }
}

impl DeployConfig {
    pub fn group_or_default(&self) -> String {
        self.group.clone().unwrap_or_else(|| DEFAULT_GROUP.to_string())
    }

    pub fn webroot_or_default(&self) -> PathBuf {
        self.webroot
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WEBROOT))
    }

    pub fn weburl_or_default(&self) -> String {
        self.weburl
            .clone()
            .unwrap_or_else(|| DEFAULT_WEBURL.to_string())
    }

    /// Scripts directory, falling back to `fallback` (the binary's directory).
    pub fn scripts_dir_or(&self, fallback: &Path) -> PathBuf {
        self.scripts_dir
            .clone()
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    pub fn cache_hook_in(&self, scripts_dir: &Path) -> PathBuf {
        self.cache_hook
            .clone()
            .unwrap_or_else(|| scripts_dir.join(DEFAULT_CACHE_HOOK))
    }
}

/// Load `<home>/.deploy-ebook/config.yaml`, or defaults when it is absent.
pub fn load_at(home: &Path) -> Result<DeployConfig, ConfigError> {
    let path = layout::config_path(home);
    if !path.exists() {
        return Ok(DeployConfig::default());
    }
    load_from(&path)
}

/// Load an explicitly named config file.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<DeployConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(DeployConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
