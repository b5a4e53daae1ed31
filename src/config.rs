//! On-disk configuration and the remembered-login state file.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which passage source variant feeds the session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    /// Random quote from a remote API
    Remote,
    /// Random words from the embedded word list
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub source: SourceKind,
    pub number_of_words: usize,
    pub quote_url: String,
    pub no_auth: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::Remote,
            number_of_words: 15,
            quote_url: crate::passage::DEFAULT_QUOTE_URL.to_string(),
            no_auth: false,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "keyflow") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("keyflow_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

/// The "currently logged in user" persisted across restarts under a fixed
/// well-known key, so a returning user skips the login form.
#[derive(Debug, Serialize, Deserialize)]
struct RememberedLogin {
    user: String,
}

#[derive(Debug, Clone)]
pub struct LoginFile {
    path: PathBuf,
}

impl LoginFile {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "keyflow") {
            pd.config_dir().join("login.json")
        } else {
            PathBuf::from("keyflow_login.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn remember(&self, username: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&RememberedLogin {
            user: username.to_string(),
        })
        .unwrap_or_default();
        fs::write(&self.path, data)
    }

    pub fn remembered(&self) -> Option<String> {
        let bytes = fs::read(&self.path).ok()?;
        let login: RememberedLogin = serde_json::from_slice(&bytes).ok()?;
        if login.user.is_empty() {
            None
        } else {
            Some(login.user)
        }
    }

    pub fn forget(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
