use std::path::{Path, PathBuf};
use std::time::Duration;

use follow_content::DEFAULT_API_URL;
use follow_types::DEFAULT_CONTENT_ID_LEN;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

pub const ENV_API_URL: &str = "FOLLOW_API_URL";
pub const ENV_STORAGE_DIR: &str = "FOLLOW_STORAGE_DIR";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// RPC address of the local content node.
    pub api_url: String,
    /// Directory of the local store.
    pub storage_dir: PathBuf,
    pub request_timeout_ms: u64,
    pub publish_lifetime_hours: u64,
    /// Required length of uploaded post content ids.
    pub content_id_len: usize,
    pub refresh_interval_secs: u64,
    pub republish_interval_secs: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_dir: PathBuf::from("Follow Storage"),
            request_timeout_ms: 10_000,
            publish_lifetime_hours: 8760,
            content_id_len: DEFAULT_CONTENT_ID_LEN,
            refresh_interval_secs: 60,
            republish_interval_secs: 3600,
        }
    }
}

impl FollowConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Read a TOML file. Keys it omits keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Apply `FOLLOW_API_URL` and `FOLLOW_STORAGE_DIR` from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|v| !v.is_empty()) {
            self.storage_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn publish_lifetime(&self) -> Duration {
        Duration::from_secs(self.publish_lifetime_hours.saturating_mul(3600))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn republish_interval(&self) -> Duration {
        Duration::from_secs(self.republish_interval_secs)
    }
}
