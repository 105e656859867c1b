//! CLI configuration at `~/.picker/config.toml`.
//!
//! Describes which picker to launch, where tokens come from, and host
//! tunables. CLI flags always override config file values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use picker_core::launch::CONSUMER_BASE_URL;
use picker_core::options::{Localization, Search, Selection, SelectionMode, DEFAULT_SDK};
use picker_core::{LaunchConfig, PickerOptions};
use picker_host::{
    DispatcherSettings, HostSettings, HttpTokenProvider, StaticTokenProvider, TokenProvider,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub picker: PickerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Odsp,
    Consumer,
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "odsp" => Ok(Mode::Odsp),
            "consumer" => Ok(Mode::Consumer),
            other => bail!("unknown picker mode '{other}' (expected odsp or consumer)"),
        }
    }
}

/// Which picker to launch and with what options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default)]
    pub mode: Mode,

    /// SharePoint web URL (odsp mode only).
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_sdk")]
    pub sdk: String,

    #[serde(default = "default_selection_mode")]
    pub selection_mode: SelectionMode,

    #[serde(default = "default_true")]
    pub search: bool,

    #[serde(default)]
    pub language: Option<String>,

    /// Origin announced to the frame in `messaging.origin`.
    #[serde(default)]
    pub origin: Option<String>,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            base_url: String::new(),
            sdk: default_sdk(),
            selection_mode: default_selection_mode(),
            search: true,
            language: None,
            origin: None,
        }
    }
}

/// Token source: either a static table or a client-credentials endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// resource -> token
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,

    /// Token handed out for resources missing from `tokens`.
    #[serde(default)]
    pub fallback_token: Option<String>,

    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default = "default_token_timeout_secs")]
    pub token_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            token_timeout_secs: default_token_timeout_secs(),
        }
    }
}

fn default_sdk() -> String {
    DEFAULT_SDK.to_string()
}

fn default_selection_mode() -> SelectionMode {
    SelectionMode::Multiple
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    picker_host::events::DEFAULT_EVENT_CAPACITY
}

fn default_token_timeout_secs() -> u64 {
    picker_host::dispatcher::DEFAULT_TOKEN_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Resource the picker's tokens are requested for.
    pub fn resource(&self) -> &str {
        match self.picker.mode {
            Mode::Odsp => &self.picker.base_url,
            Mode::Consumer => CONSUMER_BASE_URL,
        }
    }

    pub fn launch_config(&self) -> Result<LaunchConfig> {
        let picker = &self.picker;
        let mut options = match picker.mode {
            Mode::Odsp => {
                let base_url = picker.base_url.trim_end_matches('/');
                if base_url.is_empty() {
                    bail!("base_url is required in odsp mode (set [picker].base_url or --base-url)");
                }
                PickerOptions::for_sharepoint_web(base_url, "")
            }
            Mode::Consumer => PickerOptions::default(),
        };

        options.sdk = picker.sdk.clone();
        options.messaging.channel_id = None;
        if picker.origin.is_some() {
            options.messaging.origin = picker.origin.clone();
        }
        options.selection = Some(Selection {
            mode: picker.selection_mode,
        });
        options.search = Some(Search {
            enabled: picker.search,
        });
        options.localization = picker
            .language
            .clone()
            .map(|language| Localization { language });

        Ok(match picker.mode {
            Mode::Odsp => LaunchConfig::Odsp {
                base_url: picker.base_url.trim_end_matches('/').to_string(),
                options,
            },
            Mode::Consumer => LaunchConfig::Consumer { options },
        })
    }

    pub fn token_provider(&self) -> Result<Arc<dyn TokenProvider>> {
        let auth = &self.auth;
        if let Some(endpoint) = &auth.token_endpoint {
            let (Some(id), Some(secret)) = (&auth.client_id, &auth.client_secret) else {
                bail!("[auth].token_endpoint needs client_id and client_secret");
            };
            debug!(endpoint = %endpoint, "using client-credentials token provider");
            return Ok(Arc::new(HttpTokenProvider::new(
                endpoint.clone(),
                id.clone(),
                secret.clone(),
            )));
        }

        let mut provider = StaticTokenProvider::from_pairs(auth.tokens.clone());
        if let Some(fallback) = &auth.fallback_token {
            provider = provider.with_fallback(fallback.clone());
        }
        debug!(entries = auth.tokens.len(), "using static token provider");
        Ok(Arc::new(provider))
    }

    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            event_capacity: self.host.event_capacity,
            dispatcher: DispatcherSettings {
                token_timeout: Duration::from_secs(self.host.token_timeout_secs),
            },
        }
    }
}

/// Default config location, `~/.picker/config.toml`.
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".picker").join("config.toml")
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().unwrap_or_default().join(rest),
        None => PathBuf::from(path),
    }
}
