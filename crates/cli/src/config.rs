//! `oppnote.toml` configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use oppnote_core::NoteComposer;
use serde::Deserialize;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct OppnoteConfig {
    /// Remote service endpoints.
    #[serde(default)]
    pub crm: CrmConfig,
    /// Where the session is persisted.
    #[serde(default)]
    pub session: SessionConfig,
    /// How note text is rendered.
    #[serde(default)]
    pub note: NoteConfig,
}

/// Remote service endpoints.
#[derive(Debug, Deserialize)]
pub struct CrmConfig {
    /// Base URL of the CRM REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// GraphQL authentication endpoint.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl CrmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_url: default_auth_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_auth_url() -> String {
    "http://localhost:8080/graphql".to_owned()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Session persistence.
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Session file. Defaults to `<config dir>/oppnote/session.json`.
    pub path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_session_path)
    }
}

fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("oppnote")
        .join("session.json")
}

/// Note rendering.
#[derive(Debug, Deserialize)]
pub struct NoteConfig {
    /// IANA timezone used for the `Date:` line.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// `strftime` format for the `Date:` line.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl NoteConfig {
    /// Build the composer, rejecting unknown timezones and bad formats.
    pub fn composer(&self) -> anyhow::Result<NoteComposer> {
        let tz = NoteComposer::parse_timezone(&self.timezone)?;
        Ok(NoteComposer::new(tz, self.date_format.clone())?)
    }
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            date_format: default_date_format(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

fn default_date_format() -> String {
    oppnote_core::note::DEFAULT_DATE_FORMAT.to_owned()
}

impl OppnoteConfig {
    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(toml::from_str("")?);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Apply endpoint overrides from flags or environment.
    #[must_use]
    pub fn with_overrides(mut self, api_url: Option<&str>, auth_url: Option<&str>) -> Self {
        if let Some(url) = api_url {
            self.crm.api_base_url = url.to_owned();
        }
        if let Some(url) = auth_url {
            self.crm.auth_url = url.to_owned();
        }
        self
    }
}
