use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::pagination::DEFAULT_PAGE_SIZE;

pub const API_URL_ENV: &str = "BIZSKILL_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub feed_page_size: u32,
    /// Lookahead fires once the cursor is this close to the end of the list.
    pub lookahead_threshold: usize,
    /// Cards kept mounted on each side of the active one.
    pub retain_radius: usize,
    pub start_muted: bool,
    pub wheel_threshold: f64,
    pub wheel_cooldown_ms: u64,
    pub swipe_threshold: f64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            request_timeout_secs: 30,
            feed_page_size: DEFAULT_PAGE_SIZE,
            lookahead_threshold: 3,
            retain_radius: 1,
            start_muted: true,
            wheel_threshold: 50.0,
            wheel_cooldown_ms: 500,
            swipe_threshold: 50.0,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn wheel_cooldown(&self) -> Duration {
        Duration::from_millis(self.wheel_cooldown_ms)
    }
}

fn env_api_url() -> Option<String> {
    let url = std::env::var(API_URL_ENV).ok()?;
    let url = url.trim();
    if url.is_empty() {
        warn!("{API_URL_ENV} is set but empty, ignoring it");
        return None;
    }
    info!("Using API base URL from {API_URL_ENV}: {url}");
    Some(url.to_string())
}

/// Settings as stored in `settings.json`. The base URL override from the
/// environment applies to what [`SettingsStore::client`] returns and never
/// reaches the file.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClientSettings>,
    api_url_override: Option<String>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::open(path, env_api_url())
    }

    pub fn open(path: PathBuf, api_url_override: Option<String>) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                ClientSettings::default()
            })
        } else {
            ClientSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            api_url_override,
        })
    }

    pub fn client(&self) -> ClientSettings {
        let mut settings = match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(url) = &self.api_url_override {
            settings.api_base_url = url.clone();
        }
        settings
    }

    /// Stores `settings`. While the override is active, a base URL equal to
    /// it is taken as unchanged and the stored one is kept.
    pub fn update(&self, mut settings: ClientSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.api_url_override.as_deref() == Some(settings.api_base_url.as_str()) {
            settings.api_base_url = guard.api_base_url.clone();
        }
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &ClientSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
