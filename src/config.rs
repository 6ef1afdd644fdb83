use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Env var naming the config file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "MIXTAPE_CONFIG";

/// Central configuration, loaded once at startup and passed by reference
/// into every component. No ambient globals.
///
/// Secrets may live in the file or come from the environment:
/// `MIXTAPE_ARL` and `MIXTAPE_JELLYFIN_API_KEY` override the file values,
/// so the file itself can stay free of credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub deezer: DeezerConfig,
    pub downloads: DownloadsConfig,
    pub jellyfin: JellyfinConfig,
    pub engine: EngineConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeezerConfig {
    /// The bot account's `arl` session cookie.
    pub bot_arl_cookie: String,
    /// Base for turning a notification's relative share path into an
    /// absolute URL the download engine can open.
    pub share_base_url: String,
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            bot_arl_cookie: String::new(),
            share_base_url: crate::deezer::client::DEFAULT_SHARE_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Root of the music library on disk, as the download engine sees it.
    pub music_download_path: String,
    /// Give each sender their own subdirectory under the root.
    pub per_user_directory: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JellyfinConfig {
    pub server_url: String,
    pub api_key: String,
    /// Trigger a library scan before resolving freshly downloaded paths.
    /// Off by default: the server's own filesystem watcher usually gets
    /// there first, and the scan call is asynchronous anyway, so a pass
    /// that races it still misses. Unresolved songs are picked up when the
    /// playlist is shared again.
    pub refresh_before_resolve: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// External downloader command. Must accept the share URL plus
    /// `--path`/`--quality`/`--duplicates` and print a JSON report on stdout.
    pub command: String,
    /// Preferred audio quality, passed through to the engine verbatim.
    pub audio_quality: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "deemix-bridge".to_string(),
            audio_quality: "lossless".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between download-pipeline polls.
    pub download_poll_secs: u64,
    /// Seconds between follower-reconciliation passes.
    pub friend_poll_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            download_poll_secs: 60,
            friend_poll_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from the given TOML file, or from the file named
    /// by `$MIXTAPE_CONFIG` when no path is passed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => env::var(CONFIG_ENV_VAR).map(PathBuf::from).map_err(|_| {
                anyhow::anyhow!("No config file given. Pass --config or set {CONFIG_ENV_VAR}.")
            })?,
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if let Ok(arl) = env::var("MIXTAPE_ARL") {
            config.deezer.bot_arl_cookie = arl;
        }
        if let Ok(key) = env::var("MIXTAPE_JELLYFIN_API_KEY") {
            config.jellyfin.api_key = key;
        }

        Ok(config)
    }

    /// Check that every key required before startup is present.
    /// Missing keys are fatal here, never during loop operation.
    pub fn validate(&self) -> Result<()> {
        self.require_deezer()?;
        self.require_downloads()?;
        self.require_jellyfin()
    }

    /// Check that the Deezer session cookie is configured.
    pub fn require_deezer(&self) -> Result<()> {
        if self.deezer.bot_arl_cookie.is_empty() {
            anyhow::bail!(
                "deezer.bot_arl_cookie not set. Add it to the config file or set MIXTAPE_ARL."
            );
        }
        Ok(())
    }

    /// Check that the download target is configured.
    pub fn require_downloads(&self) -> Result<()> {
        if self.downloads.music_download_path.is_empty() {
            anyhow::bail!("downloads.music_download_path not set.");
        }
        Ok(())
    }

    /// Check that the media-server connection is configured.
    pub fn require_jellyfin(&self) -> Result<()> {
        if self.jellyfin.server_url.is_empty() {
            anyhow::bail!("jellyfin.server_url not set.");
        }
        if self.jellyfin.api_key.is_empty() {
            anyhow::bail!(
                "jellyfin.api_key not set. Add it to the config file or set MIXTAPE_JELLYFIN_API_KEY."
            );
        }
        Ok(())
    }
}
