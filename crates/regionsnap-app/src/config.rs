//! Application configuration.

use std::path::Path;

use peniko::Color;
use regionsnap_core::EngineConfig;
use regionsnap_render::OverlayPalette;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "REGIONSNAP_CONFIG";
/// Environment variable overriding the authority URL.
pub const AUTHORITY_URL_ENV: &str = "REGIONSNAP_AUTHORITY_URL";
/// Where the authority listens unless configured otherwise.
pub const DEFAULT_AUTHORITY_URL: &str = "ws://127.0.0.1:3030/overlay";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub authority_url: String,
    /// Shade color as RGBA bytes.
    pub dim_color: [u8; 4],
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "RegionSnap".to_string(),
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            dim_color: [0, 0, 0, 128],
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a JSON config. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from the environment: the file at `REGIONSNAP_CONFIG` if set,
    /// then the `REGIONSNAP_AUTHORITY_URL` override.
    pub fn load() -> AppResult<Self> {
        let path = std::env::var(CONFIG_ENV).ok();
        let url = std::env::var(AUTHORITY_URL_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new), url)
    }

    /// Load from an optional file and apply an optional URL override.
    pub fn load_from(path: Option<&Path>, authority_url: Option<String>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let json = std::fs::read_to_string(path)
                    .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
                Self::from_json(&json)?
            }
            None => Self::default(),
        };

        if let Some(url) = authority_url.filter(|u| !u.is_empty()) {
            config.authority_url = url;
        }
        Ok(config)
    }

    pub fn dim_color(&self) -> Color {
        let [r, g, b, a] = self.dim_color;
        Color::from_rgba8(r, g, b, a)
    }

    /// Overlay palette with the configured shade color.
    pub fn palette(&self) -> OverlayPalette {
        OverlayPalette::default().with_dim(self.dim_color())
    }
}
