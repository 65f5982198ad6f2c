use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CardKind, FeedError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub viewport: ViewportConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Parses a TOML document. Missing fields fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|err| FeedError::Config {
            path: "<inline>".into(),
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|err| FeedError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let config: Self = toml::from_str(&source).map_err(|err| FeedError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects geometry the layout cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.viewport.height.is_finite() || self.viewport.height <= 0.0 {
            return Err(FeedError::InvalidInput("viewport height must be positive"));
        }
        let heights = [
            self.feed.text_height,
            self.feed.image_height,
            self.feed.video_height,
        ];
        if heights.iter().any(|height| !height.is_finite() || *height < 0.0) {
            return Err(FeedError::InvalidInput("card heights must be non-negative"));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| FeedError::msg(err.to_string()))
    }
}

/// Geometry of the scrolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewportConfig {
    pub height: f32,
    /// Cards kept realized beyond each viewport edge.
    pub overscan: usize,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            height: 800.0,
            overscan: 1,
        }
    }
}

/// Shape of the generated feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    pub initial_count: usize,
    pub page_size: usize,
    pub refresh_base_id: i64,
    /// Every Nth card is a video. Zero disables video cards.
    pub video_every: usize,
    /// Every Nth remaining card carries an image. Zero disables images.
    pub image_every: usize,
    pub text_height: f32,
    pub image_height: f32,
    pub video_height: f32,
    /// File holding the local feed snapshot. Unset disables caching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            initial_count: 20,
            page_size: 10,
            refresh_base_id: 1000,
            video_every: 3,
            image_every: 2,
            text_height: 180.0,
            image_height: 320.0,
            video_height: 420.0,
            cache_path: None,
        }
    }
}

impl FeedConfig {
    /// Nominal card height for `kind`.
    pub fn height_for(&self, kind: CardKind) -> f32 {
        match kind {
            CardKind::Text => self.text_height,
            CardKind::ImageText => self.image_height,
            CardKind::Video => self.video_height,
        }
    }
}
