use std::time::Duration;

use anyhow::{Context, Result};

use crate::render::color::ColorStrategy;
use crate::render::compose::PaginationMode;
use crate::render::font_metrics::FontFamily;
use crate::render::ExportSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means résumés live in process memory.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub export: ExportSettings,
    pub settle: Duration,
    pub export_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            export: export_settings_from(optional_env)?,
            settle: Duration::from_millis(
                optional_env("EXPORT_SETTLE_MS")
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("EXPORT_SETTLE_MS must be a whole number of milliseconds")?
                    .unwrap_or(16),
            ),
            export_timeout: Duration::from_millis(
                optional_env("EXPORT_TIMEOUT_MS")
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("EXPORT_TIMEOUT_MS must be a whole number of milliseconds")?
                    .unwrap_or(30_000),
            ),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Reads the `EXPORT_*` settings through `lookup`, falling back to the defaults.
pub fn export_settings_from(lookup: impl Fn(&str) -> Option<String>) -> Result<ExportSettings> {
    let defaults = ExportSettings::default();

    let device_scale = match lookup("EXPORT_DEVICE_SCALE") {
        Some(v) => v
            .trim()
            .parse::<f32>()
            .with_context(|| format!("EXPORT_DEVICE_SCALE must be a number, got '{v}'"))?,
        None => defaults.device_scale,
    };
    let color_strategy = match lookup("EXPORT_COLOR_STRATEGY") {
        Some(v) => ColorStrategy::parse(&v)
            .with_context(|| format!("EXPORT_COLOR_STRATEGY must be 'normalize' or 'native', got '{v}'"))?,
        None => defaults.color_strategy,
    };
    let pagination = match lookup("EXPORT_PAGINATION") {
        Some(v) => PaginationMode::parse(&v)
            .with_context(|| format!("EXPORT_PAGINATION must be 'slice' or 'tile', got '{v}'"))?,
        None => defaults.pagination,
    };
    let text_layer = match lookup("EXPORT_TEXT_LAYER") {
        Some(v) => v
            .trim()
            .parse::<bool>()
            .with_context(|| format!("EXPORT_TEXT_LAYER must be 'true' or 'false', got '{v}'"))?,
        None => defaults.text_layer,
    };
    let font = match lookup("EXPORT_FONT") {
        Some(v) => FontFamily::parse(&v)
            .with_context(|| format!("EXPORT_FONT must be 'sans' or 'serif', got '{v}'"))?,
        None => defaults.font,
    };

    Ok(ExportSettings {
        device_scale,
        color_strategy,
        pagination,
        text_layer,
        font,
    })
}
