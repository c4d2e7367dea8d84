mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./convertforge.toml",
        "./config.toml",
        "~/.config/convertforge/config.toml",
        "/etc/convertforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if !(1..=100).contains(&config.conversion.quality) {
        anyhow::bail!(
            "Conversion quality must be between 1 and 100, got {}",
            config.conversion.quality
        );
    }

    if config.conversion.workers == 0 {
        anyhow::bail!("Conversion workers cannot be 0");
    }

    if config.conversion.sample_rate == Some(0) {
        anyhow::bail!("Sample rate cannot be 0");
    }

    if config.document.margin_pt.is_nan() || config.document.margin_pt < 0.0 {
        anyhow::bail!("Document margin cannot be negative");
    }

    if let Some(path) = &config.transcode.ffmpeg_path {
        if !path.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    if config.usage.remote_enabled {
        match config.usage.remote_url.as_deref() {
            None | Some("") => {
                anyhow::bail!("Remote usage tracking is enabled but has no remote_url")
            }
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                anyhow::bail!("Remote usage URL must be http(s): {}", url)
            }
            Some(_) => {}
        }
    }

    Ok(())
}
