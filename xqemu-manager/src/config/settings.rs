//! Read-only settings file loading.

use super::RawLaunchConfig;
use std::path::Path;
use xqemu_shared::errors::{XqemuError, XqemuResult};

/// Load the settings record from a JSON file.
///
/// A missing file yields the default record. Missing keys inside an existing
/// file fall back to their defaults as well.
pub fn load_settings(path: &Path) -> XqemuResult<RawLaunchConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "Settings file not found, using defaults");
        return Ok(RawLaunchConfig::default());
    }

    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents).map_err(|e| {
        XqemuError::Config(format!(
            "Failed to parse settings file {}: {}",
            path.display(),
            e
        ))
    })?;

    tracing::debug!(path = %path.display(), "Loaded settings");
    Ok(settings)
}
