//! Launch configuration.
//!
//! `RawLaunchConfig` is what the front end hands over (the settings record);
//! `LaunchConfig` is the validated, immutable snapshot a single `start()`
//! works from.

mod settings;

pub use settings::load_settings;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xqemu_shared::errors::{XqemuError, XqemuResult};

/// Unvalidated settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLaunchConfig {
    pub xqemu_path: PathBuf,
    pub mcpx_path: PathBuf,
    pub flash_path: PathBuf,
    pub hdd_path: PathBuf,
    pub hdd_locked: bool,
    pub dvd_present: bool,
    pub dvd_path: PathBuf,
    pub short_anim: bool,
}

impl Default for RawLaunchConfig {
    fn default() -> Self {
        Self {
            xqemu_path: PathBuf::from("/path/to/xqemu"),
            mcpx_path: PathBuf::from("/path/to/mcpx.bin"),
            flash_path: PathBuf::from("/path/to/flash.bin"),
            hdd_path: PathBuf::from("/path/to/hdd.img"),
            hdd_locked: true,
            dvd_present: true,
            dvd_path: PathBuf::from("/path/to/disc.iso"),
            short_anim: false,
        }
    }
}

impl RawLaunchConfig {
    /// Check every active path and produce a `LaunchConfig`.
    ///
    /// Fields are checked in declaration order and the first failure wins.
    /// `dvd_path` is only active when `dvd_present` is set.
    pub fn validate(&self) -> XqemuResult<LaunchConfig> {
        check_path("xqemu_path", &self.xqemu_path)?;
        check_path("mcpx_path", &self.mcpx_path)?;
        check_path("flash_path", &self.flash_path)?;
        check_path("hdd_path", &self.hdd_path)?;

        let dvd_path = if self.dvd_present {
            check_path("dvd_path", &self.dvd_path)?;
            Some(self.dvd_path.clone())
        } else {
            None
        };

        tracing::debug!(
            xqemu = %self.xqemu_path.display(),
            dvd_present = self.dvd_present,
            "Launch configuration validated"
        );

        Ok(LaunchConfig {
            xqemu_path: self.xqemu_path.clone(),
            mcpx_path: self.mcpx_path.clone(),
            flash_path: self.flash_path.clone(),
            hdd_path: self.hdd_path.clone(),
            hdd_locked: self.hdd_locked,
            dvd_path,
            short_anim: self.short_anim,
        })
    }
}

fn check_path(field: &'static str, path: &Path) -> XqemuResult<()> {
    if !path.exists() || path.is_dir() {
        return Err(XqemuError::Validation {
            field,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Validated launch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    xqemu_path: PathBuf,
    mcpx_path: PathBuf,
    flash_path: PathBuf,
    hdd_path: PathBuf,
    hdd_locked: bool,
    dvd_path: Option<PathBuf>,
    short_anim: bool,
}

impl LaunchConfig {
    pub fn xqemu_path(&self) -> &Path {
        &self.xqemu_path
    }

    pub fn mcpx_path(&self) -> &Path {
        &self.mcpx_path
    }

    pub fn flash_path(&self) -> &Path {
        &self.flash_path
    }

    pub fn hdd_path(&self) -> &Path {
        &self.hdd_path
    }

    pub fn hdd_locked(&self) -> bool {
        self.hdd_locked
    }

    /// Disc image, present only when a disc is inserted.
    pub fn dvd_path(&self) -> Option<&Path> {
        self.dvd_path.as_deref()
    }

    pub fn short_anim(&self) -> bool {
        self.short_anim
    }
}
