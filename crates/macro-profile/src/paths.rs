//! Where profiles and the stratagem catalogue live on disk.

use crate::defaults::{DEFAULT_TEMPLATE_FILE, LAST_PROFILE_FILE, SAVES_DIR_NAME};
use crate::error::Result;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-disk locations, all relative to one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The directory next to the executable, or the current directory when
    /// started through cargo.
    pub fn discover() -> Self {
        let cwd = || env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if env::var_os("CARGO").is_some() {
            return Self::new(cwd());
        }
        let base = env::current_exe()
            .ok()
            .and_then(|exe| exe.canonicalize().ok())
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(cwd);
        Self::new(base)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The saves directory, created if needed.
    pub fn saves_dir(&self) -> Result<PathBuf> {
        let dir = self.base.join(SAVES_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn template_file(&self) -> PathBuf {
        self.base.join(DEFAULT_TEMPLATE_FILE)
    }

    fn marker(&self) -> PathBuf {
        self.base.join(SAVES_DIR_NAME).join(LAST_PROFILE_FILE)
    }

    /// The profile used last time, if the marker names one that still exists.
    pub fn last_profile(&self) -> Option<PathBuf> {
        let text = fs::read_to_string(self.marker()).ok()?;
        let path = PathBuf::from(text.trim());
        if path.as_os_str().is_empty() || !path.exists() {
            debug!("last profile marker is stale");
            return None;
        }
        Some(path)
    }

    /// Remember `profile` as the one to open next time.
    pub fn record_last_profile(&self, profile: &Path) -> Result<()> {
        self.saves_dir()?;
        fs::write(self.marker(), profile.to_string_lossy().as_bytes())?;
        Ok(())
    }

    /// Forget the last profile, e.g. after loading a blank one.
    pub fn clear_last_profile(&self) {
        let marker = self.marker();
        if marker.exists()
            && let Err(e) = fs::remove_file(&marker)
        {
            warn!("cannot remove {}: {e}", marker.display());
        }
    }
}
