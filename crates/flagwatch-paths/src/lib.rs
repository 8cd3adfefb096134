use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("home directory not found, set $HOME environment variable")]
    HomeNotFound,
}

/// Centralized path construction for the `~/.flagwatch/` directory layout.
///
/// Single source of truth for every path under `~/.flagwatch/`. Use `resolve()`
/// in production code and `from_dir()` in tests.
#[derive(Debug, Clone)]
pub struct FlagwatchPaths {
    base_dir: PathBuf,
}

impl FlagwatchPaths {
    /// Resolve paths from the user's home directory (`~/.flagwatch`).
    pub fn resolve() -> Result<Self, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeNotFound)?;
        Ok(Self {
            base_dir: home.join(".flagwatch"),
        })
    }

    /// Create paths from an explicit base directory. Use in tests.
    pub fn from_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// The base `~/.flagwatch` directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn watermarks_dir(&self) -> PathBuf {
        self.base_dir.join("watermarks")
    }

    pub fn user_config(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    // --- Static helpers (no self) ---

    /// Project-level config: `<project_root>/.flagwatch/config.toml`.
    pub fn project_config(project_root: &Path) -> PathBuf {
        project_root.join(".flagwatch").join("config.toml")
    }
}
