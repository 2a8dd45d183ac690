//! core::paths
//!
//! Centralized path routing for ghr storage locations.
//!
//! # Storage Layout
//!
//! ghr keeps no repository state. Everything it writes lives under the user
//! cache directory:
//! - `run-log-<run id>-<unix start time>.zip` - downloaded workflow run logs
//!
//! Preserved pull request input goes to the system temp directory so it
//! survives a failed run without cluttering the cache.
//!
//! # Example
//!
//! ```
//! use ghr::core::paths::GhrPaths;
//! use std::path::PathBuf;
//!
//! let paths = GhrPaths::new(PathBuf::from("/home/me/.cache/ghr"));
//! assert_eq!(paths.cache_dir(), PathBuf::from("/home/me/.cache/ghr").as_path());
//! ```

use std::path::{Path, PathBuf};

/// Storage locations used by ghr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhrPaths {
    cache_dir: PathBuf,
}

impl GhrPaths {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Locations from the environment.
    ///
    /// `$GHR_CACHE_DIR` wins, then the platform cache directory, then the
    /// temp directory when no cache directory is known.
    pub fn from_env() -> Self {
        let cache_dir = std::env::var_os("GHR_CACHE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|d| d.join("ghr")))
            .unwrap_or_else(|| std::env::temp_dir().join("ghr-cache"));
        Self { cache_dir }
    }

    /// Root of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory holding cached run log archives.
    pub fn run_log_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Directory for preserved pull request input.
    pub fn preserve_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_is_root() {
        let paths = GhrPaths::new(PathBuf::from("/cache/ghr"));
        assert_eq!(paths.cache_dir(), Path::new("/cache/ghr"));
        assert_eq!(paths.run_log_cache_dir(), PathBuf::from("/cache/ghr"));
    }

    #[test]
    fn from_env_is_absolute_or_named() {
        let paths = GhrPaths::from_env();
        assert!(!paths.cache_dir().as_os_str().is_empty());
    }
}
