//! Partial Loader
//!
//! Resolves partials from `.prompt` files on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BoxError;
use crate::resolve::PartialResolver;

/// Extension of prompt and partial files
pub const PROMPT_EXTENSION: &str = "prompt";

/// Looks partials up across a list of directories
#[derive(Debug, Clone, Default)]
pub struct PartialLoader {
    dirs: Vec<PathBuf>,
}

impl PartialLoader {
    /// Create a loader over `dirs`; earlier directories win
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().map(|d| d.as_ref().to_path_buf()).collect();
        debug!(?dirs, "PartialLoader::new: called");
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Load partial `name`.
    ///
    /// Checks in order, for each directory:
    /// 1. `_{name}.prompt`
    /// 2. `{name}.prompt`
    pub fn load(&self, name: &str) -> std::io::Result<Option<String>> {
        debug!(%name, "PartialLoader::load: called");
        for dir in &self.dirs {
            for file_name in [
                format!("_{}.{}", name, PROMPT_EXTENSION),
                format!("{}.{}", name, PROMPT_EXTENSION),
            ] {
                let path = dir.join(file_name);
                if path.is_file() {
                    debug!(?path, "PartialLoader::load: found");
                    return std::fs::read_to_string(&path).map(Some);
                }
                debug!(?path, "PartialLoader::load: not found");
            }
        }

        debug!(%name, "PartialLoader::load: not found anywhere");
        Ok(None)
    }
}

impl PartialResolver for PartialLoader {
    fn resolve_partial(&self, name: &str) -> Result<Option<String>, BoxError> {
        Ok(self.load(name)?)
    }
}
