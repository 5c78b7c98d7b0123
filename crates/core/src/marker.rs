use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_MARKER_PATH: &str = "flags/indexing_done_16.flag";

#[derive(Debug, Clone)]
pub struct RunMarker {
    path: PathBuf,
}

impl RunMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> io::Result<bool> {
        fs::try_exists(&self.path).await
    }

    pub async fn mark(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, format!("{}\n", Utc::now().to_rfc3339())).await
    }
}

impl Default for RunMarker {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_PATH)
    }
}
