use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

/// A fresh timestamped directory name for one job's debug artifacts.
/// The directory itself is created lazily on the first write.
pub fn job_dir(root: &Path) -> PathBuf {
    root.join(format!("job-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")))
}

/// Write a debug artifact without blocking or failing the caller. The write
/// happens on a detached task; failures are logged and never propagated.
pub fn save(dir: &Path, name: &str, content: impl Into<Vec<u8>>) {
    let dir = dir.to_path_buf();
    let path = dir.join(name);
    let bytes = content.into();
    tokio::spawn(async move {
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("failed to create artifact dir {}: {}", dir.display(), e);
            return;
        }
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!("failed to write debug artifact {}: {}", path.display(), e);
        }
    });
}
