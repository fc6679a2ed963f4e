//! Per-job scratch directories.
//!
//! Every request gets its own directory under the configured work root.
//! The directory is removed when the [`JobWorkspace`] is dropped, on every
//! exit path including panics and client disconnects.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use overlay_models::JobId;

use crate::error::MediaResult;

/// Prefix shared by every job directory; used by the startup sweep.
pub const WORKSPACE_PREFIX: &str = "job-";

/// Scratch directory owned by one job.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: Option<TempDir>,
    job_id: JobId,
}

impl JobWorkspace {
    /// Create a fresh workspace under `root`, creating `root` when missing.
    pub fn create(root: impl AsRef<Path>, job_id: &JobId) -> MediaResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", WORKSPACE_PREFIX, job_id))
            .tempdir_in(root)?;

        debug!(job_id = %job_id, path = %dir.path().display(), "Created job workspace");

        Ok(Self {
            dir: Some(dir),
            job_id: job_id.clone(),
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Where the upload is streamed to. `extension` comes from the client filename.
    pub fn source_path(&self, extension: Option<&str>) -> PathBuf {
        let ext = extension
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4");
        self.path().join(format!("source.{}", ext.to_ascii_lowercase()))
    }

    pub fn overlay_path(&self) -> PathBuf {
        self.path().join("overlay.png")
    }

    pub fn output_path(&self) -> PathBuf {
        self.path().join("output.mp4")
    }

    /// Remove the directory now, reporting failure instead of logging it.
    pub fn close(mut self) -> MediaResult<()> {
        match self.dir.take() {
            Some(dir) => Ok(dir.close()?),
            None => Ok(()),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(job_id = %self.job_id, path = %path.display(), "Failed to remove job workspace: {}", e);
            }
        }
    }
}

/// Remove job directories left behind by a previous process.
///
/// Returns the number of directories removed. A missing root is not an error.
pub fn sweep_stale_workspaces(root: impl AsRef<Path>) -> MediaResult<usize> {
    let root = root.as_ref();
    if !root.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let is_job_dir = name.to_string_lossy().starts_with(WORKSPACE_PREFIX)
            && entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_job_dir {
            continue;
        }

        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), "Failed to remove stale workspace: {}", e),
        }
    }

    if removed > 0 {
        info!(root = %root.display(), removed, "Swept stale job workspaces");
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::new()).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.source_path(Some("mov")), b"data").unwrap();
        assert!(path.exists());

        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_source_extension_is_sanitised() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), &JobId::new()).unwrap();

        assert!(ws.source_path(Some("MOV")).ends_with("source.mov"));
        assert!(ws.source_path(Some("../x")).ends_with("source.mp4"));
        assert!(ws.source_path(None).ends_with("source.mp4"));
    }

    #[test]
    fn test_sweep_only_touches_job_dirs() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("job-stale-1")).unwrap();
        std::fs::create_dir(root.path().join("keep-me")).unwrap();
        std::fs::write(root.path().join("job-file.txt"), b"x").unwrap();

        assert_eq!(sweep_stale_workspaces(root.path()).unwrap(), 1);
        assert!(root.path().join("keep-me").exists());
        assert!(root.path().join("job-file.txt").exists());
        assert!(!root.path().join("job-stale-1").exists());
    }

    #[test]
    fn test_sweep_missing_root() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(sweep_stale_workspaces(root.path().join("absent")).unwrap(), 0);
    }
}
