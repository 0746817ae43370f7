//! Per-run working copies.
//!
//! Every run clones into its own directory named after its run identity, so
//! concurrent runs against the same repository and branch never share
//! on-disk state. Nothing is pooled or reused.

use std::io;
use std::path::{Path, PathBuf};

use guardian_core::{GuardianError, Result, RunIdentity, VcsClient, Workspace};
use tracing::{debug, info, warn};

/// Allocates and releases isolated workspaces under a base directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory a run with `identity` clones into.
    pub fn path_for(&self, identity: &RunIdentity) -> PathBuf {
        self.base_dir.join(&identity.run_id)
    }

    /// Clone `repo_url` into a fresh directory owned by this run.
    ///
    /// A leftover directory with the same identity is removed first, including
    /// read-only files the VCS tool may have left behind.
    pub async fn acquire(
        &self,
        vcs: &dyn VcsClient,
        repo_url: &str,
        identity: &RunIdentity,
    ) -> Result<Workspace> {
        tokio::fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            GuardianError::Workspace(format!(
                "cannot create workspace base {}: {e}",
                self.base_dir.display()
            ))
        })?;

        let dest = self.path_for(identity);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            warn!(path = %dest.display(), "removing stale workspace");
            remove_forcibly(dest.clone()).await.map_err(|e| {
                GuardianError::Workspace(format!(
                    "cannot remove stale workspace {}: {e}",
                    dest.display()
                ))
            })?;
        }

        vcs.clone_repo(repo_url, &dest).await.map_err(|e| match e {
            GuardianError::Workspace(_) => e,
            other => GuardianError::Workspace(format!("clone of {repo_url} failed: {other}")),
        })?;

        info!(path = %dest.display(), "workspace acquired");
        Ok(Workspace::new(dest, identity.request.branch.clone()))
    }

    /// Delete a workspace directory.
    pub async fn release(&self, workspace: &Workspace) -> Result<()> {
        let root = workspace.root_path.clone();
        if !root.starts_with(&self.base_dir) {
            return Err(GuardianError::Workspace(format!(
                "refusing to remove {} outside {}",
                root.display(),
                self.base_dir.display()
            )));
        }
        remove_forcibly(root.clone())
            .await
            .map_err(|e| GuardianError::Workspace(format!("cannot remove {}: {e}", root.display())))?;
        debug!(path = %root.display(), "workspace released");
        Ok(())
    }
}

/// Remove a directory tree, clearing read-only permissions first.
pub async fn remove_forcibly(path: PathBuf) -> io::Result<()> {
    tokio::task::spawn_blocking(move || {
        make_writable(&path)?;
        std::fs::remove_dir_all(&path)
    })
    .await
    .map_err(io::Error::other)?
}

fn make_writable(path: &Path) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        std::fs::set_permissions(path, perms)?;
    }
    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::fakes::MemoryVcs;
    use guardian_core::{RepoRef, RunRequest};

    fn identity(number: u64) -> RunIdentity {
        RunIdentity::new(RunRequest {
            repository: RepoRef {
                clone_url: "mem://demo".to_string(),
                owner: "admin".to_string(),
                name: "demo".to_string(),
            },
            change_number: number,
            branch: "feature".to_string(),
        })
    }

    #[tokio::test]
    async fn test_acquire_is_isolated_per_run() {
        let base = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(base.path());
        let vcs = MemoryVcs::new([("app.py", "x = 1\n")]);

        let a = manager.acquire(&vcs, "mem://demo", &identity(1)).await.unwrap();
        let b = manager.acquire(&vcs, "mem://demo", &identity(1)).await.unwrap();

        assert_ne!(a.root_path, b.root_path);
        assert_eq!(a.branch_name, "feature");
        std::fs::write(a.root_path.join("app.py"), "x = 2\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(b.root_path.join("app.py")).unwrap(),
            "x = 1\n"
        );
    }

    #[tokio::test]
    async fn test_acquire_removes_stale_readonly_directory() {
        let base = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(base.path());
        let id = identity(7);

        let stale = manager.path_for(&id);
        std::fs::create_dir_all(stale.join(".git/objects")).unwrap();
        let locked = stale.join(".git/objects/pack.idx");
        std::fs::write(&locked, "old").unwrap();
        let mut perms = std::fs::metadata(&locked).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&locked, perms).unwrap();

        let vcs = MemoryVcs::new([("app.py", "fresh\n")]);
        let ws = manager.acquire(&vcs, "mem://demo", &id).await.unwrap();

        assert_eq!(ws.root_path, stale);
        assert!(!locked.exists());
        assert_eq!(std::fs::read_to_string(ws.root_path.join("app.py")).unwrap(), "fresh\n");
    }

    #[tokio::test]
    async fn test_clone_failure_is_workspace_error() {
        let base = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(base.path());
        let vcs = MemoryVcs::new(Vec::<(String, String)>::new()).with_clone_failure("auth denied");

        let err = manager.acquire(&vcs, "mem://demo", &identity(1)).await.unwrap_err();
        assert!(matches!(err, GuardianError::Workspace(ref m) if m.contains("auth denied")));
    }

    #[tokio::test]
    async fn test_release_removes_directory_and_refuses_outside_paths() {
        let base = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(base.path());
        let vcs = MemoryVcs::new([("app.py", "x\n")]);
        let ws = manager.acquire(&vcs, "mem://demo", &identity(3)).await.unwrap();

        manager.release(&ws).await.unwrap();
        assert!(!ws.root_path.exists());

        let outside = Workspace::new(PathBuf::from("/"), "main");
        assert!(manager.release(&outside).await.is_err());
    }
}
