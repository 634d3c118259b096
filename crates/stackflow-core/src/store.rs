//! Project state persistence
//!
//! Manages the `.stackflow/project.json` file holding the whole entity tree.

use crate::error::{CoreError, Result};
use crate::model::Project;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const STATE_VERSION: u32 = 1;
pub const STATE_DIR: &str = ".stackflow";
const STATE_FILE: &str = "project.json";
const STATE_BACKUP: &str = "project.json.backup";
const LOCK_FILE: &str = "lock.json";

/// On-disk envelope around the project
#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    updated_at: DateTime<Utc>,
    project: Project,
}

/// Reads and writes the project file of one working directory
pub struct ProjectStore {
    project_root: PathBuf,
}

impl ProjectStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the project, `None` when no project has been initialized here
    pub async fn load(&self) -> Result<Option<Project>> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("Project file not found at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let file: ProjectFile = serde_json::from_str(&content)?;

        if file.version > STATE_VERSION {
            return Err(CoreError::State(format!(
                "Project file version {} is newer than supported version {}",
                file.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            project = %file.project.name(),
            stages = file.project.stage_names().len(),
            "Loaded project"
        );
        Ok(Some(file.project))
    }

    /// Save the project, keeping the previous file as a backup
    pub async fn save(&self, project: &Project) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let file = ProjectFile {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            project: project.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(&path, content).await?;

        tracing::debug!(project = %project.name(), "Saved project");
        Ok(())
    }

    /// Delete the project file; the backup is kept
    pub async fn remove(&self) -> Result<()> {
        let path = self.state_path();
        if path.exists() {
            let backup = self.backup_path();
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Removed project file");
        }
        Ok(())
    }

    /// Take the project lock for the duration of one action
    ///
    /// The lock file is created with `create_new`, so of two concurrent
    /// callers exactly one wins. A lock older than [`STALE_LOCK_AGE`] is
    /// taken over.
    pub async fn acquire_lock(&self) -> Result<ProjectLock> {
        self.ensure_state_dir().await?;
        let path = self.lock_path();
        let owner = LockOwner::current();

        if !create_lock_file(&path, &owner).await? {
            let Some(stale) = read_owner(&path).await else {
                return Err(CoreError::Lock(
                    "Project lock is being taken by another process".to_string(),
                ));
            };
            if !stale.is_stale() {
                return Err(CoreError::Lock(format!(
                    "Project is locked by {} (pid {}) since {}",
                    stale.holder, stale.pid, stale.since
                )));
            }
            self.take_over(&path, &stale, &owner).await?;
        }

        tracing::debug!(token = %owner.token, "Acquired project lock");
        Ok(ProjectLock {
            path,
            token: owner.token,
            released: false,
        })
    }

    /// Move a stale lock aside and create ours in its place
    ///
    /// The rename moves whatever `lock.json` holds at that moment. If that is
    /// no longer the stale owner, another process took over first and the
    /// file is put back.
    async fn take_over(&self, path: &Path, stale: &LockOwner, owner: &LockOwner) -> Result<()> {
        let aside = self.state_dir().join(format!("{LOCK_FILE}.{}", owner.token));
        match fs::rename(path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if aside.exists() {
            let moved = read_owner(&aside).await;
            if moved.as_ref().is_some_and(|m| m.token != stale.token) {
                // hard_link fails if someone already recreated the lock
                let _ = fs::hard_link(&aside, path).await;
                let _ = fs::remove_file(&aside).await;
                return Err(CoreError::Lock(
                    "Stale project lock was taken over by another process".to_string(),
                ));
            }
            fs::remove_file(&aside).await?;
        }

        if !create_lock_file(path, owner).await? {
            return Err(CoreError::Lock(
                "Stale project lock was taken over by another process".to_string(),
            ));
        }
        tracing::warn!(
            holder = %stale.holder,
            since = %stale.since,
            "Replaced stale project lock"
        );
        Ok(())
    }
}

/// Locks older than this are assumed abandoned
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(60 * 60);

/// Contents of `lock.json`
#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    holder: String,
    pid: u32,
    token: String,
    since: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            token: Uuid::new_v4().to_string(),
            since: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now()
            .signed_duration_since(self.since)
            .to_std()
            .is_ok_and(|age| age >= STALE_LOCK_AGE)
    }
}

/// Create the lock file only if none exists; `false` when one does
async fn create_lock_file(path: &Path, owner: &LockOwner) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(&serde_json::to_vec_pretty(owner)?).await?;
    file.sync_all().await?;
    Ok(true)
}

/// Owner recorded in a lock file; `None` while the file is absent or
/// still being written
async fn read_owner(path: &Path) -> Option<LockOwner> {
    let content = fs::read(path).await.ok()?;
    serde_json::from_slice(&content).ok()
}

/// Held project lock, released on drop
///
/// Only removes the lock file while it still carries this holder's token.
pub struct ProjectLock {
    path: PathBuf,
    token: String,
    released: bool,
}

impl ProjectLock {
    fn owns_file(&self) -> bool {
        std::fs::read(&self.path)
            .ok()
            .and_then(|content| serde_json::from_slice::<LockOwner>(&content).ok())
            .is_some_and(|owner| owner.token == self.token)
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        if self.owns_file() {
            fs::remove_file(&self.path).await?;
            tracing::debug!("Released project lock");
        } else {
            tracing::warn!("Project lock was replaced while held; leaving it");
        }
        Ok(())
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if !self.released && self.owns_file() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::keys;
    use tempfile::tempdir;

    fn sample_project() -> Project {
        let mut project = Project::new("sample", "sample.com", "us-east-1").unwrap();
        project.create_stage("dev").unwrap();
        project
            .create_region("dev", "us-east-1")
            .unwrap()
            .variables_mut()
            .set(keys::RESOURCES_STACK_NAME, "sample-dev-r");
        project
    }

    #[tokio::test]
    async fn test_project_save_load() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());
        let project = sample_project();

        store.save(&project).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded, project);
    }

    #[tokio::test]
    async fn test_missing_project() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_keeps_backup_and_remove() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());
        let project = sample_project();

        store.save(&project).await.unwrap();
        store.save(&project).await.unwrap();
        assert!(store.backup_path().exists());

        store.remove().await.unwrap();
        assert!(!store.state_path().exists());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());
        store.save(&sample_project()).await.unwrap();

        let content = std::fs::read_to_string(store.state_path()).unwrap();
        let mut raw: serde_json::Value = serde_json::from_str(&content).unwrap();
        raw["version"] = serde_json::json!(STATE_VERSION + 1);
        std::fs::write(store.state_path(), raw.to_string()).unwrap();

        assert!(matches!(store.load().await, Err(CoreError::State(_))));
    }

    fn write_lock(store: &ProjectStore, token: &str, age: chrono::Duration) {
        std::fs::create_dir_all(store.state_dir()).unwrap();
        let owner = LockOwner {
            holder: "other-host".to_string(),
            pid: 1,
            token: token.to_string(),
            since: Utc::now() - age,
        };
        std::fs::write(store.lock_path(), serde_json::to_vec(&owner).unwrap()).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_one_winner() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().to_path_buf();

        for _ in 0..50 {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let root = root.clone();
                    tokio::spawn(async move { ProjectStore::new(root).acquire_lock().await })
                })
                .collect();

            let mut held = Vec::new();
            for handle in handles {
                if let Ok(lock) = handle.await.unwrap() {
                    held.push(lock);
                }
            }
            assert_eq!(held.len(), 1);
            for lock in held {
                lock.release().await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());
        write_lock(&store, "abandoned", chrono::Duration::hours(2));

        let lock = store.acquire_lock().await.unwrap();
        let owner = read_owner(&store.lock_path()).await.unwrap();
        assert_ne!(owner.token, "abandoned");
        assert_eq!(owner.pid, std::process::id());

        lock.release().await.unwrap();
        assert!(!store.lock_path().exists());
        let leftovers = std::fs::read_dir(store.state_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_fresh_foreign_lock_is_respected() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());
        write_lock(&store, "busy", chrono::Duration::minutes(5));

        let err = store.acquire_lock().await.err().unwrap();
        assert!(err.to_string().contains("other-host"));
        assert_eq!(read_owner(&store.lock_path()).await.unwrap().token, "busy");
    }

    #[tokio::test]
    async fn test_release_leaves_replaced_lock() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());

        let lock = store.acquire_lock().await.unwrap();
        write_lock(&store, "successor", chrono::Duration::zero());
        lock.release().await.unwrap();

        assert_eq!(read_owner(&store.lock_path()).await.unwrap().token, "successor");
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let store = ProjectStore::new(temp_dir.path());

        let lock = store.acquire_lock().await.unwrap();
        assert!(matches!(
            store.acquire_lock().await,
            Err(CoreError::Lock(_))
        ));

        lock.release().await.unwrap();
        let again = store.acquire_lock().await.unwrap();
        drop(again);
        assert!(!store.lock_path().exists());
    }
}
