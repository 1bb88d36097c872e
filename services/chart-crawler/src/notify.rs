//!
//! src/notify.rs  Andrew Belles  Oct 5th, 2025
//!
//! Best-effort side upload of the data file once a cycle has persisted.
//! Failures are logged and swallowed; the next cycle tries again.
//!

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::CrawlerError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, data_file: &Path, updated_at: &str) -> Result<(), CrawlerError>;
}

#[derive(Debug, Clone)]
pub struct GitPushNotifier {
    repo_dir: PathBuf,
    remote: String,
    branch: String
}

enum GitOutcome {
    Done,
    NothingToCommit
}

impl GitPushNotifier {
    pub fn new(cfg: &SyncConfig) -> Self {
        Self {
            repo_dir: cfg.repo_dir.clone(),
            remote: cfg.remote.clone(),
            branch: cfg.branch.clone()
        }
    }

    async fn git(&self, args: &[&str]) -> Result<GitOutcome, CrawlerError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(GitOutcome::Done);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if args.first() == Some(&"commit") && stdout.contains("nothing to commit") {
            return Ok(GitOutcome::NothingToCommit);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CrawlerError::Io(std::io::Error::other(
            format!("git {} exited {}: {}", args.join(" "), output.status, stderr.trim())
        )))
    }
}

/// git runs inside repo_dir, so a cwd-relative data path has to be pinned first
fn resolve_data_file(data_file: &Path) -> Result<PathBuf, CrawlerError> {
    Ok(std::path::absolute(data_file)?)
}

#[async_trait]
impl Notifier for GitPushNotifier {
    async fn notify(&self, data_file: &Path, updated_at: &str) -> Result<(), CrawlerError> {
        let data_file = resolve_data_file(data_file)?;
        let file = data_file.to_string_lossy();
        let message = format!("update songs data {updated_at}");

        self.git(&["add", &*file]).await?;
        if let GitOutcome::NothingToCommit = self.git(&["commit", "-m", message.as_str()]).await? {
            debug!("sync.git.unchanged");
            return Ok(());
        }
        self.git(&["push", self.remote.as_str(), self.branch.as_str()]).await?;
        info!(remote = %self.remote, branch = %self.branch, "sync.git.pushed");
        Ok(())
    }
}

/// Detach the upload so the cycle never waits on it
pub fn spawn_notify(notifier: std::sync::Arc<dyn Notifier>, data_file: PathBuf, updated_at: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&data_file, &updated_at).await {
            warn!(error = %e, "sync.failed");
        }
    });
}
