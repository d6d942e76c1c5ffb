//! Publishing the snapshot and reading the published copy back.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::process::{combined_output, run_tool};
use crate::roster::Roster;
use crate::snapshot::Snapshot;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, snapshot: &Snapshot) -> SchoolCalResult<()>;

    /// Publish over whatever the published copy currently holds. Used to
    /// repair a published copy that was overwritten from elsewhere.
    async fn republish(&self, snapshot: &Snapshot) -> SchoolCalResult<()> {
        self.publish(snapshot).await
    }

    /// The copy consumers currently see.
    async fn fetch_current(&self) -> SchoolCalResult<Snapshot>;
}

/// Validate, then publish. Nothing reaches the publisher unvalidated.
pub async fn publish_validated(
    publisher: &dyn Publisher,
    snapshot: &Snapshot,
    roster: &Roster,
) -> SchoolCalResult<()> {
    snapshot.validate(roster)?;
    publisher.publish(snapshot).await
}

/// Validate, then [`Publisher::republish`].
pub async fn republish_validated(
    publisher: &dyn Publisher,
    snapshot: &Snapshot,
    roster: &Roster,
) -> SchoolCalResult<()> {
    snapshot.validate(roster)?;
    publisher.republish(snapshot).await
}

/// Commits the snapshot into a git checkout and pushes it.
///
/// The published copy is read back over HTTP from `raw_url` when one is
/// configured, otherwise straight from the remote branch with `git show`.
pub struct GitPublisher {
    repo_dir: PathBuf,
    remote: String,
    branch: String,
    file_name: String,
    commit_prefix: String,
    raw_url: Option<String>,
    timeout: Duration,
    client: Client,
}

impl GitPublisher {
    pub fn from_settings(settings: &Settings) -> SchoolCalResult<Self> {
        let timeout = settings.publish_timeout()?;
        let client = Client::builder()
            .user_agent(concat!("schoolcal/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SchoolCalError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(GitPublisher {
            repo_dir: settings.repo_dir(),
            remote: settings.publish.remote.clone(),
            branch: settings.publish.branch.clone(),
            file_name: settings.publish.file_name.clone(),
            commit_prefix: settings.publish.commit_prefix.clone(),
            raw_url: settings.publish.raw_url.clone(),
            timeout,
            client,
        })
    }

    async fn git(&self, args: &[&str]) -> SchoolCalResult<String> {
        let output = run_tool("git", args, Some(&self.repo_dir), self.timeout).await?;
        let text = combined_output(&output);
        if !output.status.success() {
            return Err(SchoolCalError::transport(
                &format!("git {}", args.first().copied().unwrap_or_default()),
                text.trim(),
            ));
        }
        Ok(text)
    }

    /// Write the snapshot into the checkout and commit it.
    /// Returns false when the file was already committed as-is.
    async fn commit(&self, snapshot: &Snapshot) -> SchoolCalResult<bool> {
        let path = self.repo_dir.join(&self.file_name);
        snapshot.save(&path)?;
        debug!(path = %path.display(), "Wrote snapshot into checkout");

        self.git(&["add", self.file_name.as_str()]).await?;

        let message = format!(
            "{} - {}",
            self.commit_prefix,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        match self.git(&["commit", "-m", message.as_str()]).await {
            Ok(_) => Ok(true),
            Err(SchoolCalError::Transport { message, .. })
                if message.contains("nothing to commit") =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the remote branch; returns the commit it points at.
    async fn fetch_branch(&self) -> SchoolCalResult<String> {
        self.git(&["fetch", "-q", self.remote.as_str(), self.branch.as_str()])
            .await?;
        let sha = self.git(&["rev-parse", "FETCH_HEAD"]).await?;
        Ok(sha.trim().to_string())
    }

    async fn fetch_over_http(&self, raw_url: &str) -> SchoolCalResult<Snapshot> {
        let url = format!("{raw_url}?t={}", Utc::now().timestamp());

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SchoolCalError::Timeout("fetch".into(), self.timeout.as_secs())
            } else {
                SchoolCalError::transport("fetch", e)
            }
        })?;

        if !response.status().is_success() {
            return Err(SchoolCalError::transport(
                "fetch",
                format!("HTTP {} from {raw_url}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SchoolCalError::transport("fetch", e))?;
        Snapshot::from_json(&body)
    }

    async fn fetch_over_git(&self) -> SchoolCalResult<Snapshot> {
        let sha = self.fetch_branch().await?;
        let object = format!("{sha}:{}", self.file_name);
        let output = run_tool(
            "git",
            &["show", object.as_str()],
            Some(&self.repo_dir),
            self.timeout,
        )
        .await?;
        if !output.status.success() {
            return Err(SchoolCalError::transport(
                "git show",
                combined_output(&output).trim(),
            ));
        }
        Snapshot::from_json(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> SchoolCalResult<()> {
        if !self.commit(snapshot).await? {
            info!("No changes to publish");
            return Ok(());
        }

        self.git(&["push", self.remote.as_str(), self.branch.as_str()]).await?;
        info!(remote = %self.remote, branch = %self.branch, "Published snapshot");
        Ok(())
    }

    /// Commit locally, then force the branch to our commit. The lease pins
    /// the remote to the commit just fetched, so work pushed in between is
    /// still refused.
    async fn republish(&self, snapshot: &Snapshot) -> SchoolCalResult<()> {
        self.commit(snapshot).await?;

        let remote_head = self.fetch_branch().await?;
        let lease = format!("--force-with-lease={}:{remote_head}", self.branch);
        self.git(&["push", lease.as_str(), self.remote.as_str(), self.branch.as_str()])
            .await?;
        warn!(
            remote = %self.remote,
            branch = %self.branch,
            replaced = %remote_head,
            "Republished snapshot over the remote branch"
        );
        Ok(())
    }

    async fn fetch_current(&self) -> SchoolCalResult<Snapshot> {
        match self.raw_url.as_deref() {
            Some(raw_url) => self.fetch_over_http(raw_url).await,
            None => self.fetch_over_git().await,
        }
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use super::*;

    /// Keeps the published copy in memory.
    #[derive(Default)]
    pub(crate) struct MemoryPublisher {
        pub(crate) current: Mutex<Option<Snapshot>>,
        pub(crate) publishes: Mutex<usize>,
    }

    impl MemoryPublisher {
        pub(crate) fn publish_count(&self) -> usize {
            *self.publishes.lock().unwrap()
        }
    }

    #[async_trait]
    impl Publisher for MemoryPublisher {
        async fn publish(&self, snapshot: &Snapshot) -> SchoolCalResult<()> {
            *self.current.lock().unwrap() = Some(snapshot.clone());
            *self.publishes.lock().unwrap() += 1;
            Ok(())
        }

        async fn fetch_current(&self) -> SchoolCalResult<Snapshot> {
            self.current
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SchoolCalError::transport("fetch", "nothing published"))
        }
    }
}


#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::process::Command;

    use chrono::{FixedOffset, TimeZone};

    use super::git_fixture::{git, git_clone, git_remote};
    use super::memory::MemoryPublisher;
    use super::*;
    use crate::event::make_event;
    use crate::roster::TEST_ROSTER;
    use crate::snapshot::{UiDefaults, build_snapshot};

    fn roster() -> Roster {
        Roster::from_toml(TEST_ROSTER).unwrap()
    }

    fn snapshot() -> Snapshot {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 11, 3, 7, 0, 0)
            .unwrap();
        build_snapshot(
            &roster(),
            vec![make_event(10, 11, 2025, "Odd Socks Day")],
            vec![],
            now,
            UiDefaults::default(),
        )
    }

    #[tokio::test]
    async fn test_invalid_snapshot_never_published() {
        let publisher = MemoryPublisher::default();
        let mut snapshot = snapshot();
        snapshot.events[0].audience = vec!["Mia".into()];

        let result = publish_validated(&publisher, &snapshot, &roster()).await;
        assert!(matches!(result, Err(SchoolCalError::Validation(_))));
        assert_eq!(publisher.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_valid_snapshot_published() {
        let publisher = MemoryPublisher::default();
        publish_validated(&publisher, &snapshot(), &roster()).await.unwrap();
        assert_eq!(publisher.fetch_current().await.unwrap(), snapshot());
    }

    fn git_publisher(root: &Path, checkout: &Path) -> GitPublisher {
        let mut settings = Settings::with_data_dir(root);
        settings.publish.repo_dir = Some(checkout.to_path_buf());
        GitPublisher::from_settings(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_git_publish_commits_and_pushes() {
        if which::which("git").is_err() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let (remote, checkout) = git_remote(root.path());
        let publisher = git_publisher(root.path(), &checkout);

        publisher.publish(&snapshot()).await.unwrap();
        // Same content again: nothing to commit is not an error
        publisher.publish(&snapshot()).await.unwrap();

        let log = Command::new("git")
            .args(["log", "--oneline", "main"])
            .current_dir(&remote)
            .output()
            .unwrap();
        let log = String::from_utf8_lossy(&log.stdout);
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("Update calendar data - "));
    }

    #[tokio::test]
    async fn test_republish_replaces_externally_pushed_copy() {
        if which::which("git").is_err() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let (remote, checkout) = git_remote(root.path());
        let publisher = git_publisher(root.path(), &checkout);
        publisher.publish(&snapshot()).await.unwrap();

        // Someone else pushes an older copy from their own clone
        let other = root.path().join("other");
        git_clone(&remote, &other);
        let mut stale = snapshot();
        stale.events[0].title = "Stale Day".into();
        stale.save(&other.join("school_calendar_data.json")).unwrap();
        git(&other, &["commit", "-q", "-am", "stale copy"]);
        git(&other, &["push", "-q", "origin", "main"]);

        let mut ours = snapshot();
        ours.events[0].title = "Odd Socks Day (moved)".into();

        // A plain push is refused as non-fast-forward
        assert!(matches!(
            publisher.publish(&ours).await,
            Err(SchoolCalError::Transport { .. })
        ));

        publisher.republish(&ours).await.unwrap();
        assert_eq!(publisher.fetch_current().await.unwrap(), ours);
    }

    #[tokio::test]
    async fn test_fetch_without_raw_url_reads_remote_branch() {
        if which::which("git").is_err() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let (_remote, checkout) = git_remote(root.path());
        let publisher = git_publisher(root.path(), &checkout);

        publisher.publish(&snapshot()).await.unwrap();
        // Local edits that were never pushed are not what consumers see
        std::fs::write(checkout.join("school_calendar_data.json"), "{}").unwrap();

        assert_eq!(publisher.fetch_current().await.unwrap(), snapshot());
    }
}
