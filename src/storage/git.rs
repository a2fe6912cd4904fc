//! Version control synchronizer.
//!
//! Wraps the `git` executable. Arguments are always passed as a discrete
//! vector, never through a shell, and are checked against a metacharacter
//! denylist before spawning. Commits use a per-invocation identity so the
//! user's own git configuration is never consulted or changed.
//!
//! Commit failures are surfaced. Pull and push are best effort: they are
//! skipped without a remote, bounded by a timeout, and their failures are
//! logged rather than returned to the operation that triggered them.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::config::GitConfig;
use crate::error::{KnowledgeError, Result};
use crate::storage::lock::{LockManager, VCS_KEY};

/// Characters that are rejected in any git argument.
pub const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '$', '`', '>', '<', '\n', '\r', '\0'];

/// Serializes pushes among themselves without holding up commits.
const PUSH_KEY: &str = "<version-control-push>";

pub struct GitSync {
    repo: PathBuf,
    config: GitConfig,
    locks: Arc<LockManager>,
}

impl GitSync {
    pub fn new(repo: impl Into<PathBuf>, config: GitConfig, locks: Arc<LockManager>) -> Self {
        Self {
            repo: repo.into(),
            config,
            locks,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// `git init` the repository if it has no `.git` yet. Returns `true` when
    /// a new repository was created.
    pub async fn init(&self) -> Result<bool> {
        if !self.is_enabled() || self.repo.join(".git").exists() {
            return Ok(false);
        }
        self.run(&["init"]).await?;
        tracing::info!("initialized git repository");
        Ok(true)
    }

    /// Whether the repository has at least one commit.
    pub async fn has_commits(&self) -> bool {
        self.is_enabled() && self.run(&["rev-parse", "--verify", "HEAD"]).await.is_ok()
    }

    /// Stage the whole working tree and commit it if anything changed.
    ///
    /// Returns `true` when a commit was created.
    pub async fn commit_all(&self, message: &str) -> Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        let message = sanitize_message(message);
        self.locks
            .with_lock(VCS_KEY, || self.commit_locked(&message))
            .await
    }

    async fn commit_locked(&self, message: &str) -> Result<bool> {
        self.run(&["add", "-A"]).await?;
        let status = self.run(&["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            tracing::debug!("nothing to commit");
            return Ok(false);
        }
        self.run_with_identity(&["commit", "-m", message]).await?;
        tracing::debug!(message = %message, "committed changes");
        Ok(true)
    }

    /// Commit, then push in the background when a remote is configured.
    pub async fn commit_and_push(self: &Arc<Self>, message: &str) -> Result<()> {
        if self.commit_all(message).await? && self.has_remote().await {
            self.push_detached();
        }
        Ok(())
    }

    /// Whether the configured remote exists in this repository.
    pub async fn has_remote(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match self.run(&["remote"]).await {
            Ok(out) => out.lines().any(|name| name.trim() == self.config.remote),
            Err(_) => false,
        }
    }

    /// Fetch the tracked branch and hard-reset onto it. Remote wins: local
    /// changes not committed through this process are discarded.
    pub async fn pull(&self) -> Result<()> {
        if !self.has_remote().await {
            tracing::debug!("no remote configured, skipping pull");
            return Ok(());
        }
        let branch = self.branch().await?;
        self.locks
            .with_lock(VCS_KEY, || self.pull_locked(&branch))
            .await
    }

    async fn pull_locked(&self, branch: &str) -> Result<()> {
        let remote = self.config.remote.as_str();
        let remote_ref = format!("{remote}/{branch}");
        self.run(&["fetch", remote, branch]).await?;
        self.run(&["reset", "--hard", &remote_ref]).await?;
        tracing::info!(remote, branch, "pulled from remote");
        Ok(())
    }

    /// Push the tracked branch to the remote.
    pub async fn push(&self) -> Result<()> {
        if !self.has_remote().await {
            return Ok(());
        }
        let refspec = format!("HEAD:{}", self.branch().await?);
        let args = ["push", self.config.remote.as_str(), refspec.as_str()];
        self.locks
            .with_lock(PUSH_KEY, || self.run(&args))
            .await
            .map(|_| ())
    }

    /// Fire-and-forget push. The local commit already recorded the change,
    /// so failures are only logged.
    pub fn push_detached(self: &Arc<Self>) {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            match sync.push().await {
                Ok(()) => tracing::debug!("pushed to remote"),
                Err(e) => tracing::warn!(error = %e, "push failed, change kept locally"),
            }
        });
    }

    /// Subject lines of the most recent commits, newest first.
    pub async fn recent_subjects(&self, count: usize) -> Result<Vec<String>> {
        let limit = format!("-{count}");
        let out = self.run(&["log", &limit, "--format=%s"]).await?;
        Ok(out.lines().map(str::to_string).collect())
    }

    async fn branch(&self) -> Result<String> {
        match &self.config.branch {
            Some(branch) => Ok(branch.clone()),
            None => Ok(self
                .run(&["rev-parse", "--abbrev-ref", "HEAD"])
                .await?
                .trim()
                .to_string()),
        }
    }

    async fn run_with_identity(&self, args: &[&str]) -> Result<String> {
        let name = format!("user.name={}", self.config.author_name);
        let email = format!("user.email={}", self.config.author_email);
        let mut full: Vec<&str> = vec![
            "-c",
            name.as_str(),
            "-c",
            email.as_str(),
            "-c",
            "commit.gpgsign=false",
        ];
        full.extend_from_slice(args);
        self.run(&full).await
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        check_args(args)?;

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| KnowledgeError::vcs(format!("git {} timed out", subcommand(args))))?
            .map_err(|e| KnowledgeError::vcs(format!("failed to execute git: {}", e.kind())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(args = ?args, stderr = %stderr.trim(), "git command failed");
            return Err(KnowledgeError::vcs(format!(
                "git {} failed",
                subcommand(args)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Reject arguments carrying shell metacharacters.
pub fn check_args(args: &[&str]) -> Result<()> {
    if let Some(bad) = args.iter().find(|a| a.contains(SHELL_METACHARACTERS)) {
        tracing::warn!(arg = %bad, "rejected git argument");
        return Err(KnowledgeError::vcs("git argument contains forbidden characters"));
    }
    Ok(())
}

/// Make a commit message safe for [`check_args`] by blanking metacharacters.
pub fn sanitize_message(message: &str) -> String {
    let cleaned: String = message
        .chars()
        .map(|c| if SHELL_METACHARACTERS.contains(&c) { ' ' } else { c })
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        "Update knowledge".to_string()
    } else {
        cleaned
    }
}

/// First non-option argument, for error messages.
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "-c" {
            iter.next();
            continue;
        }
        return *arg;
    }
    "command"
}

/// Whether a usable `git` executable is on the PATH.
pub async fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}
