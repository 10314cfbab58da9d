//! Git integration via the `git` CLI.
//!
//! Every operation shells out to `git` in the repository root and wraps the
//! combined output in a [`VcsOutcome`]. Patch application writes the patch
//! to a scoped temp file that is removed when the handle drops, pass or
//! fail.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;

use deskforge_core::providers::{VcsOutcome, VcsProvider};

pub struct GitVcs {
    repo_root: PathBuf,
}

impl GitVcs {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> anyhow::Result<VcsOutcome> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .with_context(|| format!("failed to run git {}", args.join(" ")))?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(stderr.trim_end());
        }

        Ok(VcsOutcome {
            ok: output.status.success(),
            output: text.trim_end().to_string(),
        })
    }
}

#[async_trait]
impl VcsProvider for GitVcs {
    async fn status(&self) -> anyhow::Result<VcsOutcome> {
        self.git(&["status", "--porcelain"]).await
    }

    async fn diff(&self) -> anyhow::Result<VcsOutcome> {
        self.git(&["diff"]).await
    }

    async fn commit(&self, message: &str) -> anyhow::Result<VcsOutcome> {
        let staged = self.git(&["add", "-A"]).await?;
        if !staged.ok {
            return Ok(staged);
        }
        self.git(&["commit", "-m", message]).await
    }

    async fn push(&self) -> anyhow::Result<VcsOutcome> {
        self.git(&["push"]).await
    }

    async fn pull(&self) -> anyhow::Result<VcsOutcome> {
        self.git(&["pull", "--ff-only"]).await
    }

    async fn apply_patch(&self, patch: &str) -> anyhow::Result<VcsOutcome> {
        // NamedTempFile removes the file on drop, so a failed apply cannot
        // leave patch files behind.
        let mut file = tempfile::NamedTempFile::new().context("cannot create patch file")?;
        file.write_all(patch.as_bytes())?;
        if !patch.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;

        let path = file
            .path()
            .to_str()
            .context("patch file path is not valid UTF-8")?;
        self.git(&["apply", "--whitespace=nowarn", path]).await
    }
}
