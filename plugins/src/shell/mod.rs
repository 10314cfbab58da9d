//! Shell command runner.
//!
//! Commands run under `sh -c` with captured stdout/stderr, a configurable
//! timeout, and a per-run kill switch so `terminate` can stop a command
//! another task is waiting on. Finished outputs stay buffered by run id
//! until the runner is dropped.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex, RwLock};
use uuid::Uuid;

use deskforge_core::providers::{CommandOutput, CommandProvider};

lazy_static! {
    /// Output lines matching any of these are surfaced as `matched_errors`
    /// for the self-correction loop.
    static ref ERROR_LINE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"error(\[E\d+\])?:").unwrap(),
        Regex::new(r"(?i)^\s*error\b").unwrap(),
        Regex::new(r"panicked at").unwrap(),
        Regex::new(r"\bFAILED\b").unwrap(),
        Regex::new(r"(?i)exception\b").unwrap(),
        Regex::new(r"^Traceback \(most recent call last\)").unwrap(),
        Regex::new(r"(?i)warning: .*#\[warn\(").unwrap(),
    ];
}

fn scan_error_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| ERROR_LINE_PATTERNS.iter().any(|p| p.is_match(line)))
        .map(|line| line.trim_end().to_string())
        .collect()
}

pub struct ShellRunner {
    timeout: Duration,
    finished: Arc<RwLock<HashMap<String, CommandOutput>>>,
    kill_switches: Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            finished: Arc::new(RwLock::new(HashMap::new())),
            kill_switches: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl CommandProvider for ShellRunner {
    async fn run(&self, command: &str, cwd: Option<&str>) -> anyhow::Result<CommandOutput> {
        let run_id = Uuid::new_v4().to_string();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn command: {command}"))?;

        let mut stdout_pipe = child.stdout.take().context("stdout not captured")?;
        let mut stderr_pipe = child.stderr.take().context("stderr not captured")?;
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            stdout_pipe.read_to_string(&mut buf).await.map(|_| buf)
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr_pipe.read_to_string(&mut buf).await.map(|_| buf)
        });

        let (kill_tx, mut kill_rx) = oneshot::channel();
        self.kill_switches
            .lock()
            .await
            .insert(run_id.clone(), kill_tx);

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = &mut kill_rx => {
                tracing::warn!(run_id = %run_id, "command terminated on request");
                child.kill().await.ok();
                child.wait().await?
            }
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!(run_id = %run_id, timeout_secs = self.timeout.as_secs(), "command timed out");
                child.kill().await.ok();
                child.wait().await?
            }
        };

        self.kill_switches.lock().await.remove(&run_id);

        let stdout = stdout_task.await??;
        let stderr = stderr_task.await??;

        let mut matched_errors = scan_error_lines(&stdout);
        matched_errors.extend(scan_error_lines(&stderr));

        let output = CommandOutput {
            run_id: run_id.clone(),
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            matched_errors,
        };

        self.finished
            .write()
            .await
            .insert(run_id, output.clone());
        Ok(output)
    }

    async fn output(&self, run_id: &str) -> anyhow::Result<Option<CommandOutput>> {
        Ok(self.finished.read().await.get(run_id).cloned())
    }

    async fn terminate(&self, run_id: &str) -> anyhow::Result<bool> {
        match self.kill_switches.lock().await.remove(run_id) {
            Some(tx) => Ok(tx.send(()).is_ok()),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = ShellRunner::default();
        let out = runner.run("echo hello", None).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.succeeded());
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let runner = ShellRunner::default();
        let out = runner.run("exit 3", None).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.succeeded());
    }

    #[tokio::test]
    async fn respects_working_directory() {
        let runner = ShellRunner::default();
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let out = runner
            .run("ls", Some(dir.path().to_str().unwrap()))
            .await
            .unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn scans_output_for_error_lines() {
        let runner = ShellRunner::default();
        let out = runner
            .run("echo 'error[E0308]: mismatched types' >&2; echo fine", None)
            .await
            .unwrap();
        assert_eq!(out.matched_errors.len(), 1);
        assert!(out.matched_errors[0].contains("E0308"));
    }

    #[tokio::test]
    async fn finished_output_is_retrievable_by_run_id() {
        let runner = ShellRunner::default();
        let out = runner.run("echo done", None).await.unwrap();

        let buffered = runner.output(&out.run_id).await.unwrap().unwrap();
        assert_eq!(buffered.stdout, out.stdout);
        assert!(runner.output("no-such-run").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminate_kills_a_running_command() {
        let runner = Arc::new(ShellRunner::default());

        let background = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run("sleep 30", None).await })
        };

        // Wait for the run to register its kill switch.
        let run_id = loop {
            let switches = runner.kill_switches.lock().await;
            if let Some(id) = switches.keys().next() {
                break id.clone();
            }
            drop(switches);
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        assert!(runner.terminate(&run_id).await.unwrap());
        let out = background.await.unwrap().unwrap();
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn terminate_on_unknown_run_is_a_no_op() {
        let runner = ShellRunner::default();
        assert!(!runner.terminate("missing").await.unwrap());
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let runner = ShellRunner::new(Duration::from_millis(200));
        let out = runner.run("sleep 10", None).await.unwrap();
        assert_ne!(out.exit_code, 0);
    }
}
