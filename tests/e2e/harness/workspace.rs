use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Scratch directory for launcher commands and the files they leave behind
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { dir })
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Launcher that dumps its environment to `env.txt` and keeps running
    pub fn env_dump_command(&self) -> String {
        format!("env > '{}'; exec sleep 30", self.file("env.txt").display())
    }

    /// Launcher that records its PID in `pid.txt` and keeps running
    pub fn pid_file_command(&self) -> String {
        format!("echo $$ > '{}'; exec sleep 30", self.file("pid.txt").display())
    }

    /// Launcher that forks two long-running children and waits on them
    pub fn process_tree_command(&self) -> String {
        format!(
            "echo $$ > '{}'; sleep 30 & sleep 31 & wait",
            self.file("pid.txt").display()
        )
    }

    /// Wait until `name` exists and is non-empty, then read it
    pub fn wait_for_file(&self, name: &str, timeout: Duration) -> Result<String> {
        let path = self.file(name);
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(content) = fs::read_to_string(&path) {
                if content.ends_with('\n') {
                    return Ok(content);
                }
            }
            if Instant::now() >= deadline {
                bail!("Timed out waiting for {}", path.display());
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Environment recorded by [`env_dump_command`](Self::env_dump_command)
    pub fn read_env_dump(&self) -> Result<BTreeMap<String, String>> {
        let content = self.wait_for_file("env.txt", Duration::from_secs(2))?;
        Ok(content
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    /// PID recorded by [`pid_file_command`](Self::pid_file_command)
    pub fn read_pid(&self) -> Result<u32> {
        let content = self.wait_for_file("pid.txt", Duration::from_secs(2))?;
        content
            .trim()
            .parse()
            .with_context(|| format!("Invalid PID file content: {content:?}"))
    }
}
