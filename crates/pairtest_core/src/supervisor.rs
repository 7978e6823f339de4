//! Lifecycle of the service under test.
//!
//! The service is launched through `/bin/sh -c` with a cleared environment
//! holding only `PATH` and the `PAIR_` launch variables. Teardown kills the
//! whole process tree, because a shell-launched service may leave children
//! behind that would keep the port bound for the next run.

use crate::config::{launch_var, Config, Overrides};
use crate::error::{HarnessError, Result};
use std::collections::BTreeMap;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default time the service gets to bind its socket after launch.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(250);

/// Default time to wait for the killed service to be reaped.
pub const DEFAULT_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// A running instance of the service under test.
#[derive(Debug)]
struct SupervisedProcess {
    child: Child,
    pid: u32,
    started_at: Instant,
}

/// Owns at most one running service process.
///
/// Dropping the supervisor stops the service, so teardown happens on every
/// exit path.
#[derive(Debug)]
pub struct Supervisor {
    process: Option<SupervisedProcess>,
    startup_grace: Duration,
    reap_timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a supervisor with default timings.
    pub fn new() -> Self {
        Self {
            process: None,
            startup_grace: DEFAULT_STARTUP_GRACE,
            reap_timeout: DEFAULT_REAP_TIMEOUT,
        }
    }

    /// Set how long `start` waits for the service to bind.
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Set how long `stop` waits for the killed service to be reaped.
    pub fn with_reap_timeout(mut self, timeout: Duration) -> Self {
        self.reap_timeout = timeout;
        self
    }

    /// Launch `config.app_path` with the derived environment.
    ///
    /// Blocks for the startup grace period, then checks the service is still
    /// alive. Returns the service's PID.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a service is already supervised
    /// - `Startup` if the command cannot be spawned or exits during startup
    pub fn start(&mut self, config: &Config, overrides: &Overrides) -> Result<u32> {
        if let Some(process) = &self.process {
            return Err(HarnessError::AlreadyRunning { pid: process.pid });
        }
        if !config.launches_service() {
            return Err(HarnessError::Startup("no launch command configured".to_string()));
        }

        let env = launch_env(config, overrides);
        info!(command = %config.app_path, env = ?env, "starting service");

        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(&config.app_path).env_clear();
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }
        command.envs(&env).stdin(Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|e| HarnessError::Startup(format!("{}: {}", config.app_path, e)))?;
        let pid = child.id();
        let started_at = Instant::now();

        thread::sleep(self.startup_grace);

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                return Err(HarnessError::Startup(format!(
                    "'{}' exited during startup ({})",
                    config.app_path, status
                )));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HarnessError::Startup(e.to_string()));
            }
        }

        info!(pid, "service started");
        self.process = Some(SupervisedProcess {
            child,
            pid,
            started_at,
        });
        Ok(pid)
    }

    /// Kill the service and all its descendants, then reap it.
    ///
    /// Safe to call when nothing is running. Failures are logged, never
    /// returned.
    pub fn stop(&mut self) {
        let Some(mut process) = self.process.take() else {
            debug!("stop requested but no service is running");
            return;
        };
        let pid = process.pid;

        let descendants = descendant_pids(pid);
        debug!(pid, ?descendants, "killing service process tree");
        for child_pid in &descendants {
            if let Err(e) = kill_pid(*child_pid) {
                warn!(pid = child_pid, error = %e, "failed to kill descendant");
            }
        }
        if let Err(e) = process.child.kill() {
            warn!(pid, error = %e, "failed to kill service");
        }

        let deadline = Instant::now() + self.reap_timeout;
        loop {
            match process.child.try_wait() {
                Ok(Some(status)) => {
                    info!(
                        pid,
                        %status,
                        uptime_ms = process.started_at.elapsed().as_millis() as u64,
                        "service stopped"
                    );
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                Ok(None) => {
                    warn!(pid, "service not reaped before timeout");
                    return;
                }
                Err(e) => {
                    warn!(pid, error = %e, "failed to reap service");
                    return;
                }
            }
        }
    }

    /// PID of the supervised service, if any.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid)
    }

    /// Time since the supervised service was launched.
    pub fn uptime(&self) -> Option<Duration> {
        self.process.as_ref().map(|p| p.started_at.elapsed())
    }

    /// Whether the supervised service is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Environment for the service: the config's launch env with `overrides`
/// rendered on top. `app_path` is never rendered.
pub fn launch_env(config: &Config, overrides: &Overrides) -> BTreeMap<String, String> {
    let mut env = config.as_launch_env();
    for (name, value) in overrides {
        let name = name.to_ascii_lowercase();
        if name == "app_path" {
            continue;
        }
        env.insert(launch_var(&name), value.clone());
    }
    env
}

/// All descendants of `root`, children before grandchildren.
#[cfg(target_os = "linux")]
pub fn descendant_pids(root: u32) -> Vec<u32> {
    let mut children: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    if let Ok(entries) = std::fs::read_dir("/proc") {
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if let Some((_, ppid)) = read_proc_stat(pid) {
                children.entry(ppid).or_default().push(pid);
            }
        }
    }

    let mut found = Vec::new();
    let mut queue = std::collections::VecDeque::from([root]);
    while let Some(pid) = queue.pop_front() {
        for &child in children.get(&pid).map(Vec::as_slice).unwrap_or_default() {
            if !found.contains(&child) {
                found.push(child);
                queue.push_back(child);
            }
        }
    }
    found
}

/// All descendants of `root`. Process tree walking is only supported on Linux.
#[cfg(not(target_os = "linux"))]
pub fn descendant_pids(_root: u32) -> Vec<u32> {
    debug!("descendant enumeration unsupported on this platform");
    Vec::new()
}

/// Whether `pid` names a live process. Zombies count as dead.
#[cfg(target_os = "linux")]
pub fn process_is_running(pid: u32) -> bool {
    matches!(read_proc_stat(pid), Some((state, _)) if state != 'Z' && state != 'X')
}

/// Whether `pid` names a live process.
#[cfg(all(unix, not(target_os = "linux")))]
pub fn process_is_running(pid: u32) -> bool {
    // SAFETY: signal 0 only checks for process existence.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// State character and parent PID from `/proc/<pid>/stat`.
#[cfg(target_os = "linux")]
fn read_proc_stat(pid: u32) -> Option<(char, u32)> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The command name is parenthesised and may contain spaces.
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid = fields.next()?.parse().ok()?;
    Some((state, ppid))
}

#[cfg(unix)]
fn kill_pid(pid: u32) -> std::io::Result<()> {
    // SAFETY: plain syscall on a PID we enumerated; no memory is shared.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_pid(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}
