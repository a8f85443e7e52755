//! Unix process control
//!
//! Linux enumerates engine processes through procfs; other Unix systems fall
//! back to `ps`. Trees are signalled through the process group the engine was
//! launched in.

use crate::constants::process::{KILL_VERIFY_ATTEMPTS, KILL_VERIFY_INTERVAL_MS};
use crate::domain::ports::{ProcessControl, ProcessInfo};
use crate::domain::{DomainError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct UnixProcessControl;

impl UnixProcessControl {
    pub fn new() -> Self {
        Self
    }

    fn signal(pid: i32, signal: i32) -> std::io::Result<()> {
        let result = unsafe { libc::kill(pid, signal) };
        if result != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Process group of `pid`, unless it is our own group
    fn foreign_group(pid: u32) -> Option<i32> {
        let pgid = unsafe { libc::getpgid(pid as i32) };
        let own = unsafe { libc::getpgid(0) };
        (pgid > 0 && pgid != own).then_some(pgid)
    }

    #[cfg(target_os = "linux")]
    fn list(executable: &Path) -> Result<Vec<ProcessInfo>> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir("/proc")? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };

            // Processes we cannot inspect are skipped
            let Ok(exe) = std::fs::read_link(entry.path().join("exe")) else {
                continue;
            };
            if !same_executable(&exe, executable) {
                continue;
            }

            let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some((state, ppid)) = parse_proc_stat(&stat) {
                found.push(ProcessInfo {
                    pid,
                    ppid,
                    is_zombie: state == 'Z',
                });
            }
        }
        Ok(found)
    }

    #[cfg(not(target_os = "linux"))]
    fn list(executable: &Path) -> Result<Vec<ProcessInfo>> {
        let output = std::process::Command::new("ps")
            .args(["-eo", "pid,ppid,state,command"])
            .output()?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text
            .lines()
            .skip(1)
            .filter_map(|line| parse_ps_line(line, executable))
            .collect())
    }
}

#[async_trait]
impl ProcessControl for UnixProcessControl {
    async fn find_processes(&self, executable: &Path) -> Result<Vec<ProcessInfo>> {
        let executable = executable.to_path_buf();
        tokio::task::spawn_blocking(move || Self::list(&executable))
            .await
            .map_err(|e| DomainError::Io(format!("process enumeration task failed: {}", e)))?
    }

    fn is_orphaned(&self, info: &ProcessInfo) -> bool {
        info.is_zombie && (info.ppid == 0 || info.ppid == 1)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        Self::signal(pid as i32, libc::SIGTERM).map_err(|e| DomainError::TerminationFailed {
            pid,
            reason: e.to_string(),
        })
    }

    async fn kill_tree(&self, pid: u32) -> Result<()> {
        debug!(pid = pid, "Killing process tree");
        let _ = Self::signal(pid as i32, libc::SIGTERM);

        if let Some(pgid) = Self::foreign_group(pid) {
            let _ = Self::signal(-pgid, libc::SIGTERM);
            tokio::time::sleep(Duration::from_millis(KILL_VERIFY_INTERVAL_MS)).await;
            let _ = Self::signal(-pgid, libc::SIGKILL);
        }
        let _ = Self::signal(pid as i32, libc::SIGKILL);

        for _ in 0..KILL_VERIFY_ATTEMPTS {
            if !self.is_alive(pid) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(KILL_VERIFY_INTERVAL_MS)).await;
        }

        warn!(pid = pid, "Process still alive after SIGKILL");
        Err(DomainError::TerminationFailed {
            pid,
            reason: "process still alive after SIGKILL".to_string(),
        })
    }

    fn is_alive(&self, pid: u32) -> bool {
        if Self::signal(pid as i32, 0).is_err() {
            return false;
        }
        !is_zombie(pid)
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| parse_proc_stat(&stat))
        .map(|(state, _)| state == 'Z')
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(pid: u32) -> bool {
    std::process::Command::new("ps")
        .args(["-o", "state=", "-p", &pid.to_string()])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().starts_with('Z'))
        .unwrap_or(false)
}

/// State and parent pid from a `/proc/<pid>/stat` line.
/// The command name may contain spaces and parentheses, so fields are read after the last ')'.
pub fn parse_proc_stat(stat: &str) -> Option<(char, u32)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid = fields.next()?.parse().ok()?;
    Some((state, ppid))
}

/// One `ps -eo pid,ppid,state,command` row, if it runs `executable`
pub fn parse_ps_line(line: &str, executable: &Path) -> Option<ProcessInfo> {
    let (pid, rest) = next_field(line)?;
    let (ppid, rest) = next_field(rest)?;
    let (state, command) = next_field(rest)?;
    if !runs_executable(command.trim(), executable) {
        return None;
    }
    Some(ProcessInfo {
        pid: pid.parse().ok()?,
        ppid: ppid.parse().ok()?,
        is_zombie: state.starts_with('Z'),
    })
}

fn next_field(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    let end = line.find(char::is_whitespace)?;
    Some(line.split_at(end))
}

/// The command column holds the path followed by arguments, and the path may contain spaces
fn runs_executable(command: &str, executable: &Path) -> bool {
    let first = command.split_whitespace().next().unwrap_or_default();
    if same_executable(Path::new(first), executable) {
        return true;
    }
    [executable.to_path_buf(), canonical(executable)]
        .iter()
        .any(|exe| {
            let exe = exe.to_string_lossy();
            command.strip_prefix(exe.as_ref()).is_some_and(|args| {
                args.is_empty() || args.starts_with(char::is_whitespace)
            })
        })
}

fn same_executable(candidate: &Path, executable: &Path) -> bool {
    canonical(candidate) == canonical(executable)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_stat() {
        assert_eq!(
            parse_proc_stat("1234 (xray) S 1 1234 1234 0 -1 4194560"),
            Some(('S', 1))
        );
        assert_eq!(
            parse_proc_stat("99 (weird) name (x)) Z 42 99 99"),
            Some(('Z', 42))
        );
        assert_eq!(parse_proc_stat("garbage"), None);
    }

    #[test]
    fn test_parse_ps_line() {
        let exe = Path::new("/definitely/missing/xray");
        let info = parse_ps_line("  321   1 Z    /definitely/missing/xray -c stdin:", exe).unwrap();
        assert_eq!(
            info,
            ProcessInfo {
                pid: 321,
                ppid: 1,
                is_zombie: true
            }
        );
        assert!(parse_ps_line("  322   1 S    /usr/bin/other", exe).is_none());
        assert!(parse_ps_line("PID PPID S COMMAND", exe).is_none());
    }

    #[test]
    fn test_parse_ps_line_path_with_spaces() {
        let exe = Path::new("/Applications/My Tools/xray");
        let info = parse_ps_line("  410  88 S    /Applications/My Tools/xray run -c stdin:", exe).unwrap();
        assert_eq!(info.pid, 410);
        assert_eq!(info.ppid, 88);
        assert!(!info.is_zombie);
        assert!(parse_ps_line("  411  88 S    /Applications/My Tools/xray", exe).is_some());
        assert!(parse_ps_line("  412  88 S    /Applications/My Tools/xray-helper", exe).is_none());
        assert!(parse_ps_line("  413  88 S    /Applications/My Other/xray", exe).is_none());
    }

    #[test]
    fn test_orphan_rule() {
        let control = UnixProcessControl::new();
        let zombie = |ppid| ProcessInfo {
            pid: 10,
            ppid,
            is_zombie: true,
        };
        assert!(control.is_orphaned(&zombie(1)));
        assert!(control.is_orphaned(&zombie(0)));
        assert!(!control.is_orphaned(&zombie(77)));
        assert!(!control.is_orphaned(&ProcessInfo {
            pid: 10,
            ppid: 1,
            is_zombie: false
        }));
    }

    #[test]
    fn test_is_alive_for_self_and_missing() {
        let control = UnixProcessControl::new();
        assert!(control.is_alive(std::process::id()));
        assert!(!control.is_alive(i32::MAX as u32));
    }

    #[tokio::test]
    async fn test_kill_tree_reaps_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let control = UnixProcessControl::new();

        let waiter = tokio::spawn(async move { child.wait().await });
        control.kill_tree(pid).await.unwrap();
        assert!(!control.is_alive(pid));
        waiter.await.unwrap().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_find_processes_by_executable() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let exe = std::fs::read_link(format!("/proc/{}/exe", pid)).unwrap();

        let found = UnixProcessControl::new().find_processes(&exe).await.unwrap();
        let info = found.iter().find(|p| p.pid == pid).unwrap();
        assert_eq!(info.ppid, std::process::id());
        assert!(!info.is_zombie);

        child.kill().await.unwrap();
    }
}
