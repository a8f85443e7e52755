//! Windows process control
//!
//! Engine processes are enumerated with a Toolhelp snapshot; trees are killed
//! with `taskkill /F /T`, which follows the parent chain the engine spawned.

use crate::constants::process::{KILL_VERIFY_ATTEMPTS, KILL_VERIFY_INTERVAL_MS};
use crate::domain::ports::{ProcessControl, ProcessInfo};
use crate::domain::{DomainError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Parent pids at or below this belong to the system (Idle, System)
const SYSTEM_PID_CEILING: u32 = 4;

#[derive(Debug, Default)]
pub struct WindowsProcessControl;

impl WindowsProcessControl {
    pub fn new() -> Self {
        Self
    }

    fn list(executable: &Path) -> Result<Vec<ProcessInfo>> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
            TH32CS_SNAPPROCESS,
        };

        let target = canonical(executable);
        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut found = Vec::new();
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| DomainError::Io(format!("failed to snapshot processes: {}", e)))?;

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
            while more {
                let len = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let name = String::from_utf16_lossy(&entry.szExeFile[..len]).to_lowercase();

                if name == target_name {
                    let pid = entry.th32ProcessID;
                    let matches = image_path(pid)
                        .map(|path| canonical(&path) == target)
                        .unwrap_or(true);
                    if matches {
                        found.push(ProcessInfo {
                            pid,
                            ppid: entry.th32ParentProcessID,
                            is_zombie: false,
                        });
                    }
                }
                more = Process32NextW(snapshot, &mut entry).is_ok();
            }

            let _ = CloseHandle(snapshot);
        }
        Ok(found)
    }
}

#[async_trait]
impl ProcessControl for WindowsProcessControl {
    async fn find_processes(&self, executable: &Path) -> Result<Vec<ProcessInfo>> {
        let executable = executable.to_path_buf();
        tokio::task::spawn_blocking(move || Self::list(&executable))
            .await
            .map_err(|e| DomainError::Io(format!("process enumeration task failed: {}", e)))?
    }

    fn is_orphaned(&self, info: &ProcessInfo) -> bool {
        info.ppid <= SYSTEM_PID_CEILING || !self.is_alive(info.ppid)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let process = OpenProcess(PROCESS_TERMINATE, false, pid).map_err(|e| {
                DomainError::TerminationFailed {
                    pid,
                    reason: e.to_string(),
                }
            })?;
            let result = TerminateProcess(process, 1);
            let _ = CloseHandle(process);
            result.map_err(|e| DomainError::TerminationFailed {
                pid,
                reason: e.to_string(),
            })
        }
    }

    async fn kill_tree(&self, pid: u32) -> Result<()> {
        debug!(pid = pid, "Killing process tree");
        let output = tokio::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output()
            .await;
        if let Err(e) = output {
            warn!(pid = pid, error = %e, "taskkill failed to run");
        }

        for _ in 0..KILL_VERIFY_ATTEMPTS {
            if !self.is_alive(pid) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(KILL_VERIFY_INTERVAL_MS)).await;
        }

        Err(DomainError::TerminationFailed {
            pid,
            reason: "process still alive after taskkill".to_string(),
        })
    }

    fn is_alive(&self, pid: u32) -> bool {
        use windows::Win32::Foundation::{CloseHandle, WAIT_TIMEOUT};
        use windows::Win32::System::Threading::{OpenProcess, WaitForSingleObject, PROCESS_SYNCHRONIZE};

        unsafe {
            let Ok(process) = OpenProcess(PROCESS_SYNCHRONIZE, false, pid) else {
                return false;
            };
            let result = WaitForSingleObject(process, 0);
            let _ = CloseHandle(process);
            result == WAIT_TIMEOUT
        }
    }
}

fn image_path(pid: u32) -> Option<PathBuf> {
    use windows::core::PWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };

    unsafe {
        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buffer = [0u16; 1024];
        let mut size = buffer.len() as u32;
        let result = QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(process);
        result.ok()?;
        Some(PathBuf::from(String::from_utf16_lossy(&buffer[..size as usize])))
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
