//! Engine process supervisor
//!
//! Owns the single engine child process: launching it with the rendered
//! configuration on stdin, capturing its output, stopping it gracefully with
//! forced escalation, and reaping stray engine processes before each start.
//!
//! All start/stop transitions happen under one async mutex. Restarts are
//! additionally flag-guarded so a concurrent restart fails instead of queuing.

use crate::constants::process::{
    ASSET_LOCATION_ENV, DEFAULT_LOG_BUFFER_SIZE, GENERATED_CONFIG_FILE, STOP_GRACE_PERIOD_SEC,
};
use crate::domain::entities::XrayConfig;
use crate::domain::ports::ProcessControl;
use crate::domain::{DomainError, Result};
use crate::infrastructure::core_logger::CoreLogger;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Xray (\d+\.\d+\.\d+)").expect("valid version regex"));

/// Shared receiving end of the live log tail
pub type LogStream = Arc<Mutex<mpsc::Receiver<String>>>;

/// Filesystem locations and buffer sizing for the supervisor
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub executable_path: PathBuf,
    pub assets_path: PathBuf,
    pub generated_config_path: PathBuf,
    pub log_buffer_size: usize,
}

impl CoreSettings {
    /// Settings with the default live-tail capacity
    pub fn new(
        executable_path: impl Into<PathBuf>,
        assets_path: impl Into<PathBuf>,
        generated_config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable_path: executable_path.into(),
            assets_path: assets_path.into(),
            generated_config_path: generated_config_path.into(),
            log_buffer_size: DEFAULT_LOG_BUFFER_SIZE,
        }
    }

    pub fn with_log_buffer_size(mut self, size: usize) -> Self {
        self.log_buffer_size = size;
        self
    }
}

#[derive(Debug)]
struct RunningProcess {
    pid: u32,
    exited: watch::Receiver<bool>,
}

impl RunningProcess {
    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }
}

#[derive(Debug, Default)]
struct CoreState {
    process: Option<RunningProcess>,
    logger: Option<Arc<CoreLogger>>,
    cancel: Option<CancellationToken>,
}

impl CoreState {
    fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(|p| !p.has_exited())
    }

    /// Stop the capture loops and reaper, and release the log files
    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(logger) = self.logger.take() {
            logger.close();
        }
    }
}

pub struct XrayCore {
    executable_path: PathBuf,
    assets_path: PathBuf,
    generated_config_path: PathBuf,
    version: String,
    process_control: Arc<dyn ProcessControl>,
    state: Mutex<CoreState>,
    restarting: AtomicBool,
    log_tx: mpsc::Sender<String>,
    log_rx: LogStream,
}

impl XrayCore {
    /// Resolve paths and query the engine version; an unparsable version is fatal
    pub async fn new(settings: CoreSettings, process_control: Arc<dyn ProcessControl>) -> Result<Self> {
        let executable_path = absolute(&settings.executable_path)?;
        let assets_path = absolute(&settings.assets_path)?;
        let generated_config_path = absolute(&settings.generated_config_path)?;

        let version = query_version(&executable_path).await?;
        let (log_tx, log_rx) = mpsc::channel(settings.log_buffer_size.max(1));

        info!(
            executable = %executable_path.display(),
            version = %version,
            "Engine executable detected"
        );

        Ok(Self {
            executable_path,
            assets_path,
            generated_config_path,
            version,
            process_control,
            state: Mutex::new(CoreState::default()),
            restarting: AtomicBool::new(false),
            log_tx,
            log_rx: Arc::new(Mutex::new(log_rx)),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Live tail of engine output; lines are dropped while the buffer is full
    pub fn logs(&self) -> LogStream {
        self.log_rx.clone()
    }

    pub async fn started(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// Pid of the running engine, if any
    pub async fn pid(&self) -> Option<u32> {
        let state = self.state.lock().await;
        state.process.as_ref().filter(|p| !p.has_exited()).map(|p| p.pid)
    }

    /// Launch the engine with `config`
    pub async fn start(&self, config: &XrayConfig, debug_mode: bool) -> Result<()> {
        let document = config.engine_document()?;
        if debug_mode {
            self.write_generated_config(&document.bytes).await?;
        }

        let mut state = self.state.lock().await;
        if state.is_running() {
            return Err(DomainError::AlreadyStarted);
        }

        // An exited child has been reaped already; its pid may belong to someone else now
        if let Some(stale) = state.process.take() {
            debug!(pid = stale.pid, "Clearing exited engine process");
        }
        state.release();
        self.cleanup_orphans().await;

        let logger = Arc::new(CoreLogger::open(&document.log_files, debug_mode)?);

        let mut cmd = Command::new(&self.executable_path);
        cmd.args(["-c", "stdin:"])
            .env(ASSET_LOCATION_ENV, &self.assets_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            error!(executable = %self.executable_path.display(), error = %e, "Failed to spawn engine");
            DomainError::SpawnFailed(e.to_string())
        })?;
        let pid = child
            .id()
            .ok_or_else(|| DomainError::SpawnFailed("engine exited immediately".to_string()))?;

        let cancel = CancellationToken::new();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(capture_output(stdout, logger.clone(), self.log_tx.clone(), cancel.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(capture_output(stderr, logger.clone(), self.log_tx.clone(), cancel.clone()));
        }

        let stdin = child.stdin.take();
        let (exit_tx, exit_rx) = watch::channel(false);
        tokio::spawn(reap(child, exit_tx, cancel.clone()));

        state.process = Some(RunningProcess {
            pid,
            exited: exit_rx,
        });
        state.logger = Some(logger);
        state.cancel = Some(cancel);

        if let Err(e) = write_config(stdin, &document.bytes).await {
            error!(pid = pid, error = %e, "Failed to pipe configuration to engine");
            self.stop_locked(&mut state).await;
            return Err(DomainError::SpawnFailed(format!("failed to write configuration: {}", e)));
        }

        info!(pid = pid, "Engine started");
        Ok(())
    }

    /// Stop the engine; does nothing when it is not running
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state).await;
    }

    async fn stop_locked(&self, state: &mut CoreState) {
        let Some(process) = state.process.take() else {
            return;
        };
        if process.has_exited() {
            debug!(pid = process.pid, "Engine already exited");
            state.release();
            return;
        }

        let pid = process.pid;
        if let Err(e) = self.process_control.terminate(pid) {
            warn!(pid = pid, error = %e, "Failed to signal engine");
        }

        let mut exited = process.exited.clone();
        let grace = Duration::from_secs(STOP_GRACE_PERIOD_SEC);
        let exited_in_time = tokio::time::timeout(grace, exited.wait_for(|done| *done))
            .await
            .is_ok();
        if !exited_in_time {
            warn!(pid = pid, "Engine did not exit within grace period, force killing");
            if let Err(e) = self.process_control.kill_tree(pid).await {
                warn!(pid = pid, error = %e, "Forced kill failed");
            }
        }

        if !process.has_exited() && self.process_control.is_alive(pid) {
            warn!(pid = pid, "Engine may still be running, retrying kill");
            if let Err(e) = self.process_control.kill_tree(pid).await {
                error!(pid = pid, error = %e, "Engine could not be killed");
            }
        }

        state.release();
        info!(pid = pid, "Engine stopped");
    }

    /// Stop then start; fails fast while another restart is in progress
    pub async fn restart(&self, config: &XrayConfig, debug_mode: bool) -> Result<()> {
        let _guard = RestartGuard::acquire(&self.restarting)?;
        info!("Restarting engine");
        self.stop().await;
        self.start(config, debug_mode).await
    }

    /// Kill stray engine processes: orphans, and children of this agent
    async fn cleanup_orphans(&self) {
        let processes = match self.process_control.find_processes(&self.executable_path).await {
            Ok(processes) => processes,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate engine processes");
                return;
            }
        };

        let own_pid = std::process::id();
        let mut killed = 0;
        for info in processes {
            if info.pid == own_pid {
                continue;
            }
            let reason = if self.process_control.is_orphaned(&info) {
                "orphaned engine process"
            } else if info.ppid == own_pid {
                "engine process left behind by this agent"
            } else {
                continue;
            };

            warn!(pid = info.pid, ppid = info.ppid, reason = reason, "Killing stray engine process");
            match self.process_control.kill_tree(info.pid).await {
                Ok(()) => killed += 1,
                Err(e) => warn!(pid = info.pid, error = %e, "Failed to kill stray engine process"),
            }
        }

        if killed > 0 {
            info!(count = killed, "Cleaned up stray engine processes");
        }
    }

    async fn write_generated_config(&self, document: &[u8]) -> Result<()> {
        let value: serde_json::Value = serde_json::from_slice(document)
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;
        let pretty = serde_json::to_vec_pretty(&value)
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;

        tokio::fs::create_dir_all(&self.generated_config_path)
            .await
            .map_err(|e| DomainError::Io(format!("failed to create config directory: {}", e)))?;
        let path = self.generated_config_path.join(GENERATED_CONFIG_FILE);
        tokio::fs::write(&path, pretty).await?;
        debug!(path = %path.display(), "Generated config written");
        Ok(())
    }
}

struct RestartGuard<'a>(&'a AtomicBool);

impl<'a> RestartGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| DomainError::AlreadyRestarting)?;
        Ok(Self(flag))
    }
}

impl Drop for RestartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Version reported by `<executable> version`
pub fn parse_version(output: &str) -> Option<String> {
    VERSION_PATTERN
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn query_version(executable: &Path) -> Result<String> {
    let output = Command::new(executable)
        .arg("version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| DomainError::SpawnFailed(format!("{}: {}", executable.display(), e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version(&stdout).ok_or_else(|| DomainError::VersionUnparsable(stdout.trim().to_string()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

async fn write_config(stdin: Option<tokio::process::ChildStdin>, bytes: &[u8]) -> std::io::Result<()> {
    let mut stdin = stdin.ok_or_else(|| std::io::Error::other("engine stdin unavailable"))?;
    stdin.write_all(bytes).await?;
    stdin.shutdown().await
}

/// Waits for the child so it never lingers as a zombie; kills it on cancellation
async fn reap(mut child: Child, exited: watch::Sender<bool>, cancel: CancellationToken) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => info!(status = %status, "Engine process exited"),
            Err(e) => warn!(error = %e, "Failed to wait for engine process"),
        },
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
        }
    }
    let _ = exited.send(true);
}

/// Forward each output line to the live tail (dropping it if full) and the log files
async fn capture_output<R>(
    pipe: R,
    logger: Arc<CoreLogger>,
    tail: mpsc::Sender<String>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                logger.log(&line);
                let _ = tail.try_send(line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Engine output closed");
                break;
            }
        }
    }
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn isolate_process_group(cmd: &mut Command) {
    use windows::Win32::System::Threading::CREATE_NEW_PROCESS_GROUP;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP.0);
}
