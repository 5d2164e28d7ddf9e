//! Browser process launch
//!
//! The browser is started as a child process with remote debugging enabled.
//! A supervisor task owns the child and publishes its state on a watch
//! channel, so an early exit is visible to the session instead of lost.

use crate::config::AutomationConfig;
use crate::error::{ChatError, Result};
use std::net::TcpListener;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Ask the OS for a free local port.
///
/// The probe socket is closed before returning, so another process could
/// still take the port before the browser binds it.
pub fn find_available_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| ChatError::PortAllocation(e.to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|e| ChatError::PortAllocation(e.to_string()))?
        .port();
    Ok(port)
}

/// Last known state of the browser process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(ExitStatus),
    /// Waiting on the child failed
    Lost(String),
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

/// A browser started with `--remote-debugging-port`
///
/// Dropping the handle without [`BrowserProcess::shutdown`] also kills the browser.
pub struct BrowserProcess {
    state_rx: watch::Receiver<ProcessState>,
    kill_tx: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<()>,
}

impl BrowserProcess {
    /// Command-line arguments for the browser
    pub fn args(config: &AutomationConfig, port: u16) -> Vec<String> {
        vec![
            format!("--remote-debugging-port={}", port),
            format!("--user-data-dir={}", config.user_data_dir.display()),
            config.url.clone(),
        ]
    }

    /// Spawn the browser and start supervising it
    pub fn launch(config: &AutomationConfig, port: u16) -> Result<Self> {
        let args = Self::args(config, port);
        log::info!("Launching {} {}", config.chrome_path, args.join(" "));

        let mut child = Command::new(&config.chrome_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ChatError::LaunchFailed(format!(
                    "{}: {}. \n\n\
                     Make sure a Chromium-based browser is installed, or pass its path with --chrome-path",
                    config.chrome_path, e
                ))
            })?;

        log::debug!("Browser pid {:?} on debug port {}", child.id(), port);
        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        let supervisor = tokio::spawn(async move {
            let state = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => ProcessState::Exited(status),
                    Err(e) => ProcessState::Lost(e.to_string()),
                },
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        log::warn!("Failed to kill browser process: {}", e);
                    }
                    match child.wait().await {
                        Ok(status) => ProcessState::Exited(status),
                        Err(e) => ProcessState::Lost(e.to_string()),
                    }
                }
            };

            match &state {
                ProcessState::Exited(status) if status.success() => {
                    log::info!("Browser process exited")
                }
                other => log::warn!("Browser process ended: {:?}", other),
            }
            let _ = state_tx.send(state);
        });

        Ok(Self {
            state_rx,
            kill_tx: Some(kill_tx),
            supervisor,
        })
    }

    pub fn state(&self) -> ProcessState {
        self.state_rx.borrow().clone()
    }

    /// Fail if the browser has already gone away
    pub fn ensure_running(&self) -> Result<()> {
        match self.state() {
            ProcessState::Running => Ok(()),
            ProcessState::Exited(status) => Err(ChatError::LaunchFailed(format!(
                "browser exited before the driver attached ({})",
                status
            ))),
            ProcessState::Lost(reason) => Err(ChatError::LaunchFailed(format!(
                "lost track of the browser process: {}",
                reason
            ))),
        }
    }

    /// Wait until the process is no longer running
    pub async fn wait(&mut self) -> ProcessState {
        let finished = match self.state_rx.wait_for(|state| !state.is_running()).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        finished.unwrap_or_else(|| self.state())
    }

    /// Give the browser `grace` to exit on its own, then kill it
    pub async fn shutdown(mut self, grace: Duration) -> ProcessState {
        if tokio::time::timeout(grace, self.wait()).await.is_err() {
            log::info!("Browser still running after {:?}, killing it", grace);
            if let Some(kill_tx) = self.kill_tx.take() {
                let _ = kill_tx.send(());
            }
        }

        let _ = (&mut self.supervisor).await;
        self.state()
    }
}
