/// Miner process lifecycle: detect, start, and stop the miner by image name
/// using the host's tasklist/taskkill tooling.
use crate::config::MinerConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{info, warn};

/// Seam between the monitor/control surface and the host process tooling.
///
/// The miner counts as running only when both the UI process and its worker
/// are present simultaneously; a UI without a worker is a hung session.
#[async_trait]
pub trait MinerControl: Send + Sync {
    /// Check the host process table for both miner executables.
    async fn is_running(&self) -> Result<bool, ProcessError>;

    /// Launch the miner UI executable. Returns once the child is spawned;
    /// does not wait for it.
    async fn start(&self) -> Result<(), ProcessError>;

    /// Terminate the miner, escalating from graceful to forced kill.
    /// Residual failures are logged, never propagated.
    async fn stop(&self);
}

/// Windows implementation backed by tasklist and taskkill.
pub struct TaskController {
    ui_image: String,
    worker_image: String,
    install_subpath: PathBuf,
    fallback_exe: PathBuf,
}

impl TaskController {
    pub fn new(config: &MinerConfig) -> Self {
        Self {
            ui_image: config.ui_image.clone(),
            worker_image: config.worker_image.clone(),
            install_subpath: config.install_subpath.clone(),
            fallback_exe: config.fallback_exe.clone(),
        }
    }

    /// Resolve the miner UI executable path from the given home directory,
    /// falling back to the hardcoded install path when home is unknown.
    fn resolve_exe(&self, home: Option<PathBuf>) -> PathBuf {
        match home {
            Some(home) => home.join(&self.install_subpath).join(&self.ui_image),
            None => self.fallback_exe.clone(),
        }
    }
}

#[async_trait]
impl MinerControl for TaskController {
    async fn is_running(&self) -> Result<bool, ProcessError> {
        let output = Command::new("tasklist")
            .output()
            .await
            .map_err(|e| ProcessError::List { source: e })?;
        if !output.status.success() {
            return Err(ProcessError::List {
                source: std::io::Error::other(format!(
                    "tasklist exited with {}",
                    output.status
                )),
            });
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(both_present(&listing, &self.ui_image, &self.worker_image))
    }

    async fn start(&self) -> Result<(), ProcessError> {
        let exe = self.resolve_exe(dirs::home_dir());
        if !exe.exists() {
            return Err(ProcessError::NotInstalled { path: exe });
        }
        info!(path = %exe.display(), "starting miner");
        Command::new(&exe).spawn().map_err(|e| ProcessError::Spawn {
            path: exe,
            source: e,
        })?;
        Ok(())
    }

    async fn stop(&self) {
        info!(image = %self.ui_image, "stopping miner");
        match Command::new("taskkill")
            .args(["/IM", &self.ui_image])
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                let combined = String::from_utf8_lossy(&output.stdout);
                info!(image = %self.ui_image, output = %combined.trim(), "graceful termination");
                return;
            }
            Ok(output) => {
                let combined = String::from_utf8_lossy(&output.stdout);
                warn!(
                    image = %self.ui_image,
                    output = %combined.trim(),
                    "graceful stop failed, forcing termination"
                );
            }
            Err(e) => {
                warn!(image = %self.ui_image, error = %e, "graceful stop failed, forcing termination");
            }
        }

        // Graceful kill failed; force both the UI and the worker down.
        force_kill(&self.ui_image).await;
        force_kill(&self.worker_image).await;
    }
}

async fn force_kill(image: &str) {
    match Command::new("taskkill")
        .args(["/IM", image, "/F"])
        .output()
        .await
    {
        Ok(output) => {
            let combined = String::from_utf8_lossy(&output.stdout);
            info!(image, output = %combined.trim(), "forced termination");
        }
        Err(e) => warn!(image, error = %e, "forced termination failed"),
    }
}

/// True only when both image names appear in the process listing.
fn both_present(listing: &str, ui_image: &str, worker_image: &str) -> bool {
    listing.contains(ui_image) && listing.contains(worker_image)
}

/// Errors from host process operations.
#[derive(Debug)]
pub enum ProcessError {
    /// Could not enumerate the process table.
    List { source: std::io::Error },
    /// The miner executable is absent at the resolved install path.
    NotInstalled { path: PathBuf },
    /// The miner executable exists but could not be spawned.
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::List { source } => {
                write!(f, "failed to list host processes: {source}")
            }
            ProcessError::NotInstalled { path } => {
                write!(f, "miner is not installed at {}", path.display())
            }
            ProcessError::Spawn { path, source } => {
                write!(f, "failed to start miner {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::List { source } => Some(source),
            ProcessError::Spawn { source, .. } => Some(source),
            ProcessError::NotInstalled { .. } => None,
        }
    }
}
