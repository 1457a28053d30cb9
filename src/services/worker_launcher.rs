//! services/worker_launcher.rs
//! Lanza `mailout-worker <id>` como proceso independiente del servidor.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::config::app_config::AppConfig;

#[derive(Clone, Debug)]
pub struct WorkerLauncher {
    worker_bin: Option<PathBuf>,
    data_dir: PathBuf,
    settings_path: PathBuf,
}

impl WorkerLauncher {
    pub fn new(config: &AppConfig) -> Self {
        WorkerLauncher {
            worker_bin: config.worker_bin.clone(),
            data_dir: config.data_dir.clone(),
            settings_path: config.settings_path.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.worker_bin.is_some()
    }

    /// Devuelve el pid del worker, o `None` si no hay binario configurado.
    /// El proceso no se espera: sobrevive al request y al servidor.
    pub fn launch(&self, campaign_id: &str) -> Result<Option<u32>> {
        let Some(bin) = &self.worker_bin else {
            log::warn!(
                "(launch) Sin binario de worker; la campaña {} queda en espera",
                campaign_id
            );
            return Ok(None);
        };

        let mut cmd = Command::new(bin);
        cmd.arg(campaign_id)
            .env("MAILOUT_DATA_DIR", &self.data_dir)
            .env("MAILOUT_SETTINGS", &self.settings_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        // Grupo de procesos propio: un Ctrl+C al servidor no mata al worker.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn worker {:?}", bin))?;

        let pid = child.id();
        log::info!(
            "(launch) Worker lanzado para campaña {} (pid {:?})",
            campaign_id,
            pid
        );
        Ok(pid)
    }
}
