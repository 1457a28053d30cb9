//! config/app_config.rs
//! Configuración global del proceso, leída del entorno (.env vía dotenv).

use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: u16 = 5022;
pub const DEFAULT_LOG_LIMIT: u32 = 1000;
pub const WORKER_BIN_NAME: &str = "mailout-worker";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
    pub bind_host: String,
    pub bind_port: u16,
    /// Binario del worker; `None` desactiva el lanzamiento de procesos.
    pub worker_bin: Option<PathBuf>,
    pub log_limit: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("MAILOUT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let settings_path = env::var("MAILOUT_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("settings.json"));

        let bind_host =
            env::var("MAILOUT_BIND_HOST").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());

        let bind_port = parse_or(env::var("MAILOUT_BIND_PORT").ok(), DEFAULT_BIND_PORT);
        let log_limit = parse_or(env::var("MAILOUT_LOG_LIMIT").ok(), DEFAULT_LOG_LIMIT);

        let worker_bin = env::var("MAILOUT_WORKER_BIN")
            .map(PathBuf::from)
            .ok()
            .or_else(locate_worker_bin);

        AppConfig {
            data_dir,
            settings_path,
            bind_host,
            bind_port,
            worker_bin,
            log_limit,
        }
    }

    /// Ruta final del archivo SQLite: <data_dir>/campaigns.db
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("campaigns.db")
    }

    #[cfg(test)]
    pub fn for_data_dir(data_dir: &Path) -> Self {
        AppConfig {
            data_dir: data_dir.to_path_buf(),
            settings_path: data_dir.join("settings.json"),
            bind_host: DEFAULT_BIND_HOST.to_string(),
            bind_port: DEFAULT_BIND_PORT,
            worker_bin: None,
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Busca el worker junto al ejecutable actual y, si no, en el PATH.
fn locate_worker_bin() -> Option<PathBuf> {
    let sibling = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BIN_NAME)))
        .filter(|candidate| is_file(candidate));

    sibling.or_else(|| which::which(WORKER_BIN_NAME).ok())
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
