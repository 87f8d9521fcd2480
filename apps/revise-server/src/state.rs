//! Application state for the RevisePDF server

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use quota_engine::{QuotaEngine, SqliteBackend, StorageBackend};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub quota: QuotaEngine,
    /// Processing timeout in milliseconds
    pub timeout_ms: u64,
    /// Credential for administrative routes; `None` disables them
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Open the SQLite database at `database_url`, or the default data-dir location
    pub async fn new(database_url: Option<String>, timeout_ms: u64) -> Result<Self> {
        let url = database_url.unwrap_or_else(default_database_url);
        let backend = SqliteBackend::connect(&url).await?;
        Ok(Self::with_backend(Arc::new(backend), timeout_ms))
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>, timeout_ms: u64) -> Self {
        Self {
            quota: QuotaEngine::new(backend),
            timeout_ms,
            admin_token: None,
        }
    }

    /// Enable administrative routes for callers presenting `token`
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty()).map(Arc::from);
        self
    }
}

fn default_database_url() -> String {
    let data_dir = data_dir().unwrap_or_else(|| PathBuf::from("."));
    database_url_in(&data_dir)
}

/// SQLite URL for `revise.db` under `<base>/revise-server`, creating the directory
fn database_url_in(base: &Path) -> String {
    let dir = base.join("revise-server");
    std::fs::create_dir_all(&dir).ok();
    format!("sqlite:{}/revise.db?mode=rwc", dir.display())
}

fn data_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        return std::env::var_os("APPDATA").map(PathBuf::from);
    }
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
}
