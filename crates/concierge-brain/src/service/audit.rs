use std::path::PathBuf;

use concierge_core::error::{ConciergeError, Result};
use concierge_core::types::AuditEntry;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only JSON-lines record of questions answered by semantic matching.
pub struct AuditLog {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// An empty path disables the log.
    pub fn new(path: &str) -> Self {
        Self {
            path: (!path.is_empty()).then(|| PathBuf::from(path)),
            write_lock: Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub async fn record(&self, entry: &AuditEntry) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_string(entry)
            .map_err(|e| ConciergeError::Audit(format!("failed to encode entry: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ConciergeError::Audit(format!("failed to open {}: {e}", path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ConciergeError::Audit(format!("failed to write {}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| ConciergeError::Audit(format!("failed to flush {}: {e}", path.display())))?;
        Ok(())
    }
}
