// services/transaction_log.rs
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Append-only JSON Lines audit trail of raw provider responses.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    path: PathBuf,
}

impl TransactionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TransactionLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a raw response under a label, e.g. `"STK Push Response"`.
    pub async fn record(&self, kind: &str, data: &Value) {
        let mut entry = Map::new();
        entry.insert("type".to_string(), Value::String(kind.to_string()));
        entry.insert("data".to_string(), data.clone());
        self.log(entry).await;
    }

    /// Stamps the entry and appends it as one line. Failures are reported and
    /// swallowed so auditing never changes a transaction outcome.
    pub async fn log(&self, mut entry: Map<String, Value>) {
        entry.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        let mut line = match serde_json::to_vec(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("Error encoding log entry: {}", e);
                return;
            }
        };
        line.push(b'\n');

        let mut file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                warn!("Error opening log file {}: {}", self.path.display(), e);
                return;
            }
        };

        if let Err(e) = file.write_all(&line).await {
            warn!("Error writing to log file {}: {}", self.path.display(), e);
            return;
        }
        if let Err(e) = file.flush().await {
            warn!("Error flushing log file {}: {}", self.path.display(), e);
            return;
        }
        debug!("Logged entry to {}", self.path.display());
    }

    /// Parses every entry back. A missing file reads as an empty log.
    pub async fn read_entries(&self) -> std::io::Result<Vec<Map<String, Value>>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })
            .collect()
    }
}
