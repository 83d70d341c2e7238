//! Audit Log - Append-only JSONL Audit Records
//!
//! Persists audit records to daily JSONL files named
//! `audit/YYYY-MM-DD.jsonl`. Each line is a self-contained JSON object,
//! so files can be streamed, grepped and rotated without parsing state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::ports::{AuditRecord, AuditSink};

/// Daily-rotated JSONL audit sink.
pub struct JsonlAuditLog {
    audit_dir: PathBuf,
    /// Serializes appends so concurrent requests never interleave lines.
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub async fn new(data_dir: &str) -> Result<Self> {
        let audit_dir = Path::new(data_dir).join("audit");
        fs::create_dir_all(&audit_dir)
            .await
            .context("Failed to create audit directory")?;
        Ok(Self {
            audit_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.audit_dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Read back every record of one day, skipping malformed lines.
    pub async fn load_day(&self, date: NaiveDate) -> Result<Vec<AuditRecord>> {
        let path = self.day_path(date);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping malformed audit line"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let path = self.day_path(record.at.date_naive());
        let mut json = serde_json::to_string(record).context("Failed to serialize audit record")?;
        json.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open audit log file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write audit record")?;
        file.flush().await.context("Failed to flush audit log")?;
        Ok(())
    }
}

/// Audit sink that keeps records in memory. Used by tests and when
/// persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(action: &str) -> AuditRecord {
        AuditRecord {
            at: Utc::now(),
            actor_uid: Some("staff-1".into()),
            actor_role: Some("org_staff".into()),
            action: action.into(),
            org_id: Some("coop-a".into()),
            bid_id: None,
            offer_id: None,
            status_code: 201,
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let dir = std::env::temp_dir().join(format!("coop-trade-audit-{}", uuid::Uuid::new_v4()));
        let log = JsonlAuditLog::new(&dir.to_string_lossy()).await.unwrap();

        let first = record("POST /trade/orgs/:org_id/bids");
        let second = record("GET /trade/bids/open");
        log.record(&first).await.unwrap();
        log.record(&second).await.unwrap();

        let loaded = log.load_day(first.at.date_naive()).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], first);
        assert_eq!(loaded[1].action, "GET /trade/bids/open");
    }
}
