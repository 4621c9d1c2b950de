//! Audit log for approval decisions
//!
//! Every resolved approval is recorded with the exact call it released.

use crate::models::{ApprovalRecord, ToolCall};
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, ApprovalRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store an approval record
    pub async fn record(&self, record: ApprovalRecord) -> Result<Uuid> {
        let audit_id = record.audit_id;
        let mut records = self.records.write().await;
        records.insert(audit_id, record);
        Ok(audit_id)
    }

    /// All records for a thread, oldest decision first
    pub async fn list_for_thread(&self, thread_id: &str) -> Result<Vec<ApprovalRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<ApprovalRecord> = records
            .values()
            .filter(|record| record.thread_id == thread_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.decided_at);

        Ok(items)
    }

    /// Verify a record's integrity via hash
    pub async fn verify_integrity(&self, audit_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        if let Some(record) = records.get(&audit_id) {
            Ok(compute_call_hash(&record.call) == record.call_hash)
        } else {
            Ok(false)
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute SHA256 hash of a tool call for integrity verification
/// Streams the JSON serialization into the hasher
pub fn compute_call_hash(call: &ToolCall) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), call).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn record(thread_id: &str, decision: &str, offset_secs: i64) -> ApprovalRecord {
        let call = ToolCall::new("buy_stocks", json!({"symbol": "AAPL", "quantity": 1}));
        let now = Utc::now();
        ApprovalRecord {
            audit_id: Uuid::new_v4(),
            thread_id: thread_id.to_string(),
            call_hash: compute_call_hash(&call),
            call,
            prompt: "Approve?".to_string(),
            decision: decision.to_string(),
            approved: decision == "yes",
            outcome: json!("done"),
            requested_at: now,
            decided_at: now + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let log = AuditLog::new();
        let later = record("t1", "no", 10);
        let earlier = record("t1", "yes", 0);
        log.record(later.clone()).await.unwrap();
        log.record(earlier.clone()).await.unwrap();
        log.record(record("t2", "yes", 5)).await.unwrap();

        let listed = log.list_for_thread("t1").await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|r| r.audit_id).collect();
        assert_eq!(ids, vec![earlier.audit_id, later.audit_id]);
        assert!(log.list_for_thread("t3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_integrity() {
        let log = AuditLog::new();
        let good = record("t1", "yes", 0);
        let mut tampered = record("t1", "yes", 1);
        tampered.call.args = json!({"symbol": "AAPL", "quantity": 1000});

        log.record(good.clone()).await.unwrap();
        log.record(tampered.clone()).await.unwrap();

        assert!(log.verify_integrity(good.audit_id).await.unwrap());
        assert!(!log.verify_integrity(tampered.audit_id).await.unwrap());
        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
    }

    #[test]
    fn test_hash_is_stable() {
        let call = ToolCall::new("buy_stocks", json!({"symbol": "AAPL"}));
        assert_eq!(compute_call_hash(&call), compute_call_hash(&call.clone()));
        assert_eq!(compute_call_hash(&call).len(), 64);
    }
}
