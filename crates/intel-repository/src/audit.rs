use intel_core::{IntelError, IntelResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Serializes audit writes across the process so the read-prev-hash-then-
/// insert sequence can't race and fork the chain.
static AUDIT_WRITE_LOCK: Mutex<()> = Mutex::const_new(());

/// Appends one hash-chained audit entry. Each entry's hash covers the
/// previous entry's hash plus its own contents, forming an append-only
/// verifiable chain — the concrete shape behind §4.1's "append an audit
/// event on every mutation".
pub async fn log_audit(
    pool: &sqlx::AnyPool,
    event_type: &str,
    entity_type: &str,
    entity_id: &str,
    detail: &str,
) -> IntelResult<()> {
    let _guard = AUDIT_WRITE_LOCK.lock().await;

    let result: Result<(), sqlx::Error> = async {
        let mut tx = pool.begin().await?;

        let (prev_hash, prev_seq): (String, i64) = sqlx::query_as(
            "SELECT COALESCE(entry_hash, ''), COALESCE(sequence_number, 0)
             FROM audit_log ORDER BY sequence_number DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or_default();

        let sequence_number = prev_seq + 1;
        let timestamp = chrono::Utc::now().to_rfc3339();

        let entry_hash = compute_entry_hash(
            &prev_hash,
            event_type,
            entity_type,
            entity_id,
            detail,
            &timestamp,
        );

        sqlx::query(
            "INSERT INTO audit_log
                (sequence_number, event_type, entity_type, entity_id, detail, prev_hash, entry_hash, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sequence_number)
        .bind(event_type)
        .bind(entity_type)
        .bind(entity_id)
        .bind(detail)
        .bind(&prev_hash)
        .bind(&entry_hash)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
    .await;

    result.map_err(|e| IntelError::Repository(format!("audit log write failed: {e}")))
}

fn compute_entry_hash(
    prev_hash: &str,
    event_type: &str,
    entity_type: &str,
    entity_id: &str,
    detail: &str,
    timestamp: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        prev_hash,
        event_type,
        entity_type,
        entity_id,
        detail,
        timestamp,
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditChainVerification {
    pub is_valid: bool,
    pub total_entries: i64,
    pub first_broken_sequence: Option<i64>,
    pub message: String,
}

#[derive(sqlx::FromRow)]
struct AuditChainEntry {
    sequence_number: i64,
    event_type: String,
    entity_type: String,
    entity_id: String,
    detail: String,
    prev_hash: String,
    entry_hash: String,
    created_at: String,
}

pub async fn verify_audit_chain(pool: &sqlx::AnyPool) -> IntelResult<AuditChainVerification> {
    let entries: Vec<AuditChainEntry> = sqlx::query_as(
        "SELECT sequence_number, event_type, entity_type, entity_id, detail, prev_hash, entry_hash, created_at
         FROM audit_log ORDER BY sequence_number ASC",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| IntelError::Repository(format!("audit chain read failed: {e}")))?;

    if entries.is_empty() {
        return Ok(AuditChainVerification {
            is_valid: true,
            total_entries: 0,
            first_broken_sequence: None,
            message: "no audit entries".to_string(),
        });
    }

    let mut expected_prev = String::new();
    for entry in &entries {
        if entry.prev_hash != expected_prev {
            return Ok(AuditChainVerification {
                is_valid: false,
                total_entries: entries.len() as i64,
                first_broken_sequence: Some(entry.sequence_number),
                message: format!("chain broken at sequence {}", entry.sequence_number),
            });
        }
        let recomputed = compute_entry_hash(
            &entry.prev_hash,
            &entry.event_type,
            &entry.entity_type,
            &entry.entity_id,
            &entry.detail,
            &entry.created_at,
        );
        if recomputed != entry.entry_hash {
            return Ok(AuditChainVerification {
                is_valid: false,
                total_entries: entries.len() as i64,
                first_broken_sequence: Some(entry.sequence_number),
                message: format!("hash mismatch at sequence {}", entry.sequence_number),
            });
        }
        expected_prev = entry.entry_hash.clone();
    }

    Ok(AuditChainVerification {
        is_valid: true,
        total_entries: entries.len() as i64,
        first_broken_sequence: None,
        message: format!("all {} entries verified", entries.len()),
    })
}
