//! Core domain model for Finboard: transactions, checkpoints, tokens, sync results.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "finboard-core";

/// Placeholder category assigned to income records at bulk-import time.
pub const FALLBACK_INCOME_CATEGORY: &str = "fallback-income-category";
/// Placeholder category assigned to expense records at bulk-import time.
pub const FALLBACK_EXPENSE_CATEGORY: &str = "fallback-expense-category";

/// Access tokens are refreshed proactively this long before expiry.
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn fallback_category(&self) -> &'static str {
        match self {
            TransactionKind::Income => FALLBACK_INCOME_CATEGORY,
            TransactionKind::Expense => FALLBACK_EXPENSE_CATEGORY,
        }
    }

    /// Source-side record type this kind maps from.
    pub fn source_prefix(&self) -> &'static str {
        match self {
            TransactionKind::Income => "receivable",
            TransactionKind::Expense => "payable",
        }
    }

    pub fn external_id(&self, source_id: i64) -> String {
        format!("{}_{}", self.source_prefix(), source_id)
    }

    /// Splits `receivable_<id>` / `payable_<id>` back into kind + source id.
    pub fn parse_external_id(external_id: &str) -> Option<(TransactionKind, i64)> {
        let (prefix, id) = external_id.split_once('_')?;
        let kind = match prefix {
            "receivable" => TransactionKind::Income,
            "payable" => TransactionKind::Expense,
            _ => return None,
        };
        id.parse().ok().map(|id| (kind, id))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

/// Denormalized local copy of one external financial event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub tenant_id: Uuid,
    /// `<source-type>_<source-id>`; upsert conflict key together with the tenant.
    pub external_id: String,
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub transaction_date: NaiveDate,
    pub status: String,
    pub entity_name: String,
    pub category_name: String,
    /// Source system confirmed it has no category for this record; terminal.
    pub category_missing: bool,
    pub raw_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A record is pending while it still carries a fallback sentinel and the
    /// source has not been confirmed category-less.
    pub fn is_pending(&self) -> bool {
        !self.category_missing
            && (self.category_name == FALLBACK_INCOME_CATEGORY
                || self.category_name == FALLBACK_EXPENSE_CATEGORY)
    }
}

/// Durable enrichment progress marker; at most one per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub tenant_id: Uuid,
    /// Offset into the pending list this checkpoint's pass is walking.
    pub last_processed_index: usize,
    pub total_transactions: usize,
    pub success_count: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(tenant_id: Uuid, total_transactions: usize, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            last_processed_index: 0,
            total_transactions,
            success_count: 0,
            started_at: now,
            updated_at: now,
        }
    }
}

/// Per-tenant OAuth2 token pair for the external bookkeeping API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub tenant_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl TokenConfig {
    /// True when the access token must not be used without refreshing first.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - chrono::Duration::seconds(TOKEN_EXPIRY_BUFFER_SECS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Running,
    Completed,
    Timeout,
    Failed,
}

impl SyncLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Running => "running",
            SyncLogStatus::Completed => "completed",
            SyncLogStatus::Timeout => "timeout",
            SyncLogStatus::Failed => "failed",
        }
    }
}

/// Append-only observability record, one per tenant per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub tenant_id: Uuid,
    pub round: u32,
    pub status: SyncLogStatus,
    pub fetched: usize,
    pub processed: usize,
    pub success_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
    pub success_count: usize,
    pub pending_count: usize,
}

impl SyncProgress {
    pub fn new(processed: usize, total: usize, success_count: usize, pending_count: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (processed as f64 / total as f64) * 100.0
        };
        Self {
            processed,
            total,
            percentage,
            success_count,
            pending_count,
        }
    }
}

/// Result payload returned by one pipeline round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunResult {
    pub success: bool,
    pub completed: bool,
    pub message: String,
    pub progress: SyncProgress,
}

/// Tenant-level enrichment state, derived from checkpoint presence and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    NotStarted,
    InProgress,
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn external_id_roundtrip() {
        let id = TransactionKind::Income.external_id(4711);
        assert_eq!(id, "receivable_4711");
        assert_eq!(
            TransactionKind::parse_external_id(&id),
            Some((TransactionKind::Income, 4711))
        );
        assert_eq!(
            TransactionKind::parse_external_id("payable_9"),
            Some((TransactionKind::Expense, 9))
        );
        assert_eq!(TransactionKind::parse_external_id("invoice_9"), None);
        assert_eq!(TransactionKind::parse_external_id("receivable_x"), None);
    }

    #[test]
    fn token_refresh_buffer() {
        let expires_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap();
        let config = TokenConfig {
            tenant_id: Uuid::new_v4(),
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at,
            updated_by: "sync".into(),
            updated_at: expires_at,
        };
        let well_before = expires_at - chrono::Duration::minutes(10);
        let inside_buffer = expires_at - chrono::Duration::minutes(4);
        assert!(!config.needs_refresh(well_before));
        assert!(config.needs_refresh(inside_buffer));
        assert!(config.needs_refresh(expires_at));
    }

    #[test]
    fn pending_is_inferred_from_sentinel_and_marker() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).single().unwrap();
        let mut tx = Transaction {
            tenant_id: Uuid::new_v4(),
            external_id: "receivable_1".into(),
            kind: TransactionKind::Income,
            amount: 10.0,
            description: String::new(),
            transaction_date: now.date_naive(),
            status: "open".into(),
            entity_name: String::new(),
            category_name: FALLBACK_INCOME_CATEGORY.into(),
            category_missing: false,
            raw_data: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        };
        assert!(tx.is_pending());

        tx.category_missing = true;
        assert!(!tx.is_pending());

        tx.category_missing = false;
        tx.category_name = "Tuition".into();
        assert!(!tx.is_pending());
    }

    #[test]
    fn progress_percentage_handles_empty_total() {
        let empty = SyncProgress::new(0, 0, 0, 0);
        assert_eq!(empty.percentage, 100.0);
        let half = SyncProgress::new(50, 200, 48, 150);
        assert_eq!(half.percentage, 25.0);
    }
}
