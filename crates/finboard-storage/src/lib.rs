//! Durable state for Finboard: store traits, Postgres and in-memory backends.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finboard_core::{
    Checkpoint, SyncLogEntry, SyncLogStatus, TokenConfig, Transaction, TransactionKind,
    FALLBACK_EXPENSE_CATEGORY, FALLBACK_INCOME_CATEGORY,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "finboard-storage";

/// Upper bound on rows per upsert statement; storage-layer payload limit,
/// not a correctness boundary.
pub const UPSERT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("running migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert-or-replace keyed by `(tenant_id, external_id)`, in chunks of
    /// [`UPSERT_CHUNK_SIZE`]. Idempotent; a chunk failure aborts the
    /// remaining chunks without rolling back earlier ones.
    async fn upsert_transactions(&self, records: &[Transaction]) -> Result<(), StorageError>;

    /// Pending records for a tenant in stable order: `transaction_date`
    /// ascending, `external_id` as tiebreak.
    async fn list_pending(&self, tenant_id: Uuid) -> Result<Vec<Transaction>, StorageError>;

    async fn count_pending(&self, tenant_id: Uuid) -> Result<usize, StorageError>;

    async fn count_transactions(&self, tenant_id: Uuid) -> Result<usize, StorageError>;

    async fn delete_transactions(&self, tenant_id: Uuid) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, tenant_id: Uuid) -> Result<Option<Checkpoint>, StorageError>;

    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    async fn delete_checkpoint(&self, tenant_id: Uuid) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, tenant_id: Uuid) -> Result<Option<TokenConfig>, StorageError>;

    async fn put_token(&self, token: &TokenConfig) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Appends the entry and returns its assigned id.
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<i64, StorageError>;

    async fn finish_log(
        &self,
        id: i64,
        status: SyncLogStatus,
        fetched: usize,
        processed: usize,
        success_count: usize,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SyncLogEntry>, StorageError>;
}

/// Umbrella trait the pipeline holds a single `Arc<dyn Store>` of.
pub trait Store: TransactionStore + CheckpointStore + TokenStore + SyncLogStore {}

impl<T> Store for T where T: TransactionStore + CheckpointStore + TokenStore + SyncLogStore {}

fn kind_from_str(raw: &str) -> Result<TransactionKind, StorageError> {
    match raw {
        "income" => Ok(TransactionKind::Income),
        "expense" => Ok(TransactionKind::Expense),
        other => Err(StorageError::InvalidRow(format!(
            "unknown transaction kind {other:?}"
        ))),
    }
}

fn status_from_str(raw: &str) -> Result<SyncLogStatus, StorageError> {
    match raw {
        "running" => Ok(SyncLogStatus::Running),
        "completed" => Ok(SyncLogStatus::Completed),
        "timeout" => Ok(SyncLogStatus::Timeout),
        "failed" => Ok(SyncLogStatus::Failed),
        other => Err(StorageError::InvalidRow(format!(
            "unknown sync log status {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and applies embedded migrations (idempotent).
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_transaction(row: &PgRow) -> Result<Transaction, StorageError> {
        let kind: String = row.try_get("kind")?;
        Ok(Transaction {
            tenant_id: row.try_get("tenant_id")?,
            external_id: row.try_get("external_id")?,
            kind: kind_from_str(&kind)?,
            amount: row.try_get("amount")?,
            description: row.try_get("description")?,
            transaction_date: row.try_get("transaction_date")?,
            status: row.try_get("status")?,
            entity_name: row.try_get("entity_name")?,
            category_name: row.try_get("category_name")?,
            category_missing: row.try_get("category_missing")?,
            raw_data: row.try_get("raw_data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn upsert_transactions(&self, records: &[Transaction]) -> Result<(), StorageError> {
        for chunk in records.chunks(UPSERT_CHUNK_SIZE) {
            debug!(rows = chunk.len(), "upserting transaction chunk");
            let mut qb = QueryBuilder::<sqlx::Postgres>::new(
                "INSERT INTO transactions (tenant_id, external_id, kind, amount, description, \
                 transaction_date, status, entity_name, category_name, category_missing, \
                 raw_data, created_at, updated_at) ",
            );
            qb.push_values(chunk, |mut b, tx| {
                b.push_bind(tx.tenant_id)
                    .push_bind(&tx.external_id)
                    .push_bind(tx.kind.as_str())
                    .push_bind(tx.amount)
                    .push_bind(&tx.description)
                    .push_bind(tx.transaction_date)
                    .push_bind(&tx.status)
                    .push_bind(&tx.entity_name)
                    .push_bind(&tx.category_name)
                    .push_bind(tx.category_missing)
                    .push_bind(&tx.raw_data)
                    .push_bind(tx.created_at)
                    .push_bind(tx.updated_at);
            });
            qb.push(
                " ON CONFLICT (tenant_id, external_id) DO UPDATE SET \
                 kind = EXCLUDED.kind, amount = EXCLUDED.amount, \
                 description = EXCLUDED.description, \
                 transaction_date = EXCLUDED.transaction_date, \
                 status = EXCLUDED.status, entity_name = EXCLUDED.entity_name, \
                 category_name = EXCLUDED.category_name, \
                 category_missing = EXCLUDED.category_missing, \
                 raw_data = EXCLUDED.raw_data, updated_at = EXCLUDED.updated_at",
            );
            qb.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn list_pending(&self, tenant_id: Uuid) -> Result<Vec<Transaction>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, external_id, kind, amount, description, transaction_date,
                   status, entity_name, category_name, category_missing, raw_data,
                   created_at, updated_at
              FROM transactions
             WHERE tenant_id = $1
               AND NOT category_missing
               AND category_name IN ($2, $3)
             ORDER BY transaction_date ASC, external_id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(FALLBACK_INCOME_CATEGORY)
        .bind(FALLBACK_EXPENSE_CATEGORY)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    async fn count_pending(&self, tenant_id: Uuid) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
              FROM transactions
             WHERE tenant_id = $1
               AND NOT category_missing
               AND category_name IN ($2, $3)
            "#,
        )
        .bind(tenant_id)
        .bind(FALLBACK_INCOME_CATEGORY)
        .bind(FALLBACK_EXPENSE_CATEGORY)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn count_transactions(&self, tenant_id: Uuid) -> Result<usize, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn delete_transactions(&self, tenant_id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM transactions WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PgStore {
    async fn get_checkpoint(&self, tenant_id: Uuid) -> Result<Option<Checkpoint>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, last_processed_index, total_transactions, success_count,
                   started_at, updated_at
              FROM sync_checkpoints
             WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let last_processed_index: i64 = row.try_get("last_processed_index")?;
            let total_transactions: i64 = row.try_get("total_transactions")?;
            let success_count: i64 = row.try_get("success_count")?;
            Ok(Checkpoint {
                tenant_id: row.try_get("tenant_id")?,
                last_processed_index: last_processed_index as usize,
                total_transactions: total_transactions as usize,
                success_count: success_count as usize,
                started_at: row.try_get("started_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO sync_checkpoints (tenant_id, last_processed_index, total_transactions,
                                          success_count, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id) DO UPDATE SET
                last_processed_index = EXCLUDED.last_processed_index,
                total_transactions = EXCLUDED.total_transactions,
                success_count = EXCLUDED.success_count,
                started_at = EXCLUDED.started_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(checkpoint.tenant_id)
        .bind(checkpoint.last_processed_index as i64)
        .bind(checkpoint.total_transactions as i64)
        .bind(checkpoint.success_count as i64)
        .bind(checkpoint.started_at)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_checkpoint(&self, tenant_id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sync_checkpoints WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn get_token(&self, tenant_id: Uuid) -> Result<Option<TokenConfig>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, access_token, refresh_token, expires_at, updated_by, updated_at
              FROM token_configs
             WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(TokenConfig {
                tenant_id: row.try_get("tenant_id")?,
                access_token: row.try_get("access_token")?,
                refresh_token: row.try_get("refresh_token")?,
                expires_at: row.try_get("expires_at")?,
                updated_by: row.try_get("updated_by")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn put_token(&self, token: &TokenConfig) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO token_configs (tenant_id, access_token, refresh_token, expires_at,
                                       updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tenant_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(token.tenant_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .bind(&token.updated_by)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SyncLogStore for PgStore {
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<i64, StorageError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sync_logs (tenant_id, round, status, fetched, processed,
                                   success_count, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(entry.tenant_id)
        .bind(entry.round as i32)
        .bind(entry.status.as_str())
        .bind(entry.fetched as i64)
        .bind(entry.processed as i64)
        .bind(entry.success_count as i64)
        .bind(entry.started_at)
        .bind(entry.finished_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn finish_log(
        &self,
        id: i64,
        status: SyncLogStatus,
        fetched: usize,
        processed: usize,
        success_count: usize,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE sync_logs
               SET status = $2, fetched = $3, processed = $4, success_count = $5,
                   finished_at = $6
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(fetched as i64)
        .bind(processed as i64)
        .bind(success_count as i64)
        .bind(finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SyncLogEntry>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, round, status, fetched, processed, success_count,
                   started_at, finished_at
              FROM sync_logs
             WHERE tenant_id = $1
             ORDER BY started_at DESC, id DESC
             LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                let round: i32 = row.try_get("round")?;
                let fetched: i64 = row.try_get("fetched")?;
                let processed: i64 = row.try_get("processed")?;
                let success_count: i64 = row.try_get("success_count")?;
                Ok(SyncLogEntry {
                    id: row.try_get("id")?,
                    tenant_id: row.try_get("tenant_id")?,
                    round: round as u32,
                    status: status_from_str(&status)?,
                    fetched: fetched as usize,
                    processed: processed as usize,
                    success_count: success_count as usize,
                    started_at: row.try_get("started_at")?,
                    finished_at: row.try_get("finished_at")?,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// In-memory backend (tests, local demo runs)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemInner {
    transactions: HashMap<(Uuid, String), Transaction>,
    checkpoints: HashMap<Uuid, Checkpoint>,
    tokens: HashMap<Uuid, TokenConfig>,
    logs: Vec<SyncLogEntry>,
    next_log_id: i64,
}

/// In-memory [`Store`] with the same upsert/ordering semantics as Postgres.
#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemStore {
    async fn upsert_transactions(&self, records: &[Transaction]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        for tx in records {
            let key = (tx.tenant_id, tx.external_id.clone());
            let mut replacement = tx.clone();
            if let Some(existing) = inner.transactions.get(&key) {
                replacement.created_at = existing.created_at;
            }
            inner.transactions.insert(key, replacement);
        }
        Ok(())
    }

    async fn list_pending(&self, tenant_id: Uuid) -> Result<Vec<Transaction>, StorageError> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|tx| tx.tenant_id == tenant_id && tx.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        Ok(pending)
    }

    async fn count_pending(&self, tenant_id: Uuid) -> Result<usize, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .values()
            .filter(|tx| tx.tenant_id == tenant_id && tx.is_pending())
            .count())
    }

    async fn count_transactions(&self, tenant_id: Uuid) -> Result<usize, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .values()
            .filter(|tx| tx.tenant_id == tenant_id)
            .count())
    }

    async fn delete_transactions(&self, tenant_id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.transactions.retain(|(tenant, _), _| *tenant != tenant_id);
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemStore {
    async fn get_checkpoint(&self, tenant_id: Uuid) -> Result<Option<Checkpoint>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.checkpoints.get(&tenant_id).cloned())
    }

    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner
            .checkpoints
            .insert(checkpoint.tenant_id, checkpoint.clone());
        Ok(())
    }

    async fn delete_checkpoint(&self, tenant_id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.checkpoints.remove(&tenant_id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemStore {
    async fn get_token(&self, tenant_id: Uuid) -> Result<Option<TokenConfig>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.tokens.get(&tenant_id).cloned())
    }

    async fn put_token(&self, token: &TokenConfig) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.tokens.insert(token.tenant_id, token.clone());
        Ok(())
    }
}

#[async_trait]
impl SyncLogStore for MemStore {
    async fn append_log(&self, entry: &SyncLogEntry) -> Result<i64, StorageError> {
        let mut inner = self.inner.lock().await;
        inner.next_log_id += 1;
        let id = inner.next_log_id;
        let mut entry = entry.clone();
        entry.id = id;
        inner.logs.push(entry);
        Ok(id)
    }

    async fn finish_log(
        &self,
        id: i64,
        status: SyncLogStatus,
        fetched: usize,
        processed: usize,
        success_count: usize,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.logs.iter_mut().find(|e| e.id == id) {
            entry.status = status;
            entry.fetched = fetched;
            entry.processed = processed;
            entry.success_count = success_count;
            entry.finished_at = Some(finished_at);
        }
        Ok(())
    }

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        limit: usize,
    ) -> Result<Vec<SyncLogEntry>, StorageError> {
        let inner = self.inner.lock().await;
        let mut logs: Vec<SyncLogEntry> = inner
            .logs
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        logs.truncate(limit);
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().unwrap()
    }

    fn mk_tx(tenant: Uuid, kind: TransactionKind, source_id: i64, date: NaiveDate) -> Transaction {
        Transaction {
            tenant_id: tenant,
            external_id: kind.external_id(source_id),
            kind,
            amount: 120.0,
            description: format!("record {source_id}"),
            transaction_date: date,
            status: "open".into(),
            entity_name: "Acme School".into(),
            category_name: kind.fallback_category().into(),
            category_missing: false,
            raw_data: serde_json::json!({"id": source_id}),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_last_write_wins() {
        let store = MemStore::new();
        let tenant = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();

        let first = mk_tx(tenant, TransactionKind::Income, 1, date);
        store.upsert_transactions(&[first.clone()]).await.unwrap();

        let mut second = first.clone();
        second.amount = 99.0;
        second.category_name = "Tuition".into();
        store.upsert_transactions(&[second]).await.unwrap();

        assert_eq!(store.count_transactions(tenant).await.unwrap(), 1);
        assert_eq!(store.count_pending(tenant).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pending_list_is_ordered_and_excludes_terminal_records() {
        let store = MemStore::new();
        let tenant = Uuid::new_v4();
        let feb = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let jan = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        let late = mk_tx(tenant, TransactionKind::Income, 2, feb);
        let early = mk_tx(tenant, TransactionKind::Expense, 1, jan);
        let mut missing = mk_tx(tenant, TransactionKind::Income, 3, jan);
        missing.category_missing = true;
        let mut enriched = mk_tx(tenant, TransactionKind::Expense, 4, jan);
        enriched.category_name = "Rent".into();

        store
            .upsert_transactions(&[late.clone(), early.clone(), missing, enriched])
            .await
            .unwrap();

        let pending = store.list_pending(tenant).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].external_id, early.external_id);
        assert_eq!(pending[1].external_id, late.external_id);
    }

    #[tokio::test]
    async fn checkpoint_roundtrip_and_delete() {
        let store = MemStore::new();
        let tenant = Uuid::new_v4();
        assert!(store.get_checkpoint(tenant).await.unwrap().is_none());

        let mut ckpt = Checkpoint::new(tenant, 200, ts());
        store.put_checkpoint(&ckpt).await.unwrap();

        ckpt.last_processed_index = 50;
        ckpt.success_count = 48;
        store.put_checkpoint(&ckpt).await.unwrap();

        let loaded = store.get_checkpoint(tenant).await.unwrap().unwrap();
        assert_eq!(loaded.last_processed_index, 50);
        assert_eq!(loaded.total_transactions, 200);

        store.delete_checkpoint(tenant).await.unwrap();
        assert!(store.get_checkpoint(tenant).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_log_append_and_finish() {
        let store = MemStore::new();
        let tenant = Uuid::new_v4();
        let entry = SyncLogEntry {
            id: 0,
            tenant_id: tenant,
            round: 1,
            status: SyncLogStatus::Running,
            fetched: 0,
            processed: 0,
            success_count: 0,
            started_at: ts(),
            finished_at: None,
        };
        let id = store.append_log(&entry).await.unwrap();
        store
            .finish_log(id, SyncLogStatus::Completed, 200, 200, 199, ts())
            .await
            .unwrap();

        let logs = store.list_logs(tenant, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncLogStatus::Completed);
        assert_eq!(logs[0].success_count, 199);
        assert!(logs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn delete_transactions_only_touches_one_tenant() {
        let store = MemStore::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        store
            .upsert_transactions(&[
                mk_tx(tenant_a, TransactionKind::Income, 1, date),
                mk_tx(tenant_b, TransactionKind::Income, 1, date),
            ])
            .await
            .unwrap();

        store.delete_transactions(tenant_a).await.unwrap();
        assert_eq!(store.count_transactions(tenant_a).await.unwrap(), 0);
        assert_eq!(store.count_transactions(tenant_b).await.unwrap(), 1);
    }
}
