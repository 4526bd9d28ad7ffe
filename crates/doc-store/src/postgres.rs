use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Document, DocumentKey, DocumentQuery, Result, StoreError, Version, WriteBatch, WriteOp,
    batch::validate_batch,
    store::{CommittedWrite, DocumentStore},
};

/// PostgreSQL-backed document store implementation.
///
/// Documents live in a single `documents` table keyed by `(collection, id)`.
/// A batch runs in one database transaction: target rows are locked with
/// `SELECT ... FOR UPDATE` in key order, preconditions are checked against
/// the locked versions, and only then are writes applied.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url` and wraps it.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            key: DocumentKey::new(
                row.try_get::<String, _>("collection")?,
                row.try_get::<String, _>("id")?,
            ),
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(&key.collection)
        .bind(&key.id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        // `body @> '{}'` matches every document, so an unfiltered query needs no special case.
        let rows = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&query.collection)
        .bind(query.filter_object())
        .bind(query.limit.map(|l| l as i64))
        .bind(query.offset.unwrap_or(0) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    #[tracing::instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<CommittedWrite>> {
        validate_batch(&batch)?;

        // Lock rows in key order so concurrent batches cannot deadlock
        let mut ops = batch.into_ops();
        ops.sort_by(|a, b| a.key().cmp(b.key()));

        let mut tx = self.pool.begin().await?;

        let mut current_versions = Vec::with_capacity(ops.len());
        for op in &ops {
            let key = op.key();
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT version FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
            )
            .bind(&key.collection)
            .bind(&key.id)
            .fetch_optional(&mut *tx)
            .await?;
            let current = current.map(Version::new);

            if !op.precondition().holds(current) {
                metrics::counter!("doc_store_conflicts_total").increment(1);
                return Err(StoreError::ConcurrencyConflict {
                    key: key.clone(),
                    expected: op.precondition(),
                    actual: current.unwrap_or(Version::initial()),
                });
            }
            current_versions.push(current);
        }

        let now = Utc::now();
        let mut written = Vec::with_capacity(ops.len());
        for (op, current) in ops.into_iter().zip(current_versions) {
            match op {
                WriteOp::Put {
                    key,
                    body,
                    precondition,
                } => {
                    let version = match current {
                        Some(current) => {
                            let next = current.next();
                            sqlx::query(
                                r#"
                                UPDATE documents
                                SET version = $3, body = $4, updated_at = $5
                                WHERE collection = $1 AND id = $2
                                "#,
                            )
                            .bind(&key.collection)
                            .bind(&key.id)
                            .bind(next.as_i64())
                            .bind(&body)
                            .bind(now)
                            .execute(&mut *tx)
                            .await?;
                            next
                        }
                        None => {
                            sqlx::query(
                                r#"
                                INSERT INTO documents (collection, id, version, body, updated_at)
                                VALUES ($1, $2, $3, $4, $5)
                                "#,
                            )
                            .bind(&key.collection)
                            .bind(&key.id)
                            .bind(Version::first().as_i64())
                            .bind(&body)
                            .bind(now)
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| {
                                // Another transaction inserted the row after our lock query
                                if let sqlx::Error::Database(ref db_err) = e
                                    && db_err.constraint() == Some("documents_pkey")
                                {
                                    metrics::counter!("doc_store_conflicts_total").increment(1);
                                    return StoreError::ConcurrencyConflict {
                                        key: key.clone(),
                                        expected: precondition,
                                        actual: Version::first(),
                                    };
                                }
                                StoreError::Database(e)
                            })?;
                            Version::first()
                        }
                    };
                    written.push(CommittedWrite { key, version });
                }
                WriteOp::Delete { key, .. } => {
                    if current.is_some() {
                        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                            .bind(&key.collection)
                            .bind(&key.id)
                            .execute(&mut *tx)
                            .await?;
                    }
                    written.push(CommittedWrite {
                        key,
                        version: Version::initial(),
                    });
                }
                WriteOp::Check { .. } => {}
            }
        }

        tx.commit().await?;
        Ok(written)
    }
}
