use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Document, DocumentStoreError, OutboxId, OutboxMessage, OutboxQuery, Result, Version,
    store::{DocumentStore, SaveOptions, validate_outbox_for_save},
};

/// PostgreSQL-backed document store implementation.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("document store migrations applied");
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            collection: row.try_get("collection")?,
            id: row.try_get("id")?,
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_outbox(row: PgRow) -> Result<OutboxMessage> {
        Ok(OutboxMessage {
            id: OutboxId::from_uuid(row.try_get::<Uuid, _>("id")?),
            collection: row.try_get("collection")?,
            document_id: row.try_get("document_id")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            published_at: row.try_get("published_at")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, document: Document) -> Result<Version> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, body, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&document.collection)
        .bind(&document.id)
        .bind(Version::first().as_i64())
        .bind(&document.body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DocumentStoreError::AlreadyExists {
                    collection: document.collection.clone(),
                    id: document.id.clone(),
                };
            }
            DocumentStoreError::Database(e)
        })?;

        Ok(Version::first())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT collection, id, version, body, updated_at
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    #[tracing::instrument(
        skip(self, document, options, outbox),
        fields(collection = %document.collection, id = %document.id)
    )]
    async fn save(
        &self,
        document: Document,
        options: SaveOptions,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        validate_outbox_for_save(&document, &outbox)?;

        let mut tx = self.pool.begin().await?;

        // Compare-and-swap on the version column
        let new_version: Option<i64> = match options.expected_version {
            Some(expected) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE documents
                    SET version = version + 1, body = $3, updated_at = $4
                    WHERE collection = $1 AND id = $2 AND version = $5
                    RETURNING version
                    "#,
                )
                .bind(&document.collection)
                .bind(&document.id)
                .bind(&document.body)
                .bind(Utc::now())
                .bind(expected.as_i64())
                .fetch_optional(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    r#"
                    UPDATE documents
                    SET version = version + 1, body = $3, updated_at = $4
                    WHERE collection = $1 AND id = $2
                    RETURNING version
                    "#,
                )
                .bind(&document.collection)
                .bind(&document.id)
                .bind(&document.body)
                .bind(Utc::now())
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(new_version) = new_version else {
            let actual: Option<i64> = sqlx::query_scalar(
                "SELECT version FROM documents WHERE collection = $1 AND id = $2",
            )
            .bind(&document.collection)
            .bind(&document.id)
            .fetch_optional(&mut *tx)
            .await?;

            tracing::debug!(?actual, expected = ?options.expected_version, "save rejected");
            return Err(match (actual, options.expected_version) {
                (Some(actual), Some(expected)) => DocumentStoreError::ConcurrencyConflict {
                    collection: document.collection,
                    id: document.id,
                    expected,
                    actual: Version::new(actual),
                },
                _ => DocumentStoreError::NotFound {
                    collection: document.collection,
                    id: document.id,
                },
            });
        };

        for message in &outbox {
            sqlx::query(
                r#"
                INSERT INTO outbox (id, collection, document_id, event_type, payload, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(&message.collection)
            .bind(&message.document_id)
            .bind(&message.event_type)
            .bind(&message.payload)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("outbox_messages_written_total").increment(outbox.len() as u64);
        Ok(Version::new(new_version))
    }

    async fn pending_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxMessage>> {
        let mut sql = String::from(
            "SELECT id, collection, document_id, event_type, payload, created_at, published_at FROM outbox WHERE published_at IS NULL",
        );
        let mut param_count = 0;

        if query.collection.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND collection = ${param_count}"));
        }
        if query.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(collection) = query.collection {
            sqlx_query = sqlx_query.bind(collection);
        }
        if let Some(before) = query.created_before {
            sqlx_query = sqlx_query.bind(before);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_published(&self, id: OutboxId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox SET published_at = COALESCE(published_at, $2) WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DocumentStoreError::OutboxMessageNotFound(id));
        }
        Ok(())
    }
}
