//! Postgres implementation of the `Store` trait
//!
//! Entity queries go through SeaORM; everything touching the pgvector
//! columns uses raw statements, since the vector type has no SeaORM
//! column mapping.

use crate::db::models::*;
use crate::db::store::{ChunkMatch, ChunkMetadata, ChunkRecord, NewArticle, Store};
use crate::db::{map_db_err, DbPool};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QueryOrder, SqlErr,
    Statement, TransactionTrait,
};
use uuid::Uuid;

/// Repository for article and chunk persistence
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    /// Create a new store backed by the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// pgvector text literal: "[0.1,0.2,...]"
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn article_statement(article_id: Uuid, article: NewArticle) -> Statement {
    let embedding = article.embedding.as_deref().map(vector_literal);

    Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO articles (
            id, title, content, url, published_on, source, embedding,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7::vector, NOW(), NOW())
        "#,
        vec![
            article_id.into(),
            article.title.into(),
            article.content.into(),
            article.url.into(),
            article.published_on.into(),
            article.source.into(),
            embedding.into(),
        ],
    )
}

fn map_insert_err(e: sea_orm::DbErr, url: String) -> AppError {
    if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        AppError::DuplicateUrl { url }
    } else {
        map_db_err(e)
    }
}

async fn insert_chunk_rows<C: ConnectionTrait>(
    conn: &C,
    article_id: Uuid,
    chunks: Vec<ChunkRecord>,
) -> Result<()> {
    for chunk in chunks {
        let metadata = serde_json::to_value(&chunk.metadata)?;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO chunks (
                id, article_id, chunk_index, content, metadata, embedding, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6::vector, NOW())
            "#,
            vec![
                Uuid::new_v4().into(),
                article_id.into(),
                chunk.index.into(),
                chunk.content.into(),
                metadata.into(),
                vector_literal(&chunk.embedding).into(),
            ],
        );
        conn.execute(stmt).await.map_err(map_db_err)?;
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::Url.eq(url))
            .one(self.pool.conn())
            .await
            .map_err(map_db_err)
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.pool.conn())
            .await
            .map_err(map_db_err)
    }

    async fn insert_article_with_chunks(
        &self,
        article: NewArticle,
        chunks: Vec<ChunkRecord>,
    ) -> Result<Uuid> {
        let article_id = Uuid::new_v4();
        let url = article.url.clone();

        // One transaction covers the article row and every chunk, so a
        // failed chunk write cannot leave a chunkless article behind
        let txn = self.pool.conn().begin().await.map_err(map_db_err)?;
        txn.execute(article_statement(article_id, article))
            .await
            .map_err(|e| map_insert_err(e, url))?;
        insert_chunk_rows(&txn, article_id, chunks).await?;
        txn.commit().await.map_err(map_db_err)?;

        Ok(article_id)
    }

    async fn list_chunks(&self, article_id: Uuid) -> Result<Vec<Chunk>> {
        ChunkEntity::find()
            .filter(ChunkColumn::ArticleId.eq(article_id))
            .order_by_asc(ChunkColumn::ChunkIndex)
            .all(self.pool.conn())
            .await
            .map_err(map_db_err)
    }

    async fn nearest_chunks(&self, embedding: &[f32], limit: usize) -> Result<Vec<ChunkMatch>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT
                article_id,
                content,
                metadata,
                (embedding <-> $1::vector)::float8 AS distance
            FROM chunks
            WHERE embedding IS NOT NULL
            ORDER BY embedding <-> $1::vector
            LIMIT $2
            "#,
            vec![
                vector_literal(embedding).into(),
                (limit as i64).into(),
            ],
        );

        let rows = self
            .pool
            .conn()
            .query_all(stmt)
            .await
            .map_err(map_db_err)?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata: serde_json::Value =
                row.try_get_by_index(2).map_err(map_db_err)?;
            let metadata: ChunkMetadata = serde_json::from_value(metadata)?;
            matches.push(ChunkMatch {
                article_id: row.try_get_by_index(0).map_err(map_db_err)?,
                content: row.try_get_by_index(1).map_err(map_db_err)?,
                metadata,
                distance: row.try_get_by_index(3).map_err(map_db_err)?,
            });
        }
        Ok(matches)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal_format() {
        let embedding = vec![0.1, 0.2, 0.3];
        assert_eq!(vector_literal(&embedding), "[0.1,0.2,0.3]");
    }

    #[test]
    fn test_vector_literal_empty() {
        assert_eq!(vector_literal(&[]), "[]");
    }
}
