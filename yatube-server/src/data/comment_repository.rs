use crate::data::violates_constraint;
use crate::domain::comment::{Comment, CommentEntry};
use crate::domain::error::DomainError;
use crate::domain::user::Author;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Fails with [`DomainError::DuplicateComment`] when the author already
    /// left the same text under the post.
    async fn create(&self, comment: Comment) -> Result<Comment, DomainError>;
    /// Comments of a post, newest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentEntry>, DomainError>;
}

#[derive(Clone)]
pub struct PostgresCommentRepository {
    pool: PgPool,
}

impl PostgresCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CommentEntryRow {
    id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    author_id: Uuid,
    author_username: String,
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn create(&self, comment: Comment) -> Result<Comment, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_constraint(&e, "unique_comments") {
                DomainError::DuplicateComment
            } else {
                error!("failed to create comment: {}", e);
                DomainError::Internal(format!("database error: {}", e))
            }
        })?;

        info!(comment_id = %comment.id, post_id = %comment.post_id, "comment created");
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentEntry>, DomainError> {
        let rows = sqlx::query_as::<_, CommentEntryRow>(
            r#"
            SELECT c.id, c.text, c.created_at, c.author_id, u.username AS author_username
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching comments of {}: {}", post_id, e);
            DomainError::Internal(e.to_string())
        })?;

        Ok(rows
            .into_iter()
            .map(|row| CommentEntry {
                id: row.id,
                text: row.text,
                created_at: row.created_at,
                author: Author {
                    id: row.author_id,
                    username: row.author_username,
                },
            })
            .collect())
    }
}
