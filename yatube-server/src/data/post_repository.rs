use crate::domain::error::DomainError;
use crate::domain::group::GroupRef;
use crate::domain::post::{Post, PostEntry, PostFilter};
use crate::domain::user::Author;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError>;
    async fn find_entry(&self, id: Uuid) -> Result<Option<PostEntry>, DomainError>;
    /// Stores text, group and image of an existing post.
    async fn update(&self, post: Post) -> Result<Post, DomainError>;
    async fn count(&self, filter: PostFilter) -> Result<u64, DomainError>;
    async fn list(
        &self,
        filter: PostFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<PostEntry>, DomainError>;
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ENTRY_SELECT: &str = r#"
    SELECT p.id, p.text, p.created_at, p.image,
           p.author_id, u.username AS author_username,
           p.group_id, g.title AS group_title, g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN groups g ON g.id = p.group_id
"#;

#[derive(sqlx::FromRow)]
struct PostEntryRow {
    id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    image: Option<String>,
    author_id: Uuid,
    author_username: String,
    group_id: Option<Uuid>,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostEntryRow> for PostEntry {
    fn from(row: PostEntryRow) -> Self {
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupRef { id, title, slug }),
            _ => None,
        };
        Self {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            image: row.image,
            author: Author {
                id: row.author_id,
                username: row.author_username,
            },
            group,
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder.push(" WHERE p.group_id = ").push_bind(group_id);
        }
        PostFilter::Author(author_id) => {
            builder.push(" WHERE p.author_id = ").push_bind(author_id);
        }
        PostFilter::FollowedBy(user_id) => {
            builder
                .push(" WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, group_id, text, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.text)
        .bind(&post.image)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        info!(post_id = %post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, author_id, group_id, text, image, created_at
            FROM posts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error find_by_id {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<PostEntry>, DomainError> {
        let mut builder = QueryBuilder::<Postgres>::new(ENTRY_SELECT);
        builder.push(" WHERE p.id = ").push_bind(id);
        let row = builder
            .build_query_as::<PostEntryRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("db error find_entry {}: {}", id, e);
                DomainError::Internal(e.to_string())
            })?;
        Ok(row.map(PostEntry::from))
    }

    async fn update(&self, post: Post) -> Result<Post, DomainError> {
        let updated = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET text = $1, group_id = $2, image = $3
            WHERE id = $4
            RETURNING id, author_id, group_id, text, image, created_at
            "#,
        )
        .bind(&post.text)
        .bind(post.group_id)
        .bind(&post.image)
        .bind(post.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", post.id, e);
            DomainError::Internal(e.to_string())
        })?
        .ok_or(DomainError::PostNotFound(post.id))?;

        info!(post_id = %updated.id, "post updated");
        Ok(updated)
    }

    async fn count(&self, filter: PostFilter) -> Result<u64, DomainError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        push_filter(&mut builder, filter);
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while counting posts: {}", e);
                DomainError::Internal(e.to_string())
            })?;
        Ok(count as u64)
    }

    async fn list(
        &self,
        filter: PostFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<PostEntry>, DomainError> {
        let mut builder = QueryBuilder::<Postgres>::new(ENTRY_SELECT);
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows = builder
            .build_query_as::<PostEntryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while fetching posts: {}", e);
                DomainError::Internal(e.to_string())
            })?;
        Ok(rows.into_iter().map(PostEntry::from).collect())
    }
}
