use crate::data::violates_constraint;
use crate::domain::error::DomainError;
use crate::domain::group::Group;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create(&self, group: Group) -> Result<Group, DomainError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, DomainError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, DomainError>;
    /// All groups ordered by title, for the post form's choices.
    async fn list(&self) -> Result<Vec<Group>, DomainError>;
}

#[derive(Clone)]
pub struct PostgresGroupRepository {
    pool: PgPool,
}

impl PostgresGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    async fn create(&self, group: Group) -> Result<Group, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO groups (id, title, slug, description)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(group.id)
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_constraint(&e, "groups_slug_key") {
                DomainError::GroupAlreadyExists(group.slug.clone())
            } else {
                error!("failed to create group: {}", e);
                DomainError::Internal(format!("database error: {}", e))
            }
        })?;

        info!(group_id = %group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, DomainError> {
        sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to find group by slug {}: {}", slug, e);
                DomainError::Internal(e.to_string())
            })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, DomainError> {
        sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to find group by id {}: {}", id, e);
                DomainError::Internal(e.to_string())
            })
    }

    async fn list(&self) -> Result<Vec<Group>, DomainError> {
        sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while listing groups: {}", e);
                DomainError::Internal(e.to_string())
            })
    }
}
