use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::data::follow_repository::FollowRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::user::User;

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UserRepository>, follows: Arc<dyn FollowRepository>) -> Self {
        Self { users, follows }
    }

    async fn author(&self, username: &str) -> Result<User, DomainError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(username.to_string()))
    }

    /// Stores the edge `viewer -> author` unless it exists or the viewer is the author.
    #[instrument(skip(self))]
    pub async fn follow(&self, viewer: Uuid, username: &str) -> Result<User, DomainError> {
        let author = self.author(username).await?;
        if author.id == viewer {
            debug!("self-follow ignored");
            return Ok(author);
        }
        self.follows.get_or_create(viewer, author.id).await?;
        Ok(author)
    }

    /// Removes the edge if present; repeating it is harmless.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, viewer: Uuid, username: &str) -> Result<User, DomainError> {
        let author = self.author(username).await?;
        self.follows.delete(viewer, author.id).await?;
        Ok(author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, FollowService, User, User) {
        let store = Arc::new(MemoryStore::new());
        let leo = UserRepository::create(
            store.as_ref(),
            User::new("leo".into(), String::new(), "x".into()),
        )
        .await
        .expect("user");
        let mia = UserRepository::create(
            store.as_ref(),
            User::new("mia".into(), String::new(), "x".into()),
        )
        .await
        .expect("user");
        let service = FollowService::new(store.clone(), store.clone());
        (store, service, leo, mia)
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let (store, service, leo, _) = setup().await;
        service.follow(leo.id, "mia").await.expect("follow");
        service.follow(leo.id, "mia").await.expect("follow again");
        assert_eq!(store.follow_count().await, 1);
    }

    #[tokio::test]
    async fn self_follow_is_ignored() {
        let (store, service, leo, _) = setup().await;
        let author = service.follow(leo.id, "leo").await.expect("follow");
        assert_eq!(author.id, leo.id);
        assert_eq!(store.follow_count().await, 0);
    }

    #[tokio::test]
    async fn repeated_unfollow_never_errors() {
        let (store, service, leo, mia) = setup().await;
        service.follow(leo.id, "mia").await.expect("follow");
        service.unfollow(leo.id, "mia").await.expect("unfollow");
        service.unfollow(leo.id, "mia").await.expect("unfollow again");
        assert!(!store.exists(leo.id, mia.id).await.expect("exists"));
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let (_, service, leo, _) = setup().await;
        let result = service.follow(leo.id, "ghost").await;
        assert!(matches!(result, Err(DomainError::UserNotFound(name)) if name == "ghost"));
    }
}
