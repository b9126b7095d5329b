use std::cmp::Reverse;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::comment_repository::CommentRepository;
use crate::data::follow_repository::FollowRepository;
use crate::data::group_repository::GroupRepository;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::comment::{Comment, CommentEntry};
use crate::domain::error::DomainError;
use crate::domain::follow::Follow;
use crate::domain::group::{Group, GroupRef};
use crate::domain::post::{Post, PostEntry, PostFilter};
use crate::domain::user::{Author, User};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

impl Tables {
    fn author(&self, id: Uuid) -> Option<Author> {
        self.users.iter().find(|u| u.id == id).map(Author::from)
    }

    fn entry(&self, post: &Post) -> Option<PostEntry> {
        let author = self.author(post.author_id)?;
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|g| g.id == id))
            .map(GroupRef::from);
        Some(PostEntry {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            image: post.image.clone(),
            author,
            group,
        })
    }

    fn follows(&self, user_id: Uuid, author_id: Uuid) -> bool {
        self.follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
    }

    fn matches(&self, post: &Post, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self.follows(user_id, post.author_id),
        }
    }

    /// Matching posts, newest first. Equal timestamps keep the later insert first.
    fn feed(&self, filter: PostFilter) -> Vec<&Post> {
        let mut posts: Vec<(usize, &Post)> = self
            .posts
            .iter()
            .enumerate()
            .filter(|(_, post)| self.matches(post, filter))
            .collect();
        posts.sort_by_key(|(seq, post)| Reverse((post.created_at, *seq)));
        posts.into_iter().map(|(_, post)| post).collect()
    }
}

/// In-process store implementing every repository. Used when no database is
/// configured and by the handler tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        debug!("setting up in-memory store");
        Self::default()
    }

    #[cfg(test)]
    pub async fn remove_post(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        tables.posts.retain(|p| p.id != id);
        tables.comments.retain(|c| c.post_id != id);
    }

    #[cfg(test)]
    pub async fn comment_count(&self) -> usize {
        self.tables.read().await.comments.len()
    }

    #[cfg(test)]
    pub async fn follow_count(&self) -> usize {
        self.tables.read().await.follows.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(DomainError::UserAlreadyExists(user.username));
        }
        tables.users.push(user.clone());
        info!(user_id = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn create(&self, group: Group) -> Result<Group, DomainError> {
        let mut tables = self.tables.write().await;
        if tables.groups.iter().any(|g| g.slug == group.slug) {
            return Err(DomainError::GroupAlreadyExists(group.slug));
        }
        tables.groups.push(group.clone());
        info!(group_id = %group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Group>, DomainError> {
        let mut groups = self.tables.read().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == post.author_id) {
            return Err(DomainError::UserNotFound(post.author_id.to_string()));
        }
        tables.posts.push(post.clone());
        info!(post_id = %post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<PostEntry>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id)
            .and_then(|post| tables.entry(post)))
    }

    async fn update(&self, post: Post) -> Result<Post, DomainError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or(DomainError::PostNotFound(post.id))?;
        stored.text = post.text;
        stored.group_id = post.group_id;
        stored.image = post.image;
        info!(post_id = %stored.id, "post updated");
        Ok(stored.clone())
    }

    async fn count(&self, filter: PostFilter) -> Result<u64, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.feed(filter).len() as u64)
    }

    async fn list(
        &self,
        filter: PostFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<PostEntry>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .feed(filter)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|post| tables.entry(post))
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, comment: Comment) -> Result<Comment, DomainError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|p| p.id == comment.post_id) {
            return Err(DomainError::PostNotFound(comment.post_id));
        }
        let duplicate = tables.comments.iter().any(|c| {
            c.post_id == comment.post_id && c.author_id == comment.author_id && c.text == comment.text
        });
        if duplicate {
            return Err(DomainError::DuplicateComment);
        }
        tables.comments.push(comment.clone());
        info!(comment_id = %comment.id, post_id = %comment.post_id, "comment created");
        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentEntry>, DomainError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<(usize, &Comment)> = tables
            .comments
            .iter()
            .enumerate()
            .filter(|(_, c)| c.post_id == post_id)
            .collect();
        comments.sort_by_key(|(seq, c)| Reverse((c.created_at, *seq)));
        Ok(comments
            .into_iter()
            .filter_map(|(_, c)| {
                Some(CommentEntry {
                    id: c.id,
                    text: c.text.clone(),
                    created_at: c.created_at,
                    author: tables.author(c.author_id)?,
                })
            })
            .collect())
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn get_or_create(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        let mut tables = self.tables.write().await;
        if tables.follows(user_id, author_id) {
            return Ok(false);
        }
        tables.follows.push(Follow::new(user_id, author_id));
        info!(user_id = %user_id, author_id = %author_id, "follow created");
        Ok(true)
    }

    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<u64, DomainError> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok((before - tables.follows.len()) as u64)
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        Ok(self.tables.read().await.follows(user_id, author_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_users() -> (MemoryStore, User, User) {
        let store = MemoryStore::new();
        let leo = UserRepository::create(&store, User::new("leo".into(), String::new(), "x".into()))
            .await
            .expect("user");
        let mia = UserRepository::create(&store, User::new("mia".into(), String::new(), "x".into()))
            .await
            .expect("user");
        (store, leo, mia)
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let (store, _, _) = store_with_users().await;
        let result =
            UserRepository::create(&store, User::new("leo".into(), String::new(), "y".into())).await;
        assert!(matches!(result, Err(DomainError::UserAlreadyExists(name)) if name == "leo"));
    }

    #[tokio::test]
    async fn group_slugs_are_unique() {
        let store = MemoryStore::new();
        let group = Group::new("Cats".into(), "cats".into(), String::new());
        GroupRepository::create(&store, group).await.expect("group");
        let again = Group::new("Other cats".into(), "cats".into(), String::new());
        let result = GroupRepository::create(&store, again).await;
        assert!(matches!(result, Err(DomainError::GroupAlreadyExists(_))));
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_filtered() {
        let (store, leo, mia) = store_with_users().await;
        let first = PostRepository::create(&store, Post::new(leo.id, "first".into(), None, None))
            .await
            .expect("post");
        let second = PostRepository::create(&store, Post::new(mia.id, "second".into(), None, None))
            .await
            .expect("post");

        let all = PostRepository::list(&store, PostFilter::All, 10, 0).await.expect("list");
        assert_eq!(
            all.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let by_leo = PostRepository::list(&store, PostFilter::Author(leo.id), 10, 0).await.expect("list");
        assert_eq!(by_leo.len(), 1);
        assert_eq!(by_leo[0].author.username, "leo");
        assert_eq!(store.count(PostFilter::Author(mia.id)).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn followed_feed_tracks_edges() {
        let (store, leo, mia) = store_with_users().await;
        PostRepository::create(&store, Post::new(mia.id, "by mia".into(), None, None))
            .await
            .expect("post");

        assert_eq!(store.count(PostFilter::FollowedBy(leo.id)).await.expect("count"), 0);
        assert!(store.get_or_create(leo.id, mia.id).await.expect("follow"));
        assert!(!store.get_or_create(leo.id, mia.id).await.expect("follow"));
        assert_eq!(store.follow_count().await, 1);
        assert_eq!(store.count(PostFilter::FollowedBy(leo.id)).await.expect("count"), 1);

        assert_eq!(store.delete(leo.id, mia.id).await.expect("unfollow"), 1);
        assert_eq!(store.delete(leo.id, mia.id).await.expect("unfollow"), 0);
        assert_eq!(store.count(PostFilter::FollowedBy(leo.id)).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn duplicate_comments_are_rejected() {
        let (store, leo, _) = store_with_users().await;
        let post = PostRepository::create(&store, Post::new(leo.id, "post".into(), None, None))
            .await
            .expect("post");

        CommentRepository::create(&store, Comment::new(post.id, leo.id, "nice".into()))
            .await
            .expect("comment");
        let again =
            CommentRepository::create(&store, Comment::new(post.id, leo.id, "nice".into())).await;
        assert!(matches!(again, Err(DomainError::DuplicateComment)));
        assert_eq!(store.comment_count().await, 1);
    }

    #[tokio::test]
    async fn post_entry_carries_group() {
        let (store, leo, _) = store_with_users().await;
        let group = GroupRepository::create(
            &store,
            Group::new("Cats".into(), "cats".into(), String::new()),
        )
        .await
        .expect("group");
        let post =
            PostRepository::create(&store, Post::new(leo.id, "meow".into(), Some(group.id), None))
                .await
                .expect("post");

        let entry = store.find_entry(post.id).await.expect("entry").expect("exists");
        assert_eq!(entry.group.map(|g| g.slug), Some("cats".to_string()));
        assert_eq!(store.count(PostFilter::Group(group.id)).await.expect("count"), 1);
    }
}
