use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::application::forms::{BoundPostForm, PostForm, ValidPost, Validated};
use crate::data::Repositories;
use crate::data::comment_repository::CommentRepository;
use crate::data::group_repository::GroupRepository;
use crate::data::post_repository::PostRepository;
use crate::domain::comment::{Comment, CommentEntry};
use crate::domain::error::DomainError;
use crate::domain::group::Group;
use crate::domain::post::{Post, PostEntry};
use crate::infrastructure::media::ImageStore;

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    groups: Arc<dyn GroupRepository>,
    comments: Arc<dyn CommentRepository>,
    images: Arc<dyn ImageStore>,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: PostEntry,
    pub comments: Vec<CommentEntry>,
}

impl PostService {
    pub fn new(repos: &Repositories, images: Arc<dyn ImageStore>) -> Self {
        Self {
            posts: Arc::clone(&repos.posts),
            groups: Arc::clone(&repos.groups),
            comments: Arc::clone(&repos.comments),
            images,
        }
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, DomainError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    pub async fn detail(&self, id: Uuid) -> Result<PostDetail, DomainError> {
        let post = self
            .posts
            .find_entry(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))?;
        let comments = self.comments.list_for_post(id).await?;
        Ok(PostDetail { post, comments })
    }

    /// Choices for the form's group field.
    pub async fn groups(&self) -> Result<Vec<Group>, DomainError> {
        self.groups.list().await
    }

    pub async fn validate(
        &self,
        form: PostForm,
    ) -> Result<Validated<ValidPost, BoundPostForm>, DomainError> {
        form.validate(self.groups.as_ref()).await
    }

    async fn store_image(&self, valid: &ValidPost) -> Result<Option<String>, DomainError> {
        match &valid.image {
            Some(image) => Ok(Some(self.images.save(image).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, valid), fields(has_image = valid.image.is_some()))]
    pub async fn create_post(&self, author_id: Uuid, valid: ValidPost) -> Result<Post, DomainError> {
        let image = self.store_image(&valid).await?;
        let post = Post::new(author_id, valid.text, valid.group_id, image);
        self.posts.create(post).await
    }

    /// Applies the validated fields. A missing upload keeps the stored image
    /// unless the form asked to clear it.
    #[instrument(skip(self, post, valid), fields(post_id = %post.id))]
    pub async fn edit_post(&self, post: Post, valid: ValidPost) -> Result<Post, DomainError> {
        let image = match self.store_image(&valid).await? {
            Some(path) => Some(path),
            None if valid.clear_image => None,
            None => post.image,
        };
        let updated = Post {
            text: valid.text,
            group_id: valid.group_id,
            image,
            ..post
        };
        self.posts.update(updated).await
    }

    #[instrument(skip(self, text))]
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, DomainError> {
        self.comments
            .create(Comment::new(post_id, author_id, text))
            .await
    }
}
