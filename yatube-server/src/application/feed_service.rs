use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::application::paginator::{Page, Paginator};
use crate::data::Repositories;
use crate::data::follow_repository::FollowRepository;
use crate::data::group_repository::GroupRepository;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::group::Group;
use crate::domain::post::{PostEntry, PostFilter};
use crate::domain::user::Author;

/// Paginated post feeds: everything, one group, one author, followed authors.
#[derive(Clone)]
pub struct FeedService {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
    posts: Arc<dyn PostRepository>,
    follows: Arc<dyn FollowRepository>,
    paginator: Paginator,
}

#[derive(Debug, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    pub page_obj: Page<PostEntry>,
}

#[derive(Debug, Serialize)]
pub struct ProfileFeed {
    pub profile: Author,
    pub page_obj: Page<PostEntry>,
    /// Whether the viewer follows this profile.
    pub following: bool,
}

impl FeedService {
    pub fn new(repos: &Repositories, paginator: Paginator) -> Self {
        Self {
            users: Arc::clone(&repos.users),
            groups: Arc::clone(&repos.groups),
            posts: Arc::clone(&repos.posts),
            follows: Arc::clone(&repos.follows),
            paginator,
        }
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        page: Option<&str>,
    ) -> Result<Page<PostEntry>, DomainError> {
        let count = self.posts.count(filter).await?;
        let window = self.paginator.window(page, count);
        let posts = self
            .posts
            .list(filter, window.limit(), window.offset())
            .await?;
        Ok(Page::new(posts, window))
    }

    #[instrument(skip(self))]
    pub async fn index(&self, page: Option<&str>) -> Result<Page<PostEntry>, DomainError> {
        self.paginate(PostFilter::All, page).await
    }

    #[instrument(skip(self))]
    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupFeed, DomainError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::GroupNotFound(slug.to_string()))?;
        let page_obj = self.paginate(PostFilter::Group(group.id), page).await?;
        Ok(GroupFeed { group, page_obj })
    }

    #[instrument(skip(self))]
    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: Option<&str>,
    ) -> Result<ProfileFeed, DomainError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(username.to_string()))?;
        let page_obj = self.paginate(PostFilter::Author(user.id), page).await?;
        let following = match viewer {
            Some(viewer) => self.follows.exists(viewer, user.id).await?,
            None => false,
        };
        Ok(ProfileFeed {
            profile: Author::from(&user),
            page_obj,
            following,
        })
    }

    #[instrument(skip(self))]
    pub async fn followed(
        &self,
        viewer: Uuid,
        page: Option<&str>,
    ) -> Result<Page<PostEntry>, DomainError> {
        self.paginate(PostFilter::FollowedBy(viewer), page).await
    }
}
