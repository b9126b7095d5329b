use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::feed_service::{GroupFeed, ProfileFeed};
use crate::application::forms::{BoundCommentForm, BoundPostForm, FormErrors};
use crate::application::paginator::Page;
use crate::application::post_service::PostDetail;
use crate::domain::comment::CommentEntry;
use crate::domain::group::{Group, GroupRef};
use crate::domain::post::{Post, PostEntry};
use crate::domain::user::Author;
use crate::presentation::urls;

// ======================= AUTH =======================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(rename = "token_type")]
    pub token_type: String, // "Bearer"
    /// Where a browser should go next.
    pub next: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SignupContext {
    pub username: String,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Debug, Default, Serialize)]
pub struct LoginContext {
    pub next: Option<String>,
    pub errors: FormErrors,
}

// ======================= POSTS =======================

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A post as pages show it, with a URL for its image.
#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: Author,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
    pub image_url: Option<String>,
}

impl From<PostEntry> for PostView {
    fn from(entry: PostEntry) -> Self {
        let image_url = entry.image.as_deref().map(urls::media);
        Self {
            id: entry.id,
            text: entry.text,
            created_at: entry.created_at,
            author: entry.author,
            group: entry.group,
            image: entry.image,
            image_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexContext {
    pub page_obj: Page<PostView>,
}

impl From<Page<PostEntry>> for IndexContext {
    fn from(page: Page<PostEntry>) -> Self {
        Self {
            page_obj: page.map(PostView::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupContext {
    pub group: Group,
    pub page_obj: Page<PostView>,
}

impl From<GroupFeed> for GroupContext {
    fn from(feed: GroupFeed) -> Self {
        Self {
            group: feed.group,
            page_obj: feed.page_obj.map(PostView::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileContext {
    pub profile: Author,
    pub page_obj: Page<PostView>,
    pub following: bool,
}

impl From<ProfileFeed> for ProfileContext {
    fn from(feed: ProfileFeed) -> Self {
        Self {
            profile: feed.profile,
            page_obj: feed.page_obj.map(PostView::from),
            following: feed.following,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDetailContext {
    pub post: PostView,
    pub comments: Vec<CommentEntry>,
    pub form: BoundCommentForm,
}

impl PostDetailContext {
    pub fn new(detail: PostDetail, form: BoundCommentForm) -> Self {
        Self {
            post: detail.post.into(),
            comments: detail.comments,
            form,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostFormContext {
    pub form: BoundPostForm,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    /// The post being edited.
    pub post_id: Option<Uuid>,
    pub image: Option<String>,
}

impl PostFormContext {
    pub fn create(form: BoundPostForm, groups: Vec<Group>) -> Self {
        Self {
            form,
            groups,
            is_edit: false,
            post_id: None,
            image: None,
        }
    }

    pub fn edit(post: &Post, form: BoundPostForm, groups: Vec<Group>) -> Self {
        Self {
            form,
            groups,
            is_edit: true,
            post_id: Some(post.id),
            image: post.image.as_deref().map(urls::media),
        }
    }
}

/// A blank form, or one prefilled from an existing post.
pub fn bound_post_form(post: Option<&Post>) -> BoundPostForm {
    BoundPostForm {
        text: post.map(|p| p.text.clone()).unwrap_or_default(),
        group: post.and_then(|p| p.group_id).map(|id| id.to_string()),
        errors: FormErrors::default(),
    }
}

// ======================= Games =======================

#[derive(Debug, Default, Serialize)]
pub struct ChooseGameContext {}

#[derive(Debug, Serialize)]
pub struct GameContext {
    pub type_game: &'static str,
}

// ======================= Utils =======================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}
