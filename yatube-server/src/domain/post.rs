use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::group::GroupRef;
use crate::domain::user::Author;

const DISPLAY_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub text: String,
    /// Path relative to the media root, e.g. `posts/<uuid>.gif`.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        author_id: Uuid,
        text: String,
        group_id: Option<Uuid>,
        image: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            group_id,
            text,
            image,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.text.chars().take(DISPLAY_CHARS).collect();
        f.write_str(&head)
    }
}

/// A post together with its author and group, as shown on list and detail pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostEntry {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub image: Option<String>,
    pub author: Author,
    pub group: Option<GroupRef>,
}

/// Which posts a feed shows. Every feed is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(Uuid),
    Author(Uuid),
    /// Posts by the authors this user follows.
    FollowedBy(Uuid),
}
