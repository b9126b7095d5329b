use std::sync::Arc;

use tracing::instrument;

use crate::data::group_repository::GroupRepository;
use crate::domain::error::DomainError;
use crate::domain::group::Group;

pub const SLUG_MAX_LEN: usize = 50;

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupRepository>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GroupInputError {
    #[error("title must be between 1 and {} characters", Group::TITLE_MAX_LEN)]
    Title,
    #[error("slug must be 1 to {} letters, digits, hyphens or underscores", SLUG_MAX_LEN)]
    Slug,
}

pub fn check_group_input(title: &str, slug: &str) -> Result<(), GroupInputError> {
    let title_len = title.trim().chars().count();
    if title_len == 0 || title_len > Group::TITLE_MAX_LEN {
        return Err(GroupInputError::Title);
    }
    let slug_ok = !slug.is_empty()
        && slug.len() <= SLUG_MAX_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !slug_ok {
        return Err(GroupInputError::Slug);
    }
    Ok(())
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupRepository>) -> Self {
        Self { groups }
    }

    #[instrument(skip(self, description))]
    pub async fn create(
        &self,
        title: String,
        slug: String,
        description: String,
    ) -> anyhow::Result<Group> {
        check_group_input(&title, &slug)?;
        let group = Group::new(title.trim().to_string(), slug, description);
        match self.groups.create(group).await {
            Ok(group) => Ok(group),
            Err(DomainError::GroupAlreadyExists(slug)) => {
                anyhow::bail!("a group with slug {slug:?} already exists")
            }
            Err(err) => Err(err.into()),
        }
    }
}
