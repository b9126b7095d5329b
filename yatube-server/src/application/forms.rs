use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::group_repository::GroupRepository;
use crate::domain::error::DomainError;
use crate::infrastructure::media::UploadedImage;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const DUPLICATE_COMMENT: &str = "You have already left this comment.";

/// Outcome of validating a submitted form.
#[derive(Debug)]
pub enum Validated<T, F> {
    Valid(T),
    /// The form to show again, with its errors.
    Invalid(F),
}

impl<T, F> Validated<T, F> {
    #[cfg(test)]
    pub fn expect_valid(self) -> T {
        match self {
            Validated::Valid(value) => value,
            Validated::Invalid(_) => panic!("form unexpectedly invalid"),
        }
    }

    #[cfg(test)]
    pub fn expect_invalid(self) -> F {
        match self {
            Validated::Valid(_) => panic!("form unexpectedly valid"),
            Validated::Invalid(form) => form,
        }
    }
}

/// Field name to error messages, in field order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

/// Raw post submission, as decoded from the request body.
#[derive(Debug, Default, Clone)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<Bytes>,
    pub clear_image: bool,
}

/// Post fields that passed validation.
#[derive(Debug, Clone)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

/// What a post form shows back to the user: submitted values plus errors.
#[derive(Debug, Clone, Serialize)]
pub struct BoundPostForm {
    pub text: String,
    pub group: Option<String>,
    pub errors: FormErrors,
}

impl PostForm {
    /// Checks the text is present, the group exists and the image is an image.
    pub async fn validate(
        self,
        groups: &dyn GroupRepository,
    ) -> Result<Validated<ValidPost, BoundPostForm>, DomainError> {
        let mut errors = FormErrors::default();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group = self
            .group
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty());
        let mut group_id = None;
        if let Some(raw) = group {
            match resolve_group(groups, raw).await? {
                Some(id) => group_id = Some(id),
                None => errors.add("group", INVALID_GROUP),
            }
        }

        let image = match self.image.filter(|data| !data.is_empty()) {
            Some(data) => match UploadedImage::sniff(data) {
                Some(image) => Some(image),
                None => {
                    errors.add("image", INVALID_IMAGE);
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Ok(Validated::Invalid(BoundPostForm {
                text: self.text,
                group: self.group,
                errors,
            }));
        }

        Ok(Validated::Valid(ValidPost {
            text,
            group_id,
            image,
            clear_image: self.clear_image,
        }))
    }
}

async fn resolve_group(
    groups: &dyn GroupRepository,
    raw: &str,
) -> Result<Option<Uuid>, DomainError> {
    let Ok(id) = Uuid::parse_str(raw) else {
        return Ok(None);
    };
    Ok(groups.find_by_id(id).await?.map(|group| group.id))
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundCommentForm {
    pub text: String,
    pub errors: FormErrors,
}

impl BoundCommentForm {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            errors: FormErrors::default(),
        }
    }

    pub fn with_error(text: String, field: &'static str, message: &str) -> Self {
        let mut errors = FormErrors::default();
        errors.add(field, message);
        Self { text, errors }
    }
}

impl CommentForm {
    pub fn validate(self) -> Validated<String, BoundCommentForm> {
        let text = self.text.trim();
        if text.is_empty() {
            return Validated::Invalid(BoundCommentForm::with_error(self.text, "text", REQUIRED));
        }
        Validated::Valid(text.to_string())
    }
}
