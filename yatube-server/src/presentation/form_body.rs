use std::convert::Infallible;

use actix_web::HttpRequest;
use actix_web::http::header;
use bytes::Bytes;
use multer::{Constraints, Multipart, SizeLimit};
use serde::Deserialize;
use tracing::debug;

use crate::application::forms::{CommentForm, PostForm};
use crate::domain::error::DomainError;

const TEXT_FIELD_LIMIT: u64 = 64 * 1024;

/// Upper bounds for submitted post bodies.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_image_bytes: u64,
}

impl UploadLimits {
    /// Whole-body limit: the image plus room for the text fields and framing.
    pub fn max_body_bytes(&self) -> usize {
        (self.max_image_bytes + 4 * TEXT_FIELD_LIMIT) as usize
    }
}

#[derive(Debug, Default, Deserialize)]
struct UrlencodedPostForm {
    #[serde(default)]
    text: String,
    group: Option<String>,
    #[serde(rename = "image-clear")]
    image_clear: Option<String>,
}

/// Checkbox semantics: present and not explicitly false.
fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "no"
    )
}

enum FormEncoding<'a> {
    Multipart(&'a str),
    Urlencoded,
}

fn form_encoding<'a>(
    req: &'a HttpRequest,
    body: &[u8],
) -> Result<FormEncoding<'a>, DomainError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("multipart/form-data") {
        Ok(FormEncoding::Multipart(content_type))
    } else if content_type.starts_with("application/x-www-form-urlencoded") || body.is_empty() {
        Ok(FormEncoding::Urlencoded)
    } else {
        Err(DomainError::BadRequest(format!(
            "unsupported content type: {content_type}"
        )))
    }
}

/// Decodes a `multipart/form-data` or `application/x-www-form-urlencoded` post form.
pub async fn decode_post_form(
    req: &HttpRequest,
    body: Bytes,
    limits: UploadLimits,
) -> Result<PostForm, DomainError> {
    match form_encoding(req, &body)? {
        FormEncoding::Multipart(content_type) => decode_multipart(content_type, body, limits).await,
        FormEncoding::Urlencoded => decode_urlencoded(&body),
    }
}

/// Decodes a comment form in either encoding the post forms accept.
pub async fn decode_comment_form(
    req: &HttpRequest,
    body: Bytes,
) -> Result<CommentForm, DomainError> {
    match form_encoding(req, &body)? {
        FormEncoding::Multipart(content_type) => {
            let constraints =
                Constraints::new().size_limit(SizeLimit::new().per_field(TEXT_FIELD_LIMIT));
            let mut multipart = multipart_reader(content_type, body, constraints)?;
            let mut form = CommentForm::default();
            while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
                if field.name() == Some("text") {
                    form.text = field.text().await.map_err(multipart_error)?;
                }
            }
            Ok(form)
        }
        FormEncoding::Urlencoded => serde_urlencoded::from_bytes(&body)
            .map_err(|e| DomainError::BadRequest(format!("malformed form: {e}"))),
    }
}

fn multipart_reader(
    content_type: &str,
    body: Bytes,
    constraints: Constraints,
) -> Result<Multipart<'static>, DomainError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| DomainError::BadRequest(format!("malformed multipart: {e}")))?;
    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    Ok(Multipart::with_constraints(stream, boundary, constraints))
}

fn decode_urlencoded(body: &[u8]) -> Result<PostForm, DomainError> {
    let raw: UrlencodedPostForm = serde_urlencoded::from_bytes(body)
        .map_err(|e| DomainError::BadRequest(format!("malformed form: {e}")))?;
    Ok(PostForm {
        text: raw.text,
        group: raw.group,
        image: None,
        clear_image: raw.image_clear.as_deref().is_some_and(is_truthy),
    })
}

async fn decode_multipart(
    content_type: &str,
    body: Bytes,
    limits: UploadLimits,
) -> Result<PostForm, DomainError> {
    let constraints = Constraints::new().size_limit(
        SizeLimit::new()
            .per_field(TEXT_FIELD_LIMIT)
            .for_field("image", limits.max_image_bytes),
    );
    let mut multipart = multipart_reader(content_type, body, constraints)?;

    let mut form = PostForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => form.text = field.text().await.map_err(multipart_error)?,
            Some("group") => form.group = Some(field.text().await.map_err(multipart_error)?),
            Some("image") => {
                let data = field.bytes().await.map_err(multipart_error)?;
                if !data.is_empty() {
                    form.image = Some(data);
                }
            }
            Some("image-clear") => {
                form.clear_image = is_truthy(&field.text().await.map_err(multipart_error)?);
            }
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

fn multipart_error(err: multer::Error) -> DomainError {
    match err {
        multer::Error::FieldSizeExceeded { field_name, .. } => DomainError::BadRequest(format!(
            "field {} is too large",
            field_name.unwrap_or_default()
        )),
        other => DomainError::BadRequest(format!("malformed multipart: {other}")),
    }
}
