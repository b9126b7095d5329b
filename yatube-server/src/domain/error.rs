use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::presentation::urls;
use crate::presentation::view::{self, View};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("page not found: {0}")]
    PageNotFound(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),
    #[error("post not found: {0}")]
    PostNotFound(Uuid),
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("group already exists: {0}")]
    GroupAlreadyExists(String),
    #[error("comment already exists")]
    DuplicateComment,
    #[error("forbidden")]
    Forbidden,
    #[error("CSRF verification failed: {0}")]
    CsrfFailure(&'static str),
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("login required")]
    LoginRequired { next: String },
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ResponseError for DomainError {
    fn status_code(&self) -> StatusCode {
        match self {
            DomainError::PageNotFound(_)
            | DomainError::UserNotFound(_)
            | DomainError::PostNotFound(_)
            | DomainError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden | DomainError::CsrfFailure(_) => StatusCode::FORBIDDEN,
            DomainError::LoginRequired { .. } => StatusCode::FOUND,
            DomainError::UserAlreadyExists(_)
            | DomainError::GroupAlreadyExists(_)
            | DomainError::DuplicateComment => StatusCode::CONFLICT,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        match self {
            DomainError::PageNotFound(path) => {
                View::new(view::NOT_FOUND, json!({ "path": path })).render_with_status(status)
            }
            DomainError::UserNotFound(_)
            | DomainError::PostNotFound(_)
            | DomainError::GroupNotFound(_) => {
                View::new(view::NOT_FOUND, json!({ "error": message })).render_with_status(status)
            }
            DomainError::Forbidden => {
                View::new(view::FORBIDDEN, json!({ "error": message })).render_with_status(status)
            }
            DomainError::CsrfFailure(reason) => {
                View::new(view::CSRF_FAILURE, json!({ "reason": reason }))
                    .render_with_status(status)
            }
            DomainError::LoginRequired { next } => view::redirect(urls::login(next)),
            _ => {
                if let DomainError::Internal(cause) = self {
                    error!(cause = %cause, "request failed");
                }
                let details = match self {
                    DomainError::UserAlreadyExists(username) => {
                        Some(json!({ "username": username }))
                    }
                    DomainError::GroupAlreadyExists(slug) => Some(json!({ "slug": slug })),
                    _ => None,
                };
                let body = ErrorBody {
                    error: message.as_str(),
                    details,
                };
                HttpResponse::build(status).json(body)
            }
        }
    }
}
