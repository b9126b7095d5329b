use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{Ready, ready};
use uuid::Uuid;

use crate::application::auth_service::AuthService;
use crate::domain::error::DomainError;
use crate::presentation::middleware::RequestId;

/// Cookie carrying the access token for browser sessions.
pub const SESSION_COOKIE: &str = "access_token";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub username: String,
}

/// Requires a signed-in user; anonymous requests are sent to the login page
/// with the current path as `next`.
impl FromRequest for AuthenticatedUser {
    type Error = DomainError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(DomainError::LoginRequired {
                next: full_path(req),
            })),
        }
    }
}

/// Path plus query string, as the client requested it.
pub fn full_path(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.path().to_owned())
}

/// The access token from `Authorization: Bearer` or, failing that, the session cookie.
pub fn bearer_token(req: &HttpRequest) -> Option<(String, TokenSource)> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| (token.trim().to_owned(), TokenSource::Header));
    from_header.or_else(|| {
        req.cookie(SESSION_COOKIE)
            .map(|cookie| (cookie.value().to_owned(), TokenSource::Cookie))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
}

pub async fn extract_user_from_token(
    token: &str,
    auth_service: &AuthService,
) -> Result<AuthenticatedUser, DomainError> {
    let claims = auth_service
        .keys()
        .verify_token(token)
        .map_err(|_| DomainError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| DomainError::Unauthorized)?;

    let user = auth_service.get_user(user_id).await.map_err(|err| match err {
        DomainError::UserNotFound(_) => DomainError::Unauthorized,
        other => other,
    })?;

    Ok(AuthenticatedUser {
        id: user.id,
        username: user.username,
    })
}

pub fn request_id(req: &HttpRequest) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|rid| rid.0.clone())
        .unwrap_or_else(|| "unknown".into())
}
