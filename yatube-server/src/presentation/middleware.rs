use std::future::{Ready, ready};
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Instant;

use actix_service::{Service, Transform};
use actix_web::body::EitherBody;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage, ResponseError, web};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::auth_service::AuthService;
use crate::domain::error::DomainError;
use crate::infrastructure::security::new_csrf_token;
use crate::presentation::utils::{TokenSource, bearer_token, extract_user_from_token};

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
static TIMING_HEADER: HeaderName = HeaderName::from_static("server-timing");
pub static CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrftoken");
pub const CSRF_COOKIE: &str = "csrftoken";

const CSRF_COOKIE_MISSING: &str = "CSRF cookie not set.";
const CSRF_TOKEN_MISMATCH: &str = "CSRF token missing or incorrect.";

#[derive(Clone)]
pub struct RequestId(pub String);

pub struct RequestIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdService { service }))
    }
}

pub struct RequestIdService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestIdService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = req
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_owned())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        req.extensions_mut().insert(RequestId(request_id.clone()));

        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.response_mut()
                    .headers_mut()
                    .insert(REQUEST_ID_HEADER.clone(), value);
            }
            Ok(res)
        })
    }
}

/// Resolves the request's access token, if any, into an [`AuthenticatedUser`].
///
/// Anonymous and badly-authenticated requests continue without a user, and
/// handlers that need one ask for it through the extractor. Only a storage
/// failure while looking the user up fails the request.
pub struct IdentityMiddleware;

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityService {
            service: Rc::new(service),
        }))
    }
}

pub struct IdentityService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IdentityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth_service = req.app_data::<web::Data<AuthService>>().cloned();
        let token = bearer_token(req.request());

        Box::pin(async move {
            if let (Some((token, source)), Some(auth_service)) = (token, auth_service) {
                match extract_user_from_token(&token, auth_service.get_ref()).await {
                    Ok(user) => {
                        req.extensions_mut().insert(user);
                    }
                    Err(DomainError::Internal(cause)) => {
                        error!(?source, error = %cause, "failed to resolve session user");
                        return Err(DomainError::Internal(cause).into());
                    }
                    Err(err) => debug!(?source, error = %err, "ignoring unusable credentials"),
                }
            }
            service.call(req).await
        })
    }
}

/// Double-submit CSRF protection for cookie sessions.
///
/// Every response lacking a `csrftoken` cookie gets one. Unsafe requests that
/// authenticate with the session cookie must echo it in `X-CSRFToken`;
/// bearer-token requests are exempt.
pub struct CsrfMiddleware;

impl<S, B> Transform<S, ServiceRequest> for CsrfMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CsrfService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CsrfService { service }))
    }
}

pub struct CsrfService<S> {
    service: S,
}

fn csrf_rejection(req: &ServiceRequest, cookie_token: Option<&str>) -> Option<&'static str> {
    if req.method().is_safe() {
        return None;
    }
    match bearer_token(req.request()) {
        Some((_, TokenSource::Cookie)) => {}
        _ => return None,
    }
    let Some(expected) = cookie_token else {
        return Some(CSRF_COOKIE_MISSING);
    };
    let submitted = req
        .headers()
        .get(&CSRF_HEADER)
        .and_then(|value| value.to_str().ok());
    match submitted {
        Some(token) if tokens_match(token.as_bytes(), expected.as_bytes()) => None,
        _ => Some(CSRF_TOKEN_MISMATCH),
    }
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(submitted: &[u8], expected: &[u8]) -> bool {
    submitted.len() == expected.len()
        && submitted
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

impl<S, B> Service<ServiceRequest> for CsrfService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let cookie_token = req.cookie(CSRF_COOKIE).map(|c| c.value().to_owned());

        if let Some(reason) = csrf_rejection(&req, cookie_token.as_deref()) {
            warn!(method = %req.method(), path = %req.path(), reason, "csrf check failed");
            let response = DomainError::CsrfFailure(reason).error_response();
            return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;
            if cookie_token.is_none() {
                let cookie = Cookie::build(CSRF_COOKIE, new_csrf_token())
                    .path("/")
                    .same_site(SameSite::Lax)
                    .finish();
                if let Err(err) = res.response_mut().add_cookie(&cookie) {
                    warn!(error = %err, "failed to set csrf cookie");
                }
            }
            Ok(res.map_into_left_body())
        })
    }
}

pub struct TimingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TimingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TimingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TimingService { service }))
    }
}

pub struct TimingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TimingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_owned();
        let rid = req.extensions().get::<RequestId>().map(|r| r.0.clone());

        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;
            let duration = start.elapsed();
            let status = res.status().as_u16();
            if let Some(rid) = rid {
                info!(
                    request_id = %rid,
                    method = %method,
                    path = %path,
                    status,
                    duration_ms = duration.as_millis(),
                    "request completed"
                );
            } else {
                info!(
                    method = %method,
                    path = %path,
                    status,
                    duration_ms = duration.as_millis(),
                    "request completed"
                );
            }

            if let Ok(value) = HeaderValue::from_str(&format!("app;dur={}", duration.as_millis())) {
                res.response_mut()
                    .headers_mut()
                    .insert(TIMING_HEADER.clone(), value);
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::http::header;
    use actix_web::test::TestRequest;

    use crate::presentation::utils::SESSION_COOKIE;

    #[test]
    fn tokens_match_only_on_equal_bytes() {
        assert!(tokens_match(b"abc123", b"abc123"));
        assert!(!tokens_match(b"abc124", b"abc123"));
        assert!(!tokens_match(b"abc", b"abc123"));
        assert!(!tokens_match(b"", b"abc123"));
    }

    #[test]
    fn cookie_session_post_needs_matching_header() {
        let req = TestRequest::post()
            .cookie(Cookie::new(SESSION_COOKIE, "session"))
            .cookie(Cookie::new(CSRF_COOKIE, "token"))
            .insert_header((CSRF_HEADER.clone(), "tokem"))
            .to_srv_request();
        assert_eq!(csrf_rejection(&req, Some("token")), Some(CSRF_TOKEN_MISMATCH));

        let req = TestRequest::post()
            .cookie(Cookie::new(SESSION_COOKIE, "session"))
            .cookie(Cookie::new(CSRF_COOKIE, "token"))
            .insert_header((CSRF_HEADER.clone(), "token"))
            .to_srv_request();
        assert_eq!(csrf_rejection(&req, Some("token")), None);
    }

    #[test]
    fn bearer_and_safe_requests_skip_the_check() {
        let req = TestRequest::post()
            .insert_header((header::AUTHORIZATION, "Bearer abc"))
            .to_srv_request();
        assert_eq!(csrf_rejection(&req, None), None);

        let req = TestRequest::get()
            .cookie(Cookie::new(SESSION_COOKIE, "session"))
            .to_srv_request();
        assert_eq!(csrf_rejection(&req, None), None);
    }
}
