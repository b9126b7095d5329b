use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpResponse, Scope, get, post, web};
use tracing::info;

use crate::application::auth_service::{AuthService, is_valid_username};
use crate::application::forms::FormErrors;
use crate::domain::error::DomainError;
use crate::infrastructure::security::TOKEN_TTL_HOURS;
use crate::presentation::dto::{
    AuthResponse, LoginContext, LoginRequest, NextQuery, SignupContext, SignupRequest,
};
use crate::presentation::urls;
use crate::presentation::utils::SESSION_COOKIE;
use crate::presentation::view::{self, View};

pub const PASSWORD_MIN_LEN: usize = 8;
const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const PASSWORD_TOO_SHORT: &str = "This password is too short. It must contain at least 8 characters.";
const INVALID_LOGIN: &str = "Please enter a correct username and password.";

type SignupPayload = web::Either<web::Json<SignupRequest>, web::Form<SignupRequest>>;
type LoginPayload = web::Either<web::Json<LoginRequest>, web::Form<LoginRequest>>;

pub fn scope() -> Scope {
    web::scope("/auth")
        .service(signup_form)
        .service(signup)
        .service(login_form)
        .service(login)
        .service(logout)
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => urls::INDEX.to_string(),
    }
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_owned())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(TOKEN_TTL_HOURS))
        .finish()
}

fn signed_in(token: String, next: String, status: actix_web::http::StatusCode) -> HttpResponse {
    HttpResponse::build(status)
        .cookie(session_cookie(&token))
        .json(AuthResponse {
            access_token: token,
            expires_in: TOKEN_TTL_HOURS * 3600,
            token_type: "Bearer".to_string(),
            next,
        })
}

#[get("/signup/")]
async fn signup_form() -> HttpResponse {
    View::new(view::SIGNUP, SignupContext::default()).render()
}

#[post("/signup/")]
async fn signup(
    service: web::Data<AuthService>,
    payload: SignupPayload,
) -> Result<HttpResponse, DomainError> {
    let payload = payload.into_inner();

    let mut errors = FormErrors::default();
    if !is_valid_username(&payload.username) {
        errors.add("username", INVALID_USERNAME);
    }
    if payload.password.chars().count() < PASSWORD_MIN_LEN {
        errors.add("password", PASSWORD_TOO_SHORT);
    }

    let rerender = |errors: FormErrors| {
        View::new(
            view::SIGNUP,
            SignupContext {
                username: payload.username.clone(),
                email: payload.email.clone(),
                errors,
            },
        )
        .render()
    };
    if !errors.is_empty() {
        return Ok(rerender(errors));
    }

    let user = match service
        .register(
            payload.username.clone(),
            payload.email.clone(),
            payload.password.clone(),
        )
        .await
    {
        Ok(user) => user,
        Err(DomainError::UserAlreadyExists(_)) => {
            let mut errors = FormErrors::default();
            errors.add("username", USERNAME_TAKEN);
            return Ok(rerender(errors));
        }
        Err(err) => return Err(err),
    };
    info!(user_id = %user.id, username = %user.username, "user registered");

    let token = service.login(&user.username, &payload.password).await?;
    info!(username = %user.username, "user logged in");

    Ok(signed_in(
        token,
        urls::INDEX.to_string(),
        actix_web::http::StatusCode::CREATED,
    ))
}

#[get("/login/")]
async fn login_form(query: web::Query<NextQuery>) -> HttpResponse {
    let context = LoginContext {
        next: query.into_inner().next,
        errors: FormErrors::default(),
    };
    View::new(view::LOGIN, context).render()
}

#[post("/login/")]
async fn login(
    service: web::Data<AuthService>,
    query: web::Query<NextQuery>,
    payload: LoginPayload,
) -> Result<HttpResponse, DomainError> {
    let payload = payload.into_inner();
    let next = query.into_inner().next;

    match service.login(&payload.username, &payload.password).await {
        Ok(token) => {
            info!(username = %payload.username, "user logged in");
            Ok(signed_in(
                token,
                safe_next(next.as_deref()),
                actix_web::http::StatusCode::OK,
            ))
        }
        Err(DomainError::Unauthorized) => {
            let mut errors = FormErrors::default();
            errors.add("__all__", INVALID_LOGIN);
            Ok(View::new(view::LOGIN, LoginContext { next, errors }).render())
        }
        Err(err) => Err(err),
    }
}

#[get("/logout/")]
async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Found()
        .insert_header((header::LOCATION, urls::INDEX))
        .cookie(cookie)
        .finish()
}
