use actix_web::http::{StatusCode, header};
use actix_web::HttpResponse;
use serde::Serialize;

pub const INDEX: &str = "posts/index.html";
pub const GROUP_LIST: &str = "posts/group_list.html";
pub const PROFILE: &str = "posts/profile.html";
pub const POST_DETAIL: &str = "posts/post_detail.html";
pub const CREATE_POST: &str = "posts/create_post.html";
pub const FOLLOW: &str = "posts/follow.html";
pub const SIGNUP: &str = "users/signup.html";
pub const LOGIN: &str = "users/login.html";
pub const CHOOSE_GAME: &str = "includes/choose_game.html";
pub const GAME: &str = "includes/game.html";
pub const NOT_FOUND: &str = "core/404.html";
pub const FORBIDDEN: &str = "core/403.html";
pub const CSRF_FAILURE: &str = "core/403csrf.html";

/// A rendered page: the template a client should use and the context to fill it with.
#[derive(Debug, Serialize)]
pub struct View<C> {
    pub template: &'static str,
    pub context: C,
}

impl<C: Serialize> View<C> {
    pub fn new(template: &'static str, context: C) -> Self {
        Self { template, context }
    }

    pub fn render(&self) -> HttpResponse {
        self.render_with_status(StatusCode::OK)
    }

    pub fn render_with_status(&self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

pub fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.as_ref()))
        .finish()
}
