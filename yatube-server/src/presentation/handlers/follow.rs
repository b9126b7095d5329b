use actix_web::{HttpRequest, HttpResponse, get, web};
use tracing::info;

use crate::application::feed_service::FeedService;
use crate::application::follow_service::FollowService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{IndexContext, PageQuery};
use crate::presentation::urls;
use crate::presentation::utils::{AuthenticatedUser, request_id};
use crate::presentation::view::{self, View, redirect};

#[get("/follow/")]
async fn follow_index(
    user: AuthenticatedUser,
    feeds: web::Data<FeedService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let page = feeds.followed(user.id, query.page.as_deref()).await?;
    Ok(View::new(view::FOLLOW, IndexContext::from(page)).render())
}

#[get("/profile/{username}/follow/")]
async fn profile_follow(
    req: HttpRequest,
    user: AuthenticatedUser,
    follows: web::Data<FollowService>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let author = follows.follow(user.id, &path).await?;
    info!(
        request_id = %request_id(&req),
        username = %user.username,
        author = %author.username,
        "author followed"
    );
    Ok(redirect(urls::profile(&author.username)))
}

#[get("/profile/{username}/unfollow/")]
async fn profile_unfollow(
    req: HttpRequest,
    user: AuthenticatedUser,
    follows: web::Data<FollowService>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let author = follows.unfollow(user.id, &path).await?;
    info!(
        request_id = %request_id(&req),
        username = %user.username,
        author = %author.username,
        "author unfollowed"
    );
    Ok(redirect(urls::profile(&author.username)))
}
