use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::application::feed_service::FeedService;
use crate::application::forms::{BoundCommentForm, DUPLICATE_COMMENT, Validated};
use crate::application::page_cache::PageCache;
use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{
    GroupContext, IndexContext, PageQuery, PostDetailContext, PostFormContext, ProfileContext,
    bound_post_form,
};
use crate::presentation::form_body::{UploadLimits, decode_comment_form, decode_post_form};
use crate::presentation::urls;
use crate::presentation::utils::{AuthenticatedUser, request_id};
use crate::presentation::view::{self, View, redirect};

#[get("/")]
async fn index(
    feeds: web::Data<FeedService>,
    cache: web::Data<PageCache>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    // Only the page number varies the response; other query keys share an entry.
    let variant = format!("page={}", query.page.as_deref().map(str::trim).unwrap_or_default());
    if let Some(body) = cache.get(&variant).await {
        return Ok(json_response(body));
    }

    let page = feeds.index(query.page.as_deref()).await?;
    let view = View::new(view::INDEX, IndexContext::from(page));
    let body = Bytes::from(
        serde_json::to_vec(&view).map_err(|e| DomainError::Internal(e.to_string()))?,
    );
    cache.put(&variant, body.clone()).await;
    Ok(json_response(body))
}

fn json_response(body: Bytes) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body)
}

#[get("/group/{slug}/")]
async fn group_posts(
    feeds: web::Data<FeedService>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let feed = feeds.group(&path, query.page.as_deref()).await?;
    Ok(View::new(view::GROUP_LIST, GroupContext::from(feed)).render())
}

#[get("/profile/{username}/")]
async fn profile(
    viewer: Option<AuthenticatedUser>,
    feeds: web::Data<FeedService>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let feed = feeds
        .profile(&path, viewer.map(|v| v.id), query.page.as_deref())
        .await?;
    Ok(View::new(view::PROFILE, ProfileContext::from(feed)).render())
}

#[get("/posts/{id}/")]
async fn post_detail(
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    render_detail(&posts, path.into_inner(), BoundCommentForm::empty()).await
}

async fn render_detail(
    posts: &PostService,
    post_id: Uuid,
    form: BoundCommentForm,
) -> Result<HttpResponse, DomainError> {
    let detail = posts.detail(post_id).await?;
    Ok(View::new(view::POST_DETAIL, PostDetailContext::new(detail, form)).render())
}

#[get("/create/")]
async fn create_form(
    _user: AuthenticatedUser,
    posts: web::Data<PostService>,
) -> Result<HttpResponse, DomainError> {
    let groups = posts.groups().await?;
    let context = PostFormContext::create(bound_post_form(None), groups);
    Ok(View::new(view::CREATE_POST, context).render())
}

#[post("/create/")]
async fn create_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    limits: web::Data<UploadLimits>,
    body: Bytes,
) -> Result<HttpResponse, DomainError> {
    let form = decode_post_form(&req, body, *limits.get_ref()).await?;
    let valid = match posts.validate(form).await? {
        Validated::Valid(valid) => valid,
        Validated::Invalid(bound) => {
            let context = PostFormContext::create(bound, posts.groups().await?);
            return Ok(View::new(view::CREATE_POST, context).render());
        }
    };

    let post = posts.create_post(user.id, valid).await?;
    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id = %post.id,
        "post created"
    );

    Ok(redirect(urls::profile(&user.username)))
}

#[get("/posts/{id}/edit/")]
async fn edit_form(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    if post.author_id != user.id {
        return Ok(redirect(urls::post_detail(post.id)));
    }
    let groups = posts.groups().await?;
    let context = PostFormContext::edit(&post, bound_post_form(Some(&post)), groups);
    Ok(View::new(view::CREATE_POST, context).render())
}

#[post("/posts/{id}/edit/")]
async fn edit_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    limits: web::Data<UploadLimits>,
    path: web::Path<Uuid>,
    body: Bytes,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    let post_id = post.id;
    if post.author_id != user.id {
        info!(
            request_id = %request_id(&req),
            username = %user.username,
            post_id = %post_id,
            "edit by non-author ignored"
        );
        return Ok(redirect(urls::post_detail(post_id)));
    }

    let form = decode_post_form(&req, body, *limits.get_ref()).await?;
    let valid = match posts.validate(form).await? {
        Validated::Valid(valid) => valid,
        Validated::Invalid(bound) => {
            let context = PostFormContext::edit(&post, bound, posts.groups().await?);
            return Ok(View::new(view::CREATE_POST, context).render());
        }
    };

    posts.edit_post(post, valid).await?;
    info!(
        request_id = %request_id(&req),
        username = %user.username,
        post_id = %post_id,
        "post updated"
    );

    Ok(redirect(urls::post_detail(post_id)))
}

#[post("/posts/{id}/comment/")]
async fn add_comment(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
    body: Bytes,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;

    let form = decode_comment_form(&req, body).await?;
    let text = match form.validate() {
        Validated::Valid(text) => text,
        Validated::Invalid(bound) => return render_detail(&posts, post.id, bound).await,
    };

    match posts.add_comment(post.id, user.id, text.clone()).await {
        Ok(comment) => {
            info!(
                request_id = %request_id(&req),
                username = %user.username,
                post_id = %post.id,
                comment_id = %comment.id,
                "comment added"
            );
            Ok(redirect(urls::post_detail(post.id)))
        }
        Err(DomainError::DuplicateComment) => {
            let bound = BoundCommentForm::with_error(text, "text", DUPLICATE_COMMENT);
            render_detail(&posts, post.id, bound).await
        }
        Err(err) => Err(err),
    }
}
