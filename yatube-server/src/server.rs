use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, Error, HttpServer, web};
use tracing::info;

use crate::application::auth_service::AuthService;
use crate::application::feed_service::FeedService;
use crate::application::follow_service::FollowService;
use crate::application::page_cache::PageCache;
use crate::application::paginator::Paginator;
use crate::application::post_service::PostService;
use crate::data::Repositories;
use crate::domain::error::DomainError;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::media::ImageStore;
use crate::infrastructure::security::JwtKeys;
use crate::presentation::form_body::UploadLimits;
use crate::presentation::handlers;
use crate::presentation::middleware::{
    CSRF_HEADER, CsrfMiddleware, IdentityMiddleware, RequestIdMiddleware, TimingMiddleware,
};
use crate::presentation::utils::full_path;

/// Cache key prefix for the index page.
pub const INDEX_CACHE_PREFIX: &str = "index_page";

/// Everything the handlers share across workers.
#[derive(Clone)]
pub struct AppState {
    pub auth: web::Data<AuthService>,
    pub feeds: web::Data<FeedService>,
    pub posts: web::Data<PostService>,
    pub follows: web::Data<FollowService>,
    pub images: web::Data<dyn ImageStore>,
    pub index_cache: web::Data<PageCache>,
    pub limits: web::Data<UploadLimits>,
}

impl AppState {
    pub fn new(config: &AppConfig, repos: &Repositories, images: Arc<dyn ImageStore>) -> Self {
        let paginator = Paginator::new(config.page_size);
        Self {
            auth: web::Data::new(AuthService::new(
                Arc::clone(&repos.users),
                JwtKeys::new(config.jwt_secret.clone()),
            )),
            feeds: web::Data::new(FeedService::new(repos, paginator)),
            posts: web::Data::new(PostService::new(repos, Arc::clone(&images))),
            follows: web::Data::new(FollowService::new(
                Arc::clone(&repos.users),
                Arc::clone(&repos.follows),
            )),
            images: web::Data::from(images),
            index_cache: web::Data::new(PageCache::new(
                INDEX_CACHE_PREFIX,
                config.index_cache_ttl,
            )),
            limits: web::Data::new(UploadLimits {
                max_image_bytes: config.max_image_bytes,
            }),
        }
    }
}

/// Routes, shared state and the request middleware stack.
pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let max_body = state.limits.max_body_bytes();
    App::new()
        .wrap(IdentityMiddleware)
        .wrap(CsrfMiddleware)
        .wrap(TimingMiddleware)
        .wrap(RequestIdMiddleware)
        .app_data(state.auth)
        .app_data(state.feeds)
        .app_data(state.posts)
        .app_data(state.follows)
        .app_data(state.images)
        .app_data(state.index_cache)
        .app_data(state.limits)
        .app_data(web::PayloadConfig::new(max_body))
        .app_data(
            web::PathConfig::default()
                .error_handler(|_, req| DomainError::PageNotFound(full_path(req)).into()),
        )
        .service(handlers::site::health)
        .service(handlers::site::media)
        .service(handlers::site::choose_game)
        .service(handlers::site::tetris)
        .service(handlers::site::snake)
        .service(handlers::auth::scope())
        .service(handlers::posts::index)
        .service(handlers::posts::group_posts)
        .service(handlers::follow::profile_follow)
        .service(handlers::follow::profile_unfollow)
        .service(handlers::posts::profile)
        .service(handlers::posts::create_form)
        .service(handlers::posts::create_post)
        .service(handlers::posts::edit_form)
        .service(handlers::posts::edit_post)
        .service(handlers::posts::add_comment)
        .service(handlers::posts::post_detail)
        .service(handlers::follow::follow_index)
        .default_service(web::to(handlers::site::not_found))
}

pub async fn run(config: AppConfig, state: AppState) -> anyhow::Result<()> {
    let bind_address = (config.host.clone(), config.port);
    info!(host = %bind_address.0, port = bind_address.1, "HTTP server starting");

    HttpServer::new(move || {
        build_app(state.clone())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(build_cors(&config))
            .wrap(Logger::default())
    })
    .bind(bind_address)?
    .run()
    .await
    .map_err(anyhow::Error::new)?;

    Ok(())
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
            CSRF_HEADER.clone(),
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.cors_origins {
        cors = if origin == "*" {
            cors.allow_any_origin()
        } else {
            cors.allowed_origin(origin)
        };
    }

    cors
}
