use actix_web::{HttpRequest, HttpResponse, Responder, get, web};
use chrono::Utc;

use crate::domain::error::DomainError;
use crate::infrastructure::media::{ImageStore, is_servable, media_type};
use crate::presentation::dto::{ChooseGameContext, GameContext, HealthResponse};
use crate::presentation::utils::full_path;
use crate::presentation::view::{self, View};

#[get("/media/{path:.*}")]
async fn media(
    req: HttpRequest,
    images: web::Data<dyn ImageStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    if !is_servable(&path) {
        return Err(DomainError::Forbidden);
    }
    let data = images
        .read(&path)
        .await?
        .ok_or_else(|| DomainError::PageNotFound(full_path(&req)))?;
    Ok(HttpResponse::Ok()
        .content_type(media_type(&data))
        .body(data))
}

#[get("/game/")]
async fn choose_game() -> HttpResponse {
    View::new(view::CHOOSE_GAME, ChooseGameContext::default()).render()
}

#[get("/game/game_first/")]
async fn tetris() -> HttpResponse {
    View::new(view::GAME, GameContext { type_game: "tetris" }).render()
}

#[get("/game/game_second/")]
async fn snake() -> HttpResponse {
    View::new(view::GAME, GameContext { type_game: "snake" }).render()
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// Fallback for unmatched routes.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, DomainError> {
    Err(DomainError::PageNotFound(full_path(&req)))
}
