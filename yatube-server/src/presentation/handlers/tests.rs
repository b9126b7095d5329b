use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::{StatusCode, header};
use actix_web::test::{self, TestRequest};
use serde_json::Value;
use uuid::Uuid;

use crate::data::Repositories;
use crate::data::group_repository::GroupRepository;
use crate::data::memory::MemoryStore;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::group::Group;
use crate::domain::post::{Post, PostFilter};
use crate::domain::user::User;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::media::{LocalImageStore, MemoryImageStore};
use crate::infrastructure::media::tests::SMALL_GIF;
use crate::presentation::form_body::tests::{multipart_body, multipart_content_type};
use crate::presentation::middleware::{CSRF_COOKIE, CSRF_HEADER};
use crate::presentation::utils::SESSION_COOKIE;
use crate::server::{AppState, build_app};

const URLENCODED: &str = "application/x-www-form-urlencoded";

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: None,
        jwt_secret: "test-secret".into(),
        cors_origins: Vec::new(),
        page_size: AppConfig::DEFAULT_PAGE_SIZE,
        index_cache_ttl: Duration::from_secs(AppConfig::DEFAULT_INDEX_CACHE_TTL_SECS),
        media_root: PathBuf::from("media"),
        max_image_bytes: AppConfig::DEFAULT_MAX_IMAGE_BYTES,
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    state: AppState,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            &test_config(),
            &Repositories::memory(Arc::clone(&store)),
            Arc::new(MemoryImageStore::new()),
        );
        Self { store, state }
    }

    /// A stored user and a bearer token for them.
    async fn user(&self, username: &str) -> (User, String) {
        let user = UserRepository::create(
            self.store.as_ref(),
            User::new(username.into(), format!("{username}@example.com"), "x".into()),
        )
        .await
        .expect("user");
        let token = self
            .state
            .auth
            .keys()
            .generate_token(user.id)
            .expect("token");
        (user, token)
    }

    async fn group(&self, slug: &str) -> Group {
        GroupRepository::create(
            self.store.as_ref(),
            Group::new(format!("Group {slug}"), slug.into(), "texttexttext".into()),
        )
        .await
        .expect("group")
    }

    async fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        PostRepository::create(
            self.store.as_ref(),
            Post::new(author.id, text.into(), group.map(|g| g.id), None),
        )
        .await
        .expect("post")
    }

    async fn post_count(&self) -> u64 {
        PostRepository::count(self.store.as_ref(), PostFilter::All)
            .await
            .expect("count")
    }
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

fn location<B>(resp: &ServiceResponse<B>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn post_texts(body: &Value) -> Vec<String> {
    body["context"]["page_obj"]["object_list"]
        .as_array()
        .expect("object_list")
        .iter()
        .map(|post| post["text"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[actix_web::test]
async fn authorized_client_creates_post_with_group_and_image() {
    let h = Harness::new();
    let (leo, token) = h.user("leo").await;
    let group = h.group("cats").await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let body = multipart_body(
        &[("text", "Тестовый текст"), ("group", &group.id.to_string())],
        Some(SMALL_GIF),
    );
    let req = TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, multipart_content_type()))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/leo/");
    assert_eq!(h.post_count().await, 1);

    let stored = PostRepository::list(h.store.as_ref(), PostFilter::Author(leo.id), 10, 0)
        .await
        .expect("list");
    let post = &stored[0];
    assert_eq!(post.text, "Тестовый текст");
    assert_eq!(post.group.as_ref().map(|g| g.id), Some(group.id));
    let image = post.image.clone().expect("image stored");
    assert!(image.starts_with("posts/"));

    let req = TestRequest::get().uri(&format!("/media/{image}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"image/gif"[..])
    );
}

#[actix_web::test]
async fn invalid_post_rerenders_form_without_saving() {
    let h = Harness::new();
    let (_, token) = h.user("leo").await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri("/create/")
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("text=++&group=unknown")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["template"], "posts/create_post.html");
    assert_eq!(body["context"]["is_edit"], false);
    assert!(body["context"]["form"]["errors"]["text"].is_array());
    assert!(body["context"]["form"]["errors"]["group"].is_array());
    assert_eq!(h.post_count().await, 0);
}

#[actix_web::test]
async fn guest_is_sent_to_login_from_protected_pages() {
    let h = Harness::new();
    let (leo, _) = h.user("leo").await;
    let post = h.post(&leo, "text", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let cases = [
        "/create/".to_string(),
        format!("/posts/{}/edit/", post.id),
        "/follow/".to_string(),
        "/profile/leo/follow/".to_string(),
    ];
    for uri in cases {
        let req = TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{uri}");
        let encoded: String =
            url::form_urlencoded::byte_serialize(uri.as_bytes()).collect();
        assert_eq!(location(&resp), format!("/auth/login/?next={encoded}"));
    }
}

#[actix_web::test]
async fn author_edits_post_in_place() {
    let h = Harness::new();
    let (leo, token) = h.user("leo").await;
    let group = h.group("cats").await;
    let post = h.post(&leo, "before", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::get()
        .uri(&format!("/posts/{}/edit/", post.id))
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["template"], "posts/create_post.html");
    assert_eq!(body["context"]["is_edit"], true);
    assert_eq!(body["context"]["form"]["text"], "before");

    let req = TestRequest::post()
        .uri(&format!("/posts/{}/edit/", post.id))
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload(format!("text=after&group={}", group.id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));
    assert_eq!(h.post_count().await, 1);
    let edited = PostRepository::find_by_id(h.store.as_ref(), post.id)
        .await
        .expect("find")
        .expect("post");
    assert_eq!(edited.text, "after");
    assert_eq!(edited.group_id, Some(group.id));
}

#[actix_web::test]
async fn non_author_edit_leaves_post_untouched() {
    let h = Harness::new();
    let (leo, _) = h.user("leo").await;
    let (_, other_token) = h.user("other").await;
    let post = h.post(&leo, "original", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri(&format!("/posts/{}/edit/", post.id))
        .insert_header(bearer(&other_token))
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("text=hijacked")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));
    let unchanged = PostRepository::find_by_id(h.store.as_ref(), post.id)
        .await
        .expect("find")
        .expect("post");
    assert_eq!(unchanged, post);
}

#[actix_web::test]
async fn only_authorized_clients_can_comment() {
    let h = Harness::new();
    let (leo, token) = h.user("leo").await;
    let post = h.post(&leo, "text", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;
    let uri = format!("/posts/{}/comment/", post.id);

    let req = TestRequest::post()
        .uri(&uri)
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("text=from+a+guest")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(location(&resp).starts_with("/auth/login/?next="));
    assert_eq!(h.store.comment_count().await, 0);

    let req = TestRequest::post()
        .uri(&uri)
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("text=nice+post")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));
    assert_eq!(h.store.comment_count().await, 1);

    let req = TestRequest::get().uri(&format!("/posts/{}/", post.id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["template"], "posts/post_detail.html");
    assert_eq!(body["context"]["comments"][0]["text"], "nice post");
    assert_eq!(body["context"]["comments"][0]["author"]["username"], "leo");
}

#[actix_web::test]
async fn blank_and_duplicate_comments_are_reported() {
    let h = Harness::new();
    let (leo, token) = h.user("leo").await;
    let post = h.post(&leo, "text", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;
    let uri = format!("/posts/{}/comment/", post.id);

    let comment = |payload: &'static str| {
        TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&token))
            .insert_header((header::CONTENT_TYPE, URLENCODED))
            .set_payload(payload)
            .to_request()
    };

    let body: Value = test::call_and_read_body_json(&app, comment("text=+")).await;
    assert_eq!(body["template"], "posts/post_detail.html");
    assert!(body["context"]["form"]["errors"]["text"].is_array());

    let resp = test::call_service(&app, comment("text=same")).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let body: Value = test::call_and_read_body_json(&app, comment("text=same")).await;
    assert_eq!(
        body["context"]["form"]["errors"]["text"][0],
        crate::application::forms::DUPLICATE_COMMENT
    );
    assert_eq!(body["context"]["form"]["text"], "same");
    assert_eq!(h.store.comment_count().await, 1);
}

#[actix_web::test]
async fn multipart_comment_is_accepted() {
    let h = Harness::new();
    let (leo, token) = h.user("leo").await;
    let post = h.post(&leo, "text", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri(&format!("/posts/{}/comment/", post.id))
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, multipart_content_type()))
        .set_payload(multipart_body(&[("text", "from multipart")], None))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));
    assert_eq!(h.store.comment_count().await, 1);
}

#[actix_web::test]
async fn comment_on_missing_post_is_not_found_whatever_the_body() {
    let h = Harness::new();
    let (_, token) = h.user("leo").await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri(&format!("/posts/{}/comment/", Uuid::new_v4()))
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not a form")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["template"], "core/404.html");
}

#[actix_web::test]
async fn malformed_comment_body_is_a_bad_request() {
    let h = Harness::new();
    let (leo, token) = h.user("leo").await;
    let post = h.post(&leo, "text", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri(&format!("/posts/{}/comment/", post.id))
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not a form")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.store.comment_count().await, 0);
}

#[actix_web::test]
async fn feeds_split_eleven_posts_into_ten_and_one() {
    let h = Harness::new();
    let (leo, _) = h.user("leo").await;
    let group = h.group("cats").await;
    for i in 0..11 {
        h.post(&leo, &format!("post {i}"), Some(&group)).await;
    }
    let app = test::init_service(build_app(h.state.clone())).await;

    for base in ["/", "/group/cats/", "/profile/leo/"] {
        let req = TestRequest::get().uri(base).to_request();
        let first: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(post_texts(&first).len(), 10, "{base}");
        assert_eq!(post_texts(&first)[0], "post 10");
        assert_eq!(first["context"]["page_obj"]["has_next"], true);

        let req = TestRequest::get().uri(&format!("{base}?page=2")).to_request();
        let second: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(post_texts(&second), vec!["post 0".to_string()], "{base}");
        assert_eq!(second["context"]["page_obj"]["number"], 2);
    }

    let req = TestRequest::get().uri("/group/cats/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["template"], "posts/group_list.html");
    assert_eq!(body["context"]["group"]["slug"], "cats");
    assert_eq!(
        body["context"]["page_obj"]["object_list"][0]["group"]["slug"],
        "cats"
    );
}

#[actix_web::test]
async fn follow_feed_tracks_follow_and_unfollow() {
    let h = Harness::new();
    let (_, reader_token) = h.user("reader").await;
    let (_, stranger_token) = h.user("stranger").await;
    let (author, author_token) = h.user("author").await;
    h.post(&author, "followed post", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let follow_feed = |token: &str| {
        TestRequest::get()
            .uri("/follow/")
            .insert_header(bearer(token))
            .to_request()
    };

    let req = TestRequest::get()
        .uri("/profile/author/follow/")
        .insert_header(bearer(&reader_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/author/");

    let body: Value = test::call_and_read_body_json(&app, follow_feed(&reader_token)).await;
    assert_eq!(body["template"], "posts/follow.html");
    assert_eq!(post_texts(&body), vec!["followed post".to_string()]);

    let body: Value = test::call_and_read_body_json(&app, follow_feed(&stranger_token)).await;
    assert!(post_texts(&body).is_empty());

    let req = TestRequest::get()
        .uri("/profile/author/")
        .insert_header(bearer(&reader_token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["context"]["following"], true);

    for _ in 0..2 {
        let req = TestRequest::get()
            .uri("/profile/author/unfollow/")
            .insert_header(bearer(&reader_token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
    }
    let body: Value = test::call_and_read_body_json(&app, follow_feed(&reader_token)).await;
    assert!(post_texts(&body).is_empty());

    let req = TestRequest::get()
        .uri("/profile/author/follow/")
        .insert_header(bearer(&author_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/profile/author/");
    assert_eq!(h.store.follow_count().await, 0);
}

#[actix_web::test]
async fn index_is_served_from_cache_until_cleared() {
    let h = Harness::new();
    let (leo, _) = h.user("leo").await;
    let post = h.post(&leo, "cached post", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let before = test::call_and_read_body(&app, TestRequest::get().uri("/").to_request()).await;
    h.store.remove_post(post.id).await;

    let during = test::call_and_read_body(&app, TestRequest::get().uri("/").to_request()).await;
    assert_eq!(before, during);

    h.state.index_cache.clear().await;
    let after = test::call_and_read_body(&app, TestRequest::get().uri("/").to_request()).await;
    assert_ne!(before, after);
}

#[actix_web::test]
async fn index_cache_ignores_unrelated_query_keys() {
    let h = Harness::new();
    let (leo, _) = h.user("leo").await;
    let post = h.post(&leo, "cached post", None).await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let before = test::call_and_read_body(&app, TestRequest::get().uri("/").to_request()).await;
    h.store.remove_post(post.id).await;

    for n in 0..50 {
        let req = TestRequest::get().uri(&format!("/?x={n}")).to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, before);
    }
    assert_eq!(h.state.index_cache.len().await, 1);

    let second: Value =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/?page=2").to_request())
            .await;
    assert!(post_texts(&second).is_empty());
    assert_eq!(h.state.index_cache.len().await, 2);
}

#[actix_web::test]
async fn missing_pages_render_not_found_template() {
    let h = Harness::new();
    let app = test::init_service(build_app(h.state.clone())).await;
    let missing_post = format!("/posts/{}/", Uuid::new_v4());

    for uri in [
        "/imposter_page/",
        "/group/missing/",
        "/profile/nobody/",
        "/posts/not-a-uuid/",
        missing_post.as_str(),
        "/media/posts/missing.gif",
        "/media/posts/",
    ] {
        let req = TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["template"], "core/404.html", "{uri}");
    }

    let req = TestRequest::get().uri("/imposter_page/").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["context"]["path"], "/imposter_page/");
}

#[actix_web::test]
async fn cookie_sessions_must_echo_csrf_token() {
    let h = Harness::new();
    let (_, token) = h.user("leo").await;
    let app = test::init_service(build_app(h.state.clone())).await;

    let resp = test::call_service(&app, TestRequest::get().uri("/").to_request()).await;
    let csrf = resp
        .response()
        .cookies()
        .find(|c| c.name() == CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .expect("csrf cookie issued");

    let req = TestRequest::post()
        .uri("/create/")
        .cookie(Cookie::new(SESSION_COOKIE, token.clone()))
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("text=no+token")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["template"], "core/403csrf.html");
    assert_eq!(h.post_count().await, 0);

    let req = TestRequest::post()
        .uri("/create/")
        .cookie(Cookie::new(SESSION_COOKIE, token))
        .cookie(Cookie::new(CSRF_COOKIE, csrf.clone()))
        .insert_header((CSRF_HEADER.clone(), csrf))
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("text=with+token")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(h.post_count().await, 1);
}

#[actix_web::test]
async fn media_paths_outside_uploads_are_forbidden() {
    let h = Harness::new();
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::get().uri("/media/secrets.txt").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["template"], "core/403.html");
}

#[actix_web::test]
async fn upload_directory_on_disk_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = LocalImageStore::new(dir.path().to_path_buf())
        .await
        .expect("store");
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        &test_config(),
        &Repositories::memory(store),
        Arc::new(images),
    );
    let app = test::init_service(build_app(state)).await;

    for uri in ["/media/posts/", "/media/posts"] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["template"], "core/404.html", "{uri}");
    }
}

#[actix_web::test]
async fn game_pages_render_for_guests() {
    let h = Harness::new();
    let app = test::init_service(build_app(h.state.clone())).await;

    let body: Value =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/game/").to_request()).await;
    assert_eq!(body["template"], "includes/choose_game.html");
    assert_eq!(body["context"], serde_json::json!({}));

    for (uri, kind) in [("/game/game_first/", "tetris"), ("/game/game_second/", "snake")] {
        let body: Value =
            test::call_and_read_body_json(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(body["template"], "includes/game.html", "{uri}");
        assert_eq!(body["context"]["type_game"], kind, "{uri}");
    }
}

#[actix_web::test]
async fn signup_then_login_issues_session() {
    let h = Harness::new();
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri("/auth/signup/")
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("username=newbie&email=New%40Example.com&password=long-enough")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(resp.response().cookies().any(|c| c.name() == SESSION_COOKIE));

    let req = TestRequest::post()
        .uri("/auth/signup/")
        .set_json(serde_json::json!({
            "username": "newbie",
            "email": "other@example.com",
            "password": "long-enough"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["template"], "users/signup.html");
    assert!(body["context"]["errors"]["username"].is_array());

    let req = TestRequest::post()
        .uri("/auth/login/?next=%2Fcreate%2F")
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("username=newbie&password=long-enough")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["next"], "/create/");
    let token = body["access_token"].as_str().expect("token").to_string();

    let req = TestRequest::get()
        .uri("/create/")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = TestRequest::post()
        .uri("/auth/login/")
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("username=newbie&password=wrong-password")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["template"], "users/login.html");
    assert!(body["context"]["errors"]["__all__"].is_array());
}

#[actix_web::test]
async fn short_password_and_bad_username_rerender_signup() {
    let h = Harness::new();
    let app = test::init_service(build_app(h.state.clone())).await;

    let req = TestRequest::post()
        .uri("/auth/signup/")
        .insert_header((header::CONTENT_TYPE, URLENCODED))
        .set_payload("username=bad+name&password=short")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["template"], "users/signup.html");
    assert!(body["context"]["errors"]["username"].is_array());
    assert!(body["context"]["errors"]["password"].is_array());
}

#[actix_web::test]
async fn logout_clears_session_cookie() {
    let h = Harness::new();
    let app = test::init_service(build_app(h.state.clone())).await;

    let resp = test::call_service(&app, TestRequest::get().uri("/auth/logout/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");
    let cleared = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .expect("removal cookie");
    assert_eq!(cleared.value(), "");
}
