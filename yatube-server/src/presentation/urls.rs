use url::form_urlencoded;
use uuid::Uuid;

pub const INDEX: &str = "/";
pub const LOGIN: &str = "/auth/login/";
pub const MEDIA_PREFIX: &str = "/media/";

pub fn profile(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn post_detail(id: Uuid) -> String {
    format!("/posts/{id}/")
}

pub fn login(next: &str) -> String {
    let next: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN}?next={next}")
}

pub fn media(path: &str) -> String {
    format!("{MEDIA_PREFIX}{path}")
}
