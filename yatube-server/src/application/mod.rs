pub mod auth_service;
pub mod feed_service;
pub mod follow_service;
pub mod forms;
pub mod group_service;
pub mod page_cache;
pub mod paginator;
pub mod post_service;
