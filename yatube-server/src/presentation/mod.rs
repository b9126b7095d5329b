pub mod dto;
pub mod form_body;
pub mod handlers;
pub mod middleware;
pub mod urls;
pub mod utils;
pub mod view;
