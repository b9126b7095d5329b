pub mod auth;
pub mod follow;
pub mod posts;
pub mod site;

#[cfg(test)]
mod tests;
