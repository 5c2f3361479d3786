pub mod auth;
pub mod presence;
