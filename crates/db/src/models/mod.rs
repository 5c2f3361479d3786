pub mod presence;
pub mod session;
pub mod user;
