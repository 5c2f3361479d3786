//! Credentials, passwords and the session store.

pub mod credential;
pub mod password;
pub mod session;
