//! Domain primitives shared by every Agora crate.

pub mod error;
pub mod types;
