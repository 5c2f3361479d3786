//! Long-running background tasks started once at startup.

pub mod session_sweeper;
