//! Agora API server library.
//!
//! Exposes the building blocks of the real-time layer (session store,
//! connection registry, dispatcher, presence tracker, connection lifecycle,
//! session sweeper) together with config, state, error handling and routes,
//! so integration tests and the binary entrypoint can both access them.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod presence;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
