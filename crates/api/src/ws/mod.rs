//! Live connections: registry, dispatch, and the per-connection lifecycle.

pub mod dispatcher;
pub mod frames;
mod handler;
pub mod heartbeat;
pub mod lifecycle;
pub mod registry;

pub use dispatcher::EventDispatcher;
pub use handler::ws_handler;
pub use lifecycle::{CloseReason, ConnectionLifecycle};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
