//! Outbound real-time event types.
//!
//! Every payload pushed over a live connection is an [`Envelope`]:
//! `{"type": <tag>, "payload": <json>}`. Payload construction belongs to the
//! feature that raises the event; this crate only fixes the envelope and the
//! set of known tags.
//!
//! - [`EventKind`] -- the known `type` tags.
//! - [`Envelope`] -- the wire envelope.
//! - [`PresenceChanged`] -- payload of `user_online` / `user_offline`.

pub mod envelope;
pub mod presence;

pub use envelope::{Envelope, EventKind};
pub use presence::PresenceChanged;
