//! Per-connection task: register, read under a heartbeat deadline, route
//! inbound frames, and clean up exactly once.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use agora_core::types::DbId;
use axum::extract::ws::Message;
use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RealtimeConfig;
use crate::presence::PresenceTracker;
use crate::ws::dispatcher::EventDispatcher;
use crate::ws::frames::{classify, FrameError, InboundFrame};
use crate::ws::heartbeat::HeartbeatDeadline;
use crate::ws::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};

/// Malformed frames tolerated in a row before the connection is dropped.
pub const MAX_CONSECUTIVE_MALFORMED: u32 = 10;

/// Upper bound on sending the final Close frame to a stalled peer.
const SOCKET_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Read error or end of stream.
    ConnectionLost,
    /// No heartbeat within the configured timeout.
    HeartbeatTimeout,
    /// The peer sent a Close frame.
    ClosedByPeer,
    /// The close signal fired: shutdown, logout, session sweep, a failed
    /// write, or the dispatcher dropping the connection.
    Cancelled,
    TooManyMalformedFrames,
    /// The read loop panicked.
    Panicked,
}

impl CloseReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection_lost",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::ClosedByPeer => "closed_by_peer",
            Self::Cancelled => "cancelled",
            Self::TooManyMalformedFrames => "too_many_malformed_frames",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives live connections from registration to teardown.
///
/// Cheap to clone; one instance lives in [`AppState`](crate::state::AppState)
/// and each upgraded socket calls [`run`](Self::run) on it.
#[derive(Clone)]
pub struct ConnectionLifecycle {
    registry: Arc<ConnectionRegistry>,
    dispatcher: EventDispatcher,
    presence: Arc<PresenceTracker>,
    config: RealtimeConfig,
    shutdown: CancellationToken,
}

impl ConnectionLifecycle {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        dispatcher: EventDispatcher,
        presence: Arc<PresenceTracker>,
        config: RealtimeConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            presence,
            config,
            shutdown,
        }
    }

    /// Serve one authenticated connection until it closes.
    ///
    /// `sink` and `stream` are the two halves of the socket. Returns once
    /// cleanup has finished.
    pub async fn run<Si, St, E>(&self, sink: Si, mut stream: St, user_id: DbId) -> CloseReason
    where
        Si: Sink<Message> + Unpin + Send + 'static,
        Si::Error: fmt::Display + Send,
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let close = self.shutdown.child_token();
        let (handle, rx) = ConnectionHandle::new(user_id, close.clone());
        let conn_id = handle.id();

        self.registry.register(handle).await;
        tracing::info!(conn_id = %conn_id, user_id, "Connection opened");
        // A failed write is logged by the tracker; the connection stays up.
        let _ = self.presence.mark_online(user_id).await;

        let writer = tokio::spawn(write_outbound(sink, rx, close.clone(), conn_id));

        let reason = match AssertUnwindSafe(self.read_frames(&mut stream, user_id, conn_id, &close))
            .catch_unwind()
            .await
        {
            Ok(reason) => reason,
            Err(_) => {
                tracing::error!(conn_id = %conn_id, user_id, "Connection read loop panicked");
                CloseReason::Panicked
            }
        };

        self.cleanup(conn_id, user_id, close, writer).await;
        tracing::info!(conn_id = %conn_id, user_id, reason = %reason, "Connection closed");
        reason
    }

    async fn read_frames<St, E>(
        &self,
        stream: &mut St,
        user_id: DbId,
        conn_id: ConnectionId,
        close: &CancellationToken,
    ) -> CloseReason
    where
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let mut deadline = HeartbeatDeadline::new(self.config.heartbeat_timeout());
        let mut malformed = 0u32;

        loop {
            let next = tokio::select! {
                () = close.cancelled() => return CloseReason::Cancelled,
                () = deadline.expired() => return CloseReason::HeartbeatTimeout,
                next = stream.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Receive error");
                    return CloseReason::ConnectionLost;
                }
                None => return CloseReason::ConnectionLost,
            };

            let rejected = match message {
                Message::Close(_) => return CloseReason::ClosedByPeer,
                Message::Ping(_) | Message::Pong(_) => {
                    self.heartbeat(&mut deadline, user_id).await;
                    None
                }
                Message::Binary(_) => Some(FrameError::Binary),
                Message::Text(text) => match classify(text.as_str()) {
                    Ok(InboundFrame::Heartbeat) => {
                        self.heartbeat(&mut deadline, user_id).await;
                        None
                    }
                    Ok(InboundFrame::Typing(typing)) => {
                        let recipient_id = typing.recipient_id;
                        self.dispatcher
                            .send_event(recipient_id, &typing.into_envelope(user_id))
                            .await;
                        None
                    }
                    Ok(InboundFrame::Unrecognized { kind }) => {
                        if self.config.relay_unrecognized_frames {
                            self.dispatcher.broadcast(Message::Text(text)).await;
                        } else {
                            tracing::debug!(conn_id = %conn_id, kind = %kind, "Dropped unrecognized frame");
                        }
                        None
                    }
                    Err(e) => Some(e),
                },
            };

            match rejected {
                None => malformed = 0,
                Some(e) => {
                    malformed += 1;
                    tracing::warn!(conn_id = %conn_id, user_id, error = %e, malformed, "Ignored malformed frame");
                    if malformed > MAX_CONSECUTIVE_MALFORMED {
                        return CloseReason::TooManyMalformedFrames;
                    }
                }
            }
        }
    }

    /// Extend the deadline and re-mark the user online. Every heartbeat
    /// broadcasts `user_online` again so late joiners learn who is present.
    async fn heartbeat(&self, deadline: &mut HeartbeatDeadline, user_id: DbId) {
        deadline.reset();
        let _ = self.presence.mark_online(user_id).await;
    }

    /// Unregister, mark offline if this was the user's last connection, then
    /// close the socket.
    async fn cleanup<Si>(
        &self,
        conn_id: ConnectionId,
        user_id: DbId,
        close: CancellationToken,
        writer: JoinHandle<Si>,
    ) where
        Si: Sink<Message> + Unpin + Send + 'static,
    {
        let last = self
            .registry
            .unregister(conn_id)
            .await
            .is_some_and(|u| u.remaining_for_user == 0);
        if last {
            let _ = self.presence.mark_offline(user_id).await;
        }

        close.cancel();
        match writer.await {
            Ok(mut sink) => {
                let closing = async {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                };
                if tokio::time::timeout(SOCKET_CLOSE_TIMEOUT, closing).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "Timed out closing socket");
                }
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "Writer task failed");
            }
        }
    }
}

/// Drain the connection's outbound channel into the socket until the close
/// signal fires or a write fails. Hands the sink back for the final Close.
async fn write_outbound<Si>(
    mut sink: Si,
    mut rx: mpsc::UnboundedReceiver<Message>,
    close: CancellationToken,
    conn_id: ConnectionId,
) -> Si
where
    Si: Sink<Message> + Unpin,
    Si::Error: fmt::Display,
{
    loop {
        tokio::select! {
            biased;
            () = close.cancelled() => break,
            message = rx.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Socket write failed");
                    close.cancel();
                    break;
                }
            }
        }
    }
    sink
}
