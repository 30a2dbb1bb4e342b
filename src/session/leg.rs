//! One side of a session: an inbound frame stream plus an outbound send queue.
//!
//! # Responsibilities
//! - Normalize axum and tungstenite sockets into a single [`Frame`] stream
//! - Own a writer task that drains a FIFO send queue into the socket
//! - Close exactly once, however many times close is requested
//!
//! # Design Decisions
//! - The send queue is bounded; a sender waits for room, so a slow peer
//!   stops the relay from reading the other side
//! - Close travels out of band and is applied after everything already queued
//! - The writer stops at the first write error; the reader side notices on its own
//! - Closing flushes queued frames, completes the close handshake within a
//!   grace period, then drops the socket

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::stream::{BoxStream, StreamExt};
use futures_util::{Sink, SinkExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as TungsteniteMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ProxyError;
use crate::session::frame::{Frame, Side};

/// Frames a leg may hold before senders have to wait.
pub const QUEUE_DEPTH: usize = 32;

/// Inbound frames of a leg, already converted and error-mapped.
pub type FrameStream = BoxStream<'static, Result<Frame, ProxyError>>;

/// Socket type produced by the upstream connector.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Final frame, if any, written before the socket is closed.
type CloseRequest = Option<Frame>;

/// Cloneable write side of a leg.
#[derive(Debug, Clone)]
pub struct LegHandle {
    tx: mpsc::Sender<Frame>,
    close_tx: Arc<Mutex<Option<oneshot::Sender<CloseRequest>>>>,
    closed: Arc<AtomicBool>,
}

impl LegHandle {
    fn new() -> (Self, mpsc::Receiver<Frame>, oneshot::Receiver<CloseRequest>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                tx,
                close_tx: Arc::new(Mutex::new(Some(close_tx))),
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
            close_rx,
        )
    }

    /// Queue a frame for this leg, waiting while the queue is full.
    ///
    /// Returns `false` if the leg is closed or its writer has stopped.
    pub async fn send(&self, frame: Frame) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(frame).await.is_ok()
    }

    /// Ask the writer to flush and close the socket.
    ///
    /// Only the first call has an effect; it returns `true`.
    pub fn close(&self) -> bool {
        self.close_with(None)
    }

    /// Like [`close`](Self::close), writing `last` after the queued frames.
    ///
    /// Never waits, even when the queue is full.
    pub fn close_with(&self, last: Option<Frame>) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = self.close_tx.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(last);
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A live, framed connection owned by a session.
pub struct Leg {
    side: Side,
    frames: FrameStream,
    handle: LegHandle,
    writer: JoinHandle<()>,
}

impl fmt::Debug for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leg")
            .field("side", &self.side)
            .field("closed", &self.handle.is_closed())
            .finish_non_exhaustive()
    }
}

impl Leg {
    /// Wire a frame stream and a message sink into a leg, spawning its writer.
    pub fn new<Si, M>(side: Side, frames: FrameStream, sink: Si) -> Self
    where
        Si: Sink<M> + Send + Unpin + 'static,
        Si::Error: fmt::Display,
        M: From<Frame> + Send + 'static,
    {
        let (handle, rx, close_rx) = LegHandle::new();
        let writer = tokio::spawn(write_frames(side, sink, rx, close_rx));
        Self {
            side,
            frames,
            handle,
            writer,
        }
    }

    /// Leg over the client's upgraded connection.
    pub fn downstream(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let frames = stream
            .map(|item| match item {
                Ok(message) => Ok(Frame::from(message)),
                Err(e) => Err(ProxyError::Transport {
                    side: Side::Downstream,
                    reason: e.to_string(),
                }),
            })
            .boxed();
        Self::new::<_, AxumMessage>(Side::Downstream, frames, sink)
    }

    /// Leg over a connection to a backend node.
    pub fn upstream(socket: UpstreamSocket) -> Self {
        let (sink, stream) = socket.split();
        let frames = stream
            .map(|item| match item {
                Ok(message) => Frame::try_from(message).map_err(|unexpected| {
                    ProxyError::ProtocolViolation {
                        side: Side::Upstream,
                        reason: format!("unexpected {}", unexpected.0),
                    }
                }),
                Err(e) => Err(upstream_read_error(e)),
            })
            .boxed();
        Self::new::<_, TungsteniteMessage>(Side::Upstream, frames, sink)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn handle(&self) -> &LegHandle {
        &self.handle
    }

    /// Next inbound frame; `None` once the connection has ended.
    pub async fn next_frame(&mut self) -> Option<Result<Frame, ProxyError>> {
        self.frames.next().await
    }

    /// Close the leg and wait, at most `grace`, for it to finish.
    ///
    /// Queued frames are written first. Anything still arriving is discarded.
    pub async fn shut(self, grace: Duration) {
        let Leg {
            side,
            mut frames,
            handle,
            writer,
        } = self;

        handle.close();
        drop(handle);
        let abort = writer.abort_handle();

        let finish = async {
            let _ = writer.await;
            while let Some(Ok(frame)) = frames.next().await {
                tracing::trace!(%side, kind = frame.kind(), "Discarding frame on closing leg");
            }
        };

        if tokio::time::timeout(grace, finish).await.is_err() {
            tracing::debug!(%side, "Leg did not finish closing in time, dropping it");
            abort.abort();
        }
    }
}

async fn write_frames<Si, M>(
    side: Side,
    mut sink: Si,
    mut rx: mpsc::Receiver<Frame>,
    mut close_rx: oneshot::Receiver<CloseRequest>,
) where
    Si: Sink<M> + Unpin,
    Si::Error: fmt::Display,
    M: From<Frame>,
{
    let last = loop {
        tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if !write::<Si, M>(side, &mut sink, frame).await {
                        return;
                    }
                }
                None => break None,
            },
            request = &mut close_rx => break request.ok().flatten(),
        }
    };

    // Frames that were queued before the close request.
    while let Ok(frame) = rx.try_recv() {
        if !write::<Si, M>(side, &mut sink, frame).await {
            return;
        }
    }
    if let Some(frame) = last {
        if !write::<Si, M>(side, &mut sink, frame).await {
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::trace!(%side, error = %e, "Socket already closed");
    }
}

async fn write<Si, M>(side: Side, sink: &mut Si, frame: Frame) -> bool
where
    Si: Sink<M> + Unpin,
    Si::Error: fmt::Display,
    M: From<Frame>,
{
    let kind = frame.kind();
    match sink.send(M::from(frame)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(%side, kind, error = %e, "Write failed, stopping writer");
            false
        }
    }
}

fn upstream_read_error(error: WsError) -> ProxyError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ProxyError::PeerClosed(Side::Upstream),
        WsError::Protocol(e) => ProxyError::ProtocolViolation {
            side: Side::Upstream,
            reason: e.to_string(),
        },
        WsError::Capacity(e) => ProxyError::ProtocolViolation {
            side: Side::Upstream,
            reason: e.to_string(),
        },
        other => ProxyError::Transport {
            side: Side::Upstream,
            reason: other.to_string(),
        },
    }
}
