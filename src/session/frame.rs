//! Frame model shared by both legs of a session.
//!
//! The downstream leg speaks `axum`'s WebSocket types and the upstream leg
//! speaks `tungstenite`'s. Both are converted into [`Frame`] at the edge so
//! the relay only ever sees one type, and converted back on the way out.
//! Payloads move by value (`Bytes` is reference counted), never re-encoded.

use std::fmt;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame as AxumCloseFrame, Message as AxumMessage};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TungsteniteCloseFrame;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

/// Which leg of a session a frame or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The client that connected to the proxy.
    Downstream,
    /// The backend node the proxy connected to.
    Upstream,
}

impl Side {
    /// The opposite leg.
    pub fn peer(self) -> Side {
        match self {
            Side::Downstream => Side::Upstream,
            Side::Upstream => Side::Downstream,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Downstream => f.write_str("downstream"),
            Side::Upstream => f.write_str("upstream"),
        }
    }
}

/// Close code and reason carried by a Close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// Longest reason that fits a control frame (125 bytes minus the code).
    pub const MAX_REASON_LEN: usize = 123;

    /// Build a close reason, truncating `reason` on a char boundary if needed.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.len() > Self::MAX_REASON_LEN {
            let mut cut = Self::MAX_REASON_LEN;
            while !reason.is_char_boundary(cut) {
                cut -= 1;
            }
            reason.truncate(cut);
        }
        Self { code, reason }
    }
}

/// One WebSocket message as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
}

impl Frame {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping(_) => "ping",
            Frame::Pong(_) => "pong",
            Frame::Close(_) => "close",
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Frame::Close(_))
    }

    /// Payload length in bytes, for trace logging.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.len(),
            Frame::Close(reason) => reason.as_ref().map_or(0, |r| r.reason.len() + 2),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- downstream (axum) ---

impl From<AxumMessage> for Frame {
    fn from(message: AxumMessage) -> Self {
        match message {
            AxumMessage::Text(text) => Frame::Text(text.as_str().to_owned()),
            AxumMessage::Binary(data) => Frame::Binary(data),
            AxumMessage::Ping(data) => Frame::Ping(data),
            AxumMessage::Pong(data) => Frame::Pong(data),
            AxumMessage::Close(close) => Frame::Close(close.map(|c| CloseReason {
                code: c.code,
                reason: c.reason.as_str().to_owned(),
            })),
        }
    }
}

impl From<Frame> for AxumMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => AxumMessage::Text(text.into()),
            Frame::Binary(data) => AxumMessage::Binary(data),
            Frame::Ping(data) => AxumMessage::Ping(data),
            Frame::Pong(data) => AxumMessage::Pong(data),
            Frame::Close(close) => AxumMessage::Close(close.map(|c| AxumCloseFrame {
                code: c.code,
                reason: c.reason.into(),
            })),
        }
    }
}

// --- upstream (tungstenite) ---

/// A message kind the relay has no representation for.
///
/// tungstenite only yields raw `Message::Frame` values when misused; seeing one
/// on a read path means the leg is no longer speaking the protocol we expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedMessage(pub &'static str);

impl TryFrom<TungsteniteMessage> for Frame {
    type Error = UnexpectedMessage;

    fn try_from(message: TungsteniteMessage) -> Result<Self, Self::Error> {
        Ok(match message {
            TungsteniteMessage::Text(text) => Frame::Text(text.as_str().to_owned()),
            TungsteniteMessage::Binary(data) => Frame::Binary(data),
            TungsteniteMessage::Ping(data) => Frame::Ping(data),
            TungsteniteMessage::Pong(data) => Frame::Pong(data),
            TungsteniteMessage::Close(close) => Frame::Close(close.map(|c| CloseReason {
                code: u16::from(c.code),
                reason: c.reason.as_str().to_owned(),
            })),
            TungsteniteMessage::Frame(_) => return Err(UnexpectedMessage("raw frame")),
        })
    }
}

impl From<Frame> for TungsteniteMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => TungsteniteMessage::Text(text.into()),
            Frame::Binary(data) => TungsteniteMessage::Binary(data),
            Frame::Ping(data) => TungsteniteMessage::Ping(data),
            Frame::Pong(data) => TungsteniteMessage::Pong(data),
            Frame::Close(close) => TungsteniteMessage::Close(close.map(|c| TungsteniteCloseFrame {
                code: CloseCode::from(c.code),
                reason: c.reason.into(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reason_truncates_on_char_boundary() {
        let long = "é".repeat(100); // 200 bytes
        let reason = CloseReason::new(1011, long);
        assert!(reason.reason.len() <= CloseReason::MAX_REASON_LEN);
        assert!(reason.reason.chars().all(|c| c == 'é'));
    }

    #[test]
    fn binary_payload_survives_both_codecs() {
        let payload = Bytes::from_static(&[0, 159, 146, 150, 255]);

        let upstream: TungsteniteMessage = Frame::Binary(payload.clone()).into();
        let back = Frame::try_from(upstream).unwrap();
        let downstream: AxumMessage = back.into();

        match Frame::from(downstream) {
            Frame::Binary(data) => assert_eq!(data, payload),
            other => panic!("expected binary frame, got {:?}", other),
        }
    }

    #[test]
    fn close_code_and_reason_cross_from_upstream_to_downstream() {
        let upstream = TungsteniteMessage::Close(Some(TungsteniteCloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }));

        let frame = Frame::try_from(upstream).unwrap();
        assert_eq!(frame, Frame::Close(Some(CloseReason::new(1000, "bye"))));

        match AxumMessage::from(frame) {
            AxumMessage::Close(Some(close)) => {
                assert_eq!(close.code, 1000);
                assert_eq!(close.reason.as_str(), "bye");
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[test]
    fn raw_frames_are_rejected() {
        let raw = TungsteniteMessage::Frame(
            tokio_tungstenite::tungstenite::protocol::frame::Frame::ping(vec![1, 2]),
        );
        assert!(Frame::try_from(raw).is_err());
    }

    #[test]
    fn side_peer_is_an_involution() {
        assert_eq!(Side::Downstream.peer(), Side::Upstream);
        assert_eq!(Side::Upstream.peer().peer(), Side::Upstream);
    }
}
