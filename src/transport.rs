//! Transport layer abstractions.
//!
//! Transports move CAN frames between the stack and the physical (or
//! emulated) bus. Received frames and link status changes are delivered
//! through an event channel; sending is an async call on the transport.

pub mod tcp;

use crate::frame::CanFrame;
use thiserror::Error;

/// An event delivered from a transport to the stack's owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport is connected; the link layer may come up.
    Connected,
    /// One CAN frame received.
    Frame(CanFrame),
    /// The connection dropped; the link layer must go down.
    Disconnected,
}

/// Channel sender for transport events.
pub type EventTx = tokio::sync::mpsc::Sender<TransportEvent>;

/// Channel receiver for transport events.
pub type EventRx = tokio::sync::mpsc::Receiver<TransportEvent>;

/// Create a transport event channel with the given buffer size.
pub fn event_channel(buffer: usize) -> (EventTx, EventRx) {
    tokio::sync::mpsc::channel(buffer)
}

/// Errors related to transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not started")]
    NotStarted,

    #[error("transport already started")]
    AlreadyStarted,

    #[error("transport failed to start: {0}")]
    StartFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Lifecycle state of a transport instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    /// Created but not yet started.
    Configured,
    /// Start in progress.
    Starting,
    /// Connected and moving frames.
    Up,
    /// Stopped or dropped.
    Down,
}

impl TransportState {
    pub fn can_start(&self) -> bool {
        matches!(self, TransportState::Configured | TransportState::Down)
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, TransportState::Up)
    }
}
