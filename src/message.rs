//! Protocol messages.
//!
//! A `Message` is the unit the upper layers deal in: an [`Mti`], a source
//! `NodeID`, an optional destination, and a payload. Identity (equality and
//! hashing) is defined on `(mti, source, destination)` only — a message's
//! identity for deduplication and dispatch is its type and endpoints, not
//! its content.

mod mti;


pub use mti::{
    Mti, MTI_ADDRESS_PRESENT, MTI_CAN_MASK, MTI_EVENT_PRESENT, MTI_INTERNAL, MTI_PRIORITY_MASK,
    MTI_PRIORITY_SHIFT, MTI_SIMPLE_PROTOCOL,
};

use crate::identity::{EventID, NodeID};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Well-known protocol error codes carried in rejection replies.
pub mod codes {
    /// Permanent error, general.
    pub const PERMANENT_ERROR: u16 = 0x1000;
    /// Permanent error, unknown MTI or subcommand.
    pub const UNKNOWN_MTI: u16 = 0x1040;
    /// Temporary error, general.
    pub const TEMPORARY_ERROR: u16 = 0x2000;
    /// Temporary error, buffer unavailable.
    pub const BUFFER_UNAVAILABLE: u16 = 0x2020;
    /// Datagram or stream not accepted, permanent.
    pub const NOT_ACCEPTED: u16 = 0x1044;
}

/// One protocol message.
#[derive(Clone)]
pub struct Message {
    /// Message type indicator.
    pub mti: Mti,
    /// Originating node.
    pub source: NodeID,
    /// Destination node for addressed MTIs, `None` for global ones.
    pub destination: Option<NodeID>,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl Message {
    /// Create a global (unaddressed) message.
    pub fn global(mti: Mti, source: NodeID, data: Vec<u8>) -> Self {
        Self {
            mti,
            source,
            destination: None,
            data,
        }
    }

    /// Create an addressed message.
    pub fn addressed(mti: Mti, source: NodeID, destination: NodeID, data: Vec<u8>) -> Self {
        Self {
            mti,
            source,
            destination: Some(destination),
            data,
        }
    }

    /// Whether this message has no destination address.
    pub fn is_global(&self) -> bool {
        self.destination.is_none()
    }

    /// Whether this message is addressed to `node`.
    pub fn is_addressed_to(&self, node: NodeID) -> bool {
        self.destination == Some(node)
    }

    /// The event id in the first eight payload bytes, for event MTIs.
    ///
    /// Returns `None` when the MTI does not carry an event or the payload
    /// is truncated.
    pub fn event_id(&self) -> Option<EventID> {
        if !self.mti.event_present() {
            return None;
        }
        EventID::from_slice(self.data.get(0..8)?).ok()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        // Payload is deliberately excluded.
        self.mti == other.mti
            && self.source == other.source
            && self.destination == other.destination
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mti.hash(state);
        self.source.hash(state);
        self.destination.hash(state);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.destination {
            Some(dest) => write!(
                f,
                "Message({} {} -> {}, {} bytes)",
                self.mti,
                self.source,
                dest,
                self.data.len()
            ),
            None => write!(
                f,
                "Message({} {} global, {} bytes)",
                self.mti,
                self.source,
                self.data.len()
            ),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
