//! Node and event identifiers.
//!
//! A `NodeID` identifies a node for the lifetime of the network; an
//! `EventID` identifies a produced/consumed event. Both are immutable
//! value types with dotted-hex canonical text forms (`05.01.01.01.03.01`,
//! `05.01.01.01.03.01.00.2C`).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Errors from parsing identifier text forms.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("expected {expected} dot-separated octets, got {actual}")]
    WrongOctetCount { expected: usize, actual: usize },

    #[error("invalid hex octet '{0}'")]
    InvalidOctet(String),
}

/// Mask selecting the 48 significant bits of a `NodeID`.
pub const NODE_ID_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// 48-bit node identifier, unique for the lifetime of the network.
///
/// Stored in the low 48 bits of a `u64`. `NodeID::ZERO` is reserved as a
/// placeholder: the link layer substitutes it for addresses whose alias is
/// not yet mapped, and internal link up/down messages carry it as source.
/// It never identifies a real node.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeID(u64);

impl NodeID {
    /// Reserved placeholder, never a real node.
    pub const ZERO: NodeID = NodeID(0);

    /// Create from a raw value; bits above 48 are discarded.
    pub fn new(raw: u64) -> Self {
        Self(raw & NODE_ID_MASK)
    }

    /// Create from the canonical 6-byte big-endian form.
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        let mut raw = 0u64;
        for b in bytes {
            raw = (raw << 8) | u64::from(b);
        }
        Self(raw)
    }

    /// Create from a slice, requiring exactly 6 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, IdentityError> {
        if slice.len() != 6 {
            return Err(IdentityError::WrongOctetCount {
                expected: 6,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(Self::from_bytes(bytes))
    }

    /// The raw 48-bit value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The canonical 6-byte big-endian form.
    pub fn to_bytes(&self) -> [u8; 6] {
        let mut bytes = [0u8; 6];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (self.0 >> (40 - 8 * i)) as u8;
        }
        bytes
    }

    /// Whether this is the reserved placeholder.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        write!(
            f,
            "{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID({})", self)
    }
}

impl FromStr for NodeID {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets = parse_octets(s, 6)?;
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(&octets);
        Ok(Self::from_bytes(bytes))
    }
}

/// 64-bit event identifier.
///
/// By convention the high 48 bits are the originating node's `NodeID` and
/// the low 16 bits distinguish events within that node, but the value is
/// opaque to this stack.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventID(u64);

impl EventID {
    /// Create from a raw 64-bit value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Create from the canonical 8-byte big-endian form.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Create from a slice, requiring exactly 8 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, IdentityError> {
        if slice.len() != 8 {
            return Err(IdentityError::WrongOctetCount {
                expected: 8,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(slice);
        Ok(Self(u64::from_be_bytes(bytes)))
    }

    /// Build an event id in a node's conventional 48+16 range.
    pub fn from_node(node: NodeID, suffix: u16) -> Self {
        Self((node.raw() << 16) | u64::from(suffix))
    }

    /// The raw 64-bit value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The canonical 8-byte big-endian form.
    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for EventID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_bytes();
        write!(
            f,
            "{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}.{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

impl fmt::Debug for EventID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventID({})", self)
    }
}

impl FromStr for EventID {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets = parse_octets(s, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&octets);
        Ok(Self::from_bytes(bytes))
    }
}

/// Parse `count` dot-separated hex octets.
fn parse_octets(s: &str, count: usize) -> Result<Vec<u8>, IdentityError> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != count {
        return Err(IdentityError::WrongOctetCount {
            expected: count,
            actual: parts.len(),
        });
    }
    parts
        .iter()
        .map(|p| u8::from_str_radix(p, 16).map_err(|_| IdentityError::InvalidOctet(p.to_string())))
        .collect()
}
