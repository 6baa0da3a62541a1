//! CAN frames and 29-bit header bit fields.
//!
//! A `CanFrame` is a 29-bit extended header plus at most eight data bytes.
//! The header encodes either a CAN-level control operation (CID probe, RID,
//! AMD, AME, AMR, EIR0–3) or one segment of a full protocol message (MTI or
//! destination alias plus source alias). [`CanHeader`] is the decoded view;
//! bit patterns that match no defined layout decode to `CanHeader::Unknown`
//! and are dropped by the link layer, never surfaced as messages.
//!
//! ## Header layouts
//!
//! ```text
//! message frames:  [28:27]=0b11 [26:24]=format [23:12]=MTI or dest alias [11:0]=source alias
//! control frames:  [26:24]=0    [23:12]=control op (0x700..)             [11:0]=source alias
//! CID probes:      [26:24]=7..4 (probe index)  [23:12]=NodeID slice      [11:0]=candidate alias
//! ```

pub mod gridconnect;


use crate::identity::NodeID;
use std::fmt;

/// Mask selecting the 29 significant header bits.
pub const HEADER_MASK: u32 = 0x1FFF_FFFF;

/// Bit 27, set on message frames and clear on control frames.
pub const HEADER_MESSAGE_BIT: u32 = 0x0800_0000;

/// Bit 28, reserved; set alongside [`HEADER_MESSAGE_BIT`] when encoding.
pub const HEADER_RESERVED_BIT: u32 = 0x1000_0000;

/// Shift and mask for the 3-bit message frame format field.
pub const HEADER_FORMAT_SHIFT: u32 = 24;
pub const HEADER_FORMAT_MASK: u32 = 0x7;

/// Shift and mask for the 12-bit variable field (MTI, dest alias, control op).
pub const HEADER_VARIABLE_SHIFT: u32 = 12;
pub const HEADER_VARIABLE_MASK: u32 = 0xFFF;

/// Mask for the 12-bit source alias in the low header bits.
pub const HEADER_ALIAS_MASK: u32 = 0xFFF;

/// Mask selecting the CID probe index region (bits 26..24, values 4..=7).
pub const HEADER_CID_REGION: u32 = 0x0700_0000;

/// Control-frame operation codes (the 12-bit field just above the alias).
pub const CONTROL_RID: u16 = 0x700;
pub const CONTROL_AMD: u16 = 0x701;
pub const CONTROL_AME: u16 = 0x702;
pub const CONTROL_AMR: u16 = 0x703;
pub const CONTROL_EIR0: u16 = 0x710;
pub const CONTROL_EIR3: u16 = 0x713;

/// Message frame formats (bits 26..24 of the header).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameFormat {
    /// Global or addressed MTI; variable field holds the 12-bit MTI.
    Mti = 1,
    /// Complete datagram in a single frame; variable field holds dest alias.
    DatagramOnly = 2,
    /// First frame of a multi-frame datagram.
    DatagramFirst = 3,
    /// Middle frame of a multi-frame datagram.
    DatagramMiddle = 4,
    /// Final frame of a multi-frame datagram.
    DatagramLast = 5,
    /// Stream data; variable field holds dest alias.
    StreamData = 7,
}

impl FrameFormat {
    /// Decode the 3-bit format field. Values 0 and 6 are reserved.
    pub fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            1 => FrameFormat::Mti,
            2 => FrameFormat::DatagramOnly,
            3 => FrameFormat::DatagramFirst,
            4 => FrameFormat::DatagramMiddle,
            5 => FrameFormat::DatagramLast,
            7 => FrameFormat::StreamData,
            _ => return None,
        })
    }
}

/// Decoded view of a 29-bit header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanHeader {
    /// Alias-allocation probe: index 7 (most significant NodeID slice)
    /// down through 4, carrying the candidate alias.
    Cid { index: u8, slice: u16, alias: u16 },
    /// RID/AMD/AME/AMR/EIR control operation.
    Control { op: u16, alias: u16 },
    /// One segment of a protocol message.
    Message {
        format: FrameFormat,
        variable: u16,
        alias: u16,
    },
    /// No defined layout matches; logged and dropped by the link layer.
    Unknown,
}

/// One CAN frame: 29-bit header and at most eight data bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// 29-bit extended header.
    pub header: u32,
    /// 0..=8 data bytes.
    pub data: Vec<u8>,
}

impl CanFrame {
    /// Create a frame, masking the header to 29 bits and the data to 8 bytes.
    pub fn new(header: u32, data: Vec<u8>) -> Self {
        let mut data = data;
        data.truncate(8);
        Self {
            header: header & HEADER_MASK,
            data,
        }
    }

    /// Check-ID probe frame. `index` must be 4..=7; it selects which 12-bit
    /// slice of the NodeID rides in the variable field (7 = most
    /// significant).
    pub fn cid(index: u8, node: NodeID, alias: u16) -> Self {
        debug_assert!((4..=7).contains(&index));
        let shift = 12 * (u32::from(index) - 4);
        let slice = ((node.raw() >> shift) as u32) & HEADER_VARIABLE_MASK;
        let header = (u32::from(index) << HEADER_FORMAT_SHIFT)
            | (slice << HEADER_VARIABLE_SHIFT)
            | (u32::from(alias) & HEADER_ALIAS_MASK);
        Self {
            header,
            data: Vec::new(),
        }
    }

    /// Control frame with no payload (RID, or AME with no NodeID).
    pub fn control(op: u16, alias: u16) -> Self {
        Self {
            header: (u32::from(op) << HEADER_VARIABLE_SHIFT) | (u32::from(alias) & HEADER_ALIAS_MASK),
            data: Vec::new(),
        }
    }

    /// Control frame carrying a NodeID payload (AMD, AMR, AME-with-id).
    pub fn control_with_id(op: u16, alias: u16, node: NodeID) -> Self {
        Self {
            header: (u32::from(op) << HEADER_VARIABLE_SHIFT) | (u32::from(alias) & HEADER_ALIAS_MASK),
            data: node.to_bytes().to_vec(),
        }
    }

    /// Reply-ID frame, ending an uncontested allocation sequence.
    pub fn rid(alias: u16) -> Self {
        Self::control(CONTROL_RID, alias)
    }

    /// Alias-map-definition frame binding `alias` to `node`.
    pub fn amd(alias: u16, node: NodeID) -> Self {
        Self::control_with_id(CONTROL_AMD, alias, node)
    }

    /// Alias-map-enquiry frame; `node` of `None` asks every node to answer.
    pub fn ame(alias: u16, node: Option<NodeID>) -> Self {
        match node {
            Some(node) => Self::control_with_id(CONTROL_AME, alias, node),
            None => Self::control(CONTROL_AME, alias),
        }
    }

    /// Alias-map-reset frame withdrawing `alias`.
    pub fn amr(alias: u16, node: NodeID) -> Self {
        Self::control_with_id(CONTROL_AMR, alias, node)
    }

    /// Message frame with the given format, variable field, and source alias.
    pub fn message(format: FrameFormat, variable: u16, alias: u16, data: Vec<u8>) -> Self {
        let header = HEADER_RESERVED_BIT
            | HEADER_MESSAGE_BIT
            | ((format as u32) << HEADER_FORMAT_SHIFT)
            | ((u32::from(variable) & HEADER_VARIABLE_MASK) << HEADER_VARIABLE_SHIFT)
            | (u32::from(alias) & HEADER_ALIAS_MASK);
        Self::new(header, data)
    }

    /// The 12-bit source alias in the low header bits.
    pub fn source_alias(&self) -> u16 {
        (self.header & HEADER_ALIAS_MASK) as u16
    }

    /// The 12-bit variable field.
    pub fn variable_field(&self) -> u16 {
        ((self.header >> HEADER_VARIABLE_SHIFT) & HEADER_VARIABLE_MASK) as u16
    }

    /// Decode the header into its structural form.
    pub fn decode(&self) -> CanHeader {
        let alias = self.source_alias();
        if self.header & HEADER_MESSAGE_BIT != 0 {
            let bits = (self.header >> HEADER_FORMAT_SHIFT) & HEADER_FORMAT_MASK;
            return match FrameFormat::from_bits(bits) {
                Some(format) => CanHeader::Message {
                    format,
                    variable: self.variable_field(),
                    alias,
                },
                None => CanHeader::Unknown,
            };
        }
        let cid = (self.header & HEADER_CID_REGION) >> HEADER_FORMAT_SHIFT;
        if (4..=7).contains(&cid) {
            return CanHeader::Cid {
                index: cid as u8,
                slice: self.variable_field(),
                alias,
            };
        }
        let op = self.variable_field();
        match op {
            CONTROL_RID | CONTROL_AMD | CONTROL_AME | CONTROL_AMR => {
                CanHeader::Control { op, alias }
            }
            _ if (CONTROL_EIR0..=CONTROL_EIR3).contains(&op) => CanHeader::Control { op, alias },
            _ => CanHeader::Unknown,
        }
    }

    /// The NodeID carried in a six-byte control payload, if present.
    pub fn node_id_payload(&self) -> Option<NodeID> {
        NodeID::from_slice(self.data.get(0..6)?).ok()
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanFrame(0x{:08X}", self.header)?;
        if !self.data.is_empty() {
            write!(f, " [{}]", hex::encode_upper(&self.data))?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&gridconnect::encode(self))
    }
}
