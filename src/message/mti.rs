//! 16-bit message type indicator.
//!
//! The MTI space is open: unrecognized values must survive decode so that
//! addressed messages with unknown MTIs can be answered with
//! Optional_Interaction_Rejected carrying the offending value. `Mti` is
//! therefore a newtype over the raw code with named constants for the
//! well-known values, not a closed enum.

use std::fmt;

/// Bit set when the message carries an explicit destination address.
pub const MTI_ADDRESS_PRESENT: u16 = 0x0008;

/// Bit set when the first eight payload bytes are an `EventID`.
pub const MTI_EVENT_PRESENT: u16 = 0x0004;

/// Bit set for simple-protocol messages.
pub const MTI_SIMPLE_PROTOCOL: u16 = 0x0010;

/// Mask and shift for the 2-bit priority field.
pub const MTI_PRIORITY_MASK: u16 = 0x0C00;
pub const MTI_PRIORITY_SHIFT: u16 = 10;

/// Bit marking stack-internal MTIs that never appear on the wire.
pub const MTI_INTERNAL: u16 = 0x2000;

/// Mask selecting the 12 bits of an MTI that fit in a CAN header.
pub const MTI_CAN_MASK: u16 = 0x0FFF;

/// 16-bit message type indicator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mti(u16);

impl Mti {
    pub const INITIALIZATION_COMPLETE: Mti = Mti(0x0100);
    pub const INITIALIZATION_COMPLETE_SIMPLE: Mti = Mti(0x0101);
    pub const VERIFY_NODE_ID_ADDRESSED: Mti = Mti(0x0488);
    pub const VERIFY_NODE_ID_GLOBAL: Mti = Mti(0x0490);
    pub const VERIFIED_NODE_ID: Mti = Mti(0x0170);
    pub const OPTIONAL_INTERACTION_REJECTED: Mti = Mti(0x0068);
    pub const TERMINATE_DUE_TO_ERROR: Mti = Mti(0x00A8);

    pub const PROTOCOL_SUPPORT_INQUIRY: Mti = Mti(0x0828);
    pub const PROTOCOL_SUPPORT_REPLY: Mti = Mti(0x0668);

    pub const IDENTIFY_CONSUMER: Mti = Mti(0x08F4);
    pub const CONSUMER_RANGE_IDENTIFIED: Mti = Mti(0x04A4);
    pub const CONSUMER_IDENTIFIED_UNKNOWN: Mti = Mti(0x04C7);
    pub const CONSUMER_IDENTIFIED_ACTIVE: Mti = Mti(0x04C4);
    pub const CONSUMER_IDENTIFIED_INACTIVE: Mti = Mti(0x04C5);
    pub const IDENTIFY_PRODUCER: Mti = Mti(0x0914);
    pub const PRODUCER_RANGE_IDENTIFIED: Mti = Mti(0x0524);
    pub const PRODUCER_IDENTIFIED_UNKNOWN: Mti = Mti(0x0547);
    pub const PRODUCER_IDENTIFIED_ACTIVE: Mti = Mti(0x0544);
    pub const PRODUCER_IDENTIFIED_INACTIVE: Mti = Mti(0x0545);
    pub const IDENTIFY_EVENTS_ADDRESSED: Mti = Mti(0x0968);
    pub const IDENTIFY_EVENTS_GLOBAL: Mti = Mti(0x0970);
    pub const LEARN_EVENT: Mti = Mti(0x0594);
    pub const PRODUCER_CONSUMER_EVENT_REPORT: Mti = Mti(0x05B4);

    pub const SIMPLE_NODE_IDENT_INFO_REQUEST: Mti = Mti(0x0DE8);
    pub const SIMPLE_NODE_IDENT_INFO_REPLY: Mti = Mti(0x0A08);

    pub const DATAGRAM: Mti = Mti(0x1C48);
    pub const DATAGRAM_RECEIVED_OK: Mti = Mti(0x0A28);
    pub const DATAGRAM_REJECTED: Mti = Mti(0x0A48);

    pub const STREAM_INITIATE_REQUEST: Mti = Mti(0x0CC8);
    pub const STREAM_INITIATE_REPLY: Mti = Mti(0x0868);
    pub const STREAM_DATA_SEND: Mti = Mti(0x1F88);
    pub const STREAM_DATA_PROCEED: Mti = Mti(0x0888);
    pub const STREAM_DATA_COMPLETE: Mti = Mti(0x08A8);

    // Internal MTIs, never sent on the wire. Link up/down/quiesce/restarted
    // carry NodeID::ZERO as source; New_Node_Seen carries the new node.
    pub const LINK_LAYER_UP: Mti = Mti(0x2000);
    pub const LINK_LAYER_QUIESCE: Mti = Mti(0x2010);
    pub const LINK_LAYER_RESTARTED: Mti = Mti(0x2020);
    pub const LINK_LAYER_DOWN: Mti = Mti(0x2030);
    pub const NEW_NODE_SEEN: Mti = Mti(0x2048);

    /// Wrap a raw 16-bit code.
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The raw 16-bit code.
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Whether a destination address accompanies this MTI.
    pub fn address_present(&self) -> bool {
        self.0 & MTI_ADDRESS_PRESENT != 0
    }

    /// Whether the payload starts with an 8-byte `EventID`.
    pub fn event_present(&self) -> bool {
        self.0 & MTI_EVENT_PRESENT != 0
    }

    /// Whether this MTI belongs to the simple protocol subset.
    pub fn simple_protocol(&self) -> bool {
        self.0 & MTI_SIMPLE_PROTOCOL != 0
    }

    /// 2-bit priority, 0 (highest) through 3.
    pub fn priority(&self) -> u8 {
        ((self.0 & MTI_PRIORITY_MASK) >> MTI_PRIORITY_SHIFT) as u8
    }

    /// Whether this is a stack-internal MTI that never crosses the wire.
    pub fn is_internal(&self) -> bool {
        self.0 & MTI_INTERNAL != 0
    }

    /// Name of a well-known MTI, if it has one.
    pub fn name(&self) -> Option<&'static str> {
        Some(match *self {
            Mti::INITIALIZATION_COMPLETE => "Initialization_Complete",
            Mti::INITIALIZATION_COMPLETE_SIMPLE => "Initialization_Complete_Simple",
            Mti::VERIFY_NODE_ID_ADDRESSED => "Verify_NodeID_Number_Addressed",
            Mti::VERIFY_NODE_ID_GLOBAL => "Verify_NodeID_Number_Global",
            Mti::VERIFIED_NODE_ID => "Verified_NodeID",
            Mti::OPTIONAL_INTERACTION_REJECTED => "Optional_Interaction_Rejected",
            Mti::TERMINATE_DUE_TO_ERROR => "Terminate_Due_To_Error",
            Mti::PROTOCOL_SUPPORT_INQUIRY => "Protocol_Support_Inquiry",
            Mti::PROTOCOL_SUPPORT_REPLY => "Protocol_Support_Reply",
            Mti::IDENTIFY_CONSUMER => "Identify_Consumer",
            Mti::CONSUMER_RANGE_IDENTIFIED => "Consumer_Range_Identified",
            Mti::CONSUMER_IDENTIFIED_UNKNOWN => "Consumer_Identified_Unknown",
            Mti::CONSUMER_IDENTIFIED_ACTIVE => "Consumer_Identified_Active",
            Mti::CONSUMER_IDENTIFIED_INACTIVE => "Consumer_Identified_Inactive",
            Mti::IDENTIFY_PRODUCER => "Identify_Producer",
            Mti::PRODUCER_RANGE_IDENTIFIED => "Producer_Range_Identified",
            Mti::PRODUCER_IDENTIFIED_UNKNOWN => "Producer_Identified_Unknown",
            Mti::PRODUCER_IDENTIFIED_ACTIVE => "Producer_Identified_Active",
            Mti::PRODUCER_IDENTIFIED_INACTIVE => "Producer_Identified_Inactive",
            Mti::IDENTIFY_EVENTS_ADDRESSED => "Identify_Events_Addressed",
            Mti::IDENTIFY_EVENTS_GLOBAL => "Identify_Events_Global",
            Mti::LEARN_EVENT => "Learn_Event",
            Mti::PRODUCER_CONSUMER_EVENT_REPORT => "Producer_Consumer_Event_Report",
            Mti::SIMPLE_NODE_IDENT_INFO_REQUEST => "Simple_Node_Ident_Info_Request",
            Mti::SIMPLE_NODE_IDENT_INFO_REPLY => "Simple_Node_Ident_Info_Reply",
            Mti::DATAGRAM => "Datagram",
            Mti::DATAGRAM_RECEIVED_OK => "Datagram_Received_OK",
            Mti::DATAGRAM_REJECTED => "Datagram_Rejected",
            Mti::STREAM_INITIATE_REQUEST => "Stream_Initiate_Request",
            Mti::STREAM_INITIATE_REPLY => "Stream_Initiate_Reply",
            Mti::STREAM_DATA_SEND => "Stream_Data_Send",
            Mti::STREAM_DATA_PROCEED => "Stream_Data_Proceed",
            Mti::STREAM_DATA_COMPLETE => "Stream_Data_Complete",
            Mti::LINK_LAYER_UP => "Link_Layer_Up",
            Mti::LINK_LAYER_QUIESCE => "Link_Layer_Quiesce",
            Mti::LINK_LAYER_RESTARTED => "Link_Layer_Restarted",
            Mti::LINK_LAYER_DOWN => "Link_Layer_Down",
            Mti::NEW_NODE_SEEN => "New_Node_Seen",
            _ => return None,
        })
    }
}

impl fmt::Display for Mti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

impl fmt::Debug for Mti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Mti({})", name),
            None => write!(f, "Mti(0x{:04X})", self.0),
        }
    }
}
