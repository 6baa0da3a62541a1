//! Protocol Support Protocol (PIP) flag set.

use std::fmt;

/// Set of protocol-support flags, as carried in the first three bytes of a
/// Protocol_Support_Reply.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PipSet(u32);

impl PipSet {
    pub const SIMPLE_PROTOCOL: u32 = 0x80_0000;
    pub const DATAGRAM: u32 = 0x40_0000;
    pub const STREAM: u32 = 0x20_0000;
    pub const MEMORY_CONFIGURATION: u32 = 0x10_0000;
    pub const RESERVATION: u32 = 0x08_0000;
    pub const EVENT_EXCHANGE: u32 = 0x04_0000;
    pub const IDENTIFICATION: u32 = 0x02_0000;
    pub const TEACHING_LEARNING: u32 = 0x01_0000;
    pub const REMOTE_BUTTON: u32 = 0x00_8000;
    pub const ADCDI: u32 = 0x00_4000;
    pub const DISPLAY: u32 = 0x00_2000;
    pub const SIMPLE_NODE_IDENT: u32 = 0x00_1000;
    pub const CDI: u32 = 0x00_0800;
    pub const TRACTION_CONTROL: u32 = 0x00_0400;
    pub const FUNCTION_DESCRIPTION: u32 = 0x00_0200;
    pub const FUNCTION_CONFIGURATION: u32 = 0x00_0080;
    pub const FIRMWARE_UPGRADE: u32 = 0x00_0040;
    pub const FIRMWARE_UPGRADE_ACTIVE: u32 = 0x00_0020;

    pub fn new(flags: u32) -> Self {
        Self(flags)
    }

    /// Decode the leading bytes of a Protocol_Support_Reply. Short or
    /// empty payloads yield the empty set.
    pub fn from_payload(data: &[u8]) -> Self {
        let mut flags = 0u32;
        for (i, byte) in data.iter().take(3).enumerate() {
            flags |= u32::from(*byte) << (16 - 8 * i);
        }
        Self(flags)
    }

    /// Encode as the three-byte reply payload.
    pub fn to_payload(self) -> Vec<u8> {
        vec![(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn insert(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn names(self) -> Vec<&'static str> {
        const TABLE: &[(u32, &str)] = &[
            (PipSet::SIMPLE_PROTOCOL, "Simple"),
            (PipSet::DATAGRAM, "Datagram"),
            (PipSet::STREAM, "Stream"),
            (PipSet::MEMORY_CONFIGURATION, "MemoryConfiguration"),
            (PipSet::RESERVATION, "Reservation"),
            (PipSet::EVENT_EXCHANGE, "EventExchange"),
            (PipSet::IDENTIFICATION, "Identification"),
            (PipSet::TEACHING_LEARNING, "TeachingLearning"),
            (PipSet::REMOTE_BUTTON, "RemoteButton"),
            (PipSet::ADCDI, "AbbreviatedCdi"),
            (PipSet::DISPLAY, "Display"),
            (PipSet::SIMPLE_NODE_IDENT, "SimpleNodeIdent"),
            (PipSet::CDI, "Cdi"),
            (PipSet::TRACTION_CONTROL, "TractionControl"),
            (PipSet::FUNCTION_DESCRIPTION, "FunctionDescription"),
            (PipSet::FUNCTION_CONFIGURATION, "FunctionConfiguration"),
            (PipSet::FIRMWARE_UPGRADE, "FirmwareUpgrade"),
            (PipSet::FIRMWARE_UPGRADE_ACTIVE, "FirmwareUpgradeActive"),
        ];
        TABLE
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Debug for PipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipSet({})", self.names().join("|"))
    }
}

impl fmt::Display for PipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}
