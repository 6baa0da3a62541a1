//! Memory service: paged space read/write over datagrams.
//!
//! Requests travel as datagrams with protocol id 0x20 (memory operation).
//! A read encodes space, 32-bit address, and a count of at most 64 bytes;
//! the responder acks the datagram (reply pending) and later sends a reply
//! datagram, which this service correlates to the oldest pending memo for
//! that node. The service issues exactly one datagram per call; reading a
//! whole space is the caller's loop, issuing successive requests from
//! completion callbacks.


use crate::datagram::{DatagramOutcome, DatagramReadMemo, DatagramService, DatagramWriteMemo};
use crate::identity::NodeID;
use crate::message::{codes, Message};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, warn};

/// Datagram protocol id for memory operations.
pub const MEMORY_PROTOCOL: u8 = 0x20;

/// Largest read/write request, in bytes.
pub const MAX_TRANSFER: u8 = 64;

// Command bytes. The low two bits select a well-known space (0 means an
// explicit space byte follows the address).
const CMD_WRITE: u8 = 0x00;
const CMD_READ: u8 = 0x40;
const CMD_WRITE_REPLY_OK: u8 = 0x10;
const CMD_WRITE_REPLY_FAIL: u8 = 0x18;
const CMD_READ_REPLY_OK: u8 = 0x50;
const CMD_READ_REPLY_FAIL: u8 = 0x58;
const CMD_KIND_MASK: u8 = 0xF8;
const CMD_SPACE_MASK: u8 = 0x03;

/// Well-known memory space ids.
pub mod spaces {
    /// Configuration description (CDI) XML.
    pub const CDI: u8 = 0xFF;
    /// All memory.
    pub const ALL: u8 = 0xFE;
    /// Configuration data.
    pub const CONFIGURATION: u8 = 0xFD;
    /// Function description (FDI) XML.
    pub const FDI: u8 = 0xFA;
    /// Firmware upgrade region.
    pub const FIRMWARE: u8 = 0xEF;
}

/// Terminal result of a read request.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes returned by the responder (possibly fewer than requested).
    Data(Vec<u8>),
    /// Rejected with the signaled error code.
    Rejected(u16),
}

/// Terminal result of a write request.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Ok,
    Rejected(u16),
}

pub type ReadCallback = Box<dyn FnOnce(ReadOutcome) + Send>;
pub type WriteCallback = Box<dyn FnOnce(WriteOutcome) + Send>;

/// One outstanding read request.
pub struct MemoryReadMemo {
    pub node: NodeID,
    pub space: u8,
    pub address: u32,
    pub size: u8,
    on_complete: Option<ReadCallback>,
}

impl MemoryReadMemo {
    pub fn new(node: NodeID, space: u8, address: u32, size: u8, on_complete: ReadCallback) -> Self {
        Self {
            node,
            space,
            address,
            size: size.min(MAX_TRANSFER),
            on_complete: Some(on_complete),
        }
    }

    fn complete(mut self, outcome: ReadOutcome) {
        if let Some(callback) = self.on_complete.take() {
            callback(outcome);
        }
    }
}

impl fmt::Debug for MemoryReadMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryReadMemo({} space 0x{:02X} addr 0x{:08X} size {})",
            self.node, self.space, self.address, self.size
        )
    }
}

/// One outstanding write request.
pub struct MemoryWriteMemo {
    pub node: NodeID,
    pub space: u8,
    pub address: u32,
    pub data: Vec<u8>,
    on_complete: Option<WriteCallback>,
}

impl MemoryWriteMemo {
    pub fn new(
        node: NodeID,
        space: u8,
        address: u32,
        data: Vec<u8>,
        on_complete: WriteCallback,
    ) -> Self {
        Self {
            node,
            space,
            address,
            data,
            on_complete: Some(on_complete),
        }
    }

    fn complete(mut self, outcome: WriteOutcome) {
        if let Some(callback) = self.on_complete.take() {
            callback(outcome);
        }
    }
}

impl fmt::Debug for MemoryWriteMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MemoryWriteMemo({} space 0x{:02X} addr 0x{:08X} {} bytes)",
            self.node,
            self.space,
            self.address,
            self.data.len()
        )
    }
}

/// Memory read/write client built on the datagram service.
#[derive(Default)]
pub struct MemoryService {
    read_pending: VecDeque<MemoryReadMemo>,
    write_pending: VecDeque<MemoryWriteMemo>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding read and write requests.
    pub fn outstanding(&self) -> usize {
        self.read_pending.len() + self.write_pending.len()
    }

    /// Issue one read request as one datagram.
    pub fn request_read(
        &mut self,
        memo: MemoryReadMemo,
        datagram: &mut DatagramService,
        out: &mut Vec<Message>,
    ) {
        let mut payload = command_prefix(CMD_READ, memo.space, memo.address);
        payload.push(memo.size);
        let node = memo.node;
        self.read_pending.push_back(memo);
        datagram.send_datagram(DatagramWriteMemo::new(node, payload), out);
    }

    /// Issue one write request as one datagram.
    pub fn request_write(
        &mut self,
        memo: MemoryWriteMemo,
        datagram: &mut DatagramService,
        out: &mut Vec<Message>,
    ) {
        let mut payload = command_prefix(CMD_WRITE, memo.space, memo.address);
        payload.extend_from_slice(&memo.data);
        let node = memo.node;
        self.write_pending.push_back(memo);
        datagram.send_datagram(DatagramWriteMemo::new(node, payload), out);
    }

    /// The link went down: fail every request still awaiting its reply
    /// datagram.
    pub fn link_down(&mut self) {
        for memo in self.read_pending.drain(..) {
            warn!(node = %memo.node, "memory read abandoned, link down");
            memo.complete(ReadOutcome::Rejected(codes::TEMPORARY_ERROR));
        }
        for memo in self.write_pending.drain(..) {
            warn!(node = %memo.node, "memory write abandoned, link down");
            memo.complete(WriteOutcome::Rejected(codes::TEMPORARY_ERROR));
        }
    }

    /// Route the terminal outcome of a memory request datagram.
    ///
    /// A rejected datagram fails the oldest matching memo; an accepted one
    /// leaves it pending until the reply datagram arrives.
    pub fn datagram_complete(&mut self, data: &[u8], destination: NodeID, outcome: DatagramOutcome) {
        let DatagramOutcome::Rejected { code } = outcome else {
            return;
        };
        let kind = data.get(1).copied().unwrap_or(0) & CMD_KIND_MASK;
        if kind == CMD_READ {
            match pop_for_node(&mut self.read_pending, destination, |m| m.node) {
                Some(memo) => memo.complete(ReadOutcome::Rejected(code)),
                None => warn!(node = %destination, "read rejection with no pending memo dropped"),
            }
        } else {
            match pop_for_node(&mut self.write_pending, destination, |m| m.node) {
                Some(memo) => memo.complete(WriteOutcome::Rejected(code)),
                None => warn!(node = %destination, "write rejection with no pending memo dropped"),
            }
        }
    }

    /// Consume a memory-operation reply datagram.
    ///
    /// Returns false if the datagram is not a memory reply this client can
    /// handle; the caller then falls through to its listener registry.
    pub fn datagram_received(
        &mut self,
        memo: &DatagramReadMemo,
        datagram: &DatagramService,
        out: &mut Vec<Message>,
    ) -> bool {
        if memo.data.first() != Some(&MEMORY_PROTOCOL) || memo.data.len() < 2 {
            return false;
        }
        let command = memo.data[1];
        let explicit_space = command & CMD_SPACE_MASK == 0;
        // [0]=0x20 [1]=cmd [2..6]=address, then the space byte if the
        // command's low bits don't select one.
        let body = if explicit_space { 7 } else { 6 };
        match command & CMD_KIND_MASK {
            CMD_READ_REPLY_OK => {
                datagram.positive_reply(memo, 0, out);
                let data = memo.data.get(body..).unwrap_or_default().to_vec();
                match pop_for_node(&mut self.read_pending, memo.source, |m| m.node) {
                    Some(pending) => pending.complete(ReadOutcome::Data(data)),
                    None => warn!(node = %memo.source, "read reply with no pending memo dropped"),
                }
                true
            }
            CMD_READ_REPLY_FAIL => {
                datagram.positive_reply(memo, 0, out);
                let code = error_code(&memo.data, body);
                match pop_for_node(&mut self.read_pending, memo.source, |m| m.node) {
                    Some(pending) => pending.complete(ReadOutcome::Rejected(code)),
                    None => warn!(node = %memo.source, "read failure with no pending memo dropped"),
                }
                true
            }
            CMD_WRITE_REPLY_OK => {
                datagram.positive_reply(memo, 0, out);
                match pop_for_node(&mut self.write_pending, memo.source, |m| m.node) {
                    Some(pending) => pending.complete(WriteOutcome::Ok),
                    None => warn!(node = %memo.source, "write reply with no pending memo dropped"),
                }
                true
            }
            CMD_WRITE_REPLY_FAIL => {
                datagram.positive_reply(memo, 0, out);
                let code = error_code(&memo.data, body);
                match pop_for_node(&mut self.write_pending, memo.source, |m| m.node) {
                    Some(pending) => pending.complete(WriteOutcome::Rejected(code)),
                    None => warn!(node = %memo.source, "write failure with no pending memo dropped"),
                }
                true
            }
            _ => {
                // A read/write command addressed to us: we are a client
                // only, so leave it to the listener registry.
                debug!(command = format_args!("0x{:02X}", command), "memory command not handled");
                false
            }
        }
    }
}

/// Build `[0x20, cmd|space-bits, address(4)]` plus the explicit space byte
/// when the space has no dedicated command encoding.
fn command_prefix(base: u8, space: u8, address: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.push(MEMORY_PROTOCOL);
    let space_bits = match space {
        spaces::CDI => 0x03,
        spaces::ALL => 0x02,
        spaces::CONFIGURATION => 0x01,
        _ => 0x00,
    };
    payload.push(base | space_bits);
    payload.extend_from_slice(&address.to_be_bytes());
    if space_bits == 0 {
        payload.push(space);
    }
    payload
}

fn error_code(data: &[u8], at: usize) -> u16 {
    match data.get(at..at + 2) {
        Some(&[hi, lo]) => (u16::from(hi) << 8) | u16::from(lo),
        _ => 0,
    }
}

fn pop_for_node<T>(
    queue: &mut VecDeque<T>,
    node: NodeID,
    node_of: impl Fn(&T) -> NodeID,
) -> Option<T> {
    let index = queue.iter().position(|m| node_of(m) == node)?;
    queue.remove(index)
}
