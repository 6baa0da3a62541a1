//! Datagram service: reliable one-shot block transfer.
//!
//! A datagram is an addressed payload of up to 72 bytes, answered by the
//! destination with Datagram_Received_OK or Datagram_Rejected. Outstanding
//! sends are tracked as [`DatagramWriteMemo`]s in a FIFO per destination;
//! the first reply from that destination matches the oldest memo, which is
//! removed and completed exactly once. Acks with no matching memo are
//! logged and dropped — the operation is abandoned with no error to any
//! caller, a documented protocol gap.

#[cfg(test)]
mod tests;

use crate::identity::NodeID;
use crate::message::{codes, Message, Mti};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, warn};

/// Largest datagram payload in bytes.
pub const DATAGRAM_MAX: usize = 72;

/// Flag bit in a positive reply: a further reply datagram is coming.
pub const REPLY_PENDING: u8 = 0x80;

/// Well-known datagram protocol ids (first payload byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatagramProtocolId {
    LogRequest,
    LogReply,
    MemoryOperation,
    RemoteButton,
    Display,
    TrainControl,
    /// Absent or unrecognized first byte.
    Unrecognized,
}

impl DatagramProtocolId {
    /// Classify a datagram payload by its first byte.
    pub fn from_payload(data: &[u8]) -> Self {
        match data.first() {
            Some(0x01) => DatagramProtocolId::LogRequest,
            Some(0x02) => DatagramProtocolId::LogReply,
            Some(0x20) => DatagramProtocolId::MemoryOperation,
            Some(0x21) => DatagramProtocolId::RemoteButton,
            Some(0x28) => DatagramProtocolId::Display,
            Some(0x30) => DatagramProtocolId::TrainControl,
            _ => DatagramProtocolId::Unrecognized,
        }
    }
}

/// Terminal result of one datagram send.
#[derive(Debug, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Accepted; `flags` carries the optional reply byte ([`REPLY_PENDING`]
    /// among others), 0 when the reply carried none.
    Ok { flags: u8 },
    /// Rejected with the signaled error code (0 when the reply carried
    /// none).
    Rejected { code: u16 },
}

/// Completion callback type: fires exactly once, by construction.
pub type DatagramCallback = Box<dyn FnOnce(DatagramOutcome) + Send>;

/// One outstanding datagram send.
pub struct DatagramWriteMemo {
    pub destination: NodeID,
    pub data: Vec<u8>,
    on_complete: Option<DatagramCallback>,
}

impl DatagramWriteMemo {
    /// Memo with no completion callback; its terminal outcome surfaces as
    /// [`DatagramEvent::Completed`] for framework routing instead.
    pub fn new(destination: NodeID, data: Vec<u8>) -> Self {
        Self {
            destination,
            data,
            on_complete: None,
        }
    }

    /// Attach the single terminal callback.
    pub fn on_complete(mut self, callback: DatagramCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    fn complete(mut self, outcome: DatagramOutcome) -> Option<DatagramEvent> {
        match self.on_complete.take() {
            Some(callback) => {
                callback(outcome);
                None
            }
            None => Some(DatagramEvent::Completed { memo: self, outcome }),
        }
    }
}

impl fmt::Debug for DatagramWriteMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DatagramWriteMemo(to {}, {} bytes)",
            self.destination,
            self.data.len()
        )
    }
}

/// One received datagram, handed to listeners for a reply decision.
#[derive(Clone, Debug)]
pub struct DatagramReadMemo {
    pub source: NodeID,
    pub destination: NodeID,
    pub data: Vec<u8>,
}

impl DatagramReadMemo {
    /// Classify by first payload byte.
    pub fn protocol_id(&self) -> DatagramProtocolId {
        DatagramProtocolId::from_payload(&self.data)
    }
}

/// Event surfaced by [`DatagramService::handle_message`] for the owner to
/// route.
#[derive(Debug)]
pub enum DatagramEvent {
    /// An inbound datagram awaiting exactly one listener's reply.
    Received(DatagramReadMemo),
    /// A callback-less memo reached its terminal state.
    Completed {
        memo: DatagramWriteMemo,
        outcome: DatagramOutcome,
    },
}

/// Datagram send/receive bookkeeping for one local node.
pub struct DatagramService {
    local: NodeID,
    /// FIFO of outstanding sends per destination.
    pending: HashMap<NodeID, VecDeque<DatagramWriteMemo>>,
}

impl DatagramService {
    pub fn new(local: NodeID) -> Self {
        Self {
            local,
            pending: HashMap::new(),
        }
    }

    /// Number of sends still awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    /// Send one datagram. The memo is recorded until the destination's
    /// ok/rejected reply arrives.
    pub fn send_datagram(&mut self, memo: DatagramWriteMemo, out: &mut Vec<Message>) {
        if memo.data.len() > DATAGRAM_MAX {
            warn!(
                len = memo.data.len(),
                max = DATAGRAM_MAX,
                "datagram payload over maximum, sending anyway"
            );
        }
        out.push(Message::addressed(
            Mti::DATAGRAM,
            self.local,
            memo.destination,
            memo.data.clone(),
        ));
        self.pending
            .entry(memo.destination)
            .or_default()
            .push_back(memo);
    }

    /// Process one inbound message. Datagram acks complete pending memos;
    /// inbound datagrams surface as [`DatagramEvent::Received`].
    pub fn handle_message(&mut self, msg: &Message) -> Option<DatagramEvent> {
        if !msg.is_addressed_to(self.local) {
            return None;
        }
        match msg.mti {
            Mti::DATAGRAM => Some(DatagramEvent::Received(DatagramReadMemo {
                source: msg.source,
                destination: self.local,
                data: msg.data.clone(),
            })),
            Mti::DATAGRAM_RECEIVED_OK => {
                let flags = msg.data.first().copied().unwrap_or(0);
                self.complete_next(msg.source, DatagramOutcome::Ok { flags })
            }
            Mti::DATAGRAM_REJECTED => {
                let code = match msg.data.get(0..2) {
                    Some(&[hi, lo]) => (u16::from(hi) << 8) | u16::from(lo),
                    _ => 0,
                };
                self.complete_next(msg.source, DatagramOutcome::Rejected { code })
            }
            _ => None,
        }
    }

    /// The link went down: fail every outstanding send, since its reply
    /// can no longer arrive. Callback-less memos come back as
    /// [`DatagramEvent::Completed`] values for the owner to route.
    pub fn link_down(&mut self) -> Vec<DatagramEvent> {
        let mut events = Vec::new();
        for (_, queue) in self.pending.drain() {
            for memo in queue {
                warn!(node = %memo.destination, "datagram abandoned, link down");
                let outcome = DatagramOutcome::Rejected {
                    code: codes::TEMPORARY_ERROR,
                };
                if let Some(event) = memo.complete(outcome) {
                    events.push(event);
                }
            }
        }
        events
    }

    fn complete_next(&mut self, from: NodeID, outcome: DatagramOutcome) -> Option<DatagramEvent> {
        let queue = self.pending.get_mut(&from);
        let memo = queue.and_then(VecDeque::pop_front);
        match memo {
            Some(memo) => {
                debug!(node = %from, ?outcome, "datagram exchange complete");
                memo.complete(outcome)
            }
            None => {
                // Documented gap: the reply is dropped and no caller hears
                // about it.
                warn!(node = %from, ?outcome, "datagram reply with no pending memo dropped");
                None
            }
        }
    }

    /// Accept a received datagram, optionally flagging a coming reply.
    pub fn positive_reply(&self, memo: &DatagramReadMemo, flags: u8, out: &mut Vec<Message>) {
        let data = if flags == 0 { Vec::new() } else { vec![flags] };
        out.push(Message::addressed(
            Mti::DATAGRAM_RECEIVED_OK,
            self.local,
            memo.source,
            data,
        ));
    }

    /// Refuse a received datagram with an error code.
    pub fn negative_reply(&self, memo: &DatagramReadMemo, code: u16, out: &mut Vec<Message>) {
        out.push(Message::addressed(
            Mti::DATAGRAM_REJECTED,
            self.local,
            memo.source,
            vec![(code >> 8) as u8, code as u8],
        ));
    }
}
