//! Stream service: flow-controlled bulk transfer, write side.
//!
//! A write stream opens with a Stream_Initiate_Request proposing a source
//! stream number and a buffer size; the destination answers with its own
//! stream number and the size it can accept, and the smaller of the two
//! sizes governs the transfer. Payload then moves one chunk at a time,
//! each prefixed by the destination stream number, with every
//! Stream_Data_Proceed authorizing the next chunk (stop-and-wait, one
//! chunk in flight). After the last chunk a single Stream_Data_Complete
//! closes the exchange.
//!
//! A link quiesce suspends sending; a link restart resumes whatever was
//! authorized in the meantime. Full resynchronization of in-flight
//! streams across a restart is not implemented. A link going down
//! outright rejects every open stream.

#[cfg(test)]
mod tests;

use crate::identity::NodeID;
use crate::message::{codes, Message, Mti};
use std::fmt;
use tracing::{debug, info, warn};

/// Accept/reject word in a Stream_Initiate_Reply: low 15 bits are the
/// error code, zero meaning accepted.
pub const REPLY_CODE_MASK: u16 = 0x7FFF;

/// Default buffer size proposed when the caller has no preference.
pub const DEFAULT_BUFFER: u16 = 512;

/// Terminal result of one stream write.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Ok,
    Rejected(u16),
}

pub type StreamCallback = Box<dyn FnOnce(StreamOutcome) + Send>;

/// One outstanding stream write.
pub struct StreamWriteMemo {
    pub destination: NodeID,
    pub data: Vec<u8>,
    pub proposed_buffer: u16,
    on_complete: Option<StreamCallback>,

    source_stream_id: u8,
    /// None until the initiate reply arrives.
    dest_stream_id: Option<u8>,
    buffer_size: u16,
    offset: usize,
    /// The next chunk is authorized but was deferred by a link quiesce.
    deferred: bool,
}

impl StreamWriteMemo {
    pub fn new(destination: NodeID, data: Vec<u8>, on_complete: StreamCallback) -> Self {
        Self {
            destination,
            data,
            proposed_buffer: DEFAULT_BUFFER,
            on_complete: Some(on_complete),
            source_stream_id: 0,
            dest_stream_id: None,
            buffer_size: 0,
            offset: 0,
            deferred: false,
        }
    }

    /// Override the proposed buffer size.
    pub fn buffer_size(mut self, size: u16) -> Self {
        self.proposed_buffer = size;
        self
    }

    fn complete(mut self, outcome: StreamOutcome) {
        if let Some(callback) = self.on_complete.take() {
            callback(outcome);
        }
    }
}

impl fmt::Debug for StreamWriteMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamWriteMemo(to {}, stream {}, {} of {} bytes)",
            self.destination,
            self.source_stream_id,
            self.offset,
            self.data.len()
        )
    }
}

/// Stream write bookkeeping for one local node.
pub struct StreamService {
    local: NodeID,
    pending: Vec<StreamWriteMemo>,
    next_stream_id: u8,
    suspended: bool,
}

impl StreamService {
    pub fn new(local: NodeID) -> Self {
        Self {
            local,
            pending: Vec::new(),
            next_stream_id: 1,
            suspended: false,
        }
    }

    /// Streams still open, including those awaiting the initiate reply.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Open a write stream: sends the initiate request and records the
    /// memo until the transfer finishes or is rejected.
    pub fn write(&mut self, mut memo: StreamWriteMemo, out: &mut Vec<Message>) {
        memo.source_stream_id = self.next_stream_id;
        self.next_stream_id = self.next_stream_id.wrapping_add(1).max(1);
        let [buf_hi, buf_lo] = memo.proposed_buffer.to_be_bytes();
        out.push(Message::addressed(
            Mti::STREAM_INITIATE_REQUEST,
            self.local,
            memo.destination,
            vec![buf_hi, buf_lo, 0x00, 0x00, memo.source_stream_id],
        ));
        debug!(
            node = %memo.destination,
            stream = memo.source_stream_id,
            len = memo.data.len(),
            "stream write opened"
        );
        self.pending.push(memo);
    }

    /// Process one inbound message: initiate replies, proceeds, and the
    /// internal link quiesce/restart notifications.
    pub fn handle_message(&mut self, msg: &Message, out: &mut Vec<Message>) {
        match msg.mti {
            Mti::LINK_LAYER_QUIESCE => {
                self.suspended = true;
                return;
            }
            Mti::LINK_LAYER_RESTARTED => {
                self.suspended = false;
                self.resume_deferred(out);
                return;
            }
            Mti::LINK_LAYER_DOWN => {
                self.suspended = false;
                for memo in self.pending.drain(..) {
                    warn!(node = %memo.destination, "stream abandoned, link down");
                    memo.complete(StreamOutcome::Rejected(codes::TEMPORARY_ERROR));
                }
                return;
            }
            _ => {}
        }
        if !msg.is_addressed_to(self.local) {
            return;
        }
        match msg.mti {
            Mti::STREAM_INITIATE_REPLY => self.handle_initiate_reply(msg, out),
            Mti::STREAM_DATA_PROCEED => self.handle_proceed(msg, out),
            _ => {}
        }
    }

    /// Reply layout: buffer size (2), flags with the accept code in the
    /// low 15 bits (2), echoed source stream id, destination stream id.
    fn handle_initiate_reply(&mut self, msg: &Message, out: &mut Vec<Message>) {
        let index = self
            .pending
            .iter()
            .position(|m| m.destination == msg.source && m.dest_stream_id.is_none());
        let Some(index) = index else {
            warn!(node = %msg.source, "stream initiate reply with no pending memo dropped");
            return;
        };
        if msg.data.len() < 6 {
            warn!(node = %msg.source, len = msg.data.len(), "short stream initiate reply dropped");
            return;
        }
        let mut memo = self.pending.remove(index);
        let offered = (u16::from(msg.data[0]) << 8) | u16::from(msg.data[1]);
        let code = ((u16::from(msg.data[2]) << 8) | u16::from(msg.data[3])) & REPLY_CODE_MASK;
        let echoed = msg.data[4];
        if code != 0 || echoed != memo.source_stream_id {
            info!(node = %msg.source, code, "stream write rejected");
            memo.complete(StreamOutcome::Rejected(code));
            return;
        }
        memo.dest_stream_id = Some(msg.data[5]);
        memo.buffer_size = offered.min(memo.proposed_buffer).max(1);
        self.authorize(memo, out);
    }

    fn handle_proceed(&mut self, msg: &Message, out: &mut Vec<Message>) {
        // Proceed layout: sender's stream id, then ours.
        let ours = msg.data.get(1).copied();
        let index = self.pending.iter().position(|m| {
            m.destination == msg.source
                && m.dest_stream_id.is_some()
                && Some(m.source_stream_id) == ours
        });
        match index {
            Some(index) => {
                let memo = self.pending.remove(index);
                self.authorize(memo, out);
            }
            None => {
                // Documented gap: the transfer is abandoned with no error
                // to the caller.
                warn!(node = %msg.source, "stream proceed with no matching stream dropped");
            }
        }
    }

    /// One chunk is authorized: send it now, or mark it deferred while
    /// the link is quiesced.
    fn authorize(&mut self, mut memo: StreamWriteMemo, out: &mut Vec<Message>) {
        if self.suspended {
            memo.deferred = true;
            self.pending.push(memo);
            return;
        }
        self.send_chunk(memo, out);
    }

    fn send_chunk(&mut self, mut memo: StreamWriteMemo, out: &mut Vec<Message>) {
        memo.deferred = false;
        let dest_id = match memo.dest_stream_id {
            Some(id) => id,
            None => return,
        };
        let remaining = memo.data.len() - memo.offset;
        if remaining > 0 {
            let take = remaining.min(usize::from(memo.buffer_size));
            let mut payload = Vec::with_capacity(take + 1);
            payload.push(dest_id);
            payload.extend_from_slice(&memo.data[memo.offset..memo.offset + take]);
            memo.offset += take;
            out.push(Message::addressed(
                Mti::STREAM_DATA_SEND,
                self.local,
                memo.destination,
                payload,
            ));
        }
        if memo.offset >= memo.data.len() {
            out.push(Message::addressed(
                Mti::STREAM_DATA_COMPLETE,
                self.local,
                memo.destination,
                vec![memo.source_stream_id, dest_id],
            ));
            debug!(node = %memo.destination, stream = memo.source_stream_id, "stream write complete");
            memo.complete(StreamOutcome::Ok);
        } else {
            // Stop and wait for the next proceed.
            self.pending.push(memo);
        }
    }

    fn resume_deferred(&mut self, out: &mut Vec<Message>) {
        let (deferred, keep): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|memo| memo.deferred);
        self.pending = keep;
        for memo in deferred {
            self.send_chunk(memo, out);
        }
    }
}
