//! CAN link layer.
//!
//! `CanLink` owns everything alias-related for one physical CAN segment:
//! the allocation state machine, collision handling, the alias↔NodeID map,
//! CAN-header↔MTI translation, and segmentation/reassembly of messages
//! larger than one frame.
//!
//! The link is synchronous and sans-io: every entry point mutates state and
//! returns a [`LinkActions`] holding the frames to put on the wire and the
//! completed messages to deliver upward. The owner does all scheduling; in
//! particular, after a steady-state collision the link stays Inhibited
//! until [`CanLink::restart_link`] is called.

pub mod alias;


use crate::frame::{CanFrame, CanHeader, FrameFormat, CONTROL_AMD, CONTROL_AME, CONTROL_AMR};
use crate::identity::NodeID;
use crate::message::{Message, Mti, MTI_CAN_MASK};
use alias::{fold_alias, next_seed, AliasMap};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

/// Payload bytes per addressed MTI frame after the 2-byte destination prefix.
pub const MTI_FRAME_PAYLOAD: usize = 6;

/// Payload bytes per datagram or stream frame.
pub const DATA_FRAME_PAYLOAD: usize = 8;

// Segmentation codes in the top nibble of an addressed frame's first byte.
const SEG_ONLY: u8 = 0x0;
const SEG_FIRST: u8 = 0x1;
const SEG_LAST: u8 = 0x2;
const SEG_MIDDLE: u8 = 0x3;

/// Link bring-up state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Physical layer not up.
    Initial,
    /// Alias not (or no longer) announced; nothing may be sent.
    Inhibited,
    /// Alias allocated and announced; normal traffic flows.
    Permitted,
}

/// Output of one link entry point: frames for the wire, messages for the
/// upper layers.
#[derive(Default)]
pub struct LinkActions {
    pub frames: Vec<CanFrame>,
    pub messages: Vec<Message>,
}

impl LinkActions {
    fn new() -> Self {
        Self::default()
    }
}

/// In-progress reassembly of a multi-frame addressed MTI message.
struct MtiAccumulator {
    can_mti: u16,
    data: Vec<u8>,
}

/// The CAN link layer for one local node on one physical segment.
pub struct CanLink {
    node_id: NodeID,
    seed: u64,
    local_alias: u16,
    state: LinkState,
    map: AliasMap,
    /// Addressed-MTI reassembly, keyed by source alias.
    mti_buffers: HashMap<u16, MtiAccumulator>,
    /// Datagram reassembly, keyed by source alias.
    datagram_buffers: HashMap<u16, Vec<u8>>,
    /// Outbound messages awaiting an AMD for their destination.
    pending: HashMap<NodeID, Vec<Message>>,
}

impl CanLink {
    /// Create a link for `node_id`. The initial alias seed is the NodeID
    /// itself, so the candidate sequence is deterministic per node.
    pub fn new(node_id: NodeID) -> Self {
        let seed = node_id.raw();
        Self {
            node_id,
            seed,
            local_alias: fold_alias(seed),
            state: LinkState::Initial,
            map: AliasMap::new(),
            mti_buffers: HashMap::new(),
            datagram_buffers: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn local_alias(&self) -> u16 {
        self.local_alias
    }

    pub fn node_id(&self) -> NodeID {
        self.node_id
    }

    /// The node positively identified for `alias`, if any.
    pub fn node_for_alias(&self, alias: u16) -> Option<NodeID> {
        self.map.node_for(alias)
    }

    /// The alias positively identified for `node`, if any.
    pub fn alias_for_node(&self, node: NodeID) -> Option<u16> {
        self.map.alias_for(node)
    }

    /// Physical layer came up: run the allocation sequence and announce.
    ///
    /// Emits CID7..CID4, RID, AMD, AME and transitions to Permitted, then
    /// notifies the upper layers with an internal Link_Layer_Up message.
    pub fn physical_layer_up(&mut self) -> LinkActions {
        let mut actions = LinkActions::new();
        self.state = LinkState::Inhibited;
        self.allocate_and_announce(&mut actions);
        actions.messages.push(Message::global(
            Mti::LINK_LAYER_UP,
            NodeID::ZERO,
            Vec::new(),
        ));
        actions
    }

    /// Physical layer went down: drop all per-segment state.
    pub fn physical_layer_down(&mut self) -> LinkActions {
        let mut actions = LinkActions::new();
        self.state = LinkState::Initial;
        self.map = AliasMap::new();
        self.mti_buffers.clear();
        self.datagram_buffers.clear();
        self.pending.clear();
        actions.messages.push(Message::global(
            Mti::LINK_LAYER_DOWN,
            NodeID::ZERO,
            Vec::new(),
        ));
        actions
    }

    /// Re-run allocation after a steady-state collision left the link
    /// Inhibited. Scheduled by the owner, not by the link itself.
    pub fn restart_link(&mut self) -> LinkActions {
        let mut actions = LinkActions::new();
        if self.state != LinkState::Inhibited {
            warn!(state = ?self.state, "restart_link outside Inhibited state ignored");
            return actions;
        }
        self.allocate_and_announce(&mut actions);
        actions.messages.push(Message::global(
            Mti::LINK_LAYER_RESTARTED,
            NodeID::ZERO,
            Vec::new(),
        ));
        actions
    }

    /// Emit the CID/RID/AMD/AME sequence for the current candidate alias
    /// and enter Permitted.
    fn allocate_and_announce(&mut self, actions: &mut LinkActions) {
        for index in (4..=7).rev() {
            actions
                .frames
                .push(CanFrame::cid(index, self.node_id, self.local_alias));
        }
        actions.frames.push(CanFrame::rid(self.local_alias));
        actions
            .frames
            .push(CanFrame::amd(self.local_alias, self.node_id));
        actions.frames.push(CanFrame::ame(self.local_alias, None));
        self.map.insert(self.local_alias, self.node_id);
        self.state = LinkState::Permitted;
        info!(
            node = %self.node_id,
            alias = format_args!("0x{:03X}", self.local_alias),
            "link permitted"
        );
    }

    /// Process one received frame.
    pub fn process_frame(&mut self, frame: &CanFrame) -> LinkActions {
        let mut actions = LinkActions::new();
        let header = frame.decode();
        if self.state != LinkState::Initial && self.is_collision(frame, header) {
            self.handle_collision(&mut actions);
            return actions;
        }
        match header {
            CanHeader::Cid { .. } => {
                // Another node probing a different alias; nothing to do.
            }
            CanHeader::Control { op, alias } => self.process_control(op, alias, frame, &mut actions),
            CanHeader::Message {
                format,
                variable,
                alias,
            } => self.process_message_frame(format, variable, alias, frame, &mut actions),
            CanHeader::Unknown => {
                debug!(header = format_args!("0x{:08X}", frame.header), "unknown frame format dropped");
            }
        }
        actions
    }

    /// A control frame bearing the local alias is a collision unless it is
    /// our own traffic echoed back (recognized by our NodeID payload, or a
    /// CID slice matching our NodeID).
    ///
    /// RID and AME carry no NodeID, so a hub that echoes frames back to
    /// their sender makes our own RID/AME indistinguishable from a foreign
    /// node asserting our alias, and each echo costs one AMR + realloc
    /// cycle. Run such hubs with sender-echo off; the usual GridConnect
    /// hubs (JMRI, openlcb_hub) do not echo to the originating connection.
    fn is_collision(&self, frame: &CanFrame, header: CanHeader) -> bool {
        match header {
            CanHeader::Cid { index, slice, alias } => {
                if alias != self.local_alias {
                    return false;
                }
                let shift = 12 * (u32::from(index) - 4);
                let own_slice = ((self.node_id.raw() >> shift) as u16) & 0xFFF;
                slice != own_slice
            }
            CanHeader::Control { alias, .. } => {
                alias == self.local_alias && frame.node_id_payload() != Some(self.node_id)
            }
            _ => false,
        }
    }

    fn handle_collision(&mut self, actions: &mut LinkActions) {
        match self.state {
            LinkState::Permitted => {
                warn!(
                    alias = format_args!("0x{:03X}", self.local_alias),
                    "alias collision while permitted, withdrawing"
                );
                actions
                    .frames
                    .push(CanFrame::amr(self.local_alias, self.node_id));
                self.map.remove_alias(self.local_alias);
                self.state = LinkState::Inhibited;
                self.advance_alias();
                actions.messages.push(Message::global(
                    Mti::LINK_LAYER_QUIESCE,
                    NodeID::ZERO,
                    Vec::new(),
                ));
            }
            LinkState::Inhibited => {
                // Candidate contested before we announced; just move on to
                // the next value. No AMR is owed for an unannounced alias.
                debug!(
                    alias = format_args!("0x{:03X}", self.local_alias),
                    "candidate alias contested, advancing seed"
                );
                self.advance_alias();
            }
            LinkState::Initial => {}
        }
    }

    /// Step the LCG until it yields a fresh candidate. Retries are unbounded
    /// by design.
    fn advance_alias(&mut self) {
        self.seed = next_seed(self.seed);
        self.local_alias = fold_alias(self.seed);
    }

    fn process_control(&mut self, op: u16, alias: u16, frame: &CanFrame, actions: &mut LinkActions) {
        match op {
            CONTROL_AMD => {
                let Some(node) = frame.node_id_payload() else {
                    debug!(alias = format_args!("0x{:03X}", alias), "AMD without NodeID dropped");
                    return;
                };
                if node == self.node_id {
                    // Our own announcement echoed back.
                    return;
                }
                trace!(alias = format_args!("0x{:03X}", alias), %node, "alias mapped");
                self.map.insert(alias, node);
                // An alias for this node unblocks anything queued for it.
                if let Some(queued) = self.pending.remove(&node) {
                    for msg in queued {
                        let frames = self.send_message(msg);
                        actions.frames.extend(frames);
                    }
                }
            }
            CONTROL_AMR => {
                if let Some(node) = self.map.remove_alias(alias) {
                    trace!(alias = format_args!("0x{:03X}", alias), %node, "alias unmapped");
                }
                self.mti_buffers.remove(&alias);
                self.datagram_buffers.remove(&alias);
            }
            CONTROL_AME => {
                // Defend our own mapping; any other enquiry is not ours to
                // answer.
                if self.state == LinkState::Permitted
                    && frame.node_id_payload() == Some(self.node_id)
                {
                    actions
                        .frames
                        .push(CanFrame::amd(self.local_alias, self.node_id));
                }
            }
            _ => {
                // RID and EIR0-3 carry no mapping information.
            }
        }
    }

    fn process_message_frame(
        &mut self,
        format: FrameFormat,
        variable: u16,
        source_alias: u16,
        frame: &CanFrame,
        actions: &mut LinkActions,
    ) {
        let source = self.map.node_for(source_alias).unwrap_or(NodeID::ZERO);
        match format {
            FrameFormat::Mti => {
                self.process_mti_frame(variable, source_alias, source, frame, actions)
            }
            FrameFormat::DatagramOnly => {
                if variable != self.local_alias {
                    return;
                }
                actions.messages.push(Message::addressed(
                    Mti::DATAGRAM,
                    source,
                    self.node_id,
                    frame.data.clone(),
                ));
            }
            FrameFormat::DatagramFirst => {
                if variable != self.local_alias {
                    return;
                }
                if self.datagram_buffers.remove(&source_alias).is_some() {
                    debug!(
                        alias = format_args!("0x{:03X}", source_alias),
                        "datagram restarted mid-reassembly, discarding buffer"
                    );
                }
                self.datagram_buffers.insert(source_alias, frame.data.clone());
            }
            FrameFormat::DatagramMiddle | FrameFormat::DatagramLast => {
                if variable != self.local_alias {
                    return;
                }
                let Some(buffer) = self.datagram_buffers.get_mut(&source_alias) else {
                    debug!(
                        alias = format_args!("0x{:03X}", source_alias),
                        "datagram continuation without start dropped"
                    );
                    return;
                };
                buffer.extend_from_slice(&frame.data);
                if format == FrameFormat::DatagramLast {
                    let data = self.datagram_buffers.remove(&source_alias).unwrap_or_default();
                    actions.messages.push(Message::addressed(
                        Mti::DATAGRAM,
                        source,
                        self.node_id,
                        data,
                    ));
                }
            }
            FrameFormat::StreamData => {
                if variable != self.local_alias {
                    return;
                }
                actions.messages.push(Message::addressed(
                    Mti::STREAM_DATA_SEND,
                    source,
                    self.node_id,
                    frame.data.clone(),
                ));
            }
        }
    }

    fn process_mti_frame(
        &mut self,
        can_mti: u16,
        source_alias: u16,
        source: NodeID,
        frame: &CanFrame,
        actions: &mut LinkActions,
    ) {
        let mti = Mti::from_raw(can_mti & MTI_CAN_MASK);
        if !mti.address_present() {
            actions
                .messages
                .push(Message::global(mti, source, frame.data.clone()));
            return;
        }
        // Addressed: first two data bytes are segmentation flags plus the
        // destination alias.
        if frame.data.len() < 2 {
            debug!(%mti, "addressed frame shorter than destination prefix dropped");
            return;
        }
        let (b0, b1) = (frame.data[0], frame.data[1]);
        let dest_alias = (u16::from(b0 & 0x0F) << 8) | u16::from(b1);
        if dest_alias != self.local_alias {
            return;
        }
        // The segmentation code is the low two bits of the nibble; the top
        // two are reserved.
        let seg = (b0 >> 4) & 0x3;
        let payload = &frame.data[2..];
        match seg {
            SEG_ONLY => {
                actions.messages.push(Message::addressed(
                    mti,
                    source,
                    self.node_id,
                    payload.to_vec(),
                ));
            }
            SEG_FIRST => {
                if self.mti_buffers.remove(&source_alias).is_some() {
                    debug!(
                        alias = format_args!("0x{:03X}", source_alias),
                        "message restarted mid-reassembly, discarding buffer"
                    );
                }
                self.mti_buffers.insert(
                    source_alias,
                    MtiAccumulator {
                        can_mti,
                        data: payload.to_vec(),
                    },
                );
            }
            SEG_MIDDLE | SEG_LAST => {
                let Some(buffer) = self.mti_buffers.get_mut(&source_alias) else {
                    debug!(
                        alias = format_args!("0x{:03X}", source_alias),
                        "message continuation without start dropped"
                    );
                    return;
                };
                buffer.data.extend_from_slice(payload);
                if seg == SEG_LAST {
                    let buffer = self.mti_buffers.remove(&source_alias).unwrap();
                    let mti = Mti::from_raw(buffer.can_mti & MTI_CAN_MASK);
                    actions.messages.push(Message::addressed(
                        mti,
                        source,
                        self.node_id,
                        buffer.data,
                    ));
                }
            }
            _ => {}
        }
    }

    /// Translate one outbound message into CAN frames.
    ///
    /// Addressed messages to a NodeID with no known alias are queued and an
    /// AME lookup is emitted instead; the queue drains when the AMD reply
    /// arrives. Nothing is sent before the link is Permitted.
    pub fn send_message(&mut self, msg: Message) -> Vec<CanFrame> {
        if self.state != LinkState::Permitted {
            warn!(%msg, state = ?self.state, "message dropped, link not permitted");
            return Vec::new();
        }
        if msg.mti.is_internal() {
            warn!(%msg, "internal message cannot be sent on the wire");
            return Vec::new();
        }
        let Some(destination) = msg.destination else {
            if msg.data.len() > DATA_FRAME_PAYLOAD {
                warn!(%msg, "global message exceeds one frame, dropped");
                return Vec::new();
            }
            let can_mti = msg.mti.raw() & MTI_CAN_MASK;
            return vec![CanFrame::message(
                FrameFormat::Mti,
                can_mti,
                self.local_alias,
                msg.data,
            )];
        };
        let Some(dest_alias) = self.map.alias_for(destination) else {
            trace!(node = %destination, "destination alias unknown, issuing AME lookup");
            let lookup = CanFrame::ame(self.local_alias, Some(destination));
            self.pending.entry(destination).or_default().push(msg);
            return vec![lookup];
        };
        match msg.mti {
            Mti::DATAGRAM => self.datagram_frames(dest_alias, &msg.data),
            Mti::STREAM_DATA_SEND => self.stream_frames(dest_alias, &msg.data),
            _ => self.addressed_mti_frames(msg.mti, dest_alias, &msg.data),
        }
    }

    fn addressed_mti_frames(&self, mti: Mti, dest_alias: u16, data: &[u8]) -> Vec<CanFrame> {
        let can_mti = mti.raw() & MTI_CAN_MASK;
        let mut frames = Vec::new();
        if data.len() <= MTI_FRAME_PAYLOAD {
            frames.push(self.mti_frame(can_mti, dest_alias, SEG_ONLY, data));
            return frames;
        }
        let chunks: Vec<&[u8]> = data.chunks(MTI_FRAME_PAYLOAD).collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let seg = if i == 0 {
                SEG_FIRST
            } else if i == last {
                SEG_LAST
            } else {
                SEG_MIDDLE
            };
            frames.push(self.mti_frame(can_mti, dest_alias, seg, chunk));
        }
        frames
    }

    fn mti_frame(&self, can_mti: u16, dest_alias: u16, seg: u8, chunk: &[u8]) -> CanFrame {
        let mut data = Vec::with_capacity(2 + chunk.len());
        data.push((seg << 4) | ((dest_alias >> 8) as u8 & 0x0F));
        data.push(dest_alias as u8);
        data.extend_from_slice(chunk);
        CanFrame::message(FrameFormat::Mti, can_mti, self.local_alias, data)
    }

    fn datagram_frames(&self, dest_alias: u16, data: &[u8]) -> Vec<CanFrame> {
        if data.len() <= DATA_FRAME_PAYLOAD {
            return vec![CanFrame::message(
                FrameFormat::DatagramOnly,
                dest_alias,
                self.local_alias,
                data.to_vec(),
            )];
        }
        let chunks: Vec<&[u8]> = data.chunks(DATA_FRAME_PAYLOAD).collect();
        let last = chunks.len() - 1;
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let format = if i == 0 {
                    FrameFormat::DatagramFirst
                } else if i == last {
                    FrameFormat::DatagramLast
                } else {
                    FrameFormat::DatagramMiddle
                };
                CanFrame::message(format, dest_alias, self.local_alias, chunk.to_vec())
            })
            .collect()
    }

    fn stream_frames(&self, dest_alias: u16, data: &[u8]) -> Vec<CanFrame> {
        data.chunks(DATA_FRAME_PAYLOAD)
            .map(|chunk| {
                CanFrame::message(
                    FrameFormat::StreamData,
                    dest_alias,
                    self.local_alias,
                    chunk.to_vec(),
                )
            })
            .collect()
    }
}
