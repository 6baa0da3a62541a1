//! The assembled protocol stack.
//!
//! [`Stack`] wires one [`CanLink`] to the datagram, memory, and stream
//! services and to the two node stores: the local store answering for this
//! process's node, and the remote store tracking every node seen on the
//! wire. Inbound frames go through the link, fan out to services, stores,
//! and listeners, and whatever those emit goes back out through the link.
//! Outbound frames accumulate in an internal queue until the transport
//! drains them with [`Stack::take_frames`].


use crate::datagram::{
    DatagramEvent, DatagramReadMemo, DatagramService, DatagramWriteMemo,
};
use crate::frame::CanFrame;
use crate::identity::NodeID;
use crate::link::{CanLink, LinkActions, LinkState};
use crate::memory::{MemoryReadMemo, MemoryService, MemoryWriteMemo, MEMORY_PROTOCOL};
use crate::message::{Message, Mti};
use crate::node::{LocalNodeProcessor, Node, NodeStore, RemoteNodeProcessor};
use crate::stream::{StreamService, StreamWriteMemo};
use tracing::debug;

/// Listener for inbound datagrams not consumed by the memory client.
///
/// Exactly one listener is expected to answer each datagram through the
/// provided [`DatagramService`] reply helpers; this is a protocol
/// contract, not something the stack enforces.
pub type DatagramListener =
    Box<dyn FnMut(&DatagramReadMemo, &DatagramService, &mut Vec<Message>) + Send>;

/// Listener observing every inbound message, internal ones included.
pub type MessageListener = Box<dyn FnMut(&Message) + Send>;

/// One node's complete protocol stack over one CAN link.
pub struct Stack {
    link: CanLink,
    datagram: DatagramService,
    memory: MemoryService,
    stream: StreamService,
    local_store: NodeStore,
    remote_store: NodeStore,
    datagram_listeners: Vec<DatagramListener>,
    message_listeners: Vec<MessageListener>,
    frame_out: Vec<CanFrame>,
}

impl Stack {
    /// Build a stack for `node`, registering it in the local store.
    pub fn new(node: Node) -> Self {
        let id = node.id;
        let mut local_store = NodeStore::new();
        local_store.register(node);
        local_store.add_processor(Box::new(LocalNodeProcessor::new()));
        let mut remote_store = NodeStore::create_on_sight();
        remote_store.add_processor(Box::new(RemoteNodeProcessor::new(id)));
        Self {
            link: CanLink::new(id),
            datagram: DatagramService::new(id),
            memory: MemoryService::new(),
            stream: StreamService::new(id),
            local_store,
            remote_store,
            datagram_listeners: Vec::new(),
            message_listeners: Vec::new(),
            frame_out: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeID {
        self.link.node_id()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// Nodes observed on the network.
    pub fn remote_nodes(&self) -> &NodeStore {
        &self.remote_store
    }

    pub fn add_datagram_listener(&mut self, listener: DatagramListener) {
        self.datagram_listeners.push(listener);
    }

    pub fn add_message_listener(&mut self, listener: MessageListener) {
        self.message_listeners.push(listener);
    }

    /// Outbound frames queued since the last call.
    pub fn take_frames(&mut self) -> Vec<CanFrame> {
        std::mem::take(&mut self.frame_out)
    }

    /// The transport came up: run alias allocation and announce.
    pub fn link_up(&mut self) {
        let actions = self.link.physical_layer_up();
        self.absorb(actions);
    }

    /// The transport dropped.
    pub fn link_down(&mut self) {
        let actions = self.link.physical_layer_down();
        self.absorb(actions);
    }

    /// Feed one received frame through the stack.
    pub fn process_frame(&mut self, frame: &CanFrame) {
        let actions = self.link.process_frame(frame);
        self.absorb(actions);
    }

    /// Send one message from this node.
    pub fn send_message(&mut self, msg: Message) {
        self.frame_out.extend(self.link.send_message(msg));
    }

    /// Send one datagram through the stack's datagram service.
    pub fn send_datagram(&mut self, memo: DatagramWriteMemo) {
        let mut out = Vec::new();
        self.datagram.send_datagram(memo, &mut out);
        self.send_all(out);
    }

    /// Issue a memory read against a remote node.
    pub fn read_memory(&mut self, memo: MemoryReadMemo) {
        let mut out = Vec::new();
        self.memory.request_read(memo, &mut self.datagram, &mut out);
        self.send_all(out);
    }

    /// Issue a memory write against a remote node.
    pub fn write_memory(&mut self, memo: MemoryWriteMemo) {
        let mut out = Vec::new();
        self.memory.request_write(memo, &mut self.datagram, &mut out);
        self.send_all(out);
    }

    /// Open a write stream to a remote node.
    pub fn write_stream(&mut self, memo: StreamWriteMemo) {
        let mut out = Vec::new();
        self.stream.write(memo, &mut out);
        self.send_all(out);
    }

    fn absorb(&mut self, actions: LinkActions) {
        self.frame_out.extend(actions.frames);
        for msg in actions.messages {
            self.handle_message(&msg);
        }
    }

    fn send_all(&mut self, out: Vec<Message>) {
        for msg in out {
            self.frame_out.extend(self.link.send_message(msg));
        }
    }

    /// Route one inbound (or internal) message through services, stores,
    /// and listeners, then send whatever they produced.
    fn handle_message(&mut self, msg: &Message) {
        debug!(%msg, "handling message");
        let mut out = Vec::new();

        match self.datagram.handle_message(msg) {
            Some(DatagramEvent::Received(memo)) => {
                if !self.memory.datagram_received(&memo, &self.datagram, &mut out) {
                    for listener in &mut self.datagram_listeners {
                        listener(&memo, &self.datagram, &mut out);
                    }
                }
            }
            Some(DatagramEvent::Completed { memo, outcome }) => {
                if memo.data.first() == Some(&MEMORY_PROTOCOL) {
                    self.memory.datagram_complete(&memo.data, memo.destination, outcome);
                }
            }
            None => {}
        }

        if msg.mti == Mti::LINK_LAYER_DOWN {
            // Outstanding exchanges can never complete now; fail them.
            // Memory requests still riding a datagram fail through its
            // completion, the rest directly.
            for event in self.datagram.link_down() {
                if let DatagramEvent::Completed { memo, outcome } = event {
                    if memo.data.first() == Some(&MEMORY_PROTOCOL) {
                        self.memory.datagram_complete(&memo.data, memo.destination, outcome);
                    }
                }
            }
            self.memory.link_down();
        }

        self.stream.handle_message(msg, &mut out);
        self.local_store.dispatch(msg, &mut out);
        self.remote_store.dispatch(msg, &mut out);
        for listener in &mut self.message_listeners {
            listener(msg);
        }
        self.send_all(out);

        // A collision quiesced the link; bring it straight back up.
        if msg.mti == Mti::LINK_LAYER_QUIESCE {
            let actions = self.link.restart_link();
            self.absorb(actions);
        }
    }
}
