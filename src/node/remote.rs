//! Processor tracking what remote nodes report about themselves.

use crate::identity::NodeID;
use crate::message::{Message, Mti};
use crate::node::{Node, NodeState, PipSet, Processor};
use tracing::{debug, info};

/// Builds up remote [`Node`] records from their own traffic: protocol
/// support replies, SNIP replies, event identification, and event
/// reports. On first sight of a node it launches the discovery requests.
pub struct RemoteNodeProcessor {
    /// Source used for the discovery requests this processor emits.
    local: NodeID,
}

impl RemoteNodeProcessor {
    pub fn new(local: NodeID) -> Self {
        Self { local }
    }

    /// Ask a newly seen node who it is.
    fn discover(&self, node: &Node, out: &mut Vec<Message>) {
        info!(node = %node.id, "querying newly seen node");
        out.push(Message::addressed(
            Mti::PROTOCOL_SUPPORT_INQUIRY,
            self.local,
            node.id,
            Vec::new(),
        ));
        out.push(Message::addressed(
            Mti::SIMPLE_NODE_IDENT_INFO_REQUEST,
            self.local,
            node.id,
            Vec::new(),
        ));
        out.push(Message::addressed(
            Mti::IDENTIFY_EVENTS_ADDRESSED,
            self.local,
            node.id,
            Vec::new(),
        ));
    }
}

impl Processor for RemoteNodeProcessor {
    fn process(&mut self, msg: &Message, node: &mut Node, out: &mut Vec<Message>) -> bool {
        // Only traffic from the node itself describes it.
        if msg.source != node.id {
            return false;
        }
        match msg.mti {
            Mti::NEW_NODE_SEEN => {
                self.discover(node, out);
                true
            }
            Mti::INITIALIZATION_COMPLETE | Mti::INITIALIZATION_COMPLETE_SIMPLE => {
                // The node restarted: its caches are stale.
                node.state = NodeState::Initialized;
                node.pip = PipSet::default();
                node.snip.clear();
                node.events_produced.clear();
                node.events_consumed.clear();
                true
            }
            Mti::VERIFIED_NODE_ID => {
                let was = node.state;
                node.state = NodeState::Initialized;
                was != node.state
            }
            Mti::PROTOCOL_SUPPORT_REPLY if msg.is_addressed_to(self.local) => {
                node.pip = PipSet::from_payload(&msg.data);
                debug!(node = %node.id, pip = %node.pip, "protocol support recorded");
                true
            }
            Mti::SIMPLE_NODE_IDENT_INFO_REPLY if msg.is_addressed_to(self.local) => {
                node.snip.add_data(&msg.data);
                true
            }
            Mti::PRODUCER_IDENTIFIED_UNKNOWN
            | Mti::PRODUCER_IDENTIFIED_ACTIVE
            | Mti::PRODUCER_IDENTIFIED_INACTIVE
            | Mti::PRODUCER_CONSUMER_EVENT_REPORT => match msg.event_id() {
                Some(event) => node.events_produced.insert(event),
                None => false,
            },
            Mti::CONSUMER_IDENTIFIED_UNKNOWN
            | Mti::CONSUMER_IDENTIFIED_ACTIVE
            | Mti::CONSUMER_IDENTIFIED_INACTIVE => match msg.event_id() {
                Some(event) => node.events_consumed.insert(event),
                None => false,
            },
            _ => false,
        }
    }
}
