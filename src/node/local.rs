//! Processor answering for this process's own nodes.

use crate::message::{codes, Message, Mti};
use crate::node::{Node, NodeState, Processor};
use tracing::{debug, info};

/// Serves the standard request/reply protocols on behalf of locally owned
/// nodes: node-id verification, protocol support, SNIP, and event
/// identification. Unrecognized addressed requests are refused with
/// Optional_Interaction_Rejected; unrecognized global messages are
/// ignored.
#[derive(Default)]
pub struct LocalNodeProcessor;

impl LocalNodeProcessor {
    pub fn new() -> Self {
        Self
    }

    fn link_up(&self, node: &mut Node, out: &mut Vec<Message>) -> bool {
        node.state = NodeState::Initialized;
        info!(node = %node.id, "local node initialized");
        out.push(Message::global(
            Mti::INITIALIZATION_COMPLETE,
            node.id,
            node.id.to_bytes().to_vec(),
        ));
        // Learn who else is out there.
        out.push(Message::global(Mti::VERIFY_NODE_ID_GLOBAL, node.id, Vec::new()));
        true
    }

    fn verified(&self, node: &Node, out: &mut Vec<Message>) {
        out.push(Message::global(
            Mti::VERIFIED_NODE_ID,
            node.id,
            node.id.to_bytes().to_vec(),
        ));
    }

    fn identify_events(&self, node: &Node, out: &mut Vec<Message>) {
        for event in &node.events_produced {
            out.push(Message::global(
                Mti::PRODUCER_IDENTIFIED_UNKNOWN,
                node.id,
                event.to_bytes().to_vec(),
            ));
        }
        for event in &node.events_consumed {
            out.push(Message::global(
                Mti::CONSUMER_IDENTIFIED_UNKNOWN,
                node.id,
                event.to_bytes().to_vec(),
            ));
        }
    }

    fn rejected(&self, msg: &Message, node: &Node, out: &mut Vec<Message>) {
        debug!(mti = %msg.mti, node = %node.id, "rejecting unrecognized interaction");
        let mti = msg.mti.raw();
        out.push(Message::addressed(
            Mti::OPTIONAL_INTERACTION_REJECTED,
            node.id,
            msg.source,
            vec![
                (codes::UNKNOWN_MTI >> 8) as u8,
                codes::UNKNOWN_MTI as u8,
                (mti >> 8) as u8,
                mti as u8,
            ],
        ));
    }

    /// Addressed MTIs that are some other component's business,
    /// including the replies our own discovery requests solicit; never
    /// answered with a rejection here.
    fn handled_elsewhere(mti: Mti) -> bool {
        matches!(
            mti,
            Mti::PROTOCOL_SUPPORT_REPLY
                | Mti::SIMPLE_NODE_IDENT_INFO_REPLY
                | Mti::DATAGRAM
                | Mti::DATAGRAM_RECEIVED_OK
                | Mti::DATAGRAM_REJECTED
                | Mti::STREAM_INITIATE_REQUEST
                | Mti::STREAM_INITIATE_REPLY
                | Mti::STREAM_DATA_SEND
                | Mti::STREAM_DATA_PROCEED
                | Mti::STREAM_DATA_COMPLETE
                | Mti::OPTIONAL_INTERACTION_REJECTED
                | Mti::TERMINATE_DUE_TO_ERROR
        )
    }
}

impl Processor for LocalNodeProcessor {
    fn process(&mut self, msg: &Message, node: &mut Node, out: &mut Vec<Message>) -> bool {
        // Never answer our own traffic.
        if msg.source == node.id {
            return false;
        }
        let addressed_here = msg.is_addressed_to(node.id);
        match msg.mti {
            Mti::LINK_LAYER_UP => return self.link_up(node, out),
            Mti::LINK_LAYER_DOWN => {
                node.state = NodeState::Uninitialized;
                return true;
            }
            Mti::VERIFY_NODE_ID_GLOBAL => {
                // An empty payload asks everyone; a node id asks one node.
                let matches = match msg.data.len() {
                    0 => true,
                    _ => msg.data == node.id.to_bytes(),
                };
                if matches {
                    self.verified(node, out);
                }
            }
            Mti::VERIFY_NODE_ID_ADDRESSED if addressed_here => self.verified(node, out),
            Mti::PROTOCOL_SUPPORT_INQUIRY if addressed_here => {
                out.push(Message::addressed(
                    Mti::PROTOCOL_SUPPORT_REPLY,
                    node.id,
                    msg.source,
                    node.pip.to_payload(),
                ));
            }
            Mti::SIMPLE_NODE_IDENT_INFO_REQUEST if addressed_here => {
                out.push(Message::addressed(
                    Mti::SIMPLE_NODE_IDENT_INFO_REPLY,
                    node.id,
                    msg.source,
                    node.snip.to_payload(),
                ));
            }
            Mti::IDENTIFY_EVENTS_GLOBAL => self.identify_events(node, out),
            Mti::IDENTIFY_EVENTS_ADDRESSED if addressed_here => self.identify_events(node, out),
            Mti::IDENTIFY_PRODUCER => {
                if let Some(event) = msg.event_id() {
                    if node.events_produced.contains(&event) {
                        out.push(Message::global(
                            Mti::PRODUCER_IDENTIFIED_UNKNOWN,
                            node.id,
                            event.to_bytes().to_vec(),
                        ));
                    }
                }
            }
            Mti::IDENTIFY_CONSUMER => {
                if let Some(event) = msg.event_id() {
                    if node.events_consumed.contains(&event) {
                        out.push(Message::global(
                            Mti::CONSUMER_IDENTIFIED_UNKNOWN,
                            node.id,
                            event.to_bytes().to_vec(),
                        ));
                    }
                }
            }
            mti if addressed_here && !mti.is_internal() && !Self::handled_elsewhere(mti) => {
                self.rejected(msg, node, out);
            }
            _ => {}
        }
        false
    }
}
