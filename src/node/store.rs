//! Node storage and the processor dispatch chain.

use crate::identity::NodeID;
use crate::message::{Message, Mti};
use crate::node::Node;
use std::collections::HashMap;
use tracing::{debug, info};

/// One stage of the dispatch chain.
///
/// A processor is applied to every message against every node in the
/// store. It mutates the node and/or pushes reply messages, and returns
/// whether the node changed enough to interest an observer.
pub trait Processor {
    fn process(&mut self, msg: &Message, node: &mut Node, out: &mut Vec<Message>) -> bool;
}

/// A set of [`Node`]s plus the ordered processors that act on them.
///
/// Iteration order is insertion order. With `create_on_sight`, a message
/// from an unknown source first creates the node and runs a synthetic
/// New_Node_Seen through the chain, so processors can issue discovery
/// requests before the triggering message itself is dispatched.
#[derive(Default)]
pub struct NodeStore {
    nodes: HashMap<NodeID, Node>,
    order: Vec<NodeID>,
    processors: Vec<Box<dyn Processor>>,
    create_on_sight: bool,
}

impl NodeStore {
    /// Store for explicitly registered nodes only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that records every message source it observes.
    pub fn create_on_sight() -> Self {
        Self {
            create_on_sight: true,
            ..Self::default()
        }
    }

    /// Append a processor to the dispatch chain.
    pub fn add_processor(&mut self, processor: Box<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Insert a node explicitly. An existing node with the same id is
    /// kept.
    pub fn register(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            return;
        }
        self.order.push(node.id);
        self.nodes.insert(node.id, node);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn node(&self, id: NodeID) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Run one message through every processor against every node.
    ///
    /// Returns whether any processor reported a significant change.
    pub fn dispatch(&mut self, msg: &Message, out: &mut Vec<Message>) -> bool {
        let mut significant = false;
        if self.create_on_sight
            && msg.source != NodeID::ZERO
            && !self.nodes.contains_key(&msg.source)
        {
            info!(node = %msg.source, "new node seen");
            self.register(Node::new(msg.source));
            let seen = Message::global(Mti::NEW_NODE_SEEN, msg.source, Vec::new());
            significant |= self.run(&seen, out);
        }
        significant |= self.run(msg, out);
        significant
    }

    fn run(&mut self, msg: &Message, out: &mut Vec<Message>) -> bool {
        // The chain is detached while it runs so processors can borrow
        // nodes mutably.
        let mut processors = std::mem::take(&mut self.processors);
        let ids = self.order.clone();
        let mut significant = false;
        for processor in processors.iter_mut() {
            for id in &ids {
                if let Some(node) = self.nodes.get_mut(id) {
                    significant |= processor.process(msg, node, out);
                }
            }
        }
        self.processors = processors;
        if significant {
            debug!(%msg, "dispatch changed node state");
        }
        significant
    }
}
