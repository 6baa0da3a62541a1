//! Node records and the processor dispatch chain.
//!
//! A [`Node`] is everything the process knows about one network
//! participant: its id, initialization state, protocol support, cached
//! self-description, and the events it produces or consumes. Nodes live in
//! a [`NodeStore`] and are mutated only through the store's ordered
//! [`Processor`] chain.

mod local;
mod pip;
mod remote;
mod snip;
mod store;

#[cfg(test)]
mod tests;

pub use local::LocalNodeProcessor;
pub use pip::PipSet;
pub use remote::RemoteNodeProcessor;
pub use snip::Snip;
pub use store::{NodeStore, Processor};

use crate::identity::{EventID, NodeID};
use std::collections::HashSet;
use std::fmt;

/// Lifecycle state of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    /// Created but not yet seen to complete initialization.
    #[default]
    Uninitialized,
    /// Announced itself with Initialization_Complete.
    Initialized,
}

/// Everything known about one network participant.
#[derive(Clone, Default)]
pub struct Node {
    pub id: NodeID,
    pub state: NodeState,
    pub pip: PipSet,
    pub snip: Snip,
    pub events_produced: HashSet<EventID>,
    pub events_consumed: HashSet<EventID>,
}

impl Node {
    pub fn new(id: NodeID) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Short human-readable name: the SNIP user name when known, else the
    /// node id.
    pub fn name(&self) -> String {
        if self.snip.user_name.is_empty() {
            self.id.to_string()
        } else {
            self.snip.user_name.clone()
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, {:?})", self.id, self.state)
    }
}
