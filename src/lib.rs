//! lcbus: an OpenLCB/LCC node stack
//!
//! A CAN link layer (alias allocation, collision handling, message
//! segmentation), the datagram/memory/stream service protocols built on
//! it, and the node-store dispatch that tracks every node seen on the
//! network.

pub mod config;
pub mod datagram;
pub mod frame;
pub mod identity;
pub mod link;
pub mod memory;
pub mod message;
pub mod node;
pub mod stack;
pub mod stream;
pub mod transport;

// Re-export identifier types
pub use identity::{EventID, IdentityError, NodeID};

// Re-export message types
pub use message::{Message, Mti};

// Re-export frame types
pub use frame::{gridconnect::GridConnectParser, CanFrame, CanHeader, FrameFormat};

// Re-export link types
pub use link::{CanLink, LinkActions, LinkState};

// Re-export service types
pub use datagram::{
    DatagramEvent, DatagramOutcome, DatagramReadMemo, DatagramService, DatagramWriteMemo,
};
pub use memory::{
    MemoryReadMemo, MemoryService, MemoryWriteMemo, ReadOutcome, WriteOutcome,
};
pub use stream::{StreamOutcome, StreamService, StreamWriteMemo};

// Re-export node types
pub use node::{LocalNodeProcessor, Node, NodeState, NodeStore, PipSet, Processor,
    RemoteNodeProcessor, Snip};

// Re-export stack types
pub use stack::{DatagramListener, MessageListener, Stack};

// Re-export config types
pub use config::{Config, ConfigError};

// Re-export transport types
pub use transport::tcp::GridConnectTcp;
pub use transport::{event_channel, EventRx, EventTx, TransportError, TransportEvent, TransportState};
