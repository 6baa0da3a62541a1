//! Alias generation and the alias↔NodeID map.
//!
//! Candidate aliases are derived from a 48-bit seed through a fixed linear
//! congruential step. The generator is part of the wire contract:
//! conformant peers must be able to predict the sequence from the seed, so
//! the constants here are not tunable.

use crate::identity::NodeID;
use std::collections::HashMap;

/// LCG multiplier for the seed step.
pub const SEED_MULTIPLIER: u64 = 513;

/// LCG increment for the seed step.
pub const SEED_INCREMENT: u64 = 0x1B0C_A37A_4BA9;

/// Fallback alias when both the XOR fold and the sum fold degenerate to 0.
pub const FALLBACK_ALIAS: u16 = 0xAEF;

/// Advance the 48-bit alias seed: `next = seed·513 + 0x1B0CA37A4BA9 mod 2^48`.
pub fn next_seed(seed: u64) -> u64 {
    seed.wrapping_mul(SEED_MULTIPLIER)
        .wrapping_add(SEED_INCREMENT)
        & crate::identity::NODE_ID_MASK
}

/// Fold a 48-bit seed to a 12-bit alias.
///
/// XOR of the four 12-bit groups; if that is zero, the sum of the groups
/// mod 0xFF; if that is still zero, [`FALLBACK_ALIAS`]. Alias 0 is reserved
/// and never produced.
pub fn fold_alias(seed: u64) -> u16 {
    let groups = [
        ((seed >> 36) & 0xFFF) as u16,
        ((seed >> 24) & 0xFFF) as u16,
        ((seed >> 12) & 0xFFF) as u16,
        (seed & 0xFFF) as u16,
    ];
    let folded = groups[0] ^ groups[1] ^ groups[2] ^ groups[3];
    if folded != 0 {
        return folded;
    }
    let sum = (groups.iter().map(|&g| u32::from(g)).sum::<u32>() % 0xFF) as u16;
    if sum != 0 {
        sum
    } else {
        FALLBACK_ALIAS
    }
}

/// Bidirectional alias↔NodeID map for positively identified peers.
///
/// Entries are created on AMD receipt and removed on AMR receipt. The map
/// is a true bijection at any instant: inserting either side of a pair
/// first removes any entry it would shadow.
#[derive(Default)]
pub struct AliasMap {
    alias_to_node: HashMap<u16, NodeID>,
    node_to_alias: HashMap<NodeID, u16>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `alias` to `node`, displacing any stale pairing of either.
    pub fn insert(&mut self, alias: u16, node: NodeID) {
        if let Some(old_node) = self.alias_to_node.remove(&alias) {
            self.node_to_alias.remove(&old_node);
        }
        if let Some(old_alias) = self.node_to_alias.remove(&node) {
            self.alias_to_node.remove(&old_alias);
        }
        self.alias_to_node.insert(alias, node);
        self.node_to_alias.insert(node, alias);
    }

    /// Remove the entry for `alias`, returning the node it mapped to.
    pub fn remove_alias(&mut self, alias: u16) -> Option<NodeID> {
        let node = self.alias_to_node.remove(&alias)?;
        self.node_to_alias.remove(&node);
        Some(node)
    }

    pub fn node_for(&self, alias: u16) -> Option<NodeID> {
        self.alias_to_node.get(&alias).copied()
    }

    pub fn alias_for(&self, node: NodeID) -> Option<u16> {
        self.node_to_alias.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.alias_to_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alias_to_node.is_empty()
    }
}
