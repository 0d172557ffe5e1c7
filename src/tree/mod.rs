//! # Tree Position Encoder
//!
//! Multi-context ordered trees: position is a per-context attribute on
//! the containment edge, so one shared subtree carries an independent
//! child ordering for every logical parent that references it.

pub mod address;
pub mod encoder;

pub use address::{context_of, is_context_key, is_tree_address, TreeAddress, WILDCARD};
pub use encoder::{
    attach_child, child_nodes, child_relationships, contexts_of, derive_addresses,
    expand_address, next_position, remove_from_context, reorder_children,
    resolve_position, retag_subtree, TreePolicy,
};
