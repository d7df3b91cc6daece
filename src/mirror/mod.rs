//! Local hierarchical mirror of remote values.
//!
//! The mirror is addressed by splitting a normalized path into segments.
//! Storage is pluggable through [`MirrorStorage`]; [`MirrorTree`] is the
//! default, a persistent tree that shares unchanged subtrees between
//! snapshots.

mod storage;
mod tree;

pub use storage::MirrorStorage;
pub use tree::{MirrorNode, MirrorTree};
