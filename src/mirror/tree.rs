//! Persistent tree implementation of [`MirrorStorage`].

use super::storage::MirrorStorage;
use crate::path::split_path;
use crate::types::JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

type Children = BTreeMap<String, MirrorNode>;

/// A node of the mirror tree.
///
/// JSON objects become branches so that later writes can address their
/// children; every other value is a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum MirrorNode {
    Branch(Arc<Children>),
    Leaf(JsonValue),
}

impl MirrorNode {
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => MirrorNode::Branch(Arc::new(
                map.into_iter()
                    .map(|(k, v)| (k, MirrorNode::from_json(v)))
                    .collect(),
            )),
            other => MirrorNode::Leaf(other),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            MirrorNode::Branch(children) => children_to_json(children),
            MirrorNode::Leaf(value) => value.clone(),
        }
    }
}

fn children_to_json(children: &Children) -> JsonValue {
    JsonValue::Object(
        children
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Write `node` at `segments` below `children`, cloning only the nodes on
/// the way down that are shared with another snapshot.
fn set_in(children: &mut Arc<Children>, segments: &[&str], node: MirrorNode) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let children = Arc::make_mut(children);

    if rest.is_empty() {
        children.insert(first.to_string(), node);
        return;
    }

    let child = children
        .entry(first.to_string())
        .or_insert_with(|| MirrorNode::Branch(Arc::default()));
    // A leaf on the way down gives way to the deeper structure.
    if let MirrorNode::Leaf(_) = child {
        *child = MirrorNode::Branch(Arc::default());
    }
    if let MirrorNode::Branch(grandchildren) = child {
        set_in(grandchildren, rest, node);
    }
}

/// Default mirror storage: a structurally shared tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MirrorTree {
    root: Arc<Children>,
}

impl MirrorTree {
    /// The node at `path`, if any. The root path addresses no node.
    pub fn node_at_path(&self, path: &str) -> Option<&MirrorNode> {
        let segments = split_path(path);
        let (first, rest) = segments.split_first()?;
        let mut node = self.root.get(*first)?;
        for segment in rest {
            match node {
                MirrorNode::Branch(children) => node = children.get(*segment)?,
                MirrorNode::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

impl MirrorStorage for MirrorTree {
    fn empty() -> Self {
        Self::default()
    }

    fn keys_at_path(&self, path: &str) -> Vec<String> {
        if split_path(path).is_empty() {
            return self.root.keys().cloned().collect();
        }
        match self.node_at_path(path) {
            Some(MirrorNode::Branch(children)) => children.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn value_at_path(&self, path: &str) -> Option<JsonValue> {
        if split_path(path).is_empty() {
            return Some(children_to_json(&self.root));
        }
        self.node_at_path(path).map(MirrorNode::to_json)
    }

    fn set_values(&self, values: &BTreeMap<String, JsonValue>) -> Self {
        let mut root = Arc::clone(&self.root);
        for (path, value) in values {
            let segments = split_path(path);
            if segments.is_empty() {
                match MirrorNode::from_json(value.clone()) {
                    MirrorNode::Branch(children) => root = children,
                    MirrorNode::Leaf(_) => {
                        warn!("ignoring non-object value written at the mirror root");
                    }
                }
                continue;
            }
            set_in(&mut root, &segments, MirrorNode::from_json(value.clone()));
        }
        Self { root }
    }

    fn to_json(&self) -> JsonValue {
        children_to_json(&self.root)
    }

    fn from_json(value: JsonValue) -> Self {
        match MirrorNode::from_json(value) {
            MirrorNode::Branch(root) => Self { root },
            MirrorNode::Leaf(_) => Self::default(),
        }
    }
}
