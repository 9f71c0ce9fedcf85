//! view_tree.snapshot.v1 schema and in-memory tree
//!
//! A snapshot is a screen rectangle plus a back-to-front list of nested
//! container nodes. Node attributes are the same [`NodeInfo`] fields a live
//! accessor reports, flattened next to the node id:
//!
//! ```json
//! {
//!   "schema": "view_tree.snapshot.v1",
//!   "screen": { "x": 0, "y": 0, "width": 390, "height": 844 },
//!   "containers": [
//!     { "id": 1, "type_name": "UIWindow",
//!       "frame": { "x": 0, "y": 0, "width": 390, "height": 844 },
//!       "children": [ ... ] }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::tree::{NodeId, NodeInfo, ViewTree};
use crate::types::Rect;

/// Current snapshot schema version
pub const SNAPSHOT_SCHEMA_VERSION: &str = "view_tree.snapshot.v1";

fn default_schema() -> String {
    SNAPSHOT_SCHEMA_VERSION.to_string()
}

/// Serialized form of a whole visual tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewTreeSnapshot {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub screen: Rect,
    pub containers: Vec<SnapshotNode>,
}

impl ViewTreeSnapshot {
    pub fn new(screen: Rect, containers: Vec<SnapshotNode>) -> Self {
        Self {
            schema: default_schema(),
            screen,
            containers,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, GateError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_schema()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn check_schema(&self) -> Result<(), GateError> {
        if self.schema != SNAPSHOT_SCHEMA_VERSION {
            return Err(GateError::UnsupportedSchema(format!(
                "expected {}, got {}",
                SNAPSHOT_SCHEMA_VERSION, self.schema
            )));
        }
        Ok(())
    }
}

/// One node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub info: NodeInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    pub fn new(id: u64, info: NodeInfo) -> Self {
        Self {
            id: NodeId(id),
            info,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SnapshotNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<SnapshotNode>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug, Clone)]
struct Entry {
    info: NodeInfo,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Arena-backed [`ViewTree`] over a snapshot
///
/// Supports removal and in-place edits so a scan followed by a probe can be
/// exercised against a tree that changed in between.
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    screen: Rect,
    roots: Vec<NodeId>,
    nodes: HashMap<NodeId, Entry>,
}

impl SnapshotTree {
    /// Build a tree. Node ids must be unique across all containers.
    pub fn new(screen: Rect, containers: Vec<SnapshotNode>) -> Result<Self, GateError> {
        let mut tree = Self {
            screen,
            roots: Vec::new(),
            nodes: HashMap::new(),
        };
        tree.check_ids(&containers)?;
        for container in containers {
            tree.roots.push(container.id);
            tree.insert(container, None);
        }
        Ok(tree)
    }

    pub fn from_snapshot(snapshot: ViewTreeSnapshot) -> Result<Self, GateError> {
        snapshot.check_schema()?;
        Self::new(snapshot.screen, snapshot.containers)
    }

    pub fn from_json(json: &str) -> Result<Self, GateError> {
        Self::from_snapshot(ViewTreeSnapshot::from_json(json)?)
    }

    /// Serialize back into snapshot form
    pub fn to_snapshot(&self) -> ViewTreeSnapshot {
        let containers = self
            .roots
            .iter()
            .filter_map(|id| self.rebuild(*id))
            .collect();
        ViewTreeSnapshot::new(self.screen, containers)
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Mutable access to a node's attributes
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(&id).map(|entry| &mut entry.info)
    }

    /// Append a subtree under `parent`
    pub fn add_child(&mut self, parent: NodeId, child: SnapshotNode) -> Result<(), GateError> {
        if !self.nodes.contains_key(&parent) {
            return Err(GateError::InvalidSnapshot(format!(
                "unknown parent node {}",
                parent.0
            )));
        }
        self.check_ids(std::slice::from_ref(&child))?;
        let child_id = child.id;
        self.insert(child, Some(parent));
        if let Some(entry) = self.nodes.get_mut(&parent) {
            entry.children.push(child_id);
        }
        Ok(())
    }

    /// Remove a node and its whole subtree. Returns `false` if the node
    /// was not present.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(entry) = self.nodes.get(&id) else {
            return false;
        };
        match entry.parent {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(&parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.nodes.remove(&current) {
                stack.extend(entry.children);
            }
        }
        true
    }

    /// Reject ids already present or repeated within `nodes`
    fn check_ids(&self, nodes: &[SnapshotNode]) -> Result<(), GateError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&SnapshotNode> = nodes.iter().collect();
        while let Some(node) = stack.pop() {
            if self.nodes.contains_key(&node.id) || !seen.insert(node.id) {
                return Err(GateError::InvalidSnapshot(format!(
                    "duplicate node id {}",
                    node.id.0
                )));
            }
            stack.extend(node.children.iter());
        }
        Ok(())
    }

    fn insert(&mut self, root: SnapshotNode, parent: Option<NodeId>) {
        let mut stack = vec![(root, parent)];
        while let Some((node, parent)) = stack.pop() {
            let SnapshotNode { id, info, children } = node;
            let child_ids = children.iter().map(|child| child.id).collect();
            stack.extend(children.into_iter().map(|child| (child, Some(id))));
            self.nodes.insert(
                id,
                Entry {
                    info,
                    children: child_ids,
                    parent,
                },
            );
        }
    }

    fn rebuild(&self, id: NodeId) -> Option<SnapshotNode> {
        let entry = self.nodes.get(&id)?;
        Some(SnapshotNode {
            id,
            info: entry.info.clone(),
            children: entry
                .children
                .iter()
                .filter_map(|child| self.rebuild(*child))
                .collect(),
        })
    }
}

impl ViewTree for SnapshotTree {
    fn inspect(&self, node: NodeId) -> Option<NodeInfo> {
        self.nodes.get(&node).map(|entry| entry.info.clone())
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    fn containers(&self) -> Vec<NodeId> {
        self.roots.clone()
    }

    fn screen_bounds(&self) -> Rect {
        self.screen
    }

    fn is_alive(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;
    use pretty_assertions::assert_eq;

    const SNAPSHOT: &str = r#"{
        "schema": "view_tree.snapshot.v1",
        "screen": { "x": 0, "y": 0, "width": 390, "height": 844 },
        "containers": [
            {
                "id": 1,
                "type_name": "UIWindow",
                "frame": { "x": 0, "y": 0, "width": 390, "height": 844 },
                "children": [
                    { "id": 2, "type_name": "UILabel",
                      "frame": { "x": 0, "y": 0, "width": 100, "height": 20 } },
                    { "id": 3, "type_name": "CustomInput", "kind": "text_input",
                      "frame": { "x": 0, "y": 40, "width": 100, "height": 20 },
                      "native_id": "email" }
                ]
            }
        ]
    }"#;

    fn leaf(id: u64) -> SnapshotNode {
        SnapshotNode::new(id, NodeInfo::new("UIView", Rect::new(0.0, 0.0, 1.0, 1.0)))
    }

    #[test]
    fn test_parse_snapshot() {
        let tree = SnapshotTree::from_json(SNAPSHOT).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.containers(), vec![NodeId(1)]);
        assert_eq!(tree.children(NodeId(1)), vec![NodeId(2), NodeId(3)]);

        let input = tree.inspect(NodeId(3)).unwrap();
        assert_eq!(input.kind, NodeKind::TextInput);
        assert_eq!(input.native_id.as_deref(), Some("email"));
        assert_eq!(input.alpha, 1.0);
    }

    #[test]
    fn test_missing_schema_defaults_to_current() {
        let json = r#"{ "screen": { "x": 0, "y": 0, "width": 10, "height": 10 }, "containers": [] }"#;
        let tree = SnapshotTree::from_json(json).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_unsupported_schema_rejected() {
        let json = SNAPSHOT.replace("view_tree.snapshot.v1", "view_tree.snapshot.v9");
        let result = SnapshotTree::from_json(&json);
        assert!(matches!(result, Err(GateError::UnsupportedSchema(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = SnapshotTree::new(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            vec![leaf(1).with_child(leaf(2)), leaf(2)],
        );
        assert!(matches!(result, Err(GateError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut tree = SnapshotTree::new(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            vec![leaf(1).with_child(leaf(2).with_child(leaf(3))).with_child(leaf(4))],
        )
        .unwrap();

        assert!(tree.remove(NodeId(2)));
        assert!(!tree.remove(NodeId(2)));
        assert!(!tree.is_alive(NodeId(3)));
        assert_eq!(tree.children(NodeId(1)), vec![NodeId(4)]);
        assert_eq!(tree.len(), 2);

        assert!(tree.remove(NodeId(1)));
        assert!(tree.containers().is_empty());
    }

    #[test]
    fn test_add_child_checks_ids() {
        let mut tree =
            SnapshotTree::new(Rect::new(0.0, 0.0, 10.0, 10.0), vec![leaf(1)]).unwrap();
        tree.add_child(NodeId(1), leaf(2)).unwrap();
        assert_eq!(tree.children(NodeId(1)), vec![NodeId(2)]);

        assert!(tree.add_child(NodeId(1), leaf(2)).is_err());
        assert!(tree.add_child(NodeId(99), leaf(5)).is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tree = SnapshotTree::from_json(SNAPSHOT).unwrap();
        let json = tree.to_snapshot().to_json().unwrap();
        let reparsed = SnapshotTree::from_json(&json).unwrap();
        assert_eq!(reparsed.to_snapshot(), tree.to_snapshot());
    }
}
