//! Scene nodes and the intrusive sibling ring.
//!
//! A [`SceneNode`] exists only for entities that take part in parenting. Nodes
//! live in a generation-checked arena owned by the transform system, so a
//! stale [`NodeKey`] after destruction resolves to `None` instead of aliasing
//! another node.
//!
//! Children of a node form a circular doubly-linked list through
//! `next_sibling` / `prev_sibling`. A node that is alone in its ring links to
//! itself in both directions.

use bevy_ecs::entity::Entity;
use glam::Mat4;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle of a [`SceneNode`] inside a transform system's arena.
    pub struct NodeKey;
}

pub(crate) type NodeArena = SlotMap<NodeKey, SceneNode>;

/// Hierarchy record of one entity.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub(crate) entity: Entity,
    pub(crate) matrix: Mat4,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) first_child: Option<NodeKey>,
    pub(crate) next_sibling: NodeKey,
    pub(crate) prev_sibling: NodeKey,
    pub(crate) child_count: u32,
}

impl SceneNode {
    fn new(key: NodeKey, entity: Entity, matrix: Mat4) -> Self {
        Self {
            entity,
            matrix,
            parent: None,
            first_child: None,
            next_sibling: key,
            prev_sibling: key,
            child_count: 0,
        }
    }

    /// Entity this node belongs to.
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Cached world matrix.
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeKey> {
        self.first_child
    }

    #[inline]
    pub fn next_sibling(&self) -> NodeKey {
        self.next_sibling
    }

    #[inline]
    pub fn prev_sibling(&self) -> NodeKey {
        self.prev_sibling
    }

    #[inline]
    pub fn child_count(&self) -> u32 {
        self.child_count
    }
}

/// Allocates a parentless, childless node.
pub(crate) fn create(nodes: &mut NodeArena, entity: Entity, matrix: Mat4) -> NodeKey {
    nodes.insert_with_key(|key| SceneNode::new(key, entity, matrix))
}

/// Links `child` into the ring of `parent`, right after the current first child.
///
/// `child` must already be detached.
pub(crate) fn attach(nodes: &mut NodeArena, parent: NodeKey, child: NodeKey) {
    debug_assert!(nodes[child].parent.is_none());

    match nodes[parent].first_child {
        None => {
            nodes[parent].first_child = Some(child);
            nodes[child].next_sibling = child;
            nodes[child].prev_sibling = child;
        }
        Some(first) => {
            let after = nodes[first].next_sibling;
            nodes[child].prev_sibling = first;
            nodes[child].next_sibling = after;
            nodes[first].next_sibling = child;
            nodes[after].prev_sibling = child;
        }
    }

    nodes[child].parent = Some(parent);
    nodes[parent].child_count += 1;
}

/// Unlinks `node` from its sibling ring and its parent. O(1).
///
/// Also handles parentless nodes that still share a ring with former
/// siblings after their parent was destroyed.
pub(crate) fn detach(nodes: &mut NodeArena, node: NodeKey) {
    let parent = nodes[node].parent;
    let next = nodes[node].next_sibling;
    let prev = nodes[node].prev_sibling;

    if next == node {
        if let Some(parent) = parent {
            nodes[parent].first_child = None;
        }
    } else {
        nodes[prev].next_sibling = next;
        nodes[next].prev_sibling = prev;
        if let Some(parent) = parent {
            if nodes[parent].first_child == Some(node) {
                nodes[parent].first_child = Some(prev);
            }
        }
    }

    if let Some(parent) = parent {
        nodes[parent].child_count -= 1;
    }

    let n = &mut nodes[node];
    n.parent = None;
    n.next_sibling = node;
    n.prev_sibling = node;
}

/// Clears the parent link of every child of `node` and empties its child list.
///
/// Children keep their sibling links to each other and are not re-attached
/// anywhere. Returns the former children.
pub(crate) fn orphan_children(nodes: &mut NodeArena, node: NodeKey) -> Vec<NodeKey> {
    let orphans: Vec<NodeKey> = children(nodes, node).collect();
    for &orphan in &orphans {
        nodes[orphan].parent = None;
    }
    let n = &mut nodes[node];
    n.first_child = None;
    n.child_count = 0;
    orphans
}

/// Returns `true` if `ancestor` is `node` or one of its ancestors.
pub(crate) fn is_ancestor(nodes: &NodeArena, ancestor: NodeKey, node: NodeKey) -> bool {
    let mut current = Some(node);
    while let Some(key) = current {
        if key == ancestor {
            return true;
        }
        current = nodes.get(key).and_then(|n| n.parent);
    }
    false
}

/// Number of ancestors above `node`. Roots have depth 0.
pub(crate) fn depth(nodes: &NodeArena, node: NodeKey) -> u32 {
    let mut depth = 0;
    let mut current = nodes.get(node).and_then(|n| n.parent);
    while let Some(key) = current {
        depth += 1;
        current = nodes.get(key).and_then(|n| n.parent);
    }
    depth
}

/// Iterates the children of `parent`, starting at its first child.
pub(crate) fn children(nodes: &NodeArena, parent: NodeKey) -> Children<'_> {
    let node = &nodes[parent];
    Children {
        nodes,
        next: node.first_child,
        remaining: node.child_count,
    }
}

/// Iterator over a node's children. See [`children`].
pub struct Children<'a> {
    nodes: &'a NodeArena,
    next: Option<NodeKey>,
    remaining: u32,
}

impl Iterator for Children<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = Some(self.nodes[current].next_sibling);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}
