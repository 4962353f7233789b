//! Mutable build space for a filter tree.
//!
//! The parser appends draft nodes here, merging same-named siblings as they
//! are inserted. Once parsing and normalization are done the arena is frozen
//! into immutable [`FilterNode`]s and dropped.

use super::name::NameMatcher;
use super::node::FilterNode;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type NodeId = usize;

#[derive(Debug)]
pub(crate) struct DraftNode {
    pub matcher: NameMatcher,
    pub children: Vec<NodeId>,
    by_name: HashMap<String, NodeId>,
    pub negated: bool,
    pub squiggly: bool,
    pub empty_nested: bool,
    pub dot_pathed: bool,
    pub negative_parent: bool,
}

impl DraftNode {
    pub fn new(matcher: NameMatcher) -> Self {
        Self {
            matcher,
            children: Vec::new(),
            by_name: HashMap::new(),
            negated: false,
            squiggly: false,
            empty_nested: false,
            dot_pathed: false,
            negative_parent: false,
        }
    }

    pub fn dot_pathed(mut self, dot_pathed: bool) -> Self {
        self.dot_pathed = dot_pathed;
        self
    }

    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    pub fn empty_nested(mut self, empty_nested: bool) -> Self {
        self.empty_nested = empty_nested;
        self
    }

    pub fn negative_parent(mut self, negative_parent: bool) -> Self {
        self.negative_parent = negative_parent;
        self
    }
}

#[derive(Debug)]
pub(crate) struct Arena {
    nodes: Vec<DraftNode>,
}

impl Arena {
    /// Create an arena holding only the synthetic root scope
    pub fn new() -> (Self, NodeId) {
        let root = DraftNode::new(NameMatcher::exact("root")).dot_pathed(true);
        (Self { nodes: vec![root] }, 0)
    }

    pub fn get(&self, id: NodeId) -> &DraftNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut DraftNode {
        &mut self.nodes[id]
    }

    /// Insert `draft` under `parent`, merging into an existing sibling with the
    /// same literal name. Returns the id of the node that now represents it.
    pub fn add_child(&mut self, parent: NodeId, draft: DraftNode) -> NodeId {
        let key = draft.matcher.literal().to_string();

        let id = match self.nodes[parent].by_name.get(&key).copied() {
            Some(existing_id) => {
                let existing = &mut self.nodes[existing_id];
                existing.squiggly |= draft.squiggly;
                existing.empty_nested &= draft.empty_nested;
                existing.dot_pathed &= draft.dot_pathed;
                existing.negative_parent &= draft.negative_parent;
                // drafts are inserted before their own children are parsed
                debug_assert!(draft.children.is_empty());
                existing_id
            }
            None => {
                let id = self.nodes.len();
                self.nodes.push(draft);
                let parent_node = &mut self.nodes[parent];
                parent_node.children.push(id);
                parent_node.by_name.insert(key, id);
                id
            }
        };

        if !self.nodes[id].dot_pathed {
            self.nodes[parent].dot_pathed = false;
        }

        id
    }

    /// Freeze the children of `id` into an immutable node list
    pub fn freeze_children(&self, id: NodeId) -> Vec<FilterNode> {
        self.nodes[id]
            .children
            .iter()
            .map(|&child| self.freeze(child))
            .collect()
    }

    fn freeze(&self, id: NodeId) -> FilterNode {
        let node = &self.nodes[id];
        let children: Arc<[FilterNode]> = self.freeze_children(id).into();

        FilterNode {
            matcher: node.matcher.clone(),
            children,
            negated: node.negated,
            squiggly: node.squiggly,
            empty_nested: node.empty_nested,
            dot_pathed: node.dot_pathed,
            negative_parent: node.negative_parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_siblings_merge_flags() {
        let (mut arena, root) = Arena::new();
        let a = arena.add_child(
            root,
            DraftNode::new(NameMatcher::exact("a"))
                .dot_pathed(true)
                .negative_parent(true),
        );
        arena.get_mut(a).squiggly = true;
        arena.get_mut(a).empty_nested = true;

        let merged = arena.add_child(root, DraftNode::new(NameMatcher::exact("a")));
        assert_eq!(a, merged);

        let node = arena.get(a);
        assert!(node.squiggly, "squiggly is OR-merged");
        assert!(!node.empty_nested, "empty nested is AND-merged");
        assert!(!node.dot_pathed, "dot pathed is AND-merged");
        assert!(!node.negative_parent, "negative parent is AND-merged");
        assert_eq!(arena.get(root).children.len(), 1);
    }

    #[test]
    fn test_non_dot_pathed_child_clears_parent_flag() {
        let (mut arena, root) = Arena::new();
        arena.add_child(root, DraftNode::new(NameMatcher::exact("a")).dot_pathed(true));
        assert!(arena.get(root).dot_pathed);

        arena.add_child(root, DraftNode::new(NameMatcher::exact("b")));
        assert!(!arena.get(root).dot_pathed);
    }

    #[test]
    fn test_freeze_keeps_insertion_order() {
        let (mut arena, root) = Arena::new();
        for name in ["c", "a", "b", "a"] {
            arena.add_child(root, DraftNode::new(NameMatcher::exact(name)));
        }
        let names: Vec<String> = arena
            .freeze_children(root)
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
