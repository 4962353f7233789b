use super::arena::{Arena, DraftNode, NodeId};
use super::name::NameMatcher;
use crate::bean::BASE_VIEW;

/// Inject a base-view fallback under every node whose children are all
/// negations, so the fields that were not excluded stay visible.
///
/// Injection is deferred until the walk finishes; the synthetic nodes are
/// leaves and are never inspected themselves.
pub(crate) fn analyze(arena: &mut Arena, root: NodeId) {
    let mut pending = Vec::new();
    collect(arena, root, &mut pending);

    for parent in pending {
        let dot_pathed = arena.get(parent).dot_pathed;
        arena.add_child(
            parent,
            DraftNode::new(NameMatcher::exact(BASE_VIEW)).dot_pathed(dot_pathed),
        );
    }
}

fn collect(arena: &Arena, id: NodeId, pending: &mut Vec<NodeId>) {
    let node = arena.get(id);
    if node.children.is_empty() {
        return;
    }

    let all_negated = node.children.iter().all(|&child| {
        let child = arena.get(child);
        child.negated || child.negative_parent
    });
    if all_negated {
        pending.push(id);
    }

    for &child in &node.children {
        collect(arena, child, pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(arena: &Arena, id: NodeId) -> Vec<String> {
        arena
            .get(id)
            .children
            .iter()
            .map(|&c| arena.get(c).matcher.literal().to_string())
            .collect()
    }

    #[test]
    fn test_all_negated_children_get_base_fallback() {
        let (mut arena, root) = Arena::new();
        arena.add_child(root, DraftNode::new(NameMatcher::exact("id")).negated(true));
        analyze(&mut arena, root);
        assert_eq!(names(&arena, root), vec!["id", "base"]);
    }

    #[test]
    fn test_mixed_children_are_left_alone() {
        let (mut arena, root) = Arena::new();
        arena.add_child(root, DraftNode::new(NameMatcher::exact("id")).negated(true));
        arena.add_child(root, DraftNode::new(NameMatcher::exact("name")));
        analyze(&mut arena, root);
        assert_eq!(names(&arena, root), vec!["id", "name"]);
    }

    #[test]
    fn test_negative_parent_chain_gets_fallback_at_every_level() {
        let (mut arena, root) = Arena::new();
        let actions = arena.add_child(
            root,
            DraftNode::new(NameMatcher::exact("actions"))
                .dot_pathed(true)
                .negative_parent(true),
        );
        arena.add_child(
            actions,
            DraftNode::new(NameMatcher::exact("user")).negated(true),
        );
        analyze(&mut arena, root);

        assert_eq!(names(&arena, root), vec!["actions", "base"]);
        assert_eq!(names(&arena, actions), vec!["user", "base"]);
    }

    #[test]
    fn test_leaves_are_untouched() {
        let (mut arena, root) = Arena::new();
        let id = arena.add_child(root, DraftNode::new(NameMatcher::exact("id")));
        analyze(&mut arena, root);
        assert!(arena.get(id).children.is_empty());
    }
}
