use super::name::NameMatcher;
use serde_json::{Value, json};
use std::sync::Arc;

/// One compiled field of a filter expression.
///
/// Nodes are immutable once compiled; the child list is shared behind an
/// `Arc` so it can be handed out as a node-set without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub(crate) matcher: NameMatcher,
    pub(crate) children: Arc<[FilterNode]>,
    pub(crate) negated: bool,
    pub(crate) squiggly: bool,
    pub(crate) empty_nested: bool,
    pub(crate) dot_pathed: bool,
    pub(crate) negative_parent: bool,
}

impl FilterNode {
    pub fn matcher(&self) -> &NameMatcher {
        &self.matcher
    }

    pub fn name(&self) -> &str {
        self.matcher.literal()
    }

    pub fn children(&self) -> &Arc<[FilterNode]> {
        &self.children
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Had an explicit nested expression
    pub fn is_squiggly(&self) -> bool {
        self.squiggly
    }

    /// Written with explicit empty brackets, e.g. `assignee[]`
    pub fn is_empty_nested(&self) -> bool {
        self.empty_nested
    }

    pub fn is_dot_pathed(&self) -> bool {
        self.dot_pathed
    }

    /// Intermediate node of a negated dot-path
    pub fn is_negative_parent(&self) -> bool {
        self.negative_parent
    }

    pub fn is_any_deep(&self) -> bool {
        self.matcher.is_any_deep()
    }

    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "name": self.name(),
            "kind": self.matcher.kind(),
        });
        let flags = [
            ("negated", self.negated),
            ("squiggly", self.squiggly),
            ("emptyNested", self.empty_nested),
            ("dotPathed", self.dot_pathed),
            ("negativeParent", self.negative_parent),
        ];
        for (flag, set) in flags {
            if set {
                value[flag] = Value::Bool(true);
            }
        }
        if !self.children.is_empty() {
            value["children"] = Value::Array(self.children.iter().map(|c| c.to_json()).collect());
        }
        value
    }
}
