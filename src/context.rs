use crate::engine::NodeSet;
use crate::filter::{ANY_DEEP, FilterParseError, FilterParser};
use std::sync::Arc;

/// One filtering request: the filter text, its compiled nodes and the type
/// the traversal starts from.
///
/// No filter at all means filtering is disabled and everything is written.
/// An empty filter is different: it compiles to an empty list and writes
/// nothing.
#[derive(Debug, Clone)]
pub struct FilterContext {
    filter: Option<String>,
    nodes: NodeSet,
    root_type: Arc<str>,
}

impl FilterContext {
    pub fn new(
        parser: &FilterParser,
        filter: Option<&str>,
        root_type: impl Into<Arc<str>>,
    ) -> Result<Self, FilterParseError> {
        let nodes = match filter.map(str::trim) {
            None | Some(ANY_DEEP) => NodeSet::AnyDeep,
            Some(text) => NodeSet::Nodes(parser.parse(text)?),
        };

        Ok(Self {
            filter: filter.map(str::to_string),
            nodes,
            root_type: root_type.into(),
        })
    }

    pub fn is_filtering_enabled(&self) -> bool {
        !self.nodes.is_any_deep()
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }
}
