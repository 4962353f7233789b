//! Property-by-property inclusion decisions.
//!
//! The serialization host asks [`FilterEngine::decide`] about every property
//! it is about to write. The answer says whether to write it and which
//! [`NodeSet`] applies to the value's own properties.

use crate::bean::BeanInfo;
use crate::cache::{CacheStats, ConcurrentCache};
use crate::config::FilterConfig;
use crate::filter::{FilterNode, Specificity};
use crate::metrics::MetricsSource;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::trace;

/// The filter that applies at one level of the object graph
#[derive(Debug, Clone)]
pub enum NodeSet {
    /// Explicit nodes; an empty list excludes every property
    Nodes(Arc<[FilterNode]>),
    /// `**`: everything at this level and below
    AnyDeep,
    /// Explicit `[]`: the value is written without any of its properties
    Nothing,
    /// Matched without a nested expression; only base properties are written
    Unfiltered,
    /// A view token carried down to nested objects
    View(Arc<str>),
}

impl NodeSet {
    pub fn nodes(&self) -> Option<&Arc<[FilterNode]>> {
        match self {
            NodeSet::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn is_any_deep(&self) -> bool {
        matches!(self, NodeSet::AnyDeep)
    }

    /// Identity comparison: explicit node lists are equal only when they are
    /// the same allocation.
    pub fn same_as(&self, other: &NodeSet) -> bool {
        match (self, other) {
            (NodeSet::Nodes(a), NodeSet::Nodes(b)) => Arc::ptr_eq(a, b),
            (NodeSet::AnyDeep, NodeSet::AnyDeep)
            | (NodeSet::Nothing, NodeSet::Nothing)
            | (NodeSet::Unfiltered, NodeSet::Unfiltered) => true,
            (NodeSet::View(a), NodeSet::View(b)) => a == b,
            _ => false,
        }
    }

    fn hash_identity<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            NodeSet::Nodes(nodes) => (Arc::as_ptr(nodes).cast::<()>() as usize).hash(state),
            NodeSet::View(view) => view.hash(state),
            NodeSet::AnyDeep | NodeSet::Nothing | NodeSet::Unfiltered => {}
        }
    }
}

impl From<Arc<[FilterNode]>> for NodeSet {
    fn from(nodes: Arc<[FilterNode]>) -> Self {
        NodeSet::Nodes(nodes)
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub included: bool,
    /// Filter for the property's own properties; meaningless when excluded
    pub children: NodeSet,
    /// Included because a view token named a view holding the property
    pub consumed_as_view: bool,
}

impl Decision {
    fn include(children: NodeSet) -> Self {
        Self {
            included: true,
            children,
            consumed_as_view: false,
        }
    }

    fn exclude() -> Self {
        Self {
            included: false,
            children: NodeSet::Nothing,
            consumed_as_view: false,
        }
    }
}

/// Decide whether `property` of the type described by `info` is written
/// under `nodes`, and what applies to its value.
pub fn decide(
    nodes: &NodeSet,
    property: &str,
    info: &BeanInfo,
    config: &FilterConfig,
) -> Decision {
    // unwrapped properties are inlined into the parent level
    if info.is_unwrapped(property) {
        return Decision::include(nodes.clone());
    }

    match nodes {
        NodeSet::AnyDeep => Decision::include(NodeSet::AnyDeep),
        NodeSet::Nothing => Decision::exclude(),
        NodeSet::Unfiltered => {
            if includes_base(property, info, config) {
                Decision::include(NodeSet::Unfiltered)
            } else {
                Decision::exclude()
            }
        }
        NodeSet::View(view) => {
            let included = if info.is_open() {
                true
            } else if info.is_view(view) {
                info.view_contains(view, property)
            } else {
                includes_base(property, info, config)
            };

            if included {
                Decision::include(NodeSet::View(view.clone()))
            } else {
                Decision::exclude()
            }
        }
        NodeSet::Nodes(nodes) => decide_nodes(nodes, property, info, config),
    }
}

fn includes_base(property: &str, info: &BeanInfo, config: &FilterConfig) -> bool {
    config.implicitly_include_base_fields && info.is_base_property(property)
}

fn decide_nodes(
    nodes: &[FilterNode],
    property: &str,
    info: &BeanInfo,
    config: &FilterConfig,
) -> Decision {
    let mut winners: Vec<&FilterNode> = Vec::new();
    let mut winner_rank: Option<Specificity> = None;
    let mut negated: Option<Specificity> = None;

    for node in nodes {
        if !node.matcher().matches(property) {
            continue;
        }

        let rank = node.matcher().specificity();
        if node.is_negated() {
            negated = negated.max(Some(rank));
            continue;
        }

        match winner_rank {
            Some(current) if rank < current => {}
            Some(current) if rank == current => winners.push(node),
            _ => {
                winners.clear();
                winners.push(node);
                winner_rank = Some(rank);
            }
        }
    }

    if let Some(negated_rank) = negated {
        if winner_rank.is_none_or(|rank| rank <= negated_rank) {
            trace!(property, "excluded by negated node");
            return Decision::exclude();
        }
    }

    if !winners.is_empty() {
        return Decision::include(winner_children(&winners));
    }

    match view_node(nodes, property, info) {
        Some(node) if node.is_negated() => {
            trace!(property, view = node.name(), "excluded by negated view");
            Decision::exclude()
        }
        Some(node) => {
            let children = if !node.children().is_empty() {
                NodeSet::Nodes(node.children().clone())
            } else if node.is_empty_nested() {
                NodeSet::Nothing
            } else if config.propagate_view_to_nested_filters {
                NodeSet::View(Arc::from(node.name()))
            } else {
                NodeSet::Unfiltered
            };

            Decision {
                included: true,
                children,
                consumed_as_view: true,
            }
        }
        None => Decision::exclude(),
    }
}

/// Child node-set for the most specific positive matches.
///
/// Equally specific matches pool their children, so
/// `repo*[firstName],*rter[lastName]` filters a match of both down to both names.
fn winner_children(winners: &[&FilterNode]) -> NodeSet {
    if let [winner] = winners {
        return single_children(winner);
    }

    let pooled: Vec<FilterNode> = winners
        .iter()
        .flat_map(|node| node.children().iter().cloned())
        .collect();
    if !pooled.is_empty() {
        return NodeSet::Nodes(pooled.into());
    }

    if winners.iter().any(|node| node.is_any_deep()) {
        NodeSet::AnyDeep
    } else if winners.iter().all(|node| node.is_empty_nested()) {
        NodeSet::Nothing
    } else {
        NodeSet::Unfiltered
    }
}

fn single_children(node: &FilterNode) -> NodeSet {
    if !node.children().is_empty() {
        NodeSet::Nodes(node.children().clone())
    } else if node.is_empty_nested() {
        NodeSet::Nothing
    } else if node.is_any_deep() {
        NodeSet::AnyDeep
    } else {
        NodeSet::Unfiltered
    }
}

/// First exact node naming a view of the type that holds `property`
fn view_node<'a>(
    nodes: &'a [FilterNode],
    property: &str,
    info: &BeanInfo,
) -> Option<&'a FilterNode> {
    nodes
        .iter()
        .find(|node| node.matcher().is_exact() && info.view_contains(node.name(), property))
}

#[derive(Clone)]
struct MatchKey {
    nodes: NodeSet,
    type_name: Arc<str>,
    property: String,
}

impl PartialEq for MatchKey {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.same_as(&other.nodes)
            && self.type_name == other.type_name
            && self.property == other.property
    }
}

impl Eq for MatchKey {}

impl Hash for MatchKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nodes.hash_identity(state);
        self.type_name.hash(state);
        self.property.hash(state);
    }
}

/// [`decide`] with the active config and a decision cache.
///
/// Cache keys hold on to the node list they were computed for, so a key
/// never aliases a different list that reuses a freed allocation.
#[derive(Debug)]
pub struct FilterEngine {
    config: FilterConfig,
    match_cache: ConcurrentCache<MatchKey, Decision>,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl FilterEngine {
    pub fn new(config: FilterConfig) -> Self {
        let match_cache = ConcurrentCache::new(&config.filter_cache_spec);
        Self {
            config,
            match_cache,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn decide(&self, nodes: &NodeSet, property: &str, info: &BeanInfo) -> Decision {
        if nodes.is_any_deep() && !info.is_unwrapped(property) {
            return Decision::include(NodeSet::AnyDeep);
        }

        let key = MatchKey {
            nodes: nodes.clone(),
            type_name: info.type_key().clone(),
            property: property.to_string(),
        };

        self.match_cache.get_or_insert_with(key, || {
            let decision = decide(nodes, property, info, &self.config);
            trace!(
                type_name = info.type_name(),
                property,
                included = decision.included,
                view = decision.consumed_as_view,
                "filter decision"
            );
            decision
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.match_cache.stats()
    }
}

impl MetricsSource for FilterEngine {
    fn apply_metrics(&self, metrics: &mut BTreeMap<String, u64>) {
        self.cache_stats().apply("filter.pathCache.", metrics);
    }
}
