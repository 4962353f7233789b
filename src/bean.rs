//! Per-type property and view metadata consumed by the filter engine.
//!
//! A [`BeanInfo`] tells the engine which properties belong to which named
//! view and which properties are unwrapped into their parent. Types register
//! their layout up front through [`BeanInfoBuilder`]; nothing here inspects
//! values at runtime.

use crate::config::FilterConfig;
use crate::error::IntrospectionError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Implicit default view holding non-annotated properties
pub const BASE_VIEW: &str = "base";

/// View that always contains at least every base property
pub const FULL_VIEW: &str = "full";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanInfo {
    type_name: Arc<str>,
    view_to_properties: HashMap<String, HashSet<String>>,
    unwrapped: HashSet<String>,
    open: bool,
}

impl BeanInfo {
    pub fn builder(type_name: impl Into<Arc<str>>) -> BeanInfoBuilder {
        BeanInfoBuilder {
            type_name: type_name.into(),
            properties: Vec::new(),
        }
    }

    /// A map-like type whose keys are only known at runtime.
    ///
    /// Every key counts as a base property.
    pub fn open(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            view_to_properties: HashMap::new(),
            unwrapped: HashSet::new(),
            open: true,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_key(&self) -> &Arc<str> {
        &self.type_name
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_view(&self, view: &str) -> bool {
        self.view_to_properties.contains_key(view)
    }

    pub fn view_contains(&self, view: &str, property: &str) -> bool {
        if self.open {
            return view == BASE_VIEW;
        }
        self.view_to_properties
            .get(view)
            .is_some_and(|props| props.contains(property))
    }

    pub fn is_base_property(&self, property: &str) -> bool {
        self.view_contains(BASE_VIEW, property)
    }

    pub fn is_unwrapped(&self, property: &str) -> bool {
        self.unwrapped.contains(property)
    }
}

#[derive(Debug, Clone)]
struct PropertyDef {
    name: String,
    views: Vec<String>,
    unwrapped: bool,
}

/// Registers the properties of one type along with the views they belong to
#[derive(Debug, Clone)]
pub struct BeanInfoBuilder {
    type_name: Arc<str>,
    properties: Vec<PropertyDef>,
}

impl BeanInfoBuilder {
    pub fn property<S: AsRef<str>>(mut self, name: impl Into<String>, views: &[S]) -> Self {
        self.properties.push(PropertyDef {
            name: name.into(),
            views: views.iter().map(|v| v.as_ref().to_string()).collect(),
            unwrapped: false,
        });
        self
    }

    /// A property whose own fields are written inline into the parent
    pub fn unwrapped<S: AsRef<str>>(mut self, name: impl Into<String>, views: &[S]) -> Self {
        self.properties.push(PropertyDef {
            name: name.into(),
            views: views.iter().map(|v| v.as_ref().to_string()).collect(),
            unwrapped: true,
        });
        self
    }

    pub fn build(self, config: &FilterConfig) -> BeanInfo {
        let mut view_to_properties: HashMap<String, HashSet<String>> = HashMap::new();
        let mut unwrapped = HashSet::new();

        for property in self.properties {
            if property.unwrapped {
                unwrapped.insert(property.name.clone());
            }

            if property.views.is_empty() {
                if config.add_non_annotated_fields_to_base_view {
                    view_to_properties
                        .entry(BASE_VIEW.to_string())
                        .or_default()
                        .insert(property.name);
                }
                continue;
            }

            for view in property.views {
                view_to_properties
                    .entry(view)
                    .or_default()
                    .insert(property.name.clone());
            }
        }

        expand_views(&mut view_to_properties, config);

        BeanInfo {
            type_name: self.type_name,
            view_to_properties,
            unwrapped,
            open: false,
        }
    }
}

/// Copy the base properties into other views. The full view always receives
/// them; the rest only when base fields are implied in views.
fn expand_views(view_to_properties: &mut HashMap<String, HashSet<String>>, config: &FilterConfig) {
    let base: HashSet<String> = view_to_properties
        .get(BASE_VIEW)
        .cloned()
        .unwrap_or_default();

    if !config.implicitly_include_base_fields_in_view {
        if let Some(full) = view_to_properties.get_mut(FULL_VIEW) {
            full.extend(base);
        }
        return;
    }

    for (view, properties) in view_to_properties.iter_mut() {
        if view != BASE_VIEW {
            properties.extend(base.iter().cloned());
        }
    }
}

/// Supplies [`BeanInfo`] by type name
pub trait BeanInfoSource: Send + Sync {
    fn introspect(&self, type_name: &str) -> Result<Arc<BeanInfo>, IntrospectionError>;
}
