//! Applies a [`FilterContext`] to a JSON document described by a schema.
//!
//! Declared types are written in declared field order; undeclared keys are
//! dropped. Open and untyped objects keep their document order.

use crate::bean::{BeanInfo, BeanInfoSource};
use crate::context::FilterContext;
use crate::engine::{FilterEngine, NodeSet};
use crate::error::{FilterError, IntrospectionError};
use crate::schema::SchemaRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

pub struct FilteredSerializer<'a> {
    engine: &'a FilterEngine,
    registry: &'a SchemaRegistry,
}

impl<'a> FilteredSerializer<'a> {
    pub fn new(engine: &'a FilterEngine, registry: &'a SchemaRegistry) -> Self {
        Self { engine, registry }
    }

    /// Filter `value`, treating it (or each of its items) as the context's
    /// root type.
    pub fn filter_value(
        &self,
        context: &FilterContext,
        value: &Value,
    ) -> Result<Value, FilterError> {
        if !self.registry.contains(context.root_type()) {
            return Err(IntrospectionError::UnknownType(context.root_type().to_string()).into());
        }
        self.filter_typed(context.nodes(), Some(context.root_type()), value)
    }

    fn filter_typed(
        &self,
        nodes: &NodeSet,
        type_name: Option<&str>,
        value: &Value,
    ) -> Result<Value, FilterError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.filter_typed(nodes, type_name, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = Map::new();
                self.write_object(nodes, type_name, map, &mut out)?;
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn write_object(
        &self,
        nodes: &NodeSet,
        type_name: Option<&str>,
        map: &Map<String, Value>,
        out: &mut Map<String, Value>,
    ) -> Result<(), FilterError> {
        let info: Arc<BeanInfo> = match type_name {
            Some(name) => self.registry.introspect(name)?,
            None => self.registry.untyped().clone(),
        };

        if info.is_open() {
            for (key, value) in map {
                let decision = self.engine.decide(nodes, key, &info);
                if decision.included {
                    out.insert(key.clone(), self.filter_typed(&decision.children, None, value)?);
                }
            }
            return Ok(());
        }

        let Some(type_name) = type_name else {
            return Ok(());
        };
        let fields = self.registry.fields(type_name)?;

        for field in fields {
            let Some(value) = map.get(&field.name) else {
                continue;
            };

            let decision = self.engine.decide(nodes, &field.name, &info);
            if !decision.included {
                continue;
            }

            let field_type = field.field_type.as_deref();
            if field.unwrapped {
                // only objects have properties to inline; null and scalars vanish
                if let Value::Object(inner) = value {
                    self.write_object(&decision.children, field_type, inner, out)?;
                }
                continue;
            }

            let filtered = self.filter_typed(&decision.children, field_type, value)?;
            out.insert(field.name.clone(), filtered);
        }

        if map.len() > fields.len() {
            trace!(
                type_name = info.type_name(),
                "dropping keys not declared in the schema"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::filter::FilterParser;
    use crate::schema::{FieldDef, TypeSchema};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new(&FilterConfig::default());
        registry.register(
            TypeSchema::new("Outer")
                .field(FieldDef::new("outerText"))
                .field(FieldDef::new("inner").of_type("Inner").unwrapped())
                .field(FieldDef::new("extra")),
        );
        registry.register(TypeSchema::new("Inner").field(FieldDef::new("innerText")));
        registry
    }

    fn apply(filter: Option<&str>, value: &Value) -> Value {
        let registry = registry();
        let engine = FilterEngine::default();
        let parser = FilterParser::default();
        let context = FilterContext::new(&parser, filter, "Outer").unwrap();
        FilteredSerializer::new(&engine, &registry)
            .filter_value(&context, value)
            .unwrap()
    }

    #[test]
    fn test_unwrapped_fields_are_inlined() {
        let doc = json!({"outerText": "outerValue", "inner": {"innerText": "innerValue"}});
        assert_eq!(apply(Some("innerText"), &doc), json!({"innerText": "innerValue"}));
        assert_eq!(
            apply(None, &doc),
            json!({"outerText": "outerValue", "innerText": "innerValue"})
        );
    }

    #[test]
    fn test_unwrapped_null_is_skipped() {
        let doc = json!({"outerText": "outerValue", "inner": null});
        assert_eq!(apply(None, &doc), json!({"outerText": "outerValue"}));
        assert_eq!(apply(Some("inner"), &doc), json!({}));
    }

    #[test]
    fn test_untyped_objects_are_filtered_as_open() {
        let doc = json!({"extra": {"a": 1, "b": 2}});
        assert_eq!(apply(Some("extra[b]"), &doc), json!({"extra": {"b": 2}}));
        assert_eq!(apply(Some("extra"), &doc), json!({"extra": {"a": 1, "b": 2}}));
    }

    #[test]
    fn test_undeclared_keys_are_dropped() {
        let doc = json!({"outerText": "x", "unknown": true});
        assert_eq!(apply(None, &doc), json!({"outerText": "x"}));
    }

    #[test]
    fn test_unknown_root_type() {
        let registry = registry();
        let engine = FilterEngine::default();
        let parser = FilterParser::default();
        let context = FilterContext::new(&parser, None, "Missing").unwrap();
        let err = FilteredSerializer::new(&engine, &registry)
            .filter_value(&context, &json!({}))
            .unwrap_err();
        assert!(matches!(err, FilterError::Introspection(_)));
    }
}
