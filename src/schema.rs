//! Declared object layouts, loaded from TOML or registered in code.
//!
//! ```toml
//! root = "Issue"
//!
//! [types.Issue]
//! fields = [
//!     { name = "id" },
//!     { name = "assignee", type = "User" },
//!     { name = "actions", type = "IssueAction", views = ["full"] },
//!     { name = "properties", type = "Properties" },
//! ]
//!
//! [types.Properties]
//! open = true
//! ```
//!
//! Field order is the order properties are written in. A field without a
//! `type` holds a scalar or an untyped value; untyped objects are filtered
//! like open types.

use crate::bean::{BeanInfo, BeanInfoSource};
use crate::config::FilterConfig;
use crate::error::IntrospectionError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse schema file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

/// On-disk schema document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDef {
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default)]
    pub unwrapped: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            views: Vec::new(),
            unwrapped: false,
        }
    }

    pub fn of_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    pub fn in_views<S: AsRef<str>>(mut self, views: &[S]) -> Self {
        self.views = views.iter().map(|v| v.as_ref().to_string()).collect();
        self
    }

    pub fn unwrapped(mut self) -> Self {
        self.unwrapped = true;
        self
    }
}

/// One named type ready to be registered
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchema {
    pub name: String,
    pub open: bool,
    pub fields: Vec<FieldDef>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: false,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// How one declared property is laid out in documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub field_type: Option<String>,
    pub unwrapped: bool,
}

#[derive(Debug)]
struct RegisteredType {
    info: Arc<BeanInfo>,
    fields: Vec<FieldLayout>,
}

/// Registered types keyed by name
#[derive(Debug)]
pub struct SchemaRegistry {
    config: FilterConfig,
    types: HashMap<String, RegisteredType>,
    root: Option<String>,
    untyped: Arc<BeanInfo>,
}

impl SchemaRegistry {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            config: config.clone(),
            types: HashMap::new(),
            root: None,
            untyped: Arc::new(BeanInfo::open("object")),
        }
    }

    pub fn from_file(path: &Path, config: &FilterConfig) -> Result<Self, SchemaError> {
        let path_display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path_display.clone(),
            source,
        })?;
        let schema = toml::from_str::<SchemaFile>(&raw).map_err(|source| SchemaError::Parse {
            path: path_display.clone(),
            source,
        })?;

        debug!(path = %path_display, types = schema.types.len(), "loaded schema");
        Self::from_schema(schema, config)
    }

    pub fn from_schema(schema: SchemaFile, config: &FilterConfig) -> Result<Self, SchemaError> {
        let mut registry = Self::new(config);
        registry.root = schema.root;

        for (name, def) in schema.types {
            registry.register(TypeSchema {
                name,
                open: def.open,
                fields: def.fields,
            });
        }

        registry.validate()?;
        Ok(registry)
    }

    pub fn register(&mut self, schema: TypeSchema) {
        let info = if schema.open {
            BeanInfo::open(schema.name.as_str())
        } else {
            schema
                .fields
                .iter()
                .fold(BeanInfo::builder(schema.name.as_str()), |builder, field| {
                    if field.unwrapped {
                        builder.unwrapped(field.name.as_str(), field.views.as_slice())
                    } else {
                        builder.property(field.name.as_str(), field.views.as_slice())
                    }
                })
                .build(&self.config)
        };

        let fields = schema
            .fields
            .into_iter()
            .map(|field| FieldLayout {
                name: field.name,
                field_type: field.field_type,
                unwrapped: field.unwrapped,
            })
            .collect();

        self.types.insert(
            schema.name,
            RegisteredType {
                info: Arc::new(info),
                fields,
            },
        );
    }

    /// Register a map-like type whose keys are only known per document
    pub fn register_open(&mut self, name: impl Into<String>) {
        self.register(TypeSchema {
            open: true,
            ..TypeSchema::new(name)
        });
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Check that the root and every field type refer to registered types
    pub fn validate(&self) -> Result<(), IntrospectionError> {
        if let Some(root) = &self.root {
            if !self.contains(root) {
                return Err(IntrospectionError::UnknownType(root.clone()));
            }
        }

        for (type_name, registered) in &self.types {
            for field in &registered.fields {
                if let Some(field_type) = &field.field_type {
                    if !self.contains(field_type) {
                        return Err(IntrospectionError::UnknownFieldType {
                            type_name: type_name.clone(),
                            field: field.name.clone(),
                            field_type: field_type.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn fields(&self, type_name: &str) -> Result<&[FieldLayout], IntrospectionError> {
        self.types
            .get(type_name)
            .map(|registered| registered.fields.as_slice())
            .ok_or_else(|| IntrospectionError::UnknownType(type_name.to_string()))
    }

    /// Open metadata used for objects without a declared type
    pub fn untyped(&self) -> &Arc<BeanInfo> {
        &self.untyped
    }
}

impl BeanInfoSource for SchemaRegistry {
    fn introspect(&self, type_name: &str) -> Result<Arc<BeanInfo>, IntrospectionError> {
        self.types
            .get(type_name)
            .map(|registered| registered.info.clone())
            .ok_or_else(|| IntrospectionError::UnknownType(type_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::FULL_VIEW;

    const SCHEMA: &str = r#"
root = "Issue"

[types.Issue]
fields = [
    { name = "id" },
    { name = "assignee", type = "User" },
    { name = "actions", type = "User", views = ["full"] },
    { name = "properties", type = "Properties" },
]

[types.User]
fields = [{ name = "firstName" }, { name = "lastName" }]

[types.Properties]
open = true
"#;

    fn registry() -> SchemaRegistry {
        let schema: SchemaFile = toml::from_str(SCHEMA).unwrap();
        SchemaRegistry::from_schema(schema, &FilterConfig::default()).unwrap()
    }

    #[test]
    fn test_fields_keep_declared_order() {
        let registry = registry();
        let names: Vec<&str> = registry
            .fields("Issue")
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "assignee", "actions", "properties"]);
        assert_eq!(registry.root(), Some("Issue"));
    }

    #[test]
    fn test_views_come_from_field_declarations() {
        let info = registry().introspect("Issue").unwrap();
        assert!(info.is_base_property("id"));
        assert!(!info.is_base_property("actions"));
        assert!(info.view_contains(FULL_VIEW, "actions"));
        assert!(info.view_contains(FULL_VIEW, "id"));
    }

    #[test]
    fn test_open_types() {
        let info = registry().introspect("Properties").unwrap();
        assert!(info.is_open());
        assert!(info.is_base_property("priority"));
    }

    #[test]
    fn test_unknown_type_is_an_introspection_error() {
        let err = registry().introspect("Missing").unwrap_err();
        assert_eq!(err, IntrospectionError::UnknownType("Missing".to_string()));
    }

    #[test]
    fn test_unknown_field_type_is_rejected() {
        let schema: SchemaFile = toml::from_str(
            r#"
[types.Issue]
fields = [{ name = "assignee", type = "User" }]
"#,
        )
        .unwrap();
        let err = SchemaRegistry::from_schema(schema, &FilterConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Introspection(IntrospectionError::UnknownFieldType { .. })
        ));
    }

    #[test]
    fn test_register_in_code() {
        let mut registry = SchemaRegistry::new(&FilterConfig::default());
        registry.register(
            TypeSchema::new("Outer")
                .field(FieldDef::new("outerText"))
                .field(FieldDef::new("inner").of_type("Inner").unwrapped()),
        );
        registry.register(TypeSchema::new("Inner").field(FieldDef::new("innerText")));
        registry.register_open("Tags");

        assert!(registry.validate().is_ok());
        assert!(registry.introspect("Outer").unwrap().is_unwrapped("inner"));
        assert!(registry.introspect("Tags").unwrap().is_open());
    }
}
