use field_filter::schema::{FieldDef, TypeSchema};
use field_filter::{
    BeanInfoSource, FilterConfig, FilterContext, FilterEngine, FilterError, FilterParser,
    FilteredSerializer, IntrospectionError, SchemaError, SchemaRegistry,
};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_registry_from_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("schema.toml");
    fs::write(
        &path,
        r#"
root = "Order"

[types.Order]
fields = [
    { name = "id" },
    { name = "lines", type = "Line" },
    { name = "audit", views = ["admin"] },
]

[types.Line]
fields = [{ name = "sku" }, { name = "qty" }]
"#,
    )
    .expect("write schema");

    let registry = SchemaRegistry::from_file(&path, &FilterConfig::default()).expect("loads");
    assert_eq!(registry.root(), Some("Order"));

    let info = registry.introspect("Order").expect("known type");
    assert!(info.is_base_property("lines"));
    assert!(info.view_contains("admin", "audit"));
    assert!(info.view_contains("admin", "id"));
}

#[test]
fn test_unknown_root_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("schema.toml");
    fs::write(&path, "root = \"Missing\"\n").expect("write schema");

    let err = SchemaRegistry::from_file(&path, &FilterConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::Introspection(IntrospectionError::UnknownType(ref name)) if name == "Missing"
    ));
}

#[test]
fn test_malformed_schema_reports_path() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("schema.toml");
    fs::write(&path, "[types.Order]\nfields = [{ nom = \"id\" }]\n").expect("write schema");

    let err = SchemaRegistry::from_file(&path, &FilterConfig::default()).unwrap_err();
    assert!(matches!(err, SchemaError::Parse { .. }));
    assert!(err.to_string().contains("schema.toml"));
}

#[test]
fn test_code_registered_types_filter_documents() {
    let config = FilterConfig::default();
    let mut registry = SchemaRegistry::new(&config);
    registry.register(
        TypeSchema::new("Order")
            .field(FieldDef::new("id"))
            .field(FieldDef::new("tags").of_type("Tags"))
            .field(FieldDef::new("audit").in_views(&["admin"])),
    );
    registry.register_open("Tags");

    let parser = FilterParser::default();
    let engine = FilterEngine::new(config);
    let serializer = FilteredSerializer::new(&engine, &registry);
    let order = json!({"id": 7, "tags": {"b": 2, "a": 1}, "audit": "ok"});

    let context = FilterContext::new(&parser, Some("admin"), "Order").expect("compiles");
    assert_eq!(
        serializer.filter_value(&context, &order).expect("filters").to_string(),
        r#"{"id":7,"tags":{"b":2,"a":1},"audit":"ok"}"#
    );

    let context = FilterContext::new(&parser, Some("tags[a]"), "Order").expect("compiles");
    assert_eq!(
        serializer.filter_value(&context, &order).expect("filters"),
        json!({"tags": {"a": 1}})
    );
}

#[test]
fn test_unregistered_field_type_fails_filtering() {
    let config = FilterConfig::default();
    let mut registry = SchemaRegistry::new(&config);
    registry.register(TypeSchema::new("Order").field(FieldDef::new("owner").of_type("User")));
    assert!(registry.validate().is_err());

    let parser = FilterParser::default();
    let engine = FilterEngine::new(config);
    let context = FilterContext::new(&parser, None, "Order").expect("compiles");
    let err = FilteredSerializer::new(&engine, &registry)
        .filter_value(&context, &json!({"owner": {"name": "x"}}))
        .unwrap_err();
    assert!(matches!(
        err,
        FilterError::Introspection(IntrospectionError::UnknownType(_))
    ));
}
