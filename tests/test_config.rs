use field_filter::config::{default_config, load_config_from_path};
use field_filter::{CacheSpec, ConfigError, FilterConfig, FilterEngine, FilterParser, load_config};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_missing_path_uses_defaults() {
    let config = load_config(None).expect("defaults");
    assert_eq!(&config, default_config());
    assert_eq!(config, FilterConfig::default());
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("filter.toml");
    fs::write(
        &path,
        r#"
implicitly_include_base_fields = false
propagate_view_to_nested_filters = true
filter_cache_spec = "maximumSize=50,expireAfterAccess=5m"
node_cache_spec = "maximumSize=0"
"#,
    )
    .expect("write config");

    let config = load_config(Some(path.as_path())).expect("config loads");
    assert!(!config.implicitly_include_base_fields);
    assert!(config.implicitly_include_base_fields_in_view);
    assert!(config.propagate_view_to_nested_filters);
    assert!(config.add_non_annotated_fields_to_base_view);
    assert_eq!(config.filter_cache_spec.maximum_size, Some(50));
    assert_eq!(
        config.filter_cache_spec.expire_after_access,
        Some(Duration::from_secs(300))
    );
    assert_eq!(config.node_cache_spec, CacheSpec::bounded(0));
}

#[test]
fn test_zero_sized_node_cache_never_stores() {
    let parser = FilterParser::new(&CacheSpec::bounded(0));
    parser.parse("id,name").expect("compiles");
    parser.parse("id,name").expect("compiles");

    let stats = parser.cache_stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.misses, 2);
}

#[test]
fn test_filter_cache_spec_bounds_engine_cache() {
    let engine = FilterEngine::new(FilterConfig {
        filter_cache_spec: CacheSpec::bounded(0),
        ..FilterConfig::default()
    });
    assert_eq!(engine.cache_stats().size, 0);
    assert_eq!(engine.config().filter_cache_spec, CacheSpec::bounded(0));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempdir().expect("temp dir");
    let err = load_config_from_path(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_invalid_cache_spec_is_a_parse_error() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("filter.toml");
    fs::write(&path, "node_cache_spec = \"maximumSize=lots\"\n").expect("write config");

    let err = load_config(Some(path.as_path())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("filter.toml"));
}

#[test]
fn test_wrong_value_type_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("filter.toml");
    fs::write(&path, "implicitly_include_base_fields = \"yes\"\n").expect("write config");
    assert!(load_config(Some(path.as_path())).is_err());
}
