use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid cache spec '{spec}': {reason}")]
    CacheSpec { spec: String, reason: String },
}

/// Switches that shape how views and base fields are resolved while filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Nested objects without their own nested filter show their base fields.
    pub implicitly_include_base_fields: bool,
    /// Every non-base view also contains the base fields.
    pub implicitly_include_base_fields_in_view: bool,
    /// A view token keeps applying to nested objects instead of falling back to base fields.
    pub propagate_view_to_nested_filters: bool,
    /// Properties registered without any view belong to the base view.
    pub add_non_annotated_fields_to_base_view: bool,
    /// Bounds the per-property decision cache.
    pub filter_cache_spec: CacheSpec,
    /// Bounds the compiled expression cache.
    pub node_cache_spec: CacheSpec,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            implicitly_include_base_fields: true,
            implicitly_include_base_fields_in_view: true,
            propagate_view_to_nested_filters: false,
            add_non_annotated_fields_to_base_view: true,
            filter_cache_spec: CacheSpec::bounded(1000),
            node_cache_spec: CacheSpec::bounded(1000),
        }
    }
}

/// Size and expiry bounds for a cache, written as
/// `maximumSize=1000,expireAfterAccess=10m,expireAfterWrite=1h`.
///
/// An empty spec means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheSpec {
    pub maximum_size: Option<u64>,
    pub expire_after_access: Option<Duration>,
    pub expire_after_write: Option<Duration>,
}

impl CacheSpec {
    pub fn bounded(maximum_size: u64) -> Self {
        Self {
            maximum_size: Some(maximum_size),
            ..Self::default()
        }
    }
}

impl FromStr for CacheSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::CacheSpec {
            spec: s.to_string(),
            reason,
        };

        let mut spec = CacheSpec::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected 'key=value', got '{part}'")))?;
            let value = value.trim();

            match key.trim() {
                "maximumSize" => {
                    let size = value
                        .parse::<u64>()
                        .map_err(|e| invalid(format!("maximumSize: {e}")))?;
                    spec.maximum_size = Some(size);
                }
                "expireAfterAccess" => {
                    spec.expire_after_access = Some(parse_duration(value).map_err(invalid)?);
                }
                "expireAfterWrite" => {
                    spec.expire_after_write = Some(parse_duration(value).map_err(invalid)?);
                }
                other => return Err(invalid(format!("unknown key '{other}'"))),
            }
        }

        Ok(spec)
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{value}' is missing a unit (s, m, h, d)"))?;
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;

    let unit_seconds: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        _ => return Err(format!("unknown duration unit '{unit}'")),
    };
    let seconds = amount
        .checked_mul(unit_seconds)
        .ok_or_else(|| format!("duration '{value}' is out of range"))?;
    Ok(Duration::from_secs(seconds))
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s > 0 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s > 0 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s > 0 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

impl fmt::Display for CacheSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(size) = self.maximum_size {
            parts.push(format!("maximumSize={size}"));
        }
        if let Some(ttl) = self.expire_after_access {
            parts.push(format!("expireAfterAccess={}", format_duration(ttl)));
        }
        if let Some(ttl) = self.expire_after_write {
            parts.push(format!("expireAfterWrite={}", format_duration(ttl)));
        }
        f.write_str(&parts.join(","))
    }
}

impl TryFrom<String> for CacheSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CacheSpec> for String {
    fn from(spec: CacheSpec) -> Self {
        spec.to_string()
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FilterConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<FilterConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    let config = toml::from_str::<FilterConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display.clone(),
        source,
    })?;
    debug!(path = %path_display, ?config, "loaded filter config");
    Ok(config)
}

pub fn default_config() -> &'static FilterConfig {
    static DEFAULT_CONFIG: LazyLock<FilterConfig> = LazyLock::new(FilterConfig::default);
    &DEFAULT_CONFIG
}
