//! Search queries — what callers ask the aggregator for.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BrokerError, BrokerResult};

/// Default number of hits returned when the caller does not set a limit.
pub const DEFAULT_LIMIT: usize = 20;

/// Structured filters. Empty maps mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Field must equal the given value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub equality: BTreeMap<String, Value>,

    /// Field must equal one of the given values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub membership: BTreeMap<String, Vec<Value>>,

    /// `true`: field must be present; `false`: field must be absent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub existence: BTreeMap<String, bool>,

    /// Case-insensitive substring match on the agent name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.equality.is_empty()
            && self.membership.is_empty()
            && self.existence.is_empty()
            && self.name_contains.is_none()
    }
}

/// Which registries to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RegistryScope {
    One(String),
    List(Vec<String>),
}

impl RegistryScope {
    pub fn ids(&self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id.clone()],
            Self::List(ids) => ids.clone(),
        }
    }
}

/// Which search adapters a registry is queried through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind", content = "ids")]
pub enum AdapterScope {
    /// Let the aggregator decide (the default adapter for the default
    /// registry, no restriction elsewhere).
    #[default]
    Default,
    /// Exactly these adapter ids. An empty list means "all adapters".
    Explicit(Vec<String>),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// One sort key. Keys are applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = BrokerError;

    /// Parse `field`, `field:asc` or `field:desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(':') {
            Some((field, "asc")) => (field, SortDirection::Asc),
            Some((field, "desc")) => (field, SortDirection::Desc),
            Some((_, other)) => {
                return Err(BrokerError::validation(format!(
                    "unknown sort direction '{other}'"
                )))
            }
            None => (s, SortDirection::default()),
        };
        if field.trim().is_empty() {
            return Err(BrokerError::validation("sort key field is empty"));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// A discovery request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Free text. Enables the semantic step when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_text: Option<String>,

    #[serde(default)]
    pub filters: SearchFilters,

    /// Unset means the home registry plus the default registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_scope: Option<RegistryScope>,

    #[serde(default)]
    pub adapter_scope: AdapterScope,

    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_keys: Vec<SortKey>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query_text: None,
            filters: SearchFilters::default(),
            registry_scope: None,
            adapter_scope: AdapterScope::Default,
            limit: DEFAULT_LIMIT,
            sort_keys: Vec::new(),
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text query.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            query_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn registry(mut self, id: impl Into<String>) -> Self {
        self.registry_scope = Some(RegistryScope::One(id.into()));
        self
    }

    pub fn registries<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry_scope = Some(RegistryScope::List(ids.into_iter().map(Into::into).collect()));
        self
    }

    pub fn adapters<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adapter_scope = AdapterScope::Explicit(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort_keys.push(key);
        self
    }

    pub fn equals(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.equality.insert(field.into(), value);
        self
    }

    pub fn one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.membership.insert(field.into(), values);
        self
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.filters.existence.insert(field.into(), true);
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.filters.existence.insert(field.into(), false);
        self
    }

    /// Only agents with (or without) an MCP endpoint.
    pub fn mcp(self, required: bool) -> Self {
        if required {
            self.require("mcp")
        } else {
            self.exclude("mcp")
        }
    }

    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.filters.name_contains = Some(needle.into());
        self
    }

    /// Trimmed, non-empty query text.
    pub fn text_query(&self) -> Option<&str> {
        self.query_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Check caller-facing invariants.
    pub fn validate(&self) -> BrokerResult<()> {
        if self.limit == 0 {
            return Err(BrokerError::validation("limit must be at least 1"));
        }
        if let Some(scope) = &self.registry_scope {
            let ids = scope.ids();
            if ids.is_empty() {
                return Err(BrokerError::validation("registry scope list is empty"));
            }
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(BrokerError::validation("registry id is empty"));
            }
        }
        if let AdapterScope::Explicit(ids) = &self.adapter_scope {
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(BrokerError::validation("adapter id is empty"));
            }
        }
        if self.sort_keys.iter().any(|k| k.field.trim().is_empty()) {
            return Err(BrokerError::validation("sort key field is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let q = SearchQuery::text("trading agent")
            .mcp(true)
            .registry("137")
            .limit(5)
            .sort_by(SortKey::desc("score"));

        assert_eq!(q.text_query(), Some("trading agent"));
        assert_eq!(q.filters.existence.get("mcp"), Some(&true));
        assert_eq!(q.registry_scope, Some(RegistryScope::One("137".into())));
        assert_eq!(q.adapter_scope, AdapterScope::Default);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(SearchQuery::new().limit(0).validate().is_err());
        assert!(SearchQuery::new()
            .registries(Vec::<String>::new())
            .validate()
            .is_err());
        assert!(SearchQuery::new().adapters([""]).validate().is_err());
        // An explicit empty adapter list is allowed: it means "all adapters".
        assert!(SearchQuery::new()
            .adapters(Vec::<String>::new())
            .validate()
            .is_ok());
    }

    #[test]
    fn test_blank_text_is_no_text() {
        assert_eq!(SearchQuery::text("   ").text_query(), None);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("name:asc".parse::<SortKey>().unwrap(), SortKey::asc("name"));
        assert_eq!("score".parse::<SortKey>().unwrap(), SortKey::desc("score"));
        assert!("score:sideways".parse::<SortKey>().is_err());
        assert!(":asc".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let q: SearchQuery = serde_json::from_value(json!({
            "queryText": "oracle",
            "registryScope": ["1", "137"],
            "adapterScope": {"kind": "explicit", "ids": ["a"]}
        }))
        .unwrap();
        assert_eq!(q.limit, DEFAULT_LIMIT);
        assert_eq!(
            q.registry_scope,
            Some(RegistryScope::List(vec!["1".into(), "137".into()]))
        );
        assert_eq!(q.adapter_scope, AdapterScope::Explicit(vec!["a".into()]));
    }
}
