//! Client-side post-filtering and ordering of search hits.
//!
//! Only ever applied to sets an adapter has already filtered with the
//! constraints it supports.

use std::cmp::Ordering;

use serde_json::Value;

use crate::agent::SearchHit;
use crate::query::{SearchFilters, SortDirection, SortKey};

/// Whether `hit` satisfies every constraint in `filters`.
pub fn matches(hit: &SearchHit, filters: &SearchFilters) -> bool {
    if let Some(needle) = filters.name_contains.as_deref() {
        if !hit.name.to_lowercase().contains(&needle.to_lowercase()) {
            return false;
        }
    }

    for (field, must_exist) in &filters.existence {
        if is_present(hit.field(field).as_ref()) != *must_exist {
            return false;
        }
    }

    for (field, expected) in &filters.equality {
        match hit.field(field) {
            Some(actual) if value_matches(&actual, expected) => {}
            _ => return false,
        }
    }

    for (field, allowed) in &filters.membership {
        match hit.field(field) {
            Some(actual) if allowed.iter().any(|v| value_matches(&actual, v)) => {}
            _ => return false,
        }
    }

    true
}

/// Keep hits matching `filters`, preserving order.
pub fn retain_matching(hits: &mut Vec<SearchHit>, filters: &SearchFilters) {
    if filters.is_empty() {
        return;
    }
    hits.retain(|hit| matches(hit, filters));
}

/// Stable multi-key sort. Hits missing a key sort after those that have it,
/// whatever the direction.
pub fn sort_hits(hits: &mut [SearchHit], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    hits.sort_by(|a, b| {
        for key in keys {
            let ordering = compare_field(a.field(&key.field), b.field(&key.field), key.direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_field(a: Option<Value>, b: Option<Value>, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| is_present(Some(v)));
    let b = b.filter(|v| is_present(Some(v)));
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let ordering = compare_values(&a, &b);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => {
            // Numeric strings (registry ids, token ids) order numerically.
            match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => x.to_lowercase().cmp(&y.to_lowercase()),
            }
        }
        _ => render(a).cmp(&render(b)),
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// Equality that tolerates `"1"` vs `1` and checks membership for arrays.
fn value_matches(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        _ => scalar_eq(actual, expected),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    a == b || render(a).eq_ignore_ascii_case(&render(b))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentEndpoints;
    use crate::query::SearchQuery;
    use serde_json::json;

    fn hits() -> Vec<SearchHit> {
        vec![
            SearchHit::new("1", "10", "Alpha Trader")
                .with_score(0.4)
                .with_endpoints(AgentEndpoints {
                    mcp: Some("https://alpha.example.com/mcp".into()),
                    ..Default::default()
                }),
            SearchHit::new("137", "2", "beta oracle").with_score(0.9),
            SearchHit::new("1", "3", "Gamma Trader"),
        ]
    }

    #[test]
    fn test_existence() {
        let q = SearchQuery::new().mcp(true);
        let mut h = hits();
        retain_matching(&mut h, &q.filters);
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].native_id, "10");

        let q = SearchQuery::new().mcp(false);
        let mut h = hits();
        retain_matching(&mut h, &q.filters);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_name_substring_case_insensitive() {
        let q = SearchQuery::new().name_contains("TRADER");
        let mut h = hits();
        retain_matching(&mut h, &q.filters);
        let ids: Vec<_> = h.iter().map(|h| h.native_id.as_str()).collect();
        assert_eq!(ids, vec!["10", "3"]);
    }

    #[test]
    fn test_equality_and_membership() {
        let q = SearchQuery::new().equals("registry", json!(137));
        let mut h = hits();
        retain_matching(&mut h, &q.filters);
        assert_eq!(h.len(), 1);

        let q = SearchQuery::new().one_of("nativeId", vec![json!("2"), json!("3")]);
        let mut h = hits();
        retain_matching(&mut h, &q.filters);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_membership_on_array_field() {
        let mut hit = SearchHit::new("1", "1", "x");
        hit.protocols = vec!["a2a".into(), "mcp".into()];
        let q = SearchQuery::new().equals("protocols", json!("mcp"));
        assert!(matches(&hit, &q.filters));
        let q = SearchQuery::new().equals("protocols", json!("xmtp"));
        assert!(!matches(&hit, &q.filters));
    }

    #[test]
    fn test_sort_score_desc_missing_last() {
        let mut h = hits();
        sort_hits(&mut h, &[SortKey::desc("score")]);
        let ids: Vec<_> = h.iter().map(|h| h.native_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "10", "3"]);
    }

    #[test]
    fn test_sort_multi_key_numeric_strings() {
        let mut h = hits();
        sort_hits(&mut h, &[SortKey::asc("registry"), SortKey::asc("nativeId")]);
        let ids: Vec<_> = h.iter().map(|h| h.native_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "10", "2"]);
    }
}
