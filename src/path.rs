//! Path specs and their canonical keys.
//!
//! A [`PathSpec`] names a subscribable location: either a plain path or a
//! path plus ordering and filter parameters. Its [`key`](PathSpec::key) is
//! the only identity used for dedup, registry lookup and cache naming.

use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separates path segments.
pub const PATH_SEPARATOR: char = '/';

/// Separates the fields of a structured query key. Never valid inside a path segment.
pub const KEY_DELIMITER: char = '|';

/// Strip leading and trailing separators.
pub fn normalize(path: &str) -> &str {
    path.trim_matches(PATH_SEPARATOR)
}

/// Split a path into its segments. The root path has no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    let path = normalize(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(PATH_SEPARATOR).collect()
    }
}

/// Join a base path and a child key.
pub fn join(base: &str, child: &str) -> String {
    let base = normalize(base);
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}{}{}", base, PATH_SEPARATOR, child)
    }
}

/// Iterate a normalized path and each of its ancestors, most specific first.
///
/// `"a/b/c"` yields `"a/b/c"`, `"a/b"`, `"a"`.
pub fn ancestors(path: &str) -> Ancestors<'_> {
    Ancestors {
        next: Some(normalize(path)),
    }
}

/// Iterator returned by [`ancestors`].
pub struct Ancestors<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let current = self.next.take()?;
        self.next = current
            .rfind(PATH_SEPARATOR)
            .map(|idx| normalize(&current[..idx]));
        Some(current)
    }
}

/// Ordering applied to a query. At most one per query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    Key,
    Child(String),
    Value,
}

/// Filter operators of a query, applied in key field order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_to_last: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_to_first: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<JsonValue>,
}

/// A path plus ordering and filter parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub path: String,
    #[serde(default)]
    pub filter: QueryFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
}

impl QuerySpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: QueryFilter::default(),
            order_by: None,
        }
    }

    pub fn order_by_key(mut self) -> Self {
        self.order_by = Some(OrderBy::Key);
        self
    }

    pub fn order_by_child(mut self, child: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy::Child(child.into()));
        self
    }

    pub fn order_by_value(mut self) -> Self {
        self.order_by = Some(OrderBy::Value);
        self
    }

    pub fn limit_to_last(mut self, n: u32) -> Self {
        self.filter.limit_to_last = Some(n);
        self
    }

    pub fn limit_to_first(mut self, n: u32) -> Self {
        self.filter.limit_to_first = Some(n);
        self
    }

    pub fn start_at(mut self, value: impl Into<JsonValue>) -> Self {
        self.filter.start_at = Some(value.into());
        self
    }

    pub fn end_at(mut self, value: impl Into<JsonValue>) -> Self {
        self.filter.end_at = Some(value.into());
        self
    }

    pub fn equal_to(mut self, value: impl Into<JsonValue>) -> Self {
        self.filter.equal_to = Some(value.into());
        self
    }

    /// Canonical key: the normalized path followed by every filter and order
    /// field in fixed order, absent fields rendered empty.
    ///
    /// Filter values and the child name are rendered as JSON, so `1`, `"1"`
    /// and `null` stay distinct from each other and from an absent field.
    pub fn key(&self) -> String {
        let f = &self.filter;
        let fields = [
            normalize(&self.path).to_string(),
            f.limit_to_last.map(|n| n.to_string()).unwrap_or_default(),
            f.limit_to_first.map(|n| n.to_string()).unwrap_or_default(),
            render(f.end_at.as_ref()),
            render(f.start_at.as_ref()),
            render(f.equal_to.as_ref()),
            flag(matches!(self.order_by, Some(OrderBy::Key))),
            match &self.order_by {
                Some(OrderBy::Child(child)) => JsonValue::from(child.as_str()).to_string(),
                _ => String::new(),
            },
            flag(matches!(self.order_by, Some(OrderBy::Value))),
        ];
        fields.join(&KEY_DELIMITER.to_string())
    }
}

fn render(value: Option<&JsonValue>) -> String {
    value.map(JsonValue::to_string).unwrap_or_default()
}

fn flag(set: bool) -> String {
    if set {
        "true".to_string()
    } else {
        String::new()
    }
}

/// A subscribable location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    Plain(String),
    Query(QuerySpec),
}

impl PathSpec {
    /// Start a structured query at `path`.
    pub fn query(path: impl Into<String>) -> QuerySpec {
        QuerySpec::new(path)
    }

    /// Canonical key of this spec.
    pub fn key(&self) -> String {
        match self {
            PathSpec::Plain(path) => normalize(path).to_string(),
            PathSpec::Query(query) => query.key(),
        }
    }

    /// The path as given, before normalization.
    pub fn path(&self) -> &str {
        match self {
            PathSpec::Plain(path) => path,
            PathSpec::Query(query) => &query.path,
        }
    }

    /// The normalized location the spec reads from.
    pub fn base_path(&self) -> &str {
        normalize(self.path())
    }

    /// Plain paths take part in ancestor coverage; queries only match exactly.
    pub fn is_plain(&self) -> bool {
        matches!(self, PathSpec::Plain(_))
    }
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::Plain(path.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(path: String) -> Self {
        PathSpec::Plain(path)
    }
}

impl From<&String> for PathSpec {
    fn from(path: &String) -> Self {
        PathSpec::Plain(path.clone())
    }
}

impl From<QuerySpec> for PathSpec {
    fn from(query: QuerySpec) -> Self {
        PathSpec::Query(query)
    }
}

impl From<&PathSpec> for PathSpec {
    fn from(spec: &PathSpec) -> Self {
        spec.clone()
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize("/foo/bar"), "foo/bar");
        assert_eq!(normalize("foo/bar/"), "foo/bar");
        assert_eq!(normalize("/foo/"), "foo");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/foo/bar"), vec!["foo", "bar"]);
        assert_eq!(split_path("foo/bar/"), vec!["foo", "bar"]);
        assert!(split_path("/").is_empty());
    }

    #[test]
    fn test_ancestors_walk_up() {
        let walked: Vec<_> = ancestors("/a/b/c").collect();
        assert_eq!(walked, vec!["a/b/c", "a/b", "a"]);

        let single: Vec<_> = ancestors("a").collect();
        assert_eq!(single, vec!["a"]);
    }

    #[test]
    fn test_plain_key_is_normalized_path() {
        assert_eq!(PathSpec::from("/foo/bar/").key(), "foo/bar");
    }

    #[test]
    fn test_query_key_field_order() {
        let spec: PathSpec = PathSpec::query("/baz")
            .limit_to_last(1)
            .start_at(10)
            .order_by_key()
            .into();
        assert_eq!(spec.key(), "baz|1|||10||true||");

        let spec: PathSpec = PathSpec::query("items")
            .order_by_child("createdOn")
            .equal_to("x")
            .into();
        assert_eq!(spec.key(), r#"items|||||"x"||"createdOn"|"#);
    }

    #[test]
    fn test_query_key_keeps_value_types_apart() {
        let number = PathSpec::query("q").equal_to(1).key();
        let text = PathSpec::query("q").equal_to("1").key();
        assert_ne!(number, text);
        assert_eq!(number, "q|||||1|||");
        assert_eq!(text, r#"q|||||"1"|||"#);

        let null_start = PathSpec::query("q").start_at(JsonValue::Null).key();
        let no_start = PathSpec::query("q").key();
        assert_ne!(null_start, no_start);
        assert_eq!(null_start, "q||||null||||");

        let empty_child = PathSpec::query("q").order_by_child("").key();
        assert_ne!(empty_child, no_start);
        assert_eq!(empty_child, r#"q|||||||""|"#);
    }

    #[test]
    fn test_query_with_no_fields_differs_from_plain() {
        let plain = PathSpec::from("baz");
        let query: PathSpec = PathSpec::query("baz").into();
        assert_ne!(plain.key(), query.key());
    }

    #[test]
    fn test_path_spec_serde_untagged() {
        let plain: PathSpec = serde_json::from_value(json!("foo/bar")).unwrap();
        assert_eq!(plain, PathSpec::from("foo/bar"));

        let query: PathSpec = serde_json::from_value(json!({
            "path": "baz",
            "filter": {"limitToLast": 3},
            "orderBy": "key",
        }))
        .unwrap();
        assert_eq!(
            query,
            PathSpec::Query(PathSpec::query("baz").limit_to_last(3).order_by_key())
        );
    }

    fn arb_filter_value() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::from),
            (-5i64..50).prop_map(JsonValue::from),
            "[a-z0-9|\"]{0,3}".prop_map(JsonValue::from),
            Just(JsonValue::from("null")),
            Just(JsonValue::from("true")),
        ]
    }

    fn arb_query() -> impl Strategy<Value = QuerySpec> {
        (
            "[a-z]{1,4}(/[a-z]{1,4}){0,2}",
            proptest::option::of(0u32..50),
            proptest::option::of(0u32..50),
            proptest::option::of(arb_filter_value()),
            proptest::option::of(arb_filter_value()),
            proptest::option::of(arb_filter_value()),
            0u8..4,
            "[a-z|]{0,3}",
        )
            .prop_map(|(path, last, first, end, start, equal, order, child)| {
                let mut query = QuerySpec::new(path);
                query.filter.limit_to_last = last;
                query.filter.limit_to_first = first;
                query.filter.end_at = end;
                query.filter.start_at = start;
                query.filter.equal_to = equal;
                query.order_by = match order {
                    1 => Some(OrderBy::Key),
                    2 => Some(OrderBy::Child(child)),
                    3 => Some(OrderBy::Value),
                    _ => None,
                };
                query
            })
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(path in "[/a-z]{0,12}") {
            prop_assert_eq!(normalize(normalize(&path)), normalize(&path));
        }

        #[test]
        fn prop_key_deterministic(query in arb_query()) {
            let spec = PathSpec::Query(query);
            prop_assert_eq!(spec.key(), spec.clone().key());
        }

        #[test]
        fn prop_key_distinguishes_fields(a in arb_query(), b in arb_query()) {
            if a != b {
                prop_assert_ne!(a.key(), b.key());
            }
        }
    }
}
