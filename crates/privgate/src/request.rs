//! Request-context accessor consumed from the host framework.
//!
//! The engine never inspects a host request directly. Hosts implement
//! [`RequestContext`] over whatever their framework binds; [`StaticRequest`]
//! is an owned implementation for hosts that pre-extract values, and for tests.

use std::collections::HashMap;

use privgate_types::{AttributeValue, ParamLocation};
use serde_json::Value;

/// Read-only view of the values a protected operation was invoked with.
pub trait RequestContext {
    /// An explicit, named argument of the protected operation.
    fn argument(&self, name: &str) -> Option<AttributeValue>;

    /// A declared request parameter at the given location.
    fn param(&self, name: &str, location: ParamLocation) -> Option<&str>;

    /// A field of the structured payload, by dotted path or JSON pointer.
    fn body_field(&self, path: &str) -> Option<&Value>;

    /// A request header. Lookup is case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Looks up `path` in a JSON document.
///
/// Paths starting with `/` are JSON pointers (RFC 6901). Anything else is a
/// dotted path where numeric segments index into arrays: `units.0.id`.
pub fn lookup_json<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if path.starts_with('/') {
        return document.pointer(path);
    }

    let mut current = document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// An owned request snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticRequest {
    arguments: HashMap<String, AttributeValue>,
    query: HashMap<String, String>,
    path: HashMap<String, String>,
    body: Option<Value>,
    headers: HashMap<String, String>,
}

impl StaticRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }
}

impl RequestContext for StaticRequest {
    fn argument(&self, name: &str) -> Option<AttributeValue> {
        self.arguments.get(name).cloned()
    }

    fn param(&self, name: &str, location: ParamLocation) -> Option<&str> {
        let params = match location {
            ParamLocation::Query => &self.query,
            ParamLocation::Path => &self.path,
        };
        params.get(name).map(String::as_str)
    }

    fn body_field(&self, path: &str) -> Option<&Value> {
        lookup_json(self.body.as_ref()?, path)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_lookup() {
        let doc = json!({"unit": {"id": 5, "tags": ["a", "b"]}});
        assert_eq!(lookup_json(&doc, "unit.id"), Some(&json!(5)));
        assert_eq!(lookup_json(&doc, "unit.tags.1"), Some(&json!("b")));
        assert_eq!(lookup_json(&doc, "unit.missing"), None);
        assert_eq!(lookup_json(&doc, "unit.id.deeper"), None);
        assert_eq!(lookup_json(&doc, "unit.tags.x"), None);
    }

    #[test]
    fn test_pointer_lookup() {
        let doc = json!({"unit": {"id": 5}});
        assert_eq!(lookup_json(&doc, "/unit/id"), Some(&json!(5)));
        assert_eq!(lookup_json(&doc, "/unit/nope"), None);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let request = StaticRequest::new().with_header("UserId", "u1");
        assert_eq!(request.header("userid"), Some("u1"));
        assert_eq!(request.header("USERID"), Some("u1"));
    }

    #[test]
    fn test_params_are_separated_by_location() {
        let request = StaticRequest::new()
            .with_query("unitId", "5")
            .with_path("unitId", "9");
        assert_eq!(request.param("unitId", ParamLocation::Query), Some("5"));
        assert_eq!(request.param("unitId", ParamLocation::Path), Some("9"));
    }

    #[test]
    fn test_body_absent() {
        let request = StaticRequest::new();
        assert!(request.body_field("unitId").is_none());
    }
}
