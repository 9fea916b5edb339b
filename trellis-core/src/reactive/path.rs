//! Dotted watch paths.
//!
//! `scope.watch("a.b.c", ...)` watches a path into the scope's data. Paths
//! are plain dot-separated key lists; anything fancier (brackets, calls,
//! whitespace) is rejected and the caller should pass a getter instead.

use crate::observer::{Key, Value};

/// Split a watch path into its segments.
///
/// Returns `None` when the path contains a character outside
/// `[A-Za-z0-9_$.]`. Empty segments are kept, so `"a..b"` reads the empty
/// key between them.
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if !valid {
        return None;
    }
    Some(path.split('.').map(str::to_string).collect())
}

/// Read `segments` starting at `root`.
///
/// Each segment reads through the container's tracked slots, so evaluating
/// this under a watcher subscribes it to every key on the path. Missing keys
/// and primitives in the middle of the path yield `Undefined`.
pub(crate) fn resolve(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        current = match &current {
            Value::Object(obj) => obj.get(segment),
            Value::Array(arr) => match Key::from(segment.as_str()).as_index() {
                Some(index) => arr.get(index),
                None if segment == "length" => Value::from(arr.len()),
                None => Value::Undefined,
            },
            _ => return Value::Undefined,
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_simple_paths() {
        assert_eq!(parse_path("a"), Some(vec!["a".to_string()]));
        assert_eq!(
            parse_path("user.$meta.first_name"),
            Some(vec![
                "user".to_string(),
                "$meta".to_string(),
                "first_name".to_string()
            ])
        );
        assert_eq!(parse_path("list.0"), Some(vec!["list".to_string(), "0".to_string()]));
    }

    #[test]
    fn rejects_expressions() {
        assert_eq!(parse_path("a[0]"), None);
        assert_eq!(parse_path("a + b"), None);
        assert_eq!(parse_path("fn()"), None);
        assert_eq!(parse_path("a-b"), None);
    }

    #[test]
    fn resolves_through_objects_and_arrays() {
        let data = Value::from_json(json!({ "a": { "list": [10, { "b": "hit" }] } }));

        let path = parse_path("a.list.1.b").unwrap();
        assert_eq!(resolve(&data, &path), Value::from("hit"));

        let len = parse_path("a.list.length").unwrap();
        assert_eq!(resolve(&data, &len), Value::from(2));
    }

    #[test]
    fn missing_segments_are_undefined() {
        let data = Value::from_json(json!({ "a": 1 }));

        assert!(resolve(&data, &parse_path("b").unwrap()).is_undefined());
        assert!(resolve(&data, &parse_path("a.b.c").unwrap()).is_undefined());
    }
}
