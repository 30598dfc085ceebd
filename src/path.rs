//! Path accessor
//!
//! Reads a value out of a nested JSON structure by a dotted path. Numeric
//! segments index arrays; anything that does not resolve yields `None`.

use serde_json::Value;

/// Look up `path` inside `root`.
///
/// An empty path returns `root` itself. Lookup stops with `None` at the
/// first segment that is neither a valid array index nor an object key.
pub fn get_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }

    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) => items.get(index)?,
                Err(_) => return None,
            },
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Rewrite bracket indices into dotted form: `a[0].b` becomes `a.0.b`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '[' => out.push('.'),
            ']' => {}
            _ => out.push(c),
        }
    }
    out.trim_start_matches('.').to_string()
}

/// [`get_value`] after bracket normalization
pub fn get_value_normalized<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.contains('[') {
        get_value(root, &normalize_path(path))
    } else {
        get_value(root, path)
    }
}
