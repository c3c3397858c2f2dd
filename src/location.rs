use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display};

/// A path of object keys and array indices from the document root.
///
/// Locations are the identity of every AST node: two references that land on
/// the same location are the same node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(Vec<String>);

impl Location {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Location(segments.into_iter().map(Into::into).collect())
    }

    /// Converts a reference such as `#/components/schemas/Pet` (or
    /// `file.yaml#/components/schemas/Pet`) into a location. Only the fragment
    /// is kept; empty segments are dropped and `~1`/`~0` are unescaped.
    pub fn from_pointer(pointer: &str) -> Self {
        let fragment = match pointer.find('#') {
            Some(idx) => &pointer[idx + 1..],
            None => pointer,
        };
        Location(
            fragment
                .split('/')
                .filter(|s| !s.is_empty())
                .map(unescape_segment)
                .collect(),
        )
    }

    /// Renders the location as a local reference (`#/a/b`).
    pub fn to_pointer(&self) -> String {
        let mut out = String::from("#");
        for segment in &self.0 {
            out.push('/');
            out.push_str(&escape_segment(segment));
        }
        out
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Location> {
        if self.0.is_empty() {
            return None;
        }
        Some(Location(self.0[..self.0.len() - 1].to_vec()))
    }

    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Location {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Location(segments)
    }

    #[must_use]
    pub fn join<I, S>(&self, segments: I) -> Location
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = self.0.clone();
        out.extend(segments.into_iter().map(Into::into));
        Location(out)
    }

    pub fn starts_with(&self, prefix: &Location) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(doc, |node, segment| step(node, segment))
    }

    pub fn get_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        self.0
            .iter()
            .try_fold(doc, |node, segment| step_mut(node, segment))
    }

    /// Writes `value` at this location, creating intermediate objects where a
    /// segment is missing. Returns `false` when an existing scalar or an
    /// out-of-range array index blocks the path.
    pub fn set(&self, doc: &mut Value, value: Value) -> bool {
        let Some((last, init)) = self.0.split_last() else {
            *doc = value;
            return true;
        };
        let mut node = doc;
        for segment in init {
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
            node = match node {
                Value::Object(map) => map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(idx) if idx < items.len() => &mut items[idx],
                    _ => return false,
                },
                _ => return false,
            };
        }
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                true
            }
            Value::Array(items) => match last.parse::<usize>() {
                Ok(idx) if idx < items.len() => {
                    items[idx] = value;
                    true
                }
                Ok(idx) if idx == items.len() => {
                    items.push(value);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Removes and returns the value at this location. Array elements are
    /// removed (shifting later elements), object keys keep the order of the
    /// remaining keys.
    pub fn remove(&self, doc: &mut Value) -> Option<Value> {
        let (last, init) = self.0.split_last()?;
        let parent = Location(init.to_vec()).get_mut(doc)?;
        match parent {
            Value::Object(map) => map.shift_remove(last),
            Value::Array(items) => {
                let idx = last.parse::<usize>().ok()?;
                (idx < items.len()).then(|| items.remove(idx))
            }
            _ => None,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pointer())
    }
}

impl From<Vec<String>> for Location {
    fn from(segments: Vec<String>) -> Self {
        Location(segments)
    }
}

impl From<&[&str]> for Location {
    fn from(segments: &[&str]) -> Self {
        Location::new(segments.iter().copied())
    }
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn step_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::Location;
    use serde_json::json;

    #[test]
    fn test_pointer_escaping() {
        let loc = Location::new(["paths", "/items/{id}", "get"]);
        assert_eq!(loc.to_pointer(), "#/paths/~1items~1{id}/get");
        assert_eq!(Location::from_pointer(&loc.to_pointer()), loc);
    }

    #[test]
    fn test_external_pointer_keeps_fragment() {
        let loc = Location::from_pointer("./common.yaml#/parameters/Page");
        assert_eq!(loc, Location::new(["parameters", "Page"]));
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut doc = json!({ "a": [1, 2] });
        assert!(Location::new(["x", "y"]).set(&mut doc, json!(true)));
        assert!(Location::new(["a", "2"]).set(&mut doc, json!(3)));
        assert!(!Location::new(["a", "9"]).set(&mut doc, json!(9)));
        assert_eq!(doc, json!({ "a": [1, 2, 3], "x": { "y": true } }));
    }

    #[test]
    fn test_remove_preserves_key_order() {
        let mut doc = json!({ "a": 1, "b": 2, "c": 3 });
        assert_eq!(Location::new(["b"]).remove(&mut doc), Some(json!(2)));
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
