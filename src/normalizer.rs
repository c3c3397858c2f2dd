//! In-place canonicalization passes over the merged document.

use crate::document::{ref_of, Document, HTTP_METHODS};
use crate::error::ResolverError;
use crate::location::Location;
use crate::resolver::Resolver;
use crate::utils::pascal_case;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{json, Value};

/// Moves every shared path item referenced from `paths` into `paths` itself
/// and points the old storage location back at it. Returns how many entries
/// were uplifted.
///
/// When a second path pattern aliases a definition that was already uplifted,
/// the second pattern receives its own deep copy so that each pattern owns
/// distinct operation locations.
pub fn uplift_path_aliases(resolver: &mut Resolver) -> Result<usize, ResolverError> {
    let patterns: Vec<String> = match resolver.document()?.get("paths") {
        Some(Value::Object(paths)) => paths.keys().cloned().collect(),
        _ => return Ok(0),
    };
    let mut uplifted = 0;
    for pattern in patterns {
        let slot = Location::new(["paths", pattern.as_str()]);
        let target = {
            let document = resolver.document()?;
            let Some(entry) = slot.get(document) else {
                continue;
            };
            if ref_of(entry).is_none() {
                continue;
            }
            match resolver.resolve(entry)?.location() {
                Some(target) => target,
                None => continue,
            }
        };
        let paths_root = Location::new(["paths"]);
        let document = resolver.document_mut()?;
        if target.starts_with(&paths_root) {
            let copy = target.get(document).cloned().unwrap_or(Value::Null);
            slot.set(document, copy);
            log::debug!("copied aliased path item {target} into {slot}");
        } else {
            let back_ref = json!({ "$ref": slot.to_pointer() });
            let Some(shared) = target.get_mut(document) else {
                return Err(ResolverError::UnresolvablePointer {
                    pointer: target.to_pointer(),
                });
            };
            let moved = std::mem::replace(shared, back_ref);
            slot.set(document, moved);
            log::debug!("uplifted {target} into {slot}");
        }
        uplifted += 1;
    }
    Ok(uplifted)
}

/// Gives every inline top-level schema without a `title` its storage key as
/// title. Alias entries (`A: {$ref: B}`) are left as references.
pub fn default_titles(doc: &mut Document) -> usize {
    let Some(Value::Object(schemas)) = Location::new(["components", "schemas"]).get_mut(doc) else {
        return 0;
    };
    let mut count = 0;
    for (key, schema) in schemas.iter_mut() {
        if ref_of(schema).is_some() {
            continue;
        }
        if let Value::Object(map) = schema {
            if !map.contains_key("title") {
                map.insert("title".to_string(), Value::String(key.clone()));
                count += 1;
            }
        }
    }
    count
}

/// Removes each dotted path (`components.schemas.Internal`,
/// `paths./pets.get`, `tags[0]`) from the document. Returns how many were
/// present.
pub fn exclude_paths<I, S>(doc: &mut Document, paths: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut removed = 0;
    for path in paths {
        let location = parse_dotted(path.as_ref());
        if location.remove(doc).is_some() {
            log::debug!("excluded {location}");
            removed += 1;
        }
    }
    removed
}

fn parse_dotted(path: &str) -> Location {
    let mut segments = Vec::new();
    for part in path.split('.').filter(|p| !p.is_empty()) {
        let mut rest = part;
        if let Some(open) = rest.find('[') {
            if open > 0 {
                segments.push(rest[..open].to_string());
            }
            rest = &rest[open..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else {
                    segments.push(stripped.to_string());
                    break;
                };
                segments.push(stripped[..close].to_string());
                rest = &stripped[close + 1..];
            }
        } else {
            segments.push(rest.to_string());
        }
    }
    Location::from(segments)
}

/// How the hoisting pass treats anonymous schemas.
#[derive(Debug, Clone)]
pub enum HoistMode {
    /// Only list fingerprints that have no name yet.
    Report,
    /// Relocate schemas whose fingerprint is named in the map.
    Apply(IndexMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistSuggestion {
    pub fingerprint: String,
    pub location: Location,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistedSchema {
    pub from: Location,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoistReport {
    pub suggestions: Vec<HoistSuggestion>,
    pub hoisted: Vec<HoistedSchema>,
    /// Occurrences left inline because their name belongs to another schema.
    pub conflicts: Vec<HoistedSchema>,
}

impl HoistReport {
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty() && self.hoisted.is_empty() && self.conflicts.is_empty()
    }
}

/// Extension naming the definition an inline schema should be hoisted to.
pub const SCHEMA_NAME_EXTENSION: &str = "x-schema-name";

/// Walks every schema position of the document, children before parents.
/// Schemas behind a `$ref` are never entered, and top-level
/// `components/schemas` entries are only searched, never hoisted themselves,
/// so running the pass over its own output changes nothing.
pub fn hoist(doc: &mut Document, mode: &HoistMode) -> HoistReport {
    let mut candidates = Vec::new();
    collect_candidates(doc, &mut candidates);

    let mut report = HoistReport::default();
    let mut reported: IndexSet<String> = IndexSet::new();
    for (location, fp) in candidates {
        let Some(schema) = location.get(doc) else {
            continue;
        };
        let preset = schema
            .get(SCHEMA_NAME_EXTENSION)
            .and_then(Value::as_str)
            .map(str::to_string);
        match mode {
            HoistMode::Report => {
                if preset.is_some() || !reported.insert(fp.clone()) {
                    continue;
                }
                let hint = hint_for(schema, &fp);
                log::info!("unnamed schema {fp} at {location}: {hint}");
                report.suggestions.push(HoistSuggestion {
                    fingerprint: fp,
                    location,
                    hint,
                });
            }
            HoistMode::Apply(names) => {
                let name = names
                    .get(&fp)
                    .or_else(|| names.get(&fp.to_lowercase()))
                    .cloned()
                    .or(preset);
                if let Some(name) = name {
                    relocate(doc, location, name, &mut report);
                }
            }
        }
    }
    report
}

fn relocate(doc: &mut Document, from: Location, name: String, report: &mut HoistReport) {
    let target = Location::new(["components", "schemas", name.as_str()]);
    let Some(schema) = from.get(doc).cloned() else {
        return;
    };
    if let Some(existing) = target.get(doc) {
        if *existing != schema {
            log::warn!("cannot hoist {from} as `{name}`: the name is taken by a different schema");
            report.conflicts.push(HoistedSchema { from, name });
            return;
        }
    } else if !target.set(doc, schema) {
        return;
    }
    from.set(doc, json!({ "$ref": target.to_pointer() }));
    log::debug!("hoisted {from} to {target}");
    report.hoisted.push(HoistedSchema { from, name });
}

fn hint_for(schema: &Value, fingerprint: &str) -> String {
    schema
        .get("title")
        .or_else(|| schema.get("description"))
        .and_then(Value::as_str)
        .map_or_else(|| pascal_case(fingerprint), str::to_string)
        .replace("\r\n", " ")
        .replace('\n', " ")
}

/// The structural fingerprint of an object or string-enum schema.
pub fn fingerprint(schema: &Value) -> Option<String> {
    let kind = schema.get("type").and_then(Value::as_str);
    let properties = schema.get("properties").and_then(Value::as_object);
    let additional = schema.get("additionalProperties").is_some_and(Value::is_object);
    if kind == Some("object") || properties.is_some() {
        if properties.map_or(true, |p| p.is_empty()) && !additional {
            return None;
        }
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let mut names: Vec<&String> = properties.map(|p| p.keys().collect()).unwrap_or_default();
        names.sort();
        let mut out = String::from("O");
        for name in names {
            out.push_str(name);
            if required.contains(&name.as_str()) {
                out.push('!');
            }
        }
        if additional {
            out.push('+');
        }
        return Some(out);
    }
    if kind == Some("string") {
        let values = schema.get("enum").and_then(Value::as_array)?;
        let mut literals: Vec<String> = values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        literals.sort();
        return Some(format!("E{}", literals.concat()));
    }
    None
}

fn collect_candidates(doc: &Value, out: &mut Vec<(Location, String)>) {
    let components = Location::new(["components"]);
    if let Some(Value::Object(schemas)) = components.child("schemas").get(doc) {
        for (name, schema) in schemas {
            let location = components.join(["schemas", name.as_str()]);
            visit_schema(schema, &location, false, out);
        }
    }
    for section in ["responses", "parameters", "requestBodies", "headers"] {
        let Some(Value::Object(entries)) = components.child(section).get(doc) else {
            continue;
        };
        for (name, entry) in entries {
            let location = components.join([section, name.as_str()]);
            match section {
                "responses" => visit_response(entry, &location, out),
                "requestBodies" => visit_content(entry, &location, out),
                _ => visit_parameter(entry, &location, out),
            }
        }
    }
    if let Some(Value::Object(paths)) = doc.get("paths") {
        for (pattern, item) in paths {
            visit_path_item(item, &Location::new(["paths", pattern.as_str()]), out);
        }
    }
}

fn visit_path_item(item: &Value, location: &Location, out: &mut Vec<(Location, String)>) {
    if ref_of(item).is_some() {
        return;
    }
    visit_parameters(item, location, out);
    for method in HTTP_METHODS {
        let Some(operation) = item.get(method) else {
            continue;
        };
        let op_location = location.child(method);
        visit_parameters(operation, &op_location, out);
        if let Some(body) = operation.get("requestBody") {
            visit_content(body, &op_location.child("requestBody"), out);
        }
        if let Some(Value::Object(responses)) = operation.get("responses") {
            for (code, response) in responses {
                visit_response(response, &op_location.join(["responses", code.as_str()]), out);
            }
        }
    }
}

fn visit_parameters(owner: &Value, location: &Location, out: &mut Vec<(Location, String)>) {
    if let Some(Value::Array(params)) = owner.get("parameters") {
        for (idx, param) in params.iter().enumerate() {
            visit_parameter(param, &location.join(["parameters".to_string(), idx.to_string()]), out);
        }
    }
}

/// Parameters and headers share a shape.
fn visit_parameter(param: &Value, location: &Location, out: &mut Vec<(Location, String)>) {
    if ref_of(param).is_some() {
        return;
    }
    if let Some(schema) = param.get("schema") {
        visit_schema(schema, &location.child("schema"), true, out);
    }
    visit_content(param, location, out);
}

fn visit_response(response: &Value, location: &Location, out: &mut Vec<(Location, String)>) {
    if ref_of(response).is_some() {
        return;
    }
    if let Some(Value::Object(headers)) = response.get("headers") {
        for (name, header) in headers {
            visit_parameter(header, &location.join(["headers", name.as_str()]), out);
        }
    }
    visit_content(response, location, out);
}

fn visit_content(owner: &Value, location: &Location, out: &mut Vec<(Location, String)>) {
    if ref_of(owner).is_some() {
        return;
    }
    let Some(Value::Object(content)) = owner.get("content") else {
        return;
    };
    for (media_type, media) in content {
        let media_location = location.join(["content", media_type.as_str()]);
        if let Some(schema) = media.get("schema") {
            visit_schema(schema, &media_location.child("schema"), true, out);
        }
        if let Some(Value::Object(encodings)) = media.get("encoding") {
            for (prop, encoding) in encodings {
                if let Some(Value::Object(headers)) = encoding.get("headers") {
                    for (name, header) in headers {
                        let header_location =
                            media_location.join(["encoding", prop.as_str(), "headers", name.as_str()]);
                        visit_parameter(header, &header_location, out);
                    }
                }
            }
        }
    }
}

fn visit_schema(schema: &Value, location: &Location, hoistable: bool, out: &mut Vec<(Location, String)>) {
    if ref_of(schema).is_some() || !schema.is_object() {
        return;
    }
    for key in ["allOf", "oneOf", "anyOf"] {
        if let Some(Value::Array(members)) = schema.get(key) {
            for (idx, member) in members.iter().enumerate() {
                visit_schema(member, &location.join([key.to_string(), idx.to_string()]), true, out);
            }
        }
    }
    if let Some(not) = schema.get("not") {
        visit_schema(not, &location.child("not"), true, out);
    }
    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (name, property) in properties {
            visit_schema(property, &location.join(["properties", name.as_str()]), true, out);
        }
    }
    if let Some(additional) = schema.get("additionalProperties") {
        visit_schema(additional, &location.child("additionalProperties"), true, out);
    }
    if let Some(items) = schema.get("items") {
        visit_schema(items, &location.child("items"), true, out);
    }
    if hoistable {
        if let Some(fp) = fingerprint(schema) {
            out.push((location.clone(), fp));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_paths() {
        assert_eq!(
            parse_dotted("paths./pets.get"),
            Location::new(["paths", "/pets", "get"])
        );
        assert_eq!(
            parse_dotted("tags[1].name"),
            Location::new(["tags", "1", "name"])
        );
        assert_eq!(parse_dotted("a[0][2]"), Location::new(["a", "0", "2"]));
    }

    #[test]
    fn test_object_fingerprint_sorts_and_marks() {
        let schema = json!({
            "type": "object",
            "required": ["b"],
            "properties": { "b": {}, "a": {} },
            "additionalProperties": { "type": "string" }
        });
        assert_eq!(fingerprint(&schema).as_deref(), Some("Oab!+"));
    }

    #[test]
    fn test_enum_fingerprint() {
        let schema = json!({ "type": "string", "enum": ["on", "off"] });
        assert_eq!(fingerprint(&schema).as_deref(), Some("Eoffon"));
        assert_eq!(fingerprint(&json!({ "type": "string" })), None);
        assert_eq!(fingerprint(&json!({ "type": "object" })), None);
    }
}
