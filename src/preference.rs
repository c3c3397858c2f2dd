//! Deterministic ranking of media types, response codes and method inputs.

use crate::ast::ParamIn;
use crate::config::MediaTypePattern;
use indexmap::IndexSet;
use std::cmp::Ordering;

/// Returns the declared media types that match some pattern, ordered by the
/// rank of the first pattern each one matches. Ties keep declaration order.
pub fn preferred_media_types<I, S>(declared: I, patterns: &[MediaTypePattern]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: IndexSet<String> = declared
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    let mut ranked: Vec<(usize, String)> = unique
        .into_iter()
        .filter_map(|media_type| {
            patterns
                .iter()
                .position(|p| p.matches(&media_type))
                .map(|rank| (rank, media_type))
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, media_type)| media_type).collect()
}

/// Codes a verb prefers, in the order they should lead the result.
fn promoted_codes(method: &str) -> &'static [&'static str] {
    match method.to_ascii_lowercase().as_str() {
        "get" | "head" => &["204", "200"],
        "post" => &["200", "201"],
        "put" => &["204", "200", "201"],
        "delete" => &["200", "204", "202"],
        _ => &[],
    }
}

/// Sort key of a status code: uppercased, `default` ranked just after every
/// 2xx code, wildcards padded to three characters.
fn code_key(code: &str) -> String {
    let mut key = code.trim().to_uppercase();
    if key == "DEFAULT" {
        key = "2ZZ".to_string();
    }
    while key.len() < 3 {
        key.push('X');
    }
    key
}

/// Ranks the success codes of one operation's responses, most preferred
/// first. Codes are returned exactly as declared.
pub fn preferred_response_codes<I, S>(method: &str, declared: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: IndexSet<String> = declared
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    let mut success: Vec<(String, String)> = unique
        .into_iter()
        .map(|code| (code_key(&code), code))
        .filter(|(key, _)| key.starts_with('2'))
        .collect();
    success.sort_by(|a, b| a.0.cmp(&b.0));

    let mut ordered = Vec::with_capacity(success.len());
    for promoted in promoted_codes(method) {
        if let Some(idx) = success.iter().position(|(key, _)| key == promoted) {
            ordered.push(success.remove(idx).1);
        }
    }
    ordered.extend(success.into_iter().map(|(_, code)| code));
    ordered
}

/// The facts about a method input that decide its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputOrder {
    pub required: bool,
    pub has_default: bool,
    /// `None` for the request body.
    pub location: Option<ParamIn>,
}

/// Tie-break between two parameters: query, header, cookie, then path.
fn location_rank(location: ParamIn) -> u8 {
    match location {
        ParamIn::Query => 0,
        ParamIn::Header => 1,
        ParamIn::Cookie => 2,
        ParamIn::Path => 3,
    }
}

/// Required before optional, defaulted before undefaulted, parameters before
/// the body, then parameter location. Use with a stable sort.
pub fn compare_inputs(a: &InputOrder, b: &InputOrder) -> Ordering {
    b.required
        .cmp(&a.required)
        .then(b.has_default.cmp(&a.has_default))
        .then_with(|| match (a.location, b.location) {
            (Some(x), Some(y)) => location_rank(x).cmp(&location_rank(y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}
