use serde::{Deserialize, Serialize};

/// Identifier casing applied to generated names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    Kebab,
    Pascal,
    Snake,
    #[default]
    Camel,
    /// Leave names exactly as declared.
    Preserve,
}

/// Splits an arbitrary string into lowercase words. Word boundaries are any
/// non-alphanumeric character, a lower-to-upper transition (`fooBar`) and the
/// end of an acronym (`HTTPServer` -> `http`, `server`).
pub fn words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if !current.is_empty() {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let lower_to_upper = prev.is_lowercase() && c.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && next.is_some_and(char::is_lowercase);
            let digit_to_letter = prev.is_ascii_digit() && c.is_alphabetic();
            if lower_to_upper || acronym_end || digit_to_letter {
                out.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

pub fn snake_case(s: &str) -> String {
    words(s).join("_")
}

pub fn kebab_case(s: &str) -> String {
    words(s).join("-")
}

pub fn camel_case(s: &str) -> String {
    let mut out = String::new();
    for (i, word) in words(s).iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

pub fn pascal_case(s: &str) -> String {
    words(s).iter().map(|w| capitalize(w)).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_snake_case(s: &str) -> bool {
    !s.chars()
        .any(|c| c.is_uppercase() || c == '-' || c.is_whitespace())
}

fn is_kebab_case(s: &str) -> bool {
    !s.chars()
        .any(|c| c.is_uppercase() || c == '_' || c.is_whitespace())
}

fn is_camel_case(s: &str) -> bool {
    s.chars().next().is_some_and(char::is_lowercase)
        && !s.chars().any(|c| c == '-' || c == '_' || c.is_whitespace())
}

fn is_pascal_case(s: &str) -> bool {
    s.chars().next().is_some_and(char::is_uppercase)
        && !s.chars().any(|c| c == '-' || c == '_' || c.is_whitespace())
}

/// Converts `s` to the requested case, leaving it untouched when it already
/// conforms.
pub fn set_case(s: &str, case: NameCase) -> String {
    match case {
        NameCase::Kebab if !is_kebab_case(s) => kebab_case(s),
        NameCase::Pascal if !is_pascal_case(s) => pascal_case(s),
        NameCase::Snake if !is_snake_case(s) => snake_case(s),
        NameCase::Camel if !is_camel_case(s) => camel_case(s),
        _ => s.to_string(),
    }
}

/// Calculates the byte offset of a 1-based line and column in the source text.
/// Used to turn serde's line/column error positions into `SourceSpan`s.
pub fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let col = column.saturating_sub(1);
            return offset
                + text
                    .char_indices()
                    .nth(col)
                    .map_or(text.len(), |(idx, _)| idx);
        }
        offset += text.len();
    }
    source.len()
}
