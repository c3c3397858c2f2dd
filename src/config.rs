use crate::error::{ConfigError, LoadError, OalnError};
use crate::utils::NameCase;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which side of the wire the generated code sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Server,
}

/// Generation settings consumed by the AST builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Request body media types the generated code can produce, most
    /// preferred first.
    pub request_media_types: Vec<String>,
    /// Response media types the generated code can consume, most preferred
    /// first.
    pub accept_media_types: Vec<String>,
    pub role: Role,
    pub omitted_operation_ids: Vec<String>,
    pub operation_case: NameCase,
    /// Register every `components/schemas` entry, referenced or not.
    pub all_models: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            request_media_types: [
                "application/x-www-form-urlencoded",
                "multipart/form-data",
                "application/octet-stream",
                "text/plain",
                "application/json",
            ]
            .map(String::from)
            .to_vec(),
            accept_media_types: ["application/octet-stream", "application/json", "text/plain"]
                .map(String::from)
                .to_vec(),
            role: Role::Client,
            omitted_operation_ids: Vec::new(),
            operation_case: NameCase::Camel,
            all_models: false,
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }

    /// Reads a JSON (`.json`) or YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OalnError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_yaml_str(&text)?
        };
        Ok(config)
    }

    pub fn request_patterns(&self) -> Result<Vec<MediaTypePattern>, ConfigError> {
        MediaTypePattern::compile_all(&self.request_media_types)
    }

    pub fn accept_patterns(&self) -> Result<Vec<MediaTypePattern>, ConfigError> {
        MediaTypePattern::compile_all(&self.accept_media_types)
    }

    pub fn is_omitted(&self, operation_id: &str) -> bool {
        self.omitted_operation_ids.iter().any(|id| id == operation_id)
    }
}

/// One entry of a ranked media-type preference list.
///
/// A pattern containing whitespace is read as `regex flags`; anything else
/// matches one media type exactly, ignoring case.
#[derive(Debug, Clone)]
pub enum MediaTypePattern {
    Exact(String),
    Regex(Regex),
}

impl MediaTypePattern {
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let trimmed = pattern.trim();
        let Some((source, flags)) = trimmed.split_once(char::is_whitespace) else {
            return Ok(MediaTypePattern::Exact(trimmed.to_lowercase()));
        };
        let mut builder = RegexBuilder::new(source);
        for flag in flags.trim().chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                _ => continue,
            };
        }
        builder
            .build()
            .map(MediaTypePattern::Regex)
            .map_err(|source| ConfigError::MediaTypePattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>, ConfigError> {
        patterns.iter().map(|p| Self::compile(p.as_ref())).collect()
    }

    /// Media types are compared lowercased.
    pub fn matches(&self, media_type: &str) -> bool {
        let media_type = media_type.to_lowercase();
        match self {
            MediaTypePattern::Exact(exact) => *exact == media_type,
            MediaTypePattern::Regex(regex) => regex.is_match(&media_type),
        }
    }
}
