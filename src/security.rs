//! Classification of the security requirements that apply to one operation.

use crate::error::ResolverError;
use crate::location::Location;
use crate::resolver::Resolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpAuth {
    pub basic: bool,
    pub bearer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
}

/// Names of API keys, grouped by where they travel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    pub header: Vec<String>,
    pub query: Vec<String>,
    pub cookie: Vec<String>,
}

impl ApiKeys {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.query.is_empty() && self.cookie.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSecurity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_auth: Option<HttpAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKeys>,
}

/// Combines the document-level and operation-level requirements of the
/// operation at `operation`. Returns `None` when neither declares any.
/// Labels without a matching scheme, and scheme types other than `apiKey` and
/// `http`, are ignored.
pub fn extract(
    resolver: &Resolver,
    operation: &Location,
) -> Result<Option<MethodSecurity>, ResolverError> {
    let document = resolver.document()?;
    let op = operation.get(document).unwrap_or(&Value::Null);
    let requirements: Vec<&Value> = [document.get("security"), op.get("security")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
        .collect();
    if requirements.is_empty() {
        return Ok(None);
    }

    let schemes = Location::new(["components", "securitySchemes"]);
    let mut security = MethodSecurity::default();
    let mut keys = ApiKeys::default();
    for requirement in requirements {
        let Some(labels) = requirement.as_object() else {
            continue;
        };
        for label in labels.keys() {
            let Some(raw) = schemes.child(label.as_str()).get(document) else {
                log::debug!("security requirement `{label}` has no scheme");
                continue;
            };
            let scheme = resolver.resolve(raw)?.value;
            let field = |name: &str| scheme.get(name).and_then(Value::as_str);
            match field("type") {
                Some("apiKey") => {
                    let Some(name) = field("name") else {
                        continue;
                    };
                    let names = match field("in") {
                        Some("header") => &mut keys.header,
                        Some("query") => &mut keys.query,
                        Some("cookie") => &mut keys.cookie,
                        _ => continue,
                    };
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
                Some("http") => {
                    let auth = security.http_auth.get_or_insert_with(HttpAuth::default);
                    match field("scheme").map(str::to_ascii_lowercase).as_deref() {
                        Some("basic") => auth.basic = true,
                        Some("bearer") => {
                            auth.bearer = true;
                            if let Some(format) = field("bearerFormat") {
                                auth.bearer_format = Some(format.to_string());
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }
    if !keys.is_empty() {
        security.api_key = Some(keys);
    }
    Ok(Some(security))
}
