//! A plain nested form of the [`Ast`], and hydration back from it.
//!
//! The serialized form records only what resolution decided (which inputs a
//! method takes and in what order, which media types and response codes were
//! preferred). Everything else is read back from the document, so hydrating
//! against the same document yields an equivalent AST without ranking again.

use crate::ast::{Ast, Method, MethodId, MethodInput, NodeKind, ResponseCode};
use crate::builder::{synthesize_operation_id, Builder};
use crate::config::Config;
use crate::error::OalnError;
use crate::location::Location;
use crate::resolver::Resolver;
use crate::security;
use crate::utils::set_case;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedAst {
    pub apis: Vec<SerializedApi>,
    pub types: Vec<SerializedType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedApi {
    pub node_kind: NodeKind,
    pub location: Location,
    pub name: String,
    pub methods: Vec<SerializedMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedMethod {
    pub node_kind: NodeKind,
    pub location: Location,
    pub pattern: String,
    /// Inputs in calling order.
    pub parameters: Vec<SerializedInput>,
    pub responses: SerializedResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nodeKind", rename_all = "lowercase")]
pub enum SerializedInput {
    Parameter {
        location: Location,
    },
    Request {
        location: Location,
        name: String,
        #[serde(rename = "preferredMediaTypes")]
        preferred_media_types: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedResponse {
    pub node_kind: NodeKind,
    pub location: Location,
    pub preferred_responses: Vec<ResponseCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedType {
    pub node_kind: NodeKind,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Ast {
    #[must_use]
    pub fn to_serialized(&self) -> SerializedAst {
        let apis = self
            .apis()
            .map(|(_, api)| SerializedApi {
                node_kind: NodeKind::Api,
                location: api.location.clone(),
                name: api.name.clone(),
                methods: api.methods.iter().map(|id| self.serialize_method(*id)).collect(),
            })
            .collect();
        let types = self
            .types()
            .iter()
            .map(|id| {
                let schema = self.schema(*id);
                SerializedType {
                    node_kind: schema.node_kind(),
                    location: schema.location.clone(),
                    name: schema.name().map(str::to_string),
                }
            })
            .collect();
        SerializedAst { apis, types }
    }

    fn serialize_method(&self, id: MethodId) -> SerializedMethod {
        let method = self.method(id);
        let parameters = method
            .inputs
            .iter()
            .map(|input| match input {
                MethodInput::Parameter(p) => SerializedInput::Parameter {
                    location: self.parameter(*p).location.clone(),
                },
                MethodInput::Body(b) => {
                    let body = self.request_body(*b);
                    SerializedInput::Request {
                        location: body.location.clone(),
                        name: body.name.clone(),
                        preferred_media_types: body.preferred_media_types.clone(),
                    }
                }
            })
            .collect();
        let response = self.response(method.response);
        SerializedMethod {
            node_kind: NodeKind::Method,
            location: method.location.clone(),
            pattern: method.pattern.clone(),
            parameters,
            responses: SerializedResponse {
                node_kind: NodeKind::Return,
                location: response.location.clone(),
                preferred_responses: response.preferred.clone(),
            },
        }
    }
}

/// Rebuilds an AST from its serialized form against the document it was
/// produced from. Types are registered first, in their recorded order.
///
/// # Errors
/// Fails when a recorded location no longer resolves, or a schema found there
/// cannot be classified.
pub fn hydrate(
    resolver: &Resolver,
    serialized: &SerializedAst,
    config: &Config,
) -> Result<Ast, OalnError> {
    let mut builder = Builder::new(resolver, config)?;
    for ty in &serialized.types {
        builder.register_type(&ty.location)?;
    }
    for api in &serialized.apis {
        let api_id = builder.api_at(&api.location)?;
        for method in &api.methods {
            let method_id = hydrate_method(&mut builder, resolver, config, method)?;
            builder.ast.api_mut(api_id).methods.push(method_id);
        }
    }
    let ast = builder.finish();
    log::debug!("hydrated {} nodes", ast.node_count());
    Ok(ast)
}

fn hydrate_method(
    builder: &mut Builder<'_>,
    resolver: &Resolver,
    config: &Config,
    method: &SerializedMethod,
) -> Result<MethodId, OalnError> {
    let (operation, location) = resolver.resolve_at(&method.location)?;
    let verb = location.last().unwrap_or_default().to_ascii_lowercase();
    let operation_id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map_or_else(|| synthesize_operation_id(&verb, &method.pattern), str::to_string);

    let mut inputs = Vec::with_capacity(method.parameters.len());
    for input in &method.parameters {
        match input {
            SerializedInput::Parameter { location } => {
                let (value, location) = resolver.resolve_at(location)?;
                inputs.push(MethodInput::Parameter(builder.parameter_node(&location, value)?));
            }
            SerializedInput::Request {
                location,
                name,
                preferred_media_types,
            } => {
                let (value, location) = resolver.resolve_at(location)?;
                let body =
                    builder.body_node(&location, value, name.clone(), preferred_media_types.clone())?;
                inputs.push(MethodInput::Body(body));
            }
        }
    }
    let response = builder.response_node(
        method.responses.location.clone(),
        method.responses.preferred_responses.clone(),
    )?;
    let security = security::extract(resolver, &location)?;
    Ok(builder.ast.push_method(Method {
        identifier: set_case(&operation_id, config.operation_case),
        location,
        pattern: method.pattern.clone(),
        http_method: verb,
        operation_id,
        inputs,
        response,
        security,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inputs_are_tagged_by_node_kind() {
        let input = SerializedInput::Request {
            location: Location::new(["paths", "/a", "post", "requestBody"]),
            name: "body".to_string(),
            preferred_media_types: vec!["application/json".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "nodeKind": "request",
                "location": ["paths", "/a", "post", "requestBody"],
                "name": "body",
                "preferredMediaTypes": ["application/json"]
            })
        );
    }

    #[test]
    fn test_response_codes_keep_media_classification() {
        let response: SerializedResponse = serde_json::from_value(json!({
            "nodeKind": "return",
            "location": ["paths", "/a", "get", "responses"],
            "preferredResponses": [
                { "code": "200", "mediaTypes": { "types": ["application/json"] } },
                { "code": "204", "mediaTypes": "void" }
            ]
        }))
        .unwrap();
        assert_eq!(response.preferred_responses.len(), 2);
        assert_eq!(
            response.preferred_responses[1].media,
            crate::ast::ResponseMedia::Void
        );
    }
}
