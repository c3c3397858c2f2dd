use crate::config::Role;
use crate::document::Document;
use crate::error::OperationError;
use crate::location::Location;
use crate::security::MethodSecurity;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

macro_rules! node_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub(crate) usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

node_id!(ApiId, MethodId, ParameterId, RequestBodyId, ResponseId, SchemaId);

/// A handle to any node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Api(ApiId),
    Method(MethodId),
    Parameter(ParameterId),
    RequestBody(RequestBodyId),
    Response(ResponseId),
    Schema(SchemaId),
}

/// The `nodeKind` tag of the serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Api,
    Method,
    Parameter,
    Request,
    Return,
    Type,
    Record,
    Array,
}

// --- APIs and methods ---

/// A named group of methods, located at its entry in the document's `tags`.
#[derive(Debug, Clone, PartialEq)]
pub struct Api {
    pub location: Location,
    pub name: String,
    pub methods: Vec<MethodId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodInput {
    Parameter(ParameterId),
    Body(RequestBodyId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub location: Location,
    /// Path pattern the operation was declared under.
    pub pattern: String,
    /// Lowercase HTTP verb.
    pub http_method: String,
    pub operation_id: String,
    /// The generated method name, unique within its API.
    pub identifier: String,
    /// Parameters and body in calling order.
    pub inputs: Vec<MethodInput>,
    pub response: ResponseId,
    pub security: Option<MethodSecurity>,
}

// --- Inputs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamIn {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParamIn {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(ParamIn::Query),
            "header" => Some(ParamIn::Header),
            "path" => Some(ParamIn::Path),
            "cookie" => Some(ParamIn::Cookie),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamIn::Query => "query",
            ParamIn::Header => "header",
            ParamIn::Path => "path",
            ParamIn::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParamStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matrix" => Some(ParamStyle::Matrix),
            "label" => Some(ParamStyle::Label),
            "form" => Some(ParamStyle::Form),
            "simple" => Some(ParamStyle::Simple),
            "spaceDelimited" => Some(ParamStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParamStyle::PipeDelimited),
            "deepObject" => Some(ParamStyle::DeepObject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub location: Location,
    pub name: String,
    pub param_in: ParamIn,
    pub required: bool,
    pub default: Option<Value>,
    /// Declared style, if any. See [`Parameter::style`] for the effective one.
    pub declared_style: Option<ParamStyle>,
    pub declared_explode: Option<bool>,
    /// First media type of a `content` declaration.
    pub content_media_type: Option<String>,
    pub schema: Option<SchemaId>,
}

impl Parameter {
    pub fn style(&self) -> ParamStyle {
        self.declared_style.unwrap_or(match self.param_in {
            ParamIn::Query | ParamIn::Cookie => ParamStyle::Form,
            ParamIn::Path | ParamIn::Header => ParamStyle::Simple,
        })
    }

    pub fn explode(&self) -> bool {
        self.declared_explode
            .unwrap_or_else(|| self.style() == ParamStyle::Form)
    }

    /// Short code selecting a value serializer: the style initial, with `e`
    /// appended when exploded. Exploded delimited and deep-object styles have
    /// no serializer.
    pub fn serializer_key(&self) -> Option<&'static str> {
        let explode = self.explode();
        Some(match (self.style(), explode) {
            (ParamStyle::Matrix, false) => "m",
            (ParamStyle::Matrix, true) => "me",
            (ParamStyle::Label, false) => "l",
            (ParamStyle::Label, true) => "le",
            (ParamStyle::Form, false) => "f",
            (ParamStyle::Form, true) => "fe",
            (ParamStyle::Simple, false) => "s",
            (ParamStyle::Simple, true) => "se",
            (ParamStyle::SpaceDelimited, false) => "sd",
            (ParamStyle::PipeDelimited, false) => "pd",
            (ParamStyle::DeepObject, false) => "do",
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub location: Location,
    /// Parameter name of the body in generated signatures.
    pub name: String,
    pub required: bool,
    pub preferred_media_types: Vec<String>,
    /// Most preferred media type first; every schema appears under exactly
    /// one key, the most preferred one that carries it.
    pub schemas: IndexMap<String, Vec<SchemaId>>,
    pub default: Option<Value>,
}

impl RequestBody {
    /// The schemas a generated method accepts as its body parameter.
    ///
    /// A client sends the most preferred media type only. A server must
    /// accept all of them, which is impossible with one parameter type when
    /// media types carry different schemas.
    pub fn resolve_types(&self, role: Role) -> Result<&[SchemaId], OperationError> {
        let Some((_, first)) = self.schemas.first() else {
            return Err(OperationError::NoAcceptableBodyMediaType {
                location: self.location.clone(),
            });
        };
        if role == Role::Server && self.schemas.len() > 1 {
            return Err(OperationError::AmbiguousBodySchema {
                location: self.location.clone(),
            });
        }
        Ok(first)
    }
}

// --- Responses ---

/// What one response code carries, as far as the configured accept list goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMedia {
    /// No content, or no acceptable media type.
    Void,
    /// Content whose type is unknown: a wildcard, or media types without a
    /// schema.
    Any,
    /// Acceptable media types that carry a schema, most preferred first.
    Types(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCode {
    pub code: String,
    #[serde(rename = "mediaTypes")]
    pub media: ResponseMedia,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The operation's `responses` map.
    pub location: Location,
    /// Success codes, most preferred first.
    pub preferred: Vec<ResponseCode>,
    /// Distinct schemas reachable through the accepted media types.
    pub schemas: Vec<SchemaId>,
    pub has_any: bool,
    pub has_void: bool,
}

impl Response {
    /// `Accept` header candidates in preference order. With `include_any`,
    /// `*/*` is appended when some code accepts anything or declares it.
    pub fn accept(&self, include_any: bool) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut any = false;
        for code in &self.preferred {
            match &code.media {
                ResponseMedia::Types(types) => {
                    for media_type in types {
                        if !out.contains(media_type) {
                            out.push(media_type.clone());
                        }
                    }
                }
                ResponseMedia::Any => any = true,
                ResponseMedia::Void => {}
            }
        }
        if (any || self.has_any) && include_any {
            out.push("*/*".to_string());
        }
        out
    }
}

// --- Schemas ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(SchemaId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    /// In declaration order.
    pub properties: IndexMap<String, SchemaId>,
    pub required: Vec<String>,
    pub additional_properties: AdditionalProperties,
}

impl RecordSchema {
    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    /// `None` when items are unconstrained.
    pub items: Option<SchemaId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaShape {
    Leaf,
    Record(RecordSchema),
    Array(ArraySchema),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub location: Location,
    pub shape: SchemaShape,
    /// Normalized base type; `None` means any.
    pub base_type: Option<String>,
    pub format: Option<String>,
    pub nullable: bool,
    pub title: Option<String>,
    /// Last pointer segment, for schemas reached through a reference.
    pub implied_name: Option<String>,
    pub all_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub not: Option<SchemaId>,
}

impl Schema {
    pub fn name(&self) -> Option<&str> {
        self.title.as_deref().or(self.implied_name.as_deref())
    }

    pub fn node_kind(&self) -> NodeKind {
        match self.shape {
            SchemaShape::Leaf => NodeKind::Type,
            SchemaShape::Record(_) => NodeKind::Record,
            SchemaShape::Array(_) => NodeKind::Array,
        }
    }

    pub fn as_record(&self) -> Option<&RecordSchema> {
        match &self.shape {
            SchemaShape::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArraySchema> {
        match &self.shape {
            SchemaShape::Array(array) => Some(array),
            _ => None,
        }
    }
}

/// An operation left out of the AST because of an isolated per-method error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedOperation {
    pub operation_id: String,
    pub location: Location,
    pub reason: String,
}

/// The node graph of one generation pass. Nodes are addressed by id; the
/// location index guarantees at most one node per document location.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub(crate) apis: Vec<Api>,
    pub(crate) methods: Vec<Method>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) bodies: Vec<RequestBody>,
    pub(crate) responses: Vec<Response>,
    pub(crate) schemas: Vec<Schema>,
    // Schemas reached through a reference, in discovery order.
    pub(crate) types: Vec<SchemaId>,
    pub(crate) index: HashMap<Location, NodeRef>,
    pub(crate) skipped: Vec<SkippedOperation>,
}

impl Ast {
    pub fn apis(&self) -> impl Iterator<Item = (ApiId, &Api)> {
        self.apis.iter().enumerate().map(|(i, api)| (ApiId(i), api))
    }

    pub fn api(&self, id: ApiId) -> &Api {
        &self.apis[id.0]
    }

    pub fn api_named(&self, name: &str) -> Option<&Api> {
        self.apis.iter().find(|api| api.name == name)
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0]
    }

    pub fn parameter(&self, id: ParameterId) -> &Parameter {
        &self.parameters[id.0]
    }

    pub fn request_body(&self, id: RequestBodyId) -> &RequestBody {
        &self.bodies[id.0]
    }

    pub fn response(&self, id: ResponseId) -> &Response {
        &self.responses[id.0]
    }

    pub fn schema(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0]
    }

    /// Registered (shareable, nameable) schemas.
    pub fn types(&self) -> &[SchemaId] {
        &self.types
    }

    pub fn skipped(&self) -> &[SkippedOperation] {
        &self.skipped
    }

    pub fn node_at(&self, location: &Location) -> Option<NodeRef> {
        self.index.get(location).copied()
    }

    pub fn schema_at(&self, location: &Location) -> Option<SchemaId> {
        match self.node_at(location)? {
            NodeRef::Schema(id) => Some(id),
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Finds a method by its generated identifier across all APIs.
    pub fn find_method(&self, identifier: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.identifier == identifier)
    }

    /// Two schemas match when they are the same node, or share base type and
    /// format and their document values are deep-equal ignoring `$`-prefixed
    /// keys other than `$ref`.
    pub fn schemas_match(&self, document: &Document, a: SchemaId, b: SchemaId) -> bool {
        if a == b {
            return true;
        }
        let (sa, sb) = (self.schema(a), self.schema(b));
        if sa.base_type != sb.base_type || sa.format != sb.format {
            return false;
        }
        match (sa.location.get(document), sb.location.get(document)) {
            (Some(va), Some(vb)) => equal_ignoring_internal_keys(va, vb),
            _ => false,
        }
    }

    pub(crate) fn push_schema(&mut self, schema: Schema) -> SchemaId {
        let id = SchemaId(self.schemas.len());
        self.index.insert(schema.location.clone(), NodeRef::Schema(id));
        self.schemas.push(schema);
        id
    }

    pub(crate) fn schema_mut(&mut self, id: SchemaId) -> &mut Schema {
        &mut self.schemas[id.0]
    }

    pub(crate) fn push_api(&mut self, api: Api) -> ApiId {
        let id = ApiId(self.apis.len());
        self.index.insert(api.location.clone(), NodeRef::Api(id));
        self.apis.push(api);
        id
    }

    pub(crate) fn api_mut(&mut self, id: ApiId) -> &mut Api {
        &mut self.apis[id.0]
    }

    pub(crate) fn push_method(&mut self, method: Method) -> MethodId {
        let id = MethodId(self.methods.len());
        self.index.insert(method.location.clone(), NodeRef::Method(id));
        self.methods.push(method);
        id
    }

    pub(crate) fn push_parameter(&mut self, parameter: Parameter) -> ParameterId {
        let id = ParameterId(self.parameters.len());
        self.index
            .insert(parameter.location.clone(), NodeRef::Parameter(id));
        self.parameters.push(parameter);
        id
    }

    pub(crate) fn parameter_mut(&mut self, id: ParameterId) -> &mut Parameter {
        &mut self.parameters[id.0]
    }

    pub(crate) fn push_body(&mut self, body: RequestBody) -> RequestBodyId {
        let id = RequestBodyId(self.bodies.len());
        self.index
            .insert(body.location.clone(), NodeRef::RequestBody(id));
        self.bodies.push(body);
        id
    }

    pub(crate) fn body_mut(&mut self, id: RequestBodyId) -> &mut RequestBody {
        &mut self.bodies[id.0]
    }

    pub(crate) fn push_response(&mut self, response: Response) -> ResponseId {
        let id = ResponseId(self.responses.len());
        self.index
            .insert(response.location.clone(), NodeRef::Response(id));
        self.responses.push(response);
        id
    }

    pub(crate) fn response_mut(&mut self, id: ResponseId) -> &mut Response {
        &mut self.responses[id.0]
    }
}

/// Maps legacy type tags onto `string` plus a format.
pub(crate) fn legacy_type(name: &str) -> (&str, Option<&'static str>) {
    match name {
        "date" => ("string", Some("date")),
        "dateTime" => ("string", Some("date-time")),
        "password" => ("string", Some("password")),
        other => (other, None),
    }
}

/// `type` and `format` of a schema object with legacy tags rewritten. `None`
/// when `type` is neither a string nor a list.
fn normalized_type(map: &Map<String, Value>) -> Option<(Value, Option<Value>)> {
    let mut implied = None;
    let mut rewrite = |name: &str| {
        let (base, format) = legacy_type(name);
        if format.is_some() {
            implied = format;
        }
        Value::String(base.to_string())
    };
    let ty = match map.get("type")? {
        Value::String(name) => rewrite(name),
        Value::Array(list) => Value::Array(
            list.iter()
                .map(|v| match v.as_str() {
                    Some(name) => rewrite(name),
                    None => v.clone(),
                })
                .collect(),
        ),
        _ => return None,
    };
    let format = implied
        .map(|f| Value::String(f.to_string()))
        .or_else(|| map.get("format").cloned());
    Some((ty, format))
}

fn equal_ignoring_internal_keys(a: &Value, b: &Value) -> bool {
    let internal = |key: &String| key.starts_with('$') && key != "$ref";
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            let (na, nb) = (normalized_type(ma), normalized_type(mb));
            let typed = na.is_some() && nb.is_some();
            if typed && na != nb {
                return false;
            }
            let compared =
                |k: &&String| !internal(k) && !(typed && (*k == "type" || *k == "format"));
            let ka: Vec<&String> = ma.keys().filter(compared).collect();
            let kb: Vec<&String> = mb.keys().filter(compared).collect();
            ka.len() == kb.len()
                && ka.iter().all(|k| match (ma.get(*k), mb.get(*k)) {
                    (Some(va), Some(vb)) => equal_ignoring_internal_keys(va, vb),
                    _ => false,
                })
        }
        (Value::Array(xa), Value::Array(xb)) => {
            xa.len() == xb.len()
                && xa
                    .iter()
                    .zip(xb)
                    .all(|(va, vb)| equal_ignoring_internal_keys(va, vb))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(param_in: ParamIn, style: Option<ParamStyle>, explode: Option<bool>) -> Parameter {
        Parameter {
            location: Location::root(),
            name: "p".to_string(),
            param_in,
            required: false,
            default: None,
            declared_style: style,
            declared_explode: explode,
            content_media_type: None,
            schema: None,
        }
    }

    #[test]
    fn test_serializer_key_defaults() {
        assert_eq!(parameter(ParamIn::Query, None, None).serializer_key(), Some("fe"));
        assert_eq!(parameter(ParamIn::Path, None, None).serializer_key(), Some("s"));
        assert_eq!(
            parameter(ParamIn::Header, None, Some(true)).serializer_key(),
            Some("se")
        );
        assert_eq!(
            parameter(ParamIn::Query, Some(ParamStyle::DeepObject), Some(false)).serializer_key(),
            Some("do")
        );
        assert_eq!(
            parameter(ParamIn::Query, Some(ParamStyle::PipeDelimited), None).serializer_key(),
            Some("pd")
        );
        assert_eq!(
            parameter(ParamIn::Query, Some(ParamStyle::PipeDelimited), Some(true)).serializer_key(),
            None
        );
    }

    #[test]
    fn test_accept_union_and_wildcard() {
        let response = Response {
            location: Location::root(),
            preferred: vec![
                ResponseCode {
                    code: "200".into(),
                    media: ResponseMedia::Types(vec!["application/json".into()]),
                },
                ResponseCode {
                    code: "201".into(),
                    media: ResponseMedia::Types(vec!["text/plain".into(), "application/json".into()]),
                },
                ResponseCode { code: "202".into(), media: ResponseMedia::Any },
            ],
            schemas: vec![],
            has_any: true,
            has_void: false,
        };
        assert_eq!(response.accept(false), vec!["application/json", "text/plain"]);
        assert_eq!(
            response.accept(true),
            vec!["application/json", "text/plain", "*/*"]
        );
    }

    #[test]
    fn test_internal_keys_ignored_in_comparison() {
        let a = serde_json::json!({ "type": "string", "$comment": "x" });
        let b = serde_json::json!({ "type": "string" });
        let c = serde_json::json!({ "items": { "$ref": "#/a" } });
        let d = serde_json::json!({ "items": { "$ref": "#/b" } });
        assert!(equal_ignoring_internal_keys(&a, &b));
        assert!(!equal_ignoring_internal_keys(&c, &d));
    }

    #[test]
    fn test_legacy_type_tags_compare_as_rewritten() {
        let legacy = serde_json::json!({ "type": "dateTime", "description": "when" });
        let modern =
            serde_json::json!({ "type": "string", "format": "date-time", "description": "when" });
        let date = serde_json::json!({ "type": "string", "format": "date", "description": "when" });
        assert!(equal_ignoring_internal_keys(&legacy, &modern));
        assert!(!equal_ignoring_internal_keys(&legacy, &date));

        let listed = serde_json::json!({ "type": ["password", "null"] });
        let expanded = serde_json::json!({ "type": ["string", "null"], "format": "password" });
        assert!(equal_ignoring_internal_keys(&listed, &expanded));
    }
}
