//! Walks the normalized document and builds the [`Ast`].
//!
//! Every node is keyed by the document location it was built from, so a
//! location reached twice (through two references, or from two operations)
//! yields the same node. Schemas are allocated before their children are
//! visited, which lets self-referencing schemas resolve to their own id.

use crate::ast::{
    legacy_type, AdditionalProperties, Api, ApiId, ArraySchema, Ast, Method, MethodId,
    MethodInput, NodeRef, ParamIn, ParamStyle, Parameter, ParameterId, RecordSchema,
    RequestBody, RequestBodyId, Response, ResponseCode, ResponseId, ResponseMedia, Schema,
    SchemaId, SchemaShape, SkippedOperation,
};
use crate::config::{Config, MediaTypePattern};
use crate::document::{Document, HTTP_METHODS};
use crate::error::{OalnError, ResolverError, SchemaError};
use crate::location::Location;
use crate::preference::{
    compare_inputs, preferred_media_types, preferred_response_codes, InputOrder,
};
use crate::resolver::Resolver;
use crate::security;
use crate::utils::{set_case, snake_case};
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Map, Value};

/// Candidate names for the body parameter, first unused wins.
const BODY_NAMES: [&str; 7] = [
    "body",
    "reqBody",
    "_body",
    "_reqBody",
    "requestBody",
    "_requestBody",
    "_MaybeYouShouldReThinkYourParameterNames",
];

/// Request body extension overriding the body parameter name.
pub const BODY_NAME_EXTENSION: &str = "x-body-name";

/// Operation extensions naming the API group when no tag is declared.
const CONTROLLER_EXTENSIONS: [&str; 2] = ["x-router-controller", "x-swagger-router-controller"];

/// Canonicalizes the resolver's document, then builds the AST.
///
/// # Errors
/// Resolution and schema-shape errors abort the pass. Request body errors
/// only skip the offending operation, which is then listed in
/// [`Ast::skipped`].
pub fn build(resolver: &mut Resolver, config: &Config) -> Result<Ast, OalnError> {
    canonicalize(resolver, config)?;
    let mut builder = Builder::new(resolver, config)?;
    builder.walk()?;
    Ok(builder.finish())
}

/// Fills in every missing `operationId` and declares every API group name in
/// the document's `tags`, so that each operation and API has a stable
/// document location. Returns how many values were written.
pub fn canonicalize(resolver: &mut Resolver, config: &Config) -> Result<usize, OalnError> {
    let mut ids: IndexMap<Location, String> = IndexMap::new();
    let mut groups: IndexSet<String> = IndexSet::new();
    let mut declared: IndexSet<String> = IndexSet::new();
    {
        let document = resolver.document()?;
        for (pattern, item_location) in path_items(resolver)? {
            let Some(item) = item_location.get(document) else {
                continue;
            };
            for verb in operation_keys(item) {
                let Some(operation) = item.get(&verb) else {
                    continue;
                };
                let operation_id = match operation.get("operationId").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => {
                        let id = synthesize_operation_id(&verb, &pattern);
                        let slot = item_location.join([verb.as_str(), "operationId"]);
                        ids.entry(slot).or_insert_with(|| id.clone());
                        id
                    }
                };
                if !config.is_omitted(&operation_id) {
                    groups.insert(api_name(operation, &pattern));
                }
            }
        }
        if let Some(Value::Array(tags)) = document.get("tags") {
            for tag in tags {
                if let Some(name) = resolver.resolve(tag)?.value.get("name").and_then(Value::as_str) {
                    declared.insert(name.to_string());
                }
            }
        }
    }

    let document = resolver.document_mut()?;
    let mut written = 0;
    for (slot, id) in ids {
        if slot.set(document, Value::String(id)) {
            written += 1;
        }
    }
    let missing: Vec<String> = groups
        .into_iter()
        .filter(|name| !declared.contains(name))
        .collect();
    if !missing.is_empty() {
        let tags = Location::new(["tags"]);
        if !matches!(tags.get(document), Some(Value::Array(_))) {
            tags.set(document, Value::Array(Vec::new()));
        }
        if let Some(Value::Array(list)) = tags.get_mut(document) {
            for name in missing {
                log::debug!("declaring tag `{name}`");
                list.push(json!({ "name": name }));
                written += 1;
            }
        }
    }
    Ok(written)
}

/// `snake_case("<verb> <pattern>")`, e.g. `get_items_id` for `get /items/{id}`.
pub fn synthesize_operation_id(verb: &str, pattern: &str) -> String {
    snake_case(&format!("{verb} {pattern}"))
}

/// The API group of an operation: its first tag, a router-controller
/// extension, or a name derived from the path pattern.
pub fn api_name(operation: &Value, pattern: &str) -> String {
    let first_tag = operation
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.first())
        .and_then(Value::as_str);
    if let Some(tag) = first_tag {
        return tag.to_string();
    }
    for extension in CONTROLLER_EXTENSIONS {
        if let Some(controller) = operation.get(extension).and_then(Value::as_str) {
            return controller.to_string();
        }
    }
    let derived = snake_case(&pattern.replacen('/', "_", 1));
    if derived.is_empty() {
        "root".to_string()
    } else {
        derived
    }
}

/// Each path pattern with the location of its (possibly referenced) item.
fn path_items(resolver: &Resolver) -> Result<Vec<(String, Location)>, ResolverError> {
    let document = resolver.document()?;
    let Some(Value::Object(paths)) = document.get("paths") else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(paths.len());
    for (pattern, raw) in paths {
        if !raw.is_object() {
            continue;
        }
        let location = resolver
            .resolve(raw)?
            .location()
            .unwrap_or_else(|| Location::new(["paths", pattern.as_str()]));
        out.push((pattern.clone(), location));
    }
    Ok(out)
}

fn operation_keys(item: &Value) -> Vec<String> {
    let Some(map) = item.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(key, value)| {
            value.is_object() && HTTP_METHODS.contains(&key.to_ascii_lowercase().as_str())
        })
        .map(|(key, _)| key.clone())
        .collect()
}

struct ParamMeta<'r> {
    location: Location,
    value: &'r Value,
    required: bool,
    has_default: bool,
    param_in: ParamIn,
}

struct BodyMeta<'r> {
    location: Location,
    value: &'r Value,
    name: String,
    required: bool,
    preferred: Vec<String>,
    has_default: bool,
}

enum PendingInput<'r> {
    Parameter(ParamMeta<'r>),
    Body(BodyMeta<'r>),
}

impl PendingInput<'_> {
    fn order(&self) -> InputOrder {
        match self {
            PendingInput::Parameter(p) => InputOrder {
                required: p.required,
                has_default: p.has_default,
                location: Some(p.param_in),
            },
            PendingInput::Body(b) => InputOrder {
                required: b.required,
                has_default: b.has_default,
                location: None,
            },
        }
    }
}

struct Classified {
    base_type: Option<String>,
    format: Option<String>,
    nullable: bool,
    shape: SchemaShape,
}

pub(crate) struct Builder<'r> {
    resolver: &'r Resolver,
    document: &'r Document,
    config: &'r Config,
    // Compiled `config.request_media_types`.
    request_patterns: Vec<MediaTypePattern>,
    // Compiled `config.accept_media_types`.
    accept_patterns: Vec<MediaTypePattern>,
    pub(crate) ast: Ast,
}

impl<'r> Builder<'r> {
    pub(crate) fn new(resolver: &'r Resolver, config: &'r Config) -> Result<Self, OalnError> {
        Ok(Builder {
            resolver,
            document: resolver.document()?,
            config,
            request_patterns: config.request_patterns()?,
            accept_patterns: config.accept_patterns()?,
            ast: Ast::default(),
        })
    }

    pub(crate) fn finish(self) -> Ast {
        self.ast
    }

    fn walk(&mut self) -> Result<(), OalnError> {
        for (pattern, item_location) in path_items(self.resolver)? {
            let Some(item) = item_location.get(self.document) else {
                continue;
            };
            for verb in operation_keys(item) {
                self.visit_operation(&pattern, &item_location, &verb)?;
            }
        }
        if self.config.all_models {
            self.register_all_models()?;
        }
        Ok(())
    }

    fn register_all_models(&mut self) -> Result<(), OalnError> {
        let schemas = Location::new(["components", "schemas"]);
        let Some(Value::Object(entries)) = schemas.get(self.document) else {
            return Ok(());
        };
        for name in entries.keys() {
            self.register_type(&schemas.child(name.as_str()))?;
        }
        Ok(())
    }

    /// Resolves the schema at `location` as if it had been referenced.
    pub(crate) fn register_type(&mut self, location: &Location) -> Result<SchemaId, OalnError> {
        let reference = json!({ "$ref": location.to_pointer() });
        self.resolve_schema(&reference, location.clone())
    }

    fn visit_operation(
        &mut self,
        pattern: &str,
        item_location: &Location,
        verb: &str,
    ) -> Result<(), OalnError> {
        let op_location = item_location.child(verb);
        let Some(operation) = op_location.get(self.document) else {
            return Ok(());
        };
        let operation_id = operation
            .get("operationId")
            .and_then(Value::as_str)
            .map_or_else(|| synthesize_operation_id(verb, pattern), str::to_string);
        if self.config.is_omitted(&operation_id) {
            log::debug!("omitting operation `{operation_id}`");
            return Ok(());
        }
        let api = self.api_named(&api_name(operation, pattern))?;
        let identifier = set_case(&operation_id, self.config.operation_case);
        let duplicate = self
            .ast
            .api(api)
            .methods
            .iter()
            .any(|m| self.ast.method(*m).identifier == identifier);
        if duplicate {
            log::debug!("skipping {op_location}: `{identifier}` already exists on its API");
            return Ok(());
        }
        log::debug!("visiting {} {pattern}", verb.to_ascii_uppercase());
        match self.build_method(pattern, verb, &op_location, operation, &operation_id, identifier) {
            Ok(method) => {
                self.ast.api_mut(api).methods.push(method);
                Ok(())
            }
            Err(OalnError::Operation(error)) => {
                log::warn!("skipping operation `{operation_id}`: {error}");
                self.ast.skipped.push(SkippedOperation {
                    operation_id,
                    location: op_location,
                    reason: error.to_string(),
                });
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// The API for a group name, created at its `tags` entry on first use.
    fn api_named(&mut self, name: &str) -> Result<ApiId, OalnError> {
        if let Some((id, _)) = self.ast.apis().find(|(_, api)| api.name == name) {
            return Ok(id);
        }
        let resolver = self.resolver;
        if let Some(Value::Array(tags)) = self.document.get("tags") {
            for (idx, tag) in tags.iter().enumerate() {
                let resolved = resolver.resolve(tag)?;
                if resolved.value.get("name").and_then(Value::as_str) == Some(name) {
                    let location = resolved
                        .location()
                        .unwrap_or_else(|| Location::new(["tags".to_string(), idx.to_string()]));
                    return self.api_at(&location);
                }
            }
        }
        Err(ResolverError::UnresolvablePointer {
            pointer: format!("#/tags (no tag named `{name}`)"),
        }
        .into())
    }

    pub(crate) fn api_at(&mut self, location: &Location) -> Result<ApiId, OalnError> {
        if let Some(NodeRef::Api(id)) = self.ast.node_at(location) {
            return Ok(id);
        }
        let (tag, location) = self.resolver.resolve_at(location)?;
        let name = tag
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(self.ast.push_api(Api {
            location,
            name,
            methods: Vec::new(),
        }))
    }

    fn build_method(
        &mut self,
        pattern: &str,
        verb: &str,
        op_location: &Location,
        operation: &'r Value,
        operation_id: &str,
        identifier: String,
    ) -> Result<MethodId, OalnError> {
        let item_location = op_location.parent().unwrap_or_default();
        let params = self.operation_params(&item_location, op_location)?;
        let names: Vec<&str> = params
            .iter()
            .filter_map(|p| p.value.get("name").and_then(Value::as_str))
            .collect();
        let body = self.body_meta(operation, op_location, &names)?;
        let preferred = self.preferred_responses(verb, operation)?;

        let mut pending: Vec<PendingInput<'r>> =
            params.into_iter().map(PendingInput::Parameter).collect();
        if let Some(body) = body {
            pending.push(PendingInput::Body(body));
        }
        pending.sort_by(|a, b| compare_inputs(&a.order(), &b.order()));

        let mut inputs = Vec::with_capacity(pending.len());
        for input in pending {
            match input {
                PendingInput::Parameter(meta) => {
                    let id = self.parameter_node(&meta.location, meta.value)?;
                    inputs.push(MethodInput::Parameter(id));
                }
                PendingInput::Body(meta) => {
                    let id = self.body_node(&meta.location, meta.value, meta.name, meta.preferred)?;
                    self.ast.request_body(id).resolve_types(self.config.role)?;
                    inputs.push(MethodInput::Body(id));
                }
            }
        }

        let response = self.response_node(op_location.child("responses"), preferred)?;
        let security = security::extract(self.resolver, op_location)?;
        Ok(self.ast.push_method(Method {
            location: op_location.clone(),
            pattern: pattern.to_string(),
            http_method: verb.to_ascii_lowercase(),
            operation_id: operation_id.to_string(),
            identifier,
            inputs,
            response,
            security,
        }))
    }

    /// Path item parameters overridden by operation parameters with the same
    /// `in` and `name`.
    fn operation_params(
        &self,
        item_location: &Location,
        op_location: &Location,
    ) -> Result<Vec<ParamMeta<'r>>, OalnError> {
        let resolver = self.resolver;
        let mut merged: IndexMap<String, ParamMeta<'r>> = IndexMap::new();
        for owner in [item_location, op_location] {
            let list_location = owner.child("parameters");
            let Some(Value::Array(list)) = list_location.get(self.document) else {
                continue;
            };
            for (idx, raw) in list.iter().enumerate() {
                let resolved = resolver.resolve(raw)?;
                let location = resolved
                    .location()
                    .unwrap_or_else(|| list_location.child(idx.to_string()));
                let value = resolved.value;
                let Some((name, param_in)) = param_identity(value) else {
                    log::warn!("ignoring parameter without a valid `name` and `in` at {location}");
                    continue;
                };
                let meta = ParamMeta {
                    required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
                    has_default: self.parameter_default(value)?.is_some(),
                    location,
                    value,
                    param_in,
                };
                merged.insert(format!("{}:{name}", param_in.as_str()), meta);
            }
        }
        Ok(merged.into_values().collect())
    }

    fn parameter_default(&self, param: &Value) -> Result<Option<Value>, OalnError> {
        let schema = match param.get("content").and_then(Value::as_object) {
            Some(content) => content.values().next().and_then(|media| media.get("schema")),
            None => param.get("schema"),
        };
        let Some(schema) = schema else {
            return Ok(None);
        };
        Ok(self.resolver.resolve(schema)?.value.get("default").cloned())
    }

    fn body_meta(
        &self,
        operation: &'r Value,
        op_location: &Location,
        param_names: &[&str],
    ) -> Result<Option<BodyMeta<'r>>, OalnError> {
        let resolver = self.resolver;
        let Some(raw) = operation.get("requestBody") else {
            return Ok(None);
        };
        let resolved = resolver.resolve(raw)?;
        let value = resolved.value;
        let Some(content) = value.get("content").and_then(Value::as_object) else {
            return Ok(None);
        };
        let location = resolved
            .location()
            .unwrap_or_else(|| op_location.child("requestBody"));
        let name = match value.get(BODY_NAME_EXTENSION).and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => BODY_NAMES
                .iter()
                .find(|candidate| !param_names.contains(candidate))
                .unwrap_or(&BODY_NAMES[0])
                .to_string(),
        };
        let preferred = preferred_media_types(content.keys(), &self.request_patterns);
        let has_default = self.body_default(&location, content, &preferred)?.is_some();
        Ok(Some(BodyMeta {
            location,
            value,
            name,
            required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
            preferred,
            has_default,
        }))
    }

    /// The default of the body schema, when the preferred media types lead to
    /// exactly one distinct schema.
    fn body_default(
        &self,
        location: &Location,
        content: &Map<String, Value>,
        preferred: &[String],
    ) -> Result<Option<Value>, OalnError> {
        let mut distinct: IndexMap<Location, &Value> = IndexMap::new();
        for media_type in preferred {
            let Some(schema) = content.get(media_type).and_then(|m| m.get("schema")) else {
                continue;
            };
            let resolved = self.resolver.resolve(schema)?;
            let schema_location = resolved.location().unwrap_or_else(|| {
                location.join(["content", media_type.as_str(), "schema"])
            });
            distinct.entry(schema_location).or_insert(resolved.value);
        }
        if distinct.len() != 1 {
            return Ok(None);
        }
        Ok(distinct
            .first()
            .and_then(|(_, schema)| schema.get("default"))
            .cloned())
    }

    fn preferred_responses(
        &self,
        verb: &str,
        operation: &Value,
    ) -> Result<Vec<ResponseCode>, OalnError> {
        let Some(responses) = operation.get("responses").and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for code in preferred_response_codes(verb, responses.keys()) {
            let Some(raw) = responses.get(&code) else {
                continue;
            };
            let response = self.resolver.resolve(raw)?.value;
            let media = match response.get("content").and_then(Value::as_object) {
                None => ResponseMedia::Void,
                Some(content) => {
                    let acceptable = preferred_media_types(content.keys(), &self.accept_patterns);
                    let typed: Vec<String> = acceptable
                        .iter()
                        .filter(|mt| content.get(*mt).and_then(|m| m.get("schema")).is_some())
                        .cloned()
                        .collect();
                    if !typed.is_empty() {
                        ResponseMedia::Types(typed)
                    } else if !acceptable.is_empty() || content.contains_key("*/*") {
                        ResponseMedia::Any
                    } else {
                        ResponseMedia::Void
                    }
                }
            };
            out.push(ResponseCode { code, media });
        }
        Ok(out)
    }

    pub(crate) fn parameter_node(
        &mut self,
        location: &Location,
        value: &Value,
    ) -> Result<ParameterId, OalnError> {
        if let Some(NodeRef::Parameter(id)) = self.ast.node_at(location) {
            return Ok(id);
        }
        let Some((name, param_in)) = param_identity(value) else {
            return Err(ResolverError::UnresolvablePointer {
                pointer: location.to_pointer(),
            }
            .into());
        };
        let default = self.parameter_default(value)?;
        let id = self.ast.push_parameter(Parameter {
            location: location.clone(),
            name,
            param_in,
            required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
            default,
            declared_style: value
                .get("style")
                .and_then(Value::as_str)
                .and_then(ParamStyle::parse),
            declared_explode: value.get("explode").and_then(Value::as_bool),
            content_media_type: value
                .get("content")
                .and_then(Value::as_object)
                .and_then(|content| content.keys().next().cloned()),
            schema: None,
        });
        let schema = self.resolve_header_like(value, location)?;
        self.ast.parameter_mut(id).schema = schema;
        Ok(id)
    }

    pub(crate) fn body_node(
        &mut self,
        location: &Location,
        value: &Value,
        name: String,
        preferred: Vec<String>,
    ) -> Result<RequestBodyId, OalnError> {
        if let Some(NodeRef::RequestBody(id)) = self.ast.node_at(location) {
            return Ok(id);
        }
        let empty = Map::new();
        let content = value
            .get("content")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let default = self.body_default(location, content, &preferred)?;
        let id = self.ast.push_body(RequestBody {
            location: location.clone(),
            name,
            required: value.get("required").and_then(Value::as_bool).unwrap_or(false),
            preferred_media_types: preferred.clone(),
            schemas: IndexMap::new(),
            default,
        });

        let mut by_media: IndexMap<&str, SchemaId> = IndexMap::new();
        for (media_type, media) in content {
            let media_location = location.join(["content", media_type.as_str()]);
            if let Some(schema) = self.resolve_media(media, &media_location)? {
                by_media.insert(media_type.as_str(), schema);
            }
        }
        let mut seen = Vec::new();
        let mut schemas: IndexMap<String, Vec<SchemaId>> = IndexMap::new();
        for media_type in &preferred {
            let Some(schema) = by_media.get(media_type.as_str()) else {
                continue;
            };
            if self.push_distinct(&mut seen, *schema) {
                schemas.entry(media_type.clone()).or_default().push(*schema);
            }
        }
        self.ast.body_mut(id).schemas = schemas;
        Ok(id)
    }

    pub(crate) fn response_node(
        &mut self,
        location: Location,
        preferred: Vec<ResponseCode>,
    ) -> Result<ResponseId, OalnError> {
        if let Some(NodeRef::Response(id)) = self.ast.node_at(&location) {
            return Ok(id);
        }
        let resolver = self.resolver;
        let has_void = preferred.is_empty()
            || preferred.iter().any(|c| c.media == ResponseMedia::Void);
        let mut has_any = preferred.iter().any(|c| c.media == ResponseMedia::Any);
        let id = self.ast.push_response(Response {
            location: location.clone(),
            preferred: preferred.clone(),
            schemas: Vec::new(),
            has_any,
            has_void,
        });

        let mut schemas = Vec::new();
        for code in &preferred {
            let code_location = location.child(code.code.as_str());
            let Some(raw) = code_location.get(self.document) else {
                continue;
            };
            let resolved = resolver.resolve(raw)?;
            let response_location = resolved.location().unwrap_or(code_location);
            let response = resolved.value;
            if let Some(Value::Object(content)) = response.get("content") {
                // A declared wildcard accepts anything next to typed media.
                has_any |= content.contains_key("*/*");
                for (media_type, media) in content {
                    let media_location = response_location.join(["content", media_type.as_str()]);
                    let schema = self.resolve_media(media, &media_location)?;
                    let accepted = matches!(&code.media, ResponseMedia::Types(types) if types.contains(media_type));
                    if let (Some(schema), true) = (schema, accepted) {
                        self.push_distinct(&mut schemas, schema);
                    }
                }
            }
            if let Some(Value::Object(headers)) = response.get("headers") {
                for (name, raw_header) in headers {
                    let header = resolver.resolve(raw_header)?;
                    let header_location = header
                        .location()
                        .unwrap_or_else(|| response_location.join(["headers", name.as_str()]));
                    self.resolve_header_like(header.value, &header_location)?;
                }
            }
        }
        let response = self.ast.response_mut(id);
        response.schemas = schemas;
        response.has_any = has_any;
        Ok(id)
    }

    /// Adds `schema` unless an equivalent one is already present.
    fn push_distinct(&self, set: &mut Vec<SchemaId>, schema: SchemaId) -> bool {
        if set
            .iter()
            .any(|s| self.ast.schemas_match(self.document, *s, schema))
        {
            return false;
        }
        set.push(schema);
        true
    }

    /// Resolves a media type object's schema and any schemas declared by its
    /// encoding headers. Returns the media type's own schema.
    fn resolve_media(
        &mut self,
        media: &Value,
        location: &Location,
    ) -> Result<Option<SchemaId>, OalnError> {
        let resolver = self.resolver;
        let schema = match media.get("schema") {
            Some(schema) => Some(self.resolve_schema(schema, location.child("schema"))?),
            None => None,
        };
        if let Some(Value::Object(encodings)) = media.get("encoding") {
            for (property, encoding) in encodings {
                let Some(Value::Object(headers)) = encoding.get("headers") else {
                    continue;
                };
                for (name, raw) in headers {
                    let header = resolver.resolve(raw)?;
                    let header_location = header.location().unwrap_or_else(|| {
                        location.join(["encoding", property.as_str(), "headers", name.as_str()])
                    });
                    self.resolve_header_like(header.value, &header_location)?;
                }
            }
        }
        Ok(schema)
    }

    /// Parameters and headers declare their type through `content` or
    /// `schema`. Returns the first `content` schema, or the `schema`.
    fn resolve_header_like(
        &mut self,
        value: &Value,
        location: &Location,
    ) -> Result<Option<SchemaId>, OalnError> {
        if let Some(Value::Object(content)) = value.get("content") {
            let mut first = None;
            for (media_type, media) in content {
                let media_location = location.join(["content", media_type.as_str()]);
                let schema = self.resolve_media(media, &media_location)?;
                if first.is_none() {
                    first = schema;
                }
            }
            return Ok(first);
        }
        match value.get("schema") {
            Some(schema) => Ok(Some(self.resolve_schema(schema, location.child("schema"))?)),
            None => Ok(None),
        }
    }

    /// Resolves `value` (a schema or a reference to one) found at `location`.
    ///
    /// A referenced schema is keyed by the location it resolves to, named
    /// after the last pointer segment and registered as a type; an inline one
    /// is keyed by `location` and stays anonymous.
    pub(crate) fn resolve_schema(
        &mut self,
        value: &Value,
        location: Location,
    ) -> Result<SchemaId, OalnError> {
        let resolver = self.resolver;
        let resolved = resolver.resolve(value)?;
        let (schema, location, implied_name) = match resolved.location() {
            Some(target) => {
                let name = target.last().map(str::to_string);
                (resolved.value, target, name)
            }
            None => (value, location, None),
        };
        if let Some(id) = self.ast.schema_at(&location) {
            return Ok(id);
        }
        let registered = implied_name.is_some();
        let Classified {
            base_type,
            format,
            nullable,
            shape,
        } = classify(schema, &location)?;
        let id = self.ast.push_schema(Schema {
            location: location.clone(),
            shape,
            base_type,
            format,
            nullable,
            title: schema.get("title").and_then(Value::as_str).map(str::to_string),
            implied_name,
            all_of: Vec::new(),
            one_of: Vec::new(),
            any_of: Vec::new(),
            not: None,
        });
        if registered {
            self.ast.types.push(id);
        }

        let all_of = self.resolve_members(schema, "allOf", &location)?;
        let one_of = self.resolve_members(schema, "oneOf", &location)?;
        let any_of = self.resolve_members(schema, "anyOf", &location)?;
        let not = match schema.get("not") {
            Some(not) => Some(self.resolve_schema(not, location.child("not"))?),
            None => None,
        };
        let is_record = matches!(self.ast.schema(id).shape, SchemaShape::Record(_));
        let is_array = matches!(self.ast.schema(id).shape, SchemaShape::Array(_));
        let mut properties = IndexMap::new();
        if let Some(Value::Object(declared)) = schema.get("properties") {
            if !is_record {
                return Err(SchemaError::ShapeMismatch { location }.into());
            }
            for (name, property) in declared {
                let property_location = location.join(["properties", name.as_str()]);
                properties.insert(name.clone(), self.resolve_schema(property, property_location)?);
            }
        }
        let additional = match schema.get("additionalProperties") {
            Some(additional) if is_record && additional.is_object() => Some(
                self.resolve_schema(additional, location.child("additionalProperties"))?,
            ),
            _ => None,
        };
        let items = match schema.get("items") {
            Some(items) if is_array => Some(self.resolve_schema(items, location.child("items"))?),
            _ => None,
        };

        let node = self.ast.schema_mut(id);
        node.all_of = all_of;
        node.one_of = one_of;
        node.any_of = any_of;
        node.not = not;
        match &mut node.shape {
            SchemaShape::Record(record) => {
                record.properties = properties;
                if let Some(additional) = additional {
                    record.additional_properties = AdditionalProperties::Schema(additional);
                }
            }
            SchemaShape::Array(array) => array.items = items,
            SchemaShape::Leaf => {}
        }
        Ok(id)
    }

    fn resolve_members(
        &mut self,
        schema: &Value,
        key: &str,
        location: &Location,
    ) -> Result<Vec<SchemaId>, OalnError> {
        let Some(Value::Array(members)) = schema.get(key) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(members.len());
        for (idx, member) in members.iter().enumerate() {
            let member_location = location.join([key.to_string(), idx.to_string()]);
            out.push(self.resolve_schema(member, member_location)?);
        }
        Ok(out)
    }
}

fn param_identity(value: &Value) -> Option<(String, ParamIn)> {
    let name = value.get("name").and_then(Value::as_str)?;
    let param_in = value.get("in").and_then(Value::as_str).and_then(ParamIn::parse)?;
    Some((name.to_string(), param_in))
}

fn classify(schema: &Value, location: &Location) -> Result<Classified, SchemaError> {
    let mut format = schema
        .get("format")
        .and_then(Value::as_str)
        .map(str::to_string);
    let mut nullable = schema
        .get("nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let mut apply_legacy = |name: &str| {
        let (base, implied_format) = legacy_type(name);
        if let Some(implied_format) = implied_format {
            format = Some(implied_format.to_string());
        }
        base.to_string()
    };
    let (base_type, members): (Option<String>, Vec<String>) = match schema.get("type") {
        None => (None, Vec::new()),
        Some(Value::String(name)) => {
            let base = apply_legacy(name.as_str());
            (Some(base.clone()), vec![base])
        }
        Some(Value::Array(list)) => {
            if list.len() > 2 {
                return Err(SchemaError::UnsupportedSchemaShape {
                    location: location.clone(),
                    detail: format!("`type` lists {} types", list.len()),
                });
            }
            let is_null = |v: &Value| v.is_null() || v.as_str() == Some("null");
            if list.iter().any(is_null) {
                nullable = true;
            }
            let others: Vec<String> = list
                .iter()
                .filter(|v| !is_null(*v))
                .filter_map(Value::as_str)
                .map(&mut apply_legacy)
                .collect();
            let base = match others.as_slice() {
                [single] => Some(single.clone()),
                _ => None,
            };
            (base, others)
        }
        Some(_) => {
            return Err(SchemaError::UnsupportedSchemaShape {
                location: location.clone(),
                detail: "`type` must be a string or a list of strings".to_string(),
            })
        }
    };
    let shape = if members.iter().any(|m| m == "object") {
        SchemaShape::Record(RecordSchema {
            properties: IndexMap::new(),
            required: schema
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            additional_properties: AdditionalProperties::Allowed(
                schema
                    .get("additionalProperties")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            ),
        })
    } else if members.iter().any(|m| m == "array") {
        SchemaShape::Array(ArraySchema { items: None })
    } else {
        SchemaShape::Leaf
    };
    Ok(Classified {
        base_type,
        format,
        nullable,
        shape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_json(schema: Value) -> Result<Classified, SchemaError> {
        classify(&schema, &Location::new(["s"]))
    }

    #[test]
    fn test_legacy_type_tags() {
        let c = classify_json(json!({ "type": "dateTime" })).unwrap();
        assert_eq!(c.base_type.as_deref(), Some("string"));
        assert_eq!(c.format.as_deref(), Some("date-time"));
    }

    #[test]
    fn test_nullable_type_list() {
        let c = classify_json(json!({ "type": ["object", "null"] })).unwrap();
        assert_eq!(c.base_type.as_deref(), Some("object"));
        assert!(c.nullable);
        assert!(matches!(c.shape, SchemaShape::Record(_)));
    }

    #[test]
    fn test_three_types_are_unsupported() {
        let err = classify_json(json!({ "type": ["string", "integer", "null"] }));
        assert!(matches!(err, Err(SchemaError::UnsupportedSchemaShape { .. })));
    }

    #[test]
    fn test_api_name_fallbacks() {
        assert_eq!(api_name(&json!({ "tags": ["pets"] }), "/x"), "pets");
        assert_eq!(
            api_name(&json!({ "x-swagger-router-controller": "Legacy" }), "/x"),
            "Legacy"
        );
        assert_eq!(api_name(&json!({}), "/user-items/{id}"), "user_items_id");
    }
}
