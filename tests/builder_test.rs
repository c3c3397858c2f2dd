use oaln_core::ast::{AdditionalProperties, MethodInput, ParamIn, ResponseMedia, SchemaShape};
use oaln_core::builder;
use oaln_core::{Ast, Config, Location, Resolver, Role};
use serde_json::{json, Value};

fn build_with(doc: Value, config: &Config) -> (Ast, Resolver) {
    let mut resolver = Resolver::new();
    resolver.init(doc).unwrap();
    let ast = builder::build(&mut resolver, config).unwrap();
    (ast, resolver)
}

fn build(doc: Value) -> (Ast, Resolver) {
    build_with(doc, &Config::default())
}

fn input_names(ast: &Ast, identifier: &str) -> Vec<String> {
    let method = ast.find_method(identifier).unwrap();
    method
        .inputs
        .iter()
        .map(|input| match input {
            MethodInput::Parameter(p) => ast.parameter(*p).name.clone(),
            MethodInput::Body(b) => ast.request_body(*b).name.clone(),
        })
        .collect()
}

fn pets_doc() -> Value {
    json!({
        "openapi": "3.0.3",
        "paths": {
            "/pets": {
                "get": {
                    "operationId": "listPets",
                    "tags": ["pets"],
                    "parameters": [{ "$ref": "#/components/parameters/Limit" }],
                    "responses": { "200": { "description": "ok", "content": {
                        "application/json": { "schema": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/Pet" }
                        }}
                    }}}
                },
                "post": {
                    "operationId": "createPet",
                    "tags": ["pets"],
                    "parameters": [{ "$ref": "#/components/parameters/Limit" }],
                    "requestBody": { "required": true, "content": {
                        "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } }
                    }},
                    "responses": { "201": { "description": "created", "content": {
                        "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } }
                    }}}
                }
            }
        },
        "components": {
            "parameters": {
                "Limit": { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 20 } }
            },
            "schemas": {
                "Pet": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string" },
                        "parent": { "$ref": "#/components/schemas/Pet" },
                        "tags": { "type": "object", "additionalProperties": { "type": "string" } }
                    }
                }
            }
        }
    })
}

#[test]
fn test_shared_references_resolve_to_one_node() {
    let (ast, _) = build(pets_doc());
    let list = ast.find_method("listPets").unwrap();
    let create = ast.find_method("createPet").unwrap();
    assert_eq!(list.inputs[0], create.inputs.iter().copied().find(|i| matches!(i, MethodInput::Parameter(_))).unwrap());

    assert_eq!(ast.types().len(), 1);
    let pet = ast.types()[0];
    assert_eq!(ast.schema(pet).name(), Some("Pet"));
    assert_eq!(
        ast.schema(pet).location,
        Location::new(["components", "schemas", "Pet"])
    );
    assert_eq!(ast.response(create.response).schemas, vec![pet]);
}

#[test]
fn test_cyclic_schema_points_at_itself() {
    let (ast, _) = build(pets_doc());
    let pet = ast.types()[0];
    let record = ast.schema(pet).as_record().unwrap();
    assert_eq!(record.properties["parent"], pet);
    assert!(record.is_required("name"));
    assert!(!record.is_required("parent"));

    let tags = ast.schema(record.properties["tags"]).as_record().unwrap();
    let AdditionalProperties::Schema(value) = tags.additional_properties else {
        panic!("expected an additionalProperties schema");
    };
    assert_eq!(ast.schema(value).base_type.as_deref(), Some("string"));
}

#[test]
fn test_parameter_default_comes_from_its_schema() {
    let (ast, _) = build(pets_doc());
    let MethodInput::Parameter(limit) = ast.find_method("listPets").unwrap().inputs[0] else {
        panic!("expected a parameter");
    };
    let limit = ast.parameter(limit);
    assert_eq!(limit.default, Some(json!(20)));
    assert_eq!(limit.param_in, ParamIn::Query);
    assert_eq!(limit.serializer_key(), Some("fe"));
}

#[test]
fn test_operation_parameter_overrides_path_item_parameter() {
    let doc = json!({
        "paths": { "/items": {
            "parameters": [
                { "name": "x", "in": "query", "description": "shared" },
                { "name": "x", "in": "header" }
            ],
            "get": {
                "operationId": "getItems",
                "parameters": [{ "name": "x", "in": "query", "description": "own", "required": true }],
                "responses": {}
            }
        }}
    });
    let (ast, resolver) = build(doc);
    let method = ast.find_method("getItems").unwrap();
    let query: Vec<_> = method
        .inputs
        .iter()
        .filter_map(|input| match input {
            MethodInput::Parameter(p) => Some(ast.parameter(*p)),
            MethodInput::Body(_) => None,
        })
        .filter(|p| p.param_in == ParamIn::Query)
        .collect();
    assert_eq!(query.len(), 1);
    let description = query[0]
        .location
        .child("description")
        .get(resolver.document().unwrap())
        .cloned();
    assert_eq!(description, Some(json!("own")));
    assert_eq!(method.inputs.len(), 2);
}

#[test]
fn test_required_inputs_come_first_and_the_body_last() {
    let doc = json!({
        "paths": { "/things": { "post": {
            "operationId": "addThing",
            "parameters": [
                { "name": "a", "in": "query" },
                { "name": "b", "in": "query", "required": true }
            ],
            "requestBody": { "content": { "application/json": { "schema": { "type": "string" } } } },
            "responses": {}
        }}}
    });
    let (ast, _) = build(doc);
    assert_eq!(input_names(&ast, "addThing"), vec!["b", "a", "body"]);
}

#[test]
fn test_location_tie_break_puts_path_last() {
    let doc = json!({
        "paths": { "/things/{id}": { "get": {
            "operationId": "getThing",
            "parameters": [
                { "name": "id", "in": "path" },
                { "name": "session", "in": "cookie" },
                { "name": "trace", "in": "header" },
                { "name": "q", "in": "query" }
            ],
            "responses": {}
        }}}
    });
    let (ast, _) = build(doc);
    assert_eq!(input_names(&ast, "getThing"), vec!["q", "trace", "session", "id"]);
}

#[test]
fn test_body_name_avoids_parameter_names() {
    let doc = json!({
        "paths": {
            "/a": { "post": {
                "operationId": "postA",
                "parameters": [{ "name": "body", "in": "query" }],
                "requestBody": { "content": { "text/plain": { "schema": { "type": "string" } } } },
                "responses": {}
            }},
            "/b": { "post": {
                "operationId": "postB",
                "requestBody": {
                    "x-body-name": "payload",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                },
                "responses": {}
            }}
        }
    });
    let (ast, _) = build(doc);
    assert_eq!(input_names(&ast, "postA"), vec!["body", "reqBody"]);
    assert_eq!(input_names(&ast, "postB"), vec!["payload"]);
}

#[test]
fn test_response_codes_are_ranked_and_classified() {
    let doc = json!({
        "paths": { "/jobs": { "post": {
            "operationId": "startJob",
            "responses": {
                "404": { "description": "missing" },
                "201": { "description": "created", "content": {
                    "application/json": { "schema": { "type": "object", "properties": { "id": { "type": "string" } } } },
                    "application/xml": { "schema": { "type": "object" } }
                }},
                "200": { "description": "anything", "content": { "*/*": {} } }
            }
        }}}
    });
    let (ast, _) = build(doc);
    let response = ast.response(ast.find_method("startJob").unwrap().response);
    let codes: Vec<&str> = response.preferred.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(codes, vec!["200", "201"]);
    assert_eq!(response.preferred[0].media, ResponseMedia::Any);
    assert_eq!(
        response.preferred[1].media,
        ResponseMedia::Types(vec!["application/json".to_string()])
    );
    assert!(response.has_any);
    assert!(!response.has_void);
    assert_eq!(response.schemas.len(), 1);
    assert_eq!(response.accept(true), vec!["application/json", "*/*"]);
}

#[test]
fn test_equal_body_schemas_are_deduplicated() {
    let doc = json!({
        "paths": { "/notes": { "put": {
            "operationId": "putNote",
            "requestBody": { "content": {
                "text/plain": { "schema": { "type": "string", "$comment": "plain" } },
                "application/json": { "schema": { "type": "string" } }
            }},
            "responses": { "204": { "description": "stored" } }
        }}}
    });
    let (ast, _) = build(doc);
    let method = ast.find_method("putNote").unwrap();
    let MethodInput::Body(body) = method.inputs[0] else {
        panic!("expected a body");
    };
    let body = ast.request_body(body);
    assert_eq!(body.preferred_media_types, vec!["text/plain", "application/json"]);
    assert_eq!(body.schemas.len(), 1);
    assert!(body.schemas.contains_key("text/plain"));
    assert!(ast.response(method.response).has_void);
}

#[test]
fn test_divergent_body_schemas_skip_the_operation_for_servers() {
    let doc = json!({
        "paths": {
            "/upload": { "post": {
                "operationId": "upload",
                "requestBody": { "content": {
                    "application/json": { "schema": { "type": "object", "properties": { "n": { "type": "string" } } } },
                    "application/octet-stream": { "schema": { "type": "string", "format": "binary" } }
                }},
                "responses": {}
            }},
            "/health": { "get": { "operationId": "health", "responses": {} } }
        }
    });
    let (client, _) = build(doc.clone());
    assert!(client.find_method("upload").is_some());

    let server = Config {
        role: Role::Server,
        ..Config::default()
    };
    let (ast, _) = build_with(doc, &server);
    assert!(ast.find_method("upload").is_none());
    assert!(ast.find_method("health").is_some());
    assert_eq!(ast.skipped().len(), 1);
    assert_eq!(ast.skipped()[0].operation_id, "upload");
    assert!(ast.skipped()[0].reason.contains("differ"));
}

#[test]
fn test_legacy_type_tags_match_their_rewritten_form() {
    let doc = json!({
        "paths": { "/events": { "post": {
            "operationId": "postEvent",
            "requestBody": { "content": {
                "text/plain": { "schema": { "type": "dateTime" } },
                "application/json": { "schema": { "type": "string", "format": "date-time" } }
            }},
            "responses": {}
        }}}
    });
    let server = Config {
        role: Role::Server,
        ..Config::default()
    };
    let (ast, _) = build_with(doc, &server);
    assert!(ast.skipped().is_empty());
    let method = ast.find_method("postEvent").unwrap();
    let body = method
        .inputs
        .iter()
        .find_map(|input| match input {
            MethodInput::Body(b) => Some(ast.request_body(*b)),
            MethodInput::Parameter(_) => None,
        })
        .unwrap();
    assert_eq!(body.schemas.len(), 1);
    let schema = ast.schema(body.resolve_types(Role::Server).unwrap()[0]);
    assert_eq!(schema.base_type.as_deref(), Some("string"));
    assert_eq!(schema.format.as_deref(), Some("date-time"));
}

#[test]
fn test_unacceptable_body_media_type_skips_the_operation() {
    let doc = json!({
        "paths": { "/xml": { "post": {
            "operationId": "postXml",
            "requestBody": { "content": { "application/xml": { "schema": { "type": "string" } } } },
            "responses": {}
        }}}
    });
    let (ast, _) = build(doc);
    assert!(ast.find_method("postXml").is_none());
    assert_eq!(
        ast.skipped()[0].location,
        Location::new(["paths", "/xml", "post"])
    );
}

#[test]
fn test_missing_ids_and_tags_are_synthesized() {
    let doc = json!({
        "paths": {
            "/user-items/{id}": { "get": { "responses": {} } },
            "/legacy": { "get": { "x-swagger-router-controller": "Legacy", "responses": {} } }
        }
    });
    let (ast, resolver) = build(doc);
    let api = ast.api_named("user_items_id").unwrap();
    let method = ast.method(api.methods[0]);
    assert_eq!(method.operation_id, "get_user_items_id");
    assert_eq!(method.identifier, "getUserItemsId");
    assert_eq!(method.pattern, "/user-items/{id}");

    let document = resolver.document().unwrap();
    assert_eq!(api.location.get(document), Some(&json!({ "name": "user_items_id" })));
    assert!(ast.api_named("Legacy").is_some());
    assert_eq!(
        Location::new(["paths", "/user-items/{id}", "get", "operationId"]).get(document),
        Some(&json!("get_user_items_id"))
    );
}

#[test]
fn test_duplicate_identifiers_keep_the_first_operation() {
    let doc = json!({
        "paths": {
            "/a": { "get": { "operationId": "fetch_item", "tags": ["items"], "responses": {} } },
            "/b": { "get": { "operationId": "fetchItem", "tags": ["items"], "responses": {} } }
        }
    });
    let (ast, _) = build(doc);
    let items = ast.api_named("items").unwrap();
    assert_eq!(items.methods.len(), 1);
    assert_eq!(ast.method(items.methods[0]).pattern, "/a");
}

#[test]
fn test_omitted_operations_are_not_built() {
    let config = Config {
        omitted_operation_ids: vec!["internalPing".to_string()],
        ..Config::default()
    };
    let doc = json!({
        "paths": { "/ping": { "get": { "operationId": "internalPing", "tags": ["ops"], "responses": {} } } }
    });
    let (ast, resolver) = build_with(doc, &config);
    assert_eq!(ast.apis().count(), 0);
    assert!(resolver.document().unwrap().get("tags").is_none());
}

#[test]
fn test_all_models_registers_unreferenced_schemas() {
    let doc = json!({
        "paths": {},
        "components": { "schemas": {
            "Unused": { "type": "string", "enum": ["a", "b"] },
            "Dates": { "type": "array", "items": { "type": "dateTime" } }
        }}
    });
    let (ast, _) = build(doc.clone());
    assert!(ast.types().is_empty());

    let config = Config {
        all_models: true,
        ..Config::default()
    };
    let (ast, _) = build_with(doc, &config);
    assert_eq!(ast.types().len(), 2);
    let dates = ast.schema(ast.types()[1]);
    let items = ast.schema(dates.as_array().unwrap().items.unwrap());
    assert_eq!(items.base_type.as_deref(), Some("string"));
    assert_eq!(items.format.as_deref(), Some("date-time"));
}

#[test]
fn test_properties_on_a_non_object_is_a_shape_mismatch() {
    let doc = json!({
        "paths": { "/bad": { "get": {
            "operationId": "bad",
            "parameters": [{ "name": "f", "in": "query", "schema": {
                "type": "string", "properties": { "x": { "type": "string" } }
            }}],
            "responses": {}
        }}}
    });
    let mut resolver = Resolver::new();
    resolver.init(doc).unwrap();
    let err = builder::build(&mut resolver, &Config::default()).unwrap_err();
    assert!(matches!(
        err,
        oaln_core::OalnError::Schema(oaln_core::error::SchemaError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_inline_identical_schemas_stay_distinct() {
    let doc = json!({
        "paths": { "/a": { "get": {
            "operationId": "twins",
            "parameters": [
                { "name": "x", "in": "query", "schema": { "type": "string" } },
                { "name": "y", "in": "query", "schema": { "type": "string" } }
            ],
            "responses": {}
        }}}
    });
    let (ast, _) = build(doc);
    let method = ast.find_method("twins").unwrap();
    let schemas: Vec<_> = method
        .inputs
        .iter()
        .filter_map(|input| match input {
            MethodInput::Parameter(p) => ast.parameter(*p).schema,
            MethodInput::Body(_) => None,
        })
        .collect();
    assert_eq!(schemas.len(), 2);
    assert_ne!(schemas[0], schemas[1]);
    assert!(matches!(ast.schema(schemas[0]).shape, SchemaShape::Leaf));
}

#[test]
fn test_security_is_attached_to_methods() {
    let doc = json!({
        "security": [{ "token": [] }],
        "components": { "securitySchemes": {
            "token": { "type": "apiKey", "in": "query", "name": "api_key" }
        }},
        "paths": { "/me": { "get": { "operationId": "me", "responses": {} } } }
    });
    let (ast, _) = build(doc);
    let security = ast.find_method("me").unwrap().security.clone().unwrap();
    assert_eq!(security.api_key.unwrap().query, vec!["api_key"]);
}

#[test]
fn test_encoding_header_schemas_are_registered() {
    let doc = json!({
        "paths": { "/files": { "post": {
            "operationId": "uploadFile",
            "requestBody": { "content": { "multipart/form-data": {
                "schema": { "type": "object", "properties": { "file": { "type": "string", "format": "binary" } } },
                "encoding": { "file": { "headers": {
                    "X-Checksum": { "schema": { "$ref": "#/components/schemas/Checksum" } }
                }}}
            }}},
            "responses": {}
        }}},
        "components": { "schemas": {
            "Checksum": { "type": "string", "pattern": "^[a-f0-9]{64}$" }
        }}
    });
    let config = Config {
        request_media_types: vec!["multipart/form-data".to_string()],
        ..Config::default()
    };
    let (ast, _) = build_with(doc, &config);
    assert!(ast.find_method("uploadFile").is_some());
    let checksum = ast
        .schema_at(&Location::new(["components", "schemas", "Checksum"]))
        .unwrap();
    assert_eq!(ast.schema(checksum).base_type.as_deref(), Some("string"));
}

#[test]
fn test_declared_wildcard_sets_has_any_next_to_typed_media() {
    let doc = json!({
        "paths": { "/report": { "get": {
            "operationId": "getReport",
            "responses": { "200": { "description": "ok", "content": {
                "application/json": { "schema": { "type": "object" } },
                "*/*": {}
            }}}
        }}}
    });
    let (ast, _) = build(doc);
    let response = ast.response(ast.find_method("getReport").unwrap().response);
    assert_eq!(
        response.preferred[0].media,
        ResponseMedia::Types(vec!["application/json".to_string()])
    );
    assert!(response.has_any);
    assert_eq!(response.accept(false), vec!["application/json"]);
    assert_eq!(response.accept(true), vec!["application/json", "*/*"]);
}
