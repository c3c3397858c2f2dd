use crate::location::Location;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum OalnError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Resolver Error")]
pub enum ResolverError {
    #[error("Resolver not initialized")]
    #[diagnostic(
        code(resolver::not_initialized),
        help("Call `Resolver::init` with the bundled document before resolving anything.")
    )]
    NotInitialized,

    #[error("Resolver already initialized")]
    #[diagnostic(
        code(resolver::already_initialized),
        help("A resolver serves exactly one generation pass. Create a new one for another document.")
    )]
    AlreadyInitialized,

    #[error("Unresolvable pointer `{pointer}`")]
    #[diagnostic(
        code(resolver::unresolvable_pointer),
        help("The reference does not name a value in the bundled document.")
    )]
    UnresolvablePointer { pointer: String },

    #[error("Whole-file reference `{reference}` cannot be bundled")]
    #[diagnostic(
        code(resolver::whole_file_reference),
        help("Only references with a fragment (`file.yaml#/path`) are internalized. Point at a value inside the file.")
    )]
    WholeFileReference { reference: String },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Schema Error")]
pub enum SchemaError {
    #[error("Unsupported schema shape at `{location}`: {detail}")]
    #[diagnostic(
        code(schema::unsupported_shape),
        help("A `type` list may only pair one base type with `null`.")
    )]
    UnsupportedSchemaShape { location: Location, detail: String },

    #[error("`properties` found on a non-object schema at `{location}`")]
    #[diagnostic(
        code(schema::shape_mismatch),
        help("Declare `type: object` on schemas that define properties.")
    )]
    ShapeMismatch { location: Location },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[error("Operation Error")]
pub enum OperationError {
    #[error("No acceptable request body media type at `{location}`")]
    #[diagnostic(
        code(operation::no_acceptable_body_media_type),
        help("Add one of the declared media types to the configured request media types.")
    )]
    NoAcceptableBodyMediaType { location: Location },

    #[error("Request body schemas differ by media type at `{location}`")]
    #[diagnostic(
        code(operation::ambiguous_body_schema),
        help("A server method takes one body type. Use the same schema for every media type, or narrow the accepted media types.")
    )]
    AmbiguousBodySchema { location: Location },
}

#[derive(Error, Debug, Diagnostic)]
#[error("Load Error")]
pub enum LoadError {
    #[error("Invalid JSON")]
    #[diagnostic(code(load::json), help("{message}"))]
    Json {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        message: String,
    },

    #[error("Invalid YAML")]
    #[diagnostic(code(load::yaml), help("{message}"))]
    Yaml {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        message: String,
    },

    #[error("Cannot read `{path}`")]
    #[diagnostic(code(load::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Document root must be an object, found {found}")]
    #[diagnostic(code(load::not_an_object))]
    NotAnObject { found: String },
}

#[derive(Error, Debug, Diagnostic)]
#[error("Config Error")]
pub enum ConfigError {
    #[error("Invalid media type pattern `{pattern}`")]
    #[diagnostic(
        code(config::media_type_pattern),
        help("Patterns containing whitespace are read as `regex flags`.")
    )]
    MediaTypePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(config::invalid))]
    Invalid { message: String },
}
