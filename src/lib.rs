pub mod api;
pub mod ast;
pub mod builder;
pub mod bundle;
pub mod config;
pub mod document;
pub mod error;
pub mod location;
pub mod merge;
pub mod normalizer;
pub mod preference;
pub mod resolver;
pub mod security;
pub mod serialization;
pub mod utils;

pub use api::{generate, generate_from_files, prepare, GenerationResult, PrepareOptions, Prepared};
pub use ast::Ast;
pub use config::{Config, Role};
pub use error::OalnError;
pub use location::Location;
pub use resolver::Resolver;
pub use serialization::{hydrate, SerializedAst};
