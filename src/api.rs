use crate::ast::Ast;
use crate::builder;
use crate::bundle::Bundle;
use crate::config::Config;
use crate::document::{load_fragment, Document};
use crate::error::OalnError;
use crate::merge::merge_fragments;
use crate::normalizer::{default_titles, exclude_paths, hoist, uplift_path_aliases, HoistMode, HoistReport};
use crate::resolver::Resolver;
use crate::serialization::SerializedAst;
use serde::{Serialize, Serializer};
use std::path::Path;

/// Options for turning fragments into one normalized document.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Documents that cross-file references may point into, by file name.
    pub externals: Vec<(String, Document)>,
    /// Dotted paths removed before generation, e.g. `paths./internal`.
    pub excluded_paths: Vec<String>,
    pub hoist: Option<HoistMode>,
}

/// A normalized document, owned by the resolver that will serve the build.
#[derive(Debug)]
pub struct Prepared {
    pub resolver: Resolver,
    /// Present when a hoisting mode was requested.
    pub hoist_report: Option<HoistReport>,
}

/// Folds `fragments` into one document and normalizes it: cross-file
/// references are internalized, excluded paths removed, shared path items
/// uplifted, optionally anonymous schemas hoisted, and top-level schema titles
/// defaulted.
///
/// # Errors
///
/// Returns an `OalnError` when a reference cannot be internalized.
pub fn prepare<I>(fragments: I, options: PrepareOptions) -> Result<Prepared, OalnError>
where
    I: IntoIterator<Item = Document>,
{
    let mut bundle = Bundle::new(merge_fragments(fragments));
    for (name, external) in options.externals {
        bundle.add_external(name, external);
    }
    let mut document = bundle.internalize()?;
    let excluded = exclude_paths(&mut document, &options.excluded_paths);
    if excluded > 0 {
        log::debug!("excluded {excluded} paths");
    }

    let mut resolver = Resolver::new();
    resolver.init(document)?;
    let uplifted = uplift_path_aliases(&mut resolver)?;
    if uplifted > 0 {
        log::debug!("uplifted {uplifted} shared path items");
    }

    let hoist_report = match &options.hoist {
        Some(mode) => {
            let report = hoist(resolver.document_mut()?, mode);
            log::info!(
                "hoisting: {} suggestions, {} hoisted, {} conflicts",
                report.suggestions.len(),
                report.hoisted.len(),
                report.conflicts.len()
            );
            Some(report)
        }
        None => None,
    };
    let titled = default_titles(resolver.document_mut()?);
    log::debug!("defaulted {titled} schema titles");
    Ok(Prepared {
        resolver,
        hoist_report,
    })
}

/// The outcome of one generation pass.
#[derive(Debug)]
pub struct GenerationResult {
    pub ast: Ast,
    /// Owns the normalized document every AST location points into.
    pub resolver: Resolver,
    pub hoist_report: Option<HoistReport>,
}

impl Serialize for GenerationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_serialized().serialize(serializer)
    }
}

impl GenerationResult {
    #[must_use]
    pub fn to_serialized(&self) -> SerializedAst {
        self.ast.to_serialized()
    }

    /// Serializes the AST into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the AST into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }

    /// The normalized document, as amended by the build.
    ///
    /// # Errors
    /// Never fails for a result produced by [`generate`].
    pub fn document(&self) -> Result<&Document, OalnError> {
        Ok(self.resolver.document()?)
    }
}

/// Prepares `fragments` and builds the AST.
///
/// This is the primary entry point. Operations whose request body cannot be
/// expressed under `config` are skipped and listed in `Ast::skipped` rather
/// than failing the pass.
///
/// # Errors
///
/// Returns an `OalnError` if a reference cannot be resolved, a schema has an
/// unsupported shape, or a media-type pattern in `config` is invalid.
pub fn generate<I>(
    fragments: I,
    options: PrepareOptions,
    config: &Config,
) -> Result<GenerationResult, OalnError>
where
    I: IntoIterator<Item = Document>,
{
    let Prepared {
        mut resolver,
        hoist_report,
    } = prepare(fragments, options)?;
    let ast = builder::build(&mut resolver, config)?;
    log::debug!(
        "built {} nodes, skipped {} operations",
        ast.node_count(),
        ast.skipped().len()
    );
    Ok(GenerationResult {
        ast,
        resolver,
        hoist_report,
    })
}

/// Like [`generate`], reading each fragment from a JSON or YAML file.
///
/// # Errors
///
/// Returns an `OalnError` if a file cannot be read or parsed, or if
/// generation fails.
pub fn generate_from_files<P>(
    paths: &[P],
    options: PrepareOptions,
    config: &Config,
) -> Result<GenerationResult, OalnError>
where
    P: AsRef<Path>,
{
    let fragments = paths
        .iter()
        .map(load_fragment)
        .collect::<Result<Vec<_>, _>>()?;
    generate(fragments, options, config)
}
