use crate::document::{ref_of, Document};
use crate::error::ResolverError;
use crate::location::Location;
use serde_json::Value;

/// The outcome of dereferencing a value that may be a `$ref`.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    /// The referenced value, or the input itself when it was not a reference.
    pub value: &'a Value,
    /// The canonical pointer that reached `value`, if any indirection happened.
    pub pointer: Option<&'a str>,
}

impl Resolved<'_> {
    pub fn is_ref(&self) -> bool {
        self.pointer.is_some()
    }

    /// The location of the referenced value, when one was dereferenced.
    pub fn location(&self) -> Option<Location> {
        self.pointer.map(Location::from_pointer)
    }
}

/// Dereferences `$ref` values against the one document of a generation pass.
///
/// Every other component routes indirection through here so that two pointers
/// to the same referent always produce the same location, and therefore the
/// same AST node.
#[derive(Debug, Default)]
pub struct Resolver {
    // The bundled document; `None` until `init`.
    document: Option<Document>,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver { document: None }
    }

    /// Installs the bundled document. A resolver serves exactly one pass.
    pub fn init(&mut self, document: Document) -> Result<(), ResolverError> {
        if self.document.is_some() {
            return Err(ResolverError::AlreadyInitialized);
        }
        self.document = Some(document);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Result<&Document, ResolverError> {
        self.document.as_ref().ok_or(ResolverError::NotInitialized)
    }

    pub fn document_mut(&mut self) -> Result<&mut Document, ResolverError> {
        self.document.as_mut().ok_or(ResolverError::NotInitialized)
    }

    pub fn into_document(self) -> Result<Document, ResolverError> {
        self.document.ok_or(ResolverError::NotInitialized)
    }

    /// Returns `value` unchanged when it is not a reference. Otherwise follows
    /// the reference (and any reference it lands on) and returns the final
    /// value together with the last pointer used to reach it.
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<Resolved<'a>, ResolverError> {
        let document = self.document()?;
        let Some(mut pointer) = ref_of(value) else {
            return Ok(Resolved {
                value,
                pointer: None,
            });
        };
        // Pointers seen along this chain, to stop `A -> B -> A` loops.
        let mut resolving_stack: Vec<&str> = Vec::new();
        loop {
            if resolving_stack.contains(&pointer) {
                return Err(ResolverError::UnresolvablePointer {
                    pointer: format!("{} -> {}", resolving_stack.join(" -> "), pointer),
                });
            }
            resolving_stack.push(pointer);
            let target = lookup(document, pointer)?;
            match ref_of(target) {
                Some(next) => pointer = next,
                None => {
                    return Ok(Resolved {
                        value: target,
                        pointer: Some(pointer),
                    })
                }
            }
        }
    }

    /// Resolves the value stored at `location`, following it if it is itself
    /// a reference. The returned location is where the final value lives.
    pub fn resolve_at(&self, location: &Location) -> Result<(&Value, Location), ResolverError> {
        let document = self.document()?;
        let value = location
            .get(document)
            .ok_or_else(|| ResolverError::UnresolvablePointer {
                pointer: location.to_pointer(),
            })?;
        let resolved = self.resolve(value)?;
        let final_location = resolved.location().unwrap_or_else(|| location.clone());
        Ok((resolved.value, final_location))
    }

    /// Like [`Resolver::resolve`], but for an optional child of some node.
    pub fn resolve_opt<'a>(
        &'a self,
        value: Option<&'a Value>,
    ) -> Result<Option<Resolved<'a>>, ResolverError> {
        value.map(|v| self.resolve(v)).transpose()
    }
}

fn lookup<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value, ResolverError> {
    // Cross-file references must have been internalized by the bundle step.
    if !pointer.starts_with('#') {
        return Err(ResolverError::UnresolvablePointer {
            pointer: pointer.to_string(),
        });
    }
    Location::from_pointer(pointer)
        .get(document)
        .ok_or_else(|| ResolverError::UnresolvablePointer {
            pointer: pointer.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_value_is_returned_unchanged() {
        let mut resolver = Resolver::new();
        resolver.init(json!({})).unwrap();
        let value = json!({ "type": "string" });
        let resolved = resolver.resolve(&value).unwrap();
        assert!(std::ptr::eq(resolved.value, &value));
        assert!(!resolved.is_ref());
    }

    #[test]
    fn test_reference_chain_reports_final_pointer() {
        let mut resolver = Resolver::new();
        resolver
            .init(json!({
                "components": { "schemas": {
                    "Alias": { "$ref": "#/components/schemas/Pet" },
                    "Pet": { "type": "object" }
                }}
            }))
            .unwrap();
        let value = json!({ "$ref": "#/components/schemas/Alias" });
        let resolved = resolver.resolve(&value).unwrap();
        assert_eq!(resolved.pointer, Some("#/components/schemas/Pet"));
        assert_eq!(resolved.value, &json!({ "type": "object" }));
    }

    #[test]
    fn test_reference_loop_is_unresolvable() {
        let mut resolver = Resolver::new();
        resolver
            .init(json!({ "a": { "$ref": "#/b" }, "b": { "$ref": "#/a" } }))
            .unwrap();
        let value = json!({ "$ref": "#/a" });
        assert!(matches!(
            resolver.resolve(&value),
            Err(ResolverError::UnresolvablePointer { .. })
        ));
    }
}
