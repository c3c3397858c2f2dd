//! Internalizes cross-file references so the resolver only ever sees local
//! pointers.
//!
//! A reference such as `common.yaml#/parameters/Page` is rewritten to
//! `#/parameters/Page`, and the referenced value is copied into the root
//! document at that same path. Values copied in this way are themselves
//! remapped, with their own local references read relative to the file they
//! came from. When that path is already taken by a different value, the copy
//! lands at a suffixed sibling instead.

use crate::document::{ref_of, Document};
use crate::error::ResolverError;
use crate::location::Location;
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Bundle {
    root: Document,
    externals: IndexMap<String, Document>,
}

impl Bundle {
    pub fn new(root: Document) -> Self {
        Bundle {
            root,
            externals: IndexMap::new(),
        }
    }

    /// Registers an external document under the file name references use.
    #[must_use]
    pub fn with_external(mut self, name: impl AsRef<str>, document: Document) -> Self {
        self.externals
            .insert(normalize_file(name.as_ref()).to_string(), document);
        self
    }

    pub fn add_external(&mut self, name: impl AsRef<str>, document: Document) {
        self.externals
            .insert(normalize_file(name.as_ref()).to_string(), document);
    }

    /// Produces one self-contained document.
    ///
    /// A copied value lands at its own path unless the root already holds a
    /// different value there, or another source claimed the slot first. It
    /// then lands at the first free sibling `<name>_<n>` and every reference
    /// to it is rewritten to that path.
    pub fn internalize(self) -> Result<Document, ResolverError> {
        let Bundle {
            mut root,
            externals,
        } = self;
        let mut remapper = Remapper {
            externals: &externals,
            original: root.clone(),
            assigned: IndexMap::new(),
            owners: IndexMap::new(),
            pending: Vec::new(),
        };
        remapper.remap(&mut root, None)?;
        while let Some(Placement { target, source }) = remapper.pending.pop() {
            let (file, local) = &source;
            let pointer = format!("{file}{local}");
            let mut value = remapper.external_value(file, local)?.clone();
            // Local references inside the copied value point into its own file.
            remapper.remap(&mut value, Some(file.as_str()))?;
            if !target.set(&mut root, value) {
                return Err(ResolverError::UnresolvablePointer { pointer });
            }
            log::debug!("bundled {pointer} at {target}");
        }
        Ok(root)
    }
}

struct Placement {
    target: Location,
    source: (String, Location),
}

struct Remapper<'a> {
    externals: &'a IndexMap<String, Document>,
    // The root as it was before anything was copied into it.
    original: Document,
    // (file, local pointer) to the root pointer it was placed at.
    assigned: IndexMap<(String, String), String>,
    // Root pointer to the (file, local pointer) that owns it.
    owners: IndexMap<String, (String, String)>,
    // Values still to be copied from an external file.
    pending: Vec<Placement>,
}

impl Remapper<'_> {
    fn external_value(&self, file: &str, local: &Location) -> Result<&Value, ResolverError> {
        self.externals
            .get(file)
            .and_then(|external| local.get(external))
            .ok_or_else(|| ResolverError::UnresolvablePointer {
                pointer: format!("{file}{local}"),
            })
    }

    fn remap(&mut self, value: &mut Value, base: Option<&str>) -> Result<(), ResolverError> {
        if let Some(reference) = ref_of(value) {
            let (file, hash) = split_reference(reference);
            let file = match (file, base) {
                ("", None) => return Ok(()),
                ("", Some(base)) => base.to_string(),
                (file, _) => normalize_file(file).to_string(),
            };
            let local = Location::from_pointer(hash);
            if local.is_root() {
                return Err(ResolverError::WholeFileReference {
                    reference: reference.to_string(),
                });
            }
            let pointer = self.place(file, local)?;
            if let Value::Object(map) = value {
                map.insert("$ref".to_string(), Value::String(pointer));
            }
            return Ok(());
        }
        match value {
            Value::Object(map) => {
                for (_, child) in map.iter_mut() {
                    self.remap(child, base)?;
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    self.remap(child, base)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Picks the root pointer for an external value, scheduling the copy
    /// the first time the value is seen.
    fn place(&mut self, file: String, local: Location) -> Result<String, ResolverError> {
        let key = (file, local.to_pointer());
        if let Some(pointer) = self.assigned.get(&key) {
            return Ok(pointer.clone());
        }
        let external = self.external_value(&key.0, &local)?;
        let mut target = local.clone();
        let mut suffix = 0usize;
        let reuse = loop {
            let pointer = target.to_pointer();
            if !self.owners.contains_key(&pointer) {
                match target.get(&self.original) {
                    None => break false,
                    Some(existing) if existing == external => break true,
                    Some(_) => {}
                }
            }
            suffix += 1;
            target = sibling(&local, suffix)?;
        };
        let pointer = target.to_pointer();
        if suffix > 0 {
            log::warn!(
                "{}{} collides with an existing value; bundled at {pointer}",
                key.0,
                key.1
            );
        }
        self.assigned.insert(key.clone(), pointer.clone());
        self.owners.insert(pointer.clone(), key.clone());
        if !reuse {
            self.pending.push(Placement {
                target,
                source: (key.0, local),
            });
        }
        Ok(pointer)
    }
}

fn sibling(local: &Location, suffix: usize) -> Result<Location, ResolverError> {
    match (local.parent(), local.last()) {
        (Some(parent), Some(name)) => Ok(parent.child(format!("{name}_{suffix}"))),
        _ => Err(ResolverError::UnresolvablePointer {
            pointer: local.to_pointer(),
        }),
    }
}

fn split_reference(reference: &str) -> (&str, &str) {
    match reference.find('#') {
        Some(idx) => (&reference[..idx], &reference[idx..]),
        None => (reference, ""),
    }
}

fn normalize_file(name: &str) -> &str {
    name.trim_start_matches("./")
}
