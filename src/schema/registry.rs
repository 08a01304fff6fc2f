//! Schema registries and entry model
//!
//! A [`SchemaRegistry`] holds everything one parser instance knows:
//! named types, global elements, global attributes, the namespace-prefix
//! table, and the bookkeeping of which schema bodies have been parsed
//! and which URLs downloaded. Entries are write-once after a schema
//! commits; the registry grows monotonically until the parser instance
//! is discarded.

use std::collections::HashMap;

use crate::builtins::ValueParser;
use crate::error::{Error, Result};
use crate::multimap::MultiMap;
use crate::names::{NamespaceTable, QName};

/// A named simple type
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleType {
    /// Base type chain heads; more than one means a union over member
    /// types, empty means the chain ends here (anySimpleType base)
    pub bases: Vec<QName>,
    /// Direct parser; only built-ins carry one
    pub parse: Option<ValueParser>,
    /// Whether the type was derived by restriction
    pub restriction: bool,
}

/// A named complex type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComplexType {
    /// Allowed children keyed by qualified name
    pub children: HashMap<QName, ChildSpec>,
    /// Whether any global element is accepted as a child (`<any>`);
    /// mutually exclusive with `children`
    pub any_children: bool,
    /// Cardinality of `<any>` child groups (meaningful only with
    /// `any_children`)
    pub is_array: Option<bool>,
    /// Allowed attributes keyed by qualified name
    pub attributes: HashMap<QName, AttrSpec>,
    /// Base type from simpleContent/complexContent derivation
    pub base: Option<QName>,
    /// Whether the derivation was a restriction
    pub restriction: bool,
}

/// A type registry entry
#[derive(Debug, Clone, PartialEq)]
pub enum TypeEntry {
    /// Simple type
    Simple(SimpleType),
    /// Complex type
    Complex(ComplexType),
}

/// An allowed child of a complex type; global element entries share
/// this shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSpec {
    /// By-reference to a global element
    Ref {
        /// The referenced global element
        target: QName,
        /// Cardinality default inherited from a repeated container,
        /// applied at resolution time if the target leaves it open
        is_array_default: Option<bool>,
    },
    /// Inline declaration with an explicit (or synthesized) type
    Inline {
        /// The element's type
        type_name: QName,
        /// Schema-declared cardinality; None means single value
        is_array: Option<bool>,
    },
}

/// Global element entries have the same shape as child specs
pub type ElementEntry = ChildSpec;

/// An allowed attribute: its type directly, or a reference to a global
/// attribute declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrSpec {
    /// The attribute's type
    Type(QName),
    /// Reference to a global attribute
    Ref(QName),
}

/// The output of compiling one schema document, staged for an atomic
/// commit: either everything lands in the registry or nothing does.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    /// The schema's target namespace
    pub target_namespace: String,
    /// Prefix bindings declared on the schema root (XSD prefix excluded)
    pub prefixes: Vec<(String, String)>,
    /// Named types, including promoted anonymous types
    pub types: HashMap<QName, TypeEntry>,
    /// Global element declarations
    pub elements: HashMap<QName, ElementEntry>,
    /// Global attribute declarations
    pub attributes: HashMap<QName, AttrSpec>,
    /// Imports and includes still to be satisfied, keyed by namespace
    pub pending_imports: MultiMap<String, String>,
}

/// Per-parser-instance schema knowledge
#[derive(Debug)]
pub struct SchemaRegistry {
    /// URI → prefix table used to reconstruct namespaced paths
    pub namespaces: NamespaceTable,
    /// Named type definitions
    pub types: HashMap<QName, TypeEntry>,
    /// Global element declarations
    pub elements: HashMap<QName, ElementEntry>,
    /// Global attribute declarations
    pub attributes: HashMap<QName, AttrSpec>,
    /// Schema bodies parsed, keyed by namespace URI
    pub parsed_schemas: MultiMap<String, Vec<u8>>,
    /// Schema URLs downloaded, keyed by namespace URI
    pub downloaded_schemas: MultiMap<String, String>,
    anon_counter: u64,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            namespaces: NamespaceTable::new(),
            types: HashMap::new(),
            elements: HashMap::new(),
            attributes: HashMap::new(),
            parsed_schemas: MultiMap::new(),
            downloaded_schemas: MultiMap::new(),
            anon_counter: 0,
        }
    }

    /// Next id for promoting an anonymous inline type to a named one.
    /// Monotonic per registry, so synthesized names are deterministic
    /// for a fixed registry.
    pub fn next_anon_id(&mut self) -> u64 {
        self.anon_counter += 1;
        self.anon_counter
    }

    /// Whether some schema body has been parsed for the namespace
    pub fn has_schema_for(&self, uri: &str) -> bool {
        self.parsed_schemas.contains_key(&uri.to_string())
    }

    /// Commit a compiled schema.
    ///
    /// Identical redefinitions (diamond includes) are tolerated; a
    /// conflicting definition under an already-used QName is an error.
    pub fn commit(&mut self, compiled: CompiledSchema, uri: &str, body: &[u8]) -> Result<()> {
        for (ns_uri, prefix) in &compiled.prefixes {
            self.namespaces.declare(ns_uri, prefix)?;
        }
        for (name, entry) in compiled.types {
            match self.types.get(&name) {
                Some(existing) if *existing != entry => {
                    return Err(Error::InvalidSchema(format!(
                        "conflicting definitions for type '{}'",
                        name
                    )));
                }
                Some(_) => {}
                None => {
                    self.types.insert(name, entry);
                }
            }
        }
        for (name, entry) in compiled.elements {
            match self.elements.get(&name) {
                Some(existing) if *existing != entry => {
                    return Err(Error::InvalidSchema(format!(
                        "conflicting declarations for element '{}'",
                        name
                    )));
                }
                Some(_) => {}
                None => {
                    self.elements.insert(name, entry);
                }
            }
        }
        for (name, spec) in compiled.attributes {
            match self.attributes.get(&name) {
                Some(existing) if *existing != spec => {
                    return Err(Error::InvalidSchema(format!(
                        "conflicting declarations for attribute '{}'",
                        name
                    )));
                }
                Some(_) => {}
                None => {
                    self.attributes.insert(name, spec);
                }
            }
        }
        self.parsed_schemas.insert(uri.to_string(), body.to_vec());
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_entry() -> TypeEntry {
        TypeEntry::Simple(SimpleType {
            bases: vec![QName::local("int")],
            parse: None,
            restriction: true,
        })
    }

    #[test]
    fn test_commit_and_reject_conflicts() {
        let mut reg = SchemaRegistry::new();
        let name = QName::namespaced("urn:a", "Code");
        let compiled = CompiledSchema {
            target_namespace: "urn:a".to_string(),
            prefixes: vec![("urn:a".to_string(), "a".to_string())],
            types: HashMap::from([(name.clone(), simple_entry())]),
            elements: HashMap::new(),
            attributes: HashMap::new(),
            pending_imports: MultiMap::new(),
        };
        reg.commit(compiled.clone(), "urn:a", b"<schema/>").unwrap();
        assert!(reg.has_schema_for("urn:a"));
        assert_eq!(reg.namespaces.prefix_of("urn:a"), Some("a"));

        // identical re-commit is fine
        reg.commit(compiled.clone(), "urn:a", b"<schema/>").unwrap();

        // conflicting definition under the same QName is not
        let mut conflicting = compiled;
        conflicting.types.insert(
            name,
            TypeEntry::Simple(SimpleType {
                bases: vec![QName::local("string")],
                parse: None,
                restriction: true,
            }),
        );
        assert!(reg.commit(conflicting, "urn:a", b"<schema2/>").is_err());
    }

    #[test]
    fn test_anon_ids_are_monotonic() {
        let mut reg = SchemaRegistry::new();
        let a = reg.next_anon_id();
        let b = reg.next_anon_id();
        assert!(b > a);
    }
}
