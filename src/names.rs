//! Qualified names and the namespace-prefix table
//!
//! A [`QName`] pairs a namespace URI with a local name and keys every
//! registry lookup. The [`NamespaceTable`] records a single prefix per
//! URI for the life of a registry; conflicting declarations across
//! schemas are a hard error.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// XML namespace, pre-seeded with the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Qualified name: a `(namespace-uri, local-name)` pair.
///
/// Built-in XSD type names carry no namespace; everything else is keyed
/// by its schema's target namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI (None for built-ins and unqualified names)
    pub namespace: Option<String>,
    /// Local name
    pub local: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local: local.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    /// Canonical form: `<uri>|<local>`, or the bare local name
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}|{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Split a prefixed name into optional prefix and local part
pub fn split_prefixed(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Registry-wide mapping from namespace URI to a single prefix.
///
/// Each URI binds to exactly one prefix across the life of the table.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    prefixes: HashMap<String, String>,
}

impl NamespaceTable {
    /// Create a table pre-seeded with the `xml` namespace
    pub fn new() -> Self {
        let mut prefixes = HashMap::new();
        prefixes.insert(XML_NAMESPACE.to_string(), "xml".to_string());
        Self { prefixes }
    }

    /// Record a URI → prefix binding.
    ///
    /// Re-declaring the same binding is a no-op; binding a known URI to a
    /// different prefix fails with [`Error::NamespaceConflict`].
    pub fn declare(&mut self, uri: &str, prefix: &str) -> Result<()> {
        match self.prefixes.get(uri) {
            Some(existing) if existing == prefix => Ok(()),
            Some(existing) => Err(Error::NamespaceConflict {
                uri: uri.to_string(),
                existing: existing.clone(),
                requested: prefix.to_string(),
            }),
            None => {
                self.prefixes.insert(uri.to_string(), prefix.to_string());
                Ok(())
            }
        }
    }

    /// Look up the prefix bound to a URI
    pub fn prefix_of(&self, uri: &str) -> Option<&str> {
        self.prefixes.get(uri).map(|s| s.as_str())
    }

    /// Reverse lookup: the URI a prefix is bound to
    pub fn uri_of(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, p)| p.as_str() == prefix)
            .map(|(uri, _)| uri.as_str())
    }

    /// Render a QName in prefixed form (`prefix:local`), falling back to
    /// the bare local name when the QName has no namespace.
    ///
    /// Fails with [`Error::UnknownNamespace`] when the URI has no prefix.
    pub fn prefixed(&self, qname: &QName) -> Result<String> {
        match &qname.namespace {
            None => Ok(qname.local.clone()),
            Some(uri) => match self.prefix_of(uri) {
                Some(prefix) => Ok(format!("{}:{}", prefix, qname.local)),
                None => Err(Error::UnknownNamespace {
                    uri: uri.clone(),
                    path: String::new(),
                }),
            },
        }
    }
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}
