//! Error types for typedxml
//!
//! One variant per failure band: schema input errors, wiring errors
//! (missing or conflicting schema locations), validation errors against
//! committed schemas, and value coercion errors. Validation and coercion
//! errors carry the namespaced XPath of the offending node.

use thiserror::Error;

/// Result type alias using the typedxml Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for typedxml operations
#[derive(Error, Debug)]
pub enum Error {
    /// A schema document is malformed or inconsistent
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A namespace URI is already bound to a different prefix
    #[error("namespace conflict: '{uri}' is bound to prefix '{existing}', cannot rebind to '{requested}'")]
    NamespaceConflict {
        /// The namespace URI
        uri: String,
        /// The prefix already recorded for the URI
        existing: String,
        /// The conflicting prefix from the new declaration
        requested: String,
    },

    /// A schema uses an XSD construct the compiler does not handle
    #[error("unsupported schema construct in '{schema}': {residue}")]
    UnsupportedSchema {
        /// Namespace URI of the schema being compiled
        schema: String,
        /// Description of the unconsumed node(s)
        residue: String,
    },

    /// A document requires a namespace no committed schema declares
    #[error("no schema known for namespace '{uri}'")]
    MissingSchema {
        /// The namespace URI without a schema
        uri: String,
    },

    /// Two different URLs were hinted for the same namespace in one closure
    #[error("mismatched schema locations for '{uri}': '{first}' vs '{second}'")]
    MismatchedSchemaLocation {
        /// The namespace URI
        uri: String,
        /// The URL recorded first
        first: String,
        /// The conflicting URL
        second: String,
    },

    /// Fetching a schema body failed
    #[error("failed to fetch schema for '{uri}' from '{url}': {reason}")]
    Http {
        /// Namespace the fetch was serving
        uri: String,
        /// URL that failed
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// An element or attribute sits in a namespace with no known prefix
    #[error("unknown namespace '{uri}' at {path}")]
    UnknownNamespace {
        /// The unregistered namespace URI
        uri: String,
        /// Namespaced XPath of the node
        path: String,
    },

    /// An element is not allowed by the enclosing type
    #[error("unknown element '{name}' at {path} (allowed: {allowed})")]
    UnknownElement {
        /// Qualified name of the offending element
        name: String,
        /// Namespaced XPath of the node
        path: String,
        /// Enumeration of the allowed children
        allowed: String,
    },

    /// A type reference does not resolve to any declaration
    #[error("unknown type '{name}' at {path}")]
    UnknownType {
        /// Canonical QName of the dangling reference
        name: String,
        /// Namespaced XPath of the referencing node
        path: String,
    },

    /// An attribute is not allowed by the element's type
    #[error("unexpected attribute '{name}' at {path} (allowed: {allowed})")]
    UnexpectedAttribute {
        /// Qualified name of the offending attribute
        name: String,
        /// Namespaced XPath of the node
        path: String,
        /// Enumeration of the allowed attributes
        allowed: String,
    },

    /// An element declared with a simple type carries child elements
    #[error("unexpected children at {path}")]
    UnexpectedChildren {
        /// Namespaced XPath of the node
        path: String,
    },

    /// A value appeared where the schema requires a different shape
    #[error("schema mismatch at {path}: {detail}")]
    SchemaMismatch {
        /// Namespaced XPath of the node
        path: String,
        /// What was expected vs found
        detail: String,
    },

    /// A leaf value could not be parsed to its declared type
    #[error("cannot coerce value at {path}: {detail}")]
    Coercion {
        /// Namespaced XPath of the node ("" until attached)
        path: String,
        /// Why the parse failed
        detail: String,
    },

    /// XML well-formedness or tokenizer error
    #[error("XML error: {0}")]
    Xml(String),

    /// A configured resource limit was exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a coercion error without location context
    pub fn coercion(detail: impl Into<String>) -> Self {
        Error::Coercion {
            path: String::new(),
            detail: detail.into(),
        }
    }

    /// Attach a namespaced XPath to errors raised below the validator.
    ///
    /// Only fills in an empty path; errors that already carry their
    /// location are returned unchanged.
    pub fn at(self, node_path: &str) -> Self {
        let fill = |path: String| {
            if path.is_empty() {
                node_path.to_string()
            } else {
                path
            }
        };
        match self {
            Error::Coercion { path, detail } => Error::Coercion {
                path: fill(path),
                detail,
            },
            Error::SchemaMismatch { path, detail } => Error::SchemaMismatch {
                path: fill(path),
                detail,
            },
            Error::UnknownType { name, path } => Error::UnknownType {
                name,
                path: fill(path),
            },
            Error::UnknownElement {
                name,
                path,
                allowed,
            } => Error::UnknownElement {
                name,
                path: fill(path),
                allowed,
            },
            Error::UnexpectedAttribute {
                name,
                path,
                allowed,
            } => Error::UnexpectedAttribute {
                name,
                path: fill(path),
                allowed,
            },
            Error::UnexpectedChildren { path } => Error::UnexpectedChildren { path: fill(path) },
            Error::UnknownNamespace { uri, path } => Error::UnknownNamespace {
                uri,
                path: fill(path),
            },
            other => other,
        }
    }
}

/// Render an allowed-name set for error messages
pub(crate) fn enumerate_allowed<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut all: Vec<String> = names.into_iter().map(|s| s.as_ref().to_string()).collect();
    all.sort();
    if all.is_empty() {
        "none".to_string()
    } else {
        all.join(", ")
    }
}
