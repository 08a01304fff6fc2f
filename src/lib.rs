//! # typedxml
//!
//! Schema-aware XML parsing: validate documents against XML Schema
//! (XSD) definitions and decode them into typed, normalized trees.
//!
//! Schemas declare which elements and attributes may appear, their
//! types, their namespaces, and whether they repeat. typedxml compiles
//! them into per-parser registries, validates each document element
//! against the union of loaded schemas, coerces textual leaves into
//! native values (numbers, booleans, instants, byte arrays), and
//! collapses repeated children according to schema-declared
//! cardinalities.
//!
//! ## Example
//!
//! ```rust,ignore
//! use typedxml::{ParseOptions, Parser};
//!
//! let mut parser = Parser::new();
//! parser.add_schema("urn:invoice", std::fs::read("invoice.xsd")?.as_slice())?;
//!
//! let tree = parser.parse_str(
//!     &std::fs::read_to_string("invoice.xml")?,
//!     &ParseOptions::default(),
//! )?;
//! println!("{}", tree.to_json());
//! ```
//!
//! Schemas can also be acquired on demand from `xsi:schemaLocation`
//! hints by enabling `download_schemas` and supplying a
//! [`SchemaFetcher`]; the built-in [`FileFetcher`] serves local files.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquire;
pub mod builtins;
pub mod datetime;
pub mod document;
pub mod error;
pub mod limits;
pub mod multimap;
pub mod names;
pub mod parser;
pub mod schema;
pub mod validate;
pub mod value;

pub use acquire::{FileFetcher, SchemaFetcher};
pub use datetime::Timestamp;
pub use error::{Error, Result};
pub use limits::Limits;
pub use multimap::MultiMap;
pub use names::{QName, XML_NAMESPACE};
pub use parser::{ParseOptions, Parser};
pub use value::Value;

/// Version of the typedxml library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace (xsi)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
