//! Schema acquisition
//!
//! Discovers the schemas a document asks for through its
//! `xsi:schemaLocation` hints and defines the fetch boundary. The
//! breadth-first closure over imports/includes lives on
//! [`crate::parser::Parser`], which owns the registry; this module
//! provides the discovery walk and the [`SchemaFetcher`] contract with
//! a filesystem implementation.

use std::fs;
use std::path::PathBuf;

use url::Url;

use crate::document::XmlElement;
use crate::error::{Error, Result};
use crate::multimap::MultiMap;
use crate::XSI_NAMESPACE;

/// Fetches schema bodies by URL.
///
/// Implementations decide the transport; the acquisition driver wraps
/// failures with the `(namespace, url)` pair it was serving.
pub trait SchemaFetcher {
    /// Fetch the resource behind a URL
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed fetcher: resolves plain paths and `file://` URLs,
/// optionally against a base directory. Remote transports are out of
/// scope for the built-in fetcher.
#[derive(Debug, Default)]
pub struct FileFetcher {
    base_dir: Option<PathBuf>,
}

impl FileFetcher {
    /// Create a fetcher resolving paths as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against a base directory
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }
}

impl SchemaFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map_err(|_| Error::Xml(format!("'{}' is not a usable file URL", url)))?,
            Ok(parsed) => {
                return Err(Error::Xml(format!(
                    "scheme '{}' is not supported by the filesystem fetcher",
                    parsed.scheme()
                )));
            }
            // not a URL: treat as a filesystem path
            Err(_) => match &self.base_dir {
                Some(base) => base.join(url),
                None => PathBuf::from(url),
            },
        };
        Ok(fs::read(path)?)
    }
}

/// Collect `xsi:schemaLocation` hints from every element of a document.
///
/// Each attribute must split into exactly one `(namespace, url)` pair;
/// odd or longer token lists are rejected.
pub fn find_schema_locations(root: &XmlElement) -> Result<MultiMap<String, String>> {
    let mut found = MultiMap::new();
    collect_locations(root, &mut found)?;
    Ok(found)
}

fn collect_locations(element: &XmlElement, found: &mut MultiMap<String, String>) -> Result<()> {
    for attr in &element.attributes {
        let is_hint = attr.local == "schemaLocation"
            && (attr.namespace.as_deref() == Some(XSI_NAMESPACE)
                || attr.prefix.as_deref() == Some("xsi"));
        if !is_hint {
            continue;
        }
        let tokens: Vec<&str> = attr.value.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(Error::InvalidSchema(format!(
                "xsi:schemaLocation must hold exactly one namespace/location pair, found {} tokens",
                tokens.len()
            )));
        }
        found.insert(tokens[0].to_string(), tokens[1].to_string());
    }
    for child in &element.children {
        collect_locations(child, found)?;
    }
    Ok(())
}
