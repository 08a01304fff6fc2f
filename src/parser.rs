//! The parser facade
//!
//! A [`Parser`] owns a schema registry, a fetcher, and limits. Schemas
//! enter through [`Parser::add_schema`] (directly) or are acquired on
//! demand from `xsi:schemaLocation` hints during [`Parser::parse_str`]
//! when downloading is enabled. Parsing validates the document against
//! the union of committed schemas and returns the typed, normalized
//! tree.

use std::collections::{BTreeMap, HashMap, VecDeque};

use log::debug;

use crate::acquire::{find_schema_locations, FileFetcher, SchemaFetcher};
use crate::document::{parse_document, XmlElement};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::multimap::MultiMap;
use crate::schema::registry::SchemaRegistry;
use crate::validate::Validator;
use crate::value::Value;

/// Options for one parse call, with xml2js-compatible reserved keys
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Allow the acquisition driver to fetch schemas referenced by
    /// `xsi:schemaLocation`. Off by default: fetching remote schema
    /// URLs leaks identifying network traffic to whoever hosts them.
    pub download_schemas: bool,
    /// Emit object keys as `prefix:local` instead of bare local names
    pub output_with_namespace: bool,
    /// Reserved key holding an element's attributes
    pub attr_key: String,
    /// Reserved key holding an element's character content
    pub char_key: String,
    /// Reserved key holding an element's namespace info during
    /// validation (stripped from the output)
    pub xmlns_key: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            download_schemas: false,
            output_with_namespace: false,
            attr_key: "$".to_string(),
            char_key: "_".to_string(),
            xmlns_key: "$ns".to_string(),
        }
    }
}

impl ParseOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable schema downloading
    pub fn with_download_schemas(mut self, download: bool) -> Self {
        self.download_schemas = download;
        self
    }

    /// Emit namespaced output keys
    pub fn with_output_with_namespace(mut self, with_namespace: bool) -> Self {
        self.output_with_namespace = with_namespace;
        self
    }

    /// Override the attributes reserved key
    pub fn with_attr_key(mut self, key: impl Into<String>) -> Self {
        self.attr_key = key.into();
        self
    }

    /// Override the character-content reserved key
    pub fn with_char_key(mut self, key: impl Into<String>) -> Self {
        self.char_key = key.into();
        self
    }

    /// Override the namespace-info reserved key
    pub fn with_xmlns_key(mut self, key: impl Into<String>) -> Self {
        self.xmlns_key = key.into();
        self
    }
}

/// Schema-aware XML parser. Registries live as long as the instance
/// and only grow; drop the parser to discard its schema knowledge.
pub struct Parser {
    registry: SchemaRegistry,
    fetcher: Box<dyn SchemaFetcher>,
    limits: Limits,
}

impl Parser {
    /// Create a parser with the filesystem fetcher and default limits
    pub fn new() -> Self {
        Self {
            registry: SchemaRegistry::new(),
            fetcher: Box::new(FileFetcher::new()),
            limits: Limits::default(),
        }
    }

    /// Replace the schema fetcher
    pub fn with_fetcher(mut self, fetcher: Box<dyn SchemaFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the resource limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The registry backing this parser
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Schema bodies committed so far, keyed by namespace URI
    pub fn known_schemas(&self) -> &MultiMap<String, Vec<u8>> {
        &self.registry.parsed_schemas
    }

    /// Compile and commit a schema body under a namespace URI.
    ///
    /// Returns the imports/includes the schema still needs, keyed by
    /// namespace. Re-adding an already-committed `(uri, body)` pair is
    /// a no-op returning an empty map.
    pub fn add_schema(&mut self, uri: &str, body: &[u8]) -> Result<MultiMap<String, String>> {
        if self
            .registry
            .parsed_schemas
            .contains(&uri.to_string(), &body.to_vec())
        {
            return Ok(MultiMap::new());
        }
        let root = parse_document(body, &self.limits)?;
        let compiled = crate::schema::compile(&mut self.registry, uri, root)?;
        let pending = compiled.pending_imports.clone();
        self.registry.commit(compiled, uri, body)?;
        Ok(pending)
    }

    /// Fetch a schema from a URL and commit it under a namespace URI
    pub fn download_and_add_schema(
        &mut self,
        uri: &str,
        url: &str,
    ) -> Result<MultiMap<String, String>> {
        debug!("fetching schema for '{}' from '{}'", uri, url);
        let body = self.fetcher.fetch(url).map_err(|err| Error::Http {
            uri: uri.to_string(),
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        self.registry
            .downloaded_schemas
            .insert(uri.to_string(), url.to_string());
        self.add_schema(uri, &body)
    }

    /// Collect the `xsi:schemaLocation` hints of a document
    pub fn find_schemas(&self, document: &[u8]) -> Result<MultiMap<String, String>> {
        let root = parse_document(document, &self.limits)?;
        find_schema_locations(&root)
    }

    /// Parse, validate, and normalize a document
    pub fn parse_str(&mut self, document: &str, options: &ParseOptions) -> Result<Value> {
        self.parse_bytes(document.as_bytes(), options)
    }

    /// Parse, validate, and normalize a document given as bytes
    pub fn parse_bytes(&mut self, document: &[u8], options: &ParseOptions) -> Result<Value> {
        let root = parse_document(document, &self.limits)?;
        self.populate_schemas(&root, options)?;

        let validator = Validator::new(&self.registry, options);
        let mut locals = Vec::new();
        let mut ancestor_uris = Vec::new();
        let value = walk_element(
            &self.registry,
            options,
            &validator,
            &root,
            &mut locals,
            &mut ancestor_uris,
        )?;

        let root_key = output_key(&self.registry, options, &root)?;
        Ok(Value::Map(BTreeMap::from([(root_key, value)])))
    }

    /// Satisfy a document's schema hints: verify presence, or fetch
    /// breadth-first until the import closure is complete. Cycles are
    /// broken by the downloaded/parsed bookkeeping; two different URLs
    /// for one namespace inside a closure are an error.
    fn populate_schemas(&mut self, root: &XmlElement, options: &ParseOptions) -> Result<()> {
        let hints = find_schema_locations(root)?;
        let mut closure_urls: HashMap<String, String> = HashMap::new();
        let mut queue: VecDeque<(String, String)> = VecDeque::new();

        for (namespace, urls) in hints.iter() {
            for url in urls {
                record_location(&mut closure_urls, namespace, url)?;
            }
            if self.registry.has_schema_for(namespace) {
                continue;
            }
            if !options.download_schemas {
                return Err(Error::MissingSchema {
                    uri: namespace.clone(),
                });
            }
            queue.push_back((namespace.clone(), closure_urls[namespace].clone()));
        }

        let mut fetched = 0usize;
        while let Some((namespace, url)) = queue.pop_front() {
            if self.registry.downloaded_schemas.contains(&namespace, &url) {
                continue;
            }
            if self.registry.has_schema_for(&namespace) {
                continue;
            }
            fetched += 1;
            self.limits.check_schema_downloads(fetched)?;

            let pending = self.download_and_add_schema(&namespace, &url)?;
            for (pending_ns, pending_urls) in pending.iter() {
                for pending_url in pending_urls {
                    record_location(&mut closure_urls, pending_ns, pending_url)?;
                    queue.push_back((pending_ns.clone(), pending_url.clone()));
                }
            }
        }
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn record_location(
    closure_urls: &mut HashMap<String, String>,
    namespace: &str,
    url: &str,
) -> Result<()> {
    match closure_urls.get(namespace) {
        Some(existing) if existing != url => Err(Error::MismatchedSchemaLocation {
            uri: namespace.to_string(),
            first: existing.clone(),
            second: url.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            closure_urls.insert(namespace.to_string(), url.to_string());
            Ok(())
        }
    }
}

/// Convert an element to its generic object form and validate it,
/// children first. The validator sees attributes as raw strings (or
/// uri/local objects when prefixed), character content under the char
/// key, namespace info under the xmlns key, and child groups as
/// ordered lists keyed by output name.
fn walk_element(
    registry: &SchemaRegistry,
    options: &ParseOptions,
    validator: &Validator<'_>,
    element: &XmlElement,
    locals: &mut Vec<String>,
    ancestor_uris: &mut Vec<Option<String>>,
) -> Result<Value> {
    locals.push(element.local.clone());

    let mut map: BTreeMap<String, Value> = BTreeMap::new();

    let mut ns_info = BTreeMap::new();
    ns_info.insert("local".to_string(), Value::String(element.local.clone()));
    if let Some(uri) = &element.namespace {
        ns_info.insert("uri".to_string(), Value::String(uri.clone()));
    }
    map.insert(options.xmlns_key.clone(), Value::Map(ns_info));

    if !element.attributes.is_empty() {
        let mut attrs = BTreeMap::new();
        for attr in &element.attributes {
            let entry = if attr.prefix.is_some() {
                let mut qualified = BTreeMap::new();
                qualified.insert("value".to_string(), Value::String(attr.value.clone()));
                qualified.insert("local".to_string(), Value::String(attr.local.clone()));
                if let Some(uri) = &attr.namespace {
                    qualified.insert("uri".to_string(), Value::String(uri.clone()));
                }
                Value::Map(qualified)
            } else {
                Value::String(attr.value.clone())
            };
            attrs.insert(attr.name.clone(), entry);
        }
        map.insert(options.attr_key.clone(), Value::Map(attrs));
    }

    if let Some(text) = &element.text {
        map.insert(
            options.char_key.clone(),
            Value::String(text.trim().to_string()),
        );
    }

    ancestor_uris.push(element.namespace.clone());
    for child in &element.children {
        let validated = walk_element(registry, options, validator, child, locals, ancestor_uris)?;
        let key = output_key(registry, options, child)?;
        let group = map.entry(key).or_insert_with(|| Value::List(Vec::new()));
        if let Value::List(items) = group {
            items.push(validated);
        }
    }
    ancestor_uris.pop();

    let result = validator.validate_element(locals, ancestor_uris, Value::Map(map))?;
    locals.pop();
    Ok(result)
}

/// The output key of an element: its local name, or `prefix:local`
/// when namespaced output is requested
fn output_key(
    registry: &SchemaRegistry,
    options: &ParseOptions,
    element: &XmlElement,
) -> Result<String> {
    match (&element.namespace, options.output_with_namespace) {
        (Some(uri), true) => {
            let prefix =
                registry
                    .namespaces
                    .prefix_of(uri)
                    .ok_or_else(|| Error::UnknownNamespace {
                        uri: uri.clone(),
                        path: format!("/{}", element.local),
                    })?;
            Ok(format!("{}:{}", prefix, element.local))
        }
        _ => Ok(element.local.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ParseOptions::default();
        assert!(!options.download_schemas);
        assert!(!options.output_with_namespace);
        assert_eq!(options.attr_key, "$");
        assert_eq!(options.char_key, "_");
        assert_eq!(options.xmlns_key, "$ns");
    }

    #[test]
    fn test_options_builders() {
        let options = ParseOptions::new()
            .with_download_schemas(true)
            .with_output_with_namespace(true)
            .with_attr_key("@")
            .with_char_key("#text")
            .with_xmlns_key("#ns");
        assert!(options.download_schemas);
        assert!(options.output_with_namespace);
        assert_eq!(options.attr_key, "@");
        assert_eq!(options.char_key, "#text");
        assert_eq!(options.xmlns_key, "#ns");
    }

    #[test]
    fn test_record_location_mismatch() {
        let mut urls = HashMap::new();
        record_location(&mut urls, "urn:a", "http://x/a.xsd").unwrap();
        record_location(&mut urls, "urn:a", "http://x/a.xsd").unwrap();
        let err = record_location(&mut urls, "urn:a", "http://y/a.xsd").unwrap_err();
        assert!(matches!(err, Error::MismatchedSchemaLocation { .. }));
    }
}
