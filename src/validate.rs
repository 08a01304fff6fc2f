//! Per-element validation and normalization
//!
//! The document walker invokes [`Validator::validate_element`] for each
//! element, bottom-up. The validator reconstructs the namespaced path
//! from the xmlns info, descends the schema from the global elements,
//! coerces attributes and character content to their declared types,
//! and collapses child groups that the schema marks as single-valued.
//! Union types are handled by trial: candidates are attempted in order
//! against a fresh copy each, the first success wins, and the last
//! failure surfaces when all candidates are exhausted.

use std::collections::{BTreeMap, HashMap};

use crate::builtins::ValueParser;
use crate::error::{enumerate_allowed, Error, Result};
use crate::names::QName;
use crate::parser::ParseOptions;
use crate::schema::registry::{ChildSpec, ComplexType, SchemaRegistry, TypeEntry};
use crate::schema::resolve::{
    resolve_attribute, resolve_element, resolve_to_attributes, resolve_to_parse, resolve_type,
    ResolvedType,
};
use crate::value::Value;

/// Schema-driven element validator
pub struct Validator<'a> {
    registry: &'a SchemaRegistry,
    options: &'a ParseOptions,
}

impl<'a> Validator<'a> {
    /// Create a validator over a registry with the given options
    pub fn new(registry: &'a SchemaRegistry, options: &'a ParseOptions) -> Self {
        Self { registry, options }
    }

    /// Validate and normalize one element.
    ///
    /// `locals` is the slash-free path of local names from the root to
    /// this element; `ancestor_uris` are the namespace URIs of every
    /// segment but the last. The element's own URI is read from its
    /// xmlns reserved key. Children of the element have already been
    /// validated when this runs.
    pub fn validate_element(
        &self,
        locals: &[String],
        ancestor_uris: &[Option<String>],
        value: Value,
    ) -> Result<Value> {
        let current_uri = self.read_xmlns_uri(&value);
        let mut uris: Vec<Option<String>> = ancestor_uris.to_vec();
        uris.push(current_uri);

        // Qualified path: the generic local-name path is only good
        // enough for the UnknownNamespace error itself.
        let generic_path = format!("/{}", locals.join("/"));
        let mut segments = Vec::with_capacity(locals.len());
        let mut qnames = Vec::with_capacity(locals.len());
        for (local, uri) in locals.iter().zip(&uris) {
            match uri {
                Some(uri) => {
                    let prefix = self.registry.namespaces.prefix_of(uri).ok_or_else(|| {
                        Error::UnknownNamespace {
                            uri: uri.clone(),
                            path: generic_path.clone(),
                        }
                    })?;
                    segments.push(format!("{}:{}", prefix, local));
                    qnames.push(QName::namespaced(uri.clone(), local.clone()));
                }
                None => {
                    segments.push(local.clone());
                    qnames.push(QName::local(local.clone()));
                }
            }
        }
        let path = format!("/{}", segments.join("/"));
        let path_to = |i: usize| format!("/{}", segments[..=i].join("/"));

        // Descend from the global elements to the map that must contain
        // the leaf.
        let mut children: &HashMap<QName, ChildSpec> = &self.registry.elements;
        for i in 0..qnames.len() - 1 {
            let spec = lookup_by_qname(children, &qnames[i]).ok_or_else(|| {
                Error::UnknownElement {
                    name: segments[i].clone(),
                    path: path_to(i),
                    allowed: self.enumerate_names(children.keys()),
                }
            })?;
            let (type_name, _) =
                resolve_element(self.registry, spec).map_err(|e| e.at(&path_to(i)))?;
            children = self
                .try_children(&type_name)
                .map_err(|e| e.at(&path_to(i)))?;
        }

        let leaf_qname = qnames.last().expect("path is never empty");
        let spec = lookup_by_qname(children, leaf_qname).ok_or_else(|| Error::UnknownElement {
            name: segments.last().unwrap().clone(),
            path: path.clone(),
            allowed: self.enumerate_names(children.keys()),
        })?;
        let (type_name, _) = resolve_element(self.registry, spec).map_err(|e| e.at(&path))?;

        let value = self.coerce_attributes(&type_name, value, &path)?;

        let parsers = resolve_to_parse(self.registry, &type_name).map_err(|e| e.at(&path))?;
        let mut result = if !parsers.is_empty() {
            self.try_parse(&parsers, value).map_err(|e| e.at(&path))?
        } else {
            let terminals = resolve_type(self.registry, &type_name).map_err(|e| e.at(&path))?;
            self.try_remove_arrays(&terminals, value, &path)?
        };

        if let Some(map) = result.as_map_mut() {
            map.remove(&self.options.xmlns_key);
        }
        Ok(result)
    }

    fn read_xmlns_uri(&self, value: &Value) -> Option<String> {
        value
            .as_map()?
            .get(&self.options.xmlns_key)?
            .as_map()?
            .get("uri")?
            .as_str()
            .map(|s| s.to_string())
    }

    /// Pick the children map for descending through a type: the first
    /// resolved type with an any-element wildcard opens up the whole
    /// global-elements map, the first with named children restricts to
    /// those. A type with neither should have been a leaf.
    fn try_children(&self, type_name: &QName) -> Result<&'a HashMap<QName, ChildSpec>> {
        let terminals = resolve_type(self.registry, type_name)?;
        for resolved in &terminals {
            if let ResolvedType::Entry(_, TypeEntry::Complex(complex)) = resolved {
                if complex.any_children {
                    return Ok(&self.registry.elements);
                }
            }
        }
        for resolved in &terminals {
            if let ResolvedType::Entry(_, TypeEntry::Complex(complex)) = resolved {
                if !complex.children.is_empty() {
                    return Ok(&complex.children);
                }
            }
        }
        Err(Error::UnexpectedChildren {
            path: String::new(),
        })
    }

    /// Coerce, filter, and rename the attributes of an element node.
    ///
    /// Schema-wiring attributes (`xmlns*`, `xsi:*`) are dropped, the
    /// rest must appear in the type's attributes map. Values are
    /// rewritten in place under their output name; an emptied
    /// attributes object is removed entirely.
    fn coerce_attributes(&self, type_name: &QName, mut value: Value, path: &str) -> Result<Value> {
        let Some(map) = value.as_map_mut() else {
            return Ok(value);
        };
        let Some(attrs_value) = map.remove(&self.options.attr_key) else {
            return Ok(value);
        };
        let Value::Map(attrs) = attrs_value else {
            return Err(Error::SchemaMismatch {
                path: path.to_string(),
                detail: "attributes entry is not an object".to_string(),
            });
        };

        let allowed = resolve_to_attributes(self.registry, type_name).map_err(|e| e.at(path))?;
        let mut out = BTreeMap::new();
        for (raw_name, raw_value) in attrs {
            if raw_name.starts_with("xmlns") || raw_name.starts_with("xsi:") {
                continue;
            }
            let (namespace, local, lexical) = match raw_value {
                Value::String(s) => (None, raw_name.clone(), s),
                Value::Map(m) => {
                    let namespace = m
                        .get("uri")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string());
                    let local = m
                        .get("local")
                        .and_then(|v| v.as_str())
                        .unwrap_or(&raw_name)
                        .to_string();
                    let lexical = m
                        .get("value")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    (namespace, local, lexical)
                }
                _ => {
                    return Err(Error::SchemaMismatch {
                        path: path.to_string(),
                        detail: format!("attribute '{}' has a non-scalar value", raw_name),
                    })
                }
            };
            let qname = QName::new(namespace, local);

            let spec = allowed
                .and_then(|a| lookup_by_qname(a, &qname))
                .ok_or_else(|| Error::UnexpectedAttribute {
                    name: raw_name.clone(),
                    path: path.to_string(),
                    allowed: self
                        .enumerate_names(allowed.map(|a| a.keys()).into_iter().flatten()),
                })?;
            let attr_type = resolve_attribute(self.registry, spec).map_err(|e| e.at(path))?;
            let parsers = resolve_to_parse(self.registry, &attr_type).map_err(|e| e.at(path))?;
            let parsed = if parsers.is_empty() {
                Value::String(lexical)
            } else {
                self.try_parse(&parsers, Value::String(lexical))
                    .map_err(|e| e.at(path))?
            };

            let out_name = if self.options.output_with_namespace && qname.namespace.is_some() {
                self.registry
                    .namespaces
                    .prefixed(&qname)
                    .map_err(|e| e.at(path))?
            } else {
                qname.local.clone()
            };
            out.insert(out_name, parsed);
        }

        if !out.is_empty() {
            map.insert(self.options.attr_key.clone(), Value::Map(out));
        }
        Ok(value)
    }

    /// Trial-parse a simple-typed value: the i-th parser runs on the
    /// i-th attempt against a fresh copy, first success wins, last
    /// error surfaces.
    pub fn try_parse(&self, parsers: &[ValueParser], value: Value) -> Result<Value> {
        let mut last_err = None;
        for parser in parsers.iter() {
            match self.apply_parser(*parser, value.clone()) {
                Ok(parsed) => return Ok(parsed),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::coercion("no parser for simple type")))
    }

    fn apply_parser(&self, parser: ValueParser, value: Value) -> Result<Value> {
        match value {
            Value::String(s) => parser(&s),
            Value::Map(mut map) => {
                let has_attrs = map.contains_key(&self.options.attr_key);
                let has_char = map.contains_key(&self.options.char_key);
                let content_keys = map
                    .keys()
                    .filter(|k| {
                        **k != self.options.xmlns_key
                            && **k != self.options.attr_key
                            && **k != self.options.char_key
                    })
                    .count();
                if content_keys > 0 {
                    return Err(Error::SchemaMismatch {
                        path: String::new(),
                        detail: "child elements where a simple value was expected".to_string(),
                    });
                }
                if has_char {
                    let lexical = match map.get(&self.options.char_key) {
                        Some(Value::String(s)) => s.clone(),
                        _ => {
                            return Err(Error::SchemaMismatch {
                                path: String::new(),
                                detail: "character content is not text".to_string(),
                            })
                        }
                    };
                    let parsed = parser(&lexical)?;
                    if has_attrs {
                        map.insert(self.options.char_key.clone(), parsed);
                        Ok(Value::Map(map))
                    } else {
                        Ok(parsed)
                    }
                } else if has_attrs {
                    // attributes without character content: the empty
                    // string is the content, decoded in place
                    let parsed = parser("")?;
                    map.insert(self.options.char_key.clone(), parsed);
                    Ok(Value::Map(map))
                } else {
                    // empty element: the empty string is the content
                    parser("")
                }
            }
            _ => Err(Error::SchemaMismatch {
                path: String::new(),
                detail: "value already decoded where text was expected".to_string(),
            }),
        }
    }

    /// Collapse child groups to singletons where the schema does not
    /// declare an array. Candidates from a union are attempted in order
    /// against a fresh copy; the last error surfaces when all fail.
    pub fn try_remove_arrays(
        &self,
        terminals: &[ResolvedType<'_>],
        value: Value,
        path: &str,
    ) -> Result<Value> {
        let candidates: Vec<&ComplexType> = terminals
            .iter()
            .filter_map(|resolved| match resolved {
                ResolvedType::Entry(_, TypeEntry::Complex(complex)) => Some(complex),
                _ => None,
            })
            .collect();

        if candidates.is_empty() {
            // Simple type without a parser (anySimpleType chain): the
            // value passes through, but child elements are still wrong.
            if self.group_keys(&value).next().is_some() {
                return Err(Error::UnexpectedChildren {
                    path: path.to_string(),
                });
            }
            return Ok(value);
        }

        let mut last_err = None;
        for candidate in candidates {
            match self.remove_arrays_with(candidate, value.clone(), path) {
                Ok(collapsed) => return Ok(collapsed),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.expect("at least one candidate was attempted"))
    }

    fn remove_arrays_with(
        &self,
        complex: &ComplexType,
        mut value: Value,
        path: &str,
    ) -> Result<Value> {
        let group_names: Vec<String> = self.group_keys(&value).collect();
        let Some(map) = value.as_map_mut() else {
            return Ok(value);
        };

        for group_name in group_names {
            let qname = self.qualify_group_key(&group_name, path)?;
            let is_array = if complex.any_children {
                if lookup_by_qname(&self.registry.elements, &qname).is_none() {
                    return Err(Error::UnknownElement {
                        name: group_name.clone(),
                        path: path.to_string(),
                        allowed: self.enumerate_names(self.registry.elements.keys()),
                    });
                }
                complex.is_array.unwrap_or(false)
            } else {
                let spec =
                    lookup_by_qname(&complex.children, &qname).ok_or_else(|| {
                        Error::UnknownElement {
                            name: group_name.clone(),
                            path: path.to_string(),
                            allowed: self.enumerate_names(complex.children.keys()),
                        }
                    })?;
                let (_, is_array) = resolve_element(self.registry, spec)?;
                is_array.unwrap_or(false)
            };

            if !is_array {
                let group = map.get_mut(&group_name).expect("key taken from this map");
                let Value::List(items) = group else {
                    continue; // already collapsed
                };
                if items.len() != 1 {
                    return Err(Error::SchemaMismatch {
                        path: format!("{}/{}", path, group_name),
                        detail: format!(
                            "expected a single occurrence of '{}', found {}",
                            group_name,
                            items.len()
                        ),
                    });
                }
                let single = items.pop().expect("length checked");
                *group = single;
            }
        }
        Ok(value)
    }

    /// Child-group keys of an element object (reserved keys excluded)
    fn group_keys<'v>(&'v self, value: &'v Value) -> impl Iterator<Item = String> + 'v {
        value
            .as_map()
            .into_iter()
            .flat_map(|m| m.keys())
            .filter(move |k| {
                **k != self.options.attr_key
                    && **k != self.options.char_key
                    && **k != self.options.xmlns_key
            })
            .cloned()
    }

    /// Turn an output group key back into a QName. Prefixed keys go
    /// through the prefix table; bare keys match by local name.
    fn qualify_group_key(&self, key: &str, path: &str) -> Result<QName> {
        match key.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.registry.namespaces.uri_of(prefix).ok_or_else(|| {
                    Error::UnknownNamespace {
                        uri: format!("prefix '{}'", prefix),
                        path: path.to_string(),
                    }
                })?;
                Ok(QName::namespaced(uri.to_string(), local))
            }
            None => Ok(QName::local(key)),
        }
    }

    fn enumerate_names<'q>(&self, names: impl Iterator<Item = &'q QName>) -> String {
        enumerate_allowed(names.map(|q| {
            self.registry
                .namespaces
                .prefixed(q)
                .unwrap_or_else(|_| q.to_string())
        }))
    }
}

/// Exact QName lookup with a unique-local fallback.
///
/// The fallback covers keys that lost their namespace on the way
/// through the output tree (bare local group names); an explicit
/// namespace mismatch still fails.
fn lookup_by_qname<'m, V>(map: &'m HashMap<QName, V>, qname: &QName) -> Option<&'m V> {
    if let Some(found) = map.get(qname) {
        return Some(found);
    }
    let mut matches = map.iter().filter(|(key, _)| key.local == qname.local);
    let (key, found) = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    match (&qname.namespace, &key.namespace) {
        (Some(a), Some(b)) if a != b => None,
        _ => Some(found),
    }
}
