//! XML document parsing into a namespace-resolved element tree
//!
//! Both instance documents and schema documents enter through this
//! module. Element and attribute prefixes are resolved against the
//! in-scope `xmlns` declarations during the parse, and each element
//! keeps the declarations it introduced (the schema compiler reads them
//! off the root). The `take_*` accessors support the compiler's
//! consume-and-check-residue strategy.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::limits::Limits;

/// An attribute with its prefix resolved to a namespace URI
#[derive(Debug, Clone)]
pub struct XmlAttribute {
    /// Name as written in the document (e.g. `x:kind`)
    pub name: String,
    /// Prefix part, if any
    pub prefix: Option<String>,
    /// Local part
    pub local: String,
    /// Resolved namespace URI (None for unprefixed attributes)
    pub namespace: Option<String>,
    /// Attribute value
    pub value: String,
}

/// An element with resolved namespaces and its own xmlns declarations
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    /// Prefix part of the tag name, if any
    pub prefix: Option<String>,
    /// Local part of the tag name
    pub local: String,
    /// Resolved namespace URI (default namespace applies)
    pub namespace: Option<String>,
    /// Attributes, xmlns declarations excluded
    pub attributes: Vec<XmlAttribute>,
    /// Concatenated character content
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<XmlElement>,
    /// xmlns declarations introduced on this element: prefix → URI,
    /// with the default namespace under the empty-string key
    pub namespace_decls: HashMap<String, String>,
}

impl XmlElement {
    fn new(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            namespace: None,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            namespace_decls: HashMap::new(),
        }
    }

    /// Remove and return an attribute by local name
    pub fn take_attribute(&mut self, local: &str) -> Option<XmlAttribute> {
        let idx = self.attributes.iter().position(|a| a.local == local)?;
        Some(self.attributes.remove(idx))
    }

    /// Remove and return the value of an attribute by local name
    pub fn take_attribute_value(&mut self, local: &str) -> Option<String> {
        self.take_attribute(local).map(|a| a.value)
    }

    /// Remove and return all children with the given local name
    pub fn take_children(&mut self, local: &str) -> Vec<XmlElement> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].local == local {
                taken.push(self.children.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }

    /// Remove and return at most one child with the given local name
    pub fn take_child(&mut self, local: &str) -> Option<XmlElement> {
        let idx = self.children.iter().position(|c| c.local == local)?;
        Some(self.children.remove(idx))
    }

    /// Whether every attribute and child has been consumed
    pub fn is_consumed(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// Describe whatever was not consumed, for residue errors
    pub fn residue(&self) -> String {
        let mut parts = Vec::new();
        for attr in &self.attributes {
            parts.push(format!("attribute '{}'", attr.name));
        }
        for child in &self.children {
            parts.push(format!("element '{}'", child.local));
        }
        parts.join(", ")
    }
}

/// Namespace scope stack built from nested xmlns declarations
struct ScopeStack {
    frames: Vec<HashMap<String, String>>,
}

impl ScopeStack {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn push(&mut self, decls: HashMap<String, String>) {
        self.frames.push(decls);
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    /// Resolve a prefix, innermost scope first; "" is the default
    /// namespace. The `xml` prefix is bound implicitly per the XML spec.
    fn resolve(&self, prefix: &str) -> Option<&str> {
        for frame in self.frames.iter().rev() {
            if let Some(uri) = frame.get(prefix) {
                // An empty URI un-declares the default namespace
                return if uri.is_empty() { None } else { Some(uri) };
            }
        }
        if prefix == "xml" {
            return Some(crate::names::XML_NAMESPACE);
        }
        None
    }
}

/// Parse an XML document into an element tree
pub fn parse_document(xml: &[u8], limits: &Limits) -> Result<XmlElement> {
    limits.check_xml_size(xml.len())?;

    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut scopes = ScopeStack::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                limits.check_xml_depth(stack.len() + 1)?;
                let (element, decls) = read_element(&start, &mut scopes)?;
                scopes.push(decls);
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                limits.check_xml_depth(stack.len() + 1)?;
                let (element, _decls) = read_element(&start, &mut scopes)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                scopes.pop();
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    let content = text
                        .unescape()
                        .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                    if !content.trim().is_empty() {
                        match &mut current.text {
                            Some(existing) => existing.push_str(&content),
                            None => current.text = Some(content.to_string()),
                        }
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&data).to_string();
                    match &mut current.text {
                        Some(existing) => existing.push_str(&content),
                        None => current.text = Some(content),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {} // declarations, comments, processing instructions
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(Error::Xml("unclosed elements at end of input".to_string()));
    }
    root.ok_or_else(|| Error::Xml("empty document".to_string()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(Error::Xml("multiple root elements".to_string()));
    } else {
        *root = Some(element);
    }
    Ok(())
}

/// Read a start tag: split off xmlns declarations, collect attributes,
/// and resolve the element and attribute namespaces against the scope
/// that includes this element's own declarations.
fn read_element(
    start: &BytesStart<'_>,
    scopes: &mut ScopeStack,
) -> Result<(XmlElement, HashMap<String, String>)> {
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))?
        .to_string();

    let mut element = XmlElement::new("");
    let mut decls: HashMap<String, String> = HashMap::new();

    for attr_result in start.attributes() {
        let attr =
            attr_result.map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;
        let attr_name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?
            .to_string();
        let attr_value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?
            .to_string();

        if attr_name == "xmlns" {
            decls.insert(String::new(), attr_value);
        } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
            decls.insert(prefix.to_string(), attr_value);
        } else {
            let (prefix, local) = match attr_name.split_once(':') {
                Some((p, l)) => (Some(p.to_string()), l.to_string()),
                None => (None, attr_name.clone()),
            };
            element.attributes.push(XmlAttribute {
                name: attr_name,
                prefix,
                local,
                namespace: None,
                value: attr_value,
            });
        }
    }

    let (prefix, local) = match raw_name.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, raw_name),
    };
    element.prefix = prefix;
    element.local = local;
    element.namespace_decls = decls.clone();

    // Resolve with this element's declarations temporarily in scope; the
    // caller re-pushes them for Start events so children see them too.
    scopes.push(decls.clone());
    resolve_names(&mut element, scopes)?;
    scopes.pop();

    Ok((element, decls))
}

fn resolve_names(element: &mut XmlElement, scopes: &ScopeStack) -> Result<()> {
    element.namespace = match &element.prefix {
        Some(prefix) => Some(
            scopes
                .resolve(prefix)
                .ok_or_else(|| Error::Xml(format!("undeclared prefix '{}'", prefix)))?
                .to_string(),
        ),
        None => scopes.resolve("").map(|uri| uri.to_string()),
    };

    for attr in &mut element.attributes {
        if let Some(prefix) = &attr.prefix {
            attr.namespace = Some(
                scopes
                    .resolve(prefix)
                    .ok_or_else(|| Error::Xml(format!("undeclared prefix '{}'", prefix)))?
                    .to_string(),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> XmlElement {
        parse_document(xml.as_bytes(), &Limits::default()).unwrap()
    }

    #[test]
    fn test_simple_tree() {
        let root = parse("<root><child>text</child></root>");
        assert_eq!(root.local, "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local, "child");
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_namespace_resolution() {
        let root = parse(r#"<n:root xmlns:n="urn:a"><n:child/></n:root>"#);
        assert_eq!(root.namespace.as_deref(), Some("urn:a"));
        assert_eq!(root.children[0].namespace.as_deref(), Some("urn:a"));
    }

    #[test]
    fn test_default_namespace() {
        let root = parse(r#"<root xmlns="urn:d"><child/></root>"#);
        assert_eq!(root.namespace.as_deref(), Some("urn:d"));
        assert_eq!(root.children[0].namespace.as_deref(), Some("urn:d"));
    }

    #[test]
    fn test_default_namespace_not_applied_to_attributes() {
        let root = parse(r#"<root xmlns="urn:d" a="1" xmlns:p="urn:p" p:b="2"/>"#);
        let a = root.attributes.iter().find(|x| x.local == "a").unwrap();
        assert_eq!(a.namespace, None);
        let b = root.attributes.iter().find(|x| x.local == "b").unwrap();
        assert_eq!(b.namespace.as_deref(), Some("urn:p"));
    }

    #[test]
    fn test_namespace_decls_captured() {
        let root = parse(r#"<root xmlns="urn:d" xmlns:x="urn:x"/>"#);
        assert_eq!(root.namespace_decls.get(""), Some(&"urn:d".to_string()));
        assert_eq!(root.namespace_decls.get("x"), Some(&"urn:x".to_string()));
    }

    #[test]
    fn test_undeclared_prefix_fails() {
        let result = parse_document(b"<x:root/>", &Limits::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_take_children() {
        let mut root = parse("<root><a/><b/><a/></root>");
        let taken = root.take_children("a");
        assert_eq!(taken.len(), 2);
        assert_eq!(root.children.len(), 1);
        assert!(!root.is_consumed());
        root.take_child("b").unwrap();
        assert!(root.is_consumed());
    }

    #[test]
    fn test_take_attribute() {
        let mut root = parse(r#"<root name="n" type="t"/>"#);
        assert_eq!(root.take_attribute_value("name").as_deref(), Some("n"));
        assert_eq!(root.take_attribute_value("name"), None);
        assert_eq!(root.residue(), "attribute 'type'");
    }

    #[test]
    fn test_depth_limit() {
        let mut limits = Limits::default();
        limits.max_xml_depth = 2;
        let result = parse_document(b"<a><b><c/></b></a>", &limits);
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_implicit_xml_prefix() {
        let root = parse(r#"<root xml:lang="en"/>"#);
        let lang = &root.attributes[0];
        assert_eq!(
            lang.namespace.as_deref(),
            Some("http://www.w3.org/XML/1998/namespace")
        );
    }

    #[test]
    fn test_scoped_redeclaration() {
        let root = parse(r#"<a xmlns:p="urn:1"><b xmlns:p="urn:2"><p:c/></b><p:d/></a>"#);
        let b = &root.children[0];
        assert_eq!(b.children[0].namespace.as_deref(), Some("urn:2"));
        assert_eq!(root.children[1].namespace.as_deref(), Some("urn:1"));
    }
}
