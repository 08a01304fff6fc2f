//! XSD compiler
//!
//! Walks a parsed schema tree and produces a [`CompiledSchema`] batch:
//! named complex and simple types, global elements and attributes, and
//! the pending imports/includes keyed by namespace. Compilation is
//! destructive: every recognized construct is removed from the input
//! tree, and anything left over at the end is reported as
//! `UnsupportedSchema` — the mechanism by which unrecognized XSD syntax
//! is detected instead of silently ignored.

use std::collections::HashMap;

use log::debug;

use crate::document::XmlElement;
use crate::error::{Error, Result};
use crate::multimap::MultiMap;
use crate::names::{QName, XML_NAMESPACE};
use crate::schema::registry::{
    AttrSpec, ChildSpec, CompiledSchema, ComplexType, SchemaRegistry, SimpleType, TypeEntry,
};
use crate::XSD_NAMESPACE;

/// Facet local names; recognized and discarded (facet enforcement is
/// out of scope, only the base chain is kept).
const FACETS: &[&str] = &[
    "enumeration",
    "pattern",
    "length",
    "minLength",
    "maxLength",
    "whiteSpace",
    "minInclusive",
    "maxInclusive",
    "minExclusive",
    "maxExclusive",
    "totalDigits",
    "fractionDigits",
];

/// Schema-root attributes consumed without effect on the model
const BENIGN_ROOT_ATTRS: &[&str] = &[
    "elementFormDefault",
    "attributeFormDefault",
    "version",
    "id",
    "finalDefault",
    "blockDefault",
];

/// Compile one schema document against a registry.
///
/// `declared_uri` is the namespace the schema was requested under; it
/// must agree with the schema's own `targetNamespace` when one is
/// declared. The registry is only consulted (prefix conflicts, anonymous
/// type ids); all produced definitions are staged in the returned
/// [`CompiledSchema`] for the caller to commit atomically.
pub fn compile(
    registry: &mut SchemaRegistry,
    declared_uri: &str,
    root: XmlElement,
) -> Result<CompiledSchema> {
    Compiler::new(registry, declared_uri, root)?.run()
}

struct Compiler<'a> {
    registry: &'a mut SchemaRegistry,
    root: XmlElement,
    target_namespace: String,
    /// Per-schema prefix bound to the XSD namespace; stripped during
    /// compilation so built-in type names are stored prefixless
    xs_prefix: Option<String>,
    /// Schema-local prefix → URI bindings ("" is the default namespace)
    bindings: HashMap<String, String>,
    out: CompiledSchema,
}

impl<'a> Compiler<'a> {
    fn new(
        registry: &'a mut SchemaRegistry,
        declared_uri: &str,
        mut root: XmlElement,
    ) -> Result<Self> {
        if root.local != "schema" || root.namespace.as_deref() != Some(XSD_NAMESPACE) {
            return Err(Error::InvalidSchema(format!(
                "expected an XSD schema root, got '{}'",
                root.local
            )));
        }

        let target_namespace = match root.take_attribute_value("targetNamespace") {
            Some(tns) if tns != declared_uri => {
                return Err(Error::InvalidSchema(format!(
                    "schema declares targetNamespace '{}' but was added under '{}'",
                    tns, declared_uri
                )));
            }
            Some(tns) => tns,
            None => declared_uri.to_string(),
        };
        for attr in BENIGN_ROOT_ATTRS {
            root.take_attribute_value(attr);
        }

        let bindings = root.namespace_decls.clone();
        let mut xs_prefix = None;
        let mut prefixes: Vec<(String, String)> = Vec::new();
        for (prefix, uri) in &bindings {
            if uri == XSD_NAMESPACE {
                if !prefix.is_empty() {
                    xs_prefix = Some(prefix.clone());
                }
                continue;
            }
            if prefix.is_empty() || uri == XML_NAMESPACE {
                continue;
            }
            // Conflicts surface now so a bad schema commits nothing.
            if let Some(existing) = registry.namespaces.prefix_of(uri) {
                if existing != prefix {
                    return Err(Error::NamespaceConflict {
                        uri: uri.clone(),
                        existing: existing.to_string(),
                        requested: prefix.clone(),
                    });
                }
            }
            if let Some((_, first)) = prefixes.iter().find(|(u, _)| u == uri) {
                if first != prefix {
                    return Err(Error::NamespaceConflict {
                        uri: uri.clone(),
                        existing: first.clone(),
                        requested: prefix.clone(),
                    });
                }
            }
            prefixes.push((uri.clone(), prefix.clone()));
        }

        let out = CompiledSchema {
            target_namespace: target_namespace.clone(),
            prefixes,
            types: HashMap::new(),
            elements: HashMap::new(),
            attributes: HashMap::new(),
            pending_imports: MultiMap::new(),
        };

        Ok(Self {
            registry,
            root,
            target_namespace,
            xs_prefix,
            bindings,
            out,
        })
    }

    fn run(mut self) -> Result<CompiledSchema> {
        let mut root = std::mem::take(&mut self.root);
        strip_annotations(&mut root);

        self.collect_imports(&mut root)?;

        for element in root.take_children("element") {
            let (name, entry) = self.compile_element_decl(element, true, None)?;
            self.out.elements.insert(name, entry);
        }
        for attribute in root.take_children("attribute") {
            let (name, spec) = self.compile_attribute_decl(attribute, true)?;
            self.out.attributes.insert(name, spec);
        }
        for complex in root.take_children("complexType") {
            self.compile_named_complex_type(complex)?;
        }
        for simple in root.take_children("simpleType") {
            self.compile_named_simple_type(simple)?;
        }

        if !root.is_consumed() {
            return Err(Error::UnsupportedSchema {
                schema: self.target_namespace.clone(),
                residue: root.residue(),
            });
        }

        debug!(
            "compiled schema '{}': {} types, {} elements, {} attributes, {} pending imports",
            self.target_namespace,
            self.out.types.len(),
            self.out.elements.len(),
            self.out.attributes.len(),
            self.out.pending_imports.len()
        );
        Ok(self.out)
    }

    /// Collect `<import>` pairs keyed by their namespace and
    /// `<include>` locations keyed by the current target namespace.
    fn collect_imports(&mut self, root: &mut XmlElement) -> Result<()> {
        for mut import in root.take_children("import") {
            strip_annotations(&mut import);
            let namespace = import.take_attribute_value("namespace");
            let location = import.take_attribute_value("schemaLocation");
            if !import.is_consumed() {
                return Err(Error::UnsupportedSchema {
                    schema: self.target_namespace.clone(),
                    residue: format!("import with {}", import.residue()),
                });
            }
            if let (Some(namespace), Some(location)) = (namespace, location) {
                self.out.pending_imports.insert(namespace, location);
            }
        }
        for mut include in root.take_children("include") {
            strip_annotations(&mut include);
            let location = include
                .take_attribute_value("schemaLocation")
                .ok_or_else(|| {
                    Error::InvalidSchema("include requires a schemaLocation".to_string())
                })?;
            if !include.is_consumed() {
                return Err(Error::UnsupportedSchema {
                    schema: self.target_namespace.clone(),
                    residue: format!("include with {}", include.residue()),
                });
            }
            self.out
                .pending_imports
                .insert(self.target_namespace.clone(), location);
        }
        Ok(())
    }

    /// Resolve a schema-local name (`xs:int`, `tns:Code`, `Code`) to a
    /// QName using the per-schema prefix bindings. The XSD prefix maps
    /// into the prefixless built-in space.
    fn resolve_qname(&self, value: &str) -> Result<QName> {
        match value.split_once(':') {
            Some((prefix, local)) => {
                if Some(prefix) == self.xs_prefix.as_deref() {
                    return Ok(QName::local(local));
                }
                if prefix == "xml" {
                    return Ok(QName::namespaced(XML_NAMESPACE, local));
                }
                let uri = self.bindings.get(prefix).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "reference '{}' uses undeclared prefix '{}'",
                        value, prefix
                    ))
                })?;
                if uri == XSD_NAMESPACE {
                    Ok(QName::local(local))
                } else {
                    Ok(QName::namespaced(uri.clone(), local))
                }
            }
            None => match self.bindings.get("") {
                Some(uri) if uri == XSD_NAMESPACE => Ok(QName::local(value)),
                Some(uri) => Ok(QName::namespaced(uri.clone(), value)),
                // Schemas commonly reference their own globals without a
                // default namespace declaration.
                None => Ok(QName::namespaced(self.target_namespace.clone(), value)),
            },
        }
    }

    /// Compile an `<element>` declaration, global or inside a content
    /// model. `container_default` is the cardinality inherited from a
    /// repeated `<sequence>`/`<choice>`.
    fn compile_element_decl(
        &mut self,
        mut element: XmlElement,
        global: bool,
        container_default: Option<bool>,
    ) -> Result<(QName, ChildSpec)> {
        strip_annotations(&mut element);
        element.take_attribute_value("minOccurs");
        let own_max = element
            .take_attribute_value("maxOccurs")
            .map(|v| parse_max_occurs(&v))
            .transpose()?;

        if let Some(ref_value) = element.take_attribute_value("ref") {
            let target = self.resolve_qname(&ref_value)?;
            self.check_consumed(&element, "element")?;
            let key = if global {
                let key = QName::namespaced(self.target_namespace.clone(), target.local.clone());
                if key == target {
                    return Err(Error::InvalidSchema(format!(
                        "global element '{}' references itself",
                        key
                    )));
                }
                key
            } else {
                target.clone()
            };
            return Ok((
                key,
                ChildSpec::Ref {
                    target,
                    is_array_default: own_max.or(container_default),
                },
            ));
        }

        let name = element.take_attribute_value("name").ok_or_else(|| {
            Error::InvalidSchema("element requires a name or a ref".to_string())
        })?;
        let qname = QName::namespaced(self.target_namespace.clone(), name.clone());

        let type_name = match element.take_attribute_value("type") {
            Some(type_ref) => self.resolve_qname(&type_ref)?,
            None => {
                // Anonymous inline type: promote under a synthesized name
                // and rewrite the element to use it.
                if let Some(nested) = element.take_child("complexType") {
                    let synthesized = self.synthesize_type_name(&name);
                    let compiled = self.compile_complex_type_body(nested)?;
                    self.out
                        .types
                        .insert(synthesized.clone(), TypeEntry::Complex(compiled));
                    synthesized
                } else if let Some(nested) = element.take_child("simpleType") {
                    let synthesized = self.synthesize_type_name(&name);
                    let compiled = self.compile_simple_type_body(nested)?;
                    self.out
                        .types
                        .insert(synthesized.clone(), TypeEntry::Simple(compiled));
                    synthesized
                } else {
                    return Err(Error::InvalidSchema(format!(
                        "element '{}' requires a type or a nested type definition",
                        name
                    )));
                }
            }
        };
        self.check_consumed(&element, "element")?;

        Ok((
            qname,
            ChildSpec::Inline {
                type_name,
                is_array: own_max.or(container_default),
            },
        ))
    }

    fn synthesize_type_name(&mut self, element_local: &str) -> QName {
        let id = self.registry.next_anon_id();
        QName::namespaced(
            self.target_namespace.clone(),
            format!("{}-type-{}", element_local, id),
        )
    }

    /// Compile an `<attribute>` declaration. Global declarations are
    /// qualified by the target namespace; local ones are unqualified,
    /// matching how they appear in instance documents.
    fn compile_attribute_decl(
        &mut self,
        mut attribute: XmlElement,
        global: bool,
    ) -> Result<(QName, AttrSpec)> {
        strip_annotations(&mut attribute);
        attribute.take_attribute_value("use");
        attribute.take_attribute_value("form");

        if let Some(ref_value) = attribute.take_attribute_value("ref") {
            if global {
                return Err(Error::InvalidSchema(
                    "global attribute requires a name".to_string(),
                ));
            }
            let target = self.resolve_qname(&ref_value)?;
            self.check_consumed(&attribute, "attribute")?;
            return Ok((target.clone(), AttrSpec::Ref(target)));
        }

        let name = attribute.take_attribute_value("name").ok_or_else(|| {
            Error::InvalidSchema("attribute requires a name or a ref".to_string())
        })?;
        let key = if global {
            QName::namespaced(self.target_namespace.clone(), name.clone())
        } else {
            QName::local(name.clone())
        };

        let type_name = match attribute.take_attribute_value("type") {
            Some(type_ref) => self.resolve_qname(&type_ref)?,
            None => {
                if let Some(nested) = attribute.take_child("simpleType") {
                    let synthesized = self.synthesize_type_name(&name);
                    let compiled = self.compile_simple_type_body(nested)?;
                    self.out
                        .types
                        .insert(synthesized.clone(), TypeEntry::Simple(compiled));
                    synthesized
                } else {
                    QName::local("anySimpleType")
                }
            }
        };
        self.check_consumed(&attribute, "attribute")?;
        Ok((key, AttrSpec::Type(type_name)))
    }

    fn compile_named_complex_type(&mut self, mut complex: XmlElement) -> Result<()> {
        let name = complex
            .take_attribute_value("name")
            .ok_or_else(|| Error::InvalidSchema("top-level complexType requires a name".to_string()))?;
        let qname = QName::namespaced(self.target_namespace.clone(), name);
        let compiled = self.compile_complex_type_body(complex)?;
        self.out.types.insert(qname, TypeEntry::Complex(compiled));
        Ok(())
    }

    fn compile_named_simple_type(&mut self, mut simple: XmlElement) -> Result<()> {
        let name = simple
            .take_attribute_value("name")
            .ok_or_else(|| Error::InvalidSchema("top-level simpleType requires a name".to_string()))?;
        let qname = QName::namespaced(self.target_namespace.clone(), name);
        let compiled = self.compile_simple_type_body(simple)?;
        self.out.types.insert(qname, TypeEntry::Simple(compiled));
        Ok(())
    }

    fn compile_complex_type_body(&mut self, mut complex: XmlElement) -> Result<ComplexType> {
        strip_annotations(&mut complex);
        complex.take_attribute_value("mixed");
        let mut out = ComplexType::default();

        if let Some(sequence) = complex.take_child("sequence") {
            self.process_sequence(sequence, &mut out)?;
        }
        if let Some(choice) = complex.take_child("choice") {
            self.process_choice(choice, &mut out, None)?;
        }

        let content = match (
            complex.take_child("simpleContent"),
            complex.take_child("complexContent"),
        ) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidSchema(
                    "complexType cannot have both simpleContent and complexContent".to_string(),
                ));
            }
            (simple, complexc) => simple.or(complexc),
        };
        if let Some(mut content) = content {
            strip_annotations(&mut content);
            let (mut derivation, restriction) = match (
                content.take_child("restriction"),
                content.take_child("extension"),
            ) {
                (Some(r), None) => (r, true),
                (None, Some(e)) => (e, false),
                _ => {
                    return Err(Error::InvalidSchema(
                        "content derivation requires exactly one of restriction or extension"
                            .to_string(),
                    ));
                }
            };
            self.check_consumed(&content, &content.local.clone())?;

            strip_annotations(&mut derivation);
            let base_ref = derivation.take_attribute_value("base").ok_or_else(|| {
                Error::InvalidSchema("restriction/extension requires a base".to_string())
            })?;
            let base = self.resolve_qname(&base_ref)?;
            if !(base.namespace.is_none() && base.local == "anyType") {
                out.base = Some(base);
            }
            out.restriction = restriction;

            if let Some(sequence) = derivation.take_child("sequence") {
                self.process_sequence(sequence, &mut out)?;
            }
            if let Some(choice) = derivation.take_child("choice") {
                self.process_choice(choice, &mut out, None)?;
            }
            for attribute in derivation.take_children("attribute") {
                let (name, spec) = self.compile_attribute_decl(attribute, false)?;
                out.attributes.insert(name, spec);
            }
            for facet in FACETS {
                derivation.take_children(facet);
            }
            self.check_consumed(&derivation, "content derivation")?;
        }

        for attribute in complex.take_children("attribute") {
            let (name, spec) = self.compile_attribute_decl(attribute, false)?;
            out.attributes.insert(name, spec);
        }
        // Group references are ignored per the supported-XSD subset.
        complex.take_children("group");
        complex.take_children("attributeGroup");

        self.check_consumed(&complex, "complexType")?;

        if out.any_children && !out.children.is_empty() {
            return Err(Error::InvalidSchema(
                "a type cannot combine named children with an any-element wildcard".to_string(),
            ));
        }
        Ok(out)
    }

    /// A `<sequence>` may contain `<element>` children, one `<choice>`,
    /// and one `<any>`; everything is merged into the same children map.
    fn process_sequence(&mut self, mut sequence: XmlElement, out: &mut ComplexType) -> Result<()> {
        strip_annotations(&mut sequence);
        sequence.take_attribute_value("minOccurs");
        let container_default = match sequence.take_attribute_value("maxOccurs") {
            Some(v) => parse_max_occurs(&v)?.then_some(true),
            None => None,
        };

        for element in sequence.take_children("element") {
            let (name, spec) = self.compile_element_decl(element, false, container_default)?;
            out.children.insert(name, spec);
        }
        if let Some(choice) = sequence.take_child("choice") {
            self.process_choice(choice, out, container_default)?;
        }
        if let Some(any) = sequence.take_child("any") {
            self.process_any(any, out, container_default)?;
        }
        self.check_consumed(&sequence, "sequence")
    }

    fn process_choice(
        &mut self,
        mut choice: XmlElement,
        out: &mut ComplexType,
        inherited_default: Option<bool>,
    ) -> Result<()> {
        strip_annotations(&mut choice);
        choice.take_attribute_value("minOccurs");
        let container_default = match choice.take_attribute_value("maxOccurs") {
            Some(v) => parse_max_occurs(&v)?.then_some(true),
            None => inherited_default,
        };
        for element in choice.take_children("element") {
            let (name, spec) = self.compile_element_decl(element, false, container_default)?;
            out.children.insert(name, spec);
        }
        if let Some(any) = choice.take_child("any") {
            self.process_any(any, out, container_default)?;
        }
        self.check_consumed(&choice, "choice")
    }

    /// `<any>` admits every global element; its own maxOccurs wins over
    /// the container default. One wildcard per type.
    fn process_any(
        &mut self,
        mut any: XmlElement,
        out: &mut ComplexType,
        container_default: Option<bool>,
    ) -> Result<()> {
        strip_annotations(&mut any);
        any.take_attribute_value("namespace");
        any.take_attribute_value("processContents");
        any.take_attribute_value("minOccurs");
        let own_max = any
            .take_attribute_value("maxOccurs")
            .map(|v| parse_max_occurs(&v))
            .transpose()?;
        if out.any_children {
            return Err(Error::InvalidSchema(
                "at most one any-element wildcard per type".to_string(),
            ));
        }
        out.any_children = true;
        out.is_array = own_max.map(Some).unwrap_or(container_default);
        self.check_consumed(&any, "any")
    }

    fn compile_simple_type_body(&mut self, mut simple: XmlElement) -> Result<SimpleType> {
        strip_annotations(&mut simple);

        if let Some(mut restriction) = simple.take_child("restriction") {
            strip_annotations(&mut restriction);
            let base_ref = restriction.take_attribute_value("base").ok_or_else(|| {
                Error::InvalidSchema("simpleType restriction requires a base".to_string())
            })?;
            let base = self.resolve_qname(&base_ref)?;
            for facet in FACETS {
                restriction.take_children(facet);
            }
            self.check_consumed(&restriction, "restriction")?;
            self.check_consumed(&simple, "simpleType")?;

            let bases = if base.namespace.is_none() && base.local == "anySimpleType" {
                Vec::new()
            } else {
                vec![base]
            };
            return Ok(SimpleType {
                bases,
                parse: None,
                restriction: true,
            });
        }

        if let Some(mut union) = simple.take_child("union") {
            strip_annotations(&mut union);
            let members = union.take_attribute_value("memberTypes").ok_or_else(|| {
                Error::InvalidSchema("union requires memberTypes".to_string())
            })?;
            self.check_consumed(&union, "union")?;
            self.check_consumed(&simple, "simpleType")?;

            let bases = members
                .split_whitespace()
                .map(|member| self.resolve_qname(member))
                .collect::<Result<Vec<_>>>()?;
            if bases.is_empty() {
                return Err(Error::InvalidSchema(
                    "union memberTypes is empty".to_string(),
                ));
            }
            return Ok(SimpleType {
                bases,
                parse: None,
                restriction: false,
            });
        }

        Err(Error::UnsupportedSchema {
            schema: self.target_namespace.clone(),
            residue: format!("simpleType with {}", simple.residue()),
        })
    }

    fn check_consumed(&self, element: &XmlElement, what: &str) -> Result<()> {
        if element.is_consumed() {
            Ok(())
        } else {
            Err(Error::UnsupportedSchema {
                schema: self.target_namespace.clone(),
                residue: format!("{} with {}", what, element.residue()),
            })
        }
    }
}

fn strip_annotations(element: &mut XmlElement) {
    element.take_children("annotation");
}

fn parse_max_occurs(value: &str) -> Result<bool> {
    if value == "unbounded" {
        return Ok(true);
    }
    value
        .parse::<u64>()
        .map(|n| n > 1)
        .map_err(|_| Error::InvalidSchema(format!("invalid maxOccurs '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;
    use crate::limits::Limits;

    fn compile_str(registry: &mut SchemaRegistry, uri: &str, xsd: &str) -> Result<CompiledSchema> {
        let root = parse_document(xsd.as_bytes(), &Limits::default()).unwrap();
        compile(registry, uri, root)
    }

    #[test]
    fn test_global_element_with_builtin_type() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:t="urn:t" targetNamespace="urn:t">
                 <xs:element name="amount" type="xs:decimal"/>
               </xs:schema>"#,
        )
        .unwrap();

        let entry = compiled
            .elements
            .get(&QName::namespaced("urn:t", "amount"))
            .unwrap();
        match entry {
            ChildSpec::Inline {
                type_name,
                is_array,
            } => {
                assert_eq!(*type_name, QName::local("decimal"));
                assert_eq!(*is_array, None);
            }
            _ => panic!("expected inline entry"),
        }
        assert_eq!(compiled.prefixes, vec![("urn:t".to_string(), "t".to_string())]);
    }

    #[test]
    fn test_unhandled_construct_is_residue() {
        let mut reg = SchemaRegistry::new();
        let result = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:notation name="n" public="p"/>
               </xs:schema>"#,
        );
        assert!(matches!(result, Err(Error::UnsupportedSchema { .. })));
    }

    #[test]
    fn test_list_simple_type_is_unsupported() {
        let mut reg = SchemaRegistry::new();
        let result = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:simpleType name="Codes"><xs:list itemType="xs:int"/></xs:simpleType>
               </xs:schema>"#,
        );
        assert!(matches!(result, Err(Error::UnsupportedSchema { .. })));
    }

    #[test]
    fn test_target_namespace_mismatch() {
        let mut reg = SchemaRegistry::new();
        let result = compile_str(
            &mut reg,
            "urn:other",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t"/>"#,
        );
        assert!(matches!(result, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_imports_and_includes_collected() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:import namespace="urn:b" schemaLocation="http://x/b.xsd"/>
                 <xs:include schemaLocation="http://x/t2.xsd"/>
               </xs:schema>"#,
        )
        .unwrap();

        assert!(compiled
            .pending_imports
            .contains(&"urn:b".to_string(), &"http://x/b.xsd".to_string()));
        assert!(compiled
            .pending_imports
            .contains(&"urn:t".to_string(), &"http://x/t2.xsd".to_string()));
    }

    #[test]
    fn test_anonymous_type_promotion() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:element name="box">
                   <xs:complexType>
                     <xs:sequence>
                       <xs:element name="item" type="xs:int" maxOccurs="unbounded"/>
                     </xs:sequence>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        )
        .unwrap();

        let entry = compiled
            .elements
            .get(&QName::namespaced("urn:t", "box"))
            .unwrap();
        let type_name = match entry {
            ChildSpec::Inline { type_name, .. } => type_name.clone(),
            _ => panic!("expected inline entry"),
        };
        assert!(type_name.local.starts_with("box-type-"));

        let promoted = compiled.types.get(&type_name).unwrap();
        match promoted {
            TypeEntry::Complex(ct) => {
                let item = ct
                    .children
                    .get(&QName::namespaced("urn:t", "item"))
                    .unwrap();
                match item {
                    ChildSpec::Inline { is_array, .. } => assert_eq!(*is_array, Some(true)),
                    _ => panic!("expected inline child"),
                }
            }
            _ => panic!("expected complex type"),
        }
    }

    #[test]
    fn test_repeated_sequence_sets_array_default() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:complexType name="Items">
                   <xs:sequence maxOccurs="unbounded">
                     <xs:element name="item" type="xs:string"/>
                   </xs:sequence>
                 </xs:complexType>
               </xs:schema>"#,
        )
        .unwrap();

        match compiled
            .types
            .get(&QName::namespaced("urn:t", "Items"))
            .unwrap()
        {
            TypeEntry::Complex(ct) => match ct
                .children
                .get(&QName::namespaced("urn:t", "item"))
                .unwrap()
            {
                ChildSpec::Inline { is_array, .. } => assert_eq!(*is_array, Some(true)),
                _ => panic!("expected inline child"),
            },
            _ => panic!("expected complex type"),
        }
    }

    #[test]
    fn test_union_simple_type() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:simpleType name="Code">
                   <xs:union memberTypes="xs:int xs:string"/>
                 </xs:simpleType>
               </xs:schema>"#,
        )
        .unwrap();

        match compiled
            .types
            .get(&QName::namespaced("urn:t", "Code"))
            .unwrap()
        {
            TypeEntry::Simple(st) => {
                assert_eq!(st.bases, vec![QName::local("int"), QName::local("string")]);
                assert!(!st.restriction);
            }
            _ => panic!("expected simple type"),
        }
    }

    #[test]
    fn test_simple_content_extension_with_attribute() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:complexType name="Price">
                   <xs:simpleContent>
                     <xs:extension base="xs:decimal">
                       <xs:attribute name="currency" type="xs:string"/>
                     </xs:extension>
                   </xs:simpleContent>
                 </xs:complexType>
               </xs:schema>"#,
        )
        .unwrap();

        match compiled
            .types
            .get(&QName::namespaced("urn:t", "Price"))
            .unwrap()
        {
            TypeEntry::Complex(ct) => {
                assert_eq!(ct.base, Some(QName::local("decimal")));
                assert!(!ct.restriction);
                assert!(ct.attributes.contains_key(&QName::local("currency")));
            }
            _ => panic!("expected complex type"),
        }
    }

    #[test]
    fn test_any_inherits_container_default() {
        let mut reg = SchemaRegistry::new();
        let compiled = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
                 <xs:complexType name="Open">
                   <xs:sequence maxOccurs="unbounded">
                     <xs:any processContents="lax"/>
                   </xs:sequence>
                 </xs:complexType>
                 <xs:complexType name="Single">
                   <xs:sequence>
                     <xs:any/>
                   </xs:sequence>
                 </xs:complexType>
               </xs:schema>"#,
        )
        .unwrap();

        match compiled.types.get(&QName::namespaced("urn:t", "Open")).unwrap() {
            TypeEntry::Complex(ct) => {
                assert!(ct.any_children);
                assert_eq!(ct.is_array, Some(true));
            }
            _ => panic!("expected complex type"),
        }
        match compiled.types.get(&QName::namespaced("urn:t", "Single")).unwrap() {
            TypeEntry::Complex(ct) => {
                assert!(ct.any_children);
                assert_eq!(ct.is_array, None);
            }
            _ => panic!("expected complex type"),
        }
    }

    #[test]
    fn test_prefix_conflict_detected_before_commit() {
        let mut reg = SchemaRegistry::new();
        reg.namespaces.declare("urn:shared", "s").unwrap();
        let result = compile_str(
            &mut reg,
            "urn:t",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:other="urn:shared" targetNamespace="urn:t"/>"#,
        );
        assert!(matches!(result, Err(Error::NamespaceConflict { .. })));
    }
}
