//! Resolution helpers
//!
//! Chase `ref` and base-type chains through the registry. Every lookup
//! that can branch (unions) returns a flat list so single and union
//! cases share one code path in the validator.

use std::collections::{HashMap, HashSet};

use crate::builtins::{builtin_parser, is_builtin, ValueParser};
use crate::error::{enumerate_allowed, Error, Result};
use crate::names::QName;
use crate::schema::registry::{AttrSpec, ChildSpec, SchemaRegistry, TypeEntry};

/// Upper bound on ref-chain hops; exceeding it means a reference cycle
const MAX_REF_HOPS: usize = 64;

/// A terminal reached by [`resolve_type`]
#[derive(Debug, Clone)]
pub enum ResolvedType<'r> {
    /// A built-in XSD type (prefixless local name)
    Builtin(QName),
    /// A declared type entry
    Entry(&'r QName, &'r TypeEntry),
}

/// Walk base chains from a type name, flattening unions into a list.
///
/// Complex types contribute themselves followed by their base chain;
/// simple types contribute only their chain terminals. Dangling
/// references fail with [`Error::UnknownType`].
pub fn resolve_type<'r>(
    registry: &'r SchemaRegistry,
    name: &QName,
) -> Result<Vec<ResolvedType<'r>>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    resolve_type_into(registry, name, &mut visited, &mut out)?;
    Ok(out)
}

/// `visited` holds only the active derivation path, so diamonds (two
/// union members sharing a base) are fine while true cycles fail.
fn resolve_type_into<'r>(
    registry: &'r SchemaRegistry,
    name: &QName,
    visited: &mut HashSet<QName>,
    out: &mut Vec<ResolvedType<'r>>,
) -> Result<()> {
    if !visited.insert(name.clone()) {
        return Err(Error::InvalidSchema(format!(
            "cyclic type derivation through '{}'",
            name
        )));
    }
    let result = (|| {
        if name.namespace.is_none() && is_builtin(&name.local) {
            out.push(ResolvedType::Builtin(name.clone()));
            return Ok(());
        }
        let (key, entry) = registry
            .types
            .get_key_value(name)
            .ok_or_else(|| Error::UnknownType {
                name: name.to_string(),
                path: String::new(),
            })?;
        match entry {
            TypeEntry::Simple(simple) => {
                if simple.bases.is_empty() {
                    out.push(ResolvedType::Entry(key, entry));
                } else {
                    for base in &simple.bases {
                        resolve_type_into(registry, base, visited, out)?;
                    }
                }
            }
            TypeEntry::Complex(complex) => {
                out.push(ResolvedType::Entry(key, entry));
                if let Some(base) = &complex.base {
                    resolve_type_into(registry, base, visited, out)?;
                }
            }
        }
        Ok(())
    })();
    visited.remove(name);
    result
}

/// Walk base chains collecting value parsers; unions contribute one
/// parser per member in declaration order. An empty result means the
/// type is not simple-valued.
pub fn resolve_to_parse(registry: &SchemaRegistry, name: &QName) -> Result<Vec<ValueParser>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    resolve_to_parse_into(registry, name, &mut visited, &mut out)?;
    Ok(out)
}

fn resolve_to_parse_into(
    registry: &SchemaRegistry,
    name: &QName,
    visited: &mut HashSet<QName>,
    out: &mut Vec<ValueParser>,
) -> Result<()> {
    if !visited.insert(name.clone()) {
        return Err(Error::InvalidSchema(format!(
            "cyclic type derivation through '{}'",
            name
        )));
    }
    let result = (|| {
        if name.namespace.is_none() {
            if let Some(parser) = builtin_parser(&name.local) {
                out.push(parser);
                return Ok(());
            }
            if is_builtin(&name.local) {
                // anyType / anySimpleType carry no parser
                return Ok(());
            }
        }
        let entry = registry.types.get(name).ok_or_else(|| Error::UnknownType {
            name: name.to_string(),
            path: String::new(),
        })?;
        match entry {
            TypeEntry::Simple(simple) => {
                if let Some(parser) = simple.parse {
                    out.push(parser);
                } else {
                    for base in &simple.bases {
                        resolve_to_parse_into(registry, base, visited, out)?;
                    }
                }
            }
            TypeEntry::Complex(complex) => {
                if let Some(base) = &complex.base {
                    resolve_to_parse_into(registry, base, visited, out)?;
                }
            }
        }
        Ok(())
    })();
    visited.remove(name);
    result
}

/// The deepest non-empty attributes map along the base chain, if any
pub fn resolve_to_attributes<'r>(
    registry: &'r SchemaRegistry,
    name: &QName,
) -> Result<Option<&'r HashMap<QName, AttrSpec>>> {
    let mut deepest = None;
    for resolved in resolve_type(registry, name)? {
        if let ResolvedType::Entry(_, TypeEntry::Complex(complex)) = resolved {
            if !complex.attributes.is_empty() {
                deepest = Some(&complex.attributes);
            }
        }
    }
    Ok(deepest)
}

/// Walk ref chains through the global elements, tracking the most
/// recent cardinality default. Returns the terminal type name and the
/// effective `is_array`, with the default applied when the terminal
/// declaration leaves cardinality open. The registry entry itself is
/// never mutated.
pub fn resolve_element(
    registry: &SchemaRegistry,
    spec: &ChildSpec,
) -> Result<(QName, Option<bool>)> {
    let mut default = None;
    let mut current = spec.clone();
    for _ in 0..MAX_REF_HOPS {
        match current {
            ChildSpec::Ref {
                target,
                is_array_default,
            } => {
                if is_array_default.is_some() {
                    default = is_array_default;
                }
                current = registry
                    .elements
                    .get(&target)
                    .ok_or_else(|| Error::UnknownElement {
                        name: target.to_string(),
                        path: String::new(),
                        allowed: enumerate_allowed(
                            registry.elements.keys().map(|q| q.to_string()),
                        ),
                    })?
                    .clone();
            }
            ChildSpec::Inline {
                type_name,
                is_array,
            } => {
                return Ok((type_name, is_array.or(default)));
            }
        }
    }
    Err(Error::InvalidSchema(
        "element reference chain does not terminate".to_string(),
    ))
}

/// Walk attribute ref chains to a terminal type name
pub fn resolve_attribute(registry: &SchemaRegistry, spec: &AttrSpec) -> Result<QName> {
    let mut current = spec.clone();
    for _ in 0..MAX_REF_HOPS {
        match current {
            AttrSpec::Type(type_name) => return Ok(type_name),
            AttrSpec::Ref(target) => {
                current = registry
                    .attributes
                    .get(&target)
                    .ok_or_else(|| Error::UnknownType {
                        name: target.to_string(),
                        path: String::new(),
                    })?
                    .clone();
            }
        }
    }
    Err(Error::InvalidSchema(
        "attribute reference chain does not terminate".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::registry::{ComplexType, SimpleType};

    fn registry_with(types: Vec<(QName, TypeEntry)>) -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        for (name, entry) in types {
            reg.types.insert(name, entry);
        }
        reg
    }

    fn simple(bases: Vec<QName>) -> TypeEntry {
        TypeEntry::Simple(SimpleType {
            bases,
            parse: None,
            restriction: true,
        })
    }

    #[test]
    fn test_resolve_to_parse_through_base_chain() {
        let reg = registry_with(vec![(
            QName::namespaced("urn:t", "MyInt"),
            simple(vec![QName::local("int")]),
        )]);
        let parsers = resolve_to_parse(&reg, &QName::namespaced("urn:t", "MyInt")).unwrap();
        assert_eq!(parsers.len(), 1);
        assert_eq!(
            parsers[0]("42").unwrap(),
            crate::value::Value::Int(42)
        );
    }

    #[test]
    fn test_union_yields_parser_per_member() {
        let reg = registry_with(vec![(
            QName::namespaced("urn:t", "Code"),
            simple(vec![QName::local("int"), QName::local("string")]),
        )]);
        let parsers = resolve_to_parse(&reg, &QName::namespaced("urn:t", "Code")).unwrap();
        assert_eq!(parsers.len(), 2);
        assert!(parsers[0]("x").is_err());
        assert!(parsers[1]("x").is_ok());
    }

    #[test]
    fn test_dangling_reference() {
        let reg = SchemaRegistry::new();
        let err = resolve_to_parse(&reg, &QName::namespaced("urn:t", "Nope")).unwrap_err();
        assert!(matches!(err, Error::UnknownType { .. }));
    }

    #[test]
    fn test_diamond_union_is_not_a_cycle() {
        // both members derive from the same builtin; that shared base
        // must not be mistaken for a reference cycle
        let a = QName::namespaced("urn:t", "A");
        let b = QName::namespaced("urn:t", "B");
        let u = QName::namespaced("urn:t", "U");
        let reg = registry_with(vec![
            (a.clone(), simple(vec![QName::local("int")])),
            (b.clone(), simple(vec![QName::local("int")])),
            (u.clone(), simple(vec![a, b])),
        ]);
        let parsers = resolve_to_parse(&reg, &u).unwrap();
        assert_eq!(parsers.len(), 2);
    }

    #[test]
    fn test_cyclic_derivation_detected() {
        let a = QName::namespaced("urn:t", "A");
        let b = QName::namespaced("urn:t", "B");
        let reg = registry_with(vec![
            (a.clone(), simple(vec![b.clone()])),
            (b, simple(vec![a.clone()])),
        ]);
        assert!(matches!(
            resolve_to_parse(&reg, &a),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_resolve_element_applies_default() {
        let mut reg = SchemaRegistry::new();
        let target = QName::namespaced("urn:t", "item");
        reg.elements.insert(
            target.clone(),
            ChildSpec::Inline {
                type_name: QName::local("int"),
                is_array: None,
            },
        );

        let spec = ChildSpec::Ref {
            target: target.clone(),
            is_array_default: Some(true),
        };
        let (type_name, is_array) = resolve_element(&reg, &spec).unwrap();
        assert_eq!(type_name, QName::local("int"));
        assert_eq!(is_array, Some(true));

        // registry entry stays untouched
        match reg.elements.get(&target).unwrap() {
            ChildSpec::Inline { is_array, .. } => assert_eq!(*is_array, None),
            _ => panic!("entry changed shape"),
        }
    }

    #[test]
    fn test_resolve_element_own_cardinality_wins() {
        let mut reg = SchemaRegistry::new();
        reg.elements.insert(
            QName::namespaced("urn:t", "item"),
            ChildSpec::Inline {
                type_name: QName::local("int"),
                is_array: Some(false),
            },
        );
        let spec = ChildSpec::Ref {
            target: QName::namespaced("urn:t", "item"),
            is_array_default: Some(true),
        };
        let (_, is_array) = resolve_element(&reg, &spec).unwrap();
        assert_eq!(is_array, Some(false));
    }

    #[test]
    fn test_resolve_attribute_ref_chain() {
        let mut reg = SchemaRegistry::new();
        let global = QName::namespaced("urn:t", "kind");
        reg.attributes
            .insert(global.clone(), AttrSpec::Type(QName::local("string")));
        let resolved = resolve_attribute(&reg, &AttrSpec::Ref(global)).unwrap();
        assert_eq!(resolved, QName::local("string"));
    }

    #[test]
    fn test_deepest_attributes_map_wins() {
        let base = QName::namespaced("urn:t", "Base");
        let derived = QName::namespaced("urn:t", "Derived");
        let mut base_type = ComplexType::default();
        base_type
            .attributes
            .insert(QName::local("id"), AttrSpec::Type(QName::local("string")));
        let derived_type = ComplexType {
            base: Some(base.clone()),
            ..Default::default()
        };
        let reg = registry_with(vec![
            (base, TypeEntry::Complex(base_type)),
            (derived.clone(), TypeEntry::Complex(derived_type)),
        ]);

        let attrs = resolve_to_attributes(&reg, &derived).unwrap().unwrap();
        assert!(attrs.contains_key(&QName::local("id")));
    }

    #[test]
    fn test_deepest_attributes_shadow_the_derived_ones() {
        // both levels declare attributes; the walk keeps the last
        // non-empty map, so the base's shadows the derived type's own
        let base = QName::namespaced("urn:t", "Base");
        let derived = QName::namespaced("urn:t", "Derived");
        let mut base_type = ComplexType::default();
        base_type
            .attributes
            .insert(QName::local("id"), AttrSpec::Type(QName::local("string")));
        let mut derived_type = ComplexType {
            base: Some(base.clone()),
            ..Default::default()
        };
        derived_type
            .attributes
            .insert(QName::local("code"), AttrSpec::Type(QName::local("int")));
        let reg = registry_with(vec![
            (base, TypeEntry::Complex(base_type)),
            (derived.clone(), TypeEntry::Complex(derived_type)),
        ]);

        let attrs = resolve_to_attributes(&reg, &derived).unwrap().unwrap();
        assert!(attrs.contains_key(&QName::local("id")));
        assert!(!attrs.contains_key(&QName::local("code")));
    }
}
