//! Schema model: registries, the XSD compiler, and resolution helpers

pub mod compiler;
pub mod registry;
pub mod resolve;

pub use compiler::compile;
pub use registry::{
    AttrSpec, ChildSpec, ComplexType, CompiledSchema, ElementEntry, SchemaRegistry, SimpleType,
    TypeEntry,
};
