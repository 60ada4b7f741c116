//! In-memory module-schema model and snapshot codec.
//!
//! One `ModuleSchema` holds the full type graph of a loaded schema module:
//! types, fields, properties, nesting, generic instantiations, constants,
//! and declaration tokens. The matching engine reads two of these in
//! lockstep; the only mutation surface is constant patching.

pub mod error;
pub mod model;
pub mod snapshot;

pub use error::SchemaError;
pub use model::{
    ConstPatch, FieldDef, FieldKey, ModuleSchema, PropertyDef, TypeDef, TypeId, TypeRef,
};
