use thiserror::Error;

/// Errors returned by schema mutation helpers.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A patch addressed a type index outside this module.
    #[error("type index {index} out of bounds for module {module}")]
    UnknownType { module: String, index: usize },
    /// A patch addressed a field index outside its owning type.
    #[error("field index {field} out of bounds for type {type_name}")]
    UnknownField { type_name: String, field: usize },
}
