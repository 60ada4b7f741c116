use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::model::ModuleSchema;

/// Errors returned by module snapshot helpers.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode module snapshot: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode module snapshot: {0}")]
    Decode(serde_json::Error),
    #[error("failed to read snapshot file: {0}")]
    Read(std::io::Error),
    #[error("failed to write snapshot file: {0}")]
    Write(std::io::Error),
    #[error("invalid module snapshot: {0}")]
    Invalid(&'static str),
}

/// Encodes a module to pretty JSON bytes.
pub fn encode_module_json(module: &ModuleSchema) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec_pretty(module).map_err(SnapshotError::Encode)
}

/// Decodes and validates a module from JSON bytes.
pub fn decode_module_json(bytes: &[u8]) -> Result<ModuleSchema, SnapshotError> {
    let mut module: ModuleSchema =
        serde_json::from_slice(bytes).map_err(SnapshotError::Decode)?;
    if !module.check_bounds() {
        return Err(SnapshotError::Invalid("type id out of bounds"));
    }
    module.rebuild_index();
    Ok(module)
}

/// Saves a module to the given path as JSON.
pub fn save_module_to_path(
    path: impl AsRef<Path>,
    module: &ModuleSchema,
) -> Result<(), SnapshotError> {
    let bytes = encode_module_json(module)?;
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(SnapshotError::Write)?;
    fs::rename(&tmp, path).map_err(SnapshotError::Write)
}

/// Loads a module from the given JSON file path.
pub fn load_module_from_path(path: impl AsRef<Path>) -> Result<ModuleSchema, SnapshotError> {
    let bytes = fs::read(path.as_ref()).map_err(SnapshotError::Read)?;
    decode_module_json(&bytes)
}
