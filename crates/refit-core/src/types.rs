use serde::{Deserialize, Serialize};

/// Numeric wire discriminator embedded in every packet type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CommandId(pub u32);

/// Per-member ordinal assigned by the original code generator.
///
/// Survives identifier renaming and is the only reliable key for recovering
/// true declaration order from a shuffled member list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DeclToken(pub u32);

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
