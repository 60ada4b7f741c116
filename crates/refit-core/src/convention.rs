use serde::{Deserialize, Serialize};

/// Enum constant identifying the debug-notification packet.
///
/// Used to break command-id collisions: the duplicate claiming this constant
/// in its packet enum loses.
pub const DEBUG_NOTIFY_CONSTANT: i64 = 2;

/// Names identifying the message framework inside one loaded module.
///
/// The readable module uses the generator's canonical names; the obfuscated
/// module's equivalents must be supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConvention {
    /// Simple name of the message base class.
    pub base_class: String,
    /// Name of the command-id member inside each packet's nested enum.
    pub cmd_id_field: String,
}

impl Default for SchemaConvention {
    fn default() -> Self {
        Self {
            base_class: "MessageBase".to_string(),
            cmd_id_field: "CmdId".to_string(),
        }
    }
}

impl SchemaConvention {
    pub fn new(base_class: impl Into<String>, cmd_id_field: impl Into<String>) -> Self {
        Self {
            base_class: base_class.into(),
            cmd_id_field: cmd_id_field.into(),
        }
    }
}

/// Qualified names of the runtime types both modules share.
///
/// These never get renamed by the obfuscator, so they are compared literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellKnown {
    /// The universal object type marking a tagged-union storage slot.
    pub any_type: String,
    /// The 32-bit integer type backing field-number marker constants.
    pub int_type: String,
}

impl Default for WellKnown {
    fn default() -> Self {
        Self {
            any_type: "System.Object".to_string(),
            int_type: "System.Int32".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SchemaConvention, WellKnown};

    #[test]
    fn readable_defaults_use_generator_names() {
        let conv = SchemaConvention::default();
        assert_eq!(conv.base_class, "MessageBase");
        assert_eq!(conv.cmd_id_field, "CmdId");
    }

    #[test]
    fn well_known_defaults_are_runtime_names() {
        let wk = WellKnown::default();
        assert_eq!(wk.any_type, "System.Object");
        assert_eq!(wk.int_type, "System.Int32");
    }
}
