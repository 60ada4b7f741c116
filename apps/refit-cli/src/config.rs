use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use refit_core::{SchemaConvention, UppercaseRunFilter, WellKnown};

/// Tool settings: defaults, then an optional TOML file, then `REFIT_`
/// environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolConfig {
    /// Simple name of the obfuscated module's message base class.
    pub obf_base_class: String,
    /// Name of the obfuscated module's command-id enum member.
    pub obf_cmd_id_field: String,
    pub readable_base_class: String,
    pub readable_cmd_id_field: String,
    pub any_type: String,
    pub int_type: String,
    /// Identifier length the renamer emits; gate for name-table entries.
    pub obfuscated_run_len: usize,
    /// Module name stamped on the patched output snapshot.
    pub patched_module_name: String,
}

impl ToolConfig {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("obf_base_class", "")?
            .set_default("obf_cmd_id_field", "")?
            .set_default("readable_base_class", "MessageBase")?
            .set_default("readable_cmd_id_field", "CmdId")?
            .set_default("any_type", "System.Object")?
            .set_default("int_type", "System.Int32")?
            .set_default("obfuscated_run_len", 11)?
            .set_default("patched_module_name", "FixedFields")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("REFIT").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn readable_convention(&self) -> SchemaConvention {
        SchemaConvention::new(
            self.readable_base_class.clone(),
            self.readable_cmd_id_field.clone(),
        )
    }

    pub fn well_known(&self) -> WellKnown {
        WellKnown {
            any_type: self.any_type.clone(),
            int_type: self.int_type.clone(),
        }
    }

    pub fn filter(&self) -> UppercaseRunFilter {
        UppercaseRunFilter {
            run_len: self.obfuscated_run_len,
        }
    }
}
