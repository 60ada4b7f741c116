use std::fs;
use std::path::Path;
use std::time::SystemTime;

use thiserror::Error;

use crate::table::NameTable;

/// Errors returned when writing the name-table report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write name table: {0}")]
    Write(#[from] std::io::Error),
}

/// Renders the name table as UTF-8 text.
///
/// Banner and timestamp comments first, then one `obfuscated⇨readable`
/// line per mapping in insertion order; the first data line is always the
/// base-class mapping.
pub fn render_name_table(
    table: &NameTable,
    obf_base_class: &str,
    readable_base_class: &str,
    generated_at: SystemTime,
) -> String {
    let mut out = String::new();
    out.push_str("# Autogenerated file, do not edit\n");
    out.push_str(&format!(
        "# Created at {}\n",
        humantime::format_rfc3339_seconds(generated_at)
    ));
    out.push_str(&format!("{obf_base_class}⇨{readable_base_class}\n"));
    for (obfuscated, readable) in table.iter() {
        out.push_str(&format!("{obfuscated}⇨{readable}\n"));
    }
    out
}

/// Saves the rendered name table to the given path.
pub fn save_name_table(
    path: impl AsRef<Path>,
    table: &NameTable,
    obf_base_class: &str,
    readable_base_class: &str,
    generated_at: SystemTime,
) -> Result<(), ReportError> {
    let text = render_name_table(table, obf_base_class, readable_base_class, generated_at);
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
