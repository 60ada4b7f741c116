use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use refit_core::CommandId;

/// One row of the legacy command-id mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdIdEntry {
    /// Command id the packet carries in the obfuscated module.
    pub obfuscated_id: CommandId,
    /// Canonical packet name from the mapping file.
    pub name: String,
}

/// Readable command id to obfuscated counterpart, loaded once per run.
pub type CmdIdMap = BTreeMap<CommandId, CmdIdEntry>;

/// Errors returned by the command-id map loader.
#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("failed to read command-id map: {0}")]
    Read(#[from] std::io::Error),
    #[error("line {line}: expected `name, readable_id, obfuscated_id`")]
    MissingColumns { line: usize },
    #[error("line {line}: bad command id {value:?}")]
    BadId { line: usize, value: String },
    #[error("line {line}: duplicate readable command id {id}")]
    DuplicateId { line: usize, id: CommandId },
}

/// Parses the row-oriented, comma-delimited mapping text.
///
/// Rows with any empty column are intentionally unmapped packets and are
/// skipped; short rows, unparseable ids, and duplicate readable ids are
/// errors.
pub fn parse_cmd_id_map(text: &str) -> Result<CmdIdMap, MapFileError> {
    let mut map = BTreeMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = raw.split(',').map(str::trim).collect();
        if cols.len() < 3 {
            return Err(MapFileError::MissingColumns { line });
        }
        let (name, readable_raw, obfuscated_raw) = (cols[0], cols[1], cols[2]);
        if name.is_empty() || readable_raw.is_empty() || obfuscated_raw.is_empty() {
            continue;
        }
        let readable_id = parse_id(line, readable_raw)?;
        let obfuscated_id = parse_id(line, obfuscated_raw)?;
        if map.contains_key(&readable_id) {
            return Err(MapFileError::DuplicateId {
                line,
                id: readable_id,
            });
        }
        map.insert(
            readable_id,
            CmdIdEntry {
                obfuscated_id,
                name: name.to_string(),
            },
        );
    }
    tracing::info!(packets = map.len(), "loaded command-id mappings");
    Ok(map)
}

fn parse_id(line: usize, raw: &str) -> Result<CommandId, MapFileError> {
    raw.parse::<u32>()
        .map(CommandId)
        .map_err(|_| MapFileError::BadId {
            line,
            value: raw.to_string(),
        })
}

/// Loads and parses a mapping file.
pub fn load_cmd_id_map(path: impl AsRef<Path>) -> Result<CmdIdMap, MapFileError> {
    parse_cmd_id_map(&fs::read_to_string(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use refit_core::CommandId;

    use super::{parse_cmd_id_map, MapFileError};

    #[test]
    fn rows_parse_into_readable_keyed_entries() {
        let map = parse_cmd_id_map("PlayerLoginReq, 101, 7841\nPlayerLoginRsp, 102, 7842\n")
            .expect("map should parse");
        assert_eq!(map.len(), 2);
        let entry = &map[&CommandId(101)];
        assert_eq!(entry.obfuscated_id, CommandId(7841));
        assert_eq!(entry.name, "PlayerLoginReq");
    }

    #[test]
    fn rows_with_empty_columns_are_skipped() {
        let map = parse_cmd_id_map(
            "PlayerLoginReq, 101, 7841\nUnmapped, , 7900\n, 103, 7901\nAlsoUnmapped, 104,\n",
        )
        .expect("map should parse");
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&CommandId(101)));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let map = parse_cmd_id_map("\nPlayerLoginReq, 101, 7841\n\n").expect("map should parse");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn short_rows_error_with_line_number() {
        let err = parse_cmd_id_map("PlayerLoginReq, 101, 7841\nbroken-row\n")
            .expect_err("short row should fail");
        assert!(matches!(err, MapFileError::MissingColumns { line: 2 }));
    }

    #[test]
    fn bad_ids_error_with_line_number() {
        let err = parse_cmd_id_map("PlayerLoginReq, xx, 7841\n").expect_err("bad id should fail");
        assert!(matches!(err, MapFileError::BadId { line: 1, .. }));
    }

    #[test]
    fn duplicate_readable_ids_are_rejected() {
        let err = parse_cmd_id_map("A, 101, 7841\nB, 101, 7842\n")
            .expect_err("duplicate should fail");
        assert!(matches!(
            err,
            MapFileError::DuplicateId {
                line: 2,
                id: CommandId(101)
            }
        ));
    }
}
