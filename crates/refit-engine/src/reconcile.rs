use thiserror::Error;

use refit_core::{CommandId, ObfuscationFilter, SchemaConvention, WellKnown};
use refit_schema::{ConstPatch, ModuleSchema};

use crate::catalog::{build_catalog, CatalogError};
use crate::diag::Diagnostics;
use crate::mapfile::CmdIdMap;
use crate::matcher::{MatchError, MatchSession};
use crate::table::NameTable;

/// Counters summarizing one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Packets found in the readable catalog.
    pub packets_total: usize,
    /// Packets matched against their obfuscated counterpart.
    pub packets_reconciled: usize,
    /// Packets skipped for lack of a command-id mapping.
    pub packets_unmapped: usize,
    /// Name-table entries accumulated.
    pub names_recorded: usize,
    /// Constant rewrites accumulated against the readable module.
    pub constants_patched: usize,
    /// Warnings recorded on the diagnostics stream.
    pub warnings: usize,
}

/// Everything one reconciliation pass produced.
#[derive(Debug)]
pub struct ReconcileReport {
    pub table: NameTable,
    pub patches: Vec<ConstPatch>,
    pub diagnostics: Diagnostics,
    pub stats: ReconcileStats,
}

/// Conditions that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(
        "command-id map names obfuscated id {obfuscated} (for readable id {readable}) \
         that is missing from the obfuscated catalog"
    )]
    InconsistentCmdIdMap {
        readable: CommandId,
        obfuscated: CommandId,
    },
}

/// Naming conventions and filter for one reconciliation run.
pub struct ReconcileSettings<'a> {
    pub obf_conv: &'a SchemaConvention,
    pub readable_conv: &'a SchemaConvention,
    pub well_known: &'a WellKnown,
    pub filter: &'a dyn ObfuscationFilter,
}

/// Drives a full pass: catalogs both modules, aligns command ids through
/// the legacy mapping, and matches every mapped packet pair.
///
/// The readable module is not mutated here; the report carries the patch
/// set (command-id rewrites included) for the caller to apply.
pub fn reconcile(
    obfuscated: &ModuleSchema,
    readable: &ModuleSchema,
    cmd_id_map: &CmdIdMap,
    settings: &ReconcileSettings<'_>,
) -> Result<ReconcileReport, ReconcileError> {
    let obf_catalog = build_catalog(obfuscated, settings.obf_conv)?;
    let readable_catalog = build_catalog(readable, settings.readable_conv)?;
    tracing::info!(
        obfuscated = obf_catalog.len(),
        readable = readable_catalog.len(),
        "built packet catalogs"
    );

    let mut session = MatchSession::new(
        obfuscated,
        readable,
        settings.obf_conv,
        settings.readable_conv,
        settings.well_known,
        settings.filter,
    );
    session.record(
        0,
        &settings.obf_conv.cmd_id_field,
        &settings.readable_conv.cmd_id_field,
    );

    let mut stats = ReconcileStats::default();
    for (readable_id, entry) in readable_catalog.iter() {
        stats.packets_total += 1;
        let packet_name = readable.type_def(entry.type_id).name.as_str();

        let Some(mapping) = cmd_id_map.get(&readable_id) else {
            session.diag.warn(
                0,
                format!("packet {readable_id} / {packet_name} does not map to anything; skipping"),
            );
            stats.packets_unmapped += 1;
            continue;
        };
        let Some(obf_entry) = obf_catalog.get(mapping.obfuscated_id) else {
            return Err(ReconcileError::InconsistentCmdIdMap {
                readable: readable_id,
                obfuscated: mapping.obfuscated_id,
            });
        };

        // Align the readable packet's wire id with the obfuscated schema.
        session.patches.push(ConstPatch {
            key: entry.cmd_slot,
            value: i64::from(mapping.obfuscated_id.0),
        });
        session.match_message(obf_entry.type_id, entry.type_id, 0)?;
        stats.packets_reconciled += 1;
    }

    let (table, patches, diagnostics) = session.finish();
    stats.names_recorded = table.len();
    stats.constants_patched = patches.len();
    stats.warnings = diagnostics.warning_count();
    Ok(ReconcileReport {
        table,
        patches,
        diagnostics,
        stats,
    })
}
