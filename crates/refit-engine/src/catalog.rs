use std::collections::BTreeMap;

use thiserror::Error;

use refit_core::{CommandId, SchemaConvention, DEBUG_NOTIFY_CONSTANT};
use refit_schema::{FieldKey, ModuleSchema, TypeId};

/// One catalogued packet: the owning type and the address of its command-id
/// enum member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketEntry {
    pub type_id: TypeId,
    pub cmd_slot: FieldKey,
}

/// All packet types of one module, indexed by command id.
#[derive(Debug, Default)]
pub struct PacketCatalog {
    by_id: BTreeMap<CommandId, PacketEntry>,
}

impl PacketCatalog {
    pub fn get(&self, id: CommandId) -> Option<PacketEntry> {
        self.by_id.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommandId, PacketEntry)> + '_ {
        self.by_id.iter().map(|(id, entry)| (*id, *entry))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Errors that abort a catalog build.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("packet {qualified} carries no constant on its {field} member")]
    MissingCommandConstant { qualified: String, field: String },
}

/// Whether a declared type derives from the module's message base class.
pub fn is_protobuf(module: &ModuleSchema, id: TypeId, base_class: &str) -> bool {
    module
        .type_def(id)
        .base
        .as_ref()
        .map_or(false, |base| base.name == base_class)
}

/// Finds the nested enumeration declaring the command-id member, searched
/// two nesting levels below a packet candidate.
pub fn packet_enum(
    module: &ModuleSchema,
    id: TypeId,
    conv: &SchemaConvention,
) -> Option<TypeId> {
    if !is_protobuf(module, id, &conv.base_class) {
        return None;
    }
    for nested in &module.type_def(id).nested {
        for inner in &module.type_def(*nested).nested {
            let inner_def = module.type_def(*inner);
            if inner_def.is_enum
                && inner_def.fields.iter().any(|f| f.name == conv.cmd_id_field)
            {
                return Some(*inner);
            }
        }
    }
    None
}

fn cmd_member(
    module: &ModuleSchema,
    enum_id: TypeId,
    field_name: &str,
) -> Option<(FieldKey, Option<i64>)> {
    let def = module.type_def(enum_id);
    def.fields
        .iter()
        .position(|f| f.name == field_name)
        .map(|idx| {
            let key = FieldKey {
                owner: enum_id,
                field: idx,
            };
            (key, def.fields[idx].constant)
        })
}

/// Scans a module for packet types and indexes them by command id.
///
/// Types are visited in name order so the catalog (and the collision
/// policy) is deterministic. When a later type claims an id already taken,
/// the later type is inspected: if its packet enum constants contain the
/// debug-notification sentinel it is the duplicate and is dropped,
/// otherwise it overwrites the earlier entry.
pub fn build_catalog(
    module: &ModuleSchema,
    conv: &SchemaConvention,
) -> Result<PacketCatalog, CatalogError> {
    let mut ordered: Vec<TypeId> = module.top_level().to_vec();
    ordered.sort_by(|a, b| module.type_def(*a).name.cmp(&module.type_def(*b).name));

    let mut by_id = BTreeMap::new();
    for id in ordered {
        let Some(en) = packet_enum(module, id, conv) else {
            continue;
        };
        let (cmd_slot, constant) = cmd_member(module, en, &conv.cmd_id_field)
            .unwrap_or((FieldKey { owner: en, field: 0 }, None));
        let Some(value) = constant else {
            return Err(CatalogError::MissingCommandConstant {
                qualified: module.type_def(id).qualified.clone(),
                field: conv.cmd_id_field.clone(),
            });
        };
        let cmd_id = CommandId(value as u32);
        if by_id.contains_key(&cmd_id) {
            let is_debug_duplicate = module
                .type_def(en)
                .fields
                .iter()
                .filter_map(|f| f.constant)
                .any(|c| c == DEBUG_NOTIFY_CONSTANT);
            if is_debug_duplicate {
                continue;
            }
        }
        by_id.insert(
            cmd_id,
            PacketEntry {
                type_id: id,
                cmd_slot,
            },
        );
    }
    Ok(PacketCatalog { by_id })
}
