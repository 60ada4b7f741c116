use std::collections::HashSet;

use thiserror::Error;

use refit_core::{ObfuscationFilter, SchemaConvention, WellKnown};
use refit_schema::{ConstPatch, ModuleSchema, TypeId, TypeRef};

use crate::catalog::is_protobuf;
use crate::classify::{message_fields, ClassifyError, ProtoField, RegularField};
use crate::diag::Diagnostics;
use crate::table::{AddOutcome, NameTable};

/// Conditions that abort a matching pass. Everything localized is a
/// diagnostic instead.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Matching state and accumulated results of one reconciliation pass.
///
/// Holds borrowed views over both modules; the only state carried across
/// calls is the name table, the patch list, and the diagnostics stream.
pub struct MatchSession<'a> {
    obfuscated: &'a ModuleSchema,
    readable: &'a ModuleSchema,
    obf_conv: &'a SchemaConvention,
    readable_conv: &'a SchemaConvention,
    well_known: &'a WellKnown,
    filter: &'a dyn ObfuscationFilter,
    pub table: NameTable,
    pub patches: Vec<ConstPatch>,
    pub diag: Diagnostics,
    in_progress: HashSet<(TypeId, TypeId)>,
}

impl<'a> MatchSession<'a> {
    pub fn new(
        obfuscated: &'a ModuleSchema,
        readable: &'a ModuleSchema,
        obf_conv: &'a SchemaConvention,
        readable_conv: &'a SchemaConvention,
        well_known: &'a WellKnown,
        filter: &'a dyn ObfuscationFilter,
    ) -> Self {
        Self {
            obfuscated,
            readable,
            obf_conv,
            readable_conv,
            well_known,
            filter,
            table: NameTable::new(),
            patches: Vec::new(),
            diag: Diagnostics::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Records a name mapping, downgrading conflicts to warnings.
    pub fn record(&mut self, depth: usize, obfuscated: &str, readable: &str) {
        if self.table.add(self.filter, obfuscated, readable) == AddOutcome::RejectedConflict {
            let existing = self
                .table
                .get(obfuscated)
                .unwrap_or_default()
                .to_string();
            self.diag.warn(
                depth,
                format!(
                    "adding {readable} as a value for {obfuscated} failed, \
                     it's been already mapped to {existing}"
                ),
            );
        }
    }

    /// Matches two type usages; `true` means they are structurally
    /// compatible and their names (and everything beneath them) have been
    /// recorded.
    pub fn match_types(
        &mut self,
        obf: &TypeRef,
        readable: &TypeRef,
        depth: usize,
    ) -> Result<bool, MatchError> {
        if obf.is_generic_instance() != readable.is_generic_instance() {
            self.diag.warn(
                depth,
                format!("types {obf} and {readable} differ in generality; skipping mapping"),
            );
            return Ok(false);
        }

        if obf.is_generic_instance() {
            if obf.generic_args.len() != readable.generic_args.len() {
                self.diag.warn(
                    depth,
                    format!(
                        "types {obf} and {readable} have different numbers of generic \
                         parameters: {} and {}; skipping mapping",
                        obf.generic_args.len(),
                        readable.generic_args.len()
                    ),
                );
                return Ok(false);
            }
            let mut matched = true;
            for (o_arg, r_arg) in obf.generic_args.iter().zip(&readable.generic_args) {
                matched &= self.match_types(o_arg, r_arg, depth)?;
            }
            // The generic's own name is recorded even when arguments fail.
            self.record(depth, &obf.name, &readable.name);
            return Ok(matched);
        }

        let obf_id = self.obfuscated.resolve(obf);
        let readable_id = self.readable.resolve(readable);
        match (obf_id, readable_id) {
            (None, None) => {
                // Runtime primitives and external types live outside both
                // modules; their names match by construction.
                self.record(depth, &obf.name, &readable.name);
                Ok(true)
            }
            (Some(_), None) => {
                self.diag.warn(
                    depth,
                    format!(
                        "type {readable} does not resolve in the readable module; \
                         skipping unreliable branch"
                    ),
                );
                Ok(false)
            }
            (None, Some(_)) => {
                self.diag.warn(
                    depth,
                    format!(
                        "type {obf} does not resolve in the obfuscated module; \
                         skipping unreliable branch"
                    ),
                );
                Ok(false)
            }
            (Some(o), Some(r)) => self.match_resolved(obf, readable, o, r, depth),
        }
    }

    fn match_resolved(
        &mut self,
        obf: &TypeRef,
        readable: &TypeRef,
        o: TypeId,
        r: TypeId,
        depth: usize,
    ) -> Result<bool, MatchError> {
        let o_protobuf = is_protobuf(self.obfuscated, o, &self.obf_conv.base_class);
        let r_protobuf = is_protobuf(self.readable, r, &self.readable_conv.base_class);
        if o_protobuf != r_protobuf {
            self.diag.warn(
                depth,
                format!(
                    "types {obf} and {readable} differ in protobuf descent: \
                     {o_protobuf} and {r_protobuf}; skipping mapping"
                ),
            );
            return Ok(false);
        }
        if o_protobuf {
            self.match_message(o, r, depth)?;
        }

        let o_enum = self.obfuscated.type_def(o).is_enum;
        let r_enum = self.readable.type_def(r).is_enum;
        if o_enum != r_enum {
            self.diag.warn(
                depth,
                format!(
                    "types {obf} and {readable} differ in enum-ness: \
                     {o_enum} and {r_enum}; skipping mapping"
                ),
            );
            return Ok(false);
        }
        if o_enum {
            self.match_enums(o, r, depth);
        }

        self.record(depth, &obf.name, &readable.name);
        Ok(true)
    }

    /// Matches two message types field by field, patching marker constants
    /// and recording names for every compatible pair.
    pub fn match_message(
        &mut self,
        obf: TypeId,
        readable: TypeId,
        depth: usize,
    ) -> Result<(), MatchError> {
        // Self-referential messages re-enter here; the outer call is already
        // doing the work.
        if !self.in_progress.insert((obf, readable)) {
            return Ok(());
        }
        let result = self.match_message_inner(obf, readable, depth);
        self.in_progress.remove(&(obf, readable));
        result
    }

    fn match_message_inner(
        &mut self,
        obf: TypeId,
        readable: TypeId,
        depth: usize,
    ) -> Result<(), MatchError> {
        let obf_fields = message_fields(self.obfuscated, obf, self.well_known)?;
        let readable_fields = message_fields(self.readable, readable, self.well_known)?;

        let obf_module = self.obfuscated;
        let readable_module = self.readable;
        let obf_name = obf_module.type_def(obf).name.as_str();
        let readable_name = readable_module.type_def(readable).name.as_str();

        let depth = depth + 1;
        let count = obf_fields.len().min(readable_fields.len());
        if obf_fields.len() != readable_fields.len() {
            self.diag.warn(
                depth,
                format!(
                    "field counts differ between {obf_name} ({}) and {readable_name} ({}); \
                     matching the first {count}",
                    obf_fields.len(),
                    readable_fields.len()
                ),
            );
        }

        self.record(depth, obf_name, readable_name);

        for i in 0..count as u32 {
            match (&obf_fields[&i], &readable_fields[&i]) {
                (ProtoField::Regular(o_field), ProtoField::Regular(r_field)) => {
                    self.match_regular(o_field, r_field, depth)?;
                }
                (ProtoField::Oneof(o_group), ProtoField::Oneof(r_group)) => {
                    self.record(depth, &o_group.name, &r_group.name);
                    let variant_count = o_group.variants.len().min(r_group.variants.len());
                    if o_group.variants.len() != r_group.variants.len() {
                        self.diag.warn(
                            depth,
                            format!(
                                "union {} has {} variants but {} has {}; \
                                 matching the first {variant_count}",
                                o_group.name,
                                o_group.variants.len(),
                                r_group.name,
                                r_group.variants.len()
                            ),
                        );
                    }
                    for j in 0..variant_count {
                        self.match_regular(&o_group.variants[j], &r_group.variants[j], depth)?;
                    }
                }
                (o_field, r_field) => {
                    self.diag.warn(
                        depth,
                        format!(
                            "fields {obf_name}.{} and {readable_name}.{} have different \
                             kinds: {} and {}; skipping mapping",
                            o_field.name(),
                            r_field.name(),
                            o_field.kind(),
                            r_field.kind()
                        ),
                    );
                }
            }
        }
        Ok(())
    }

    fn match_regular(
        &mut self,
        obf: &RegularField,
        readable: &RegularField,
        depth: usize,
    ) -> Result<(), MatchError> {
        let compatible = self.match_types(&obf.value_ty, &readable.value_ty, depth)?;
        let obf_owner = self.obfuscated.type_def(obf.marker.owner).name.as_str();
        let readable_owner = self.readable.type_def(readable.marker.owner).name.as_str();
        if !compatible {
            self.diag.warn(
                depth,
                format!(
                    "fields {obf_owner}.{} and {readable_owner}.{} have incompatible \
                     types: {} and {}; skipping mapping",
                    obf.name, readable.name, obf.value_ty, readable.value_ty
                ),
            );
            return Ok(());
        }

        let Some(value) = self.obfuscated.field(obf.marker).and_then(|f| f.constant) else {
            self.diag.warn(
                depth,
                format!("marker {obf_owner}.{} carries no constant; skipping fixup", obf.name),
            );
            return Ok(());
        };
        self.patches.push(ConstPatch {
            key: readable.marker,
            value,
        });
        self.record(depth, &obf.name, &readable.name);
        Ok(())
    }

    /// Pairs enum members by declaration index, stopping at the first
    /// constant divergence.
    fn match_enums(&mut self, obf: TypeId, readable: TypeId, depth: usize) {
        let obf_members = &self.obfuscated.type_def(obf).fields;
        let readable_members = &self.readable.type_def(readable).fields;

        let count = obf_members.len().min(readable_members.len());
        if obf_members.len() != readable_members.len() {
            self.diag.warn(
                depth,
                format!(
                    "enum member counts differ between {} ({}) and {} ({}); \
                     matching the first {count}",
                    self.obfuscated.type_def(obf).name,
                    obf_members.len(),
                    self.readable.type_def(readable).name,
                    readable_members.len()
                ),
            );
        }

        for i in 0..count {
            let o_member = &obf_members[i];
            let r_member = &readable_members[i];
            if o_member.constant != r_member.constant {
                self.diag.warn(
                    depth,
                    format!(
                        "enum members {} and {} have different constants: {:?} and {:?}; \
                         stopping after {i} members",
                        o_member.name, r_member.name, o_member.constant, r_member.constant
                    ),
                );
                return;
            }
            self.record(depth, &o_member.name, &r_member.name);
        }
    }

    /// Tears the session down into its accumulated results.
    pub fn finish(self) -> (NameTable, Vec<ConstPatch>, Diagnostics) {
        (self.table, self.patches, self.diag)
    }
}
