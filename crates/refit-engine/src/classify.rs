use std::collections::BTreeMap;

use thiserror::Error;

use refit_core::WellKnown;
use refit_schema::{FieldDef, FieldKey, ModuleSchema, PropertyDef, TypeId, TypeRef};

/// A plain message field: its field-number marker plus the declared value
/// type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularField {
    pub marker: FieldKey,
    pub name: String,
    pub value_ty: TypeRef,
}

/// A tagged-union group: named after its discriminator enum, one marker and
/// value type per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofField {
    pub name: String,
    pub variants: Vec<RegularField>,
}

/// One recovered message field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoField {
    Regular(RegularField),
    Oneof(OneofField),
}

impl ProtoField {
    pub fn name(&self) -> &str {
        match self {
            ProtoField::Regular(f) => &f.name,
            ProtoField::Oneof(f) => &f.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProtoField::Regular(_) => "regular",
            ProtoField::Oneof(_) => "oneof",
        }
    }
}

/// Shapes the classifier cannot recover from. Any of these means declaration
/// order is lost and the whole run must stop.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("member {member} of {type_name} has no declaration token")]
    MissingDeclToken { type_name: String, member: String },
    #[error("union storage slot in {type_name} is not followed by an enum discriminator")]
    BrokenUnionShape { type_name: String },
    #[error("union group in {type_name} has no recorded discriminator")]
    MissingDiscriminator { type_name: String },
    #[error("discriminator enum {enum_name} in {type_name} declares no variants")]
    EmptyUnion {
        type_name: String,
        enum_name: String,
    },
    #[error("union in {type_name} overruns the declared member list")]
    UnionOverrun { type_name: String },
    #[error("no property left for union variant {variant} in {type_name}")]
    MissingVariantProperty {
        type_name: String,
        variant: String,
    },
    #[error("unexpected member {follower} after marker {marker} in {type_name}")]
    UnexpectedMember {
        type_name: String,
        marker: String,
        follower: String,
    },
}

fn token_sorted_fields<'a>(
    module: &'a ModuleSchema,
    id: TypeId,
) -> Result<Vec<(usize, &'a FieldDef)>, ClassifyError> {
    let def = module.type_def(id);
    let mut fields: Vec<(usize, &FieldDef)> = def.fields.iter().enumerate().collect();
    for (_, field) in &fields {
        if field.decl_token.is_none() {
            return Err(ClassifyError::MissingDeclToken {
                type_name: def.qualified.clone(),
                member: field.name.clone(),
            });
        }
    }
    fields.sort_by_key(|&(_, f)| f.decl_token);
    Ok(fields)
}

fn token_sorted_properties<'a>(
    module: &'a ModuleSchema,
    id: TypeId,
) -> Result<Vec<&'a PropertyDef>, ClassifyError> {
    let def = module.type_def(id);
    let mut properties: Vec<&PropertyDef> = def
        .properties
        .iter()
        .filter(|p| !p.is_static && !p.is_virtual)
        .collect();
    for prop in &properties {
        if prop.decl_token.is_none() {
            return Err(ClassifyError::MissingDeclToken {
                type_name: def.qualified.clone(),
                member: prop.name.clone(),
            });
        }
    }
    properties.sort_by_key(|p| p.decl_token);
    Ok(properties)
}

/// Collects the discriminator enums of a type's union groups, in order.
///
/// A union announces itself as a storage slot of the universal object type
/// immediately followed by a field of enum type.
fn union_discriminators(
    module: &ModuleSchema,
    fields: &[(usize, &FieldDef)],
    type_name: &str,
    well_known: &WellKnown,
) -> Result<Vec<TypeId>, ClassifyError> {
    let mut enums = Vec::new();
    let mut i = 0;
    while i < fields.len() {
        if fields[i].1.ty.qualified == well_known.any_type {
            let Some((_, next)) = fields.get(i + 1) else {
                return Err(ClassifyError::BrokenUnionShape {
                    type_name: type_name.to_string(),
                });
            };
            let discriminator = module
                .resolve(&next.ty)
                .filter(|id| module.type_def(*id).is_enum)
                .ok_or_else(|| ClassifyError::BrokenUnionShape {
                    type_name: type_name.to_string(),
                })?;
            enums.push(discriminator);
            i += 1;
        }
        i += 1;
    }
    Ok(enums)
}

/// Recovers a message type's fields in true declaration order, keyed by
/// zero-based recovery sequence number.
///
/// Members are walked in declaration-token order: each public static int
/// constant is a field-number marker; the member after it decides whether
/// the marker opens a regular field (private storage slot, generic
/// instantiations spanning two backing members) or a union group (a run of
/// markers, one per variant, paired with instance properties in token
/// order). The discriminator enum's first two members are reserved and do
/// not count as variants.
pub fn message_fields(
    module: &ModuleSchema,
    id: TypeId,
    well_known: &WellKnown,
) -> Result<BTreeMap<u32, ProtoField>, ClassifyError> {
    let type_name = module.type_def(id).qualified.clone();
    let fields = token_sorted_fields(module, id)?;

    let mut result = BTreeMap::new();
    if fields.is_empty() {
        return Ok(result);
    }

    let properties = token_sorted_properties(module, id)?;
    let discriminators = union_discriminators(module, &fields, &type_name, well_known)?;

    let is_marker = |f: &FieldDef| {
        f.is_public && f.is_static && f.constant.is_some() && f.ty.qualified == well_known.int_type
    };

    let mut seq: u32 = 0;
    let mut prop_seq = 0usize;
    let mut current_union = 0usize;
    let mut i = 0usize;
    while i + 1 < fields.len() {
        let (marker_idx, f1) = fields[i];
        if is_marker(f1) {
            let (_, f2) = fields[i + 1];

            // A single-variant union at the very end of the member list has
            // no marker run to announce it; its storage slot follows the
            // marker directly.
            let tail_union = !discriminators.is_empty()
                && current_union == discriminators.len() - 1
                && f2.ty.qualified == well_known.any_type
                && prop_seq + 2 == properties.len();

            if !f2.is_public && f2.constant.is_none() && !tail_union {
                let value_ty = f2.ty.clone();
                if value_ty.is_generic_instance() {
                    // Generic storage spans two backing members.
                    i += 1;
                }
                result.insert(
                    seq,
                    ProtoField::Regular(RegularField {
                        marker: FieldKey {
                            owner: id,
                            field: marker_idx,
                        },
                        name: f1.name.clone(),
                        value_ty,
                    }),
                );
                seq += 1;
                i += 1;
                prop_seq += 1;
            } else if is_marker(f2) || tail_union {
                let Some(&discriminator) = discriminators.get(current_union) else {
                    return Err(ClassifyError::MissingDiscriminator {
                        type_name: type_name.clone(),
                    });
                };
                current_union += 1;
                let enum_def = module.type_def(discriminator);
                let variant_count = enum_def.fields.len().saturating_sub(2);
                if variant_count == 0 {
                    return Err(ClassifyError::EmptyUnion {
                        type_name: type_name.clone(),
                        enum_name: enum_def.qualified.clone(),
                    });
                }

                let mut variants = Vec::with_capacity(variant_count);
                for j in 0..variant_count {
                    let Some(&(variant_idx, variant)) = fields.get(i + j) else {
                        return Err(ClassifyError::UnionOverrun {
                            type_name: type_name.clone(),
                        });
                    };
                    let Some(prop) = properties.get(prop_seq + j) else {
                        return Err(ClassifyError::MissingVariantProperty {
                            type_name: type_name.clone(),
                            variant: variant.name.clone(),
                        });
                    };
                    variants.push(RegularField {
                        marker: FieldKey {
                            owner: id,
                            field: variant_idx,
                        },
                        name: variant.name.clone(),
                        value_ty: prop.ty.clone(),
                    });
                }
                result.insert(
                    seq,
                    ProtoField::Oneof(OneofField {
                        name: enum_def.name.clone(),
                        variants,
                    }),
                );
                seq += 1;
                i += variant_count - 1;
                prop_seq += variant_count;
            } else {
                return Err(ClassifyError::UnexpectedMember {
                    type_name: type_name.clone(),
                    marker: f1.name.clone(),
                    follower: f2.name.clone(),
                });
            }
        }
        i += 1;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use refit_core::WellKnown;
    use refit_schema::{FieldDef, ModuleSchema, PropertyDef, TypeDef, TypeRef};

    use super::{message_fields, ProtoField};

    fn int_ty() -> TypeRef {
        TypeRef::named("System.Int32")
    }

    #[test]
    fn regular_fields_pair_marker_and_storage() {
        let mut module = ModuleSchema::new("m");
        let mut def = TypeDef::plain("Proto.Foo");
        def.fields = vec![
            FieldDef::public_const_i32("AFieldNumber", 1, 1),
            FieldDef::instance("a_", 2, int_ty()),
            FieldDef::public_const_i32("BFieldNumber", 3, 2),
            FieldDef::instance("b_", 4, TypeRef::named("System.String")),
        ];
        let id = module.add_type(def);

        let fields = message_fields(&module, id, &WellKnown::default())
            .expect("shape should classify");
        assert_eq!(fields.len(), 2);
        match &fields[&0] {
            ProtoField::Regular(f) => {
                assert_eq!(f.name, "AFieldNumber");
                assert_eq!(f.value_ty.qualified, "System.Int32");
            }
            other => panic!("expected regular field, got {other:?}"),
        }
    }

    #[test]
    fn declaration_tokens_override_declared_order() {
        let mut module = ModuleSchema::new("m");
        let mut def = TypeDef::plain("Proto.Shuffled");
        // In-memory order is scrambled; tokens recover it.
        def.fields = vec![
            FieldDef::instance("b_", 4, int_ty()),
            FieldDef::public_const_i32("BFieldNumber", 3, 2),
            FieldDef::instance("a_", 2, int_ty()),
            FieldDef::public_const_i32("AFieldNumber", 1, 1),
        ];
        let id = module.add_type(def);

        let fields = message_fields(&module, id, &WellKnown::default())
            .expect("shape should classify");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[&0].name(), "AFieldNumber");
        assert_eq!(fields[&1].name(), "BFieldNumber");
    }

    #[test]
    fn generic_storage_consumes_two_backing_members() {
        let mut module = ModuleSchema::new("m");
        let repeated = TypeRef::generic(
            "Google.Protobuf.Collections.RepeatedField`1",
            vec![TypeRef::named("Proto.Item")],
        );
        let codec = TypeRef::generic(
            "Google.Protobuf.FieldCodec`1",
            vec![TypeRef::named("Proto.Item")],
        );
        let mut def = TypeDef::plain("Proto.Foo");
        def.fields = vec![
            FieldDef::public_const_i32("ItemsFieldNumber", 1, 1),
            FieldDef::instance("items_codec_", 2, codec),
            FieldDef::instance("items_", 3, repeated),
            FieldDef::public_const_i32("AfterFieldNumber", 4, 2),
            FieldDef::instance("after_", 5, int_ty()),
        ];
        let id = module.add_type(def);

        let fields = message_fields(&module, id, &WellKnown::default())
            .expect("shape should classify");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[&0].name(), "ItemsFieldNumber");
        assert_eq!(fields[&1].name(), "AfterFieldNumber");
    }

    #[test]
    fn union_groups_collect_variants_from_properties() {
        let mut module = ModuleSchema::new("m");
        module.add_type(TypeDef::enumeration(
            "Proto.Foo/BodyOneofCase",
            vec![
                FieldDef::enum_value_slot(),
                FieldDef::enum_member("None", 0),
                FieldDef::enum_member("Ping", 1),
                FieldDef::enum_member("Pong", 2),
            ],
        ));
        let mut def = TypeDef::plain("Proto.Foo");
        def.fields = vec![
            FieldDef::public_const_i32("PingFieldNumber", 1, 1),
            FieldDef::public_const_i32("PongFieldNumber", 2, 2),
            FieldDef::instance("body_", 3, TypeRef::named("System.Object")),
            FieldDef::instance("bodyCase_", 4, TypeRef::named("Proto.Foo/BodyOneofCase")),
        ];
        def.properties = vec![
            PropertyDef::instance("Ping", 1, TypeRef::named("Proto.Ping")),
            PropertyDef::instance("Pong", 2, TypeRef::named("Proto.Pong")),
        ];
        let id = module.add_type(def);

        let fields = message_fields(&module, id, &WellKnown::default())
            .expect("shape should classify");
        assert_eq!(fields.len(), 1);
        match &fields[&0] {
            ProtoField::Oneof(group) => {
                assert_eq!(group.name, "BodyOneofCase");
                assert_eq!(group.variants.len(), 2);
                assert_eq!(group.variants[0].name, "PingFieldNumber");
                assert_eq!(group.variants[0].value_ty.qualified, "Proto.Ping");
                assert_eq!(group.variants[1].value_ty.qualified, "Proto.Pong");
            }
            other => panic!("expected union group, got {other:?}"),
        }
    }

    #[test]
    fn missing_declaration_token_is_fatal() {
        let mut module = ModuleSchema::new("m");
        let mut def = TypeDef::plain("Proto.Foo");
        let mut broken = FieldDef::public_const_i32("AFieldNumber", 1, 1);
        broken.decl_token = None;
        def.fields = vec![broken, FieldDef::instance("a_", 2, int_ty())];
        let id = module.add_type(def);

        assert!(message_fields(&module, id, &WellKnown::default()).is_err());
    }

    #[test]
    fn storage_slot_without_enum_discriminator_is_fatal() {
        let mut module = ModuleSchema::new("m");
        let mut def = TypeDef::plain("Proto.Foo");
        def.fields = vec![
            FieldDef::public_const_i32("AFieldNumber", 1, 1),
            FieldDef::instance("body_", 2, TypeRef::named("System.Object")),
            FieldDef::instance("after_", 3, int_ty()),
        ];
        let id = module.add_type(def);

        assert!(message_fields(&module, id, &WellKnown::default()).is_err());
    }

    #[test]
    fn marker_followed_by_public_constant_string_is_fatal() {
        let mut module = ModuleSchema::new("m");
        let mut def = TypeDef::plain("Proto.Foo");
        let mut stray = FieldDef::public_const_i32("Stray", 2, 9);
        stray.ty = TypeRef::named("System.String");
        def.fields = vec![FieldDef::public_const_i32("AFieldNumber", 1, 1), stray];
        let id = module.add_type(def);

        assert!(message_fields(&module, id, &WellKnown::default()).is_err());
    }

    #[test]
    fn empty_member_list_classifies_to_nothing() {
        let mut module = ModuleSchema::new("m");
        let id = module.add_type(TypeDef::plain("Proto.Empty"));
        let fields = message_fields(&module, id, &WellKnown::default())
            .expect("empty shape should classify");
        assert!(fields.is_empty());
    }
}
