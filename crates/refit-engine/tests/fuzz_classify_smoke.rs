use std::panic;

use refit_core::WellKnown;
use refit_engine::classify::message_fields;
use refit_schema::{FieldDef, ModuleSchema, PropertyDef, TypeDef, TypeRef};

fn xorshift64(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

fn pick_type(roll: u64) -> TypeRef {
    match roll % 6 {
        0 => TypeRef::named("System.Int32"),
        1 => TypeRef::named("System.String"),
        2 => TypeRef::named("System.Object"),
        3 => TypeRef::named("Proto.SomeEnum"),
        4 => TypeRef::named("Proto.Unknown"),
        _ => TypeRef::generic(
            "Google.Protobuf.Collections.RepeatedField`1",
            vec![TypeRef::named("System.Int32")],
        ),
    }
}

/// Builds a randomly-shaped message type. Most shapes are malformed; the
/// classifier must reject them with an error, never a panic.
fn random_module(seed: u64) -> ModuleSchema {
    let mut s = seed.max(1);
    let mut module = ModuleSchema::new("fuzz");

    let enum_members = (xorshift64(&mut s) % 5) as usize;
    let mut members = vec![FieldDef::enum_value_slot()];
    for i in 0..enum_members {
        members.push(FieldDef::enum_member(format!("Member{i}"), i as i64));
    }
    module.add_type(TypeDef::enumeration("Proto.SomeEnum", members));

    let field_count = (xorshift64(&mut s) % 12) as usize;
    let mut def = TypeDef::plain("Proto.Fuzzed");
    for i in 0..field_count {
        let roll = xorshift64(&mut s);
        let mut field = match roll % 4 {
            0 => FieldDef::public_const_i32(format!("Marker{i}"), 0, (roll % 100) as i64),
            _ => FieldDef::instance(format!("field{i}_"), 0, pick_type(roll >> 8)),
        };
        // Occasionally drop the token to exercise the fatal path.
        field.decl_token = if roll % 17 == 0 {
            None
        } else {
            Some(refit_core::DeclToken(i as u32 + 1))
        };
        def.fields.push(field);
    }
    let prop_count = (xorshift64(&mut s) % 5) as usize;
    for i in 0..prop_count {
        let roll = xorshift64(&mut s);
        def.properties.push(PropertyDef::instance(
            format!("Prop{i}"),
            i as u32 + 1,
            pick_type(roll),
        ));
    }
    module.add_type(def);
    module
}

#[test]
fn fuzz_like_random_shapes_do_not_panic_classifier() {
    let well_known = WellKnown::default();
    for seed in 0..2000_u64 {
        let module = random_module(0xBAD5EED ^ seed);
        let id = module.type_id("Proto.Fuzzed").expect("type was just added");
        let outcome = panic::catch_unwind(|| {
            let _ = message_fields(&module, id, &well_known);
        });
        assert!(outcome.is_ok(), "classifier panicked for seed {seed}");
    }
}

#[test]
fn fuzz_well_formed_shapes_classify_every_marker() {
    let well_known = WellKnown::default();
    for seed in 0..200_u64 {
        let mut s = seed.max(1);
        let pair_count = (xorshift64(&mut s) % 8) as usize;
        let mut def = TypeDef::plain("Proto.WellFormed");
        for i in 0..pair_count {
            let token = (i * 2) as u32 + 1;
            def.fields.push(FieldDef::public_const_i32(
                format!("F{i}FieldNumber"),
                token,
                i as i64 + 1,
            ));
            def.fields
                .push(FieldDef::instance(format!("f{i}_"), token + 1, {
                    let roll = xorshift64(&mut s);
                    // Storage slots must not look like union markers here.
                    match roll % 3 {
                        0 => TypeRef::named("System.Int32"),
                        1 => TypeRef::named("System.String"),
                        _ => TypeRef::named("Proto.Unknown"),
                    }
                }));
        }
        let mut module = ModuleSchema::new("fuzz");
        let id = module.add_type(def);

        let fields = message_fields(&module, id, &well_known)
            .expect("well-formed shape should classify");
        assert_eq!(fields.len(), pair_count);
    }
}
