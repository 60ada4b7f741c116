use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use refit_core::DeclToken;

use crate::error::SchemaError;

/// Index of a type inside one module's arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TypeId(pub usize);

/// Address of one declared field: owning type plus declared position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldKey {
    pub owner: TypeId,
    pub field: usize,
}

/// One pending constant overwrite against a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstPatch {
    pub key: FieldKey,
    pub value: i64,
}

fn simple_name(qualified: &str) -> String {
    qualified
        .rsplit(|c| c == '.' || c == '/')
        .next()
        .unwrap_or(qualified)
        .to_string()
}

/// A type usage: name plus generic instantiation arguments.
///
/// Resolvable against the owning module by qualified name; runtime
/// primitives and external types do not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Simple name (no namespace, no generic arguments).
    pub name: String,
    /// Namespace-qualified name.
    pub qualified: String,
    /// Generic instantiation arguments; empty for non-generic usages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn named(qualified: impl Into<String>) -> Self {
        let qualified = qualified.into();
        Self {
            name: simple_name(&qualified),
            qualified,
            generic_args: Vec::new(),
        }
    }

    pub fn generic(qualified: impl Into<String>, args: Vec<TypeRef>) -> Self {
        let qualified = qualified.into();
        Self {
            name: simple_name(&qualified),
            qualified,
            generic_args: args,
        }
    }

    pub fn is_generic_instance(&self) -> bool {
        !self.generic_args.is_empty()
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified)?;
        if self.is_generic_instance() {
            write!(f, "<")?;
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// One declared field, including enum members and constant markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Declaration ordinal; absent tokens make the owning type
    /// unclassifiable.
    pub decl_token: Option<DeclToken>,
    pub is_public: bool,
    pub is_static: bool,
    pub constant: Option<i64>,
    pub ty: TypeRef,
}

impl FieldDef {
    /// Private instance storage slot.
    pub fn instance(name: impl Into<String>, token: u32, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            decl_token: Some(DeclToken(token)),
            is_public: false,
            is_static: false,
            constant: None,
            ty,
        }
    }

    /// Public constant of the well-known 32-bit integer type.
    pub fn public_const_i32(name: impl Into<String>, token: u32, value: i64) -> Self {
        Self {
            name: name.into(),
            decl_token: Some(DeclToken(token)),
            is_public: true,
            is_static: true,
            constant: Some(value),
            ty: TypeRef::named("System.Int32"),
        }
    }

    /// Constant-bearing enumeration member.
    pub fn enum_member(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            decl_token: None,
            is_public: true,
            is_static: true,
            constant: Some(value),
            ty: TypeRef::named("System.Int32"),
        }
    }

    /// The value-holder slot every enumeration declares first.
    pub fn enum_value_slot() -> Self {
        Self {
            name: "value__".to_string(),
            decl_token: None,
            is_public: false,
            is_static: false,
            constant: None,
            ty: TypeRef::named("System.Int32"),
        }
    }
}

/// One declared property accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub decl_token: Option<DeclToken>,
    pub is_static: bool,
    pub is_virtual: bool,
    pub ty: TypeRef,
}

impl PropertyDef {
    /// Non-static, non-virtual accessor.
    pub fn instance(name: impl Into<String>, token: u32, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            decl_token: Some(DeclToken(token)),
            is_static: false,
            is_virtual: false,
            ty,
        }
    }
}

/// One declared type: identity, base, members, nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub qualified: String,
    pub base: Option<TypeRef>,
    pub is_enum: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub nested: Vec<TypeId>,
}

impl TypeDef {
    /// A class with no interesting base.
    pub fn plain(qualified: impl Into<String>) -> Self {
        let qualified = qualified.into();
        Self {
            name: simple_name(&qualified),
            qualified,
            base: None,
            is_enum: false,
            fields: Vec::new(),
            properties: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// A class deriving from the given base type.
    pub fn message(qualified: impl Into<String>, base: TypeRef) -> Self {
        let mut def = Self::plain(qualified);
        def.base = Some(base);
        def
    }

    /// An enumeration with the given member list (value slot included).
    pub fn enumeration(qualified: impl Into<String>, members: Vec<FieldDef>) -> Self {
        let mut def = Self::plain(qualified);
        def.is_enum = true;
        def.fields = members;
        def
    }
}

/// One loaded schema module: a type arena plus identity metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSchema {
    /// Module name.
    pub name: String,
    /// Four-part module version.
    pub version: [u32; 4],
    types: Vec<TypeDef>,
    top_level: Vec<TypeId>,
    #[serde(skip)]
    by_qualified: HashMap<String, TypeId>,
}

impl ModuleSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: [0, 0, 0, 0],
            types: Vec::new(),
            top_level: Vec::new(),
            by_qualified: HashMap::new(),
        }
    }

    /// Adds a top-level type and returns its id.
    pub fn add_type(&mut self, def: TypeDef) -> TypeId {
        let id = self.push(def);
        self.top_level.push(id);
        id
    }

    /// Adds a type nested inside `parent` and returns its id.
    pub fn add_nested(&mut self, parent: TypeId, def: TypeDef) -> TypeId {
        let id = self.push(def);
        self.types[parent.0].nested.push(id);
        id
    }

    fn push(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.types.len());
        self.by_qualified.insert(def.qualified.clone(), id);
        self.types.push(def);
        id
    }

    pub fn top_level(&self) -> &[TypeId] {
        &self.top_level
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Looks up a type definition. Ids are valid by construction.
    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0]
    }

    pub fn type_id(&self, qualified: &str) -> Option<TypeId> {
        self.by_qualified.get(qualified).copied()
    }

    /// Resolves a type usage against this module's declared types.
    pub fn resolve(&self, r: &TypeRef) -> Option<TypeId> {
        self.type_id(&r.qualified)
    }

    pub fn field(&self, key: FieldKey) -> Option<&FieldDef> {
        self.types.get(key.owner.0)?.fields.get(key.field)
    }

    /// Overwrites one field constant in place.
    pub fn set_field_constant(&mut self, key: FieldKey, value: i64) -> Result<(), SchemaError> {
        let ty = self
            .types
            .get_mut(key.owner.0)
            .ok_or_else(|| SchemaError::UnknownType {
                module: self.name.clone(),
                index: key.owner.0,
            })?;
        let field = ty
            .fields
            .get_mut(key.field)
            .ok_or_else(|| SchemaError::UnknownField {
                type_name: ty.qualified.clone(),
                field: key.field,
            })?;
        field.constant = Some(value);
        Ok(())
    }

    /// Applies an accumulated patch set in order.
    pub fn apply_patches(&mut self, patches: &[ConstPatch]) -> Result<(), SchemaError> {
        for patch in patches {
            self.set_field_constant(patch.key, patch.value)?;
        }
        Ok(())
    }

    /// Rebuilds the qualified-name index after deserialization.
    pub(crate) fn rebuild_index(&mut self) {
        self.by_qualified = self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.qualified.clone(), TypeId(i)))
            .collect();
    }

    /// Checks arena invariants (all referenced ids in bounds).
    pub(crate) fn check_bounds(&self) -> bool {
        let len = self.types.len();
        self.top_level.iter().all(|id| id.0 < len)
            && self
                .types
                .iter()
                .all(|t| t.nested.iter().all(|id| id.0 < len))
    }
}
