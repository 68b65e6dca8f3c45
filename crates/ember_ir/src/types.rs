//! Signal types and the interning type database.
//!
//! Every signal has a fixed-width type: a plain bit vector or a struct whose
//! fields are laid out contiguously, first field in the low bits.

use crate::ids::TypeId;
use ember_common::Ident;
use serde::{Deserialize, Serialize};

/// A hardware type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// A bit vector of known width, optionally signed.
    ///
    /// Signedness only affects how narrower values are extended when
    /// assigned to a signal of this type.
    Bits {
        /// The number of bits, at least 1.
        width: u32,
        /// Whether narrower values are sign-extended on assignment.
        signed: bool,
    },
    /// A struct bundle of named fields.
    Struct {
        /// The struct type name.
        name: Ident,
        /// Fields in declaration order; the first occupies the low bits.
        fields: Vec<(Ident, TypeId)>,
    },
}

/// Location of a struct field within its parent's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Bit offset of the field's least significant bit.
    pub offset: u32,
    /// Width of the field in bits.
    pub width: u32,
    /// Type of the field.
    pub ty: TypeId,
}

/// Central type database: interned types for cheap comparison.
///
/// Each unique [`Type`] is stored once and referenced by [`TypeId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDb {
    types: Vec<Type>,
}

impl TypeDb {
    /// Creates a new, empty type database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a type, returning its [`TypeId`].
    ///
    /// If an identical type already exists, returns the existing ID.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(i) = self.types.iter().position(|existing| existing == &ty) {
            return TypeId::from_raw(i as u32);
        }
        let id = TypeId::from_raw(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Interns an unsigned or signed bit-vector type.
    pub fn bits(&mut self, width: u32, signed: bool) -> TypeId {
        self.intern(Type::Bits { width, signed })
    }

    /// Returns `true` if `id` names an interned type.
    pub fn contains(&self, id: TypeId) -> bool {
        id.index() < self.types.len()
    }

    /// Returns a reference to the type with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is out of bounds.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Returns the total bit width of a type.
    pub fn bit_width(&self, id: TypeId) -> u32 {
        match self.get(id) {
            Type::Bits { width, .. } => *width,
            Type::Struct { fields, .. } => fields.iter().map(|(_, ty)| self.bit_width(*ty)).sum(),
        }
    }

    /// Returns `true` for signed bit vectors. Structs are never signed.
    pub fn is_signed(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Bits { signed: true, .. })
    }

    /// Looks up a struct field by name.
    ///
    /// Returns `None` if the type is not a struct or has no such field.
    pub fn field(&self, id: TypeId, name: Ident) -> Option<FieldInfo> {
        let Type::Struct { fields, .. } = self.get(id) else {
            return None;
        };
        let mut offset = 0;
        for (field_name, ty) in fields {
            let width = self.bit_width(*ty);
            if *field_name == name {
                return Some(FieldInfo {
                    offset,
                    width,
                    ty: *ty,
                });
            }
            offset += width;
        }
        None
    }

    /// Returns the number of interned types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types have been interned.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
