// Copyright (c) 2022-2025 Fabian Schuiki

//! Type nodes.
//!
//! Elaboration does not perform type analysis; it only needs to compare the
//! types the analyser attached to ports and generics, walk array element and
//! index types when mapping type generics, and classify types when parsing
//! generic override text. Types are arena-allocated and shared; the copy
//! service never duplicates them, so equality resolves subtype chains to
//! their base and then compares identity.

use crate::name::{Name, NameTable};
use crate::tree::{NodeId, Tree};
use std::cell::{Cell, RefCell};

/// A handle on a type node.
pub type Type<'a> = &'a TypeData<'a>;

/// The kind of a type node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TypeKind {
    /// An integer type.
    Integer,
    /// A floating-point type.
    Real,
    /// A physical type with units.
    Physical,
    /// An enumeration type.
    Enum,
    /// An array type.
    Array,
    /// A subtype of some base type.
    Subtype,
    /// A subprogram type; only conversion functions appear in this core.
    Func,
    /// An interface type, i.e. a formal type generic.
    Generic,
}

/// The interface of a formal type generic.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenericTypeKind {
    /// Any type.
    Private,
    /// Any scalar type.
    Scalar,
    /// Any discrete type.
    Discrete,
    /// Any array type; carries anonymous element and index generics.
    Array,
}

/// The data of a type node.
pub struct TypeData<'a> {
    /// Unique identity, used wherever the original hashes type pointers.
    pub id: NodeId,
    /// The kind of this type.
    pub kind: TypeKind,
    ident: Cell<Option<Name>>,
    base: Cell<Option<Type<'a>>>,
    elem: Cell<Option<Type<'a>>>,
    indexes: RefCell<Vec<Type<'a>>>,
    literals: RefCell<Vec<Tree<'a>>>,
    result: Cell<Option<Type<'a>>>,
    constrained: Cell<bool>,
    generic_kind: Cell<GenericTypeKind>,
    character: Cell<bool>,
}

impl<'a> TypeData<'a> {
    /// Create a new type node. Allocate the result through
    /// [`crate::arenas::DesignArenas::alloc_type`].
    pub fn new(kind: TypeKind) -> TypeData<'a> {
        TypeData {
            id: NodeId::alloc(),
            kind,
            ident: Cell::new(None),
            base: Cell::new(None),
            elem: Cell::new(None),
            indexes: RefCell::new(Vec::new()),
            literals: RefCell::new(Vec::new()),
            result: Cell::new(None),
            constrained: Cell::new(false),
            generic_kind: Cell::new(GenericTypeKind::Private),
            character: Cell::new(false),
        }
    }

    pub fn set_ident(&self, name: Name) {
        self.ident.set(Some(name));
    }

    pub fn has_ident(&self) -> bool {
        self.ident.get().is_some()
    }

    pub fn ident(&self) -> Name {
        self.ident.get().expect("type has no ident")
    }

    pub fn set_base(&self, base: Type<'a>) {
        self.base.set(Some(base));
    }

    pub fn set_elem(&self, elem: Type<'a>) {
        self.elem.set(Some(elem));
    }

    /// The element type of an array.
    pub fn elem(&'a self) -> Type<'a> {
        match self.kind {
            TypeKind::Subtype => self.base().elem(),
            _ => self.elem.get().expect("type has no element"),
        }
    }

    pub fn add_index(&self, index: Type<'a>) {
        self.indexes.borrow_mut().push(index);
    }

    /// The index types of an array.
    pub fn indexes(&'a self) -> Vec<Type<'a>> {
        match self.kind {
            TypeKind::Subtype => self.base().indexes(),
            _ => self.indexes.borrow().clone(),
        }
    }

    pub fn add_literal(&self, lit: Tree<'a>) {
        self.literals.borrow_mut().push(lit);
    }

    /// The literals of an enumeration type, in declaration order.
    pub fn literals(&self) -> Vec<Tree<'a>> {
        self.literals.borrow().clone()
    }

    /// The literal of an enumeration type at the given position.
    pub fn literal(&self, pos: usize) -> Option<Tree<'a>> {
        self.literals.borrow().get(pos).copied()
    }

    pub fn set_result(&self, result: Type<'a>) {
        self.result.set(Some(result));
    }

    /// The result type of a subprogram type.
    pub fn result(&self) -> Type<'a> {
        self.result.get().expect("type has no result")
    }

    pub fn set_constrained(&self, constrained: bool) {
        self.constrained.set(constrained);
    }

    pub fn set_generic_kind(&self, kind: GenericTypeKind) {
        debug_assert_eq!(self.kind, TypeKind::Generic);
        self.generic_kind.set(kind);
    }

    pub fn generic_kind(&self) -> GenericTypeKind {
        self.generic_kind.get()
    }

    pub fn set_character(&self, character: bool) {
        self.character.set(character);
    }

    /// The base of a subtype, or the type itself.
    pub fn base(&'a self) -> Type<'a> {
        self.base.get().unwrap_or(self)
    }

    /// Resolve subtype chains down to the root base type.
    pub fn base_recur(&'a self) -> Type<'a> {
        let mut ty: Type<'a> = self;
        while let Some(base) = ty.base.get() {
            ty = base;
        }
        ty
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.base_of_kind(),
            TypeKind::Integer | TypeKind::Real | TypeKind::Physical | TypeKind::Enum
        )
    }

    pub fn is_integer(&self) -> bool {
        self.base_of_kind() == TypeKind::Integer
    }

    pub fn is_real(&self) -> bool {
        self.base_of_kind() == TypeKind::Real
    }

    pub fn is_physical(&self) -> bool {
        self.base_of_kind() == TypeKind::Physical
    }

    pub fn is_enum(&self) -> bool {
        self.base_of_kind() == TypeKind::Enum
    }

    pub fn is_array(&self) -> bool {
        self.base_of_kind() == TypeKind::Array
    }

    /// Whether this is an array of character enumeration values, i.e. a
    /// string-like type a generic override can be parsed into.
    pub fn is_character_array(&'a self) -> bool {
        if !self.is_array() {
            return false;
        }
        let elem = self.elem();
        elem.is_enum() && elem.base_recur_kind_character()
    }

    fn base_recur_kind_character(&self) -> bool {
        let mut ty = self;
        while let Some(base) = ty.base.get() {
            ty = base;
        }
        ty.character.get()
    }

    /// Whether the type lacks an index constraint. Only arrays can be
    /// unconstrained; a subtype with its own constraint closes the base.
    pub fn is_unconstrained(&self) -> bool {
        if !self.is_array() {
            return false;
        }
        let mut ty = self;
        loop {
            if ty.constrained.get() {
                return false;
            }
            match ty.base.get() {
                Some(base) => ty = base,
                None => return true,
            }
        }
    }

    fn base_of_kind(&self) -> TypeKind {
        let mut ty = self;
        while let Some(base) = ty.base.get() {
            ty = base;
        }
        ty.kind
    }

    /// Render the type for diagnostics.
    pub fn pp(&self, names: &NameTable) -> String {
        match self.ident.get() {
            Some(id) => names.get(id).to_string(),
            None => match self.base.get() {
                Some(base) => base.pp(names),
                None => "<anonymous>".to_string(),
            },
        }
    }
}

/// Compare two types for equality. Subtype chains are resolved to their base
/// first; canonical types then compare by identity.
pub fn type_eq<'a>(a: Type<'a>, b: Type<'a>) -> bool {
    a.base_recur().id == b.base_recur().id
}
