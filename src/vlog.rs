// Copyright (c) 2022-2025 Fabian Schuiki

//! Verilog nodes.
//!
//! The Verilog analyser has its own node set, disjoint from the VHDL design
//! tree. Elaboration only inspects the handful of shapes that cross the
//! language boundary: modules, module instances, port declarations, and
//! references; everything else is carried through opaquely inside a
//! `Verilog` wrapper tree node.

use crate::name::Name;
use crate::source::Loc;
use crate::tree::NodeId;
use crate::ty::Type;
use std::cell::{Cell, RefCell};
use std::fmt;

/// A handle on a Verilog node.
pub type Vlog<'a> = &'a VlogData<'a>;

/// The kind of a Verilog node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VlogKind {
    /// A module declaration.
    Module,
    /// A module instantiation.
    ModInst,
    /// A port declaration inside a module.
    PortDecl,
    /// A reference to a net or variable.
    Ref,
    /// An `always` or `initial` construct; opaque to elaboration.
    Process,
    /// A continuous assignment; opaque to elaboration.
    Assign,
}

/// The direction of a Verilog port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VlogPortDir {
    Input,
    Output,
}

/// The data of a Verilog node.
pub struct VlogData<'a> {
    /// Unique identity of this node.
    pub id: NodeId,
    /// The kind of this node.
    pub kind: VlogKind,
    loc: Cell<Loc>,
    ident: Cell<Option<Name>>,
    ident2: Cell<Option<Name>>,
    ty: Cell<Option<Type<'a>>>,
    dir: Cell<VlogPortDir>,
    ports: RefCell<Vec<Vlog<'a>>>,
    decls: RefCell<Vec<Vlog<'a>>>,
    params: RefCell<Vec<Vlog<'a>>>,
    stmts: RefCell<Vec<Vlog<'a>>>,
}

impl<'a> VlogData<'a> {
    /// Create a new Verilog node. Allocate the result through
    /// [`crate::arenas::DesignArenas::alloc_vlog`].
    pub fn new(kind: VlogKind) -> VlogData<'a> {
        VlogData {
            id: NodeId::alloc(),
            kind,
            loc: Cell::new(Loc::invalid()),
            ident: Cell::new(None),
            ident2: Cell::new(None),
            ty: Cell::new(None),
            dir: Cell::new(VlogPortDir::Input),
            ports: RefCell::new(Vec::new()),
            decls: RefCell::new(Vec::new()),
            params: RefCell::new(Vec::new()),
            stmts: RefCell::new(Vec::new()),
        }
    }

    pub fn loc(&self) -> Loc {
        self.loc.get()
    }

    pub fn set_loc(&self, loc: Loc) {
        self.loc.set(loc);
    }

    /// The name of the node. For modules this is the name the unit was
    /// analysed under, which has case folded away.
    pub fn ident(&self) -> Name {
        self.ident
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no ident", self.kind))
    }

    pub fn set_ident(&self, name: Name) {
        self.ident.set(Some(name));
    }

    /// The case-sensitive source-level name. For a module instance this is
    /// the name of the instantiated module.
    pub fn ident2(&self) -> Name {
        self.ident2
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no ident2", self.kind))
    }

    pub fn set_ident2(&self, name: Name) {
        self.ident2.set(Some(name));
    }

    pub fn ty(&self) -> Type<'a> {
        self.ty
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no type", self.kind))
    }

    pub fn set_type(&self, ty: Type<'a>) {
        self.ty.set(Some(ty));
    }

    /// The direction of a port declaration.
    pub fn dir(&self) -> VlogPortDir {
        debug_assert_eq!(self.kind, VlogKind::PortDecl);
        self.dir.get()
    }

    pub fn set_dir(&self, dir: VlogPortDir) {
        self.dir.set(dir);
    }

    pub fn add_port(&self, port: Vlog<'a>) {
        self.ports.borrow_mut().push(port);
    }

    /// The port list of a module, or the connection list header of an
    /// instance.
    pub fn ports(&self) -> Vec<Vlog<'a>> {
        self.ports.borrow().clone()
    }

    pub fn add_decl(&self, decl: Vlog<'a>) {
        self.decls.borrow_mut().push(decl);
    }

    /// The declarations of a module, in source order.
    pub fn decls(&self) -> Vec<Vlog<'a>> {
        self.decls.borrow().clone()
    }

    pub fn add_param(&self, param: Vlog<'a>) {
        self.params.borrow_mut().push(param);
    }

    /// The port connections of a module instance, in source order.
    pub fn params(&self) -> Vec<Vlog<'a>> {
        self.params.borrow().clone()
    }

    pub fn add_stmt(&self, stmt: Vlog<'a>) {
        self.stmts.borrow_mut().push(stmt);
    }

    pub fn stmts(&self) -> Vec<Vlog<'a>> {
        self.stmts.borrow().clone()
    }

    /// Whether this node can stand alone as a design unit.
    pub fn is_top_level(&self) -> bool {
        self.kind == VlogKind::Module
    }
}

impl<'a> fmt::Debug for VlogData<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.id)
    }
}
