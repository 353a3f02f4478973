// Copyright (c) 2022-2025 Fabian Schuiki

//! The design tree consumed and produced by elaboration.
//!
//! The tree builder hands elaboration a uniform node: a kind tag plus a set
//! of typed slots and child lists, allocated from the design arenas. Slots
//! use interior mutability because elaboration populates output nodes
//! incrementally; identity is a [`NodeId`] allocated at construction, used
//! as a hash key wherever the original implementation hashes pointers.
//!
//! Accessors panic when a slot that the kind is expected to carry is absent;
//! such a panic denotes a bug in the elaborator or the tree builder, never a
//! problem with user input.

use crate::name::Name;
use crate::source::Loc;
use crate::ty::Type;
use crate::vlog::Vlog;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A handle on a tree node.
pub type Tree<'a> = &'a TreeData<'a>;

/// A unique node identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Allocate a fresh node ID.
    pub fn alloc() -> NodeId {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The kind of a tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TreeKind {
    // Design units.
    Elab,
    Entity,
    Arch,
    Configuration,
    BlockConfig,
    Package,
    PackBody,
    PackInst,
    Component,
    // Concurrent statements.
    Instance,
    Block,
    Process,
    PslDirect,
    ForGenerate,
    IfGenerate,
    CaseGenerate,
    Cond,
    Verilog,
    // Binding machinery.
    Binding,
    Spec,
    Param,
    Hier,
    // Declarations.
    PortDecl,
    GenericDecl,
    SignalDecl,
    ImplicitSignal,
    Alias,
    FileDecl,
    VarDecl,
    ConstDecl,
    FuncDecl,
    ProcDecl,
    FuncBody,
    ProcBody,
    FuncInst,
    ProcInst,
    ProtDecl,
    ProtBody,
    TypeDecl,
    SubtypeDecl,
    PslDecl,
    AttrSpec,
    EnumLit,
    LibClause,
    // Expressions.
    Ref,
    Open,
    Literal,
    StringLit,
    Aggregate,
    Assoc,
    TypeRef,
    TypeConv,
    Qualified,
    ConvFunc,
    AttrRef,
    Fcall,
    ArrayRef,
    RecordRef,
    Range,
}

/// The kind of a parameter association.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamKind {
    Pos,
    Named,
}

/// The kind of a literal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    Int,
    Real,
    Physical,
}

/// The direction of a port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortDir {
    In,
    Out,
    Inout,
    Buffer,
}

/// The direction of a range, or a range given by a single expression such as
/// `T'RANGE`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RangeDir {
    To,
    Downto,
    Expr,
}

/// A range attribute.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttrKind {
    Low,
    High,
}

/// The class of an object or interface declaration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Class {
    Constant,
    Signal,
    Variable,
    Entity,
    Configuration,
    Component,
    Package,
    Type,
    Function,
    Procedure,
}

impl Class {
    pub fn to_str(self) -> &'static str {
        match self {
            Class::Constant => "constant",
            Class::Signal => "signal",
            Class::Variable => "variable",
            Class::Entity => "entity",
            Class::Configuration => "configuration",
            Class::Component => "component",
            Class::Package => "package",
            Class::Type => "type",
            Class::Function => "function",
            Class::Procedure => "procedure",
        }
    }
}

/// The subkind slot of a node, discriminated by what the node kind stores
/// there.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Subkind {
    None,
    Param(ParamKind),
    Literal(LiteralKind),
    Port(PortDir),
    Range(RangeDir),
    Attr(AttrKind),
    Hier(TreeKind),
}

bitflags::bitflags! {
    /// Per-node flags.
    #[derive(Default)]
    pub struct TreeFlags: u32 {
        /// A predefined generic subprogram, skipped by top-level bindings.
        const PREDEFINED = 1 << 0;
        /// A builtin subprogram that is open coded by lowering and must not
        /// appear in the output declarations.
        const OPEN_CODED = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Flags that propagate across a whole design unit and must survive
    /// copying; the copy of a unit set carries the union of its inputs.
    #[derive(Default)]
    pub struct GlobalFlags: u32 {
        /// The unit transitively contains PSL directives.
        const PSL = 1 << 0;
        /// The unit transitively instantiates Verilog modules.
        const MIXED = 1 << 1;
        /// The unit transitively declares protected types.
        const PROTECTED = 1 << 2;
    }
}

/// The data of a tree node.
pub struct TreeData<'a> {
    /// Unique identity of this node.
    pub id: NodeId,
    /// The kind of this node.
    pub kind: TreeKind,
    loc: Cell<Loc>,
    ident: Cell<Option<Name>>,
    ident2: Cell<Option<Name>>,
    target: Cell<Option<Tree<'a>>>,
    primary: Cell<Option<Tree<'a>>>,
    spec: Cell<Option<Tree<'a>>>,
    value: Cell<Option<Tree<'a>>>,
    name: Cell<Option<Tree<'a>>>,
    left: Cell<Option<Tree<'a>>>,
    right: Cell<Option<Tree<'a>>>,
    vlog: Cell<Option<Vlog<'a>>>,
    ty: Cell<Option<Type<'a>>>,
    subkind: Cell<Subkind>,
    class: Cell<Class>,
    pos: Cell<u32>,
    ival: Cell<i64>,
    dval: Cell<f64>,
    flags: Cell<TreeFlags>,
    global_flags: Cell<GlobalFlags>,
    ports: RefCell<Vec<Tree<'a>>>,
    generics: RefCell<Vec<Tree<'a>>>,
    decls: RefCell<Vec<Tree<'a>>>,
    stmts: RefCell<Vec<Tree<'a>>>,
    params: RefCell<Vec<Tree<'a>>>,
    genmaps: RefCell<Vec<Tree<'a>>>,
    conds: RefCell<Vec<Tree<'a>>>,
    chars: RefCell<Vec<Tree<'a>>>,
    assocs: RefCell<Vec<Tree<'a>>>,
    contexts: RefCell<Vec<Tree<'a>>>,
    ranges: RefCell<Vec<Tree<'a>>>,
}

macro_rules! tree_list {
    ($list:ident, $add:ident, $get:ident, $nth:ident) => {
        pub fn $add(&self, node: Tree<'a>) {
            self.$list.borrow_mut().push(node);
        }

        /// The nodes of this list, in order. Handles are cheap copies.
        pub fn $get(&self) -> Vec<Tree<'a>> {
            self.$list.borrow().clone()
        }

        pub fn $nth(&self, index: usize) -> Tree<'a> {
            self.$list.borrow()[index]
        }
    };
}

impl<'a> TreeData<'a> {
    /// Create a new tree node. Allocate the result through
    /// [`crate::arenas::DesignArenas::alloc_tree`].
    pub fn new(kind: TreeKind) -> TreeData<'a> {
        TreeData {
            id: NodeId::alloc(),
            kind,
            loc: Cell::new(Loc::invalid()),
            ident: Cell::new(None),
            ident2: Cell::new(None),
            target: Cell::new(None),
            primary: Cell::new(None),
            spec: Cell::new(None),
            value: Cell::new(None),
            name: Cell::new(None),
            left: Cell::new(None),
            right: Cell::new(None),
            vlog: Cell::new(None),
            ty: Cell::new(None),
            subkind: Cell::new(Subkind::None),
            class: Cell::new(Class::Constant),
            pos: Cell::new(0),
            ival: Cell::new(0),
            dval: Cell::new(0.0),
            flags: Cell::new(TreeFlags::default()),
            global_flags: Cell::new(GlobalFlags::default()),
            ports: RefCell::new(Vec::new()),
            generics: RefCell::new(Vec::new()),
            decls: RefCell::new(Vec::new()),
            stmts: RefCell::new(Vec::new()),
            params: RefCell::new(Vec::new()),
            genmaps: RefCell::new(Vec::new()),
            conds: RefCell::new(Vec::new()),
            chars: RefCell::new(Vec::new()),
            assocs: RefCell::new(Vec::new()),
            contexts: RefCell::new(Vec::new()),
            ranges: RefCell::new(Vec::new()),
        }
    }

    pub fn loc(&self) -> Loc {
        self.loc.get()
    }

    pub fn set_loc(&self, loc: Loc) {
        self.loc.set(loc);
    }

    pub fn has_ident(&self) -> bool {
        self.ident.get().is_some()
    }

    pub fn ident(&self) -> Name {
        self.ident
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no ident", self.kind))
    }

    pub fn set_ident(&self, name: Name) {
        self.ident.set(Some(name));
    }

    pub fn has_ident2(&self) -> bool {
        self.ident2.get().is_some()
    }

    pub fn ident2(&self) -> Name {
        self.ident2
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no ident2", self.kind))
    }

    pub fn set_ident2(&self, name: Name) {
        self.ident2.set(Some(name));
    }

    /// The declaration or unit this node refers to.
    pub fn target(&self) -> Tree<'a> {
        self.target
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no target", self.kind))
    }

    pub fn try_target(&self) -> Option<Tree<'a>> {
        self.target.get()
    }

    pub fn set_target(&self, target: Tree<'a>) {
        self.target.set(Some(target));
    }

    /// The primary unit of a secondary unit, e.g. the entity of an
    /// architecture.
    pub fn primary(&self) -> Tree<'a> {
        self.primary
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no primary", self.kind))
    }

    pub fn try_primary(&self) -> Option<Tree<'a>> {
        self.primary.get()
    }

    pub fn set_primary(&self, primary: Tree<'a>) {
        self.primary.set(Some(primary));
    }

    pub fn has_spec(&self) -> bool {
        self.spec.get().is_some()
    }

    pub fn spec(&self) -> Tree<'a> {
        self.spec.get().expect("instance has no spec")
    }

    pub fn try_spec(&self) -> Option<Tree<'a>> {
        self.spec.get()
    }

    pub fn set_spec(&self, spec: Tree<'a>) {
        self.spec.set(Some(spec));
    }

    pub fn has_value(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn value(&self) -> Tree<'a> {
        self.value
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no value", self.kind))
    }

    pub fn try_value(&self) -> Option<Tree<'a>> {
        self.value.get()
    }

    pub fn set_value(&self, value: Tree<'a>) {
        self.value.set(Some(value));
    }

    /// The name expression of a named association or attribute reference.
    pub fn name(&self) -> Tree<'a> {
        self.name
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no name", self.kind))
    }

    pub fn set_name(&self, name: Tree<'a>) {
        self.name.set(Some(name));
    }

    pub fn try_name(&self) -> Option<Tree<'a>> {
        self.name.get()
    }

    pub fn left(&self) -> Tree<'a> {
        self.left.get().expect("range has no left bound")
    }

    pub fn try_left(&self) -> Option<Tree<'a>> {
        self.left.get()
    }

    pub fn set_left(&self, left: Tree<'a>) {
        self.left.set(Some(left));
    }

    pub fn right(&self) -> Tree<'a> {
        self.right.get().expect("range has no right bound")
    }

    pub fn try_right(&self) -> Option<Tree<'a>> {
        self.right.get()
    }

    pub fn set_right(&self, right: Tree<'a>) {
        self.right.set(Some(right));
    }

    /// The Verilog node a `Verilog` wrapper carries.
    pub fn vlog(&self) -> Vlog<'a> {
        self.vlog.get().expect("node wraps no Verilog node")
    }

    pub fn try_vlog(&self) -> Option<Vlog<'a>> {
        self.vlog.get()
    }

    pub fn set_vlog(&self, vlog: Vlog<'a>) {
        self.vlog.set(Some(vlog));
    }

    pub fn has_type(&self) -> bool {
        self.ty.get().is_some()
    }

    pub fn ty(&self) -> Type<'a> {
        self.ty
            .get()
            .unwrap_or_else(|| panic!("{:?} node has no type", self.kind))
    }

    pub fn try_type(&self) -> Option<Type<'a>> {
        self.ty.get()
    }

    pub fn set_type(&self, ty: Type<'a>) {
        self.ty.set(Some(ty));
    }

    pub fn subkind(&self) -> Subkind {
        self.subkind.get()
    }

    pub fn set_subkind(&self, subkind: Subkind) {
        self.subkind.set(subkind);
    }

    /// The parameter kind of a `Param` node.
    pub fn param_kind(&self) -> ParamKind {
        match self.subkind.get() {
            Subkind::Param(kind) => kind,
            other => panic!("param has subkind {:?}", other),
        }
    }

    /// The literal kind of a `Literal` node.
    pub fn literal_kind(&self) -> LiteralKind {
        match self.subkind.get() {
            Subkind::Literal(kind) => kind,
            other => panic!("literal has subkind {:?}", other),
        }
    }

    /// The direction of a port declaration.
    pub fn port_dir(&self) -> PortDir {
        match self.subkind.get() {
            Subkind::Port(dir) => dir,
            other => panic!("port has subkind {:?}", other),
        }
    }

    pub fn class(&self) -> Class {
        self.class.get()
    }

    pub fn set_class(&self, class: Class) {
        self.class.set(class);
    }

    pub fn pos(&self) -> usize {
        self.pos.get() as usize
    }

    pub fn set_pos(&self, pos: usize) {
        self.pos.set(pos as u32);
    }

    pub fn ival(&self) -> i64 {
        self.ival.get()
    }

    pub fn set_ival(&self, ival: i64) {
        self.ival.set(ival);
    }

    pub fn dval(&self) -> f64 {
        self.dval.get()
    }

    pub fn set_dval(&self, dval: f64) {
        self.dval.set(dval);
    }

    pub fn flags(&self) -> TreeFlags {
        self.flags.get()
    }

    pub fn set_flags(&self, flags: TreeFlags) {
        self.flags.set(self.flags.get() | flags);
    }

    pub fn global_flags(&self) -> GlobalFlags {
        self.global_flags.get()
    }

    pub fn set_global_flags(&self, flags: GlobalFlags) {
        self.global_flags.set(self.global_flags.get() | flags);
    }

    tree_list!(ports, add_port, ports, port);
    tree_list!(generics, add_generic, generics, generic);
    tree_list!(decls, add_decl, decls, decl);
    tree_list!(stmts, add_stmt, stmts, stmt);
    tree_list!(params, add_param, params, param);
    tree_list!(genmaps, add_genmap, genmaps, genmap);
    tree_list!(conds, add_cond, conds, cond);
    tree_list!(chars, add_char, chars, char_at);
    tree_list!(assocs, add_assoc, assocs, assoc);
    tree_list!(contexts, add_context, contexts, context);
    tree_list!(ranges, add_range, ranges, range);

    /// The owned children of this node: every child list plus the value,
    /// name, and bound slots. Reference slots (`target`, `primary`, `spec`)
    /// point at nodes owned elsewhere and are not included.
    pub fn owned_children(&self) -> Vec<Tree<'a>> {
        let mut children = Vec::new();
        for list in self.child_lists() {
            children.extend(list.borrow().iter().copied());
        }
        for cell in self.child_cells() {
            if let Some(child) = cell.get() {
                children.push(child);
            }
        }
        children
    }

    /// Apply `f` to every owned child slot, replacing the child where `f`
    /// returns a substitute.
    pub fn rewrite_children(&self, f: &mut dyn FnMut(Tree<'a>) -> Option<Tree<'a>>) {
        for list in self.child_lists() {
            let mut list = list.borrow_mut();
            for slot in list.iter_mut() {
                if let Some(repl) = f(*slot) {
                    *slot = repl;
                }
            }
        }
        for cell in self.child_cells() {
            if let Some(child) = cell.get() {
                if let Some(repl) = f(child) {
                    cell.set(Some(repl));
                }
            }
        }
    }

    fn child_lists(&self) -> [&RefCell<Vec<Tree<'a>>>; 11] {
        [
            &self.ports,
            &self.generics,
            &self.decls,
            &self.stmts,
            &self.params,
            &self.genmaps,
            &self.conds,
            &self.chars,
            &self.assocs,
            &self.contexts,
            &self.ranges,
        ]
    }

    fn child_cells(&self) -> [&Cell<Option<Tree<'a>>>; 4] {
        [&self.value, &self.name, &self.left, &self.right]
    }
}

impl<'a> fmt::Debug for TreeData<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({:?}", self.kind, self.id)?;
        if let Some(id) = self.ident.get() {
            write!(f, ", {:?}", id)?;
        }
        write!(f, ")")
    }
}

/// Whether a node is a literal value that can be substituted for references
/// to a generic.
pub fn is_literal(t: Tree) -> bool {
    match t.kind {
        TreeKind::Literal | TreeKind::StringLit => true,
        TreeKind::Ref => matches!(t.try_target(), Some(d) if d.kind == TreeKind::EnumLit),
        _ => false,
    }
}

/// Whether a declaration is a subprogram.
pub fn is_subprogram(t: Tree) -> bool {
    matches!(
        t.kind,
        TreeKind::FuncDecl
            | TreeKind::ProcDecl
            | TreeKind::FuncBody
            | TreeKind::ProcBody
            | TreeKind::FuncInst
            | TreeKind::ProcInst
    )
}

/// Whether a declaration introduces a type.
pub fn is_type_decl(t: Tree) -> bool {
    matches!(t.kind, TreeKind::TypeDecl | TreeKind::SubtypeDecl)
}

/// Build a reference to a declaration.
pub fn make_ref<'a>(arenas: &'a crate::arenas::DesignArenas<'a>, decl: Tree<'a>) -> Tree<'a> {
    let r = arenas.alloc_tree(TreeData::new(TreeKind::Ref));
    r.set_loc(decl.loc());
    r.set_ident(decl.ident());
    r.set_target(decl);
    if decl.has_type() {
        r.set_type(decl.ty());
    }
    r
}

/// Strip selects and conversions off a name expression down to its base
/// reference, if it has one.
pub fn name_to_ref<'a>(mut name: Tree<'a>) -> Option<Tree<'a>> {
    loop {
        match name.kind {
            TreeKind::Ref => return Some(name),
            TreeKind::ArrayRef | TreeKind::RecordRef => name = name.name(),
            TreeKind::TypeConv | TreeKind::Qualified | TreeKind::ConvFunc => name = name.value(),
            _ => return None,
        }
    }
}

/// Rebuild a name expression with its base reference redirected at another
/// declaration. Selects and conversions along the way are copied shallowly.
pub fn change_ref<'a>(
    arenas: &'a crate::arenas::DesignArenas<'a>,
    name: Tree<'a>,
    to: Tree<'a>,
) -> Tree<'a> {
    match name.kind {
        TreeKind::Ref => make_ref(arenas, to),
        TreeKind::ArrayRef | TreeKind::RecordRef => {
            let copy = arenas.alloc_tree(TreeData::new(name.kind));
            copy.set_loc(name.loc());
            if name.has_type() {
                copy.set_type(name.ty());
            }
            if name.has_ident() {
                copy.set_ident(name.ident());
            }
            copy.set_name(change_ref(arenas, name.name(), to));
            for p in name.params() {
                copy.add_param(p);
            }
            copy
        }
        TreeKind::TypeConv | TreeKind::ConvFunc | TreeKind::Qualified => {
            let copy = arenas.alloc_tree(TreeData::new(name.kind));
            copy.set_loc(name.loc());
            if name.has_type() {
                copy.set_type(name.ty());
            }
            if name.has_ident() {
                copy.set_ident(name.ident());
            }
            if let Some(target) = name.try_target() {
                copy.set_target(target);
            }
            copy.set_value(change_ref(arenas, name.value(), to));
            copy
        }
        other => panic!("cannot redirect {:?} name", other),
    }
}

/// Build an integer literal with the type of the given declaration.
pub fn get_int_lit<'a>(
    arenas: &'a crate::arenas::DesignArenas<'a>,
    decl: Tree<'a>,
    value: i64,
) -> Tree<'a> {
    let lit = arenas.alloc_tree(TreeData::new(TreeKind::Literal));
    lit.set_loc(decl.loc());
    lit.set_subkind(Subkind::Literal(LiteralKind::Int));
    lit.set_type(decl.ty());
    lit.set_ival(value);
    lit
}
