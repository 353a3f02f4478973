// Copyright (c) 2022-2025 Fabian Schuiki
#![allow(dead_code)]

//! Helpers shared by the elaboration scenario tests: stub collaborators for
//! the folder, lowering, and registry interfaces, and convenience builders
//! for the handful of tree shapes the scenarios need.

use mead::arenas::DesignArenas;
use mead::builtin::StdTypes;
use mead::eval::{folded_int, Folder};
use mead::library::Library;
use mead::lower::{CoverData, DriverSet, Lowering, LoweredUnit, Shape, UnitRegistry};
use mead::model::EvalContext;
use mead::name::Name;
use mead::session::Session;
use mead::source::Loc;
use mead::tree::{
    Class, LiteralKind, ParamKind, PortDir, RangeDir, Subkind, Tree, TreeData, TreeKind,
};
use mead::ty::Type;
use mead::vlog::{Vlog, VlogData, VlogKind, VlogPortDir};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Set up an elaboration environment plus a builder handle. The bindings
/// named by the two arguments become visible in the test body; everything
/// else stays behind them.
macro_rules! fixture {
    ($env:ident, $fx:ident) => {
        let arenas = mead::arenas::DesignArenas::new();
        let sess = mead::session::Session::new();
        let std_types = mead::builtin::StdTypes::new(&arenas, &sess.names);
        let libraries = mead::library::LibraryManager::new();
        let folder = common::StubFolder { arenas: &arenas };
        let lowering = common::StubLowering::default();
        let registry = common::StubRegistry::default();
        let model = mead::model::Model::new();
        let work = libraries.require(sess.names.intern("work", false));
        let $env = mead::elab::ElabEnv {
            sess: &sess,
            arenas: &arenas,
            libraries: &libraries,
            work: work.clone(),
            std: &std_types,
            folder: &folder,
            lowering: &lowering,
            registry: &registry,
            model: &model,
            cover: None,
            sdf: None,
        };
        let $fx = common::Fx {
            arenas: &arenas,
            sess: &sess,
            std: &std_types,
            work: work.clone(),
            registry: &registry,
        };
    };
}

/// A constant folder that understands literals and references to constants
/// with literal values. Everything else stays unfolded.
pub struct StubFolder<'a> {
    pub arenas: &'a DesignArenas<'a>,
}

fn fold<'a>(t: Tree<'a>) -> Option<Tree<'a>> {
    match t.kind {
        TreeKind::Literal | TreeKind::StringLit => Some(t),
        TreeKind::Ref => {
            let d = t.try_target()?;
            if d.kind == TreeKind::EnumLit {
                Some(t)
            } else if d.has_value() {
                fold(d.value())
            } else {
                None
            }
        }
        TreeKind::Qualified | TreeKind::TypeConv => fold(t.value()),
        _ => None,
    }
}

impl<'a> Folder<'a> for StubFolder<'a> {
    fn try_fold(
        &self,
        value: Tree<'a>,
        _unit: Option<LoweredUnit>,
        _context: Option<EvalContext>,
    ) -> Tree<'a> {
        fold(value).unwrap_or(value)
    }

    fn must_fold(
        &self,
        value: Tree<'a>,
        _unit: Option<LoweredUnit>,
        _context: Option<EvalContext>,
    ) -> Tree<'a> {
        fold(value).unwrap_or(value)
    }

    fn eval_case(
        &self,
        stmt: Tree<'a>,
        _unit: Option<LoweredUnit>,
        _context: Option<EvalContext>,
    ) -> Option<Tree<'a>> {
        let chosen = folded_int(fold(stmt.value())?)?;
        stmt.conds().into_iter().find(|c| match c.try_value() {
            Some(v) => fold(v).and_then(folded_int) == Some(chosen),
            None => true,
        })
    }
}

/// A lowering backend that hands out fresh unit handles and empty driver
/// sets, recording what it was asked to lower.
#[derive(Default)]
pub struct StubLowering {
    next: Cell<u32>,
    pub processes: RefCell<Vec<LoweredUnit>>,
}

impl StubLowering {
    fn bump(&self) -> u32 {
        let n = self.next.get();
        self.next.set(n + 1);
        n
    }
}

impl<'a> Lowering<'a> for StubLowering {
    fn module_shape(&self, _module: Vlog<'a>) -> Shape {
        Shape(self.bump())
    }

    fn lower_instance(
        &self,
        _parent: Option<LoweredUnit>,
        _shape: Option<Shape>,
        _drivers: Option<&DriverSet<'a>>,
        _cover: Option<&CoverData>,
        _block: Tree<'a>,
    ) -> LoweredUnit {
        LoweredUnit(self.bump())
    }

    fn lower_process(
        &self,
        unit: LoweredUnit,
        _process: Tree<'a>,
        _drivers: Option<&DriverSet<'a>>,
    ) {
        self.processes.borrow_mut().push(unit);
    }

    fn lower_psl(&self, _unit: LoweredUnit, _directive: Tree<'a>, _cover: Option<&CoverData>) {}

    fn find_drivers(&self, _body: Tree<'a>) -> DriverSet<'a> {
        DriverSet::new(Vec::new())
    }
}

/// A unit registry that records finalisations and flushes.
#[derive(Default)]
pub struct StubRegistry {
    pub finalised: RefCell<Vec<LoweredUnit>>,
    pub flushed: RefCell<Vec<Name>>,
}

impl UnitRegistry for StubRegistry {
    fn finalise(&self, unit: LoweredUnit) {
        self.finalised.borrow_mut().push(unit);
    }

    fn flush(&self, name: Name) {
        self.flushed.borrow_mut().push(name);
    }
}

/// The builder handle the fixture macro exposes to tests.
pub struct Fx<'a> {
    pub arenas: &'a DesignArenas<'a>,
    pub sess: &'a Session,
    pub std: &'a StdTypes<'a>,
    pub work: Rc<Library<'a>>,
    pub registry: &'a StubRegistry,
}

impl<'a> Fx<'a> {
    pub fn intern(&self, s: &str) -> Name {
        self.sess.names.intern(s, false)
    }

    pub fn str_of(&self, n: Name) -> String {
        self.sess.names.get(n).to_string()
    }

    pub fn loc(&self, file: &str, line: u32) -> Loc {
        Loc::new(self.intern(file), line)
    }

    pub fn tree(&self, kind: TreeKind) -> Tree<'a> {
        self.arenas.alloc_tree(TreeData::new(kind))
    }

    /// An entity named `work.<name>`.
    pub fn entity(&self, name: &str) -> Tree<'a> {
        let e = self.tree(TreeKind::Entity);
        e.set_ident(self.intern(&format!("work.{}", name)));
        e.set_loc(self.loc("design.vhd", 1));
        e
    }

    /// An architecture `<arch>` of an entity, named `work.<entity>-<arch>`.
    pub fn arch(&self, name: &str, entity: Tree<'a>) -> Tree<'a> {
        let a = self.tree(TreeKind::Arch);
        a.set_ident(self.intern(&format!("{}-{}", self.str_of(entity.ident()), name)));
        a.set_ident2(entity.ident());
        a.set_primary(entity);
        a.set_loc(self.loc("design.vhd", 10));
        a
    }

    /// A port on an entity, component, or block.
    pub fn port(&self, owner: Tree<'a>, name: &str, ty: Type<'a>, dir: PortDir) -> Tree<'a> {
        let p = self.tree(TreeKind::PortDecl);
        p.set_ident(self.intern(name));
        p.set_type(ty);
        p.set_subkind(Subkind::Port(dir));
        p.set_loc(self.loc("design.vhd", 2));
        owner.add_port(p);
        p
    }

    /// A generic on an entity, component, or block.
    pub fn generic(
        &self,
        owner: Tree<'a>,
        name: &str,
        ty: Type<'a>,
        class: Class,
        default: Option<Tree<'a>>,
    ) -> Tree<'a> {
        let g = self.tree(TreeKind::GenericDecl);
        g.set_ident(self.intern(name));
        g.set_type(ty);
        g.set_class(class);
        if let Some(d) = default {
            g.set_value(d);
        }
        g.set_loc(self.loc("design.vhd", 3));
        owner.add_generic(g);
        g
    }

    /// A component declaration with an unqualified name.
    pub fn component(&self, name: &str) -> Tree<'a> {
        let c = self.tree(TreeKind::Component);
        c.set_ident(self.intern(name));
        c.set_loc(self.loc("design.vhd", 5));
        c
    }

    /// A component instantiation statement.
    pub fn instance(&self, label: &str, target: Tree<'a>) -> Tree<'a> {
        let i = self.tree(TreeKind::Instance);
        i.set_ident(self.intern(label));
        i.set_ident2(target.ident());
        i.set_target(target);
        i.set_loc(self.loc("design.vhd", 20));
        i
    }

    /// An integer literal.
    pub fn int_lit(&self, value: i64) -> Tree<'a> {
        let l = self.tree(TreeKind::Literal);
        l.set_subkind(Subkind::Literal(LiteralKind::Int));
        l.set_type(self.std.integer);
        l.set_ival(value);
        l
    }

    /// A positional parameter association.
    pub fn pos_param(&self, pos: usize, value: Tree<'a>) -> Tree<'a> {
        let p = self.tree(TreeKind::Param);
        p.set_subkind(Subkind::Param(ParamKind::Pos));
        p.set_pos(pos);
        p.set_value(value);
        p
    }

    /// A static ascending range.
    pub fn range_to(&self, low: i64, high: i64) -> Tree<'a> {
        let r = self.tree(TreeKind::Range);
        r.set_subkind(Subkind::Range(RangeDir::To));
        r.set_left(self.int_lit(low));
        r.set_right(self.int_lit(high));
        r
    }

    /// A reference to a boolean literal, for generate conditions.
    pub fn bool_ref(&self, value: bool) -> Tree<'a> {
        let lit = self.std.boolean.literal(value as usize).unwrap();
        let r = self.tree(TreeKind::Ref);
        r.set_ident(lit.ident());
        r.set_target(lit);
        r.set_type(self.std.boolean);
        r
    }

    /// Register a unit in the working library.
    pub fn add_vhdl(&self, name: &str, unit: Tree<'a>, mtime: u64) {
        self.work
            .put(self.intern(name), mead::library::Object::Vhdl(unit), mtime);
    }

    /// Register a Verilog module in the working library under its qualified
    /// analysed name.
    pub fn add_vlog(&self, name: &str, module: Vlog<'a>, mtime: u64) {
        self.work
            .put(self.intern(name), mead::library::Object::Vlog(module), mtime);
    }

    /// A Verilog module. `ident` is the case-folded analysed name, `ident2`
    /// the case-sensitive source name.
    pub fn vlog_module(&self, name: &str) -> Vlog<'a> {
        let m = self.arenas.alloc_vlog(VlogData::new(VlogKind::Module));
        m.set_ident(self.intern(name));
        m.set_ident2(self.sess.names.intern(name, true));
        m.set_loc(self.loc("design.v", 1));
        m
    }

    /// A port declaration on a Verilog module, appended to both the decl
    /// and port-order lists.
    pub fn vlog_port(
        &self,
        module: Vlog<'a>,
        name: &str,
        ty: Type<'a>,
        dir: VlogPortDir,
    ) -> Vlog<'a> {
        let p = self.arenas.alloc_vlog(VlogData::new(VlogKind::PortDecl));
        p.set_ident(self.sess.names.intern(name, true));
        p.set_ident2(self.sess.names.intern(name, true));
        p.set_type(ty);
        p.set_dir(dir);
        p.set_loc(self.loc("design.v", 2));
        module.add_decl(p);
        module.add_port(p);
        p
    }

    /// Elaborate and return the single top-level block of the result.
    pub fn top_block(&self, result: Tree<'a>) -> Tree<'a> {
        let stmts = result.stmts();
        assert_eq!(stmts.len(), 1, "expected exactly one top-level block");
        stmts[0]
    }

    /// The diagnostics with severity warning, rendered.
    pub fn warnings(&self) -> Vec<String> {
        self.sess
            .diags()
            .into_iter()
            .filter(|d| d.severity == mead::Severity::Warning)
            .map(|d| d.message.clone())
            .collect()
    }

    /// The diagnostics with severity error or worse, rendered.
    pub fn errors(&self) -> Vec<String> {
        self.sess
            .diags()
            .into_iter()
            .filter(|d| d.severity >= mead::Severity::Error)
            .map(|d| d.message.clone())
            .collect()
    }

    /// The `Hier` marker of a block.
    pub fn hier(&self, block: Tree<'a>) -> Tree<'a> {
        block
            .decls()
            .into_iter()
            .find(|d| d.kind == TreeKind::Hier)
            .expect("block has no Hier marker")
    }
}
