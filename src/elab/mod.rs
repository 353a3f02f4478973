// Copyright (c) 2022-2025 Fabian Schuiki

//! The elaboration driver.
//!
//! Elaboration expands a hierarchical design into a tree of concrete
//! instances: every component instance is bound to an entity, architecture,
//! configuration, or Verilog module; generics are resolved to constants;
//! generate statements are statically unrolled; and each block is paired
//! with a lowered unit and a run-time scope as the recursion descends.
//!
//! The descent carries an [`ElabCtx`] per level, chained through parent
//! references on the stack. Most errors are continuable: they are recorded
//! through the session and the recursion carries on to the next gate, which
//! checks the global error count before each phase. The driver returns
//! `None` iff any error was recorded.

pub mod arch;
pub mod bind;
pub mod generate;
pub mod generics;
pub mod modcache;
pub mod path;

mod fixup;

use crate::arenas::DesignArenas;
use crate::builtin::StdTypes;
use crate::errors::{DiagBuilder2, DiagEmitter};
use crate::eval::Folder;
use crate::inst::{new_instance, Prefix};
use crate::library::{Library, LibraryManager, Object};
use crate::lower::{CoverData, Lowering, LoweredUnit, SdfFile, Shape, UnitRegistry};
use crate::model::{EvalContext, Model, Scope, ScopeKind};
use crate::name::{Name, NameTable};
use crate::session::Session;
use crate::simp::simplify_global;
use crate::tree::{NodeId, Subkind, Tree, TreeData, TreeKind};
use crate::vlog::{Vlog, VlogKind};
use std::collections::HashMap;
use std::rc::Rc;

use self::bind::{default_binding, resolve_verilog_instance, top_level_binding};
use self::generics::write_generic;
use self::modcache::{cached_module, ModCacheEntry, ModuleCache};

/// The maximum instantiation depth. Limited by the IR's type indexes.
const MAX_DEPTH: u32 = 127;

/// The collaborators one elaboration runs against.
pub struct ElabEnv<'a> {
    /// The session carrying names, options, diagnostics, and overrides.
    pub sess: &'a Session,
    /// The arenas the output tree is allocated from.
    pub arenas: &'a DesignArenas<'a>,
    /// The loaded libraries.
    pub libraries: &'a LibraryManager<'a>,
    /// The working library.
    pub work: Rc<Library<'a>>,
    /// The canonical built-in types and coercions.
    pub std: &'a StdTypes<'a>,
    /// The constant folder.
    pub folder: &'a dyn Folder<'a>,
    /// The lowering pass and driver analyser.
    pub lowering: &'a dyn Lowering<'a>,
    /// The registry owning lowered units.
    pub registry: &'a dyn UnitRegistry,
    /// The run-time model.
    pub model: &'a Model<'a>,
    /// Optional coverage collector.
    pub cover: Option<&'a CoverData>,
    /// Optional SDF annotation, carried for downstream passes.
    pub sdf: Option<&'a SdfFile>,
}

/// The per-level state of the elaboration descent.
pub struct ElabCtx<'p, 'a> {
    /// The enclosing level, chained on the stack.
    pub(crate) parent: Option<&'p ElabCtx<'p, 'a>>,
    /// The collaborators.
    pub(crate) env: &'p ElabEnv<'a>,
    /// The output block being populated.
    pub(crate) out: Tree<'a>,
    /// The top-level object elaboration started from.
    pub(crate) root: Object<'a>,
    /// The instance statement driving this level, if any.
    pub(crate) inst: Option<Tree<'a>>,
    /// The block configuration applying to this level, if any.
    pub(crate) config: Option<Tree<'a>>,
    /// The colon-separated hierarchical instance path, lowercase.
    pub(crate) inst_name: Option<Name>,
    /// The dot-separated qualified name used for symbol mangling.
    pub(crate) dotted: Name,
    /// The renaming prefix handed to the copy service: architecture name
    /// first, then its entity.
    pub(crate) prefix: Prefix,
    /// The working library of this level.
    pub(crate) library: Rc<Library<'a>>,
    /// Folded literal values per formal generic, for substitution.
    pub(crate) generics: Option<HashMap<NodeId, Tree<'a>>>,
    /// The lowered unit of this level, finalised exactly once on pop.
    pub(crate) lowered: Option<LoweredUnit>,
    /// The driver set of the body being elaborated.
    pub(crate) drivers: Option<crate::lower::DriverSet<'a>>,
    /// The module cache, owned by the root driver.
    pub(crate) modcache: &'p ModuleCache<'a>,
    /// The run-time scope of this level.
    pub(crate) scope: Option<Rc<Scope<'a>>>,
    /// The recursion depth, capped at [`MAX_DEPTH`].
    pub(crate) depth: u32,
}

impl<'p, 'a> ElabCtx<'p, 'a> {
    /// Derive a child context. Callers override the path, output block, and
    /// whatever else their level changes.
    pub(crate) fn inherit(parent: &'p ElabCtx<'p, 'a>) -> ElabCtx<'p, 'a> {
        ElabCtx {
            parent: Some(parent),
            env: parent.env,
            out: parent.out,
            root: parent.root,
            inst: parent.inst,
            config: None,
            inst_name: parent.inst_name,
            dotted: parent.dotted,
            prefix: parent.prefix,
            library: parent.library.clone(),
            generics: None,
            lowered: None,
            drivers: None,
            modcache: parent.modcache,
            scope: None,
            depth: parent.depth + 1,
        }
    }

    pub(crate) fn sess(&self) -> &'a Session {
        self.env.sess
    }

    pub(crate) fn names(&self) -> &'a NameTable {
        &self.env.sess.names
    }

    pub(crate) fn arenas(&self) -> &'a DesignArenas<'a> {
        self.env.arenas
    }

    pub(crate) fn libraries(&self) -> &'a LibraryManager<'a> {
        self.env.libraries
    }

    pub(crate) fn std(&self) -> &'a StdTypes<'a> {
        self.env.std
    }

    pub(crate) fn lowering(&self) -> &'p dyn Lowering<'a> {
        self.env.lowering
    }

    /// The driver set in effect at this level, walking up the chain.
    pub(crate) fn driver_set(&self) -> Option<&crate::lower::DriverSet<'a>> {
        match &self.drivers {
            Some(d) => Some(d),
            None => self.parent.and_then(|p| p.driver_set()),
        }
    }

    /// The folder context for resolving this level's generics: the private
    /// data of the parent's scope, unless that is the root scope.
    pub(crate) fn eval_context(&self) -> Option<EvalContext> {
        let scope = self.parent?.scope.as_ref()?;
        if scope.kind == ScopeKind::Root {
            None
        } else {
            scope.privdata()
        }
    }

    /// The folder context for expressions evaluated at this level.
    pub(crate) fn own_eval_context(&self) -> Option<EvalContext> {
        self.scope.as_ref().and_then(|s| s.privdata())
    }
}

/// Emit the `Hier` marker for a new level into its output block.
pub(crate) fn elab_push_scope<'p, 'a>(t: Tree<'a>, ctx: &mut ElabCtx<'p, 'a>) {
    let h = ctx.arenas().alloc_tree(TreeData::new(TreeKind::Hier));
    h.set_loc(t.loc());
    h.set_subkind(Subkind::Hier(t.kind));
    h.set_target(t);

    h.set_ident(ctx.inst_name.expect("scope without an instance path"));
    h.set_ident2(ctx.dotted);

    ctx.out.add_decl(h);
}

/// Tear a level down: release its generics and drivers and finalise its
/// lowered unit with the registry. Runs on error paths as well.
pub(crate) fn elab_pop_scope<'p, 'a>(ctx: &mut ElabCtx<'p, 'a>) {
    ctx.generics = None;
    ctx.drivers = None;

    if let Some(unit) = ctx.lowered.take() {
        ctx.env.registry.finalise(unit);
    }
}

/// Lower the output block of a level into a fresh unit and create its
/// run-time scope. Diagnostics emitted while lowering carry a hint naming
/// the instance and its generic actuals.
pub(crate) fn elab_lower<'p, 'a>(b: Tree<'a>, shape: Option<Shape>, ctx: &mut ElabCtx<'p, 'a>) {
    let parent_lowered = ctx.parent.and_then(|p| p.lowered);
    let unit = ctx.env.lowering.lower_instance(
        parent_lowered,
        shape,
        ctx.driver_set(),
        ctx.env.cover,
        b,
    );
    ctx.lowered = Some(unit);

    let sess = ctx.env.sess;
    if let Some(inst) = ctx.inst {
        sess.push_hint(instance_hint(&sess.names, inst));
    }

    ctx.scope = Some(
        ctx.env
            .model
            .create_scope(b, ctx.parent.and_then(|p| p.scope.clone())),
    );

    if ctx.inst.is_some() {
        sess.pop_hint();
    }
}

/// The hint notes naming the instance being elaborated and rendering each of
/// its generic actuals. Attached to every diagnostic emitted while lowering
/// the instance.
fn instance_hint<'a>(names: &NameTable, inst: Tree<'a>) -> Vec<String> {
    let mut notes = vec![format!(
        "while elaborating instance {}",
        names.get(inst.ident())
    )];

    let mut unit = inst.target();
    if matches!(unit.kind, TreeKind::Configuration | TreeKind::Arch) {
        if let Some(primary) = unit.try_primary() {
            unit = primary;
        }
    }

    for p in inst.genmaps() {
        let name = match p.subkind() {
            Subkind::Param(crate::tree::ParamKind::Pos) => unit.generic(p.pos()).ident(),
            Subkind::Param(crate::tree::ParamKind::Named) => p.name().ident(),
            _ => continue,
        };

        notes.push(format!(
            "generic {} => {}",
            names.get(name),
            write_generic(names, p.value())
        ));
    }

    notes
}

/// Copy the declarations that survive into the output block. Everything the
/// simulator does not need is dropped here; open-coded builtin subprograms
/// never make it through.
pub(crate) fn elab_decls<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    for d in t.decls() {
        match d.kind {
            TreeKind::SignalDecl
            | TreeKind::ImplicitSignal
            | TreeKind::Alias
            | TreeKind::FileDecl
            | TreeKind::VarDecl
            | TreeKind::ConstDecl
            | TreeKind::FuncBody
            | TreeKind::ProcBody
            | TreeKind::FuncInst
            | TreeKind::ProcInst
            | TreeKind::ProtDecl
            | TreeKind::ProtBody
            | TreeKind::TypeDecl
            | TreeKind::SubtypeDecl
            | TreeKind::PackBody
            | TreeKind::Package
            | TreeKind::PackInst
            | TreeKind::PslDecl
            | TreeKind::AttrSpec => ctx.out.add_decl(d),
            TreeKind::FuncDecl | TreeKind::ProcDecl => {
                if !d.flags().contains(crate::tree::TreeFlags::OPEN_CODED) {
                    ctx.out.add_decl(d);
                }
            }
            _ => {}
        }
    }
}

/// Load every library referenced by a unit's context clauses, so the
/// synthesis binding fallback can search them.
fn elab_context<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    for c in t.contexts() {
        if c.kind == TreeKind::LibClause {
            ctx.libraries().require(c.ident());
        }
    }
}

/// Copy a unit set for instantiation: the architecture together with its
/// entity, plus the configuration when one applies. The copy carries the
/// union of the input units' global flags.
fn elab_copy<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) -> Tree<'a> {
    let roots = match t.kind {
        // Architecture must be processed last.
        TreeKind::Arch => vec![t.primary(), t],
        TreeKind::BlockConfig => {
            let arch = t.target();
            assert_eq!(arch.kind, TreeKind::Arch);
            vec![arch.primary(), arch, t]
        }
        other => panic!("unexpected {:?} in elab_copy", other),
    };

    let mut gflags = crate::tree::GlobalFlags::default();
    for r in &roots {
        gflags |= r.global_flags();
    }

    let copies = new_instance(ctx.arenas(), ctx.names(), &roots, ctx.dotted, ctx.prefix);
    let copy = *copies.last().unwrap();

    copy.set_global_flags(gflags);
    copy
}

/// Record the renaming prefix of a unit about to be copied. The order is
/// important: the architecture name is itself prefixed with the entity
/// name, so it must be tried first.
fn elab_subprogram_prefix<'p, 'a>(arch: Tree<'a>, ctx: &mut ElabCtx<'p, 'a>) {
    assert_eq!(arch.kind, TreeKind::Arch);

    ctx.prefix[0] = Some(arch.ident());
    ctx.prefix[1] = Some(arch.primary().ident());
}

/// Elaborate a bound architecture into a fresh child block: copy the unit
/// set, resolve generics, fix up non-constant generics, simplify, match
/// ports, and descend into declarations and statements.
pub(crate) fn elab_architecture<'p, 'a>(
    bind: Tree<'a>,
    arch: Tree<'a>,
    config: Option<Tree<'a>>,
    ctx: &ElabCtx<'p, 'a>,
) {
    let names = ctx.names();

    let (label, inst, ninst) = match bind.kind {
        TreeKind::Binding => {
            let label = names.rfrom(arch.primary().ident(), '.');
            (label, None, ctx.inst_name)
        }
        TreeKind::Instance => {
            let label = bind.ident();
            let ninst = path::hpath(
                names,
                ctx.inst_name,
                ':',
                &format!(
                    "{}@{}({})",
                    names.get(label),
                    path::simple_name(&names.get(arch.ident2())),
                    path::simple_name(&names.get(arch.ident()))
                ),
            );
            (label, Some(bind), Some(ninst))
        }
        other => panic!("unexpected binding kind {:?} in elab_architecture", other),
    };

    let ndotted = names.prefix(Some(ctx.dotted), label, '.');

    let mut new_ctx = ElabCtx::inherit(ctx);
    new_ctx.inst_name = ninst;
    new_ctx.dotted = ndotted;
    if inst.is_some() {
        new_ctx.inst = inst;
    }

    let b = ctx.arenas().alloc_tree(TreeData::new(TreeKind::Block));
    b.set_ident(label);
    b.set_loc(bind.loc());

    ctx.out.add_stmt(b);
    new_ctx.out = b;

    new_ctx.library = ctx.libraries().require(names.until(arch.ident(), '.'));

    elab_subprogram_prefix(arch, &mut new_ctx);

    let arch_copy = match config {
        Some(config) => {
            assert_eq!(config.target().id, arch.id);
            let config_copy = elab_copy(config, &new_ctx);
            new_ctx.config = Some(config_copy);
            config_copy.target()
        }
        None => elab_copy(arch, &new_ctx),
    };

    let entity = arch_copy.primary();

    debug!(
        "elaborating architecture {} as {}",
        names.get(arch.ident()),
        names.get(ndotted)
    );

    elab_push_scope(arch, &mut new_ctx);
    elab_context(entity, &new_ctx);
    elab_context(arch_copy, &new_ctx);
    generics::elab_generics(entity, bind, &mut new_ctx);
    fixup::elab_instance_fixup(arch_copy, &new_ctx);
    if let Some(generics) = &new_ctx.generics {
        simplify_global(arch_copy, generics);
    }
    bind::elab_ports(entity, bind, &new_ctx);
    elab_decls(entity, &new_ctx);

    if ctx.sess().error_count() == 0 {
        elab_decls(arch_copy, &new_ctx);
    }

    if ctx.sess().error_count() == 0 {
        new_ctx.drivers = Some(ctx.env.lowering.find_drivers(arch_copy));
        elab_lower(b, None, &mut new_ctx);
        elab_stmts(entity, &new_ctx);
        elab_stmts(arch_copy, &new_ctx);
    }

    elab_pop_scope(&mut new_ctx);
}

/// Elaborate a Verilog module into a fresh child block, using its cached
/// synthetic block and lowered shape.
pub(crate) fn elab_verilog_module<'p, 'a>(
    bind: Option<Tree<'a>>,
    label: Name,
    mc: &Rc<ModCacheEntry<'a>>,
    ctx: &ElabCtx<'p, 'a>,
) {
    let names = ctx.names();

    let ninst = path::hpath(names, ctx.inst_name, ':', &names.get(label));
    let ndotted = names.prefix(Some(ctx.dotted), label, '.');

    let mut new_ctx = ElabCtx::inherit(ctx);
    new_ctx.inst_name = Some(ninst);
    new_ctx.dotted = ndotted;

    let b = ctx.arenas().alloc_tree(TreeData::new(TreeKind::Block));
    b.set_ident(label);
    b.set_loc(ctx.out.loc());

    ctx.out.add_stmt(b);
    new_ctx.out = b;

    elab_push_scope(mc.wrap, &mut new_ctx);

    if let Some(bind) = bind {
        bind::elab_ports(mc.block, bind, &new_ctx);
    }

    if ctx.sess().error_count() == 0 {
        elab_decls(mc.block, &new_ctx);
    }

    if ctx.sess().error_count() == 0 {
        new_ctx.drivers = Some(ctx.env.lowering.find_drivers(mc.block));
        elab_lower(b, Some(mc.shape), &mut new_ctx);
        elab_stmts(mc.block, &new_ctx);
    }

    elab_pop_scope(&mut new_ctx);
}

/// Locate the specification applying to a component instance: an explicit
/// spec on the instance itself, or a matching spec in the enclosing block
/// configuration. A spec naming the instance's label (or `all`) beats one
/// with no label.
fn elab_find_spec<'p, 'a>(inst: Tree<'a>, ctx: &ElabCtx<'p, 'a>) -> Option<Tree<'a>> {
    if inst.has_spec() {
        return Some(inst.spec());
    }
    let config = ctx.config?;
    assert_eq!(config.kind, TreeKind::BlockConfig);

    let names = ctx.names();
    let all = names.intern("all", false);

    let mut spec = None;
    for d in config.decls() {
        if d.kind != TreeKind::Spec {
            continue;
        } else if d.ident2() != inst.ident2() {
            continue;
        }

        let apply = if d.has_ident() {
            let m = d.ident();
            m == inst.ident() || m == all
        } else {
            spec.is_none()
        };

        if apply {
            spec = Some(d);
        }
    }

    spec
}

/// Elaborate a component instance: find its binding, clone the component
/// and binding when non-constant generics make the use site unique, then
/// build the child block and descend into the bound unit.
fn elab_component<'p, 'a>(inst: Tree<'a>, comp: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let names = ctx.names();
    let arenas = ctx.arenas();

    let mut comp = comp;
    let mut arch = None;
    let mut config = None;
    let mut bind = None;

    let spec = elab_find_spec(inst, ctx);
    match spec {
        Some(spec) if spec.has_value() => {
            let b = spec.value();
            assert_eq!(b.kind, TreeKind::Binding);
            bind = Some(b);

            let decls = spec.decls();
            match decls.len() {
                0 => {
                    let unit = b.target();
                    match unit.kind {
                        TreeKind::Entity => match arch::pick_arch(inst.loc(), unit, ctx) {
                            Ok(a) => arch = Some(a),
                            Err(()) => return,
                        },
                        TreeKind::Configuration => {
                            let c = unit.decl(0);
                            assert_eq!(c.kind, TreeKind::BlockConfig);
                            config = Some(c);
                            arch = Some(c.target());
                        }
                        TreeKind::Arch => arch = Some(unit),
                        _ => {
                            ctx.sess().emit(
                                DiagBuilder2::fatal(
                                    "sorry, this form of binding indication is not \
                                     supported yet",
                                )
                                .span(b.loc()),
                            );
                            return;
                        }
                    }
                }
                1 => {
                    let c = decls[0];
                    assert_eq!(c.kind, TreeKind::BlockConfig);
                    config = Some(c);
                    arch = Some(c.target());
                }
                _ => {
                    ctx.sess().emit(
                        DiagBuilder2::fatal(
                            "sorry, this form of binding indication is not supported yet",
                        )
                        .span(spec.loc()),
                    );
                    return;
                }
            }
        }
        Some(_) => {}
        None => {
            if let Some(b) = default_binding(inst, ctx) {
                arch = Some(b.target());
                bind = Some(b);
            }
        }
    }

    // Must create a unique instance if type or package generics present.
    if comp
        .generics()
        .iter()
        .any(|g| g.class() != crate::tree::Class::Constant)
    {
        let roots: Vec<_> = Some(comp).into_iter().chain(bind).collect();
        let copies = new_instance(arenas, names, &roots, ctx.dotted, ctx.prefix);

        comp = copies[0];
        if bind.is_some() {
            bind = Some(copies[1]);
        }
    }

    let mut ninst = path::hpath(names, ctx.inst_name, ':', &names.get(inst.ident()));

    if let Some(a) = arch {
        if a.kind != TreeKind::Verilog {
            ninst = path::hpath(
                names,
                Some(ninst),
                '@',
                &format!(
                    "{}({})",
                    path::simple_name(&names.get(a.ident2())),
                    path::simple_name(&names.get(a.ident()))
                ),
            );
        }
    }

    let ndotted = names.prefix(Some(ctx.dotted), inst.ident(), '.');

    let mut new_ctx = ElabCtx::inherit(ctx);
    new_ctx.inst_name = Some(ninst);
    new_ctx.dotted = ndotted;
    new_ctx.inst = Some(inst);

    let b = arenas.alloc_tree(TreeData::new(TreeKind::Block));
    b.set_ident(inst.ident());
    b.set_loc(inst.loc());

    ctx.out.add_stmt(b);
    new_ctx.out = b;

    elab_push_scope(comp, &mut new_ctx);
    generics::elab_generics(comp, inst, &mut new_ctx);
    if let Some(bind) = bind {
        fixup::elab_instance_fixup(bind, &new_ctx);
    }
    fixup::elab_instance_fixup(comp, &new_ctx);
    bind::elab_ports(comp, inst, &new_ctx);

    if let (Some(bind), Some(a)) = (bind, arch) {
        if a.kind != TreeKind::Verilog {
            new_ctx.drivers = Some(ctx.env.lowering.find_drivers(bind));
        }
    }

    if ctx.sess().error_count() == 0 {
        elab_lower(b, None, &mut new_ctx);
    }

    match arch {
        None => {} // Unbound instance
        Some(a) if a.kind == TreeKind::Verilog => {
            let mc = cached_module(a.vlog(), ctx);
            elab_verilog_module(bind, mc.module.ident2(), &mc, &new_ctx);
        }
        Some(a) => {
            if ctx.sess().error_count() == 0 {
                elab_architecture(
                    bind.expect("bound architecture without a binding"),
                    a,
                    config,
                    &new_ctx,
                );
            }
        }
    }

    elab_pop_scope(&mut new_ctx);
}

/// Find the block configuration applying to a nested block or generate
/// body.
pub(crate) fn elab_block_config<'p, 'a>(
    block: Tree<'a>,
    ctx: &ElabCtx<'p, 'a>,
) -> Option<Tree<'a>> {
    let config = ctx.config?;
    let label = block.ident();

    config
        .decls()
        .into_iter()
        .find(|d| d.kind == TreeKind::BlockConfig && d.ident() == label)
}

/// Elaborate an instance statement, dispatching on the referenced unit.
fn elab_instance<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    if ctx.depth == MAX_DEPTH {
        ctx.sess().emit(
            DiagBuilder2::error(format!(
                "maximum instantiation depth of {} reached",
                MAX_DEPTH
            ))
            .span(t.loc())
            .add_note("this is likely caused by unbounded recursion"),
        );
        return;
    }

    let target = t.target();
    match target.kind {
        TreeKind::Entity => match arch::pick_arch(t.loc(), target, ctx) {
            Ok(arch) => elab_architecture(t, arch, None, ctx),
            Err(()) => {}
        },

        TreeKind::Arch => elab_architecture(t, target, None, ctx),

        TreeKind::Component => elab_component(t, target, ctx),

        TreeKind::Configuration => {
            let config = target.decl(0);
            assert_eq!(config.kind, TreeKind::BlockConfig);

            elab_architecture(t, config.target(), Some(config), ctx);
        }

        other => panic!("unexpected tree kind {:?} in elab_instance", other),
    }
}

/// Elaborate an explicit block statement.
fn elab_block<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let names = ctx.names();
    let id = t.ident();

    let b = ctx.arenas().alloc_tree(TreeData::new(TreeKind::Block));
    b.set_ident(id);
    b.set_loc(t.loc());

    ctx.out.add_stmt(b);

    let ninst = path::hpath(names, ctx.inst_name, ':', &names.get(id));
    let ndotted = names.prefix(Some(ctx.dotted), id, '.');

    let mut new_ctx = ElabCtx::inherit(ctx);
    new_ctx.out = b;
    new_ctx.inst_name = Some(ninst);
    new_ctx.dotted = ndotted;
    new_ctx.config = elab_block_config(t, ctx);

    let base_errors = ctx.sess().error_count();

    elab_push_scope(t, &mut new_ctx);
    generics::elab_generics(t, t, &mut new_ctx);
    bind::elab_ports(t, t, &new_ctx);
    elab_decls(t, &new_ctx);

    if ctx.sess().error_count() == base_errors {
        elab_lower(b, None, &mut new_ctx);
        elab_stmts(t, &new_ctx);
    }

    elab_pop_scope(&mut new_ctx);
}

/// Elaborate a process: lower it into the current unit and copy it through
/// to the output block. No further descent.
fn elab_process<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    if ctx.sess().error_count() == 0 {
        ctx.env.lowering.lower_process(
            ctx.lowered.expect("process outside a lowered block"),
            t,
            ctx.driver_set(),
        );
    }

    ctx.out.add_stmt(t);
}

/// Elaborate a PSL directive: lower it into the current unit and copy it
/// through to the output block.
fn elab_psl<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    if ctx.sess().error_count() == 0 {
        ctx.env.lowering.lower_psl(
            ctx.lowered.expect("PSL directive outside a lowered block"),
            t,
            ctx.env.cover,
        );
    }

    ctx.out.add_stmt(t);
}

/// Elaborate a wrapped Verilog statement. Module instances bind and recurse
/// into their module; anything else copies through.
fn elab_verilog_stmt<'p, 'a>(wrap: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let v = wrap.vlog();
    match v.kind {
        VlogKind::ModInst => {
            if let Some((mc, bind)) = resolve_verilog_instance(v, ctx) {
                elab_verilog_module(Some(bind), v.ident(), &mc, ctx);
            }
        }
        _ => ctx.out.add_stmt(wrap),
    }
}

/// The statement recursor: dispatch every concurrent statement of a body in
/// source order.
pub(crate) fn elab_stmts<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    for s in t.stmts() {
        match s.kind {
            TreeKind::Instance => elab_instance(s, ctx),
            TreeKind::Block => elab_block(s, ctx),
            TreeKind::ForGenerate => generate::elab_for_generate(s, ctx),
            TreeKind::IfGenerate => generate::elab_if_generate(s, ctx),
            TreeKind::CaseGenerate => generate::elab_case_generate(s, ctx),
            TreeKind::Process => elab_process(s, ctx),
            TreeKind::PslDirect => elab_psl(s, ctx),
            TreeKind::Verilog => elab_verilog_stmt(s, ctx),
            other => panic!("unexpected statement {:?}", other),
        }
    }
}

/// Elaborate a VHDL top-level unit.
fn elab_vhdl_root<'p, 'a>(vhdl: Tree<'a>, ctx: &mut ElabCtx<'p, 'a>) {
    let names = ctx.names();

    let mut config = None;
    let arch = match vhdl.kind {
        TreeKind::Entity => match arch::pick_arch(vhdl.loc(), vhdl, ctx) {
            Ok(a) => a,
            Err(()) => return,
        },
        TreeKind::Arch => vhdl,
        TreeKind::Configuration => {
            let c = vhdl.decl(0);
            assert_eq!(c.kind, TreeKind::BlockConfig);
            config = Some(c);
            c.target()
        }
        _ => {
            ctx.sess().emit(DiagBuilder2::fatal(format!(
                "{} is not a suitable top-level unit",
                names.get(vhdl.ident())
            )));
            return;
        }
    };

    let name = names.get(arch.ident2());
    ctx.inst_name = Some(path::hpath(
        names,
        None,
        ':',
        &format!(
            ":{}({})",
            path::simple_name(&name),
            path::simple_name(&names.get(arch.ident()))
        ),
    ));

    let bind = top_level_binding(arch, ctx);

    if ctx.sess().error_count() == 0 {
        elab_architecture(bind, arch, config, ctx);
    }
}

/// Elaborate a Verilog top-level module.
fn elab_verilog_root<'p, 'a>(vlog: Vlog<'a>, ctx: &mut ElabCtx<'p, 'a>) {
    let mc = cached_module(vlog, ctx);
    elab_verilog_module(None, mc.module.ident2(), &mc, ctx);
}

/// Elaborate a top-level design unit.
///
/// Returns the elaborated tree, a single `Elab` node named `<top>.elab`
/// containing one top-level block, or `None` if any error was recorded. The
/// arenas are frozen on success.
pub fn elaborate<'a>(env: &ElabEnv<'a>, top: Object<'a>) -> Option<Tree<'a>> {
    let names = &env.sess.names;
    let elab_suffix = names.intern("elab", false);

    let name = match top {
        Object::Vhdl(t) => names.prefix(Some(t.ident()), elab_suffix, '.'),
        Object::Vlog(v) => {
            names.prefix(Some(names.intern(&names.get(v.ident()), false)), elab_suffix, '.')
        }
    };

    let e = env.arenas.alloc_tree(TreeData::new(TreeKind::Elab));
    e.set_ident(name);
    e.set_loc(top.loc());

    let modcache = ModuleCache::new();
    let root_scope = env.model.create_scope(e, None);

    let mut ctx = ElabCtx {
        parent: None,
        env,
        out: e,
        root: top,
        inst: None,
        config: None,
        inst_name: None,
        dotted: env.work.name(),
        prefix: [None, None],
        library: env.work.clone(),
        generics: None,
        lowered: None,
        drivers: None,
        modcache: &modcache,
        scope: Some(root_scope),
        depth: 0,
    };

    match top {
        Object::Vhdl(t) => elab_vhdl_root(t, &mut ctx),
        Object::Vlog(v) => elab_verilog_root(v, &mut ctx),
    }

    // The cache owns its entries; both die with the root frame.
    drop(ctx);
    drop(modcache);

    if env.sess.error_count() > 0 {
        return None;
    }

    debug!("elaborated {:?}", e);

    for unused in env.sess.unused_overrides() {
        env.sess.emit(DiagBuilder2::warning(format!(
            "generic value for {} not used",
            names.get(unused.name)
        )));
    }

    if let Some(&b0) = e.stmts().first() {
        let vu_name = names.prefix(Some(env.work.name()), b0.ident(), '.');
        env.registry.flush(vu_name);
    }

    env.arenas.freeze();
    Some(e)
}
