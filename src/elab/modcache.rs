// Copyright (c) 2022-2025 Fabian Schuiki

//! The Verilog module cache.
//!
//! Every Verilog module that takes part in elaboration needs three things:
//! a lowered shape for the blocks that instantiate it, a synthetic VHDL
//! block whose ports mirror the module's ports across the language boundary,
//! and a wrapper tree node that lets the module travel through VHDL binding
//! machinery. All three are built once per module and memoised; the cache is
//! owned by the root driver and outlives every context that references it.

use crate::elab::ElabCtx;
use crate::lower::Lowering;
use crate::tree::{NodeId, PortDir, Subkind, Tree, TreeData, TreeKind};
use crate::vlog::{Vlog, VlogKind, VlogPortDir};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::lower::Shape;

/// The memoised artifacts of one Verilog module.
pub struct ModCacheEntry<'a> {
    /// The pre-lowered shape of the module.
    pub shape: Shape,
    /// A synthetic block whose ports mirror the module's ports.
    pub block: Tree<'a>,
    /// A `Verilog` wrapper node carrying the module.
    pub wrap: Tree<'a>,
    /// The module itself.
    pub module: Vlog<'a>,
}

/// The cache of per-module artifacts.
pub struct ModuleCache<'a> {
    entries: RefCell<HashMap<NodeId, Rc<ModCacheEntry<'a>>>>,
}

impl<'a> ModuleCache<'a> {
    pub fn new() -> ModuleCache<'a> {
        ModuleCache {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<'a> Default for ModuleCache<'a> {
    fn default() -> ModuleCache<'a> {
        ModuleCache::new()
    }
}

/// Get or build the cache entry for a top-level Verilog module.
pub(crate) fn cached_module<'p, 'a>(
    module: Vlog<'a>,
    ctx: &ElabCtx<'p, 'a>,
) -> Rc<ModCacheEntry<'a>> {
    assert!(module.is_top_level());

    if let Some(entry) = ctx.modcache.entries.borrow().get(&module.id) {
        return entry.clone();
    }

    let arenas = ctx.arenas();
    let shape = ctx.lowering().module_shape(module);

    let block = arenas.alloc_tree(TreeData::new(TreeKind::Block));
    block.set_loc(module.loc());
    block.set_ident(module.ident());
    translate(module, block, ctx);

    let wrap = arenas.alloc_tree(TreeData::new(TreeKind::Verilog));
    wrap.set_loc(module.loc());
    wrap.set_ident(module.ident());
    wrap.set_vlog(module);

    let entry = Rc::new(ModCacheEntry {
        shape,
        block,
        wrap,
        module,
    });
    ctx.modcache
        .entries
        .borrow_mut()
        .insert(module.id, entry.clone());
    entry
}

/// The language-crossing translation step: mirror the module's port
/// declarations as VHDL ports on the synthetic block, preserving source
/// order, and wrap the module's statements so the recursor can reach nested
/// module instances.
fn translate<'p, 'a>(module: Vlog<'a>, block: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let arenas = ctx.arenas();
    for decl in module.decls() {
        if decl.kind != VlogKind::PortDecl {
            continue;
        }
        let port = arenas.alloc_tree(TreeData::new(TreeKind::PortDecl));
        port.set_loc(decl.loc());
        port.set_ident(decl.ident());
        port.set_type(decl.ty());
        port.set_subkind(Subkind::Port(match decl.dir() {
            VlogPortDir::Input => PortDir::In,
            VlogPortDir::Output => PortDir::Out,
        }));
        block.add_port(port);
    }
    for stmt in module.stmts() {
        let wrap = arenas.alloc_tree(TreeData::new(TreeKind::Verilog));
        wrap.set_loc(stmt.loc());
        wrap.set_ident(stmt.ident());
        wrap.set_vlog(stmt);
        block.add_stmt(wrap);
    }
}
