// Copyright (c) 2022-2025 Fabian Schuiki

//! Binding builders.
//!
//! A binding pairs a component or module instance with the design unit that
//! fulfils it, carrying the generic and port associations the output block
//! will be populated from. Four builders exist: the LRM default binding for
//! VHDL components (with a synthesis-tool style library search fallback),
//! explicit bindings from configurations (assembled by the component
//! elaboration itself), VHDL components bound to Verilog modules, and
//! Verilog instances bound to Verilog modules. The two cross-language
//! builders insert conversion functions from the coercion tables.

use crate::elab::arch::{find_lib, pick_arch};
use crate::elab::modcache::{cached_module, ModCacheEntry};
use crate::elab::ElabCtx;
use crate::errors::{DiagBuilder2, DiagEmitter};
use crate::tree::{
    change_ref, is_literal, make_ref, name_to_ref, Class, ParamKind, PortDir, Subkind, Tree,
    TreeData, TreeKind,
};
use crate::ty::type_eq;
use crate::vlog::{Vlog, VlogKind, VlogPortDir};
use std::rc::Rc;

/// Append a parameter association to a binding or block.
pub(crate) fn add_param<'a>(
    arenas: &'a crate::arenas::DesignArenas<'a>,
    t: Tree<'a>,
    value: Tree<'a>,
    kind: ParamKind,
    name: Option<Tree<'a>>,
) {
    let p = arenas.alloc_tree(TreeData::new(TreeKind::Param));
    p.set_loc(value.loc());
    p.set_subkind(Subkind::Param(kind));
    p.set_value(value);
    match kind {
        ParamKind::Pos => p.set_pos(t.params().len()),
        ParamKind::Named => p.set_name(name.expect("named parameter without name")),
    }
    t.add_param(p);
}

/// Build the default binding for a component instance, following LRM 93
/// section 5.2.2 with the synthesis fallback. Returns `None` after a
/// diagnostic when no binding can be constructed.
pub(crate) fn default_binding<'p, 'a>(
    inst: Tree<'a>,
    ctx: &ElabCtx<'p, 'a>,
) -> Option<Tree<'a>> {
    let names = ctx.names();
    let arenas = ctx.arenas();
    let comp = inst.target();

    let full = comp.ident();
    let lib_part = names.until(full, '.');

    let (lib, full, synth_binding) = if lib_part == full {
        // Unqualified component name: search the working library first, then
        // fall back to a scan of every loaded library. This is not correct
        // according to the LRM but matches the behaviour of many synthesis
        // tools.
        let lib = ctx.library.clone();
        (lib.clone(), names.prefix(Some(lib.name()), full, '.'), true)
    } else {
        let lib = find_lib(lib_part, ctx);
        // Strip out the component package name, if any.
        (
            lib,
            names.prefix(Some(lib_part), names.rfrom(full, '.'), '.'),
            false,
        )
    };

    let obj = lib.get(full);

    if let Some(module) = obj.and_then(|o| o.as_vlog()) {
        let mc = cached_module(module, ctx);
        return mixed_binding(comp, &mc, ctx);
    }

    let mut entity = obj.and_then(|o| o.as_vhdl());

    if entity.is_none() && synth_binding {
        ctx.libraries().for_all(|lib| {
            let name = names.prefix(Some(lib.name()), comp.ident(), '.');
            entity = lib.get(name).and_then(|o| o.as_vhdl());
            entity.is_none()
        });
    }

    let entity = match entity {
        Some(e) => e,
        None => {
            ctx.sess().emit(
                DiagBuilder2::warning(format!(
                    "cannot find entity for component {} without binding indication",
                    names.get(comp.ident())
                ))
                .span(inst.loc()),
            );
            return None;
        }
    };

    let arch = pick_arch(comp.loc(), entity, ctx).ok()?;

    trace!(
        "default binding for {} resolved to {}",
        names.get(comp.ident()),
        names.get(arch.ident())
    );

    // Check entity is compatible with component declaration.

    let bind = arenas.alloc_tree(TreeData::new(TreeKind::Binding));
    bind.set_ident(arch.ident());
    bind.set_loc(arch.loc());
    bind.set_target(arch);
    bind.set_class(Class::Entity);

    let c_generics = comp.generics();
    for (i, eg) in entity.generics().iter().enumerate() {
        let matched = c_generics.iter().find(|cg| cg.ident() == eg.ident());

        let value = match matched {
            Some(&cg) => {
                if cg.class() != eg.class() {
                    ctx.sess().emit(
                        DiagBuilder2::error(format!(
                            "generic {} in component {} has class {} which is incompatible \
                             with class {} in entity {}",
                            names.get(cg.ident()),
                            names.get(comp.ident()),
                            cg.class().to_str(),
                            eg.class().to_str(),
                            names.get(entity.ident())
                        ))
                        .span(inst.loc())
                        .add_note(format!(
                            "declaration of generic {} in component",
                            names.get(cg.ident())
                        ))
                        .add_note(format!(
                            "declaration of generic {} in entity",
                            names.get(eg.ident())
                        )),
                    );
                    return None;
                } else if eg.class() == Class::Package {
                    let value = arenas.alloc_tree(TreeData::new(TreeKind::Ref));
                    value.set_ident(cg.ident());
                    value.set_target(cg);
                    value
                } else {
                    let ctype = cg.ty();
                    let etype = eg.ty();
                    if !type_eq(ctype, etype) {
                        ctx.sess().emit(
                            DiagBuilder2::error(format!(
                                "generic {} in component {} has type {} which is incompatible \
                                 with type {} in entity {}",
                                names.get(cg.ident()),
                                names.get(comp.ident()),
                                ctype.pp(names),
                                etype.pp(names),
                                names.get(entity.ident())
                            ))
                            .span(inst.loc())
                            .add_note(format!(
                                "declaration of generic {} in component",
                                names.get(cg.ident())
                            ))
                            .add_note(format!(
                                "declaration of generic {} in entity",
                                names.get(eg.ident())
                            )),
                        );
                        return None;
                    }
                    make_ref(arenas, cg)
                }
            }
            None if eg.has_value() => {
                let def = eg.value();
                if is_literal(def) {
                    def
                } else {
                    let open = arenas.alloc_tree(TreeData::new(TreeKind::Open));
                    open.set_loc(eg.loc());
                    open.set_type(eg.ty());
                    open
                }
            }
            None => {
                ctx.sess().emit(
                    DiagBuilder2::error(format!(
                        "generic {} in entity {} without a default value has no \
                         corresponding generic in component {}",
                        names.get(eg.ident()),
                        names.get(entity.ident()),
                        names.get(comp.ident())
                    ))
                    .span(inst.loc())
                    .add_note(format!(
                        "declaration of generic {} in entity",
                        names.get(eg.ident())
                    )),
                );
                return None;
            }
        };

        let map = arenas.alloc_tree(TreeData::new(TreeKind::Param));
        map.set_loc(inst.loc());
        map.set_value(value);
        map.set_subkind(Subkind::Param(ParamKind::Pos));
        map.set_pos(i);
        bind.add_genmap(map);
    }

    let c_ports = comp.ports();
    for ep in entity.ports() {
        let matched = c_ports.iter().find(|cp| cp.ident() == ep.ident());

        let value = match matched {
            Some(&cp) => {
                let ctype = cp.ty();
                let etype = ep.ty();
                if !type_eq(ctype, etype) {
                    ctx.sess().emit(
                        DiagBuilder2::error(format!(
                            "port {} in component {} has type {} which is incompatible \
                             with type {} in entity {}",
                            names.get(cp.ident()),
                            names.get(comp.ident()),
                            ctype.pp(names),
                            etype.pp(names),
                            names.get(entity.ident())
                        ))
                        .span(inst.loc())
                        .add_note(format!(
                            "declaration of port {} in component",
                            names.get(cp.ident())
                        ))
                        .add_note(format!(
                            "declaration of port {} in entity",
                            names.get(ep.ident())
                        )),
                    );
                    return None;
                }
                make_ref(arenas, cp)
            }
            None => {
                let open_ok = ep.has_value()
                    || (ep.port_dir() == PortDir::Out && !ep.ty().is_unconstrained());
                if open_ok {
                    let open = arenas.alloc_tree(TreeData::new(TreeKind::Open));
                    open.set_loc(ep.loc());
                    open.set_type(ep.ty());
                    open
                } else {
                    ctx.sess().emit(
                        DiagBuilder2::error(format!(
                            "port {} in entity {} without a default value has no \
                             corresponding port in component {}",
                            names.get(ep.ident()),
                            names.get(entity.ident()),
                            names.get(comp.ident())
                        ))
                        .span(inst.loc())
                        .add_note(format!("port {} declared here", names.get(ep.ident()))),
                    );
                    return None;
                }
            }
        };

        add_param(arenas, bind, value, ParamKind::Pos, None);
    }

    Some(bind)
}

/// Bind a VHDL component to a Verilog module, inserting coercion functions
/// at the language boundary.
pub(crate) fn mixed_binding<'p, 'a>(
    comp: Tree<'a>,
    mc: &Rc<ModCacheEntry<'a>>,
    ctx: &ElabCtx<'p, 'a>,
) -> Option<Tree<'a>> {
    assert_eq!(comp.kind, TreeKind::Component);

    let names = ctx.names();
    let arenas = ctx.arenas();
    let std = ctx.std();

    let bind = arenas.alloc_tree(TreeData::new(TreeKind::Binding));
    bind.set_ident(mc.module.ident());
    bind.set_loc(comp.loc());
    bind.set_target(mc.wrap);
    bind.set_class(Class::Entity);

    let cports = comp.ports();
    let block_ports = mc.block.ports();
    let mut have = vec![false; cports.len()];
    let mut have_named = false;
    let mut port_idx = 0;

    for mport in mc.module.decls() {
        if mport.kind != VlogKind::PortDecl {
            continue;
        }

        let name = mport.ident2();
        let vport = block_ports[port_idx];
        port_idx += 1;
        assert_eq!(vport.ident(), mport.ident());

        let name_str = names.get(name);
        let cport = cports.iter().enumerate().find(|(_, cp)| {
            names.get(cp.ident()).eq_ignore_ascii_case(&name_str)
        });

        let (j, cport) = match cport {
            Some((j, &cp)) => (j, cp),
            None => {
                ctx.sess().emit(
                    DiagBuilder2::error(format!(
                        "missing matching VHDL port declaration for Verilog port {} \
                         in component {}",
                        names.get(mport.ident()),
                        names.get(comp.ident())
                    ))
                    .span(comp.loc()),
                );
                return None;
            }
        };
        have[j] = true;

        if *names.get(cport.ident()) != *name_str {
            ctx.sess().emit(
                DiagBuilder2::error(format!(
                    "expected VHDL port name {} to match Verilog port name {} in \
                     component {}",
                    names.get(cport.ident()),
                    names.get(mport.ident()),
                    names.get(comp.ident())
                ))
                .span(cport.loc()),
            );
            return None;
        }

        let btype = cport.ty();
        let vtype = vport.ty();

        if mport.dir() == VlogPortDir::Input {
            let func = match std.to_verilog_func(btype, vtype) {
                Some(f) => f,
                None => {
                    ctx.sess().emit(
                        DiagBuilder2::error(format!(
                            "cannot connect VHDL signal with type {} to Verilog input \
                             port {}",
                            btype.pp(names),
                            names.get(mport.ident())
                        ))
                        .span(cport.loc()),
                    );
                    return None;
                }
            };

            let conv = conv_func(ctx, func, make_ref(arenas, cport), cport.loc());
            if have_named {
                add_param(arenas, bind, conv, ParamKind::Named, Some(make_ref(arenas, vport)));
            } else {
                add_param(arenas, bind, conv, ParamKind::Pos, None);
            }
        } else {
            let func = match std.to_vhdl_func(vtype, btype) {
                Some(f) => f,
                None => {
                    ctx.sess().emit(
                        DiagBuilder2::error(format!(
                            "cannot connect VHDL signal with type {} to Verilog output \
                             port {}",
                            btype.pp(names),
                            names.get(mport.ident())
                        ))
                        .span(cport.loc()),
                    );
                    return None;
                }
            };

            let conv = conv_func(ctx, func, make_ref(arenas, vport), cport.loc());
            add_param(arenas, bind, make_ref(arenas, cport), ParamKind::Named, Some(conv));
            have_named = true;
        }
    }

    for (i, &p) in cports.iter().enumerate() {
        if !have[i] {
            ctx.sess().emit(
                DiagBuilder2::error(format!(
                    "port {} not found in Verilog module {}",
                    names.get(p.ident()),
                    names.get(mc.module.ident2())
                ))
                .span(p.loc()),
            );
        }
    }

    Some(bind)
}

/// Bind a Verilog module instance, found inside another Verilog module, to
/// its module, coercing between the Verilog value types where declaration
/// and port disagree.
pub(crate) fn verilog_binding<'p, 'a>(
    inst: Vlog<'a>,
    mc: &Rc<ModCacheEntry<'a>>,
    ctx: &ElabCtx<'p, 'a>,
) -> Option<Tree<'a>> {
    assert_eq!(inst.kind, VlogKind::ModInst);

    let names = ctx.names();
    let arenas = ctx.arenas();
    let std = ctx.std();

    let bind = arenas.alloc_tree(TreeData::new(TreeKind::Binding));
    bind.set_ident(mc.module.ident());
    bind.set_loc(inst.loc());
    bind.set_target(mc.wrap);
    bind.set_class(Class::Entity);

    let nports = mc.module.ports().len();
    let conns = inst.params();

    if nports != conns.len() {
        ctx.sess().emit(
            DiagBuilder2::error(format!(
                "expected {} port connections for module {} but found {}",
                nports,
                names.get(mc.module.ident()),
                conns.len()
            ))
            .span(inst.loc()),
        );
        return None;
    }

    let out_ports = ctx.out.ports();
    let out_decls = ctx.out.decls();
    let block_ports = mc.block.ports();

    let mut have_named = false;
    for (i, conn) in conns.iter().enumerate() {
        assert_eq!(conn.kind, VlogKind::Ref);

        let id = conn.ident();
        let decl = out_ports
            .iter()
            .find(|p| p.ident() == id)
            .or_else(|| out_decls.iter().find(|d| d.ident() == id))
            .copied()
            .unwrap_or_else(|| panic!("connection {} names nothing in scope", names.get(id)));

        let port = block_ports[i];

        let dtype = decl.ty();
        let ptype = port.ty();

        if type_eq(dtype, ptype) {
            if have_named {
                add_param(
                    arenas,
                    bind,
                    make_ref(arenas, decl),
                    ParamKind::Named,
                    Some(make_ref(arenas, port)),
                );
            } else {
                add_param(arenas, bind, make_ref(arenas, decl), ParamKind::Pos, None);
            }
        } else if port.port_dir() == PortDir::In {
            let func = match std.vlog_conversion(dtype, ptype) {
                Some(f) => f,
                None => {
                    emit_no_conversion(ctx, inst, dtype, ptype);
                    return None;
                }
            };

            let conv = conv_func(ctx, func, make_ref(arenas, decl), conn.loc());
            if have_named {
                add_param(arenas, bind, conv, ParamKind::Named, Some(make_ref(arenas, port)));
            } else {
                add_param(arenas, bind, conv, ParamKind::Pos, None);
            }
        } else {
            let func = match std.vlog_conversion(ptype, dtype) {
                Some(f) => f,
                None => {
                    emit_no_conversion(ctx, inst, ptype, dtype);
                    return None;
                }
            };

            let conv = conv_func(ctx, func, make_ref(arenas, port), conn.loc());
            add_param(arenas, bind, make_ref(arenas, decl), ParamKind::Named, Some(conv));
            have_named = true;
        }
    }

    Some(bind)
}

fn emit_no_conversion<'p, 'a>(
    ctx: &ElabCtx<'p, 'a>,
    inst: Vlog<'a>,
    from: crate::ty::Type<'a>,
    to: crate::ty::Type<'a>,
) {
    let names = ctx.names();
    ctx.sess().emit(
        DiagBuilder2::error(format!(
            "no conversion between Verilog types {} and {}",
            from.pp(names),
            to.pp(names)
        ))
        .span(inst.loc()),
    );
}

/// Wrap a reference in a conversion function call.
fn conv_func<'p, 'a>(
    ctx: &ElabCtx<'p, 'a>,
    func: Tree<'a>,
    value: Tree<'a>,
    loc: crate::source::Loc,
) -> Tree<'a> {
    let conv = ctx.arenas().alloc_tree(TreeData::new(TreeKind::ConvFunc));
    conv.set_loc(loc);
    conv.set_target(func);
    conv.set_ident(func.ident());
    conv.set_type(func.ty().result());
    conv.set_value(value);
    conv
}

/// Thread the binding's port associations through to the output block,
/// normalising them against the entity's port order: positional parameters
/// stay positional while possible, named parameters are retargeted at the
/// entity's (copied) port declarations, and unassociated ports become
/// `Open` associations. The output block's port list aliases the entity's
/// ports; they are shared, never copied.
pub(crate) fn elab_ports<'p, 'a>(entity: Tree<'a>, bind: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let arenas = ctx.arenas();
    let params = bind.params();
    let nparams = params.len();
    let mut have_named = false;

    for (i, &p) in entity.ports().iter().enumerate() {
        let pname = p.ident();
        let mut mapped = false;

        if i < nparams && !have_named {
            let m = params[i];
            if m.param_kind() == ParamKind::Pos {
                assert_eq!(m.pos(), i);
                ctx.out.add_param(m);
                mapped = true;
            }
        }

        if !mapped {
            for &m in params.iter() {
                if m.param_kind() != ParamKind::Named {
                    continue;
                }
                let name = m.name();
                let (is_conv, r) = match name.kind {
                    TreeKind::TypeConv | TreeKind::ConvFunc => (true, name_to_ref(name.value())),
                    _ => (false, name_to_ref(name)),
                };
                let r = r.expect("named association without a base reference");

                if r.ident() != pname {
                    continue;
                }

                let map = arenas.alloc_tree(TreeData::new(TreeKind::Param));
                map.set_loc(m.loc());
                map.set_value(m.value());
                ctx.out.add_param(map);
                mapped = true;

                if !have_named && !is_conv && r.id == name.id {
                    map.set_subkind(Subkind::Param(ParamKind::Pos));
                    map.set_pos(i);
                    break;
                } else {
                    map.set_subkind(Subkind::Param(ParamKind::Named));
                    map.set_name(change_ref(arenas, m.name(), p));
                    have_named = true;
                }
            }
        }

        if !mapped {
            let map = arenas.alloc_tree(TreeData::new(TreeKind::Param));
            map.set_loc(p.loc());

            if have_named {
                map.set_subkind(Subkind::Param(ParamKind::Named));
                map.set_name(make_ref(arenas, p));
            } else {
                map.set_subkind(Subkind::Param(ParamKind::Pos));
                map.set_pos(i);
            }

            let open = arenas.alloc_tree(TreeData::new(TreeKind::Open));
            open.set_type(p.ty());
            open.set_loc(p.loc());
            map.set_value(open);

            ctx.out.add_param(map);
        }

        ctx.out.add_port(p);
    }
}

/// Build the binding for the root instance: generics come only from their
/// defaults or overrides, ports are left open. An unconnected top-level port
/// with an unconstrained type has no shape to elaborate and is an error.
pub(crate) fn top_level_binding<'p, 'a>(arch: Tree<'a>, ctx: &ElabCtx<'p, 'a>) -> Tree<'a> {
    let names = ctx.names();
    let arenas = ctx.arenas();

    let bind = arenas.alloc_tree(TreeData::new(TreeKind::Binding));
    bind.set_ident(arch.ident());
    bind.set_loc(arch.loc());
    bind.set_target(arch);
    bind.set_class(Class::Entity);

    let entity = arch.primary();

    for (i, &g) in entity.generics().iter().enumerate() {
        if g.flags().contains(crate::tree::TreeFlags::PREDEFINED) {
            continue; // Predefined generic subprograms
        } else if g.class() != Class::Constant {
            ctx.sess().emit(
                DiagBuilder2::error("only constant top-level generics are supported")
                    .span(g.loc()),
            );
            continue;
        }

        let value = match crate::elab::generics::find_generic_override(g, ctx) {
            Some(v) => Some(v),
            None if g.has_value() => Some(g.value()),
            None => {
                ctx.sess().emit(
                    DiagBuilder2::error(format!(
                        "generic {} of top-level entity must have default value or be \
                         specified using -gNAME=VALUE",
                        names.get(g.ident())
                    ))
                    .span(g.loc()),
                );
                None
            }
        };

        if let Some(value) = value {
            let map = arenas.alloc_tree(TreeData::new(TreeKind::Param));
            map.set_subkind(Subkind::Param(ParamKind::Pos));
            map.set_pos(i);
            map.set_value(value);
            bind.add_genmap(map);
        }
    }

    for (i, p) in entity.ports().iter().enumerate() {
        let m = arenas.alloc_tree(TreeData::new(TreeKind::Param));
        m.set_subkind(Subkind::Param(ParamKind::Pos));
        m.set_pos(i);

        if p.has_value() {
            m.set_value(p.value());
        } else {
            let ty = p.ty();
            if ty.is_unconstrained() {
                ctx.sess().emit(
                    DiagBuilder2::error(format!(
                        "unconnected top-level port {} cannot have unconstrained type {}",
                        names.get(p.ident()),
                        ty.pp(names)
                    ))
                    .span(p.loc()),
                );
            }

            let open = arenas.alloc_tree(TreeData::new(TreeKind::Open));
            open.set_type(ty);
            open.set_loc(p.loc());
            m.set_value(open);
        }

        bind.add_param(m);
    }

    bind
}

/// Resolve a Verilog module instance found while elaborating a module body:
/// look the module up by qualified name, check its source-level name, and
/// build the Verilog binding for it.
pub(crate) fn resolve_verilog_instance<'p, 'a>(
    v: Vlog<'a>,
    ctx: &ElabCtx<'p, 'a>,
) -> Option<(Rc<ModCacheEntry<'a>>, Tree<'a>)> {
    let names = ctx.names();
    let modname = v.ident2();
    let libname = ctx.library.name();

    let qual = names.prefix(Some(libname), names.intern(&names.get(modname), false), '.');

    let obj = match ctx.library.get(qual) {
        Some(obj) => obj,
        None => {
            ctx.sess().emit(
                DiagBuilder2::error(format!(
                    "module {} not found in library {}",
                    names.get(modname),
                    names.get(libname)
                ))
                .span(v.loc()),
            );
            return None;
        }
    };

    let module = match obj.as_vlog() {
        Some(m) => m,
        None => {
            ctx.sess().emit(
                DiagBuilder2::error(format!("unit {} is not a Verilog module", names.get(qual)))
                    .span(obj.loc()),
            );
            return None;
        }
    };

    if module.ident2() != modname {
        ctx.sess().emit(
            DiagBuilder2::error(format!(
                "name of Verilog module {} in library unit {} does not match name {} \
                 in module instance {}",
                names.get(module.ident2()),
                names.get(qual),
                names.get(modname),
                names.get(v.ident())
            ))
            .span(v.loc())
            .add_note("this tool does not preserve case sensitivity in module names"),
        );
        return None;
    }

    let mc = cached_module(module, ctx);
    let bind = verilog_binding(v, &mc, ctx)?;
    Some((mc, bind))
}
