// Copyright (c) 2022-2025 Fabian Schuiki

//! Generate statement expansion.
//!
//! Generate constructs replicate or select hardware at elaboration time, so
//! their controlling expressions must be static: ranges and conditions are
//! folded through the constant folder, and anything that stays symbolic is
//! an error. Each expansion produces a fresh block in the output with its
//! own hierarchical path.

use crate::elab::{
    elab_block_config, elab_decls, elab_lower, elab_pop_scope, elab_push_scope, elab_stmts,
    ElabCtx,
};
use crate::errors::{DiagBuilder2, DiagEmitter};
use crate::eval::{folded_bool, folded_bounds, folded_int, Folder};
use crate::inst::copy_with_renaming;
use crate::lower::Lowering;
use crate::simp::simplify_global;
use crate::tree::{
    get_int_lit, AttrKind, ParamKind, RangeDir, Subkind, Tree, TreeData, TreeKind,
};
use std::collections::HashMap;

/// Fold an expression that a generate construct requires to be static.
fn eval_expr<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) -> Tree<'a> {
    ctx.env
        .folder
        .must_fold(t, ctx.lowered, ctx.own_eval_context())
}

/// Determine the static bounds of a generate range. A non-static range is an
/// error and yields the empty range `(0, 0)` after the diagnostic.
fn generate_range<'p, 'a>(r: Tree<'a>, ctx: &ElabCtx<'p, 'a>) -> (i64, i64) {
    if r.subkind() == Subkind::Range(RangeDir::Expr) {
        let value = r.value();
        assert_eq!(value.kind, TreeKind::AttrRef);

        let tmp = ctx.arenas().alloc_tree(TreeData::new(TreeKind::AttrRef));
        tmp.set_name(value.name());
        if r.has_type() {
            tmp.set_type(r.ty());
        }
        tmp.set_subkind(Subkind::Attr(AttrKind::Low));

        if let Some(low) = folded_int(eval_expr(tmp, ctx)) {
            tmp.set_subkind(Subkind::Attr(AttrKind::High));

            if let Some(high) = folded_int(eval_expr(tmp, ctx)) {
                return (low, high);
            }
        }

        ctx.sess()
            .emit(DiagBuilder2::error("generate range is not static").span(r.loc()));
        (0, 0)
    } else if let Some(bounds) = folded_bounds(r) {
        bounds
    } else {
        let left = eval_expr(r.left(), ctx);
        let right = eval_expr(r.right(), ctx);

        match (folded_int(left), folded_int(right)) {
            (Some(ileft), Some(iright)) => {
                let asc = r.subkind() == Subkind::Range(RangeDir::To);
                if asc {
                    (ileft, iright)
                } else {
                    (iright, ileft)
                }
            }
            _ => {
                ctx.sess()
                    .emit(DiagBuilder2::error("generate range is not static").span(r.loc()));
                (0, 0)
            }
        }
    }
}

/// Expand a for-generate statement: one block per loop index, each carrying
/// a genmap that binds the loop variable to the index, with a fresh copy of
/// the body.
pub(crate) fn elab_for_generate<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let names = ctx.names();
    let arenas = ctx.arenas();

    let (low, high) = generate_range(t.range(0), ctx);

    let g = t.decl(0);
    assert_eq!(g.kind, TreeKind::GenericDecl);

    let base = t.ident();
    let base_str = names.get(base);

    for i in low..=high {
        let id = names.intern(&format!("{}({})", base_str, i), false);

        let b = arenas.alloc_tree(TreeData::new(TreeKind::Block));
        b.set_loc(t.loc());
        b.set_ident(id);

        ctx.out.add_stmt(b);

        let map = arenas.alloc_tree(TreeData::new(TreeKind::Param));
        map.set_subkind(Subkind::Param(ParamKind::Pos));
        map.set_loc(g.loc());
        map.set_value(get_int_lit(arenas, g, i));

        b.add_generic(g);
        b.add_genmap(map);

        let ninst = crate::elab::path::hpath(
            names,
            ctx.inst_name,
            ':',
            &format!("{}({})", base_str, i),
        );
        let ndotted = names.prefix(Some(ctx.dotted), id, '.');

        let mut new_ctx = ElabCtx::inherit(ctx);
        new_ctx.out = b;
        new_ctx.inst_name = Some(ninst);
        new_ctx.dotted = ndotted;
        new_ctx.generics = Some(HashMap::new());
        new_ctx.config = elab_block_config(t, ctx);
        new_ctx.prefix[0] = Some(names.prefix(Some(ctx.dotted), base, '.'));

        let copy = copy_with_renaming(
            arenas,
            names,
            t,
            &|n| n.kind == TreeKind::Ref && matches!(n.try_target(), Some(d) if d.id == g.id),
            ndotted,
            new_ctx.prefix,
        );

        elab_push_scope(t, &mut new_ctx);

        let generics = new_ctx.generics.as_mut().unwrap();
        generics.insert(g.id, map.value());
        // The body copy carries its own copy of the loop variable; register
        // that one as well so substitution reaches the copied references.
        let g_copy = copy.decl(0);
        generics.insert(g_copy.id, map.value());

        simplify_global(copy, new_ctx.generics.as_ref().unwrap());

        new_ctx.drivers = Some(ctx.env.lowering.find_drivers(copy));

        if ctx.sess().error_count() == 0 {
            elab_decls(copy, &new_ctx);
        }

        if ctx.sess().error_count() == 0 {
            elab_lower(b, None, &mut new_ctx);
            elab_stmts(copy, &new_ctx);
        }

        elab_pop_scope(&mut new_ctx);
    }
}

/// Whether a generate condition statically holds. A non-static condition is
/// an error and counts as false.
fn generate_test<'p, 'a>(value: Tree<'a>, ctx: &ElabCtx<'p, 'a>) -> bool {
    if let Some(test) = folded_bool(value) {
        return test;
    }

    let folded = eval_expr(value, ctx);

    if let Some(test) = folded_bool(folded) {
        return test;
    }

    ctx.sess()
        .emit(DiagBuilder2::error("generate expression is not static").span(value.loc()));
    false
}

/// Expand an if-generate statement into the body of its first true branch,
/// if any.
pub(crate) fn elab_if_generate<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let names = ctx.names();
    let arenas = ctx.arenas();

    for cond in t.conds() {
        if cond.has_value() && !generate_test(cond.value(), ctx) {
            continue;
        }

        let b = arenas.alloc_tree(TreeData::new(TreeKind::Block));
        b.set_loc(cond.loc());
        b.set_ident(cond.ident());

        ctx.out.add_stmt(b);

        let name = cond.ident();
        let ninst = crate::elab::path::hpath(names, ctx.inst_name, ':', &names.get(name));
        let ndotted = names.prefix(Some(ctx.dotted), name, '.');

        let mut new_ctx = ElabCtx::inherit(ctx);
        new_ctx.out = b;
        new_ctx.inst_name = Some(ninst);
        new_ctx.dotted = ndotted;
        new_ctx.config = elab_block_config(cond, ctx);

        elab_push_scope(t, &mut new_ctx);
        elab_decls(cond, &new_ctx);

        new_ctx.drivers = Some(ctx.env.lowering.find_drivers(cond));

        if ctx.sess().error_count() == 0 {
            elab_lower(b, None, &mut new_ctx);
            elab_stmts(cond, &new_ctx);
        }

        elab_pop_scope(&mut new_ctx);
        return;
    }
}

/// Expand a case-generate statement into its chosen alternative. A chooser
/// that matches nothing expands to nothing.
pub(crate) fn elab_case_generate<'p, 'a>(t: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let names = ctx.names();
    let arenas = ctx.arenas();

    let chosen = match ctx
        .env
        .folder
        .eval_case(t, ctx.lowered, ctx.own_eval_context())
    {
        Some(c) => c,
        None => return,
    };

    let id = if chosen.has_ident() {
        chosen.ident()
    } else {
        t.ident()
    };

    let b = arenas.alloc_tree(TreeData::new(TreeKind::Block));
    b.set_loc(chosen.loc());
    b.set_ident(id);

    ctx.out.add_stmt(b);

    let ninst = crate::elab::path::hpath(names, ctx.inst_name, ':', &names.get(id));
    let ndotted = names.prefix(Some(ctx.dotted), id, '.');

    let mut new_ctx = ElabCtx::inherit(ctx);
    new_ctx.out = b;
    new_ctx.inst_name = Some(ninst);
    new_ctx.dotted = ndotted;

    elab_push_scope(t, &mut new_ctx);
    elab_decls(chosen, &new_ctx);

    new_ctx.drivers = Some(ctx.env.lowering.find_drivers(chosen));

    if ctx.sess().error_count() == 0 {
        elab_lower(b, None, &mut new_ctx);
        elab_stmts(chosen, &new_ctx);
    }

    elab_pop_scope(&mut new_ctx);
}
