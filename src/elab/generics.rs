// Copyright (c) 2022-2025 Fabian Schuiki

//! Generic resolution.
//!
//! Walks an entity's (or component's, or block's) generic list and emits a
//! positional genmap into the output block. Actuals come from the binding,
//! then from the formal's default; an override from the session's override
//! table beats both and is consumed in the process. Scalar-typed actuals
//! that are still expressions are eagerly folded so the global simplifier
//! can substitute them throughout the copied unit.

use crate::elab::ElabCtx;
use crate::errors::{DiagBuilder2, DiagEmitter, Result};
use crate::eval::Folder;
use crate::tree::{
    is_literal, is_subprogram, Class, LiteralKind, ParamKind, Subkind, Tree, TreeData, TreeKind,
};
use crate::ty::{TypeData, TypeKind};
use itertools::Itertools;
use std::collections::HashMap;

/// Find and consume the override for a generic, if one was registered under
/// the generic's fully qualified instance-prefixed name.
pub(crate) fn find_generic_override<'p, 'a>(
    g: Tree<'a>,
    ctx: &ElabCtx<'p, 'a>,
) -> Option<Tree<'a>> {
    let names = ctx.names();

    let mut qual = g.ident();
    let mut e = Some(ctx);
    while let Some(c) = e {
        match c.inst {
            Some(inst) => {
                qual = names.prefix(Some(inst.ident()), qual, '.');
                e = c.parent;
            }
            None => break,
        }
    }

    let text = ctx.sess().take_override(qual)?;
    trace!("consumed override {}={}", names.get(qual), text);
    parse_generic_string(g, &text, ctx).ok()
}

/// Parse override text against the type of a formal generic. The tree
/// produced depends on the type family; types outside the supported
/// families reject the override with a fatal diagnostic.
pub(crate) fn parse_generic_string<'p, 'a>(
    g: Tree<'a>,
    s: &str,
    ctx: &ElabCtx<'p, 'a>,
) -> Result<Tree<'a>> {
    let names = ctx.names();
    let arenas = ctx.arenas();
    let ty = g.ty();

    let parse_failed = || {
        ctx.sess().emit(DiagBuilder2::fatal(format!(
            "failed to parse \"{}\" as type {} for generic {}",
            s,
            ty.pp(names),
            names.get(g.ident())
        )));
    };

    if ty.is_enum() {
        let base = ty.base_recur();
        let lit = base
            .literals()
            .into_iter()
            .find(|l| names.get(l.ident()).eq_ignore_ascii_case(s));
        let lit = match lit {
            Some(l) => l,
            None => {
                parse_failed();
                return Err(());
            }
        };

        let result = arenas.alloc_tree(TreeData::new(TreeKind::Ref));
        result.set_type(ty);
        result.set_ident(names.intern(s, false));
        result.set_target(lit);
        result.set_loc(g.loc());
        Ok(result)
    } else if ty.is_integer() {
        let value = match s.trim().parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                parse_failed();
                return Err(());
            }
        };

        let result = arenas.alloc_tree(TreeData::new(TreeKind::Literal));
        result.set_subkind(Subkind::Literal(LiteralKind::Int));
        result.set_type(ty);
        result.set_ival(value);
        result.set_loc(g.loc());
        Ok(result)
    } else if ty.is_real() {
        let value = match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                parse_failed();
                return Err(());
            }
        };

        let result = arenas.alloc_tree(TreeData::new(TreeKind::Literal));
        result.set_subkind(Subkind::Literal(LiteralKind::Real));
        result.set_type(ty);
        result.set_dval(value);
        result.set_loc(g.loc());
        Ok(result)
    } else if ty.is_physical() {
        let mut parts = s.split_whitespace();
        let value = match parts.next().and_then(|v| v.parse::<i64>().ok()) {
            Some(v) => v,
            None => {
                parse_failed();
                return Err(());
            }
        };

        let result = arenas.alloc_tree(TreeData::new(TreeKind::Literal));
        result.set_subkind(Subkind::Literal(LiteralKind::Physical));
        result.set_type(ty);
        result.set_ival(value);
        if let Some(unit) = parts.next() {
            result.set_ident(names.intern(unit, false));
        }
        result.set_loc(g.loc());
        Ok(result)
    } else if ty.is_character_array() {
        let t = arenas.alloc_tree(TreeData::new(TreeKind::StringLit));
        t.set_loc(g.loc());

        let elem = ty.elem().base_recur();
        for c in s.chars() {
            let quoted = format!("'{}'", c);
            let lit = elem
                .literals()
                .into_iter()
                .find(|l| *names.get(l.ident()) == *quoted);
            let lit = match lit {
                Some(l) => l,
                None => {
                    parse_failed();
                    return Err(());
                }
            };

            let r = arenas.alloc_tree(TreeData::new(TreeKind::Ref));
            r.set_ident(lit.ident());
            r.set_target(lit);
            t.add_char(r);
        }

        t.set_type(subtype_for_string(ctx, ty));
        Ok(t)
    } else {
        ctx.sess().emit(DiagBuilder2::fatal(format!(
            "cannot override generic {} of type {}",
            names.get(g.ident()),
            ty.pp(names)
        )));
        Err(())
    }
}

/// A constrained subtype for a string literal bound to an unconstrained
/// character array formal.
fn subtype_for_string<'p, 'a>(
    ctx: &ElabCtx<'p, 'a>,
    base: crate::ty::Type<'a>,
) -> crate::ty::Type<'a> {
    let sub = ctx.arenas().alloc_type(TypeData::new(TypeKind::Subtype));
    sub.set_base(base);
    sub.set_constrained(true);
    sub
}

/// Resolve the generics of a unit against a binding, emitting one
/// positional genmap entry per formal into the output block.
pub(crate) fn elab_generics<'p, 'a>(unit: Tree<'a>, bind: Tree<'a>, ctx: &mut ElabCtx<'p, 'a>) {
    let arenas = ctx.arenas();
    let generics = unit.generics();
    let genmaps = bind.genmaps();

    for (i, &g) in generics.iter().enumerate() {
        ctx.out.add_generic(g);

        let mut map = if i < genmaps.len() {
            let m = genmaps[i];
            assert_eq!(m.param_kind(), ParamKind::Pos);
            assert_eq!(m.pos(), i);
            Some(m)
        } else if g.has_value() {
            let m = arenas.alloc_tree(TreeData::new(TreeKind::Param));
            m.set_loc(g.loc());
            m.set_subkind(Subkind::Param(ParamKind::Pos));
            m.set_pos(i);
            m.set_value(g.value());
            Some(m)
        } else {
            None
        };

        if let Some(over) = find_generic_override(g, ctx) {
            let m = arenas.alloc_tree(TreeData::new(TreeKind::Param));
            m.set_subkind(Subkind::Param(ParamKind::Pos));
            m.set_pos(i);
            m.set_value(over);
            map = Some(m);
        }

        let map = match map {
            Some(m) => m,
            None => {
                ctx.sess().emit(
                    DiagBuilder2::error(format!(
                        "missing value for generic {} with no default",
                        ctx.names().get(g.ident())
                    ))
                    .span(bind.loc()),
                );
                continue;
            }
        };

        let mut value = map.value();
        let mut map = map;

        let foldable = match value.kind {
            TreeKind::Ref => {
                !matches!(value.try_target(), Some(t) if t.kind == TreeKind::EnumLit)
                    && g.class() != Class::Package
            }
            TreeKind::ArrayRef | TreeKind::RecordRef | TreeKind::Fcall => true,
            _ => false,
        };

        if foldable && value.has_type() && value.ty().is_scalar() {
            let folded = ctx.env.folder.try_fold(
                value,
                ctx.parent.and_then(|p| p.lowered),
                ctx.eval_context(),
            );

            if folded.id != value.id {
                let m = arenas.alloc_tree(TreeData::new(TreeKind::Param));
                m.set_loc(map.loc());
                m.set_subkind(Subkind::Param(ParamKind::Pos));
                m.set_pos(map.pos());
                m.set_value(folded);

                value = folded;
                map = m;
            }
        }

        ctx.out.add_genmap(map);

        if is_literal(value) {
            // These values can be safely substituted for all references to
            // the generic name.
            ctx.generics
                .get_or_insert_with(HashMap::new)
                .insert(g.id, value);
        }
    }
}

/// Render a generic actual for the instance hint attached to lowering
/// diagnostics: literals verbatim, references by name, aggregates expanded,
/// anything else elided.
pub(crate) fn write_generic(names: &crate::name::NameTable, value: Tree) -> String {
    match value.kind {
        TreeKind::Literal => match value.literal_kind() {
            LiteralKind::Int => format!("{}", value.ival()),
            LiteralKind::Real => format!("{}", value.dval()),
            LiteralKind::Physical => {
                if value.has_ident() {
                    format!("{} {}", value.ival(), names.get(value.ident()))
                } else {
                    format!("{}", value.ival())
                }
            }
        },
        TreeKind::StringLit => {
            let chars: String = value
                .chars()
                .iter()
                .filter_map(|c| names.get(c.ident()).chars().nth(1))
                .collect();
            format!("\"{}\"", chars)
        }
        TreeKind::Aggregate => format!(
            "({})",
            value
                .assocs()
                .iter()
                .map(|a| write_generic(names, a.value()))
                .join(", ")
        ),
        TreeKind::Ref => match value.try_target() {
            Some(d) if is_subprogram(d) => names.get(d.ident()).to_string(),
            _ => names.get(value.ident()).to_string(),
        },
        TreeKind::TypeConv | TreeKind::Qualified => write_generic(names, value.value()),
        TreeKind::TypeRef => value.ty().pp(names),
        TreeKind::Open => "OPEN".to_string(),
        _ => "...".to_string(),
    }
}
