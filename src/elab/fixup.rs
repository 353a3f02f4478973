// Copyright (c) 2022-2025 Fabian Schuiki

//! Substitution of non-constant generics.
//!
//! Type, subprogram, and package generics cannot be substituted as literal
//! values; instead the copied unit is rewritten so that references to the
//! formal point at the actual. This builds the substitution map from the
//! resolved genmaps of the output block and applies it through the copy
//! service's rewriter.

use crate::elab::ElabCtx;
use crate::inst::{instance_fixup, FixupMap};
use crate::tree::{is_type_decl, Class, Tree, TreeKind};
use crate::ty::{GenericTypeKind, Type, TypeKind};

/// Map a formal type generic to its actual. Array formals recursively map
/// their anonymous element and index generics.
fn map_generic_type<'a>(generic: Type<'a>, actual: Type<'a>, map: &mut FixupMap<'a>) {
    assert_eq!(generic.kind, TypeKind::Generic);

    if generic.generic_kind() == GenericTypeKind::Array {
        let gelem = generic.elem();
        if gelem.kind == TypeKind::Generic && !gelem.has_ident() {
            map_generic_type(gelem, actual.elem(), map);
        }

        let actual_indexes = actual.indexes();
        for (i, index) in generic.indexes().into_iter().enumerate() {
            if index.kind == TypeKind::Generic && !index.has_ident() {
                if let Some(&aindex) = actual_indexes.get(i) {
                    map_generic_type(index, aindex, map);
                }
            }
        }
    }

    map.put_type(generic, actual);
}

/// Rewrite a freshly copied unit so references to its non-constant generics
/// point at their actuals. The map is derived from the genmaps the output
/// block accumulated during generic resolution.
pub(crate) fn elab_instance_fixup<'p, 'a>(unit: Tree<'a>, ctx: &ElabCtx<'p, 'a>) {
    let generics = ctx.out.generics();
    let genmaps = ctx.out.genmaps();
    assert_eq!(generics.len(), genmaps.len());

    let mut map = FixupMap::new();

    for (i, &g) in generics.iter().enumerate() {
        let class = g.class();
        if class == Class::Constant {
            continue;
        }

        let value = genmaps[i].value();

        match class {
            Class::Type => map_generic_type(g.ty(), value.ty(), &mut map),

            Class::Package => {
                let formal = g.value().target();
                let actual = value.target();

                let formal_decls = formal.decls();
                let actual_decls = actual.decls();
                for (&gd, &ad) in formal_decls.iter().zip(actual_decls.iter()) {
                    assert_eq!(gd.kind, ad.kind);

                    map.put_tree(gd, ad);

                    if is_type_decl(gd) {
                        map.put_type(gd.ty(), ad.ty());
                    }
                }

                let formal_generics = formal.generics();
                let actual_generics = actual.generics();
                for (i, (&fg, &ag)) in
                    formal_generics.iter().zip(actual_generics.iter()).enumerate()
                {
                    match fg.class() {
                        Class::Function | Class::Procedure => {
                            // Get the actual subprogram from the generic map.
                            assert_eq!(actual_generics.len(), actual.genmaps().len());
                            let r = actual.genmap(i).value();
                            assert_eq!(r.kind, TreeKind::Ref);

                            map.put_tree(fg, r.target());
                        }
                        Class::Type => map.put_type(fg.ty(), ag.ty()),
                        // TODO: package-class sub-generics should be
                        // processed recursively
                        _ => map.put_tree(fg, ag),
                    }
                }

                map.put_tree(g, actual);
            }

            Class::Function | Class::Procedure => map.put_tree(g, value.target()),

            _ => {}
        }
    }

    if map.is_empty() {
        return;
    }

    instance_fixup(unit, &map);
}
