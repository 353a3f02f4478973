// Copyright (c) 2022-2025 Fabian Schuiki

//! Post-copy simplification.
//!
//! Once a unit has been copied and its generics resolved, every reference to
//! a generic whose actual folded to a literal can be substituted by that
//! literal throughout the copy. The substitution is what makes generate
//! ranges and conditions static, so it runs before the generate expansion
//! descends into the unit.

use crate::tree::{NodeId, Tree, TreeKind};
use std::collections::{HashMap, HashSet};

/// Substitute literal generic actuals for references to their formals
/// throughout a copied unit. `generics` maps formal generic declarations to
/// folded literal values.
pub fn simplify_global<'a>(unit: Tree<'a>, generics: &HashMap<NodeId, Tree<'a>>) {
    if generics.is_empty() {
        return;
    }
    let mut visited = HashSet::new();
    simplify_node(unit, generics, &mut visited);
}

fn simplify_node<'a>(
    t: Tree<'a>,
    generics: &HashMap<NodeId, Tree<'a>>,
    visited: &mut HashSet<NodeId>,
) {
    if !visited.insert(t.id) {
        return;
    }
    t.rewrite_children(&mut |child| match child.kind {
        TreeKind::Ref => {
            let target = child.try_target()?;
            if target.kind == TreeKind::GenericDecl {
                generics.get(&target.id).copied()
            } else {
                None
            }
        }
        _ => None,
    });
    for child in t.owned_children() {
        simplify_node(child, generics, visited);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arenas::DesignArenas;
    use crate::name::NameTable;
    use crate::tree::{get_int_lit, make_ref, TreeData, TreeKind};
    use crate::ty::{TypeData, TypeKind};

    #[test]
    fn substitutes_generic_refs() {
        let arenas = DesignArenas::new();
        let names = NameTable::new();
        let integer = arenas.alloc_type(TypeData::new(TypeKind::Integer));

        let g = arenas.alloc_tree(TreeData::new(TreeKind::GenericDecl));
        g.set_ident(names.intern("width", false));
        g.set_type(integer);

        let block = arenas.alloc_tree(TreeData::new(TreeKind::Block));
        let sig = arenas.alloc_tree(TreeData::new(TreeKind::SignalDecl));
        sig.set_ident(names.intern("s", false));
        sig.set_type(integer);
        sig.set_value(make_ref(&arenas, g));
        block.add_decl(sig);

        let lit = get_int_lit(&arenas, g, 8);
        let mut generics = HashMap::new();
        generics.insert(g.id, lit);
        simplify_global(block, &generics);

        assert_eq!(sig.value().id, lit.id);
    }
}
