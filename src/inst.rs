// Copyright (c) 2022-2025 Fabian Schuiki

//! The instantiation copy service.
//!
//! Instantiating a design unit must break sharing: two instances of the same
//! architecture may resolve their generics differently, so each gets a fresh
//! copy of the unit, with subprogram symbols renamed into the instance's
//! dotted scope so lowered units do not collide.
//!
//! Copying follows the owned slots of the roots only. Reference slots
//! (`target`, `primary`, `spec`) are remapped to the corresponding copy when
//! their target was part of the copied set, and left shared otherwise; this
//! is how references into the standard libraries and all type annotations
//! stay canonical.

use crate::arenas::DesignArenas;
use crate::name::{Name, NameTable};
use crate::tree::{is_subprogram, NodeId, Tree, TreeData, TreeKind};
use crate::ty::Type;
use std::collections::HashMap;

/// The two-element renaming prefix of an instantiation: the architecture
/// name first, then its primary entity name. The architecture name embeds
/// the entity name as a dotted prefix, so it must be tried first.
pub type Prefix = [Option<Name>; 2];

struct Copier<'n, 'a> {
    arenas: &'a DesignArenas<'a>,
    names: &'n NameTable,
    dotted: Name,
    prefix: Prefix,
    memo: HashMap<NodeId, Tree<'a>>,
    copies: Vec<(Tree<'a>, Tree<'a>)>,
    rename: Option<&'n dyn Fn(Tree<'a>) -> bool>,
}

impl<'n, 'a> Copier<'n, 'a> {
    fn copy(&mut self, t: Tree<'a>) -> Tree<'a> {
        if let Some(&c) = self.memo.get(&t.id) {
            return c;
        }
        let c = self.arenas.alloc_tree(TreeData::new(t.kind));
        self.memo.insert(t.id, c);
        self.copies.push((t, c));

        c.set_loc(t.loc());
        if t.has_ident() {
            c.set_ident(self.copied_ident(t));
        }
        if t.has_ident2() {
            c.set_ident2(t.ident2());
        }
        c.set_subkind(t.subkind());
        c.set_class(t.class());
        c.set_pos(t.pos());
        c.set_ival(t.ival());
        c.set_dval(t.dval());
        c.set_flags(t.flags());
        c.set_global_flags(t.global_flags());
        if let Some(ty) = t.try_type() {
            c.set_type(ty);
        }
        if let Some(v) = t.try_vlog() {
            c.set_vlog(v);
        }

        for p in t.ports() {
            c.add_port(self.copy(p));
        }
        for g in t.generics() {
            c.add_generic(self.copy(g));
        }
        for d in t.decls() {
            c.add_decl(self.copy(d));
        }
        for s in t.stmts() {
            c.add_stmt(self.copy(s));
        }
        for p in t.params() {
            c.add_param(self.copy(p));
        }
        for m in t.genmaps() {
            c.add_genmap(self.copy(m));
        }
        for x in t.conds() {
            c.add_cond(self.copy(x));
        }
        for x in t.chars() {
            c.add_char(self.copy(x));
        }
        for x in t.assocs() {
            c.add_assoc(self.copy(x));
        }
        for x in t.contexts() {
            c.add_context(self.copy(x));
        }
        for x in t.ranges() {
            c.add_range(self.copy(x));
        }
        if let Some(v) = t.try_value() {
            c.set_value(self.copy(v));
        }
        if let Some(n) = t.try_name() {
            c.set_name(self.copy(n));
        }
        if let Some(l) = t.try_left() {
            c.set_left(self.copy(l));
        }
        if let Some(r) = t.try_right() {
            c.set_right(self.copy(r));
        }

        // Reference slots keep the original for now; they are remapped once
        // the whole set has been copied.
        if let Some(r) = t.try_target() {
            c.set_target(r);
        }
        if let Some(p) = t.try_primary() {
            c.set_primary(p);
        }
        if let Some(s) = t.try_spec() {
            c.set_spec(s);
        }

        c
    }

    fn copied_ident(&self, t: Tree<'a>) -> Name {
        let renamed = match t.kind {
            TreeKind::Entity | TreeKind::Arch => true,
            TreeKind::Ref => match self.rename {
                Some(pred) => pred(t),
                None => false,
            },
            _ => is_subprogram(t),
        };
        if !renamed {
            return t.ident();
        }
        let ident = t.ident();
        if t.kind == TreeKind::Ref {
            return self.names.prefix(Some(self.dotted), ident, '.');
        }
        let s = self.names.get(ident);
        for p in self.prefix.iter().flatten() {
            let ps = self.names.get(*p);
            match s.strip_prefix(&*ps) {
                Some(rest) if rest.is_empty() || rest.starts_with('.') => {
                    let dotted = self.names.get(self.dotted);
                    return self.names.intern(&format!("{}{}", dotted, rest), false);
                }
                _ => continue,
            }
        }
        ident
    }

    fn remap(&self) {
        for &(orig, copy) in &self.copies {
            if let Some(r) = orig.try_target() {
                if let Some(&c) = self.memo.get(&r.id) {
                    copy.set_target(c);
                }
            }
            if let Some(p) = orig.try_primary() {
                if let Some(&c) = self.memo.get(&p.id) {
                    copy.set_primary(c);
                }
            }
            if let Some(s) = orig.try_spec() {
                if let Some(&c) = self.memo.get(&s.id) {
                    copy.set_spec(c);
                }
            }
        }
    }
}

/// Copy a set of related roots, breaking sharing between instances. Returns
/// the copies in root order. Cross-references between the roots stay
/// consistent; subprogram and unit names with the given prefix are renamed
/// into the dotted scope.
pub fn new_instance<'a>(
    arenas: &'a DesignArenas<'a>,
    names: &NameTable,
    roots: &[Tree<'a>],
    dotted: Name,
    prefix: Prefix,
) -> Vec<Tree<'a>> {
    let mut copier = Copier {
        arenas,
        names,
        dotted,
        prefix,
        memo: HashMap::new(),
        copies: Vec::new(),
        rename: None,
    };
    let copies: Vec<_> = roots.iter().map(|&r| copier.copy(r)).collect();
    copier.remap();
    copies
}

/// Copy a single root, additionally renaming the references matched by the
/// predicate into the dotted scope. Used for per-iteration copies of
/// generate bodies, where references to the loop variable must be distinct
/// in each copy.
pub fn copy_with_renaming<'a>(
    arenas: &'a DesignArenas<'a>,
    names: &NameTable,
    root: Tree<'a>,
    rename: &dyn Fn(Tree<'a>) -> bool,
    dotted: Name,
    prefix: Prefix,
) -> Tree<'a> {
    let mut copier = Copier {
        arenas,
        names,
        dotted,
        prefix,
        memo: HashMap::new(),
        copies: Vec::new(),
        rename: Some(rename),
    };
    let copy = copier.copy(root);
    copier.remap();
    copy
}

/// A substitution produced by generic resolution and consumed by
/// [`instance_fixup`].
#[derive(Default)]
pub struct FixupMap<'a> {
    trees: HashMap<NodeId, Tree<'a>>,
    types: HashMap<NodeId, Type<'a>>,
}

impl<'a> FixupMap<'a> {
    pub fn new() -> FixupMap<'a> {
        Default::default()
    }

    /// Map a formal declaration to its actual.
    pub fn put_tree(&mut self, formal: Tree<'a>, actual: Tree<'a>) {
        self.trees.insert(formal.id, actual);
    }

    /// Map a formal type to its actual.
    pub fn put_type(&mut self, formal: Type<'a>, actual: Type<'a>) {
        self.types.insert(formal.id, actual);
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty() && self.types.is_empty()
    }

    pub fn lookup_tree(&self, formal: Tree<'a>) -> Option<Tree<'a>> {
        self.trees.get(&formal.id).copied()
    }

    pub fn lookup_type(&self, formal: Type<'a>) -> Option<Type<'a>> {
        self.types.get(&formal.id).copied()
    }
}

/// Rewrite a freshly copied unit so that references to non-constant formal
/// generics point at their actuals. Applied exactly once per copy.
pub fn instance_fixup<'a>(unit: Tree<'a>, map: &FixupMap<'a>) {
    let mut visited = std::collections::HashSet::new();
    fixup_node(unit, map, &mut visited);
}

fn fixup_node<'a>(
    t: Tree<'a>,
    map: &FixupMap<'a>,
    visited: &mut std::collections::HashSet<NodeId>,
) {
    if !visited.insert(t.id) {
        return;
    }
    if let Some(target) = t.try_target() {
        if let Some(actual) = map.lookup_tree(target) {
            t.set_target(actual);
            if actual.has_ident() {
                t.set_ident(actual.ident());
            }
        }
    }
    if let Some(ty) = t.try_type() {
        if let Some(actual) = map.lookup_type(ty) {
            t.set_type(actual);
        }
    }
    for child in t.owned_children() {
        fixup_node(child, map, visited);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arenas::DesignArenas;
    use crate::name::NameTable;
    use crate::tree::{make_ref, TreeData, TreeKind};

    #[test]
    fn copy_remaps_internal_refs() {
        let arenas = DesignArenas::new();
        let names = NameTable::new();
        let entity = arenas.alloc_tree(TreeData::new(TreeKind::Entity));
        entity.set_ident(names.intern("work.e", false));
        let g = arenas.alloc_tree(TreeData::new(TreeKind::GenericDecl));
        g.set_ident(names.intern("g", false));
        entity.add_generic(g);
        let arch = arenas.alloc_tree(TreeData::new(TreeKind::Arch));
        arch.set_ident(names.intern("work.e-rtl", false));
        arch.set_primary(entity);
        let proc = arenas.alloc_tree(TreeData::new(TreeKind::Process));
        proc.set_value(make_ref(&arenas, g));
        arch.add_stmt(proc);

        let dotted = names.intern("work.top.u1", false);
        let copies = new_instance(&arenas, &names, &[entity, arch], dotted, [None, None]);
        let (ec, ac) = (copies[0], copies[1]);
        assert_ne!(ec.id, entity.id);
        // The architecture's primary points at the copied entity, and the
        // reference inside the process at the copied generic.
        assert_eq!(ac.primary().id, ec.id);
        let gc = ec.generic(0);
        assert_ne!(gc.id, g.id);
        assert_eq!(ac.stmt(0).value().target().id, gc.id);
    }

    #[test]
    fn copy_renames_subprograms() {
        let arenas = DesignArenas::new();
        let names = NameTable::new();
        let entity = arenas.alloc_tree(TreeData::new(TreeKind::Entity));
        entity.set_ident(names.intern("work.e", false));
        let arch = arenas.alloc_tree(TreeData::new(TreeKind::Arch));
        arch.set_ident(names.intern("work.e-rtl", false));
        arch.set_primary(entity);
        let func = arenas.alloc_tree(TreeData::new(TreeKind::FuncBody));
        func.set_ident(names.intern("work.e-rtl.helper", false));
        arch.add_decl(func);

        let dotted = names.intern("work.top.u1", false);
        let prefix = [
            Some(names.intern("work.e-rtl", false)),
            Some(names.intern("work.e", false)),
        ];
        let copies = new_instance(&arenas, &names, &[entity, arch], dotted, prefix);
        let fc = copies[1].decl(0);
        assert_eq!(&*names.get(fc.ident()), "work.top.u1.helper");
    }
}
