// Copyright (c) 2022-2025 Fabian Schuiki

//! Architecture selection.
//!
//! When an instantiation names an entity without an explicit architecture,
//! the most recently analysed architecture of that entity is chosen, using
//! the library timestamps with source line numbers as the tie breaker.

use crate::elab::ElabCtx;
use crate::errors::{DiagBuilder2, DiagEmitter, Result};
use crate::library::{Library, Object};
use crate::name::Name;
use crate::source::Loc;
use crate::tree::{Tree, TreeKind};
use std::rc::Rc;

/// Find the library a qualified unit name lives in. The `work` library maps
/// to the current working library of the context.
pub(crate) fn find_lib<'p, 'a>(name: Name, ctx: &ElabCtx<'p, 'a>) -> Rc<Library<'a>> {
    let names = ctx.names();
    let lib_name = names.until(name, '.');
    if lib_name == names.intern("work", false) {
        ctx.library.clone()
    } else {
        ctx.libraries().require(lib_name)
    }
}

/// Select the most recently analysed architecture of an entity.
///
/// Candidates are the units of the entity's library whose name strips (with
/// `-` as the separator) to the entity's qualified name and which are
/// architectures. A greater analysis timestamp wins; on a tie within the
/// same source file the unit starting on the greater-or-equal line wins; on
/// a tie across files a warning is emitted and the earlier choice kept.
pub(crate) fn pick_arch<'p, 'a>(
    loc: Loc,
    entity: Tree<'a>,
    ctx: &ElabCtx<'p, 'a>,
) -> Result<Tree<'a>> {
    let names = ctx.names();
    let name = entity.ident();
    let lib = find_lib(name, ctx);
    let search = names.prefix(Some(lib.name()), names.rfrom(name, '.'), '.');

    let mut chosen: Option<(Name, u64)> = None;
    lib.walk_index(|unit_name, object| {
        let arch = match object {
            Object::Vhdl(t) if t.kind == TreeKind::Arch => t,
            _ => return,
        };
        if names.until(unit_name, '-') != search {
            return;
        }
        let mtime = lib.mtime(unit_name).unwrap_or(0);
        match chosen {
            None => chosen = Some((unit_name, mtime)),
            Some((_, best)) if mtime > best => chosen = Some((unit_name, mtime)),
            Some((best_name, best)) if mtime == best => {
                // Use source file line numbers to break the tie.
                let old = match lib.get(best_name).and_then(|o| o.as_vhdl()) {
                    Some(t) => t,
                    None => {
                        chosen = Some((unit_name, mtime));
                        return;
                    }
                };
                let old_loc = old.loc();
                let new_loc = arch.loc();
                if old_loc.file != new_loc.file {
                    ctx.sess().emit(DiagBuilder2::warning(format!(
                        "cannot determine which of {} and {} is most recently modified",
                        names.get(best_name),
                        names.get(unit_name)
                    )));
                } else if new_loc.first_line >= old_loc.first_line {
                    chosen = Some((unit_name, mtime));
                }
            }
            _ => {}
        }
    });

    match chosen {
        Some((name, _)) => Ok(lib
            .get(name)
            .and_then(|o| o.as_vhdl())
            .expect("index gave a unit the library cannot return")),
        None => {
            ctx.sess().emit(
                DiagBuilder2::fatal(format!(
                    "no suitable architecture for {}",
                    names.get(search)
                ))
                .span(loc),
            );
            Err(())
        }
    }
}
