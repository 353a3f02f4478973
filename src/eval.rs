// Copyright (c) 2022-2025 Fabian Schuiki

//! The constant folding interface.
//!
//! The folder is an external collaborator: given an expression tree, an
//! optional lowered unit for context, and an optional instance private-data
//! handle, it produces a folded tree or gives up. Elaboration treats it as a
//! black box; the probing helpers below are how elaboration inspects the
//! results it gets back.

use crate::lower::LoweredUnit;
use crate::model::EvalContext;
use crate::tree::{LiteralKind, RangeDir, Subkind, Tree, TreeKind};

/// The constant folder, usually backed by a JIT.
pub trait Folder<'a> {
    /// Attempt to fold an expression to a literal. Returns the input
    /// unchanged if the expression is not foldable; diagnostics for folding
    /// failures are the caller's business.
    fn try_fold(
        &self,
        value: Tree<'a>,
        unit: Option<LoweredUnit>,
        context: Option<EvalContext>,
    ) -> Tree<'a>;

    /// Fold an expression that elaboration requires to be static. The folder
    /// emits its own diagnostic when the expression cannot be folded, and
    /// returns the input unchanged.
    fn must_fold(
        &self,
        value: Tree<'a>,
        unit: Option<LoweredUnit>,
        context: Option<EvalContext>,
    ) -> Tree<'a>;

    /// Resolve a case-generate statement to its chosen alternative, or
    /// `None` if no alternative applies.
    fn eval_case(
        &self,
        stmt: Tree<'a>,
        unit: Option<LoweredUnit>,
        context: Option<EvalContext>,
    ) -> Option<Tree<'a>>;
}

/// The integer value of a folded expression, if it is an integer literal.
pub fn folded_int(t: Tree) -> Option<i64> {
    match t.kind {
        TreeKind::Literal => match t.subkind() {
            Subkind::Literal(LiteralKind::Int) => Some(t.ival()),
            _ => None,
        },
        _ => None,
    }
}

/// The boolean value of a folded expression, if it is a reference to an
/// enumeration literal. The literal at position zero is the false value.
pub fn folded_bool(t: Tree) -> Option<bool> {
    match t.kind {
        TreeKind::Ref => match t.try_target() {
            Some(lit) if lit.kind == TreeKind::EnumLit => Some(lit.pos() != 0),
            _ => None,
        },
        _ => None,
    }
}

/// The normalized `(low, high)` bounds of a range whose bounds are already
/// integer literals.
pub fn folded_bounds(r: Tree) -> Option<(i64, i64)> {
    debug_assert_eq!(r.kind, TreeKind::Range);
    let dir = match r.subkind() {
        Subkind::Range(dir) => dir,
        _ => return None,
    };
    match dir {
        RangeDir::Expr => None,
        RangeDir::To => Some((folded_int(r.left())?, folded_int(r.right())?)),
        RangeDir::Downto => Some((folded_int(r.right())?, folded_int(r.left())?)),
    }
}
