// Copyright (c) 2022-2025 Fabian Schuiki

//! The elaboration core of a mixed VHDL/Verilog hardware compiler.
//!
//! Given a top-level design unit and a set of collaborators (a library
//! manager, a constant folder, a lowering backend, a unit registry, and a
//! run-time model), the [`elab::elaborate`] entry point expands the design
//! into a monomorphic hierarchy: every instance bound to an entity,
//! architecture, configuration, or Verilog module, every generic resolved to
//! a constant, every generate statement statically unrolled, and every block
//! paired with a lowered unit and a run-time scope.
//!
//! The crate deliberately stops at the elaboration boundary: parsing,
//! analysis, code generation, and simulation live elsewhere and are consumed
//! through the narrow traits in [`eval`] and [`lower`].

#[macro_use]
extern crate log;

pub mod arenas;
pub mod builtin;
pub mod elab;
pub mod errors;
pub mod eval;
pub mod inst;
pub mod library;
pub mod lower;
pub mod model;
pub mod name;
pub mod session;
pub mod simp;
pub mod source;
pub mod tree;
pub mod ty;
pub mod vlog;

pub use crate::errors::{DiagBuilder2, DiagEmitter, Result, Severity};
pub use crate::name::Name;
pub use crate::session::Session;
pub use crate::source::Loc;
pub use crate::tree::{NodeId, Tree};
