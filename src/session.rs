// Copyright (c) 2022-2025 Fabian Schuiki

//! The compiler session.
//!
//! A [`Session`] carries everything that is ambient during one elaboration:
//! the name table, the diagnostic sink with its error count and hint stack,
//! the verbosity options, and the generic override table populated from
//! `-gNAME=VALUE` style requests upstream. It is passed by reference; there
//! is no process-global state, so concurrent tests do not interfere.

use crate::errors::{DiagBuilder2, DiagEmitter, Result, Severity};
use crate::name::{Name, NameTable};
use std::cell::{Cell, RefCell};

/// A pending generic override from the command line.
#[derive(Clone, Debug)]
pub struct GenericOverride {
    /// The dot-separated qualified name the override applies to.
    pub name: Name,
    /// The unparsed textual value.
    pub value: String,
}

pub struct Session {
    /// The name table shared by every phase of this session.
    pub names: NameTable,
    /// The options in effect.
    pub opts: SessionOptions,
    /// Every diagnostic emitted so far, in emission order.
    diags: RefCell<Vec<DiagBuilder2>>,
    /// The number of diagnostics with severity error or worse.
    errors: Cell<usize>,
    /// The stack of active hint frames. Every diagnostic emitted while a
    /// frame is on the stack carries the frame's notes, e.g. the instance
    /// being elaborated while a lowering error surfaced.
    hints: RefCell<Vec<Vec<String>>>,
    /// The generic override table, consumed destructively during
    /// elaboration. First match in insertion order wins.
    overrides: RefCell<Vec<GenericOverride>>,
}

impl Session {
    /// Create a new session.
    pub fn new() -> Session {
        Session {
            names: NameTable::new(),
            opts: Default::default(),
            diags: RefCell::new(Vec::new()),
            errors: Cell::new(0),
            hints: RefCell::new(Vec::new()),
            overrides: RefCell::new(Vec::new()),
        }
    }

    /// The number of error or fatal diagnostics emitted so far. Elaboration
    /// phases gate on this before proceeding.
    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    /// The diagnostics emitted so far.
    pub fn diags(&self) -> Vec<DiagBuilder2> {
        self.diags.borrow().clone()
    }

    /// Push a frame of hint notes. Every diagnostic emitted while the frame
    /// is on the stack carries the notes.
    pub fn push_hint(&self, notes: Vec<String>) {
        self.hints.borrow_mut().push(notes);
    }

    /// Pop the most recently pushed hint frame.
    pub fn pop_hint(&self) {
        self.hints.borrow_mut().pop();
    }

    /// Register a generic override, as produced by `-gNAME=VALUE`.
    ///
    /// Registering the same name twice is a fatal error.
    pub fn set_generic(&self, name: &str, value: &str) -> Result<()> {
        let id = self.names.intern(name, false);
        let previous = self
            .overrides
            .borrow()
            .iter()
            .find(|o| o.name == id)
            .map(|o| o.value.clone());
        if let Some(previous) = previous {
            self.emit(DiagBuilder2::fatal(format!(
                "generic {} already has value '{}'",
                name, previous
            )));
            return Err(());
        }
        self.overrides.borrow_mut().push(GenericOverride {
            name: id,
            value: value.to_string(),
        });
        Ok(())
    }

    /// Consume the override for the given qualified name, if one exists.
    /// Each override is consumed at most once.
    pub fn take_override(&self, qual: Name) -> Option<String> {
        let mut overrides = self.overrides.borrow_mut();
        let pos = overrides.iter().position(|o| o.name == qual)?;
        Some(overrides.remove(pos).value)
    }

    /// The overrides that were never consumed. The root driver turns these
    /// into warnings at teardown.
    pub fn unused_overrides(&self) -> Vec<GenericOverride> {
        self.overrides.borrow().clone()
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}

impl DiagEmitter for Session {
    fn emit(&self, mut diag: DiagBuilder2) {
        for frame in self.hints.borrow().iter() {
            for note in frame {
                diag = diag.add_note(note.clone());
            }
        }
        if diag.severity >= Severity::Error {
            self.errors.set(self.errors.get() + 1);
        }
        match diag.severity {
            Severity::Warning => warn!("{}", diag),
            Severity::Note => info!("{}", diag),
            _ => error!("{}", diag),
        }
        self.diags.borrow_mut().push(diag);
    }
}

/// A set of options for a session.
#[derive(Debug, Default)]
pub struct SessionOptions {
    /// The verbosity options.
    pub verbosity: Verbosity,
}

bitflags::bitflags! {
    /// A set of verbosity options for a session.
    ///
    /// These flags control how much information the elaborator traces.
    #[derive(Default)]
    pub struct Verbosity: u8 {
        const BINDINGS  = 0b0001;
        const GENERICS  = 0b0010;
        const HIERARCHY = 0b0100;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_consumed_once() {
        let sess = Session::new();
        sess.set_generic("WIDTH", "16").unwrap();
        let id = sess.names.intern("width", false);
        assert_eq!(sess.take_override(id).as_deref(), Some("16"));
        assert_eq!(sess.take_override(id), None);
        assert!(sess.unused_overrides().is_empty());
    }

    #[test]
    fn duplicate_override_is_fatal() {
        let sess = Session::new();
        sess.set_generic("DEPTH", "2").unwrap();
        assert!(sess.set_generic("DEPTH", "4").is_err());
        assert_eq!(sess.error_count(), 1);
    }

    #[test]
    fn hints_decorate_diagnostics() {
        let sess = Session::new();
        sess.push_hint(vec!["while testing".to_string()]);
        sess.emit(DiagBuilder2::error("boom"));
        sess.pop_hint();
        sess.emit(DiagBuilder2::error("bang"));
        let diags = sess.diags();
        assert_eq!(diags[0].notes().count(), 1);
        assert_eq!(diags[1].notes().count(), 0);
        assert_eq!(sess.error_count(), 2);
    }
}
