// Copyright (c) 2022-2025 Fabian Schuiki

//! Utilities to implement diagnostics and error reporting facilities.

use crate::source::Loc;
use std::fmt;

/// Emits diagnostic messages.
pub trait DiagEmitter {
    /// Emit a diagnostic message.
    fn emit(&self, diag: DiagBuilder2);
}

impl<'a, T> DiagEmitter for &'a T
where
    T: DiagEmitter + ?Sized,
{
    fn emit(&self, diag: DiagBuilder2) {
        (*self).emit(diag)
    }
}

/// A structured diagnostic message under construction.
#[must_use]
#[derive(Clone, Debug)]
pub struct DiagBuilder2 {
    pub severity: Severity,
    pub message: String,
    pub segments: Vec<DiagSegment>,
}

/// A segment of a diagnostic: a source location or an additional note.
#[derive(Clone, Debug)]
pub enum DiagSegment {
    Loc(Loc),
    Note(String),
}

/// A result whose error has already been reported through a diagnostic
/// emitter. The `Err` variant merely unwinds to the next error gate.
pub type Result<T> = std::result::Result<T, ()>;

impl DiagBuilder2 {
    pub fn new<S: Into<String>>(severity: Severity, message: S) -> DiagBuilder2 {
        DiagBuilder2 {
            severity,
            message: message.into(),
            segments: Vec::new(),
        }
    }

    pub fn bug<S: Into<String>>(message: S) -> DiagBuilder2 {
        DiagBuilder2::new(Severity::Bug, message)
    }

    pub fn fatal<S: Into<String>>(message: S) -> DiagBuilder2 {
        DiagBuilder2::new(Severity::Fatal, message)
    }

    pub fn error<S: Into<String>>(message: S) -> DiagBuilder2 {
        DiagBuilder2::new(Severity::Error, message)
    }

    pub fn warning<S: Into<String>>(message: S) -> DiagBuilder2 {
        DiagBuilder2::new(Severity::Warning, message)
    }

    pub fn note<S: Into<String>>(message: S) -> DiagBuilder2 {
        DiagBuilder2::new(Severity::Note, message)
    }

    pub fn segment(mut self, segment: DiagSegment) -> DiagBuilder2 {
        self.segments.push(segment);
        self
    }

    pub fn span(self, loc: Loc) -> DiagBuilder2 {
        self.segment(DiagSegment::Loc(loc))
    }

    pub fn add_note<S: Into<String>>(self, message: S) -> DiagBuilder2 {
        self.segment(DiagSegment::Note(message.into()))
    }

    pub fn get_severity(&self) -> Severity {
        self.severity
    }

    pub fn get_message(&self) -> &str {
        &self.message
    }

    pub fn get_segments(&self) -> &[DiagSegment] {
        &self.segments
    }

    /// The notes attached to this diagnostic, in order.
    pub fn notes(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            DiagSegment::Note(n) => Some(n.as_str()),
            _ => None,
        })
    }
}

/// The severity of a diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
    Bug,
}

impl Severity {
    pub fn to_str(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Bug => "compiler bug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl fmt::Display for DiagBuilder2 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        for segment in &self.segments {
            match segment {
                DiagSegment::Loc(loc) => write!(f, "\n  --> {:?}", loc)?,
                DiagSegment::Note(note) => write!(f, "\n  = note: {}", note)?,
            }
        }
        Ok(())
    }
}
