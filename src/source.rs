// Copyright (c) 2022-2025 Fabian Schuiki

//! Compact source locations.
//!
//! Elaboration only ever needs a location to attach to diagnostics and to
//! break architecture-chooser ties, so a location is just the interned file
//! name plus the first line of the construct. The full span machinery lives
//! with the tree builder.

use crate::name::Name;
use std::fmt;

/// A source location: the file a construct was analysed from and the line it
/// starts on.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Loc {
    /// The interned name of the source file, or `None` for synthesized
    /// constructs.
    pub file: Option<Name>,
    /// The 1-based line the construct starts on. Zero for synthesized
    /// constructs.
    pub first_line: u32,
}

impl Loc {
    /// Create a location in a file.
    pub fn new(file: Name, first_line: u32) -> Loc {
        Loc {
            file: Some(file),
            first_line,
        }
    }

    /// The location used for synthesized nodes that do not correspond to any
    /// source text.
    pub fn invalid() -> Loc {
        Loc {
            file: None,
            first_line: 0,
        }
    }
}

impl fmt::Debug for Loc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.file {
            Some(file) => write!(f, "Loc({:?}:{})", file, self.first_line),
            None => write!(f, "Loc(<invalid>)"),
        }
    }
}
