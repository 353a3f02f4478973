// Copyright (c) 2022-2025 Fabian Schuiki

//! Hierarchical instance paths.
//!
//! Simulation and diagnostics identify instances by a colon-separated path
//! of labels, e.g. `:top(rtl):u1@work.foo(rtl)`. The LRM specifies the
//! instance path is lowercase, so every fragment is folded before it is
//! interned.

use crate::name::{Name, NameTable};

/// Append a lowercased fragment to a hierarchical path. With no path yet,
/// the fragment stands alone.
pub fn hpath(names: &NameTable, path: Option<Name>, sep: char, frag: &str) -> Name {
    let id = names.intern(&frag.to_lowercase(), false);
    names.prefix(path, id, sep)
}

/// Strip any library or entity prefix from a qualified name.
pub fn simple_name(full: &str) -> &str {
    let mut start = 0;
    for (i, c) in full.char_indices() {
        if c == '.' || c == '-' {
            start = i + 1;
        }
    }
    &full[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_lowercase() {
        let names = NameTable::new();
        let root = hpath(&names, None, ':', ":Top(RTL)");
        assert_eq!(&*names.get(root), ":top(rtl)");
        let child = hpath(&names, Some(root), ':', "U1@work.Foo(rtl)");
        assert_eq!(&*names.get(child), ":top(rtl):u1@work.foo(rtl)");
    }

    #[test]
    fn simple_names() {
        assert_eq!(simple_name("WORK.FOO"), "FOO");
        assert_eq!(simple_name("WORK.FOO-RTL"), "RTL");
        assert_eq!(simple_name("FOO"), "FOO");
    }
}
