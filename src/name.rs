// Copyright (c) 2022-2025 Fabian Schuiki

//! A name table that internalizes all names presented to it and allows for
//! them to be referred to by a lightweight tag. This structure is heavily
//! inspired by the interner used in the Rust compiler.
//!
//! VHDL identifiers are interned case-insensitively: two spellings that
//! differ only in case map to the same tag, which makes the case-insensitive
//! comparison required by the LRM a simple tag equality. Verilog identifiers
//! are interned case-sensitively and carry the most significant bit as a
//! marker. On top of interning, the table provides the small identifier
//! algebra elaboration needs to build hierarchical and qualified names:
//! [`NameTable::prefix`], [`NameTable::until`], and [`NameTable::rfrom`].

use std::borrow::Borrow;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::rc::Rc;

/// A name is a lightweight 32 bit tag that refers to a string in a name
/// table. Names which have their most significant bit set represent case
/// sensitive names, such as Verilog identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub u32);

impl Name {
    /// Check if the name is case sensitive.
    pub fn is_case_sensitive(&self) -> bool {
        self.0 >> 31 == 1
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// A reference-counted string that acts like a regular str slice, hiding the
/// fact that it is wrapped in Rc<>.
#[derive(Clone, PartialEq, Hash, PartialOrd)]
pub struct RcStr(Rc<String>);

impl RcStr {
    /// Create a new ref-counted string which is a copy of `value`.
    pub fn new(value: &str) -> RcStr {
        RcStr(Rc::new(value.to_string()))
    }

    /// Create a new ref-counted string that contains `value`, without
    /// allocating any new storage.
    pub fn from(value: String) -> RcStr {
        RcStr(Rc::new(value))
    }
}

impl Eq for RcStr {}

impl Ord for RcStr {
    fn cmp(&self, other: &RcStr) -> Ordering {
        self[..].cmp(&other[..])
    }
}

impl fmt::Debug for RcStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self[..].fmt(f)
    }
}

impl fmt::Display for RcStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self[..].fmt(f)
    }
}

impl Borrow<str> for RcStr {
    fn borrow(&self) -> &str {
        &self.0[..]
    }
}

impl Deref for RcStr {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0[..]
    }
}

/// A lookup table of names. Internalizes strings either in a case sensitive
/// or case insensitive way. Allows for bidirectional lookup, i.e. by string
/// or by assigned name.
///
/// The table is owned by the session rather than being a thread local, which
/// keeps separate elaborations hermetic.
pub struct NameTable {
    map: RefCell<HashMap<RcStr, Name>>,
    vect: RefCell<Vec<RcStr>>,
}

impl NameTable {
    /// Create a new empty name table.
    pub fn new() -> NameTable {
        NameTable {
            map: RefCell::new(HashMap::new()),
            vect: RefCell::new(Vec::new()),
        }
    }

    /// Obtain a name for a string. This either inserts the string into the
    /// table and returns the new name, or returns the existing name if the
    /// string already exists in the table.
    pub fn intern(&self, value: &str, case_sensitive: bool) -> Name {
        let mut map = self.map.borrow_mut();
        if let Some(&idx) = map.get(value) {
            return idx;
        }

        // Since the name is not present in the table yet, we allocate a new
        // idx for it. Also, if it is a case-insensitive name, we insert both
        // its original form as well as its lowercase form into the lookup
        // table.
        let mut vect = self.vect.borrow_mut();
        if case_sensitive {
            let new_idx = Name(vect.len() as u32 | 1 << 31);
            let v = RcStr::new(value);
            map.insert(v.clone(), new_idx);
            vect.push(v);
            new_idx
        } else {
            let lower = value.to_lowercase();
            if let Some(&idx) = map.get(lower.as_str()) {
                return idx;
            }
            let new_idx = Name(vect.len() as u32);
            let v = RcStr::new(value);
            map.insert(RcStr::from(lower), new_idx);
            map.insert(v.clone(), new_idx);
            vect.push(v);
            new_idx
        }
    }

    /// Retrieve the string given a name tag.
    pub fn get(&self, idx: Name) -> RcStr {
        (*self.vect.borrow())[(idx.0 & !(1 << 31)) as usize].clone()
    }

    /// Try to find a string.
    pub fn find<Q: ?Sized>(&self, value: &Q) -> Option<Name>
    where
        RcStr: Borrow<Q>,
        Q: Eq + Hash,
    {
        (*self.map.borrow()).get(value).cloned()
    }

    /// Join two names with a separator. If `prefix` is `None` the suffix is
    /// returned unchanged, which makes chained path construction convenient.
    pub fn prefix(&self, prefix: Option<Name>, suffix: Name, sep: char) -> Name {
        match prefix {
            Some(p) => {
                let joined = format!("{}{}{}", self.get(p), sep, self.get(suffix));
                self.intern(&joined, suffix.is_case_sensitive())
            }
            None => suffix,
        }
    }

    /// The part of `name` up to but excluding the first occurrence of `sep`,
    /// or the whole name if the separator does not occur.
    pub fn until(&self, name: Name, sep: char) -> Name {
        let s = self.get(name);
        match s.find(sep) {
            Some(pos) => self.intern(&s[..pos], name.is_case_sensitive()),
            None => name,
        }
    }

    /// The part of `name` after the last occurrence of `sep`, or the whole
    /// name if the separator does not occur.
    pub fn rfrom(&self, name: Name, sep: char) -> Name {
        let s = self.get(name);
        match s.rfind(sep) {
            Some(pos) => self.intern(&s[pos + 1..], name.is_case_sensitive()),
            None => name,
        }
    }
}

impl Default for NameTable {
    fn default() -> NameTable {
        NameTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_case_insensitive() {
        let tbl = NameTable::new();
        let a = tbl.intern("Foo", false);
        let b = tbl.intern("foo", false);
        let c = tbl.intern("FOO", false);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(&*tbl.get(a), "Foo");
    }

    #[test]
    fn intern_case_sensitive() {
        let tbl = NameTable::new();
        let a = tbl.intern("Clk", true);
        let b = tbl.intern("clk", true);
        assert_ne!(a, b);
        assert!(a.is_case_sensitive());
    }

    #[test]
    fn prefix_until_rfrom() {
        let tbl = NameTable::new();
        let work = tbl.intern("work", false);
        let foo = tbl.intern("foo", false);
        let qual = tbl.prefix(Some(work), foo, '.');
        assert_eq!(&*tbl.get(qual), "work.foo");
        assert_eq!(tbl.until(qual, '.'), work);
        assert_eq!(tbl.rfrom(qual, '.'), foo);
        assert_eq!(tbl.until(foo, '.'), foo);
        assert_eq!(tbl.prefix(None, foo, '.'), foo);
    }
}
