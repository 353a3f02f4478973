// Copyright (c) 2022-2025 Fabian Schuiki

//! The design library interface.
//!
//! A library maps qualified unit names to analysed design units together
//! with their analysis timestamps. The on-disk format and the loading
//! mechanics belong to the library packager; elaboration only enumerates,
//! looks up, and compares timestamps. Enumeration order is insertion order,
//! which keeps the architecture chooser and the synthesis binding fallback
//! deterministic.

use crate::name::Name;
use crate::source::Loc;
use crate::tree::Tree;
use crate::vlog::Vlog;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A design unit object, projectable to either language.
#[derive(Clone, Copy, Debug)]
pub enum Object<'a> {
    Vhdl(Tree<'a>),
    Vlog(Vlog<'a>),
}

impl<'a> Object<'a> {
    /// The VHDL tree of this object, if it is one.
    pub fn as_vhdl(&self) -> Option<Tree<'a>> {
        match *self {
            Object::Vhdl(t) => Some(t),
            Object::Vlog(_) => None,
        }
    }

    /// The Verilog node of this object, if it is one.
    pub fn as_vlog(&self) -> Option<Vlog<'a>> {
        match *self {
            Object::Vlog(v) => Some(v),
            Object::Vhdl(_) => None,
        }
    }

    /// The source location of the object.
    pub fn loc(&self) -> Loc {
        match *self {
            Object::Vhdl(t) => t.loc(),
            Object::Vlog(v) => v.loc(),
        }
    }
}

/// A unit stored in a library.
#[derive(Clone, Copy)]
pub struct LibUnit<'a> {
    /// The analysed design unit.
    pub object: Object<'a>,
    /// When the unit was last analysed.
    pub mtime: u64,
}

/// A single design library.
pub struct Library<'a> {
    name: Name,
    units: RefCell<IndexMap<Name, LibUnit<'a>>>,
}

impl<'a> Library<'a> {
    /// Create a new empty library.
    pub fn new(name: Name) -> Library<'a> {
        Library {
            name,
            units: RefCell::new(IndexMap::new()),
        }
    }

    /// The name of the library.
    pub fn name(&self) -> Name {
        self.name
    }

    /// Store a unit under its qualified name.
    pub fn put(&self, name: Name, object: Object<'a>, mtime: u64) {
        self.units.borrow_mut().insert(name, LibUnit { object, mtime });
    }

    /// Look up a unit by qualified name.
    pub fn get(&self, name: Name) -> Option<Object<'a>> {
        self.units.borrow().get(&name).map(|u| u.object)
    }

    /// The analysis timestamp of a unit.
    pub fn mtime(&self, name: Name) -> Option<u64> {
        self.units.borrow().get(&name).map(|u| u.mtime)
    }

    /// Visit every unit of the library index in insertion order.
    pub fn walk_index<F>(&self, mut f: F)
    where
        F: FnMut(Name, Object<'a>),
    {
        for (&name, unit) in self.units.borrow().iter() {
            f(name, unit.object);
        }
    }
}

/// The set of loaded libraries.
pub struct LibraryManager<'a> {
    libs: RefCell<IndexMap<Name, Rc<Library<'a>>>>,
}

impl<'a> LibraryManager<'a> {
    /// Create a new empty manager.
    pub fn new() -> LibraryManager<'a> {
        LibraryManager {
            libs: RefCell::new(IndexMap::new()),
        }
    }

    /// Register a library.
    pub fn add(&self, lib: Rc<Library<'a>>) {
        self.libs.borrow_mut().insert(lib.name(), lib);
    }

    /// Look up a loaded library by name.
    pub fn get(&self, name: Name) -> Option<Rc<Library<'a>>> {
        self.libs.borrow().get(&name).cloned()
    }

    /// Look up a library, loading an empty one if it does not exist yet.
    /// Context clauses go through this so that subsequent binding searches
    /// can see every referenced library.
    pub fn require(&self, name: Name) -> Rc<Library<'a>> {
        if let Some(lib) = self.get(name) {
            return lib;
        }
        let lib = Rc::new(Library::new(name));
        self.libs.borrow_mut().insert(name, lib.clone());
        lib
    }

    /// Visit every loaded library in load order until the callback asks to
    /// stop by returning `false`.
    pub fn for_all<F>(&self, mut f: F)
    where
        F: FnMut(&Rc<Library<'a>>) -> bool,
    {
        for lib in self.libs.borrow().values() {
            if !f(lib) {
                break;
            }
        }
    }
}

impl<'a> Default for LibraryManager<'a> {
    fn default() -> LibraryManager<'a> {
        LibraryManager::new()
    }
}
