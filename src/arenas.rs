// Copyright (c) 2022-2025 Fabian Schuiki

//! Multi-type arena allocation.
//!
//! Every tree, type, and Verilog node of one elaboration is allocated from a
//! single [`DesignArenas`]. The caller of the root driver owns the arenas;
//! the elaborated tree borrows them, which is the Rust rendering of the
//! per-elaboration global arena the run time expects. After elaboration the
//! root driver freezes the arenas; allocating from a frozen arena is a bug
//! in the elaborator, not in user input.

use crate::tree::TreeData;
use crate::ty::TypeData;
use crate::vlog::VlogData;
use std::cell::Cell;
use typed_arena::Arena;

/// The arenas that own every node of one elaboration.
pub struct DesignArenas<'a> {
    trees: Arena<TreeData<'a>>,
    types: Arena<TypeData<'a>>,
    vlog: Arena<VlogData<'a>>,
    frozen: Cell<bool>,
}

impl<'a> DesignArenas<'a> {
    /// Create a fresh set of arenas.
    pub fn new() -> DesignArenas<'a> {
        DesignArenas {
            trees: Arena::new(),
            types: Arena::new(),
            vlog: Arena::new(),
            frozen: Cell::new(false),
        }
    }

    /// Allocate a tree node.
    pub fn alloc_tree(&'a self, data: TreeData<'a>) -> &'a TreeData<'a> {
        assert!(!self.frozen.get(), "allocation from frozen arena");
        self.trees.alloc(data)
    }

    /// Allocate a type node.
    pub fn alloc_type(&'a self, data: TypeData<'a>) -> &'a TypeData<'a> {
        assert!(!self.frozen.get(), "allocation from frozen arena");
        self.types.alloc(data)
    }

    /// Allocate a Verilog node.
    pub fn alloc_vlog(&'a self, data: VlogData<'a>) -> &'a VlogData<'a> {
        assert!(!self.frozen.get(), "allocation from frozen arena");
        self.vlog.alloc(data)
    }

    /// Freeze the arenas. Called by the root driver once the output tree is
    /// complete.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    /// Whether the arenas have been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}

impl<'a> Default for DesignArenas<'a> {
    fn default() -> DesignArenas<'a> {
        DesignArenas::new()
    }
}
