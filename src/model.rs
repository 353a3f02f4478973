// Copyright (c) 2022-2025 Fabian Schuiki

//! The run-time model interface.
//!
//! Simulation owns a tree of scopes mirroring the elaborated hierarchy.
//! Elaboration creates one scope per output block, nested along parent
//! links, and the folder may deposit a private-data handle on a scope which
//! later folds in child contexts pick up. Everything else about the model is
//! out of scope here.

use crate::tree::Tree;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// An opaque handle on the private data blob the folder associates with an
/// instantiated scope.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EvalContext(pub u64);

/// The kind of a scope.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeKind {
    /// The scope of the elaboration root.
    Root,
    /// The scope of an instantiated block.
    Instance,
}

/// A run-time scope paired with an output block.
pub struct Scope<'a> {
    /// The kind of this scope.
    pub kind: ScopeKind,
    /// The output block this scope is paired with.
    pub block: Tree<'a>,
    /// The enclosing scope.
    pub parent: Option<Rc<Scope<'a>>>,
    privdata: Cell<Option<EvalContext>>,
}

impl<'a> Scope<'a> {
    /// The private data the folder deposited on this scope, if any.
    pub fn privdata(&self) -> Option<EvalContext> {
        self.privdata.get()
    }

    /// Deposit private data on this scope.
    pub fn set_privdata(&self, data: EvalContext) {
        self.privdata.set(Some(data));
    }
}

/// The run-time model owning the scope tree.
pub struct Model<'a> {
    scopes: RefCell<Vec<Rc<Scope<'a>>>>,
}

impl<'a> Model<'a> {
    /// Create a new empty model.
    pub fn new() -> Model<'a> {
        Model {
            scopes: RefCell::new(Vec::new()),
        }
    }

    /// Create a scope for a block, nested under its parent. A scope without
    /// a parent is the root scope.
    pub fn create_scope(
        &self,
        block: Tree<'a>,
        parent: Option<Rc<Scope<'a>>>,
    ) -> Rc<Scope<'a>> {
        let kind = if parent.is_some() {
            ScopeKind::Instance
        } else {
            ScopeKind::Root
        };
        let scope = Rc::new(Scope {
            kind,
            block,
            parent,
            privdata: Cell::new(None),
        });
        self.scopes.borrow_mut().push(scope.clone());
        scope
    }

    /// Every scope created so far, in creation order.
    pub fn scopes(&self) -> Vec<Rc<Scope<'a>>> {
        self.scopes.borrow().clone()
    }
}

impl<'a> Default for Model<'a> {
    fn default() -> Model<'a> {
        Model::new()
    }
}
