// Copyright (c) 2022-2025 Fabian Schuiki

//! The lowering interface.
//!
//! Elaboration drives a lowering pass in lockstep with its descent: every
//! output block becomes a lowered unit, processes and PSL directives are
//! lowered into the unit of their containing block, and Verilog modules
//! contribute a pre-lowered shape. The pass itself, the intermediate
//! representation, and the unit registry are external collaborators reached
//! through the traits in this module.

use crate::name::Name;
use crate::tree::Tree;
use crate::vlog::Vlog;

/// The pre-lowered shape of a Verilog module, used when lowering the blocks
/// that instantiate it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Shape(pub u32);

/// A handle on a unit produced by the lowering pass and owned by the unit
/// registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LoweredUnit(pub u32);

/// The set of driver contributions of a design body, as computed by the
/// driver analyser.
pub struct DriverSet<'a> {
    drivers: Vec<Tree<'a>>,
}

impl<'a> DriverSet<'a> {
    /// Create a driver set from the analysed contributions.
    pub fn new(drivers: Vec<Tree<'a>>) -> DriverSet<'a> {
        DriverSet { drivers }
    }

    /// The number of driver contributions.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Whether the body drives nothing.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// The driver contributions, in analysis order.
    pub fn iter(&self) -> impl Iterator<Item = Tree<'a>> + '_ {
        self.drivers.iter().copied()
    }
}

/// A coverage data collector. Opaque to elaboration; threaded into instance
/// lowering when present.
pub struct CoverData;

/// An SDF annotation file. Opaque to elaboration; carried on the context for
/// downstream passes.
pub struct SdfFile;

/// The lowering pass and driver analyser.
pub trait Lowering<'a> {
    /// Lower a top-level Verilog module to its shape.
    fn module_shape(&self, module: Vlog<'a>) -> Shape;

    /// Lower an elaborated block into a new unit nested under its parent.
    fn lower_instance(
        &self,
        parent: Option<LoweredUnit>,
        shape: Option<Shape>,
        drivers: Option<&DriverSet<'a>>,
        cover: Option<&CoverData>,
        block: Tree<'a>,
    ) -> LoweredUnit;

    /// Lower a process into the unit of its containing block.
    fn lower_process(&self, unit: LoweredUnit, process: Tree<'a>, drivers: Option<&DriverSet<'a>>);

    /// Lower a PSL directive into the unit of its containing block.
    fn lower_psl(&self, unit: LoweredUnit, directive: Tree<'a>, cover: Option<&CoverData>);

    /// Compute the driver set of a design body.
    fn find_drivers(&self, body: Tree<'a>) -> DriverSet<'a>;
}

/// The registry that owns lowered units.
pub trait UnitRegistry {
    /// Finalise a lowered unit. Called exactly once per unit, when the
    /// corresponding scope is popped.
    fn finalise(&self, unit: LoweredUnit);

    /// Drop a unit by qualified name. The root driver flushes the top-level
    /// block's unit after elaboration.
    fn flush(&self, name: Name);
}
