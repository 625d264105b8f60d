//! Instruction and terminator representation.
//!
//! This module defines the tagged instruction variants the checker consumes. The
//! set is deliberately small: it covers exactly the constructs whose presence or
//! shape changes a differentiability verdict, plus the value-producing operations
//! needed to track non-differentiable intermediates.
//!
//! # Design
//!
//! Instructions carry explicit operands and results as [`ValueId`]s, in the
//! `result = op(operands)` style. Terminators are a separate enum: a basic block
//! is an ordered instruction sequence closed by exactly one [`Terminator`], and
//! block successors are derived from it rather than stored.
//!
//! Every instruction and terminator carries a [`SourceLoc`] so findings can be
//! pinpointed; diagnostics are sorted by these locations, which makes them the
//! anchor for deterministic output.
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

use std::fmt;

use strum::EnumIs;

use crate::types::TypeId;

/// A location in the original source file (1-based line and column).
///
/// Locations order first by line, then by column; diagnostic chains are sorted
/// by this order to keep output stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceLoc {
    /// 1-based source line.
    pub line: u32,
    /// 1-based source column.
    pub column: u32,
}

impl SourceLoc {
    /// Creates a new source location.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identifies a value produced within a function body.
///
/// Parameter values occupy ids `0..param_count`; instruction results are
/// allocated after them. Ids are only meaningful within their owning function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);

impl ValueId {
    /// Creates a value id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Identifies a basic block within its owning function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Unary numeric operations.
///
/// Applying one of these to a non-differentiable value is what turns a tolerated
/// intermediate into a finding (see the analyzer's activity rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Exponential.
    Exp,
    /// Natural logarithm.
    Log,
    /// Square root.
    Sqrt,
}

/// Binary numeric operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

/// The three accessor entry points of a wrapped or projected property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum AccessorKind {
    /// Read accessor.
    Get,
    /// Write accessor.
    Set,
    /// In-place read-modify-write accessor.
    Modify,
}

/// A single get/set/modify call on a wrapped or projected property.
///
/// Accessor calls are produced upstream when wrapper-type accessors are expanded
/// into underlying storage accesses. Chained accesses (a projection followed by
/// a nested wrapped-value read) are linked through [`base`](Self::base): the
/// base of an inner access is the result of the outer one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorCall {
    /// Which accessor entry point is invoked.
    pub kind: AccessorKind,
    /// The aggregate type declaring the accessed property.
    pub aggregate: TypeId,
    /// Name of the accessed property.
    pub member: String,
    /// Storage type of the accessed property.
    pub storage: TypeId,
    /// `true` when this accesses the projected value of a wrapper rather than
    /// the wrapped storage itself.
    pub projection: bool,
    /// The value the access is rooted in, when this is a chained access.
    pub base: Option<ValueId>,
    /// The value produced by the access.
    pub result: ValueId,
}

/// Tagged instruction variants.
///
/// Each variant corresponds to one construct the checker must recognize. Calls
/// come in three flavors because each has different differentiability rules:
/// ordinary applies are supported, throwing and rethrowing applies never are,
/// and coroutine-style accesses are recognized structurally from their
/// begin/end pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// A literal or otherwise opaque value producer.
    Const {
        /// The produced value.
        result: ValueId,
    },

    /// A unary numeric operation.
    Unary {
        /// The operation.
        op: UnaryOp,
        /// The operand.
        operand: ValueId,
        /// The produced value.
        result: ValueId,
    },

    /// A binary numeric operation.
    Binary {
        /// The operation.
        op: BinaryOp,
        /// Left operand.
        lhs: ValueId,
        /// Right operand.
        rhs: ValueId,
        /// The produced value.
        result: ValueId,
    },

    /// An ordinary (non-throwing) call.
    Apply {
        /// Name of the callee.
        callee: String,
        /// Argument values.
        args: Vec<ValueId>,
        /// The produced value, if the callee returns one.
        result: Option<ValueId>,
    },

    /// A call to a throwing callee.
    ///
    /// `forced` records forced-unwrap syntax at the call site (the caller
    /// asserts the error path is never taken). It is carried for fidelity to
    /// the source but never consulted by the checker: a throwing call is
    /// unsupported regardless.
    TryApply {
        /// Name of the callee.
        callee: String,
        /// Argument values.
        args: Vec<ValueId>,
        /// The produced value, if the callee returns one.
        result: Option<ValueId>,
        /// Whether the call site syntactically forces success.
        forced: bool,
    },

    /// A call to a rethrowing callee (one that propagates the throwing-ness of
    /// an argument closure).
    RethrowApply {
        /// Name of the callee.
        callee: String,
        /// Argument values.
        args: Vec<ValueId>,
        /// The produced value, if the callee returns one.
        result: Option<ValueId>,
    },

    /// Opens a coroutine-style in-place access to a property.
    ///
    /// Must be closed by a matching [`InstKind::EndAccess`] within the same
    /// basic block; the pair is classified as one coroutine call.
    BeginAccess {
        /// The aggregate type owning the accessed property.
        aggregate: TypeId,
        /// Name of the accessed property.
        member: String,
        /// The value naming this access (consumed by the matching end).
        result: ValueId,
    },

    /// Closes a coroutine-style in-place access.
    EndAccess {
        /// The value produced by the matching [`InstKind::BeginAccess`].
        begin: ValueId,
    },

    /// A get/set/modify accessor call on a wrapped or projected property.
    Accessor(AccessorCall),

    /// Explicitly excludes a value from differentiation.
    ///
    /// The produced value is treated as constant with respect to the
    /// differentiation request, so downstream arithmetic over it is supported
    /// even when the operand was not differentiable.
    WithoutDerivative {
        /// The excluded value.
        operand: ValueId,
        /// The produced (excluded) value.
        result: ValueId,
    },
}

/// A single instruction: a kind plus its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// What the instruction does.
    pub kind: InstKind,
    /// Where it came from.
    pub loc: SourceLoc,
}

impl Instruction {
    /// Creates a new instruction.
    #[must_use]
    pub const fn new(kind: InstKind, loc: SourceLoc) -> Self {
        Self { kind, loc }
    }

    /// Returns the value produced by this instruction, if any.
    #[must_use]
    pub fn result(&self) -> Option<ValueId> {
        match &self.kind {
            InstKind::Const { result }
            | InstKind::Unary { result, .. }
            | InstKind::Binary { result, .. }
            | InstKind::BeginAccess { result, .. }
            | InstKind::WithoutDerivative { result, .. } => Some(*result),
            InstKind::Apply { result, .. }
            | InstKind::TryApply { result, .. }
            | InstKind::RethrowApply { result, .. } => *result,
            InstKind::Accessor(call) => Some(call.result),
            InstKind::EndAccess { .. } => None,
        }
    }

    /// Returns the values read by this instruction.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match &self.kind {
            InstKind::Const { .. } | InstKind::BeginAccess { .. } => Vec::new(),
            InstKind::Unary { operand, .. } | InstKind::WithoutDerivative { operand, .. } => {
                vec![*operand]
            }
            InstKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Apply { args, .. }
            | InstKind::TryApply { args, .. }
            | InstKind::RethrowApply { args, .. } => args.clone(),
            InstKind::EndAccess { begin } => vec![*begin],
            InstKind::Accessor(call) => call.base.into_iter().collect(),
        }
    }

    /// Returns `true` if this instruction is any flavor of call.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Apply { .. }
                | InstKind::TryApply { .. }
                | InstKind::RethrowApply { .. }
                | InstKind::BeginAccess { .. }
                | InstKind::EndAccess { .. }
                | InstKind::Accessor(_)
        )
    }
}

/// Block terminators.
///
/// Exactly one closes every basic block. Successor edges of the control-flow
/// graph are derived from these via [`successors`](Self::successors).
#[derive(Debug, Clone, PartialEq, Eq, EnumIs)]
pub enum Terminator {
    /// Unconditional branch.
    Branch {
        /// The successor block.
        target: BlockId,
    },

    /// Two-way conditional branch.
    CondBranch {
        /// The branch condition.
        condition: ValueId,
        /// Successor when the condition holds.
        true_target: BlockId,
        /// Successor when it does not.
        false_target: BlockId,
    },

    /// Multi-way branch over an integer operand.
    ///
    /// Present in the model so the checker can recognize and reject it; the
    /// differentiation transform can only invert two-way branches.
    Switch {
        /// The scrutinee.
        operand: ValueId,
        /// `(case value, target)` pairs.
        targets: Vec<(i64, BlockId)>,
        /// Fallback target.
        default: BlockId,
    },

    /// Function return.
    Return {
        /// The returned value, if the function produces one.
        value: Option<ValueId>,
    },

    /// The function falls off the end without producing a result on this path.
    Unreachable,
}

impl Terminator {
    /// Returns the successor blocks of this terminator in branch order.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch { target } => vec![*target],
            Terminator::CondBranch {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            Terminator::Switch {
                targets, default, ..
            } => {
                let mut succs: Vec<BlockId> = targets.iter().map(|(_, t)| *t).collect();
                succs.push(*default);
                succs
            }
            Terminator::Return { .. } | Terminator::Unreachable => Vec::new(),
        }
    }
}
