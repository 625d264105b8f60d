//! Basic block representation.
//!
//! A [`BasicBlock`] is an ordered instruction sequence closed by exactly one
//! terminator. Blocks hold predecessor back-references (computed when the
//! owning [`crate::ir::Function`] is constructed); successors are derived from
//! the terminator and never stored, so the two can not disagree.

use std::fmt;

use crate::ir::{BlockId, Instruction, SourceLoc, Terminator};

/// A basic block: straight-line instructions plus one terminator.
///
/// Blocks are owned by their [`crate::ir::Function`]; predecessor/successor
/// references are plain [`BlockId`]s into the owning function's block list.
///
/// # Examples
///
/// ```rust
/// use gradscope::ir::{BasicBlock, SourceLoc, Terminator};
///
/// let block = BasicBlock::new(Vec::new(), Terminator::Return { value: None }, SourceLoc::new(2, 1));
/// assert!(block.instructions().is_empty());
/// assert!(block.terminator().is_return());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Instructions in execution order.
    insts: Vec<Instruction>,

    /// The closing terminator.
    terminator: Terminator,

    /// Source location of the terminator.
    term_loc: SourceLoc,

    /// Predecessor blocks, filled in by `Function::new`.
    preds: Vec<BlockId>,
}

impl BasicBlock {
    /// Creates a new basic block.
    ///
    /// # Arguments
    ///
    /// * `insts` - Instructions in execution order
    /// * `terminator` - The closing terminator
    /// * `term_loc` - Source location of the terminator
    #[must_use]
    pub fn new(insts: Vec<Instruction>, terminator: Terminator, term_loc: SourceLoc) -> Self {
        Self {
            insts,
            terminator,
            term_loc,
            preds: Vec::new(),
        }
    }

    /// Returns the instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.insts
    }

    /// Returns the terminator.
    #[must_use]
    pub const fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Returns the source location of the terminator.
    #[must_use]
    pub const fn terminator_loc(&self) -> SourceLoc {
        self.term_loc
    }

    /// Returns the predecessor blocks.
    ///
    /// Empty until the block is adopted by a [`crate::ir::Function`].
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    /// Returns the successor blocks in branch order.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator.successors()
    }

    pub(crate) fn add_predecessor(&mut self, pred: BlockId) {
        if !self.preds.contains(&pred) {
            self.preds.push(pred);
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} instruction(s), terminator {:?} at {}",
            self.insts.len(),
            self.terminator,
            self.term_loc
        )
    }
}
