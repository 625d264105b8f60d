use thiserror::Error;

use crate::ir::{BlockId, SourceLoc, ValueId};

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant represents a precondition violation by the upstream IR producer: the
/// function graph handed to the checker was malformed before analysis began. These are
/// programming errors in the collaborator, not user diagnostics - a function that merely
/// cannot be differentiated is reported through [`crate::Verdict::NotDifferentiable`],
/// never through this type.
///
/// # Examples
///
/// ```rust
/// use gradscope::{Error, ir::{FunctionBuilder, SourceLoc}};
///
/// let mut builder = FunctionBuilder::new("broken", 0);
/// builder.block("entry");
/// builder.br("nowhere", SourceLoc::new(1, 1));
///
/// match builder.finish() {
///     Err(Error::UnknownLabel { label }) => assert_eq!(label, "nowhere"),
///     other => panic!("expected an unknown label error, got {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The function has no basic blocks.
    ///
    /// Every function must have at least an entry block; an empty block list
    /// cannot be analyzed.
    #[error("Function '{name}' has no basic blocks")]
    EmptyFunction {
        /// Name of the offending function.
        name: String,
    },

    /// A terminator references a basic block that does not exist.
    ///
    /// Branch targets must index into the function's own block list. A dangling
    /// reference means the upstream producer emitted an inconsistent graph.
    #[error("Block {block} branches to non-existent block {target}")]
    DanglingBlock {
        /// The block whose terminator is malformed.
        block: BlockId,
        /// The out-of-range target.
        target: BlockId,
    },

    /// An `end_access` instruction has no matching `begin_access` in its block.
    ///
    /// Coroutine-style access pairs must be opened and closed within a single
    /// basic block; a stray `end_access` indicates malformed lowering.
    #[error("end_access at {loc} has no matching begin_access in its block")]
    UnmatchedEndAccess {
        /// Location of the stray `end_access`.
        loc: SourceLoc,
    },

    /// A `begin_access` instruction is never closed within its block.
    ///
    /// The structural begin/end pairing is what lets the checker recognize
    /// coroutine accesses; an unclosed access indicates malformed lowering.
    #[error("begin_access at {loc} is never closed by an end_access")]
    UnclosedBeginAccess {
        /// Location of the unclosed `begin_access`.
        loc: SourceLoc,
    },

    /// An instruction or terminator reads a value no parameter or instruction
    /// defines.
    ///
    /// Value ids must be parameter ids or results of instructions within the
    /// same function; anything else is an inconsistent graph.
    #[error("Undefined value {value} read at {loc}")]
    UndefinedValue {
        /// The unknown value id.
        value: ValueId,
        /// Location of the reading instruction or terminator.
        loc: SourceLoc,
    },

    /// A builder label was referenced but never defined.
    ///
    /// Returned by [`crate::ir::FunctionBuilder::finish`] when a branch names a
    /// block label that no `block(..)` call introduced.
    #[error("Branch references undefined block label '{label}'")]
    UnknownLabel {
        /// The unresolved label.
        label: String,
    },
}
