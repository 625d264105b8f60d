//! Function representation and differentiation request metadata.
//!
//! A [`Function`] is the unit the checker operates on: a validated basic-block
//! graph plus the [`DiffRequest`] describing what is being differentiated and
//! in which nesting context the request was made.
//!
//! # Validation
//!
//! Construction is where malformed input IR fails loudly. A function with no
//! blocks, a terminator targeting a non-existent block, or an unpaired
//! coroutine access is a precondition violation by the upstream producer and is
//! rejected with [`crate::Error`] before any analysis runs. Once constructed, a
//! function is immutable and safe to check from any thread.

use std::collections::HashSet;
use std::fmt;

use crate::{
    ir::{BasicBlock, BlockId, InstKind, SourceLoc, Terminator, ValueId},
    Error, Result,
};

/// One level of differentiation-request nesting.
///
/// When a function requests differentiation of a closure which itself fails,
/// the diagnostic chain carries one context note per enclosing request. Frames
/// describe those enclosing requests, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Name of the enclosing function or closure.
    pub name: String,
    /// Location of the enclosing declaration.
    pub loc: SourceLoc,
}

impl RequestFrame {
    /// Creates a new request frame.
    #[must_use]
    pub fn new(name: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            name: name.into(),
            loc,
        }
    }
}

/// A differentiation request: which parameters are differentiated, where the
/// request was declared, and the enclosing request context.
///
/// The context list is passed by value through nested checks; each nested check
/// receives the outer list extended by one frame, never a shared mutable stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRequest {
    /// Indices of the parameters being differentiated with respect to.
    wrt: Vec<u16>,
    /// The declaration/request site.
    loc: SourceLoc,
    /// Enclosing requests, outermost first. Empty for a top-level request.
    context: Vec<RequestFrame>,
}

impl DiffRequest {
    /// Creates a top-level differentiation request.
    ///
    /// # Arguments
    ///
    /// * `wrt` - Indices of the parameters differentiated with respect to
    /// * `loc` - The declaration site of the request
    #[must_use]
    pub fn new(wrt: Vec<u16>, loc: SourceLoc) -> Self {
        Self {
            wrt,
            loc,
            context: Vec::new(),
        }
    }

    /// Returns this request extended with an enclosing context.
    ///
    /// Frames are ordered outermost first.
    #[must_use]
    pub fn with_context(mut self, context: Vec<RequestFrame>) -> Self {
        self.context = context;
        self
    }

    /// Returns the differentiated parameter indices.
    #[must_use]
    pub fn wrt(&self) -> &[u16] {
        &self.wrt
    }

    /// Returns the declaration site of the request.
    #[must_use]
    pub const fn loc(&self) -> SourceLoc {
        self.loc
    }

    /// Returns the enclosing request frames, outermost first.
    #[must_use]
    pub fn context(&self) -> &[RequestFrame] {
        &self.context
    }
}

/// A function in checker IR: a validated block graph plus its request.
///
/// The entry block is always block 0. Parameter values occupy value ids
/// `0..param_count`.
///
/// # Examples
///
/// ```rust
/// use gradscope::ir::{
///     BasicBlock, DiffRequest, Function, SourceLoc, Terminator, ValueId,
/// };
///
/// // fn f(x) = x
/// let entry = BasicBlock::new(
///     Vec::new(),
///     Terminator::Return { value: Some(ValueId::new(0)) },
///     SourceLoc::new(2, 3),
/// );
/// let func = Function::new(
///     "f",
///     1,
///     vec![entry],
///     DiffRequest::new(vec![0], SourceLoc::new(1, 1)),
/// )?;
/// assert_eq!(func.block_count(), 1);
/// # Ok::<(), gradscope::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Function name (diagnostic identity).
    name: String,
    /// Number of parameters; parameter values are ids `0..param_count`.
    param_count: u16,
    /// All blocks; block 0 is the entry.
    blocks: Vec<BasicBlock>,
    /// The differentiation request this function was checked under.
    request: DiffRequest,
}

impl Function {
    /// Creates a new function, validating the block graph.
    ///
    /// Predecessor back-references are computed here; the block list is
    /// immutable afterwards.
    ///
    /// # Arguments
    ///
    /// * `name` - Function name, used in diagnostics
    /// * `param_count` - Number of parameters
    /// * `blocks` - All basic blocks; block 0 is the entry
    /// * `request` - The differentiation request metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the block list is empty, any terminator targets a
    /// non-existent block, a coroutine begin/end access pair is unmatched
    /// within its block, or any operand reads a value no parameter or
    /// instruction defines. These are precondition violations of the upstream
    /// IR producer, not user diagnostics.
    pub fn new(
        name: impl Into<String>,
        param_count: u16,
        mut blocks: Vec<BasicBlock>,
        request: DiffRequest,
    ) -> Result<Self> {
        let name = name.into();
        if blocks.is_empty() {
            return Err(Error::EmptyFunction { name });
        }

        let block_count = blocks.len();
        for (index, block) in blocks.iter().enumerate() {
            for target in block.successors() {
                if target.index() >= block_count {
                    return Err(Error::DanglingBlock {
                        block: BlockId::new(index as u32),
                        target,
                    });
                }
            }
            validate_access_pairs(block)?;
        }
        validate_value_uses(param_count, &blocks)?;

        // Predecessors, in block order.
        let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); block_count];
        for (index, block) in blocks.iter().enumerate() {
            for target in block.successors() {
                preds[target.index()].push(BlockId::new(index as u32));
            }
        }
        for (block, block_preds) in blocks.iter_mut().zip(preds) {
            for pred in block_preds {
                block.add_predecessor(pred);
            }
        }

        Ok(Self {
            name,
            param_count,
            blocks,
            request,
        })
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of parameters.
    #[must_use]
    pub const fn param_count(&self) -> u16 {
        self.param_count
    }

    /// Returns all blocks in order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Gets a block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the entry block id.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the differentiation request.
    #[must_use]
    pub const fn request(&self) -> &DiffRequest {
        &self.request
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Function '{}' ({} params, {} blocks):",
            self.name,
            self.param_count,
            self.blocks.len()
        )?;
        for (index, block) in self.blocks.iter().enumerate() {
            write!(f, "bb{index}:")?;
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

/// Checks the structural begin/end pairing of coroutine accesses in one block.
fn validate_access_pairs(block: &BasicBlock) -> Result<()> {
    let mut open = Vec::new();
    for inst in block.instructions() {
        match &inst.kind {
            InstKind::BeginAccess { result, .. } => open.push((*result, inst.loc)),
            InstKind::EndAccess { begin } => {
                match open.iter().rposition(|(result, _)| result == begin) {
                    Some(pos) => {
                        open.remove(pos);
                    }
                    None => return Err(Error::UnmatchedEndAccess { loc: inst.loc }),
                }
            }
            _ => {}
        }
    }
    if let Some((_, loc)) = open.first() {
        return Err(Error::UnclosedBeginAccess { loc: *loc });
    }
    Ok(())
}

/// Checks that every value read anywhere is defined by a parameter or an
/// instruction of the same function.
fn validate_value_uses(param_count: u16, blocks: &[BasicBlock]) -> Result<()> {
    let mut defined: HashSet<ValueId> = (0..u32::from(param_count)).map(ValueId::new).collect();
    for block in blocks {
        for inst in block.instructions() {
            if let Some(result) = inst.result() {
                defined.insert(result);
            }
        }
    }

    for block in blocks {
        for inst in block.instructions() {
            for operand in inst.operands() {
                if !defined.contains(&operand) {
                    return Err(Error::UndefinedValue {
                        value: operand,
                        loc: inst.loc,
                    });
                }
            }
        }
        let read = match block.terminator() {
            Terminator::CondBranch { condition, .. } => Some(*condition),
            Terminator::Switch { operand, .. } => Some(*operand),
            Terminator::Return { value } => *value,
            Terminator::Branch { .. } | Terminator::Unreachable => None,
        };
        if let Some(value) = read {
            if !defined.contains(&value) {
                return Err(Error::UndefinedValue {
                    value,
                    loc: block.terminator_loc(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Instruction, Terminator, ValueId},
        types::TypeId,
    };

    fn ret_block(loc: SourceLoc) -> BasicBlock {
        BasicBlock::new(Vec::new(), Terminator::Return { value: None }, loc)
    }

    #[test]
    fn test_empty_function_rejected() {
        let result = Function::new(
            "empty",
            0,
            Vec::new(),
            DiffRequest::new(vec![], SourceLoc::new(1, 1)),
        );
        assert!(matches!(result, Err(Error::EmptyFunction { .. })));
    }

    #[test]
    fn test_dangling_block_rejected() {
        let block = BasicBlock::new(
            Vec::new(),
            Terminator::Branch {
                target: BlockId::new(5),
            },
            SourceLoc::new(1, 1),
        );
        let result = Function::new(
            "dangling",
            0,
            vec![block],
            DiffRequest::new(vec![], SourceLoc::new(1, 1)),
        );
        assert!(matches!(
            result,
            Err(Error::DanglingBlock { target, .. }) if target == BlockId::new(5)
        ));
    }

    #[test]
    fn test_predecessors_computed() {
        // bb0 -> bb1, bb0 -> bb2, bb1 -> bb2
        let bb0 = BasicBlock::new(
            Vec::new(),
            Terminator::CondBranch {
                condition: ValueId::new(0),
                true_target: BlockId::new(1),
                false_target: BlockId::new(2),
            },
            SourceLoc::new(1, 1),
        );
        let bb1 = BasicBlock::new(
            Vec::new(),
            Terminator::Branch {
                target: BlockId::new(2),
            },
            SourceLoc::new(2, 1),
        );
        let bb2 = ret_block(SourceLoc::new(3, 1));

        let func = Function::new(
            "preds",
            1,
            vec![bb0, bb1, bb2],
            DiffRequest::new(vec![0], SourceLoc::new(1, 1)),
        )
        .unwrap();

        assert!(func.block(BlockId::new(0)).unwrap().predecessors().is_empty());
        assert_eq!(
            func.block(BlockId::new(1)).unwrap().predecessors(),
            &[BlockId::new(0)]
        );
        assert_eq!(
            func.block(BlockId::new(2)).unwrap().predecessors(),
            &[BlockId::new(0), BlockId::new(1)]
        );
    }

    #[test]
    fn test_unmatched_end_access_rejected() {
        let insts = vec![Instruction::new(
            InstKind::EndAccess {
                begin: ValueId::new(9),
            },
            SourceLoc::new(2, 3),
        )];
        let block = BasicBlock::new(insts, Terminator::Return { value: None }, SourceLoc::new(3, 1));
        let result = Function::new(
            "stray_end",
            0,
            vec![block],
            DiffRequest::new(vec![], SourceLoc::new(1, 1)),
        );
        assert!(matches!(
            result,
            Err(Error::UnmatchedEndAccess { loc }) if loc == SourceLoc::new(2, 3)
        ));
    }

    #[test]
    fn test_unclosed_begin_access_rejected() {
        let insts = vec![Instruction::new(
            InstKind::BeginAccess {
                aggregate: TypeId::new(0),
                member: "x".to_string(),
                result: ValueId::new(1),
            },
            SourceLoc::new(2, 3),
        )];
        let block = BasicBlock::new(insts, Terminator::Return { value: None }, SourceLoc::new(3, 1));
        let result = Function::new(
            "unclosed",
            0,
            vec![block],
            DiffRequest::new(vec![], SourceLoc::new(1, 1)),
        );
        assert!(matches!(
            result,
            Err(Error::UnclosedBeginAccess { loc }) if loc == SourceLoc::new(2, 3)
        ));
    }

    #[test]
    fn test_matched_access_pair_accepted() {
        let insts = vec![
            Instruction::new(
                InstKind::BeginAccess {
                    aggregate: TypeId::new(0),
                    member: "x".to_string(),
                    result: ValueId::new(1),
                },
                SourceLoc::new(2, 3),
            ),
            Instruction::new(
                InstKind::EndAccess {
                    begin: ValueId::new(1),
                },
                SourceLoc::new(2, 9),
            ),
        ];
        let block = BasicBlock::new(insts, Terminator::Return { value: None }, SourceLoc::new(3, 1));
        assert!(Function::new(
            "paired",
            0,
            vec![block],
            DiffRequest::new(vec![], SourceLoc::new(1, 1)),
        )
        .is_ok());
    }

    #[test]
    fn test_undefined_value_rejected() {
        // Returns a value nothing defines.
        let block = BasicBlock::new(
            Vec::new(),
            Terminator::Return {
                value: Some(ValueId::new(3)),
            },
            SourceLoc::new(2, 1),
        );
        let result = Function::new(
            "undef",
            1,
            vec![block],
            DiffRequest::new(vec![0], SourceLoc::new(1, 1)),
        );
        assert!(matches!(
            result,
            Err(Error::UndefinedValue { value, .. }) if value == ValueId::new(3)
        ));
    }

    #[test]
    fn test_request_context_frames() {
        let request = DiffRequest::new(vec![0], SourceLoc::new(10, 1)).with_context(vec![
            RequestFrame::new("outer", SourceLoc::new(1, 1)),
            RequestFrame::new("middle", SourceLoc::new(5, 1)),
        ]);
        assert_eq!(request.context().len(), 2);
        assert_eq!(request.context()[0].name, "outer");
        assert_eq!(request.loc(), SourceLoc::new(10, 1));
    }
}
