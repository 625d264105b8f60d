//! Label-based function construction.
//!
//! [`FunctionBuilder`] is the ergonomic way to produce checker IR: blocks are
//! introduced by string label, branches name their targets by label, and all
//! labels are resolved when [`finish`](FunctionBuilder::finish) assembles and
//! validates the [`Function`]. Value ids are allocated automatically;
//! parameter values occupy ids `0..param_count`.
//!
//! ```rust
//! use gradscope::ir::{DiffRequest, FunctionBuilder, SourceLoc};
//!
//! // fn f(x) = x
//! let mut b = FunctionBuilder::new("f", 1);
//! b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
//! let x = b.param(0);
//! b.ret(Some(x), SourceLoc::new(2, 3));
//! let func = b.finish()?;
//! assert_eq!(func.block_count(), 1);
//! # Ok::<(), gradscope::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    ir::{
        AccessorCall, AccessorKind, BasicBlock, BinaryOp, BlockId, DiffRequest, Function,
        InstKind, Instruction, SourceLoc, Terminator, UnaryOp, ValueId,
    },
    types::TypeId,
    Error, Result,
};

/// A terminator whose targets are still labels.
#[derive(Debug, Clone)]
enum PendingTerminator {
    Branch {
        target: String,
    },
    CondBranch {
        condition: ValueId,
        true_target: String,
        false_target: String,
    },
    Switch {
        operand: ValueId,
        targets: Vec<(i64, String)>,
        default: String,
    },
    Return {
        value: Option<ValueId>,
    },
    Unreachable,
}

#[derive(Debug, Clone)]
struct PendingBlock {
    insts: Vec<Instruction>,
    terminator: Option<(PendingTerminator, SourceLoc)>,
}

/// Builds a [`Function`] incrementally, resolving block labels at the end.
///
/// Emits append to the current block; setting a terminator closes it. Emitting
/// after a terminator (or before any [`block`](Self::block) call) opens a
/// fresh anonymous block. A block left unterminated when
/// [`finish`](Self::finish) runs is closed with an `unreachable` terminator at
/// the location of its last instruction - the fall-through shape the checker
/// reports as a missing return.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    name: String,
    param_count: u16,
    request: Option<DiffRequest>,
    blocks: Vec<PendingBlock>,
    labels: HashMap<String, usize>,
    current: Option<usize>,
    next_value: u32,
}

impl FunctionBuilder {
    /// Creates a builder for a function with `param_count` parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, param_count: u16) -> Self {
        Self {
            name: name.into(),
            param_count,
            request: None,
            blocks: Vec::new(),
            labels: HashMap::new(),
            current: None,
            next_value: u32::from(param_count),
        }
    }

    /// Returns the value id of parameter `index`.
    #[must_use]
    pub const fn param(&self, index: u16) -> ValueId {
        ValueId::new(index as u32)
    }

    /// Sets the differentiation request metadata.
    ///
    /// If never called, [`finish`](Self::finish) uses an empty request located
    /// at line 1, column 1.
    pub fn set_request(&mut self, request: DiffRequest) {
        self.request = Some(request);
    }

    /// Opens a new labelled block and makes it current.
    pub fn block(&mut self, label: impl Into<String>) {
        let index = self.blocks.len();
        self.blocks.push(PendingBlock {
            insts: Vec::new(),
            terminator: None,
        });
        self.labels.insert(label.into(), index);
        self.current = Some(index);
    }

    fn current_block(&mut self) -> &mut PendingBlock {
        if self.current.is_none() {
            let index = self.blocks.len();
            self.blocks.push(PendingBlock {
                insts: Vec::new(),
                terminator: None,
            });
            self.current = Some(index);
        }
        let index = self.current.unwrap();
        &mut self.blocks[index]
    }

    fn fresh_value(&mut self) -> ValueId {
        let id = ValueId::new(self.next_value);
        self.next_value += 1;
        id
    }

    fn emit(&mut self, kind: InstKind, loc: SourceLoc) {
        self.current_block().insts.push(Instruction::new(kind, loc));
    }

    /// Emits a literal/opaque value producer.
    pub fn constant(&mut self, loc: SourceLoc) -> ValueId {
        let result = self.fresh_value();
        self.emit(InstKind::Const { result }, loc);
        result
    }

    /// Emits a unary numeric operation.
    pub fn unary(&mut self, op: UnaryOp, operand: ValueId, loc: SourceLoc) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::Unary {
                op,
                operand,
                result,
            },
            loc,
        );
        result
    }

    /// Emits a binary numeric operation.
    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId, loc: SourceLoc) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::Binary {
                op,
                lhs,
                rhs,
                result,
            },
            loc,
        );
        result
    }

    /// Emits an ordinary call.
    pub fn apply(&mut self, callee: impl Into<String>, args: Vec<ValueId>, loc: SourceLoc) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::Apply {
                callee: callee.into(),
                args,
                result: Some(result),
            },
            loc,
        );
        result
    }

    /// Emits a call to a throwing callee.
    ///
    /// `forced` records forced-unwrap syntax; the checker ignores it.
    pub fn try_apply(
        &mut self,
        callee: impl Into<String>,
        args: Vec<ValueId>,
        forced: bool,
        loc: SourceLoc,
    ) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::TryApply {
                callee: callee.into(),
                args,
                result: Some(result),
                forced,
            },
            loc,
        );
        result
    }

    /// Emits a call to a rethrowing callee.
    pub fn rethrow_apply(
        &mut self,
        callee: impl Into<String>,
        args: Vec<ValueId>,
        loc: SourceLoc,
    ) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::RethrowApply {
                callee: callee.into(),
                args,
                result: Some(result),
            },
            loc,
        );
        result
    }

    /// Opens a coroutine-style in-place access.
    pub fn begin_access(
        &mut self,
        aggregate: TypeId,
        member: impl Into<String>,
        loc: SourceLoc,
    ) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::BeginAccess {
                aggregate,
                member: member.into(),
                result,
            },
            loc,
        );
        result
    }

    /// Closes a coroutine-style in-place access.
    pub fn end_access(&mut self, begin: ValueId, loc: SourceLoc) {
        self.emit(InstKind::EndAccess { begin }, loc);
    }

    /// Emits an accessor call with full control over its shape.
    #[allow(clippy::too_many_arguments)]
    pub fn accessor(
        &mut self,
        kind: AccessorKind,
        aggregate: TypeId,
        member: impl Into<String>,
        storage: TypeId,
        projection: bool,
        base: Option<ValueId>,
        loc: SourceLoc,
    ) -> ValueId {
        let result = self.fresh_value();
        self.emit(
            InstKind::Accessor(AccessorCall {
                kind,
                aggregate,
                member: member.into(),
                storage,
                projection,
                base,
                result,
            }),
            loc,
        );
        result
    }

    /// Emits a wrapped-value read accessor.
    pub fn get(
        &mut self,
        aggregate: TypeId,
        member: impl Into<String>,
        storage: TypeId,
        base: Option<ValueId>,
        loc: SourceLoc,
    ) -> ValueId {
        self.accessor(AccessorKind::Get, aggregate, member, storage, false, base, loc)
    }

    /// Emits a projected-value read accessor.
    pub fn projected_get(
        &mut self,
        aggregate: TypeId,
        member: impl Into<String>,
        storage: TypeId,
        base: Option<ValueId>,
        loc: SourceLoc,
    ) -> ValueId {
        self.accessor(AccessorKind::Get, aggregate, member, storage, true, base, loc)
    }

    /// Emits an explicit exclusion of a value from differentiation.
    pub fn without_derivative(&mut self, operand: ValueId, loc: SourceLoc) -> ValueId {
        let result = self.fresh_value();
        self.emit(InstKind::WithoutDerivative { operand, result }, loc);
        result
    }

    fn terminate(&mut self, terminator: PendingTerminator, loc: SourceLoc) {
        self.current_block().terminator = Some((terminator, loc));
        self.current = None;
    }

    /// Closes the current block with an unconditional branch.
    pub fn br(&mut self, target: impl Into<String>, loc: SourceLoc) {
        self.terminate(
            PendingTerminator::Branch {
                target: target.into(),
            },
            loc,
        );
    }

    /// Closes the current block with a two-way conditional branch.
    pub fn cond_br(
        &mut self,
        condition: ValueId,
        true_target: impl Into<String>,
        false_target: impl Into<String>,
        loc: SourceLoc,
    ) {
        self.terminate(
            PendingTerminator::CondBranch {
                condition,
                true_target: true_target.into(),
                false_target: false_target.into(),
            },
            loc,
        );
    }

    /// Closes the current block with a multi-way branch.
    pub fn switch(
        &mut self,
        operand: ValueId,
        targets: Vec<(i64, String)>,
        default: impl Into<String>,
        loc: SourceLoc,
    ) {
        self.terminate(
            PendingTerminator::Switch {
                operand,
                targets,
                default: default.into(),
            },
            loc,
        );
    }

    /// Closes the current block with a return.
    pub fn ret(&mut self, value: Option<ValueId>, loc: SourceLoc) {
        self.terminate(PendingTerminator::Return { value }, loc);
    }

    /// Closes the current block with an explicit `unreachable`.
    pub fn unreachable(&mut self, loc: SourceLoc) {
        self.terminate(PendingTerminator::Unreachable, loc);
    }

    /// Resolves labels, assembles the blocks, and validates the function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLabel`] if a branch names a label no
    /// [`block`](Self::block) call introduced, or any validation error from
    /// [`Function::new`].
    pub fn finish(self) -> Result<Function> {
        let Self {
            name,
            param_count,
            request,
            blocks,
            labels,
            ..
        } = self;

        let resolve = |label: &str| -> Result<BlockId> {
            labels
                .get(label)
                .map(|&index| BlockId::new(index as u32))
                .ok_or_else(|| Error::UnknownLabel {
                    label: label.to_string(),
                })
        };

        let mut resolved = Vec::with_capacity(blocks.len());
        for pending in blocks {
            let fallthrough_loc = pending
                .insts
                .last()
                .map(|inst| inst.loc)
                .unwrap_or_default();
            let (terminator, term_loc) = match pending.terminator {
                Some((PendingTerminator::Branch { target }, loc)) => (
                    Terminator::Branch {
                        target: resolve(&target)?,
                    },
                    loc,
                ),
                Some((
                    PendingTerminator::CondBranch {
                        condition,
                        true_target,
                        false_target,
                    },
                    loc,
                )) => (
                    Terminator::CondBranch {
                        condition,
                        true_target: resolve(&true_target)?,
                        false_target: resolve(&false_target)?,
                    },
                    loc,
                ),
                Some((
                    PendingTerminator::Switch {
                        operand,
                        targets,
                        default,
                    },
                    loc,
                )) => {
                    let mut cases = Vec::with_capacity(targets.len());
                    for (value, target) in targets {
                        cases.push((value, resolve(&target)?));
                    }
                    (
                        Terminator::Switch {
                            operand,
                            targets: cases,
                            default: resolve(&default)?,
                        },
                        loc,
                    )
                }
                Some((PendingTerminator::Return { value }, loc)) => {
                    (Terminator::Return { value }, loc)
                }
                Some((PendingTerminator::Unreachable, loc)) => (Terminator::Unreachable, loc),
                // Fell off the end without a terminator.
                None => (Terminator::Unreachable, fallthrough_loc),
            };
            resolved.push(BasicBlock::new(pending.insts, terminator, term_loc));
        }

        let request =
            request.unwrap_or_else(|| DiffRequest::new(Vec::new(), SourceLoc::new(1, 1)));
        Function::new(name, param_count, resolved, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_function() {
        let mut b = FunctionBuilder::new("f", 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
        let x = b.param(0);
        b.ret(Some(x), SourceLoc::new(2, 3));

        let func = b.finish().unwrap();
        assert_eq!(func.name(), "f");
        assert_eq!(func.block_count(), 1);
        assert!(func.blocks()[0].terminator().is_return());
    }

    #[test]
    fn test_labelled_diamond() {
        let mut b = FunctionBuilder::new("cond", 2);
        let x = b.param(0);
        let flag = b.param(1);
        b.block("entry");
        b.cond_br(flag, "then", "else", SourceLoc::new(2, 3));
        b.block("then");
        b.br("merge", SourceLoc::new(3, 5));
        b.block("else");
        b.br("merge", SourceLoc::new(5, 5));
        b.block("merge");
        b.ret(Some(x), SourceLoc::new(7, 3));

        let func = b.finish().unwrap();
        assert_eq!(func.block_count(), 4);
        let merge = func.block(BlockId::new(3)).unwrap();
        assert_eq!(merge.predecessors().len(), 2);
    }

    #[test]
    fn test_unknown_label_fails() {
        let mut b = FunctionBuilder::new("broken", 0);
        b.block("entry");
        b.br("nowhere", SourceLoc::new(1, 1));
        assert!(matches!(
            b.finish(),
            Err(Error::UnknownLabel { label }) if label == "nowhere"
        ));
    }

    #[test]
    fn test_unterminated_block_becomes_unreachable() {
        let mut b = FunctionBuilder::new("no_return", 1);
        let x = b.param(0);
        b.binary(BinaryOp::Add, x, x, SourceLoc::new(2, 3));

        let func = b.finish().unwrap();
        assert!(func.blocks()[0].terminator().is_unreachable());
        // The fall-through point is the last instruction's location.
        assert_eq!(func.blocks()[0].terminator_loc(), SourceLoc::new(2, 3));
    }

    #[test]
    fn test_value_ids_allocated_after_params() {
        let mut b = FunctionBuilder::new("vals", 2);
        let c = b.constant(SourceLoc::new(1, 1));
        assert_eq!(c, ValueId::new(2));
        let d = b.constant(SourceLoc::new(1, 2));
        assert_eq!(d, ValueId::new(3));
    }
}
