//! # gradscope Prelude
//!
//! A convenient prelude for the most commonly used types when driving the
//! checker: build IR, supply an oracle, check, inspect the verdict.

/// The error type for precondition violations
pub use crate::Error;

/// The result type used throughout gradscope
pub use crate::Result;

/// Checking entry points and verdicts
pub use crate::{check_function, check_module, FunctionVerdict, ModuleReport, Verdict};

/// IR construction and inspection
pub use crate::ir::{
    AccessorKind, BasicBlock, BinaryOp, BlockId, DiffRequest, Function, FunctionBuilder,
    InstKind, Instruction, RequestFrame, SourceLoc, Terminator, UnaryOp, ValueId,
};

/// Capability oracle
pub use crate::types::{StaticOracle, TangentOracle, TypeId};

/// Diagnostic output
pub use crate::diagnostics::{Diagnostic, DiagnosticChain, DiagnosticSink, Severity};

/// Analysis findings, for tooling that inspects raw results
pub use crate::analysis::{Finding, FindingClass, FindingKind};
