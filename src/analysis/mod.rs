//! Differentiability analysis passes.
//!
//! This module contains the whole-function reasoning: control-flow shape
//! classification, call-site categorization, accessor chain resolution, and
//! the analyzer that orchestrates them into a per-function verdict.
//!
//! # Architecture
//!
//! - [`cfg`] - classifies the function's control-flow shape
//! - [`callsite`] - categorizes every call instruction
//! - [`accessor`] - resolves chained wrapped/projected-value accesses
//! - [`analyzer`] - runs the above and accumulates [`Finding`]s
//!
//! The passes communicate through [`Finding`] values: first-class analysis
//! results, not errors. A finding pinpoints one independent reason a function
//! cannot be differentiated; the diagnostic chain builder turns findings into
//! user-facing chains.
//!
//! # Determinism
//!
//! Each pass visits blocks and instructions in source order and findings are
//! sorted by source location before chains are built, so repeated runs of the
//! checker over an unchanged function produce bit-identical output.

pub mod accessor;
pub mod analyzer;
pub mod callsite;
pub mod cfg;

use std::fmt;

use strum::EnumIter;

use crate::ir::SourceLoc;

pub use accessor::{AccessorChain, ChainOutcome};
pub use analyzer::{AnalysisState, DifferentiabilityAnalyzer};
pub use callsite::{classify_call_sites, CallCategory, ClassifiedCall};
pub use cfg::{classify_control_flow, CfgClassification, CfgShape};

/// The coarse classes of analysis findings.
///
/// Every [`FindingKind`] maps to exactly one class; the classes mirror the
/// checker's error taxonomy and are convenient for filtering in tests and
/// tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum FindingClass {
    /// Loops, unstructured or multi-way branches, missing returns.
    UnsupportedControlFlow,
    /// Throwing, rethrowing, and coroutine calls.
    UnsupportedCall,
    /// Accessor chains whose leaf has no tangent-structure member.
    UnsupportedAccessorChain,
    /// Arithmetic over a non-differentiable intermediate result.
    UnsupportedIntermediateUse,
}

/// One specific reason a construct cannot be differentiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingKind {
    /// The control-flow graph contains a back-edge.
    Loop,
    /// A multi-way branch (switch) beyond the two-arm conditional form.
    MultiWayBranch,
    /// A two-way branch whose arms do not rejoin at a single merge block.
    UnstructuredBranch,
    /// A path reaches a block that terminates without returning a result.
    MissingReturn,
    /// A call to a throwing callee.
    ThrowingCall,
    /// A call to a rethrowing callee.
    RethrowingCall,
    /// A coroutine-style begin/end access pair.
    CoroutineCall,
    /// An accessor chain whose leaf property is absent from the enclosing
    /// aggregate's tangent structure.
    MissingTangentMember {
        /// Display name of the enclosing aggregate type.
        aggregate: String,
        /// Name of the missing member.
        member: String,
    },
    /// A numeric operation over a non-differentiable intermediate result.
    NonDifferentiableIntermediate,
}

impl FindingKind {
    /// Returns the coarse class of this finding.
    #[must_use]
    pub const fn class(&self) -> FindingClass {
        match self {
            FindingKind::Loop
            | FindingKind::MultiWayBranch
            | FindingKind::UnstructuredBranch
            | FindingKind::MissingReturn => FindingClass::UnsupportedControlFlow,
            FindingKind::ThrowingCall
            | FindingKind::RethrowingCall
            | FindingKind::CoroutineCall => FindingClass::UnsupportedCall,
            FindingKind::MissingTangentMember { .. } => FindingClass::UnsupportedAccessorChain,
            FindingKind::NonDifferentiableIntermediate => {
                FindingClass::UnsupportedIntermediateUse
            }
        }
    }

    /// Returns the note text for this finding.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            FindingKind::Loop => "loop not supported".to_string(),
            FindingKind::MissingReturn => "missing return for differentiation".to_string(),
            FindingKind::MultiWayBranch
            | FindingKind::UnstructuredBranch
            | FindingKind::ThrowingCall
            | FindingKind::RethrowingCall => {
                "cannot differentiate unsupported control flow".to_string()
            }
            FindingKind::CoroutineCall => {
                "differentiation of coroutine calls is not yet supported".to_string()
            }
            FindingKind::MissingTangentMember { aggregate, member } => format!(
                "property cannot be differentiated because the tangent structure of \
                 '{aggregate}' has no member named '{member}'"
            ),
            FindingKind::NonDifferentiableIntermediate => {
                "cannot differentiate through a non-differentiable result".to_string()
            }
        }
    }
}

/// One independent reason a function cannot be differentiated, located at the
/// offending construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// What was found.
    pub kind: FindingKind,
    /// Where the offending construct is.
    pub loc: SourceLoc,
}

impl Finding {
    /// Creates a new finding.
    #[must_use]
    pub const fn new(kind: FindingKind, loc: SourceLoc) -> Self {
        Self { kind, loc }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind.message(), self.loc)
    }
}
