//! The per-function differentiability analyzer.
//!
//! Orchestrates the three classification passes into one verdict's worth of
//! findings. The analyzer is a small state machine:
//!
//! ```text
//! Pending -> Classifying -> Supported      (no findings)
//!                        \-> Unsupported   (one finding per independent cause)
//! ```
//!
//! Control-flow shape is classified first; a structural finding ends the pass
//! immediately, because call-site and accessor analysis of an already
//! malformed shape would only produce noise. Otherwise a single source-order
//! pass accumulates every independent finding - the engine does not stop at
//! the first failure, so all of a function's problems are reported together.
//!
//! # Activity rule
//!
//! A value read through a non-differentiable projection is tolerated until it
//! participates in arithmetic: any unary or binary numeric operation over such
//! a value requires a tangent that does not exist and becomes a finding.
//! Read-only pass-through (returning the value, branching on it) is safe, and
//! `without_derivative` explicitly launders the value back into safety. The
//! result of an already-flagged operation is not re-tainted - one unsupported
//! requirement produces one finding, not a cascade.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::{
    analysis::{
        accessor::{collect_chains, ChainOutcome},
        callsite::classify_call_sites,
        cfg::{classify_control_flow, CfgClassification},
        CallCategory, Finding, FindingKind,
    },
    ir::{Function, InstKind, ValueId},
    types::TangentOracle,
};

/// Analyzer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    /// Created, not yet run.
    Pending,
    /// Mid-pass.
    Classifying,
    /// Terminal: every construct is supported.
    Supported,
    /// Terminal: at least one finding.
    Unsupported,
}

/// Analyzes one function's differentiability.
///
/// Created fresh per function check; holds no state that crosses function
/// boundaries. The oracle is borrowed and queried per access.
///
/// # Examples
///
/// ```rust
/// use gradscope::analysis::{AnalysisState, DifferentiabilityAnalyzer};
/// use gradscope::ir::{DiffRequest, FunctionBuilder, SourceLoc};
/// use gradscope::types::StaticOracle;
///
/// let mut b = FunctionBuilder::new("f", 1);
/// b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
/// let x = b.param(0);
/// b.ret(Some(x), SourceLoc::new(2, 3));
/// let func = b.finish()?;
///
/// let oracle = StaticOracle::new();
/// let mut analyzer = DifferentiabilityAnalyzer::new(&func, &oracle);
/// analyzer.run();
/// assert_eq!(analyzer.state(), AnalysisState::Supported);
/// assert!(analyzer.findings().is_empty());
/// # Ok::<(), gradscope::Error>(())
/// ```
#[derive(Debug)]
pub struct DifferentiabilityAnalyzer<'a, O: TangentOracle + ?Sized> {
    func: &'a Function,
    oracle: &'a O,
    state: AnalysisState,
    findings: Vec<Finding>,
}

impl<'a, O: TangentOracle + ?Sized> DifferentiabilityAnalyzer<'a, O> {
    /// Creates an analyzer in the [`AnalysisState::Pending`] state.
    #[must_use]
    pub const fn new(func: &'a Function, oracle: &'a O) -> Self {
        Self {
            func,
            oracle,
            state: AnalysisState::Pending,
            findings: Vec::new(),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> AnalysisState {
        self.state
    }

    /// Returns the findings accumulated so far, in source order.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Consumes the analyzer, yielding its findings.
    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    /// Runs the analysis to a terminal state.
    ///
    /// Idempotent: running twice leaves state and findings unchanged.
    pub fn run(&mut self) -> &[Finding] {
        if matches!(
            self.state,
            AnalysisState::Supported | AnalysisState::Unsupported
        ) {
            return &self.findings;
        }
        self.state = AnalysisState::Classifying;
        debug!("analyzing differentiability of '{}'", self.func.name());

        match classify_control_flow(self.func) {
            CfgClassification::Unsupported(finding) => {
                // A malformed shape makes the remaining passes meaningless.
                trace!("'{}': structural finding: {finding}", self.func.name());
                self.findings.push(finding);
                self.state = AnalysisState::Unsupported;
                return &self.findings;
            }
            CfgClassification::Supported(shape) => {
                trace!("'{}': control flow is {shape:?}", self.func.name());
            }
        }

        self.classify_body();

        self.findings.sort_by_key(|finding| finding.loc);
        self.state = if self.findings.is_empty() {
            AnalysisState::Supported
        } else {
            AnalysisState::Unsupported
        };
        debug!(
            "'{}': {} finding(s)",
            self.func.name(),
            self.findings.len()
        );
        &self.findings
    }

    /// The accumulating pass: call sites, accessor chains, intermediate uses.
    fn classify_body(&mut self) {
        let chains = collect_chains(self.func);
        let outcomes: HashMap<ValueId, ChainOutcome> = chains
            .iter()
            .map(|chain| (chain.result(), chain.resolve(self.oracle)))
            .collect();

        let mut tainted: HashSet<ValueId> = HashSet::new();

        for block in self.func.blocks() {
            for call in classify_call_sites(block) {
                let kind = match call.category {
                    CallCategory::Throwing => Some(FindingKind::ThrowingCall),
                    CallCategory::Rethrowing => Some(FindingKind::RethrowingCall),
                    CallCategory::Coroutine => Some(FindingKind::CoroutineCall),
                    CallCategory::Ordinary | CallCategory::Accessor => None,
                };
                if let Some(kind) = kind {
                    self.findings.push(Finding::new(kind, call.loc));
                }
            }

            for inst in block.instructions() {
                match &inst.kind {
                    InstKind::Accessor(call) => {
                        // Only chain leaves have a recorded outcome.
                        match outcomes.get(&call.result) {
                            Some(ChainOutcome::Supported) | None => {}
                            Some(ChainOutcome::NonDifferentiableValue) => {
                                tainted.insert(call.result);
                            }
                            Some(ChainOutcome::Unsupported(finding)) => {
                                self.findings.push(finding.clone());
                            }
                        }
                    }
                    InstKind::Unary { operand, .. } => {
                        if tainted.contains(operand) {
                            self.findings.push(Finding::new(
                                FindingKind::NonDifferentiableIntermediate,
                                inst.loc,
                            ));
                        }
                    }
                    InstKind::Binary { lhs, rhs, .. } => {
                        if tainted.contains(lhs) || tainted.contains(rhs) {
                            self.findings.push(Finding::new(
                                FindingKind::NonDifferentiableIntermediate,
                                inst.loc,
                            ));
                        }
                    }
                    // Explicit exclusion: the produced value is safe to use.
                    InstKind::WithoutDerivative { .. } => {}
                    _ => {}
                }
            }
        }
    }
}
