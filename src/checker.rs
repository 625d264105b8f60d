//! Checking entry points and verdicts.
//!
//! [`check_function`] is the single-function entry point: a pure, synchronous,
//! bounded pass with no suspension and no I/O. [`check_module`] checks
//! independent functions in parallel - they share no mutable state, so the
//! only coordination is the append-only diagnostic sink, whose total order is
//! recovered by sorting after collection.
//!
//! Malformed IR never reaches these functions: it is rejected loudly when the
//! [`Function`] is constructed. By the time a function exists it is checkable,
//! so verdicts are infallible.

use log::debug;
use rayon::prelude::*;

use crate::{
    analysis::DifferentiabilityAnalyzer,
    diagnostics::{ChainBuilder, DiagnosticChain, DiagnosticSink},
    ir::Function,
    types::TangentOracle,
};

/// The outcome of checking one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every construct is supported; the transform may proceed.
    Differentiable,
    /// One diagnostic chain per independent reason the transform cannot
    /// proceed, in source order. Never empty.
    NotDifferentiable(Vec<DiagnosticChain>),
}

impl Verdict {
    /// Returns `true` for [`Verdict::Differentiable`].
    #[must_use]
    pub const fn is_differentiable(&self) -> bool {
        matches!(self, Verdict::Differentiable)
    }

    /// Returns the diagnostic chains; empty for a differentiable function.
    #[must_use]
    pub fn chains(&self) -> &[DiagnosticChain] {
        match self {
            Verdict::Differentiable => &[],
            Verdict::NotDifferentiable(chains) => chains,
        }
    }
}

/// One function's verdict within a module report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionVerdict {
    /// The function's name.
    pub function: String,
    /// Its verdict.
    pub verdict: Verdict,
}

/// The outcome of checking a whole module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    verdicts: Vec<FunctionVerdict>,
    diagnostics: Vec<DiagnosticChain>,
}

impl ModuleReport {
    /// Returns the per-function verdicts, in the input function order.
    #[must_use]
    pub fn verdicts(&self) -> &[FunctionVerdict] {
        &self.verdicts
    }

    /// Returns every collected diagnostic chain in its total sorted order,
    /// independent of how parallel workers interleaved.
    #[must_use]
    pub fn diagnostics(&self) -> &[DiagnosticChain] {
        &self.diagnostics
    }

    /// Returns `true` if every function in the module is differentiable.
    #[must_use]
    pub fn all_differentiable(&self) -> bool {
        self.verdicts.iter().all(|entry| entry.verdict.is_differentiable())
    }
}

/// Checks one function's differentiability.
///
/// Runs the control-flow, call-site, and accessor-chain passes and turns the
/// accumulated findings into located diagnostic chains. A `NotDifferentiable`
/// verdict always carries at least one complete chain; chains are never
/// dropped, even when several independent findings exist.
///
/// # Examples
///
/// ```rust
/// use gradscope::{check_function, ir::{DiffRequest, FunctionBuilder, SourceLoc}};
/// use gradscope::types::StaticOracle;
///
/// // fn f(x) = x
/// let mut b = FunctionBuilder::new("f", 1);
/// b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
/// let x = b.param(0);
/// b.ret(Some(x), SourceLoc::new(2, 3));
/// let func = b.finish()?;
///
/// let verdict = check_function(&func, &StaticOracle::new());
/// assert!(verdict.is_differentiable());
/// # Ok::<(), gradscope::Error>(())
/// ```
#[must_use]
pub fn check_function<O: TangentOracle + ?Sized>(func: &Function, oracle: &O) -> Verdict {
    let mut analyzer = DifferentiabilityAnalyzer::new(func, oracle);
    analyzer.run();
    let findings = analyzer.into_findings();
    if findings.is_empty() {
        return Verdict::Differentiable;
    }
    let chains = ChainBuilder::new(func.request()).chains(&findings);
    debug!(
        "'{}' is not differentiable ({} chain(s))",
        func.name(),
        chains.len()
    );
    Verdict::NotDifferentiable(chains)
}

/// Checks every function of a module, in parallel.
///
/// Functions are independent, so each is checked on its own worker with no
/// shared mutable state; one function's findings never abort its siblings.
/// Verdicts come back in the input order, and the report's diagnostics are
/// drained from the shared sink in sorted order, so output is identical
/// however the workers interleaved.
#[must_use]
pub fn check_module<O: TangentOracle + ?Sized>(funcs: &[Function], oracle: &O) -> ModuleReport {
    let sink = DiagnosticSink::new();
    let verdicts: Vec<FunctionVerdict> = funcs
        .par_iter()
        .map(|func| {
            let verdict = check_function(func, oracle);
            for chain in verdict.chains() {
                sink.push(chain.clone());
            }
            FunctionVerdict {
                function: func.name().to_string(),
                verdict,
            }
        })
        .collect();

    ModuleReport {
        verdicts,
        diagnostics: sink.into_sorted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ERROR_NOT_DIFFERENTIABLE, NOTE_WHEN_DIFFERENTIATING};
    use crate::ir::{DiffRequest, FunctionBuilder, SourceLoc};
    use crate::types::StaticOracle;

    fn identity(name: &str, decl_line: u32) -> Function {
        let mut b = FunctionBuilder::new(name, 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(decl_line, 1)));
        let x = b.param(0);
        b.ret(Some(x), SourceLoc::new(decl_line + 1, 3));
        b.finish().unwrap()
    }

    fn throwing(name: &str, decl_line: u32) -> Function {
        let mut b = FunctionBuilder::new(name, 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(decl_line, 1)));
        let x = b.param(0);
        b.try_apply("throwing", vec![], true, SourceLoc::new(decl_line + 1, 3));
        b.ret(Some(x), SourceLoc::new(decl_line + 2, 3));
        b.finish().unwrap()
    }

    #[test]
    fn test_differentiable_verdict_has_no_chains() {
        let func = identity("f", 1);
        let verdict = check_function(&func, &StaticOracle::new());
        assert!(verdict.is_differentiable());
        assert!(verdict.chains().is_empty());
    }

    #[test]
    fn test_not_differentiable_chain_contents() {
        let func = throwing("g", 1);
        let verdict = check_function(&func, &StaticOracle::new());
        assert!(!verdict.is_differentiable());

        let chains = verdict.chains();
        assert_eq!(chains.len(), 1);
        let entries = chains[0].entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, ERROR_NOT_DIFFERENTIABLE);
        assert_eq!(entries[0].loc, SourceLoc::new(1, 1));
        assert_eq!(
            entries[1].message,
            "cannot differentiate unsupported control flow"
        );
        assert_eq!(entries[1].loc, SourceLoc::new(2, 3));
        assert_eq!(entries[2].message, NOTE_WHEN_DIFFERENTIATING);
        assert_eq!(entries[2].loc, SourceLoc::new(1, 1));
    }

    #[test]
    fn test_module_verdicts_in_input_order() {
        let funcs = vec![identity("a", 1), throwing("b", 10), identity("c", 20)];
        let report = check_module(&funcs, &StaticOracle::new());

        assert_eq!(report.verdicts().len(), 3);
        assert_eq!(report.verdicts()[0].function, "a");
        assert_eq!(report.verdicts()[1].function, "b");
        assert_eq!(report.verdicts()[2].function, "c");
        assert!(!report.all_differentiable());
        assert_eq!(report.diagnostics().len(), 1);
    }

    #[test]
    fn test_one_failure_does_not_abort_siblings() {
        let funcs = vec![throwing("bad", 1), identity("good", 10)];
        let report = check_module(&funcs, &StaticOracle::new());
        assert!(!report.verdicts()[0].verdict.is_differentiable());
        assert!(report.verdicts()[1].verdict.is_differentiable());
    }

    #[test]
    fn test_module_diagnostics_sorted_by_location() {
        // Input order deliberately reversed relative to source order.
        let funcs = vec![throwing("late", 30), throwing("early", 2)];
        let report = check_module(&funcs, &StaticOracle::new());

        let diags = report.diagnostics();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].root().loc, SourceLoc::new(2, 1));
        assert_eq!(diags[1].root().loc, SourceLoc::new(30, 1));
    }
}
