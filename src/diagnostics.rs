//! Diagnostic chains and their construction.
//!
//! A [`DiagnosticChain`] is the unit of user-visible output: one root error
//! plus supporting notes, ordered from the most specific cause to the most
//! general context. Chains are values, not side effects - the checker collects
//! them into verdicts, and parallel module checks append them to a
//! [`DiagnosticSink`] whose drain order is recovered by sorting, never by
//! relying on emission order.
//!
//! # Chain Layout
//!
//! For a finding inside a (possibly nested) differentiation request:
//!
//! ```text
//! error: function is not differentiable          <- outermost request site
//!   note: <specific construct message>           <- the offending construct
//!   note: when differentiating this function definition   <- innermost decl
//!   ...                                          <- one note per nesting level
//!   note: when differentiating this function definition   <- outermost decl
//! ```
//!
//! Rendering these into terminal output is the reporting collaborator's
//! concern; this module only guarantees content and order.

use std::fmt;

use strum::EnumIs;

use crate::{
    analysis::Finding,
    ir::{DiffRequest, SourceLoc},
};

/// Root error message attached to every chain.
pub const ERROR_NOT_DIFFERENTIABLE: &str = "function is not differentiable";

/// Context note message, one per differentiation-request nesting level.
pub const NOTE_WHEN_DIFFERENTIATING: &str = "when differentiating this function definition";

/// Severity of one diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum Severity {
    /// The root entry of a chain.
    Error,
    /// A supporting note.
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// One located diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error or note.
    pub severity: Severity,
    /// The message text.
    pub message: String,
    /// Where the entry points.
    pub loc: SourceLoc,
}

impl Diagnostic {
    /// Creates an error entry.
    #[must_use]
    pub fn error(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            loc,
        }
    }

    /// Creates a note entry.
    #[must_use]
    pub fn note(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Note,
            message: message.into(),
            loc,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.severity, self.message, self.loc)
    }
}

/// A non-empty, ordered error-plus-notes sequence describing one independent
/// reason a function cannot be differentiated.
///
/// The first entry is always the root error; notes follow from the innermost
/// construct to the outermost request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticChain {
    entries: Vec<Diagnostic>,
}

impl DiagnosticChain {
    /// Creates a chain rooted at `error`.
    #[must_use]
    pub fn new(error: Diagnostic) -> Self {
        debug_assert!(error.severity.is_error());
        Self {
            entries: vec![error],
        }
    }

    /// Appends a note.
    pub fn push_note(&mut self, note: Diagnostic) {
        debug_assert!(note.severity.is_note());
        self.entries.push(note);
    }

    /// Returns all entries, root error first.
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Returns the root error.
    #[must_use]
    pub fn root(&self) -> &Diagnostic {
        &self.entries[0]
    }

    /// Returns the supporting notes, innermost construct first.
    #[must_use]
    pub fn notes(&self) -> &[Diagnostic] {
        &self.entries[1..]
    }

    /// Sort key giving chains a total, deterministic order: the root
    /// (declaration) location first, then the construct location.
    #[must_use]
    pub fn sort_key(&self) -> (SourceLoc, SourceLoc) {
        let construct = self
            .entries
            .get(1)
            .map_or(self.root().loc, |note| note.loc);
        (self.root().loc, construct)
    }
}

impl fmt::Display for DiagnosticChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Builds diagnostic chains for one function's findings.
///
/// The request context is read once at construction and passed by value into
/// every chain - the builder never mutates shared diagnostic state.
#[derive(Debug, Clone)]
pub struct ChainBuilder<'a> {
    request: &'a DiffRequest,
}

impl<'a> ChainBuilder<'a> {
    /// Creates a builder for the given differentiation request.
    #[must_use]
    pub const fn new(request: &'a DiffRequest) -> Self {
        Self { request }
    }

    /// Builds the chain for one finding.
    ///
    /// The root error is placed at the outermost request site; notes run from
    /// the offending construct outwards, one context note per nesting level.
    #[must_use]
    pub fn chain(&self, finding: &Finding) -> DiagnosticChain {
        let outermost = self
            .request
            .context()
            .first()
            .map_or(self.request.loc(), |frame| frame.loc);

        let mut chain =
            DiagnosticChain::new(Diagnostic::error(ERROR_NOT_DIFFERENTIABLE, outermost));
        chain.push_note(Diagnostic::note(finding.kind.message(), finding.loc));
        chain.push_note(Diagnostic::note(
            NOTE_WHEN_DIFFERENTIATING,
            self.request.loc(),
        ));
        for frame in self.request.context().iter().rev() {
            chain.push_note(Diagnostic::note(NOTE_WHEN_DIFFERENTIATING, frame.loc));
        }
        chain
    }

    /// Builds chains for all findings, sorted into their total order.
    #[must_use]
    pub fn chains(&self, findings: &[Finding]) -> Vec<DiagnosticChain> {
        let mut chains: Vec<DiagnosticChain> =
            findings.iter().map(|finding| self.chain(finding)).collect();
        chains.sort_by_key(DiagnosticChain::sort_key);
        chains
    }
}

/// A concurrent, append-only collection of diagnostic chains.
///
/// Parallel function checks append from their worker threads; the total order
/// is recovered on drain by sorting, so emission interleaving never leaks into
/// output. Backed by an append-only concurrent vector.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    chains: boxcar::Vec<DiagnosticChain>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chain. Callable concurrently from multiple threads.
    pub fn push(&self, chain: DiagnosticChain) {
        self.chains.push(chain);
    }

    /// Returns the number of collected chains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.count()
    }

    /// Returns `true` if no chains were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the sink into the total chain order.
    #[must_use]
    pub fn into_sorted(self) -> Vec<DiagnosticChain> {
        let mut chains: Vec<DiagnosticChain> = self.chains.into_iter().collect();
        chains.sort_by_key(DiagnosticChain::sort_key);
        chains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FindingKind;
    use crate::ir::RequestFrame;

    #[test]
    fn test_chain_layout_single_level() {
        let request = DiffRequest::new(vec![0], SourceLoc::new(1, 1));
        let finding = Finding::new(FindingKind::ThrowingCall, SourceLoc::new(3, 3));

        let chain = ChainBuilder::new(&request).chain(&finding);
        let entries = chain.entries();

        assert_eq!(entries.len(), 3);
        assert!(entries[0].severity.is_error());
        assert_eq!(entries[0].message, ERROR_NOT_DIFFERENTIABLE);
        assert_eq!(entries[0].loc, SourceLoc::new(1, 1));
        assert_eq!(
            entries[1].message,
            "cannot differentiate unsupported control flow"
        );
        assert_eq!(entries[1].loc, SourceLoc::new(3, 3));
        assert_eq!(entries[2].message, NOTE_WHEN_DIFFERENTIATING);
        assert_eq!(entries[2].loc, SourceLoc::new(1, 1));
    }

    #[test]
    fn test_chain_layout_nested_request() {
        // outer (1:1) encloses inner closure (5:9); the finding is inside the closure.
        let request = DiffRequest::new(vec![0], SourceLoc::new(5, 9))
            .with_context(vec![RequestFrame::new("outer", SourceLoc::new(1, 1))]);
        let finding = Finding::new(FindingKind::Loop, SourceLoc::new(6, 5));

        let chain = ChainBuilder::new(&request).chain(&finding);
        let entries = chain.entries();

        // error at outermost request, then construct, then contexts inner -> outer.
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].loc, SourceLoc::new(1, 1));
        assert_eq!(entries[1].loc, SourceLoc::new(6, 5));
        assert_eq!(entries[2].loc, SourceLoc::new(5, 9));
        assert_eq!(entries[3].loc, SourceLoc::new(1, 1));
        assert!(entries[3].severity.is_note());
    }

    #[test]
    fn test_chains_sorted_by_construct_location() {
        let request = DiffRequest::new(vec![0], SourceLoc::new(1, 1));
        let findings = vec![
            Finding::new(FindingKind::CoroutineCall, SourceLoc::new(9, 1)),
            Finding::new(FindingKind::ThrowingCall, SourceLoc::new(3, 1)),
        ];

        let chains = ChainBuilder::new(&request).chains(&findings);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].notes()[0].loc, SourceLoc::new(3, 1));
        assert_eq!(chains[1].notes()[0].loc, SourceLoc::new(9, 1));
    }

    #[test]
    fn test_sink_sorts_on_drain() {
        let request_a = DiffRequest::new(vec![], SourceLoc::new(10, 1));
        let request_b = DiffRequest::new(vec![], SourceLoc::new(2, 1));
        let finding = Finding::new(FindingKind::Loop, SourceLoc::new(11, 1));

        let sink = DiagnosticSink::new();
        sink.push(ChainBuilder::new(&request_a).chain(&finding));
        sink.push(ChainBuilder::new(&request_b).chain(&finding));
        assert_eq!(sink.len(), 2);

        let chains = sink.into_sorted();
        assert_eq!(chains[0].root().loc, SourceLoc::new(2, 1));
        assert_eq!(chains[1].root().loc, SourceLoc::new(10, 1));
    }

    #[test]
    fn test_chain_accessors() {
        let request = DiffRequest::new(vec![], SourceLoc::new(1, 1));
        let finding = Finding::new(FindingKind::MissingReturn, SourceLoc::new(4, 1));
        let chain = ChainBuilder::new(&request).chain(&finding);

        assert!(chain.root().severity.is_error());
        assert_eq!(chain.notes().len(), 2);
        assert_eq!(chain.sort_key(), (SourceLoc::new(1, 1), SourceLoc::new(4, 1)));
    }
}
