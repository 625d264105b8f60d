//! Accessor chain resolution.
//!
//! Wrapper-typed members are expanded upstream into accessor calls; a nested
//! wrapper produces a chain of them, linked through each access's base value.
//! This pass follows a chain from the root aggregate down to the leaf stored
//! property and decides what the access means for differentiation:
//!
//! - the leaf is represented in the enclosing aggregate's synthesized tangent
//!   structure - the whole chain is an ordinary property read;
//! - the chain reads through a projection whose type has no tangent - the
//!   read itself is fine, but the produced value is non-differentiable and
//!   arithmetic over it becomes an analyzer finding;
//! - the leaf is absent from the tangent structure - the chain is a finding,
//!   located at the final accessor call.
//!
//! The capability oracle is queried per resolution and never cached: generic
//! instantiation can change the answer between two accesses of the same
//! nominal type.

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::{Finding, FindingKind},
    ir::{AccessorCall, Function, InstKind, SourceLoc, ValueId},
    types::TangentOracle,
};

/// One accessor call within a chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainStep<'a> {
    /// The accessor call.
    pub call: &'a AccessorCall,
    /// Its source location.
    pub loc: SourceLoc,
}

/// An ordered accessor path from a root aggregate value to a leaf stored
/// property.
///
/// Chains are built per function check and discarded with the verdict; they
/// never outlive the borrowed function.
#[derive(Debug, Clone)]
pub struct AccessorChain<'a> {
    /// Steps from root to leaf. Never empty.
    steps: Vec<ChainStep<'a>>,
}

/// What resolving a chain against the oracle concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// The leaf participates in the tangent structure; treat the access as an
    /// ordinary property read.
    Supported,
    /// The chain reads through a non-differentiable projection. The read is
    /// tolerated, but the produced value carries no tangent.
    NonDifferentiableValue,
    /// The leaf property is absent from the tangent structure.
    Unsupported(Finding),
}

impl<'a> AccessorChain<'a> {
    /// Returns the steps, root first.
    #[must_use]
    pub fn steps(&self) -> &[ChainStep<'a>] {
        &self.steps
    }

    /// Returns the leaf (final) step.
    #[must_use]
    pub fn leaf(&self) -> &ChainStep<'a> {
        self.steps.last().expect("chains are never empty")
    }

    /// Returns the value the whole chain produces.
    #[must_use]
    pub fn result(&self) -> ValueId {
        self.leaf().call.result
    }

    /// Resolves this chain against the capability oracle.
    #[must_use]
    pub fn resolve<O: TangentOracle + ?Sized>(&self, oracle: &O) -> ChainOutcome {
        // A non-differentiable projection anywhere on the path means the value
        // never reaches the tangent structure; no tangent member is required.
        for step in &self.steps {
            if step.call.projection && !oracle.is_differentiable(step.call.storage) {
                return ChainOutcome::NonDifferentiableValue;
            }
        }

        let leaf = self.leaf();
        if oracle.has_tangent_member(leaf.call.aggregate, &leaf.call.member)
            && oracle.is_differentiable(leaf.call.storage)
        {
            ChainOutcome::Supported
        } else {
            ChainOutcome::Unsupported(Finding::new(
                FindingKind::MissingTangentMember {
                    aggregate: oracle.type_name(leaf.call.aggregate),
                    member: leaf.call.member.clone(),
                },
                leaf.loc,
            ))
        }
    }
}

/// Collects every accessor chain in `func`, in source order of their leaves.
///
/// A chain's leaf is an accessor whose result no other accessor uses as a
/// base; walking the base links back from each leaf yields the root-first
/// step sequence. Two chains may share a prefix when one access is the base
/// of several others.
#[must_use]
pub fn collect_chains(func: &Function) -> Vec<AccessorChain<'_>> {
    let mut accessors: Vec<ChainStep<'_>> = Vec::new();
    for block in func.blocks() {
        for inst in block.instructions() {
            if let InstKind::Accessor(call) = &inst.kind {
                accessors.push(ChainStep {
                    call,
                    loc: inst.loc,
                });
            }
        }
    }

    let by_result: HashMap<ValueId, usize> = accessors
        .iter()
        .enumerate()
        .map(|(index, step)| (step.call.result, index))
        .collect();
    let used_as_base: HashSet<ValueId> = accessors
        .iter()
        .filter_map(|step| step.call.base)
        .collect();

    let mut chains = Vec::new();
    for step in &accessors {
        if used_as_base.contains(&step.call.result) {
            continue;
        }
        // Walk from the leaf back to the root.
        let mut reversed = vec![*step];
        let mut base = step.call.base;
        while let Some(value) = base {
            match by_result.get(&value) {
                Some(&index) => {
                    reversed.push(accessors[index]);
                    base = accessors[index].call.base;
                }
                None => break,
            }
        }
        reversed.reverse();
        chains.push(AccessorChain { steps: reversed });
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DiffRequest, FunctionBuilder, SourceLoc};
    use crate::types::{StaticOracle, TypeId};

    const FLOAT: TypeId = TypeId::new(0);
    const MODEL: TypeId = TypeId::new(1);
    const WRAPPER: TypeId = TypeId::new(2);
    const DIFF_WRAPPER: TypeId = TypeId::new(3);

    fn oracle() -> StaticOracle {
        StaticOracle::new()
            .differentiable(FLOAT)
            .differentiable(MODEL)
            .differentiable(DIFF_WRAPPER)
            .named(MODEL, "Model")
            .member(MODEL, "weight")
    }

    #[test]
    fn test_single_supported_access() {
        let mut b = FunctionBuilder::new("read", 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
        let s = b.param(0);
        let w = b.get(MODEL, "weight", FLOAT, Some(s), SourceLoc::new(2, 3));
        b.ret(Some(w), SourceLoc::new(3, 3));
        let func = b.finish().unwrap();

        let chains = collect_chains(&func);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].steps().len(), 1);
        assert_eq!(chains[0].resolve(&oracle()), ChainOutcome::Supported);
    }

    #[test]
    fn test_leaf_without_tangent_member_is_finding() {
        let mut b = FunctionBuilder::new("read_flag", 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
        let s = b.param(0);
        let leaf_loc = SourceLoc::new(2, 9);
        let v = b.get(MODEL, "flag", FLOAT, Some(s), leaf_loc);
        b.ret(Some(v), SourceLoc::new(3, 3));
        let func = b.finish().unwrap();

        let chains = collect_chains(&func);
        match chains[0].resolve(&oracle()) {
            ChainOutcome::Unsupported(finding) => {
                assert_eq!(finding.loc, leaf_loc);
                assert_eq!(
                    finding.kind,
                    FindingKind::MissingTangentMember {
                        aggregate: "Model".to_string(),
                        member: "flag".to_string(),
                    }
                );
            }
            other => panic!("expected missing-member finding, got {other:?}"),
        }
    }

    #[test]
    fn test_chained_projection_links_to_leaf() {
        // s.$x.value - a differentiable projection, then a wrapped-value read
        // whose member is missing from the tangent structure.
        let mut b = FunctionBuilder::new("chained", 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
        let s = b.param(0);
        let proj = b.projected_get(MODEL, "x", DIFF_WRAPPER, Some(s), SourceLoc::new(2, 3));
        let leaf_loc = SourceLoc::new(2, 12);
        let v = b.get(MODEL, "_x", DIFF_WRAPPER, Some(proj), leaf_loc);
        b.ret(Some(v), SourceLoc::new(3, 3));
        let func = b.finish().unwrap();

        let chains = collect_chains(&func);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].steps().len(), 2);
        assert_eq!(chains[0].result(), v);

        match chains[0].resolve(&oracle()) {
            ChainOutcome::Unsupported(finding) => assert_eq!(finding.loc, leaf_loc),
            other => panic!("expected missing-member finding, got {other:?}"),
        }
    }

    #[test]
    fn test_non_differentiable_projection_taints_instead_of_failing() {
        // s.$y.value - the projection type has no tangent at all, so the read
        // is tolerated and the value is simply non-differentiable.
        let mut b = FunctionBuilder::new("projected", 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
        let s = b.param(0);
        let proj = b.projected_get(MODEL, "y", WRAPPER, Some(s), SourceLoc::new(2, 3));
        let v = b.get(WRAPPER, "value", FLOAT, Some(proj), SourceLoc::new(2, 12));
        b.ret(Some(v), SourceLoc::new(3, 3));
        let func = b.finish().unwrap();

        let chains = collect_chains(&func);
        assert_eq!(
            chains[0].resolve(&oracle()),
            ChainOutcome::NonDifferentiableValue
        );
    }

    #[test]
    fn test_shared_prefix_produces_two_chains() {
        let mut b = FunctionBuilder::new("shared", 1);
        b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
        let s = b.param(0);
        let proj = b.projected_get(MODEL, "x", DIFF_WRAPPER, Some(s), SourceLoc::new(2, 3));
        let a = b.get(MODEL, "_x", DIFF_WRAPPER, Some(proj), SourceLoc::new(3, 3));
        let bb = b.get(MODEL, "_x", DIFF_WRAPPER, Some(proj), SourceLoc::new(4, 3));
        let sum = b.binary(crate::ir::BinaryOp::Add, a, bb, SourceLoc::new(5, 3));
        b.ret(Some(sum), SourceLoc::new(6, 3));
        let func = b.finish().unwrap();

        let chains = collect_chains(&func);
        assert_eq!(chains.len(), 2);
        assert!(chains.iter().all(|chain| chain.steps().len() == 2));
    }
}
