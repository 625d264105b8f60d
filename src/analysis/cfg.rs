//! Control-flow shape classification.
//!
//! The differentiation transform can only invert two control-flow shapes:
//! straight-line code, and the structured conditional merge (a two-way branch
//! whose arms rejoin at a single block before any further branch). Everything
//! else - loops, multi-way branches, arms that branch again or never rejoin,
//! and paths that fall off the end of the function - is a structural finding.
//!
//! Classification is a single pass: an iterative depth-first traversal finds
//! reachable blocks and back-edges, then each reachable branch has its arms
//! walked to the common merge block. O(blocks + edges).
//!
//! When a function has several independent structural problems, the one
//! earliest in source order is reported; the analyzer stops on it, since
//! call-site and accessor analysis of an already-malformed shape is
//! meaningless.

use crate::{
    analysis::{Finding, FindingKind},
    ir::{BlockId, Function, Terminator},
};

/// A control-flow shape the differentiation transform supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgShape {
    /// No branching at all.
    StraightLine,
    /// Two-way branches only, each rejoining at a single merge block.
    StructuredMerge,
}

/// Result of control-flow classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfgClassification {
    /// The shape is invertible by the transform.
    Supported(CfgShape),
    /// A structural construct the transform cannot handle.
    Unsupported(Finding),
}

/// Classifies the control-flow shape of `func`.
#[must_use]
pub fn classify_control_flow(func: &Function) -> CfgClassification {
    let reachable = Reachability::compute(func);

    let mut candidates: Vec<Finding> = Vec::new();
    if let Some(back_edge) = reachable.first_back_edge {
        let block = func.block(back_edge).expect("traversal yields valid ids");
        candidates.push(Finding::new(FindingKind::Loop, block.terminator_loc()));
    }

    let mut saw_branch = false;
    for (index, block) in func.blocks().iter().enumerate() {
        let id = BlockId::new(index as u32);
        if !reachable.is_reachable(id) {
            continue;
        }
        match block.terminator() {
            Terminator::Unreachable => {
                candidates.push(Finding::new(FindingKind::MissingReturn, block.terminator_loc()));
            }
            Terminator::Switch { .. } => {
                saw_branch = true;
                candidates.push(Finding::new(
                    FindingKind::MultiWayBranch,
                    block.terminator_loc(),
                ));
            }
            Terminator::CondBranch {
                true_target,
                false_target,
                ..
            } => {
                saw_branch = true;
                if !arms_rejoin(func, *true_target, *false_target) {
                    candidates.push(Finding::new(
                        FindingKind::UnstructuredBranch,
                        block.terminator_loc(),
                    ));
                }
            }
            Terminator::Branch { .. } | Terminator::Return { .. } => {}
        }
    }

    // Earliest in source order wins; later findings would be reported against
    // a shape already known to be malformed.
    if let Some(finding) = candidates.into_iter().min_by_key(|f| f.loc) {
        return CfgClassification::Unsupported(finding);
    }

    let shape = if saw_branch {
        CfgShape::StructuredMerge
    } else {
        CfgShape::StraightLine
    };
    CfgClassification::Supported(shape)
}

/// Reachability and back-edge information from one DFS over the block graph.
struct Reachability {
    reachable: Vec<bool>,
    /// The source block of the first back-edge encountered, if any.
    first_back_edge: Option<BlockId>,
}

impl Reachability {
    fn is_reachable(&self, id: BlockId) -> bool {
        self.reachable[id.index()]
    }

    fn compute(func: &Function) -> Self {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let mut color = vec![WHITE; func.block_count()];
        let mut reachable = vec![false; func.block_count()];
        let mut first_back_edge = None;

        // Iterative DFS; a frame is (block, next successor index).
        let mut stack: Vec<(BlockId, usize)> = vec![(func.entry(), 0)];
        color[func.entry().index()] = GRAY;
        reachable[func.entry().index()] = true;

        while let Some(&(block, next)) = stack.last() {
            let successors = func
                .block(block)
                .expect("stack holds valid ids")
                .successors();
            if next < successors.len() {
                stack.last_mut().expect("stack is non-empty").1 += 1;
                let succ = successors[next];
                match color[succ.index()] {
                    WHITE => {
                        color[succ.index()] = GRAY;
                        reachable[succ.index()] = true;
                        stack.push((succ, 0));
                    }
                    GRAY => {
                        // Edge into a block still on the DFS stack.
                        if first_back_edge.is_none() {
                            first_back_edge = Some(block);
                        }
                    }
                    _ => {}
                }
            } else {
                color[block.index()] = BLACK;
                stack.pop();
            }
        }

        Self {
            reachable,
            first_back_edge,
        }
    }
}

/// Walks both arms of a two-way branch and checks they rejoin at a single
/// block before any further branch.
///
/// An arm is a chain of unconditional branches; the walk stops at the first
/// block that does anything else. The branch is structured when some block on
/// one arm's chain also lies on the other's.
fn arms_rejoin(func: &Function, true_target: BlockId, false_target: BlockId) -> bool {
    let limit = func.block_count();
    let true_path = arm_path(func, true_target, limit);
    let false_path = arm_path(func, false_target, limit);
    true_path.iter().any(|block| false_path.contains(block))
}

/// The chain of blocks reached from `start` through unconditional branches,
/// including the block the chain stops at. Bounded by `limit` so cyclic graphs
/// (reported separately as loops) cannot hang the walk.
fn arm_path(func: &Function, start: BlockId, limit: usize) -> Vec<BlockId> {
    let mut path = Vec::new();
    let mut current = start;
    for _ in 0..=limit {
        path.push(current);
        match func.block(current).map(|block| block.terminator()) {
            Some(Terminator::Branch { target }) => current = *target,
            _ => break,
        }
        if path.contains(&current) {
            break;
        }
    }
    path
}
