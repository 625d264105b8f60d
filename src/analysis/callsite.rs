//! Call-site categorization.
//!
//! Every call instruction gets exactly one [`CallCategory`], because each
//! category has different differentiability rules. The rules, in priority
//! order:
//!
//! 1. A throwing callee makes the site [`CallCategory::Throwing`] - always
//!    unsupported, regardless of forced-unwrap syntax at the call site.
//! 2. A rethrowing callee makes the site [`CallCategory::Rethrowing`] - always
//!    unsupported, even when every argument closure passed happens not to
//!    throw. The checker is conservative and does not inline-analyze argument
//!    closures.
//! 3. A begin/end access pair is one [`CallCategory::Coroutine`] call,
//!    located at the `begin_access`.
//! 4. Accessor calls are [`CallCategory::Accessor`] and deferred to the chain
//!    resolver - never unilaterally rejected here.
//! 5. Everything else is [`CallCategory::Ordinary`] and supported; whether the
//!    callee itself is differentiable is a separate check owned by the caller
//!    of this engine.

use strum::EnumIs;

use crate::ir::{BasicBlock, InstKind, SourceLoc};

/// Category of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum CallCategory {
    /// A plain, non-throwing call.
    Ordinary,
    /// A call to a throwing callee.
    Throwing,
    /// A call to a rethrowing callee.
    Rethrowing,
    /// A coroutine-style begin/end access pair.
    Coroutine,
    /// A get/set/modify accessor call.
    Accessor,
}

impl CallCategory {
    /// Categorizes a single instruction, if it is a call site.
    ///
    /// `end_access` yields `None`: it belongs to the pair already categorized
    /// at its `begin_access`.
    #[must_use]
    pub const fn of(kind: &InstKind) -> Option<CallCategory> {
        match kind {
            InstKind::Apply { .. } => Some(CallCategory::Ordinary),
            InstKind::TryApply { .. } => Some(CallCategory::Throwing),
            InstKind::RethrowApply { .. } => Some(CallCategory::Rethrowing),
            InstKind::BeginAccess { .. } => Some(CallCategory::Coroutine),
            InstKind::Accessor(_) => Some(CallCategory::Accessor),
            InstKind::EndAccess { .. }
            | InstKind::Const { .. }
            | InstKind::Unary { .. }
            | InstKind::Binary { .. }
            | InstKind::WithoutDerivative { .. } => None,
        }
    }

    /// Returns `true` if this category is rejected outright, without any
    /// further resolution.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(
            self,
            CallCategory::Throwing | CallCategory::Rethrowing | CallCategory::Coroutine
        )
    }
}

/// One categorized call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedCall {
    /// The assigned category.
    pub category: CallCategory,
    /// Location of the call (the `begin_access` for coroutine pairs).
    pub loc: SourceLoc,
}

/// Categorizes every call site in `block`, in source order.
///
/// Begin/end access pairs produce exactly one [`CallCategory::Coroutine`]
/// entry each; the pairing itself was validated when the owning function was
/// constructed.
#[must_use]
pub fn classify_call_sites(block: &BasicBlock) -> Vec<ClassifiedCall> {
    block
        .instructions()
        .iter()
        .filter_map(|inst| {
            CallCategory::of(&inst.kind).map(|category| ClassifiedCall {
                category,
                loc: inst.loc,
            })
        })
        .collect()
}
