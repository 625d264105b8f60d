//! Type identities and the differentiable-capability oracle.
//!
//! The checker never inspects types itself. Whether a type has a well-defined
//! tangent representation, and which members of an aggregate participate in its
//! synthesized tangent structure, are questions answered by the type-checking
//! collaborator through the [`TangentOracle`] trait. The oracle is injected by
//! reference into every check and queried per access - results are never
//! cached across queries, because generic instantiation can change the answer
//! between two accesses of the same nominal type.
//!
//! [`StaticOracle`] is a table-backed implementation for tests and standalone
//! tools that have the full answer set up front.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Identifies a type in the upstream type system.
///
/// Opaque to the checker; only the oracle can interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// Creates a type id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ty{}", self.0)
    }
}

/// Capability queries supplied by the type-checking collaborator.
///
/// Both queries are pure functions of their arguments and must be safe to call
/// concurrently from parallel function checks (`Sync`). The checker queries
/// them per access and never caches an answer.
pub trait TangentOracle: Sync {
    /// Returns `true` if `ty` satisfies the differentiable capability (has a
    /// well-defined tangent representation).
    fn is_differentiable(&self, ty: TypeId) -> bool;

    /// Returns the member names of `ty`'s synthesized tangent structure.
    ///
    /// Empty for types without a tangent structure.
    fn tangent_members(&self, ty: TypeId) -> Vec<String>;

    /// Returns `true` if `ty`'s tangent structure has a member named `member`.
    ///
    /// The default implementation scans [`tangent_members`](Self::tangent_members);
    /// implementors with indexed storage should override it.
    fn has_tangent_member(&self, ty: TypeId, member: &str) -> bool {
        self.tangent_members(ty).iter().any(|m| m == member)
    }

    /// Returns a display name for `ty`, used in diagnostic messages.
    ///
    /// Defaults to the opaque id rendering (`ty3`).
    fn type_name(&self, ty: TypeId) -> String {
        ty.to_string()
    }
}

/// A table-backed [`TangentOracle`] for tests and standalone tools.
///
/// # Examples
///
/// ```rust
/// use gradscope::types::{StaticOracle, TangentOracle, TypeId};
///
/// let float = TypeId::new(0);
/// let model = TypeId::new(1);
///
/// let oracle = StaticOracle::new()
///     .differentiable(float)
///     .differentiable(model)
///     .member(model, "weight");
///
/// assert!(oracle.is_differentiable(float));
/// assert!(oracle.has_tangent_member(model, "weight"));
/// assert!(!oracle.has_tangent_member(model, "bias"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    differentiable: HashSet<TypeId>,
    members: HashMap<TypeId, BTreeSet<String>>,
    names: HashMap<TypeId, String>,
}

impl StaticOracle {
    /// Creates an oracle with no differentiable types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `ty` as satisfying the differentiable capability.
    #[must_use]
    pub fn differentiable(mut self, ty: TypeId) -> Self {
        self.differentiable.insert(ty);
        self
    }

    /// Adds `member` to `ty`'s tangent structure.
    #[must_use]
    pub fn member(mut self, ty: TypeId, member: impl Into<String>) -> Self {
        self.members.entry(ty).or_default().insert(member.into());
        self
    }

    /// Gives `ty` a display name for diagnostics.
    #[must_use]
    pub fn named(mut self, ty: TypeId, name: impl Into<String>) -> Self {
        self.names.insert(ty, name.into());
        self
    }
}

impl TangentOracle for StaticOracle {
    fn is_differentiable(&self, ty: TypeId) -> bool {
        self.differentiable.contains(&ty)
    }

    fn tangent_members(&self, ty: TypeId) -> Vec<String> {
        self.members
            .get(&ty)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn has_tangent_member(&self, ty: TypeId, member: &str) -> bool {
        self.members.get(&ty).is_some_and(|set| set.contains(member))
    }

    fn type_name(&self, ty: TypeId) -> String {
        self.names
            .get(&ty)
            .cloned()
            .unwrap_or_else(|| ty.to_string())
    }
}
