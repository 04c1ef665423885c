//! Value lattice contract for qualifier refinement.
//!
//! An abstract value represents the analysis's current belief about the
//! qualifiers attached to one trackable expression. Checkers supply the
//! concrete representation; the engine only relies on the operations of a
//! join semilattice.
//!
//! # Lattice Requirements
//!
//! The join must satisfy, with respect to the checker's qualifier ordering:
//!
//! - **Idempotent**: `x.least_upper_bound(x) == x`
//! - **Commutative**: `x.least_upper_bound(y) == y.least_upper_bound(x)`
//! - **Associative**: grouping of repeated joins does not matter
//!
//! and the semilattice must have **finite height**: every strictly
//! increasing chain of values is finite. Finite height is what bounds the
//! number of times any block's pending input can change before the fixpoint
//! loop stabilizes; a lattice that violates it is a defect in the supplied
//! checker, not a condition the engine recovers from.
//!
//! A more specific qualifier sits lower in the join ordering, so joining a
//! refined value with a less precise one loses precision, never gains it.
//!
//! # Example
//!
//! ```rust,ignore
//! use qualflow::AbstractValue;
//!
//! impl AbstractValue for Nullness {
//!     fn least_upper_bound(&self, other: &Self) -> Self {
//!         match (self, other) {
//!             (Nullness::NonNull, Nullness::NonNull) => Nullness::NonNull,
//!             _ => Nullness::Nullable,
//!         }
//!     }
//! }
//! ```

use std::fmt::Debug;

use crate::cfg::{LocalId, Node};

/// Per-expression qualifier information forming a join semilattice.
///
/// The engine is polymorphic over the concrete representation; it only ever
/// calls [`least_upper_bound`](Self::least_upper_bound), equality, and
/// construction through a [`TypeFactory`].
pub trait AbstractValue: Clone + Debug + PartialEq {
    /// Computes the least upper bound of two values.
    ///
    /// The result is the least precise value that safely covers both
    /// inputs; it is used whenever two control flow paths merge.
    #[must_use]
    fn least_upper_bound(&self, other: &Self) -> Self;

    /// Returns the more specific of two values, when one refines the other.
    ///
    /// Used by checker transfer rules when a branch refinement should
    /// override a more general ambient value. Returns `None` when the
    /// values are incomparable; the engine itself never calls this
    /// operation, so the default suits checkers without a refinement rule.
    #[must_use]
    fn most_specific(&self, other: &Self) -> Option<Self> {
        let _ = other;
        None
    }
}

/// A formal parameter of the analyzed body.
///
/// Parameters bind local variable slots; the declared qualifier information
/// for a slot lives in the checker's [`TypeFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// The local variable slot the parameter occupies.
    pub local: LocalId,
    /// The declared parameter name, for diagnostics.
    pub name: String,
}

impl Parameter {
    /// Creates a new parameter description.
    #[must_use]
    pub fn new(local: LocalId, name: impl Into<String>) -> Self {
        Self {
            local,
            name: name.into(),
        }
    }
}

/// The checker-supplied source of declared-type-derived values.
///
/// The factory is the abstraction function of the analysis: given a node or
/// declaration, it produces the abstract value implied by declared types
/// alone, before any flow-sensitive refinement. Transfer rules consult it
/// for every node that has no tracked refinement, and the initial store for
/// a body maps each formal parameter through
/// [`value_for_parameter`](Self::value_for_parameter).
///
/// Implementations must be pure lookups: the engine may call them any
/// number of times in any order.
pub trait TypeFactory {
    /// The abstract value representation this factory produces.
    type Value: AbstractValue;

    /// Returns the declared-type-derived value for a node.
    fn value_for_node(&self, node: &Node) -> Self::Value;

    /// Returns the most refined value derivable from a parameter's
    /// declaration alone.
    ///
    /// No call-site information is consulted; the analysis is
    /// intraprocedural.
    fn value_for_parameter(&self, parameter: &Parameter) -> Self::Value;
}
