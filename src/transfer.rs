//! The transfer protocol: per-node refinement logic and its data carriers.
//!
//! This module defines the contract connecting a block's incoming stores to
//! the per-node refinement logic and capturing its possibly split outgoing
//! stores. Any specific checker implements the [`TransferFunction`] trait;
//! the fixpoint driver handles iteration, merging, and successor routing.
//!
//! # Dispatch
//!
//! [`TransferFunction::visit`] is a provided method that matches
//! exhaustively over the closed [`NodeKind`] set and forwards each kind to a
//! dedicated method. Every per-kind method has a default implementation
//! encoding the baseline propagation rules:
//!
//! - any node with no special logic evaluates to its declared-type-derived
//!   value and passes the store through unchanged,
//! - a local variable read yields the tracked value when one exists,
//! - an assignment performs the strong update for its target, falling back
//!   to conservative invalidation when the target is not trackable,
//! - an assertion yields no value and leaves the store untouched, since the
//!   check may be disabled at runtime and its truth cannot be relied upon.
//!
//! Checker-specific transfer functions override individual methods, most
//! commonly the comparison rules, to refine the then or else store.
//!
//! # Example
//!
//! ```rust,ignore
//! use qualflow::{TransferFunction, TransferInput, TransferResult};
//!
//! struct NullnessTransfer {
//!     factory: NullnessFactory,
//! }
//!
//! impl TransferFunction for NullnessTransfer {
//!     type Value = Nullness;
//!     type Factory = NullnessFactory;
//!
//!     fn factory(&self) -> &Self::Factory {
//!         &self.factory
//!     }
//!
//!     // `x != null` proves x non-null on the then edge.
//!     fn visit_not_equal(
//!         &self,
//!         node: &Node,
//!         lhs: NodeId,
//!         rhs: NodeId,
//!         input: &TransferInput<Nullness>,
//!         cfg: &ControlFlowGraph,
//!     ) -> TransferResult<Nullness> {
//!         // refine the then store, keep the else store as-is
//!         # unimplemented!()
//!     }
//! }
//! ```

use std::collections::HashMap;

use crate::{
    cfg::{
        ControlFlowGraph, ExceptionKind, FieldId, LiteralValue, LocalId, MethodId, Node, NodeId,
        NodeKind,
    },
    lattice::{AbstractValue, Parameter, TypeFactory},
    store::{Store, TrackedExpr},
};

/// Either one regular store, or a then/else pair produced while a condition
/// is still open.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStores<V: AbstractValue> {
    /// A single store, used by all non-branching nodes.
    Regular(Store<V>),
    /// A pair of stores refined under the condition and its negation.
    Conditional {
        /// The store valid when the condition holds.
        then_store: Store<V>,
        /// The store valid when the condition does not hold.
        else_store: Store<V>,
    },
}

impl<V: AbstractValue> FlowStores<V> {
    /// Returns the single regular store, joining the pair if necessary.
    ///
    /// Used whenever a node is processed outside of a still-conditional
    /// context.
    #[must_use]
    pub fn regular_store(&self) -> Store<V> {
        match self {
            FlowStores::Regular(store) => store.clone(),
            FlowStores::Conditional {
                then_store,
                else_store,
            } => then_store.least_upper_bound(else_store),
        }
    }

    /// Returns the store valid when the open condition holds.
    ///
    /// For a regular store this is the store itself.
    #[must_use]
    pub fn then_store(&self) -> &Store<V> {
        match self {
            FlowStores::Regular(store) => store,
            FlowStores::Conditional { then_store, .. } => then_store,
        }
    }

    /// Returns the store valid when the open condition does not hold.
    ///
    /// For a regular store this is the store itself.
    #[must_use]
    pub fn else_store(&self) -> &Store<V> {
        match self {
            FlowStores::Regular(store) => store,
            FlowStores::Conditional { else_store, .. } => else_store,
        }
    }

    /// Returns `true` if this is a then/else pair.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, FlowStores::Conditional { .. })
    }
}

/// The data handed to the transfer function at a node.
///
/// Carries the store state the node executes under, plus the values already
/// computed for earlier nodes of the same block, so a parent expression can
/// look up its sub-expressions through
/// [`value_of_sub_node`](Self::value_of_sub_node).
#[derive(Debug, Clone)]
pub struct TransferInput<V: AbstractValue> {
    stores: FlowStores<V>,
    node_values: HashMap<NodeId, V>,
}

impl<V: AbstractValue> TransferInput<V> {
    /// Creates an input holding a single regular store and no sub-node
    /// values.
    #[must_use]
    pub fn new(store: Store<V>) -> Self {
        Self {
            stores: FlowStores::Regular(store),
            node_values: HashMap::new(),
        }
    }

    /// Returns the single regular store, joining a then/else pair if
    /// necessary.
    #[must_use]
    pub fn regular_store(&self) -> Store<V> {
        self.stores.regular_store()
    }

    /// Returns the store valid when the open condition holds.
    #[must_use]
    pub fn then_store(&self) -> &Store<V> {
        self.stores.then_store()
    }

    /// Returns the store valid when the open condition does not hold.
    #[must_use]
    pub fn else_store(&self) -> &Store<V> {
        self.stores.else_store()
    }

    /// Returns `true` if this input carries a then/else pair.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        self.stores.is_conditional()
    }

    /// Returns the underlying store set.
    #[must_use]
    pub const fn stores(&self) -> &FlowStores<V> {
        &self.stores
    }

    /// Returns the value already computed for an earlier node of the same
    /// block, if any.
    ///
    /// Sub-expressions are visited before their parent, so a parent can
    /// always retrieve its operands here.
    #[must_use]
    pub fn value_of_sub_node(&self, node: NodeId) -> Option<&V> {
        self.node_values.get(&node)
    }

    /// Produces the input for the next node of the block: the result's
    /// outgoing stores, with the visited node's value added to the sub-node
    /// values.
    pub(crate) fn advance(self, node: NodeId, result: &TransferResult<V>) -> Self {
        let mut node_values = self.node_values;
        if let Some(value) = result.value() {
            node_values.insert(node, value.clone());
        }
        Self {
            stores: result.stores().clone(),
            node_values,
        }
    }
}

/// The data produced by the transfer function at a node.
///
/// Carries the node's own value (`None` for value-less nodes such as
/// assertions), one regular or a then/else pair of outgoing stores, and
/// zero or more exceptional outgoing stores keyed by error category.
#[derive(Debug, Clone)]
pub struct TransferResult<V: AbstractValue> {
    value: Option<V>,
    stores: FlowStores<V>,
    exceptional: Vec<(ExceptionKind, Store<V>)>,
}

impl<V: AbstractValue> TransferResult<V> {
    /// Creates a result with one regular outgoing store.
    #[must_use]
    pub fn regular(value: Option<V>, store: Store<V>) -> Self {
        Self {
            value,
            stores: FlowStores::Regular(store),
            exceptional: Vec::new(),
        }
    }

    /// Creates a result with a then/else store pair.
    ///
    /// Only comparison and boolean nodes intended to feed a conditional
    /// terminator produce conditional results.
    #[must_use]
    pub fn conditional(value: Option<V>, then_store: Store<V>, else_store: Store<V>) -> Self {
        Self {
            value,
            stores: FlowStores::Conditional {
                then_store,
                else_store,
            },
            exceptional: Vec::new(),
        }
    }

    /// Attaches an exceptional outgoing store for one error category.
    ///
    /// The store should start from the regular incoming store, since the
    /// exact state at the point of the raised error cannot be precisely
    /// known, and may then be narrowed with whatever is certain about the
    /// raised condition. A failed null check, for example, implies the
    /// checked value is in fact absent on that path.
    #[must_use]
    pub fn with_exceptional(mut self, kind: ExceptionKind, store: Store<V>) -> Self {
        self.exceptional.push((kind, store));
        self
    }

    /// Returns the node's own value, if it produces one.
    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Returns the outgoing store set.
    #[must_use]
    pub const fn stores(&self) -> &FlowStores<V> {
        &self.stores
    }

    /// Returns the single regular outgoing store, joining a pair if
    /// necessary.
    #[must_use]
    pub fn regular_store(&self) -> Store<V> {
        self.stores.regular_store()
    }

    /// Returns the exceptional outgoing stores, keyed by error category.
    #[must_use]
    pub fn exceptional_stores(&self) -> &[(ExceptionKind, Store<V>)] {
        &self.exceptional
    }
}

/// Per-node refinement logic, dispatched over the closed node kind set.
///
/// The provided [`visit`](Self::visit) method performs the exhaustive
/// dispatch; the per-kind methods carry the baseline propagation rules and
/// are individually overridable. A transfer function must be a pure
/// function of the node and its input: it may consult its [`TypeFactory`]
/// for declared-type lookups but must not carry mutable state between
/// visits, since the driver replays blocks until the fixpoint stabilizes.
pub trait TransferFunction {
    /// The abstract value representation of this checker.
    type Value: AbstractValue;
    /// The checker's source of declared-type-derived values.
    type Factory: TypeFactory<Value = Self::Value>;

    /// Returns the checker's type factory.
    fn factory(&self) -> &Self::Factory;

    /// Builds the initial store for a body from its formal parameters.
    ///
    /// Each parameter maps to the most refined information derivable purely
    /// from its declaration. Fields and other locations start at their
    /// declared types by omission.
    fn initial_store(&self, parameters: &[Parameter]) -> Store<Self::Value> {
        let mut store = Store::empty();
        for parameter in parameters {
            store.insert(
                TrackedExpr::Local(parameter.local),
                self.factory().value_for_parameter(parameter),
            );
        }
        store
    }

    /// Visits one node, producing its transfer result.
    ///
    /// This is the single dispatch point over node kinds. Checkers normally
    /// leave it alone and override the per-kind methods instead.
    fn visit(
        &self,
        node: &Node,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        match node.kind() {
            NodeKind::LocalRead(local) => self.visit_local_read(node, *local, input, cfg),
            NodeKind::Receiver => self.visit_receiver(node, input, cfg),
            NodeKind::FieldRead { receiver, field } => {
                self.visit_field_read(node, *receiver, *field, input, cfg)
            }
            NodeKind::Literal(literal) => self.visit_literal(node, literal, input, cfg),
            NodeKind::Assignment { target, value } => {
                self.visit_assignment(node, *target, *value, input, cfg)
            }
            NodeKind::Equal { lhs, rhs } => self.visit_equal(node, *lhs, *rhs, input, cfg),
            NodeKind::NotEqual { lhs, rhs } => self.visit_not_equal(node, *lhs, *rhs, input, cfg),
            NodeKind::Assert { condition } => self.visit_assert(node, *condition, input, cfg),
            NodeKind::Call {
                method,
                receiver,
                args,
                pure,
            } => self.visit_call(node, *method, *receiver, args, *pure, input, cfg),
            NodeKind::Opaque => self.visit_default(node, input, cfg),
        }
    }

    /// Handles any node without special refinement logic.
    ///
    /// The declared-type-derived value is computed and the store passes
    /// through unchanged.
    fn visit_default(
        &self,
        node: &Node,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = cfg;
        TransferResult::regular(
            Some(self.factory().value_for_node(node)),
            input.regular_store(),
        )
    }

    /// Handles a local variable read: the tracked value when present, the
    /// declared value otherwise. The store is unchanged.
    fn visit_local_read(
        &self,
        node: &Node,
        local: LocalId,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = cfg;
        let store = input.regular_store();
        let value = store
            .get(&TrackedExpr::Local(local))
            .cloned()
            .unwrap_or_else(|| self.factory().value_for_node(node));
        TransferResult::regular(Some(value), store)
    }

    /// Handles a read of the receiver, analogous to a local read.
    fn visit_receiver(
        &self,
        node: &Node,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = cfg;
        let store = input.regular_store();
        let value = store
            .get(&TrackedExpr::Receiver)
            .cloned()
            .unwrap_or_else(|| self.factory().value_for_node(node));
        TransferResult::regular(Some(value), store)
    }

    /// Handles a field read: the tracked value for the access expression
    /// when present, the declared value otherwise.
    ///
    /// The read can raise on an absent receiver, so an exceptional store
    /// seeded from the incoming state is attached for that category.
    /// Checkers that can narrow the failing receiver override this.
    fn visit_field_read(
        &self,
        node: &Node,
        receiver: NodeId,
        field: FieldId,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = (receiver, field);
        let store = input.regular_store();
        let value = TrackedExpr::from_node(cfg, node.id())
            .and_then(|key| store.get(&key).cloned())
            .unwrap_or_else(|| self.factory().value_for_node(node));
        let exceptional = store.clone();
        TransferResult::regular(Some(value), store)
            .with_exceptional(ExceptionKind::NullDereference, exceptional)
    }

    /// Handles a literal: the declared-type-derived value, store unchanged.
    fn visit_literal(
        &self,
        node: &Node,
        literal: &LiteralValue,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = (literal, cfg);
        TransferResult::regular(
            Some(self.factory().value_for_node(node)),
            input.regular_store(),
        )
    }

    /// Handles an assignment: the result value is the already-computed
    /// value of the right-hand side, and the store receives the strong
    /// update for the target when it is trackable, or conservative
    /// invalidation when it is not.
    fn visit_assignment(
        &self,
        node: &Node,
        target: NodeId,
        value: NodeId,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = node;
        let rhs_value = input.value_of_sub_node(value).cloned();
        let mut store = input.regular_store();
        match TrackedExpr::from_node(cfg, target) {
            Some(key) => store.update_for_assignment(key, rhs_value.clone()),
            None => store.update_for_unknown_assignment(),
        }
        TransferResult::regular(rhs_value, store)
    }

    /// Handles an equality comparison.
    ///
    /// The default produces a conditional result with two unrefined copies
    /// of the incoming store; checkers refine one side, for example when a
    /// comparison against a sentinel proves something about an operand.
    fn visit_equal(
        &self,
        node: &Node,
        lhs: NodeId,
        rhs: NodeId,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = (lhs, rhs, cfg);
        let store = input.regular_store();
        TransferResult::conditional(
            Some(self.factory().value_for_node(node)),
            store.clone(),
            store,
        )
    }

    /// Handles an inequality comparison, like [`visit_equal`](Self::visit_equal).
    fn visit_not_equal(
        &self,
        node: &Node,
        lhs: NodeId,
        rhs: NodeId,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = (lhs, rhs, cfg);
        let store = input.regular_store();
        TransferResult::conditional(
            Some(self.factory().value_for_node(node)),
            store.clone(),
            store,
        )
    }

    /// Handles an assertion-like check: no value, store unchanged.
    ///
    /// The check may be disabled at runtime, so its truth must not be used
    /// for refinement.
    fn visit_assert(
        &self,
        node: &Node,
        condition: NodeId,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = (node, condition, cfg);
        TransferResult::regular(None, input.regular_store())
    }

    /// Handles a call.
    ///
    /// A pure call yields its tracked result value when one exists and
    /// leaves the store unchanged. An impure call may write through any
    /// reference it can reach, so heap information is conservatively
    /// invalidated.
    fn visit_call(
        &self,
        node: &Node,
        method: MethodId,
        receiver: Option<NodeId>,
        args: &[NodeId],
        pure: bool,
        input: &TransferInput<Self::Value>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Self::Value> {
        let _ = (method, receiver, args);
        let mut store = input.regular_store();
        if pure {
            let value = TrackedExpr::from_node(cfg, node.id())
                .and_then(|key| store.get(&key).cloned())
                .unwrap_or_else(|| self.factory().value_for_node(node));
            TransferResult::regular(Some(value), store)
        } else {
            store.update_for_unknown_assignment();
            TransferResult::regular(Some(self.factory().value_for_node(node)), store)
        }
    }
}
