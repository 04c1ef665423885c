//! Node representation for control flow graphs.
//!
//! A node is one elementary evaluated unit inside a basic block: a
//! sub-expression or a simple statement, never a compound control construct.
//! Nodes are immutable once built and owned by their containing block.
//!
//! Node kinds form a closed set (the [`NodeKind`] enum), so a transfer
//! function can dispatch over them with an exhaustive match and the compiler
//! catches newly added kinds at every dispatch site.

use std::fmt;

use bitflags::bitflags;

/// A strongly-typed identifier for nodes within a control flow graph.
///
/// `NodeId` wraps a `usize` index, providing type safety to prevent
/// accidental mixing of node indices with other integer values. Node IDs are
/// assigned sequentially starting from 0 as nodes are added to a graph, so
/// they can be used to index per-node side tables.
///
/// # Thread Safety
///
/// `NodeId` is [`Copy`], [`Send`], and [`Sync`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// Normal usage obtains `NodeId` values from
    /// [`CfgBuilder::push_node`](crate::cfg::CfgBuilder::push_node); this
    /// constructor is primarily intended for tests and side-table indexing.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier of a local variable slot within one analyzed body.
///
/// Formal parameters occupy the first slots, followed by declared locals.
/// The mapping from source names to slots is established by whoever builds
/// the graph; the engine only relies on slot equality.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub(crate) u32);

impl LocalId {
    /// Creates a new local variable identifier.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        LocalId(index)
    }

    /// Returns the raw slot index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// Identifier of a field declaration, unique within one analyzed program.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub(crate) u32);

impl FieldId {
    /// Creates a new field identifier.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        FieldId(index)
    }

    /// Returns the raw field index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({})", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Identifier of a method declaration, unique within one analyzed program.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(pub(crate) u32);

impl MethodId {
    /// Creates a new method identifier.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        MethodId(index)
    }

    /// Returns the raw method index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({})", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// The payload of a literal node.
///
/// Only literal categories the default transfer rules care about are
/// distinguished; everything else can be modeled as [`NodeKind::Opaque`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    /// A string literal.
    String(String),
    /// An integer literal.
    Int(i64),
    /// A boolean literal.
    Bool(bool),
    /// The null / absent-value literal.
    Null,
}

bitflags! {
    /// Auxiliary properties of a node, orthogonal to its kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// The node appears as the target of an assignment.
        const LVALUE = 1;
        /// The node was inserted during graph construction and has no
        /// direct source-code counterpart.
        const SYNTHETIC = 1 << 1;
    }
}

/// The kind of an elementary evaluated unit.
///
/// This is a closed set: the engine's transfer dispatch matches exhaustively
/// over these variants, with [`Opaque`](Self::Opaque) covering every node
/// that has no special refinement logic. Operand references point at earlier
/// nodes of the same block; sub-expressions are always evaluated before
/// their parent, and the [`CfgBuilder`](crate::cfg::CfgBuilder) validates
/// that ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A read of a local variable.
    LocalRead(LocalId),
    /// The receiver value of the analyzed body.
    Receiver,
    /// A read of a field from a receiver expression.
    FieldRead {
        /// The node producing the receiver object.
        receiver: NodeId,
        /// The field being read.
        field: FieldId,
    },
    /// A literal constant.
    Literal(LiteralValue),
    /// An assignment of `value` into `target`.
    Assignment {
        /// The node standing for the assignment target.
        target: NodeId,
        /// The node producing the assigned value.
        value: NodeId,
    },
    /// An equality comparison of two operands.
    Equal {
        /// Left operand.
        lhs: NodeId,
        /// Right operand.
        rhs: NodeId,
    },
    /// An inequality comparison of two operands.
    NotEqual {
        /// Left operand.
        lhs: NodeId,
        /// Right operand.
        rhs: NodeId,
    },
    /// A side-effect-free boolean check that may be disabled at runtime.
    ///
    /// Because the check may be compiled out, its truth cannot be relied
    /// upon for refinement.
    Assert {
        /// The node producing the checked condition.
        condition: NodeId,
    },
    /// A method invocation.
    Call {
        /// The invoked method.
        method: MethodId,
        /// The node producing the receiver, if the method has one.
        receiver: Option<NodeId>,
        /// Nodes producing the arguments, in declaration order.
        args: Vec<NodeId>,
        /// Whether the method is known to be side-effect-free and
        /// deterministic. Results of pure calls are trackable store keys;
        /// impure calls conservatively invalidate heap information.
        pure: bool,
    },
    /// Any node with no special refinement logic.
    ///
    /// Handled by the default transfer rule: the declared-type-derived value
    /// is computed and the store passes through unchanged.
    Opaque,
}

impl NodeKind {
    /// Returns the operand nodes referenced by this kind, in evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeKind::LocalRead(_)
            | NodeKind::Receiver
            | NodeKind::Literal(_)
            | NodeKind::Opaque => Vec::new(),
            NodeKind::FieldRead { receiver, .. } => vec![*receiver],
            NodeKind::Assignment { target, value } => vec![*target, *value],
            NodeKind::Equal { lhs, rhs } | NodeKind::NotEqual { lhs, rhs } => vec![*lhs, *rhs],
            NodeKind::Assert { condition } => vec![*condition],
            NodeKind::Call { receiver, args, .. } => {
                let mut operands = Vec::with_capacity(args.len() + 1);
                if let Some(r) = receiver {
                    operands.push(*r);
                }
                operands.extend_from_slice(args);
                operands
            }
        }
    }

    /// Returns `true` if this kind produces a boolean suitable for feeding a
    /// conditional terminator.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(self, NodeKind::Equal { .. } | NodeKind::NotEqual { .. })
    }
}

/// One elementary evaluated unit inside a basic block.
///
/// Nodes are created through the [`CfgBuilder`](crate::cfg::CfgBuilder) and
/// are immutable afterwards. The node's [`NodeId`] identifies it uniquely
/// within its graph; refinement stores do not key on node identity but on
/// the [`TrackedExpr`](crate::store::TrackedExpr) derived from a node, so
/// that two reads of the same local variable share one store entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    flags: NodeFlags,
}

impl Node {
    /// Creates a new node. Used by the builder; not part of the public
    /// construction surface.
    pub(crate) fn new(id: NodeId, kind: NodeKind, flags: NodeFlags) -> Self {
        Self { id, kind, flags }
    }

    /// Adds flags to an existing node. Only the builder mutates nodes, and
    /// only before the graph is finished.
    pub(crate) fn add_flags(&mut self, flags: NodeFlags) {
        self.flags |= flags;
    }

    /// Returns this node's identifier.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns this node's kind.
    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns this node's auxiliary flags.
    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Returns `true` if the node appears as an assignment target.
    #[must_use]
    pub const fn is_lvalue(&self) -> bool {
        self.flags.contains(NodeFlags::LVALUE)
    }

    /// Returns `true` if the node was inserted during graph construction.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.flags.contains(NodeFlags::SYNTHETIC)
    }

    /// Returns the operand nodes of this node, in evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<NodeId> {
        self.kind.operands()
    }
}
