//! Basic blocks and their terminators.
//!
//! A block is an ordered sequence of [`Node`]s plus a terminator describing
//! where control goes next. Three terminator shapes exist: a regular block
//! has at most one successor, a conditional block has a then/else successor
//! pair keyed on a boolean-valued node, and an exceptional block has one
//! successor per raisable error category in addition to its normal
//! successor. Blocks and their successor edges form the control flow graph,
//! which is read-only to the analysis engine.

use std::fmt;

use strum::{Display, EnumIter};

use crate::cfg::node::{Node, NodeId};

/// A strongly-typed identifier for basic blocks within a control flow graph.
///
/// Block IDs are assigned sequentially starting from 0 in creation order,
/// which is also the deterministic processing order used by the fixpoint
/// driver when several blocks are pending at once.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a new `BlockId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index value of this block identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Category of a raisable runtime error, keying exceptional successor edges.
///
/// The engine treats categories as opaque labels: a block's exceptional
/// terminator maps each category it can raise to a handler block, and the
/// driver routes the matching exceptional store along that edge.
#[derive(Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Dereference of an absent value.
    NullDereference,
    /// Division by zero and related arithmetic faults.
    ArithmeticError,
    /// Out-of-range container access.
    IndexOutOfBounds,
    /// A failed downcast.
    InvalidCast,
    /// Any other error category.
    Other,
}

/// The terminator of a basic block.
///
/// # Examples
///
/// ```rust
/// use qualflow::cfg::{BlockId, NodeId, Terminator};
///
/// let cond = Terminator::Conditional {
///     condition: NodeId::new(3),
///     then_block: BlockId::new(1),
///     else_block: BlockId::new(2),
/// };
/// assert!(cond.is_conditional());
/// assert_eq!(cond.successor_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Fall through to a single successor, or exit when `successor` is
    /// `None`.
    Regular {
        /// The single successor block, if any.
        successor: Option<BlockId>,
    },
    /// Branch on the boolean value of `condition`, taking `then_block` when
    /// it holds and `else_block` otherwise.
    Conditional {
        /// The boolean-valued node this branch is keyed on. Must be one of
        /// the block's own nodes.
        condition: NodeId,
        /// Successor taken when the condition holds.
        then_block: BlockId,
        /// Successor taken when the condition does not hold.
        else_block: BlockId,
    },
    /// Continue to the normal successor unless one of the block's nodes
    /// raises, in which case control transfers to the handler registered
    /// for the raised category.
    Exceptional {
        /// The normal successor block, if any.
        successor: Option<BlockId>,
        /// One handler block per raisable error category.
        handlers: Vec<(ExceptionKind, BlockId)>,
    },
}

impl Terminator {
    /// Creates a regular terminator with the given successor.
    #[must_use]
    pub const fn regular(successor: BlockId) -> Self {
        Terminator::Regular {
            successor: Some(successor),
        }
    }

    /// Creates a terminator for an exit block.
    #[must_use]
    pub const fn exit() -> Self {
        Terminator::Regular { successor: None }
    }

    /// Creates a conditional terminator.
    #[must_use]
    pub const fn conditional(condition: NodeId, then_block: BlockId, else_block: BlockId) -> Self {
        Terminator::Conditional {
            condition,
            then_block,
            else_block,
        }
    }

    /// Creates an exceptional terminator.
    #[must_use]
    pub const fn exceptional(
        successor: Option<BlockId>,
        handlers: Vec<(ExceptionKind, BlockId)>,
    ) -> Self {
        Terminator::Exceptional {
            successor,
            handlers,
        }
    }

    /// Returns `true` if this is a conditional terminator.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Terminator::Conditional { .. })
    }

    /// Returns `true` if this terminator carries exceptional edges.
    #[must_use]
    pub const fn is_exceptional(&self) -> bool {
        matches!(self, Terminator::Exceptional { .. })
    }

    /// Returns `true` if the block ends the analyzed body on its normal
    /// path.
    #[must_use]
    pub const fn is_exit(&self) -> bool {
        matches!(
            self,
            Terminator::Regular { successor: None }
                | Terminator::Exceptional {
                    successor: None,
                    ..
                }
        )
    }

    /// Returns the number of successor edges this terminator contributes.
    #[must_use]
    pub fn successor_count(&self) -> usize {
        match self {
            Terminator::Regular { successor } => usize::from(successor.is_some()),
            Terminator::Conditional { .. } => 2,
            Terminator::Exceptional {
                successor,
                handlers,
            } => usize::from(successor.is_some()) + handlers.len(),
        }
    }
}

/// An ordered sequence of nodes plus a terminator.
///
/// Blocks are created once by the [`CfgBuilder`](crate::cfg::CfgBuilder) and
/// live unchanged for the whole analysis of one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    nodes: Vec<Node>,
    terminator: Terminator,
}

impl Block {
    pub(crate) fn new(id: BlockId, nodes: Vec<Node>, terminator: Terminator) -> Self {
        Self {
            id,
            nodes,
            terminator,
        }
    }

    /// Returns this block's identifier.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the block's nodes in evaluation order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the block's terminator.
    #[must_use]
    pub const fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Returns `true` if the block contains no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of nodes in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the given node belongs to this block.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id() == node)
    }
}
