//! Programmatic assembly of control flow graphs.
//!
//! The engine never constructs graphs from program syntax; the embedding
//! front end lowers its AST and hands the result over through this builder.
//! Construction is two-phase: blocks and nodes are recorded freely, then
//! [`CfgBuilder::finish`] validates every cross-reference and produces the
//! immutable [`ControlFlowGraph`].
//!
//! # Example
//!
//! ```rust
//! use qualflow::cfg::{CfgBuilder, LiteralValue, LocalId, NodeKind, Terminator};
//!
//! // x = "a"
//! let mut builder = CfgBuilder::new();
//! let entry = builder.new_block();
//! let target = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
//! let value = builder.push_node(
//!     entry,
//!     NodeKind::Literal(LiteralValue::String("a".to_string())),
//! );
//! builder.push_node(entry, NodeKind::Assignment { target, value });
//! builder.set_terminator(entry, Terminator::exit());
//! let cfg = builder.finish()?;
//! assert_eq!(cfg.node_count(), 3);
//! # Ok::<(), qualflow::Error>(())
//! ```

use crate::{
    cfg::{
        block::{Block, BlockId, Terminator},
        graph::ControlFlowGraph,
        node::{Node, NodeFlags, NodeId, NodeKind},
    },
    Error, Result,
};

/// A block under construction.
#[derive(Debug, Default)]
struct PendingBlock {
    nodes: Vec<Node>,
    terminator: Option<Terminator>,
}

/// Builder for [`ControlFlowGraph`] instances.
///
/// Node identifiers are handed out sequentially across the whole graph, in
/// push order; block identifiers in creation order. Creation order is also
/// the deterministic processing order of the fixpoint driver, so builders
/// should number blocks the way the front end encountered them.
#[derive(Debug, Default)]
pub struct CfgBuilder {
    blocks: Vec<PendingBlock>,
    /// Maps each handed-out [`NodeId`] to its owning block and position.
    node_index: Vec<(BlockId, usize)>,
}

impl CfgBuilder {
    /// Creates a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new block and returns its identifier.
    ///
    /// The first created block becomes the entry block.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(PendingBlock::default());
        id
    }

    /// Appends a node of the given kind to a block and returns its
    /// identifier.
    ///
    /// When the kind is an assignment, the target node is flagged as an
    /// lvalue.
    ///
    /// # Panics
    ///
    /// Panics if `block` was not created by this builder.
    pub fn push_node(&mut self, block: BlockId, kind: NodeKind) -> NodeId {
        self.push_with_flags(block, kind, NodeFlags::empty())
    }

    /// Appends a node that has no direct source-code counterpart.
    ///
    /// # Panics
    ///
    /// Panics if `block` was not created by this builder.
    pub fn push_synthetic_node(&mut self, block: BlockId, kind: NodeKind) -> NodeId {
        self.push_with_flags(block, kind, NodeFlags::SYNTHETIC)
    }

    fn push_with_flags(&mut self, block: BlockId, kind: NodeKind, flags: NodeFlags) -> NodeId {
        assert!(
            block.index() < self.blocks.len(),
            "block {block} was not created by this builder"
        );

        if let NodeKind::Assignment { target, .. } = &kind {
            self.mark_lvalue(*target);
        }

        let id = NodeId::new(self.node_index.len());
        let position = self.blocks[block.index()].nodes.len();
        self.blocks[block.index()]
            .nodes
            .push(Node::new(id, kind, flags));
        self.node_index.push((block, position));
        id
    }

    /// Flags an already-pushed node as an assignment target. Out-of-range
    /// ids are left for `finish` to reject as dangling operands.
    fn mark_lvalue(&mut self, target: NodeId) {
        if let Some(&(block, position)) = self.node_index.get(target.index()) {
            self.blocks[block.index()].nodes[position].add_flags(NodeFlags::LVALUE);
        }
    }

    /// Sets the terminator of a block, replacing any previous one.
    ///
    /// # Panics
    ///
    /// Panics if `block` was not created by this builder.
    pub fn set_terminator(&mut self, block: BlockId, terminator: Terminator) {
        assert!(
            block.index() < self.blocks.len(),
            "block {block} was not created by this builder"
        );
        self.blocks[block.index()].terminator = Some(terminator);
    }

    /// Validates the recorded structure and produces the immutable graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyGraph`] if no block was created, and
    /// [`Error::MalformedGraph`] if:
    ///
    /// - a block has no terminator,
    /// - a terminator names a successor block that does not exist,
    /// - a conditional terminator's condition is not a node of its block,
    /// - a node's operand references a node of another block, or one that
    ///   is evaluated later in the same block.
    pub fn finish(self) -> Result<ControlFlowGraph> {
        if self.blocks.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let block_count = self.blocks.len();
        let check_target = |owner: BlockId, target: BlockId| -> Result<()> {
            if target.index() >= block_count {
                return Err(Error::MalformedGraph(format!(
                    "block {owner} names successor {target}, but the graph has {block_count} blocks"
                )));
            }
            Ok(())
        };

        let mut blocks = Vec::with_capacity(block_count);
        for (index, pending) in self.blocks.into_iter().enumerate() {
            let id = BlockId::new(index);
            let terminator = pending.terminator.ok_or_else(|| {
                Error::MalformedGraph(format!("block {id} has no terminator"))
            })?;

            match &terminator {
                Terminator::Regular { successor } => {
                    if let Some(succ) = successor {
                        check_target(id, *succ)?;
                    }
                }
                Terminator::Conditional {
                    condition,
                    then_block,
                    else_block,
                } => {
                    check_target(id, *then_block)?;
                    check_target(id, *else_block)?;
                    let owns_condition = self
                        .node_index
                        .get(condition.index())
                        .is_some_and(|(block, _)| *block == id);
                    if !owns_condition {
                        return Err(Error::MalformedGraph(format!(
                            "block {id} branches on {condition}, which is not one of its nodes"
                        )));
                    }
                }
                Terminator::Exceptional {
                    successor,
                    handlers,
                } => {
                    if let Some(succ) = successor {
                        check_target(id, *succ)?;
                    }
                    for (_, handler) in handlers {
                        check_target(id, *handler)?;
                    }
                }
            }

            for (position, node) in pending.nodes.iter().enumerate() {
                for operand in node.operands() {
                    let resolved = self.node_index.get(operand.index()).copied();
                    match resolved {
                        Some((block, operand_position))
                            if block == id && operand_position < position => {}
                        _ => {
                            return Err(Error::MalformedGraph(format!(
                                "node {} in block {id} references operand {operand}, which is \
                                 not an earlier node of the same block",
                                node.id()
                            )));
                        }
                    }
                }
            }

            blocks.push(Block::new(id, pending.nodes, terminator));
        }

        Ok(ControlFlowGraph::from_parts(blocks, self.node_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::node::{LiteralValue, LocalId};

    #[test]
    fn test_empty_builder_is_rejected() {
        let builder = CfgBuilder::new();
        assert!(matches!(builder.finish(), Err(Error::EmptyGraph)));
    }

    #[test]
    fn test_missing_terminator_is_rejected() {
        let mut builder = CfgBuilder::new();
        builder.new_block();
        let err = builder.finish().unwrap_err();
        assert!(matches!(err, Error::MalformedGraph(_)));
    }

    #[test]
    fn test_dangling_successor_is_rejected() {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        builder.set_terminator(entry, Terminator::regular(BlockId::new(7)));
        let err = builder.finish().unwrap_err();
        assert!(matches!(err, Error::MalformedGraph(_)));
    }

    #[test]
    fn test_foreign_condition_is_rejected() {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        let other = builder.new_block();
        let cond = builder.push_node(other, NodeKind::Literal(LiteralValue::Bool(true)));
        builder.set_terminator(entry, Terminator::conditional(cond, other, other));
        builder.set_terminator(other, Terminator::exit());
        let err = builder.finish().unwrap_err();
        assert!(matches!(err, Error::MalformedGraph(_)));
    }

    #[test]
    fn test_forward_operand_is_rejected() {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        // The assignment references an operand that is pushed after it.
        let target = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
        builder.push_node(
            entry,
            NodeKind::Assignment {
                target,
                value: NodeId::new(9),
            },
        );
        builder.set_terminator(entry, Terminator::exit());
        let err = builder.finish().unwrap_err();
        assert!(matches!(err, Error::MalformedGraph(_)));
    }

    #[test]
    fn test_assignment_marks_lvalue() {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        let target = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
        let value = builder.push_node(entry, NodeKind::Literal(LiteralValue::Int(5)));
        builder.push_node(entry, NodeKind::Assignment { target, value });
        builder.set_terminator(entry, Terminator::exit());

        let cfg = builder.finish().unwrap();
        assert!(cfg.node(target).unwrap().is_lvalue());
        assert!(!cfg.node(value).unwrap().is_lvalue());
    }

    #[test]
    fn test_synthetic_nodes_are_flagged() {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        let node = builder.push_synthetic_node(entry, NodeKind::Opaque);
        builder.set_terminator(entry, Terminator::exit());

        let cfg = builder.finish().unwrap();
        assert!(cfg.node(node).unwrap().is_synthetic());
    }

    #[test]
    #[should_panic(expected = "was not created by this builder")]
    fn test_push_to_unknown_block_panics() {
        let mut builder = CfgBuilder::new();
        builder.push_node(BlockId::new(0), NodeKind::Opaque);
    }
}
