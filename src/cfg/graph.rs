//! Control flow graph implementation.
//!
//! This module provides the [`ControlFlowGraph`] structure that holds the
//! basic blocks of one analyzed body together with typed successor edges,
//! traversal orders, and node lookup. The graph is immutable for the
//! duration of an analysis: it is produced once by the
//! [`CfgBuilder`](crate::cfg::CfgBuilder) and only read afterwards.

use std::collections::HashSet;
use std::fmt::Write;

use crate::cfg::{
    block::{Block, BlockId, ExceptionKind, Terminator},
    node::{Node, NodeId},
};

/// The kind of control flow represented by a successor edge.
///
/// Edge kinds are derived from the source block's terminator. They tell the
/// fixpoint driver which outgoing store to route along the edge: the then
/// store for a true edge, the matching exceptional store for a handler edge,
/// and the regular store otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Unconditional control flow to the single successor.
    Regular,
    /// The successor taken when the branch condition holds.
    ConditionalTrue,
    /// The successor taken when the branch condition does not hold.
    ConditionalFalse,
    /// The handler successor for the given raised error category.
    Exceptional(ExceptionKind),
}

impl EdgeKind {
    /// Returns `true` if this is a conditional branch edge.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, EdgeKind::ConditionalTrue | EdgeKind::ConditionalFalse)
    }

    /// Returns `true` if this is an exceptional edge.
    #[must_use]
    pub const fn is_exceptional(&self) -> bool {
        matches!(self, EdgeKind::Exceptional(_))
    }
}

/// The control flow graph of one analyzed body.
///
/// The graph owns its blocks and derives successor edges from each block's
/// terminator, so adjacency can never disagree with the terminators.
/// Predecessor lists and a node index are precomputed at construction.
///
/// # Construction
///
/// Assemble a graph with the [`CfgBuilder`](crate::cfg::CfgBuilder):
///
/// ```rust
/// use qualflow::cfg::{CfgBuilder, NodeKind, LiteralValue, Terminator};
///
/// let mut builder = CfgBuilder::new();
/// let entry = builder.new_block();
/// builder.push_node(entry, NodeKind::Literal(LiteralValue::Int(1)));
/// builder.set_terminator(entry, Terminator::exit());
/// let cfg = builder.finish()?;
/// assert_eq!(cfg.block_count(), 1);
/// # Ok::<(), qualflow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    /// All blocks, indexed by [`BlockId`].
    blocks: Vec<Block>,
    /// The entry block (always the first created block).
    entry: BlockId,
    /// Maps each [`NodeId`] to its owning block and position within it.
    node_index: Vec<(BlockId, usize)>,
    /// Predecessor lists, indexed by [`BlockId`].
    predecessors: Vec<Vec<BlockId>>,
}

impl ControlFlowGraph {
    /// Assembles a graph from validated parts. Only the builder calls this;
    /// it assumes all cross-references have already been checked.
    pub(crate) fn from_parts(blocks: Vec<Block>, node_index: Vec<(BlockId, usize)>) -> Self {
        let mut predecessors = vec![Vec::new(); blocks.len()];
        for block in &blocks {
            for (succ, _) in Self::edges_of(block) {
                let preds: &mut Vec<BlockId> = &mut predecessors[succ.index()];
                if !preds.contains(&block.id()) {
                    preds.push(block.id());
                }
            }
        }

        Self {
            blocks,
            entry: BlockId::new(0),
            node_index,
            predecessors,
        }
    }

    fn edges_of(block: &Block) -> Vec<(BlockId, EdgeKind)> {
        match block.terminator() {
            Terminator::Regular { successor } => successor
                .iter()
                .map(|s| (*s, EdgeKind::Regular))
                .collect(),
            Terminator::Conditional {
                then_block,
                else_block,
                ..
            } => vec![
                (*then_block, EdgeKind::ConditionalTrue),
                (*else_block, EdgeKind::ConditionalFalse),
            ],
            Terminator::Exceptional {
                successor,
                handlers,
            } => {
                let mut edges: Vec<(BlockId, EdgeKind)> = successor
                    .iter()
                    .map(|s| (*s, EdgeKind::Regular))
                    .collect();
                edges.extend(
                    handlers
                        .iter()
                        .map(|(kind, target)| (*target, EdgeKind::Exceptional(*kind))),
                );
                edges
            }
        }
    }

    /// Returns the entry block identifier.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        self.entry
    }

    /// Returns the number of blocks in the graph.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the total number of nodes across all blocks.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Returns the block with the given identifier, or `None` if out of
    /// range.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// Returns an iterator over all blocks in identifier order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Returns the node with the given identifier, or `None` if out of
    /// range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let (block, position) = *self.node_index.get(id.index())?;
        self.blocks[block.index()].nodes().get(position)
    }

    /// Returns the block that owns the given node, or `None` if out of
    /// range.
    #[must_use]
    pub fn block_of(&self, id: NodeId) -> Option<BlockId> {
        self.node_index.get(id.index()).map(|(block, _)| *block)
    }

    /// Returns the typed successor edges of a block, in terminator order.
    ///
    /// The order is deterministic: the normal successor first, then the
    /// then/else pair or the handlers in declaration order.
    #[must_use]
    pub fn successor_edges(&self, id: BlockId) -> Vec<(BlockId, EdgeKind)> {
        self.block(id).map(Self::edges_of).unwrap_or_default()
    }

    /// Returns an iterator over the successor blocks of a block.
    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> {
        self.successor_edges(id).into_iter().map(|(succ, _)| succ)
    }

    /// Returns the predecessor blocks of a block.
    ///
    /// A predecessor appears once even when several edges connect the pair.
    #[must_use]
    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        self.predecessors
            .get(id.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the blocks reachable from the entry in postorder.
    ///
    /// Unreachable blocks are not included.
    #[must_use]
    pub fn postorder(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut visited: HashSet<BlockId> = HashSet::with_capacity(self.blocks.len());
        // Iterative DFS; the stack entry tracks how many successors have
        // been expanded so far.
        let mut stack: Vec<(BlockId, usize)> = vec![(self.entry, 0)];
        visited.insert(self.entry);

        while let Some((block, next_child)) = stack.pop() {
            let successors = self.successor_edges(block);
            if let Some((succ, _)) = successors.get(next_child) {
                stack.push((block, next_child + 1));
                if visited.insert(*succ) {
                    stack.push((*succ, 0));
                }
            } else {
                order.push(block);
            }
        }

        order
    }

    /// Returns the blocks reachable from the entry in reverse postorder.
    ///
    /// In reverse postorder every block appears before its successors,
    /// except across back edges. This is the preferred visitation order for
    /// forward dataflow problems.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut order = self.postorder();
        order.reverse();
        order
    }

    /// Renders the graph in Graphviz dot format, for debugging.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph cfg {\n");
        for block in &self.blocks {
            let _ = writeln!(
                out,
                "    {} [label=\"{} ({} nodes)\"];",
                block.id(),
                block.id(),
                block.len()
            );
        }
        for block in &self.blocks {
            for (succ, kind) in Self::edges_of(block) {
                let label = match kind {
                    EdgeKind::Regular => String::new(),
                    EdgeKind::ConditionalTrue => " [label=\"then\"]".to_string(),
                    EdgeKind::ConditionalFalse => " [label=\"else\"]".to_string(),
                    EdgeKind::Exceptional(exc) => format!(" [label=\"{exc}\", style=dashed]"),
                };
                let _ = writeln!(out, "    {} -> {}{};", block.id(), succ, label);
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{builder::CfgBuilder, node::NodeKind, LiteralValue, LocalId};

    /// Diamond: entry branches to then/else, both fall through to a merge.
    fn diamond() -> ControlFlowGraph {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        let then_block = builder.new_block();
        let else_block = builder.new_block();
        let merge = builder.new_block();

        let lit = builder.push_node(entry, NodeKind::Literal(LiteralValue::Bool(true)));
        builder.set_terminator(entry, Terminator::conditional(lit, then_block, else_block));
        builder.set_terminator(then_block, Terminator::regular(merge));
        builder.set_terminator(else_block, Terminator::regular(merge));
        builder.push_node(merge, NodeKind::LocalRead(LocalId::new(0)));
        builder.set_terminator(merge, Terminator::exit());

        builder.finish().expect("diamond should be well-formed")
    }

    #[test]
    fn test_edge_kind_predicates() {
        assert!(EdgeKind::ConditionalTrue.is_conditional());
        assert!(EdgeKind::ConditionalFalse.is_conditional());
        assert!(!EdgeKind::Regular.is_conditional());
        assert!(EdgeKind::Exceptional(ExceptionKind::Other).is_exceptional());
        assert!(!EdgeKind::Regular.is_exceptional());
    }

    #[test]
    fn test_diamond_structure() {
        let cfg = diamond();
        assert_eq!(cfg.block_count(), 4);
        assert_eq!(cfg.entry(), BlockId::new(0));

        let edges = cfg.successor_edges(cfg.entry());
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].1, EdgeKind::ConditionalTrue);
        assert_eq!(edges[1].1, EdgeKind::ConditionalFalse);

        let merge = BlockId::new(3);
        assert_eq!(cfg.predecessors(merge).len(), 2);
        assert!(cfg.successors(merge).next().is_none());
    }

    #[test]
    fn test_node_lookup() {
        let cfg = diamond();
        let node = cfg.node(NodeId::new(0)).expect("node 0 exists");
        assert!(matches!(node.kind(), NodeKind::Literal(_)));
        assert_eq!(cfg.block_of(NodeId::new(0)), Some(BlockId::new(0)));
        assert_eq!(cfg.block_of(NodeId::new(1)), Some(BlockId::new(3)));
        assert!(cfg.node(NodeId::new(99)).is_none());
    }

    #[test]
    fn test_reverse_postorder_entry_first() {
        let cfg = diamond();
        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo.len(), 4);
        assert_eq!(rpo[0], cfg.entry());

        // Predecessors come before successors in an acyclic graph.
        let pos = |b: BlockId| rpo.iter().position(|&x| x == b).unwrap();
        assert!(pos(BlockId::new(0)) < pos(BlockId::new(1)));
        assert!(pos(BlockId::new(0)) < pos(BlockId::new(2)));
        assert!(pos(BlockId::new(1)) < pos(BlockId::new(3)));
        assert!(pos(BlockId::new(2)) < pos(BlockId::new(3)));
    }

    #[test]
    fn test_postorder_is_reverse_of_rpo() {
        let cfg = diamond();
        let po = cfg.postorder();
        let rpo = cfg.reverse_postorder();
        assert_eq!(po.len(), rpo.len());
        for (i, block) in po.iter().enumerate() {
            assert_eq!(*block, rpo[rpo.len() - 1 - i]);
        }
    }

    #[test]
    fn test_to_dot_contains_edges() {
        let cfg = diamond();
        let dot = cfg.to_dot();
        assert!(dot.starts_with("digraph cfg {"));
        assert!(dot.contains("b0 -> b1 [label=\"then\"]"));
        assert!(dot.contains("b0 -> b2 [label=\"else\"]"));
        assert!(dot.contains("b1 -> b3"));
    }
}
