//! Control flow graph data model.
//!
//! This module defines the program representation the analysis engine
//! consumes: [`Node`]s grouped into [`Block`]s, connected by the typed
//! successor edges implied by each block's [`Terminator`]. The engine never
//! builds this structure from program syntax; an embedding front end lowers
//! its AST through the [`CfgBuilder`] and the resulting
//! [`ControlFlowGraph`] is immutable for the duration of one analysis.
//!
//! # Architecture
//!
//! - [`node`] - elementary evaluated units and their closed kind set
//! - [`block`] - node sequences with regular, conditional, and exceptional
//!   terminators
//! - [`graph`] - the immutable graph with traversal orders and node lookup
//! - [`builder`] - two-phase construction with validation
//!
//! # Example
//!
//! ```rust
//! use qualflow::cfg::{CfgBuilder, LiteralValue, LocalId, NodeKind, Terminator};
//!
//! let mut builder = CfgBuilder::new();
//! let entry = builder.new_block();
//! let target = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
//! let value = builder.push_node(entry, NodeKind::Literal(LiteralValue::Int(1)));
//! builder.push_node(entry, NodeKind::Assignment { target, value });
//! builder.set_terminator(entry, Terminator::exit());
//!
//! let cfg = builder.finish()?;
//! assert_eq!(cfg.block_count(), 1);
//! assert_eq!(cfg.node_count(), 3);
//! # Ok::<(), qualflow::Error>(())
//! ```

pub mod block;
pub mod builder;
pub mod graph;
pub mod node;

// Re-export primary types at module level
pub use block::{Block, BlockId, ExceptionKind, Terminator};
pub use builder::CfgBuilder;
pub use graph::{ControlFlowGraph, EdgeKind};
pub use node::{FieldId, LiteralValue, LocalId, MethodId, Node, NodeFlags, NodeId, NodeKind};
