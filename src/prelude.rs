//! # qualflow Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types and traits of the library. Import it to get quick access to
//! everything a checker implementation typically needs.
//!
//! ```rust
//! use qualflow::prelude::*;
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all qualflow operations
pub use crate::Error;

/// The result type used throughout qualflow
pub use crate::Result;

/// Caller-owned warning collection
pub use crate::diagnostics::Diagnostics;

// ================================================================================================
// Program Representation
// ================================================================================================

/// Graph construction and the immutable graph
pub use crate::cfg::{CfgBuilder, ControlFlowGraph, EdgeKind};

/// Blocks, terminators, and exceptional categories
pub use crate::cfg::{Block, BlockId, ExceptionKind, Terminator};

/// Nodes and their identifiers
pub use crate::cfg::{
    FieldId, LiteralValue, LocalId, MethodId, Node, NodeFlags, NodeId, NodeKind,
};

// ================================================================================================
// Checker Contract
// ================================================================================================

/// The value lattice contract and the declared-type abstraction function
pub use crate::lattice::{AbstractValue, Parameter, TypeFactory};

/// The refinement store and its keys
pub use crate::store::{Store, TrackedExpr};

/// The transfer protocol
pub use crate::transfer::{FlowStores, TransferFunction, TransferInput, TransferResult};

// ================================================================================================
// Driving an Analysis
// ================================================================================================

/// The fixpoint driver and its results
pub use crate::analysis::{AnalysisConfig, AnalysisResults, ForwardAnalysis};

/// Parallel fan-out over independent bodies
pub use crate::batch::{analyze_bodies, Body};
