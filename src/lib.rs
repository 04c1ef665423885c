// Copyright 2025 Qualflow Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # qualflow
//!
//! A pluggable, flow-sensitive dataflow engine for refining declared
//! type-qualifier information (such as "non-null", "interned", or
//! "tainted") along a program's control flow graph. A type checker built on
//! top of this engine can reject uses that are inconsistent with the
//! *refined*, path-specific qualifier rather than only the declared one.
//!
//! Many independent checkers reuse the same engine by supplying a qualifier
//! lattice and a transfer function; the engine supplies the reusable
//! machinery: graph traversal, the refinement store, join semantics, and
//! fixpoint iteration with branch- and exception-aware store splitting.
//!
//! ## Features
//!
//! - **Pluggable lattices** - checkers implement [`AbstractValue`] and a
//!   [`TypeFactory`]; the engine never assumes a concrete qualifier set
//! - **Overridable transfer rules** - baseline propagation comes for free,
//!   checkers override individual node rules to add refinement logic
//! - **Branch-aware stores** - comparisons split the store into a then/else
//!   pair, so each branch sees its own refinements
//! - **Exception-aware routing** - per-category exceptional stores flow
//!   along the matching handler edges
//! - **Deterministic fixpoint** - a FIFO worklist with per-block pending
//!   inputs, stable across runs for identical input
//! - **Parallel batch runs** - independent bodies fan out across a thread
//!   pool with no shared mutable state
//!
//! ## Quick Start
//!
//! ```rust
//! use qualflow::{
//!     cfg::{CfgBuilder, LiteralValue, LocalId, Node, NodeKind, Terminator},
//!     AbstractValue, ForwardAnalysis, Parameter, TransferFunction, TypeFactory,
//! };
//!
//! // A minimal two-point lattice: a value is either known interned or
//! // unrestricted.
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Interned {
//!     Yes,
//!     Unknown,
//! }
//!
//! impl AbstractValue for Interned {
//!     fn least_upper_bound(&self, other: &Self) -> Self {
//!         match (self, other) {
//!             (Interned::Yes, Interned::Yes) => Interned::Yes,
//!             _ => Interned::Unknown,
//!         }
//!     }
//! }
//!
//! struct InternedFactory;
//!
//! impl TypeFactory for InternedFactory {
//!     type Value = Interned;
//!
//!     fn value_for_node(&self, node: &Node) -> Interned {
//!         // String literals are interned by the runtime.
//!         match node.kind() {
//!             NodeKind::Literal(LiteralValue::String(_)) => Interned::Yes,
//!             _ => Interned::Unknown,
//!         }
//!     }
//!
//!     fn value_for_parameter(&self, _parameter: &Parameter) -> Interned {
//!         Interned::Unknown
//!     }
//! }
//!
//! struct InternedTransfer {
//!     factory: InternedFactory,
//! }
//!
//! impl TransferFunction for InternedTransfer {
//!     type Value = Interned;
//!     type Factory = InternedFactory;
//!
//!     fn factory(&self) -> &Self::Factory {
//!         &self.factory
//!     }
//! }
//!
//! // x = "a"; analyze and ask what x holds afterwards.
//! let mut builder = CfgBuilder::new();
//! let entry = builder.new_block();
//! let target = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
//! let value = builder.push_node(
//!     entry,
//!     NodeKind::Literal(LiteralValue::String("a".to_string())),
//! );
//! let assignment = builder.push_node(entry, NodeKind::Assignment { target, value });
//! builder.set_terminator(entry, Terminator::exit());
//! let cfg = builder.finish()?;
//!
//! let transfer = InternedTransfer { factory: InternedFactory };
//! let initial = transfer.initial_store(&[]);
//! let results = ForwardAnalysis::new(&cfg, transfer).run(initial)?;
//!
//! assert_eq!(results.value_of(assignment), Some(&Interned::Yes));
//! # Ok::<(), qualflow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `qualflow` is organized into focused modules:
//!
//! - [`cfg`] - the program representation the engine consumes: nodes,
//!   blocks, terminators, and the immutable graph with its builder
//! - [`lattice`] - the [`AbstractValue`] contract and the [`TypeFactory`]
//!   abstraction function
//! - [`store`] - the refinement store mapping tracked expressions to
//!   abstract values
//! - [`transfer`] - the [`TransferFunction`] trait with the baseline
//!   propagation rules, and the input/result protocol around it
//! - [`analysis`] - the worklist fixpoint driver and its queryable results
//! - [`diagnostics`] - caller-owned warning collection
//! - [`batch`] - parallel fan-out over independent bodies
//!
//! ## Scope
//!
//! The engine is intraprocedural: each body is analyzed on its own, using
//! only declared signatures at call sites. Aliasing is modeled through
//! expression identity plus conservative invalidation, not a points-to
//! analysis. Constructing graphs from source syntax, rendering
//! diagnostics, and the definition of any concrete qualifier lattice all
//! live in the embedding tooling.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Analysis
//! imprecision is never an error; see [`Error`] for the actual failure
//! taxonomy.

pub mod analysis;
pub mod batch;
pub mod cfg;
pub mod diagnostics;
mod error;
pub mod lattice;
pub mod prelude;
pub mod store;
pub mod transfer;

pub use analysis::{AnalysisConfig, AnalysisResults, ForwardAnalysis};
pub use diagnostics::Diagnostics;
pub use error::Error;
pub use lattice::{AbstractValue, Parameter, TypeFactory};
pub use store::{Store, TrackedExpr};
pub use transfer::{FlowStores, TransferFunction, TransferInput, TransferResult};

/// The result type used throughout qualflow.
pub type Result<T> = std::result::Result<T, Error>;
