//! Worklist-based fixpoint driver.
//!
//! The driver replays each block's node sequence through a
//! [`TransferFunction`], merges outgoing stores into successor pending
//! inputs, and re-enqueues any successor whose merged input changed. It
//! terminates when the worklist empties, which a finite-height value
//! lattice guarantees.
//!
//! # Algorithm
//!
//! 1. Seed the entry block's pending input with the initial store and
//!    enqueue it.
//! 2. Dequeue a block; thread a [`TransferInput`] through its nodes in
//!    order, recording each node's value and after-store.
//! 3. For each successor edge select the matching outgoing store: the then
//!    store for a true edge, the accumulated exceptional store for a
//!    handler edge, the regular store otherwise.
//! 4. Join the propagated store into the successor's pending input; if the
//!    pending input changed (or did not exist), re-enqueue the successor.
//! 5. Stop when the worklist is empty.
//!
//! Blocks are seeded and re-enqueued through a FIFO queue with a membership
//! flag per block, so the processing order is deterministic for identical
//! input. Correctness does not depend on the order, since the store join is
//! commutative and associative; determinism keeps downstream diagnostics
//! reproducible across runs.
//!
//! # Failure Semantics
//!
//! The driver never fails on well-formed input. A pending input that keeps
//! changing indefinitely means the supplied lattice or transfer function
//! violates the finite-height/monotonicity contract; the driver detects
//! this through a per-block visit cap and aborts the unit with
//! [`Error::FixpointDivergence`]. Expected imprecision, such as unknown
//! aliasing or unanalyzable exceptional paths, is absorbed by store
//! invalidation and never escalates to an error.

use std::collections::{HashMap, VecDeque};

use crate::{
    cfg::{BlockId, ControlFlowGraph, ExceptionKind, NodeId, Terminator},
    diagnostics::Diagnostics,
    lattice::AbstractValue,
    store::Store,
    transfer::{TransferFunction, TransferInput},
    Error, Result,
};

/// Default per-block cap on reprocessing before the run is aborted as
/// divergent.
const DEFAULT_VISITS_PER_BLOCK: usize = 64;

/// Tuning knobs for one driver run.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    /// Hard cap on the number of visits to any single block.
    ///
    /// A finite-height lattice stabilizes every pending input after at most
    /// height-many changes, so well-formed analyses stay far below this
    /// cap. Exceeding it is reported as [`Error::FixpointDivergence`].
    pub max_visits_per_block: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_visits_per_block: DEFAULT_VISITS_PER_BLOCK,
        }
    }
}

/// Results of one analysis run, queryable per node and per block.
///
/// For every node the driver retains the abstract value computed for it and
/// the store immediately after it; downstream checking logic inspects these
/// to decide whether a use is consistent with the refined qualifier.
#[derive(Debug, Clone)]
pub struct AnalysisResults<V: AbstractValue> {
    node_values: HashMap<NodeId, V>,
    node_stores: HashMap<NodeId, Store<V>>,
    block_inputs: Vec<Option<Store<V>>>,
    visits: Vec<usize>,
}

impl<V: AbstractValue> AnalysisResults<V> {
    /// Returns the abstract value computed for a node.
    ///
    /// `None` for value-less nodes, such as assertions, and for nodes of
    /// unreachable blocks.
    #[must_use]
    pub fn value_of(&self, node: NodeId) -> Option<&V> {
        self.node_values.get(&node)
    }

    /// Returns the store immediately after a node.
    ///
    /// `None` for nodes of unreachable blocks.
    #[must_use]
    pub fn store_after(&self, node: NodeId) -> Option<&Store<V>> {
        self.node_stores.get(&node)
    }

    /// Returns the merged input store a block was last processed with.
    ///
    /// `None` for blocks never reached from the entry.
    #[must_use]
    pub fn input_before(&self, block: BlockId) -> Option<&Store<V>> {
        self.block_inputs.get(block.index())?.as_ref()
    }

    /// Returns how many times a block was processed before stabilizing.
    #[must_use]
    pub fn block_visits(&self, block: BlockId) -> usize {
        self.visits.get(block.index()).copied().unwrap_or(0)
    }

    /// Returns the total number of block visits of the run.
    #[must_use]
    pub fn total_visits(&self) -> usize {
        self.visits.iter().sum()
    }
}

/// The forward fixpoint driver for one analyzed body.
///
/// A driver instance owns no shared state: independent bodies can be
/// analyzed in parallel by independent instances, each over its own graph,
/// transfer function, and stores.
///
/// # Example
///
/// ```rust,ignore
/// use qualflow::{AnalysisConfig, ForwardAnalysis};
///
/// let analysis = ForwardAnalysis::new(&cfg, transfer);
/// let results = analysis.run(initial_store)?;
/// let refined = results.value_of(some_node);
/// ```
pub struct ForwardAnalysis<'a, T: TransferFunction> {
    cfg: &'a ControlFlowGraph,
    transfer: T,
    config: AnalysisConfig,
}

impl<'a, T: TransferFunction> ForwardAnalysis<'a, T> {
    /// Creates a driver with the default configuration.
    #[must_use]
    pub fn new(cfg: &'a ControlFlowGraph, transfer: T) -> Self {
        Self::with_config(cfg, transfer, AnalysisConfig::default())
    }

    /// Creates a driver with an explicit configuration.
    #[must_use]
    pub const fn with_config(
        cfg: &'a ControlFlowGraph,
        transfer: T,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            cfg,
            transfer,
            config,
        }
    }

    /// Runs the analysis to its fixpoint, discarding diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FixpointDivergence`] if the supplied lattice or
    /// transfer function violates the finite-height/monotonicity contract.
    pub fn run(self, initial_store: Store<T::Value>) -> Result<AnalysisResults<T::Value>> {
        let mut diagnostics = Diagnostics::new();
        self.run_with(initial_store, &mut diagnostics)
    }

    /// Runs the analysis to its fixpoint, recording warnings into a
    /// caller-owned collector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FixpointDivergence`] if the supplied lattice or
    /// transfer function violates the finite-height/monotonicity contract.
    pub fn run_with(
        self,
        initial_store: Store<T::Value>,
        diagnostics: &mut Diagnostics,
    ) -> Result<AnalysisResults<T::Value>> {
        let block_count = self.cfg.block_count();
        log::debug!(target: "fixpoint", "running forward analysis over {block_count} blocks");

        let mut pending: Vec<Option<Store<T::Value>>> = vec![None; block_count];
        let mut in_worklist = vec![false; block_count];
        let mut worklist: VecDeque<BlockId> = VecDeque::with_capacity(block_count);
        let mut visits = vec![0usize; block_count];
        let mut node_values: HashMap<NodeId, T::Value> = HashMap::new();
        let mut node_stores: HashMap<NodeId, Store<T::Value>> = HashMap::new();

        merge_into(
            self.cfg.entry(),
            initial_store,
            &mut pending,
            &mut worklist,
            &mut in_worklist,
        );

        while let Some(block_id) = worklist.pop_front() {
            let index = block_id.index();
            in_worklist[index] = false;
            visits[index] += 1;
            if visits[index] > self.config.max_visits_per_block {
                log::debug!(
                    target: "fixpoint",
                    "aborting: {block_id} exceeded {} visits", self.config.max_visits_per_block
                );
                return Err(Error::FixpointDivergence {
                    block: block_id,
                    visits: visits[index],
                });
            }

            let block = self.cfg.block(block_id).expect("block should exist");
            let entry_store = pending[index]
                .clone()
                .expect("scheduled blocks always have a pending input");
            log::trace!(
                target: "fixpoint",
                "visit {} of {block_id} ({} nodes)", visits[index], block.len()
            );

            // Replay the node sequence, threading the input from one node
            // to the next and accumulating exceptional stores per category.
            let mut input = TransferInput::new(entry_store.clone());
            let mut exceptional: HashMap<ExceptionKind, Store<T::Value>> = HashMap::new();
            for node in block.nodes() {
                let result = self.transfer.visit(node, &input, self.cfg);
                if let Some(value) = result.value() {
                    node_values.insert(node.id(), value.clone());
                }
                node_stores.insert(node.id(), result.regular_store());
                for (kind, store) in result.exceptional_stores() {
                    exceptional
                        .entry(*kind)
                        .and_modify(|accumulated| {
                            *accumulated = accumulated.least_upper_bound(store);
                        })
                        .or_insert_with(|| store.clone());
                }
                input = input.advance(node.id(), &result);
            }

            // Route the outgoing stores along the terminator's edges.
            match block.terminator() {
                Terminator::Regular { successor } => {
                    if let Some(successor) = successor {
                        merge_into(
                            *successor,
                            input.regular_store(),
                            &mut pending,
                            &mut worklist,
                            &mut in_worklist,
                        );
                    }
                }
                Terminator::Conditional {
                    then_block,
                    else_block,
                    ..
                } => {
                    merge_into(
                        *then_block,
                        input.then_store().clone(),
                        &mut pending,
                        &mut worklist,
                        &mut in_worklist,
                    );
                    merge_into(
                        *else_block,
                        input.else_store().clone(),
                        &mut pending,
                        &mut worklist,
                        &mut in_worklist,
                    );
                }
                Terminator::Exceptional {
                    successor,
                    handlers,
                } => {
                    if let Some(successor) = successor {
                        merge_into(
                            *successor,
                            input.regular_store(),
                            &mut pending,
                            &mut worklist,
                            &mut in_worklist,
                        );
                    }
                    for (kind, handler) in handlers {
                        let store = match exceptional.get(kind) {
                            Some(store) => store.clone(),
                            None => {
                                // No node declared a store for this
                                // category; the state at block entry is the
                                // sound fallback.
                                diagnostics.warn(format!(
                                    "no exceptional store for {kind} in {block_id}; \
                                     propagating the block entry state"
                                ));
                                entry_store.clone()
                            }
                        };
                        merge_into(
                            *handler,
                            store,
                            &mut pending,
                            &mut worklist,
                            &mut in_worklist,
                        );
                    }
                }
            }
        }

        let total: usize = visits.iter().sum();
        log::debug!(target: "fixpoint", "fixpoint reached after {total} block visits");

        Ok(AnalysisResults {
            node_values,
            node_stores,
            block_inputs: pending,
            visits,
        })
    }
}

/// Joins a propagated store into a block's pending input, enqueueing the
/// block when the merge changed it.
fn merge_into<V: AbstractValue>(
    target: BlockId,
    store: Store<V>,
    pending: &mut [Option<Store<V>>],
    worklist: &mut VecDeque<BlockId>,
    in_worklist: &mut [bool],
) {
    let index = target.index();
    let changed = match pending[index].take() {
        None => {
            pending[index] = Some(store);
            true
        }
        Some(existing) => {
            let merged = existing.least_upper_bound(&store);
            debug_assert_eq!(
                merged.least_upper_bound(&existing),
                merged,
                "store join must be monotone"
            );
            let changed = merged != existing;
            pending[index] = Some(merged);
            changed
        }
    };

    if changed && !in_worklist[index] {
        worklist.push_back(target);
        in_worklist[index] = true;
    }
}
