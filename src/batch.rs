//! Parallel analysis of independent bodies.
//!
//! Analyzing one body is a closed, single-threaded fixpoint computation,
//! but separate bodies share no mutable state: each owns its graph, its
//! transfer function, and its stores. That makes a whole-program run an
//! embarrassingly parallel fan-out, which this module performs with a rayon
//! thread pool, collecting per-body results into a concurrent map.
//!
//! # Example
//!
//! ```rust,ignore
//! use qualflow::batch::{analyze_bodies, Body};
//!
//! let bodies: Vec<Body<MethodName, NullnessTransfer>> = lower_all_methods();
//! let results = analyze_bodies(bodies);
//! for entry in results.iter() {
//!     match entry.value() {
//!         Ok(results) => report(entry.key(), results),
//!         Err(err) => eprintln!("{}: {err}", entry.key()),
//!     }
//! }
//! ```

use std::hash::Hash;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    analysis::{AnalysisConfig, AnalysisResults, ForwardAnalysis},
    cfg::ControlFlowGraph,
    store::Store,
    transfer::TransferFunction,
    Result,
};

/// One unit of work for a batch run: a body identifier together with
/// everything its analysis needs.
pub struct Body<K, T: TransferFunction> {
    /// Caller-chosen identifier the results are keyed by.
    pub id: K,
    /// The body's control flow graph.
    pub cfg: ControlFlowGraph,
    /// The transfer function to run over the graph.
    pub transfer: T,
    /// The initial store at the body's entry.
    pub initial: Store<T::Value>,
    /// Driver configuration for this body.
    pub config: AnalysisConfig,
}

impl<K, T: TransferFunction> Body<K, T> {
    /// Creates a work unit with the default driver configuration.
    #[must_use]
    pub fn new(id: K, cfg: ControlFlowGraph, transfer: T, initial: Store<T::Value>) -> Self {
        Self {
            id,
            cfg,
            transfer,
            initial,
            config: AnalysisConfig::default(),
        }
    }
}

/// Analyzes independent bodies in parallel.
///
/// Each body runs to completion on its own; a body whose lattice or
/// transfer function is broken records its error under its key without
/// affecting the other bodies.
///
/// The returned map is a plain snapshot: once this function returns, no
/// other thread holds a reference to it.
pub fn analyze_bodies<K, T>(bodies: Vec<Body<K, T>>) -> DashMap<K, Result<AnalysisResults<T::Value>>>
where
    K: Eq + Hash + Send + Sync,
    T: TransferFunction + Send,
    T::Value: Send + Sync,
{
    let results = DashMap::with_capacity(bodies.len());

    bodies.into_par_iter().for_each(|body| {
        let Body {
            id,
            cfg,
            transfer,
            initial,
            config,
        } = body;
        let analysis = ForwardAnalysis::with_config(&cfg, transfer, config);
        results.insert(id, analysis.run(initial));
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::{CfgBuilder, LocalId, Node, NodeKind, Terminator},
        lattice::{AbstractValue, Parameter, TypeFactory},
        store::TrackedExpr,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Flag {
        Set,
        Unknown,
    }

    impl AbstractValue for Flag {
        fn least_upper_bound(&self, other: &Self) -> Self {
            match (self, other) {
                (Flag::Set, Flag::Set) => Flag::Set,
                _ => Flag::Unknown,
            }
        }
    }

    struct FlagFactory;

    impl TypeFactory for FlagFactory {
        type Value = Flag;

        fn value_for_node(&self, _node: &Node) -> Flag {
            Flag::Unknown
        }

        fn value_for_parameter(&self, _parameter: &Parameter) -> Flag {
            Flag::Unknown
        }
    }

    struct FlagTransfer {
        factory: FlagFactory,
    }

    impl TransferFunction for FlagTransfer {
        type Value = Flag;
        type Factory = FlagFactory;

        fn factory(&self) -> &Self::Factory {
            &self.factory
        }
    }

    fn single_block_body(id: usize) -> Body<usize, FlagTransfer> {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
        builder.set_terminator(entry, Terminator::exit());
        let cfg = builder.finish().unwrap();

        let mut initial = Store::empty();
        initial.insert(TrackedExpr::local(LocalId::new(0)), Flag::Set);

        Body::new(
            id,
            cfg,
            FlagTransfer {
                factory: FlagFactory,
            },
            initial,
        )
    }

    #[test]
    fn test_batch_analyzes_every_body() {
        let bodies: Vec<_> = (0..16).map(single_block_body).collect();
        let results = analyze_bodies(bodies);

        assert_eq!(results.len(), 16);
        for id in 0..16 {
            let entry = results.get(&id).expect("every body has a result");
            let results = entry.value().as_ref().expect("analysis succeeds");
            assert_eq!(results.total_visits(), 1);
        }
    }

    #[test]
    fn test_batch_of_nothing() {
        let results = analyze_bodies(Vec::<Body<usize, FlagTransfer>>::new());
        assert!(results.is_empty());
    }
}
