//! Benchmarks for the fixpoint driver.
//!
//! Measures driver throughput on synthetic control flow shapes:
//! - a long straight-line chain of assignments
//! - a diamond ladder of repeated branch/merge pairs
//! - nested loops that force repeated revisits before stabilization

extern crate qualflow;

use criterion::{criterion_group, criterion_main, Criterion};
use qualflow::prelude::*;
use std::hint::black_box;

/// Two-point lattice: a tracked value is refined or unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refined {
    Yes,
    Unknown,
}

impl AbstractValue for Refined {
    fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (Refined::Yes, Refined::Yes) => Refined::Yes,
            _ => Refined::Unknown,
        }
    }
}

struct RefinedFactory;

impl TypeFactory for RefinedFactory {
    type Value = Refined;

    fn value_for_node(&self, node: &Node) -> Refined {
        match node.kind() {
            NodeKind::Literal(_) => Refined::Yes,
            _ => Refined::Unknown,
        }
    }

    fn value_for_parameter(&self, _parameter: &Parameter) -> Refined {
        Refined::Unknown
    }
}

struct RefinedTransfer {
    factory: RefinedFactory,
}

impl RefinedTransfer {
    fn new() -> Self {
        Self {
            factory: RefinedFactory,
        }
    }
}

impl TransferFunction for RefinedTransfer {
    type Value = Refined;
    type Factory = RefinedFactory;

    fn factory(&self) -> &Self::Factory {
        &self.factory
    }
}

/// Push `local = <int literal>` onto a block.
fn push_assignment(builder: &mut CfgBuilder, block: BlockId, local: u32) {
    let target = builder.push_node(block, NodeKind::LocalRead(LocalId::new(local)));
    let value = builder.push_node(block, NodeKind::Literal(LiteralValue::Int(i64::from(local))));
    builder.push_node(block, NodeKind::Assignment { target, value });
}

/// A single block with `n` back-to-back assignments over `n` locals.
fn straight_line(n: u32) -> ControlFlowGraph {
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    for local in 0..n {
        push_assignment(&mut builder, entry, local);
    }
    builder.set_terminator(entry, Terminator::exit());
    builder.finish().expect("straight line is well-formed")
}

/// `n` stacked diamonds, each branching on a literal and re-merging.
fn diamond_ladder(n: u32) -> ControlFlowGraph {
    let mut builder = CfgBuilder::new();
    let mut current = builder.new_block();
    for _ in 0..n {
        let then_block = builder.new_block();
        let else_block = builder.new_block();
        let merge = builder.new_block();

        let cond = builder.push_node(current, NodeKind::Literal(LiteralValue::Bool(true)));
        builder.set_terminator(current, Terminator::conditional(cond, then_block, else_block));
        push_assignment(&mut builder, then_block, 0);
        builder.set_terminator(then_block, Terminator::regular(merge));
        push_assignment(&mut builder, else_block, 1);
        builder.set_terminator(else_block, Terminator::regular(merge));
        current = merge;
    }
    builder.set_terminator(current, Terminator::exit());
    builder.finish().expect("diamond ladder is well-formed")
}

/// `depth` nested loops, each with a small body of assignments.
fn nested_loops(depth: u32) -> ControlFlowGraph {
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let exit = builder.new_block();

    let mut outer_after = exit;
    let mut current = entry;
    for local in 0..depth {
        let header = builder.new_block();
        let body = builder.new_block();

        builder.set_terminator(current, Terminator::regular(header));
        let cond = builder.push_node(header, NodeKind::Literal(LiteralValue::Bool(true)));
        builder.set_terminator(header, Terminator::conditional(cond, body, outer_after));
        push_assignment(&mut builder, body, local);

        // The innermost body jumps back to its own header; every level
        // above has its back edge installed by the next iteration.
        builder.set_terminator(body, Terminator::regular(header));
        outer_after = header;
        current = body;
    }
    builder.set_terminator(exit, Terminator::exit());
    builder.finish().expect("nested loops are well-formed")
}

fn bench_straight_line(c: &mut Criterion) {
    let cfg = straight_line(256);

    c.bench_function("fixpoint_straight_line_256", |b| {
        b.iter(|| {
            let analysis = ForwardAnalysis::new(black_box(&cfg), RefinedTransfer::new());
            let results = analysis.run(Store::empty()).unwrap();
            black_box(results)
        });
    });
}

fn bench_diamond_ladder(c: &mut Criterion) {
    let cfg = diamond_ladder(64);

    c.bench_function("fixpoint_diamond_ladder_64", |b| {
        b.iter(|| {
            let analysis = ForwardAnalysis::new(black_box(&cfg), RefinedTransfer::new());
            let results = analysis.run(Store::empty()).unwrap();
            black_box(results)
        });
    });
}

fn bench_nested_loops(c: &mut Criterion) {
    let cfg = nested_loops(8);

    let mut initial = Store::empty();
    for local in 0..8 {
        initial.insert(TrackedExpr::local(LocalId::new(local)), Refined::Yes);
    }

    c.bench_function("fixpoint_nested_loops_8", |b| {
        b.iter(|| {
            let analysis = ForwardAnalysis::new(black_box(&cfg), RefinedTransfer::new());
            let results = analysis.run(black_box(initial.clone())).unwrap();
            black_box(results)
        });
    });
}

criterion_group!(
    benches,
    bench_straight_line,
    bench_diamond_ladder,
    bench_nested_loops
);
criterion_main!(benches);
