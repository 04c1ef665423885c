//! End-to-end fixpoint analysis integration tests.
//!
//! These tests exercise the complete pipeline using the public API:
//! 1. Assemble a control flow graph with `CfgBuilder`
//! 2. Supply a small qualifier lattice and type factory
//! 3. Run `ForwardAnalysis` to its fixpoint
//! 4. Verify per-node values and stores against the expected refinements

use qualflow::prelude::*;

// ================================================================================================
// A string-constancy lattice: a value is either a known exact string or
// unrestricted. Exact strings sit below the unrestricted top.
// ================================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum StrVal {
    Exact(String),
    Any,
}

impl StrVal {
    fn exact(s: &str) -> Self {
        StrVal::Exact(s.to_string())
    }
}

impl AbstractValue for StrVal {
    fn least_upper_bound(&self, other: &Self) -> Self {
        match (self, other) {
            (StrVal::Exact(a), StrVal::Exact(b)) if a == b => StrVal::Exact(a.clone()),
            _ => StrVal::Any,
        }
    }
}

struct StrFactory;

impl TypeFactory for StrFactory {
    type Value = StrVal;

    fn value_for_node(&self, node: &Node) -> StrVal {
        match node.kind() {
            NodeKind::Literal(LiteralValue::String(s)) => StrVal::exact(s),
            _ => StrVal::Any,
        }
    }

    fn value_for_parameter(&self, _parameter: &Parameter) -> StrVal {
        StrVal::Any
    }
}

struct StrTransfer {
    factory: StrFactory,
}

impl StrTransfer {
    fn new() -> Self {
        Self {
            factory: StrFactory,
        }
    }
}

impl TransferFunction for StrTransfer {
    type Value = StrVal;
    type Factory = StrFactory;

    fn factory(&self) -> &Self::Factory {
        &self.factory
    }
}

/// Push the nodes of `local = "literal"` onto a block, returning the
/// assignment node.
fn push_string_assignment(
    builder: &mut CfgBuilder,
    block: BlockId,
    local: u32,
    literal: &str,
) -> NodeId {
    let target = builder.push_node(block, NodeKind::LocalRead(LocalId::new(local)));
    let value = builder.push_node(
        block,
        NodeKind::Literal(LiteralValue::String(literal.to_string())),
    );
    builder.push_node(block, NodeKind::Assignment { target, value })
}

fn local_key(index: u32) -> TrackedExpr {
    TrackedExpr::local(LocalId::new(index))
}

#[test]
fn test_straight_line_copy_propagates_refinement() -> Result<()> {
    // x = "a"; y = x;
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    push_string_assignment(&mut builder, entry, 0, "a");
    let y_target = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(1)));
    let x_read = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
    let copy = builder.push_node(
        entry,
        NodeKind::Assignment {
            target: y_target,
            value: x_read,
        },
    );
    builder.set_terminator(entry, Terminator::exit());
    let cfg = builder.finish()?;

    let results = ForwardAnalysis::new(&cfg, StrTransfer::new()).run(Store::empty())?;

    // After y = x, both locals map to the same refinement.
    let store = results.store_after(copy).expect("copy is reachable");
    assert_eq!(store.get(&local_key(0)), Some(&StrVal::exact("a")));
    assert_eq!(store.get(&local_key(1)), Some(&StrVal::exact("a")));
    assert_eq!(store.get(&local_key(0)), store.get(&local_key(1)));
    Ok(())
}

#[test]
fn test_diamond_join_is_lub_of_branches() -> Result<()> {
    // if (cond) { x = "a"; } else { x = "b"; } followed by a join point.
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let then_block = builder.new_block();
    let else_block = builder.new_block();
    let merge = builder.new_block();

    let cond = builder.push_node(entry, NodeKind::Literal(LiteralValue::Bool(true)));
    builder.set_terminator(entry, Terminator::conditional(cond, then_block, else_block));

    push_string_assignment(&mut builder, then_block, 0, "a");
    builder.set_terminator(then_block, Terminator::regular(merge));

    push_string_assignment(&mut builder, else_block, 0, "b");
    builder.set_terminator(else_block, Terminator::regular(merge));

    let read = builder.push_node(merge, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(merge, Terminator::exit());
    let cfg = builder.finish()?;

    let results = ForwardAnalysis::new(&cfg, StrTransfer::new()).run(Store::empty())?;

    // Different strings join to the unrestricted top.
    let merge_input = results.input_before(merge).expect("merge is reachable");
    assert_eq!(merge_input.get(&local_key(0)), Some(&StrVal::Any));
    assert_eq!(results.value_of(read), Some(&StrVal::Any));
    Ok(())
}

#[test]
fn test_diamond_join_of_equal_branches_keeps_refinement() -> Result<()> {
    // Both branches assign the same string; the join must keep it.
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let then_block = builder.new_block();
    let else_block = builder.new_block();
    let merge = builder.new_block();

    let cond = builder.push_node(entry, NodeKind::Literal(LiteralValue::Bool(false)));
    builder.set_terminator(entry, Terminator::conditional(cond, then_block, else_block));
    push_string_assignment(&mut builder, then_block, 0, "same");
    builder.set_terminator(then_block, Terminator::regular(merge));
    push_string_assignment(&mut builder, else_block, 0, "same");
    builder.set_terminator(else_block, Terminator::regular(merge));
    let read = builder.push_node(merge, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(merge, Terminator::exit());
    let cfg = builder.finish()?;

    let results = ForwardAnalysis::new(&cfg, StrTransfer::new()).run(Store::empty())?;
    assert_eq!(results.value_of(read), Some(&StrVal::exact("same")));
    Ok(())
}

#[test]
fn test_loop_converges_to_join_over_iterations() -> Result<()> {
    // x = "b"; while (cond) { x = "a"; } read x;
    //
    // The loop header merges the pre-loop store with the back edge store,
    // so after convergence x holds the join of both assignments.
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let header = builder.new_block();
    let body = builder.new_block();
    let exit = builder.new_block();

    push_string_assignment(&mut builder, entry, 0, "b");
    builder.set_terminator(entry, Terminator::regular(header));

    let cond = builder.push_node(header, NodeKind::Literal(LiteralValue::Bool(true)));
    builder.set_terminator(header, Terminator::conditional(cond, body, exit));

    push_string_assignment(&mut builder, body, 0, "a");
    builder.set_terminator(body, Terminator::regular(header));

    let read = builder.push_node(exit, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(exit, Terminator::exit());
    let cfg = builder.finish()?;

    let results = ForwardAnalysis::new(&cfg, StrTransfer::new()).run(Store::empty())?;

    // Convergence: the driver terminated, and no block needed anywhere near
    // the divergence cap.
    assert!(results.block_visits(header) <= 3);

    // The post-loop store carries the least upper bound over all
    // iteration stores.
    assert_eq!(results.value_of(read), Some(&StrVal::Any));
    let exit_input = results.input_before(exit).expect("exit is reachable");
    assert_eq!(exit_input.get(&local_key(0)), Some(&StrVal::Any));
    Ok(())
}

#[test]
fn test_unknown_assignment_unrefines_aliasable_keys() -> Result<()> {
    // this.f0 = "a"; x = "b"; *unknown = ...;
    //
    // After the write through an unmodelable target, the field refinement
    // is gone while the local survives.
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();

    let receiver = builder.push_node(entry, NodeKind::Receiver);
    let field_target = builder.push_node(
        entry,
        NodeKind::FieldRead {
            receiver,
            field: FieldId::new(0),
        },
    );
    let field_value = builder.push_node(
        entry,
        NodeKind::Literal(LiteralValue::String("a".to_string())),
    );
    builder.push_node(
        entry,
        NodeKind::Assignment {
            target: field_target,
            value: field_value,
        },
    );

    push_string_assignment(&mut builder, entry, 0, "b");

    // An assignment whose target cannot be resolved to a tracked key.
    let opaque_target = builder.push_node(entry, NodeKind::Opaque);
    let unknown_value = builder.push_node(
        entry,
        NodeKind::Literal(LiteralValue::String("c".to_string())),
    );
    let unknown_write = builder.push_node(
        entry,
        NodeKind::Assignment {
            target: opaque_target,
            value: unknown_value,
        },
    );
    builder.set_terminator(entry, Terminator::exit());
    let cfg = builder.finish()?;

    let results = ForwardAnalysis::new(&cfg, StrTransfer::new()).run(Store::empty())?;

    let field_key = TrackedExpr::field(TrackedExpr::Receiver, FieldId::new(0));
    let store = results
        .store_after(unknown_write)
        .expect("write is reachable");
    assert!(store.get(&field_key).is_none());
    assert_eq!(store.get(&local_key(0)), Some(&StrVal::exact("b")));
    Ok(())
}

#[test]
fn test_initial_store_feeds_parameter_refinements() -> Result<()> {
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let read = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(entry, Terminator::exit());
    let cfg = builder.finish()?;

    let transfer = StrTransfer::new();
    let initial = transfer.initial_store(&[Parameter::new(LocalId::new(0), "s")]);
    let results = ForwardAnalysis::new(&cfg, transfer).run(initial)?;

    // The parameter's declaration-derived value flows to its first read.
    assert_eq!(results.value_of(read), Some(&StrVal::Any));
    Ok(())
}

// ================================================================================================
// A nullness-flavored lattice exercising checker-specific branch
// refinement: a transfer override narrows the then/else stores of a
// comparison against the null literal.
// ================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nullness {
    NonNull,
    Null,
    Nullable,
}

impl AbstractValue for Nullness {
    fn least_upper_bound(&self, other: &Self) -> Self {
        if self == other {
            *self
        } else {
            Nullness::Nullable
        }
    }
}

struct NullnessFactory;

impl TypeFactory for NullnessFactory {
    type Value = Nullness;

    fn value_for_node(&self, node: &Node) -> Nullness {
        match node.kind() {
            NodeKind::Literal(LiteralValue::Null) => Nullness::Null,
            NodeKind::Literal(_) => Nullness::NonNull,
            _ => Nullness::Nullable,
        }
    }

    fn value_for_parameter(&self, _parameter: &Parameter) -> Nullness {
        Nullness::Nullable
    }
}

struct NullnessTransfer {
    factory: NullnessFactory,
}

impl TransferFunction for NullnessTransfer {
    type Value = Nullness;
    type Factory = NullnessFactory;

    fn factory(&self) -> &Self::Factory {
        &self.factory
    }

    /// `x != null` proves x non-null on the then edge and null on the else
    /// edge.
    fn visit_not_equal(
        &self,
        node: &Node,
        lhs: NodeId,
        rhs: NodeId,
        input: &TransferInput<Nullness>,
        cfg: &ControlFlowGraph,
    ) -> TransferResult<Nullness> {
        let store = input.regular_store();
        let is_null_literal = |id: NodeId| {
            matches!(
                cfg.node(id).map(Node::kind),
                Some(NodeKind::Literal(LiteralValue::Null))
            )
        };
        let refined = match (is_null_literal(rhs), is_null_literal(lhs)) {
            (true, _) => TrackedExpr::from_node(cfg, lhs),
            (_, true) => TrackedExpr::from_node(cfg, rhs),
            _ => None,
        };

        match refined {
            Some(key) => {
                let mut then_store = store.clone();
                then_store.insert(key.clone(), Nullness::NonNull);
                let mut else_store = store;
                else_store.insert(key, Nullness::Null);
                TransferResult::conditional(
                    Some(self.factory().value_for_node(node)),
                    then_store,
                    else_store,
                )
            }
            None => TransferResult::conditional(
                Some(self.factory().value_for_node(node)),
                store.clone(),
                store,
            ),
        }
    }
}

#[test]
fn test_branch_refinement_reaches_matching_successor() -> Result<()> {
    // if (x != null) { read x } else { read x }
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let then_block = builder.new_block();
    let else_block = builder.new_block();

    let x = builder.push_node(entry, NodeKind::LocalRead(LocalId::new(0)));
    let null = builder.push_node(entry, NodeKind::Literal(LiteralValue::Null));
    let cmp = builder.push_node(entry, NodeKind::NotEqual { lhs: x, rhs: null });
    builder.set_terminator(entry, Terminator::conditional(cmp, then_block, else_block));

    let then_read = builder.push_node(then_block, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(then_block, Terminator::exit());
    let else_read = builder.push_node(else_block, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(else_block, Terminator::exit());
    let cfg = builder.finish()?;

    let transfer = NullnessTransfer {
        factory: NullnessFactory,
    };
    let results = ForwardAnalysis::new(&cfg, transfer).run(Store::empty())?;

    // Each branch observes its own refinement of the same local.
    assert_eq!(results.value_of(then_read), Some(&Nullness::NonNull));
    assert_eq!(results.value_of(else_read), Some(&Nullness::Null));
    Ok(())
}

#[test]
fn test_exceptional_edge_receives_per_category_store() -> Result<()> {
    // A field read can fail on an absent receiver; the handler block must
    // observe the state routed along the matching exceptional edge.
    let mut builder = CfgBuilder::new();
    let entry = builder.new_block();
    let handler = builder.new_block();
    let exit = builder.new_block();

    push_string_assignment(&mut builder, entry, 0, "tracked");
    let receiver = builder.push_node(entry, NodeKind::Receiver);
    builder.push_node(
        entry,
        NodeKind::FieldRead {
            receiver,
            field: FieldId::new(1),
        },
    );
    builder.set_terminator(
        entry,
        Terminator::exceptional(
            Some(exit),
            vec![(ExceptionKind::NullDereference, handler)],
        ),
    );

    let handler_read = builder.push_node(handler, NodeKind::LocalRead(LocalId::new(0)));
    builder.set_terminator(handler, Terminator::exit());
    builder.set_terminator(exit, Terminator::exit());
    let cfg = builder.finish()?;

    let results = ForwardAnalysis::new(&cfg, StrTransfer::new()).run(Store::empty())?;

    // The refinement established before the failing access is visible in
    // the handler.
    assert_eq!(
        results.value_of(handler_read),
        Some(&StrVal::exact("tracked"))
    );
    Ok(())
}

#[test]
fn test_analysis_is_deterministic() -> Result<()> {
    // Two identical runs produce identical per-block inputs and visit
    // counts.
    let build = || -> Result<ControlFlowGraph> {
        let mut builder = CfgBuilder::new();
        let entry = builder.new_block();
        let header = builder.new_block();
        let body = builder.new_block();
        let exit = builder.new_block();
        push_string_assignment(&mut builder, entry, 0, "b");
        builder.set_terminator(entry, Terminator::regular(header));
        let cond = builder.push_node(header, NodeKind::Literal(LiteralValue::Bool(true)));
        builder.set_terminator(header, Terminator::conditional(cond, body, exit));
        push_string_assignment(&mut builder, body, 0, "a");
        builder.set_terminator(body, Terminator::regular(header));
        builder.push_node(exit, NodeKind::LocalRead(LocalId::new(0)));
        builder.set_terminator(exit, Terminator::exit());
        builder.finish()
    };

    let cfg_a = build()?;
    let cfg_b = build()?;
    let results_a = ForwardAnalysis::new(&cfg_a, StrTransfer::new()).run(Store::empty())?;
    let results_b = ForwardAnalysis::new(&cfg_b, StrTransfer::new()).run(Store::empty())?;

    for index in 0..cfg_a.block_count() {
        let block = BlockId::new(index);
        assert_eq!(results_a.block_visits(block), results_b.block_visits(block));
        assert_eq!(results_a.input_before(block), results_b.input_before(block));
    }
    Ok(())
}
