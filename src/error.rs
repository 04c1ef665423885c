use thiserror::Error;

use crate::cfg::BlockId;

/// The generic Error type, which provides coverage for all errors this
/// library can potentially return.
///
/// Two categories exist. Graph construction errors come out of
/// [`CfgBuilder::finish`](crate::cfg::CfgBuilder::finish) when the recorded
/// structure is inconsistent. [`Error::FixpointDivergence`] is different in
/// kind: the driver itself never fails on well-formed input, so hitting the
/// visit cap means the *supplied* lattice or transfer function violates its
/// finite-height/monotonicity contract. It is a defect report about the
/// checker, not a user-facing diagnostic, and analysis of the affected body
/// is simply aborted.
///
/// Deliberate precision loss is never an error: unknown assignment targets,
/// disabled assertions, and unanalyzable exceptional paths are absorbed by
/// store invalidation.
///
/// # Examples
///
/// ```rust
/// use qualflow::{cfg::CfgBuilder, Error};
///
/// match CfgBuilder::new().finish() {
///     Err(Error::EmptyGraph) => {}
///     other => panic!("expected EmptyGraph, got {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A graph was finished without any block.
    ///
    /// Every analyzable body has at least an entry block; an empty builder
    /// indicates the front end lowered nothing.
    #[error("Cannot build a control flow graph without blocks")]
    EmptyGraph,

    /// The recorded graph structure is inconsistent.
    ///
    /// Produced when a terminator names a successor that does not exist, a
    /// block lacks a terminator, a conditional branches on a foreign node,
    /// or a node's operand does not precede it in its own block. The
    /// message pinpoints the offending block or node.
    #[error("Malformed control flow graph: {0}")]
    MalformedGraph(String),

    /// A pending input kept changing past the configured visit cap.
    ///
    /// A finite-height lattice bounds how often any block's pending input
    /// can change, so exceeding the cap means the supplied lattice or
    /// transfer function is broken. The engine cannot make progress without
    /// those guarantees and aborts the analysis of this body.
    #[error(
        "Fixpoint iteration visited block {block} {visits} times without stabilizing; \
         the supplied lattice or transfer function violates its contract"
    )]
    FixpointDivergence {
        /// The block whose pending input failed to stabilize.
        block: BlockId,
        /// The number of visits performed when the run was aborted.
        visits: usize,
    },
}
