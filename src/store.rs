//! The refinement store: tracked expressions mapped to abstract values.
//!
//! A store records, for every trackable program-state location, the most
//! refined qualifier information the analysis has established on the
//! current path. Locations precise enough to serve as keys are local
//! variables, the receiver, field accesses rooted in trackable expressions,
//! and results of pure calls over trackable operands.
//!
//! Stores are value-like: mutating one must never be visible through a
//! previously taken copy. Every sharing point in the engine clones before
//! mutating, so [`Store`] is a plain owned map with no interior mutability.
//!
//! # Absent Keys
//!
//! A key absent from the store means "use the declared type", never an
//! error and never bottom. The join of two stores therefore keeps only keys
//! tracked on both sides: information present on one path only is covered
//! by the declared type after a merge.

use std::collections::HashMap;
use std::fmt;

use crate::{
    cfg::{ControlFlowGraph, FieldId, LocalId, MethodId, NodeId, NodeKind},
    lattice::AbstractValue,
};

/// A program-state location precise enough to serve as a store key.
///
/// Unlike nodes, tracked expressions compare structurally: every read of
/// local 0 maps to the same `Local` key, so refinements established at one
/// occurrence apply to all later ones on the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackedExpr {
    /// A local variable slot.
    Local(LocalId),
    /// The receiver of the analyzed body.
    Receiver,
    /// A field access rooted in a trackable base expression.
    Field {
        /// The expression producing the receiver object.
        base: Box<TrackedExpr>,
        /// The accessed field.
        field: FieldId,
    },
    /// The result of a pure call over trackable operands.
    PureCall {
        /// The invoked method.
        method: MethodId,
        /// The receiver expression, if the method has one.
        receiver: Option<Box<TrackedExpr>>,
        /// The argument expressions, in declaration order.
        args: Vec<TrackedExpr>,
    },
}

impl TrackedExpr {
    /// Creates a local variable key.
    #[must_use]
    pub const fn local(local: LocalId) -> Self {
        TrackedExpr::Local(local)
    }

    /// Creates a field access key.
    #[must_use]
    pub fn field(base: TrackedExpr, field: FieldId) -> Self {
        TrackedExpr::Field {
            base: Box::new(base),
            field,
        }
    }

    /// Derives the tracked expression a node stands for, if any.
    ///
    /// Returns `None` for nodes that are not trackable, such as literals,
    /// comparisons, or calls that are not pure. A field access or pure call
    /// is only trackable when all of its constituent expressions are.
    #[must_use]
    pub fn from_node(cfg: &ControlFlowGraph, node: NodeId) -> Option<Self> {
        match cfg.node(node)?.kind() {
            NodeKind::LocalRead(local) => Some(TrackedExpr::Local(*local)),
            NodeKind::Receiver => Some(TrackedExpr::Receiver),
            NodeKind::FieldRead { receiver, field } => Some(TrackedExpr::Field {
                base: Box::new(Self::from_node(cfg, *receiver)?),
                field: *field,
            }),
            NodeKind::Call {
                method,
                receiver,
                args,
                pure: true,
            } => {
                let receiver = match receiver {
                    Some(r) => Some(Box::new(Self::from_node(cfg, *r)?)),
                    None => None,
                };
                let args = args
                    .iter()
                    .map(|arg| Self::from_node(cfg, *arg))
                    .collect::<Option<Vec<_>>>()?;
                Some(TrackedExpr::PureCall {
                    method: *method,
                    receiver,
                    args,
                })
            }
            _ => None,
        }
    }

    /// Returns `true` if `other` occurs anywhere within this expression,
    /// including as the whole expression.
    #[must_use]
    pub fn contains(&self, other: &TrackedExpr) -> bool {
        if self == other {
            return true;
        }
        match self {
            TrackedExpr::Local(_) | TrackedExpr::Receiver => false,
            TrackedExpr::Field { base, .. } => base.contains(other),
            TrackedExpr::PureCall { receiver, args, .. } => {
                receiver.as_deref().is_some_and(|r| r.contains(other))
                    || args.iter().any(|arg| arg.contains(other))
            }
        }
    }
}

impl fmt::Display for TrackedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedExpr::Local(local) => write!(f, "{local}"),
            TrackedExpr::Receiver => write!(f, "this"),
            TrackedExpr::Field { base, field } => write!(f, "{base}.{field}"),
            TrackedExpr::PureCall {
                method,
                receiver,
                args,
            } => {
                if let Some(receiver) = receiver {
                    write!(f, "{receiver}.")?;
                }
                write!(f, "{method}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A mapping from tracked expressions to abstract values.
///
/// # Update Discipline
///
/// Two mutation entry points exist, matching the two kinds of writes a
/// program can perform:
///
/// - [`update_for_assignment`](Self::update_for_assignment) for writes whose
///   target resolves to a tracked key: a strong update of that key plus
///   invalidation of every entry the write could reach through aliasing.
/// - [`update_for_unknown_assignment`](Self::update_for_unknown_assignment)
///   for writes through targets the analysis cannot model: every entry an
///   unknown write could alias is dropped.
///
/// Neither operation can fail; precision loss is the designed outcome, not
/// an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Store<V: AbstractValue> {
    entries: HashMap<TrackedExpr, V>,
}

impl<V: AbstractValue> Store<V> {
    /// Creates an empty store, in which every location has its declared
    /// type.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Returns the refined value tracked for a key, or `None` when the
    /// declared type applies.
    #[must_use]
    pub fn get(&self, key: &TrackedExpr) -> Option<&V> {
        self.entries.get(key)
    }

    /// Records a refined value for a key without any invalidation.
    ///
    /// Used when *learning* about a location, for example from a branch
    /// condition; writes to a location go through
    /// [`update_for_assignment`](Self::update_for_assignment) instead.
    pub fn insert(&mut self, key: TrackedExpr, value: V) {
        self.entries.insert(key, value);
    }

    /// Performs the strong update for an assignment to `key`.
    ///
    /// Every other entry whose value could be changed by this write is
    /// dropped first:
    ///
    /// - entries that mention the overwritten location as a sub-expression
    ///   (their meaning changes with it),
    /// - for field writes, entries for the same field under any other
    ///   receiver (the receivers cannot be proven distinct), and all pure
    ///   call results (they may depend on the written field).
    ///
    /// Passing `None` as the value clears the key itself after the
    /// invalidation, leaving it at its declared type.
    pub fn update_for_assignment(&mut self, key: TrackedExpr, value: Option<V>) {
        let is_field_write = matches!(key, TrackedExpr::Field { .. });
        self.entries.retain(|tracked, _| {
            if *tracked == key {
                // Replaced (or cleared) below.
                return true;
            }
            if tracked.contains(&key) {
                return false;
            }
            if is_field_write {
                let same_field = matches!(
                    (tracked, &key),
                    (
                        TrackedExpr::Field { field: f1, .. },
                        TrackedExpr::Field { field: f2, .. },
                    ) if f1 == f2
                );
                if same_field || matches!(tracked, TrackedExpr::PureCall { .. }) {
                    return false;
                }
            }
            true
        });

        match value {
            Some(value) => {
                self.entries.insert(key, value);
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    /// Conservatively invalidates for a write through an unmodelable
    /// target.
    ///
    /// All field and pure call entries are dropped. Local variables and the
    /// receiver binding survive: they cannot be reached through an
    /// indirection, only through their own assignment nodes.
    pub fn update_for_unknown_assignment(&mut self) {
        self.entries.retain(|tracked, _| {
            matches!(tracked, TrackedExpr::Local(_) | TrackedExpr::Receiver)
        });
    }

    /// Computes the pointwise join of two stores.
    ///
    /// Only keys tracked on both sides survive; for those, the values are
    /// joined. A key tracked on one side only is covered by its declared
    /// type after the merge, which is exactly what omitting it expresses.
    #[must_use]
    pub fn least_upper_bound(&self, other: &Self) -> Self {
        let mut entries = HashMap::new();
        for (key, value) in &self.entries {
            if let Some(other_value) = other.entries.get(key) {
                entries.insert(key.clone(), value.least_upper_bound(other_value));
            }
        }
        Self { entries }
    }

    /// Returns the number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the tracked keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&TrackedExpr, &V)> {
        self.entries.iter()
    }
}

impl<V: AbstractValue> Default for Store<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V: AbstractValue> fmt::Display for Store<V> {
    /// Renders entries sorted by key text, so output is deterministic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| format!("{key} -> {value:?}"))
            .collect();
        entries.sort();
        write!(f, "{{{}}}", entries.join(", "))
    }
}
