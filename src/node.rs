//! Physical operators: one unit of per-partition computation.
//!
//! A [`Node`] is a closed variant over operator kinds, each declaring the
//! stream ids it consumes and produces. Operator logic is captured as
//! type-erased closures built where the element type is statically known
//! (at the dataset combinator), so the graph itself carries no generic
//! parameters.
//!
//! A node is `Unbound` at construction and transitions to `Bound` exactly
//! once when the partition runtime invokes [`Node::bind`]; binding twice is
//! a fatal usage error. Parameters never change after construction, and a
//! node is owned exclusively by the graph that contains it.

use crate::error::BindError;
use crate::schema::{Batch, StreamSchema};
use crate::stream_id::StreamId;
use crate::task::TaskContext;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A type-erased element-wise stage: one batch in, one batch out.
pub type UnaryFn = Arc<dyn Fn(Batch) -> Batch + Send + Sync>;

/// A type-erased shuffle router: one batch in, one batch per destination
/// out, in destination order.
pub type RouteFn = Arc<dyn Fn(Batch) -> Vec<Batch> + Send + Sync>;

/// A type-erased fan-in stage: one batch per upstream in (in declared input
/// order), one merged batch out.
pub type MergeFn = Arc<dyn Fn(Vec<Batch>) -> Batch + Send + Sync>;

/// Kind-specific operator parameters.
pub enum NodeKind {
    /// In-memory data source: clones its payload onto the output channel.
    Source {
        schema: StreamSchema,
        payload: Arc<dyn Any + Send + Sync>,
        output: StreamId,
    },
    /// Element-wise mapping.
    Map {
        apply: UnaryFn,
        input: StreamId,
        output: StreamId,
    },
    /// Element-wise predicate filter.
    Filter {
        apply: UnaryFn,
        input: StreamId,
        output: StreamId,
    },
    /// Local in-partition sort by extracted key.
    Sort {
        apply: UnaryFn,
        input: StreamId,
        output: StreamId,
    },
    /// Shuffle fan-out: routes each record to the destination selected by
    /// the sharder embedded in `route`. One output stream per destination.
    Shard {
        schema: StreamSchema,
        route: RouteFn,
        input: StreamId,
        outputs: Vec<StreamId>,
    },
    /// Shuffle fan-in: merges already-sorted sub-streams, combining runs of
    /// equal keys per the reducer embedded in `merge`.
    Reduce {
        merge: MergeFn,
        inputs: Vec<StreamId>,
        output: StreamId,
    },
    /// Order-of-arrival concatenation of co-located streams.
    Union {
        merge: MergeFn,
        inputs: Vec<StreamId>,
        output: StreamId,
    },
    /// Exact skip/take over a single stream.
    OffsetLimit {
        offset: u64,
        limit: u64,
        apply: UnaryFn,
        input: StreamId,
        output: StreamId,
    },
}

/// One operator instance, assigned to exactly one partition.
pub struct Node {
    index: u32,
    bound: AtomicBool,
    kind: NodeKind,
}

impl Node {
    /// Create an unbound node. `index` is graph-scoped and used only for
    /// diagnostics and deterministic replay, never for wiring.
    pub fn new(index: u32, kind: NodeKind) -> Self {
        Self {
            index,
            bound: AtomicBool::new(false),
            kind,
        }
    }

    /// Graph-scoped assignment/debug identity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Kind-specific parameters.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Short name of the operator kind.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Source { .. } => "Source",
            NodeKind::Map { .. } => "Map",
            NodeKind::Filter { .. } => "Filter",
            NodeKind::Sort { .. } => "Sort",
            NodeKind::Shard { .. } => "Shard",
            NodeKind::Reduce { .. } => "Reduce",
            NodeKind::Union { .. } => "Union",
            NodeKind::OffsetLimit { .. } => "OffsetLimit",
        }
    }

    /// Ordered stream ids this node consumes.
    pub fn inputs(&self) -> Vec<StreamId> {
        match &self.kind {
            NodeKind::Source { .. } => Vec::new(),
            NodeKind::Map { input, .. }
            | NodeKind::Filter { input, .. }
            | NodeKind::Sort { input, .. }
            | NodeKind::Shard { input, .. }
            | NodeKind::OffsetLimit { input, .. } => vec![*input],
            NodeKind::Reduce { inputs, .. } | NodeKind::Union { inputs, .. } => inputs.clone(),
        }
    }

    /// Ordered stream ids this node produces.
    pub fn outputs(&self) -> Vec<StreamId> {
        match &self.kind {
            NodeKind::Source { output, .. }
            | NodeKind::Map { output, .. }
            | NodeKind::Filter { output, .. }
            | NodeKind::Sort { output, .. }
            | NodeKind::Reduce { output, .. }
            | NodeKind::Union { output, .. }
            | NodeKind::OffsetLimit { output, .. } => vec![*output],
            NodeKind::Shard { outputs, .. } => outputs.clone(),
        }
    }

    /// Whether this node has been bound by a partition runtime.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::SeqCst)
    }

    /// Wire this node between its resolved input and output channels.
    ///
    /// Invoked exactly once by the partition runtime, after every declared
    /// input is resolvable through `task`.
    ///
    /// # Errors
    ///
    /// [`BindError::AlreadyBound`] on a second invocation,
    /// [`BindError::UnresolvedInput`] when an input cannot be resolved, and
    /// [`BindError::PayloadType`] when a source payload does not match its
    /// schema.
    pub fn bind(&self, task: &mut dyn TaskContext) -> Result<(), BindError> {
        if self.bound.swap(true, Ordering::SeqCst) {
            return Err(BindError::AlreadyBound { index: self.index });
        }
        match &self.kind {
            NodeKind::Source {
                schema,
                payload,
                output,
            } => {
                let batch = schema
                    .clone_batch(payload.as_ref())
                    .ok_or(BindError::PayloadType {
                        stream: *output,
                        expected: schema.type_tag().name,
                    })?;
                task.export(*output, batch);
            }
            NodeKind::Map {
                apply,
                input,
                output,
            }
            | NodeKind::Filter {
                apply,
                input,
                output,
            }
            | NodeKind::Sort {
                apply,
                input,
                output,
            }
            | NodeKind::OffsetLimit {
                apply,
                input,
                output,
                ..
            } => {
                let batch = self.take(task, *input)?;
                task.export(*output, apply(batch));
            }
            NodeKind::Shard {
                route,
                input,
                outputs,
                ..
            } => {
                let batch = self.take(task, *input)?;
                let parts = route(batch);
                debug_assert_eq!(parts.len(), outputs.len());
                for (out, part) in outputs.iter().zip(parts) {
                    task.export(*out, part);
                }
            }
            NodeKind::Reduce {
                merge,
                inputs,
                output,
            }
            | NodeKind::Union {
                merge,
                inputs,
                output,
            } => {
                let mut batches = Vec::with_capacity(inputs.len());
                for input in inputs {
                    batches.push(self.take(task, *input)?);
                }
                task.export(*output, merge(batches));
            }
        }
        Ok(())
    }

    fn take(&self, task: &mut dyn TaskContext, stream: StreamId) -> Result<Batch, BindError> {
        task.take_input(stream).ok_or(BindError::UnresolvedInput {
            index: self.index,
            stream,
        })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("index", &self.index)
            .field("kind", &self.kind_name())
            .field("inputs", &self.inputs())
            .field("outputs", &self.outputs())
            .finish()
    }
}
