//! Error taxonomy for plan compilation and node binding.
//!
//! [`CompileError`] covers malformed plans and is always fatal to the
//! compilation of the affected query: callers must discard the partially
//! built graph. [`BindError`] covers misuse of the node binding contract and
//! is surfaced to the caller of [`Node::bind`](crate::node::Node::bind).
//!
//! Runtime data errors (malformed records, reducer panics) are the
//! execution/transport collaborator's concern; nothing in this crate
//! produces them.

use crate::partition::Partition;
use crate::stream_id::StreamId;
use thiserror::Error;

/// A malformed logical plan or graph mutation. Fatal to the compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A node declared an output stream that already has a producer.
    #[error("{0} already has a producing node")]
    DuplicateProducer(StreamId),

    /// A stream id was referenced before any node produced it.
    #[error("{0} has no registered producer")]
    UnknownStream(StreamId),

    /// A node was assigned to a partition the graph was not built with.
    #[error("partition {0} is not part of this graph")]
    UnknownPartition(Partition),

    /// Sharding or compilation was attempted against an empty partition set.
    #[error("at least one alive partition is required")]
    NoAlivePartitions,

    /// The sharder replication factor must be at least one.
    #[error("replication factor must be positive, got {0}")]
    InvalidReplication(usize),

    /// An alive assignee passed to the sharder is not in the shard key set.
    #[error("alive assignee is not a member of the shard key set")]
    UnknownAssignee,

    /// A logical expression id was not found in its plan arena.
    #[error("logical plan has no expression with id {0}")]
    UnknownExpr(u64),
}

/// Misuse of the node binding contract. Fatal, surfaced from `bind`.
#[derive(Debug, Error)]
pub enum BindError {
    /// `bind` was invoked twice on the same node.
    #[error("node {index} was bound twice")]
    AlreadyBound { index: u32 },

    /// A declared input stream could not be resolved by the task runtime.
    #[error("input {stream} of node {index} is not resolvable")]
    UnresolvedInput { index: u32, stream: StreamId },

    /// A resolved payload did not hold the element type the node expects.
    #[error("payload on {stream} is not a batch of {expected}")]
    PayloadType {
        stream: StreamId,
        expected: &'static str,
    },
}
