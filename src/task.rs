//! The per-partition binding contract between nodes and the runtime.
//!
//! A compiled [`DataflowGraph`](crate::graph::DataflowGraph) is handed to an
//! execution/transport collaborator that runs every node assigned to a
//! partition. That collaborator exposes a `TaskContext` to each node's
//! [`bind`](crate::node::Node::bind) call: the single seam through which the
//! compiler core touches live channels. The core itself never moves bytes.
//!
//! Contract the runtime must honor, per partition:
//! - every node assigned to the partition gets `bind` invoked exactly once,
//!   after all of its declared inputs are resolvable;
//! - records exported on a stream are delivered, in export order, to the
//!   node that declared that stream as an input, wherever it runs.

use crate::schema::Batch;
use crate::stream_id::StreamId;

/// Per-partition runtime capable of resolving stream ids to channel
/// payloads.
///
/// Implemented by the execution collaborator; the in-memory
/// [`LocalExecutor`](crate::testing::executor::LocalExecutor) is the
/// reference implementation used by this crate's tests.
pub trait TaskContext {
    /// Take the payload delivered on `stream`, or `None` when the stream is
    /// not (yet) resolvable on this partition.
    fn take_input(&mut self, stream: StreamId) -> Option<Batch>;

    /// Publish `batch` as the payload of `stream`.
    fn export(&mut self, stream: StreamId, batch: Batch);
}
