//! Lightweight unique identifier for a data channel between operators.
//!
//! Every producer→consumer edge in a [`DataflowGraph`](crate::graph::DataflowGraph)
//! is named by a `StreamId`. A stream has exactly one producing node (enforced
//! by the graph) and may cross partitions; the transport collaborator resolves
//! the id to a live channel endpoint at bind time.
//!
//! Ids are minted from a process-wide monotonic counter, so they are unique
//! across every graph compiled in the same process and can be used directly as
//! wire-level channel names.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque token naming one single-producer data channel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StreamId(u64);

impl StreamId {
    /// Mint a fresh, process-wide-unique stream id.
    pub fn new() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the underlying numeric value.
    ///
    /// Useful mainly for debugging or wiring diagnostics.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}
