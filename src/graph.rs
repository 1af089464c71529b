//! The physical plan: operators assigned to partitions, wired by streams.
//!
//! A [`DataflowGraph`] owns every compiled [`Node`], the partition each node
//! runs on, and the partition producing every stream id. It is mutated only
//! while the dataset algebra compiles into it, then handed to the execution
//! layer read-only and discarded after the query.

use crate::error::CompileError;
use crate::node::Node;
use crate::partition::Partition;
use crate::stream_id::StreamId;
use std::collections::HashMap;

/// A physical operator graph over a fixed set of cluster partitions.
pub struct DataflowGraph {
    partitions: Vec<Partition>,
    assignments: HashMap<Partition, Vec<Node>>,
    producers: HashMap<StreamId, Partition>,
    next_index: u32,
}

impl DataflowGraph {
    /// Create an empty graph over the given cluster partitions.
    ///
    /// The partition list is fixed for the lifetime of the graph; structural
    /// combinators consult it when choosing shuffle targets.
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self {
            partitions,
            assignments: HashMap::new(),
            producers: HashMap::new(),
            next_index: 0,
        }
    }

    /// The cluster partitions this graph compiles against, in order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Register `node` under `partition` and claim its output streams.
    ///
    /// # Errors
    ///
    /// [`CompileError::DuplicateProducer`] if any output stream already has
    /// a producer (at-most-one-producer invariant), and
    /// [`CompileError::UnknownPartition`] if `partition` is not part of this
    /// graph.
    pub fn add_node(&mut self, partition: &Partition, node: Node) -> Result<(), CompileError> {
        if !self.partitions.contains(partition) {
            return Err(CompileError::UnknownPartition(partition.clone()));
        }
        for output in node.outputs() {
            if self.producers.contains_key(&output) {
                return Err(CompileError::DuplicateProducer(output));
            }
        }
        for output in node.outputs() {
            self.producers.insert(output, partition.clone());
        }
        self.assignments
            .entry(partition.clone())
            .or_default()
            .push(node);
        Ok(())
    }

    /// The partition producing `stream`.
    ///
    /// # Errors
    ///
    /// [`CompileError::UnknownStream`] if no registered node produces it.
    pub fn partition_of(&self, stream: StreamId) -> Result<&Partition, CompileError> {
        self.producers
            .get(&stream)
            .ok_or(CompileError::UnknownStream(stream))
    }

    /// A fresh graph-scoped node index.
    ///
    /// Monotonically increasing, used for diagnostics and deterministic
    /// replay of randomized choices only — never for wiring correctness.
    pub fn next_node_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// The node sequence assigned to `partition`, in insertion order.
    pub fn nodes_on(&self, partition: &Partition) -> &[Node] {
        self.assignments
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every (partition, node) pair, in partition order then insertion
    /// order.
    pub fn nodes(&self) -> impl Iterator<Item = (&Partition, &Node)> {
        self.partitions
            .iter()
            .flat_map(|p| self.nodes_on(p).iter().map(move |n| (p, n)))
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for DataflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("DataflowGraph");
        for partition in &self.partitions {
            s.field(partition.addr(), &self.nodes_on(partition));
        }
        s.finish()
    }
}
