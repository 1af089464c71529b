//! Test support for compiled dataflow graphs.
//!
//! This module provides an in-process, single-machine realization of a
//! [`DataflowGraph`](crate::graph::DataflowGraph): every partition of the
//! graph runs inside the current process, channels are plain in-memory
//! batches, and shuffle boundaries still round-trip their batches through
//! the stream codec so serialization bugs surface in tests.
//!
//! # Quick start
//!
//! ```no_run
//! use loomflow::testing::*;
//! use loomflow::{CompileContext, DataflowGraph, LogicalPlan, from_partitions};
//!
//! #[test]
//! fn doubles_every_record() -> anyhow::Result<()> {
//!     let plan = LogicalPlan::new();
//!     let dataset = from_partitions(&plan, vec![vec![1, 2], vec![3]]).map(|x: &i32| x * 2);
//!
//!     let graph = DataflowGraph::new(test_partitions(2));
//!     let mut ctx = CompileContext::new(graph, 0);
//!     let channels = dataset.channels(&mut ctx)?;
//!
//!     let mut exec = LocalExecutor::new();
//!     exec.run(&ctx.into_graph())?;
//!     assert_collections_unordered_equal(&exec.collect::<i32>(&channels)?, &[2, 4, 6]);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod executor;

pub use assertions::{assert_all, assert_collections_equal, assert_collections_unordered_equal};
pub use executor::LocalExecutor;

use crate::graph::DataflowGraph;
use crate::partition::Partition;
use crate::stream_id::StreamId;
use std::collections::HashMap;

/// Build `n` partitions named `worker-0` .. `worker-{n-1}`.
pub fn test_partitions(n: usize) -> Vec<Partition> {
    (0..n).map(|i| Partition::new(format!("worker-{i}"))).collect()
}

/// Render a graph as a list of node descriptions with channel ids
/// renumbered in first-seen order.
///
/// Channel ids come from a process-wide counter, so two compilations of
/// the same plan never share raw ids. The canonical form lets tests
/// compare graph shapes across compilations.
pub fn graph_signature(graph: &DataflowGraph) -> Vec<String> {
    let mut names: HashMap<StreamId, usize> = HashMap::new();
    graph
        .nodes()
        .map(|(partition, node)| {
            let ins: Vec<usize> = node
                .inputs()
                .into_iter()
                .map(|id| canon(&mut names, id))
                .collect();
            let outs: Vec<usize> = node
                .outputs()
                .into_iter()
                .map(|id| canon(&mut names, id))
                .collect();
            format!("{partition} {} {ins:?} -> {outs:?}", node.kind_name())
        })
        .collect()
}

fn canon(names: &mut HashMap<StreamId, usize>, id: StreamId) -> usize {
    let next = names.len();
    *names.entry(id).or_insert(next)
}
