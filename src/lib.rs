//! # Loomflow
//!
//! A **distributed dataset execution compiler** for Rust. Loomflow turns a
//! lazy, typed dataset algebra into an explicit per-partition dataflow
//! graph of operator nodes wired together by channels, ready to be handed
//! to an execution substrate.
//!
//! ## Key Features
//!
//! - **Lazy dataset algebra** - map, filter, union, local sort, shuffle,
//!   sorted reduce, and distributed offset/limit over typed handles
//! - **Sortedness in the types** - [`LocallySortedDataset`] and
//!   [`SortedDataset`] carry the ordering invariant, so only valid
//!   combinator chains compile
//! - **Rendezvous sharding** - minimal-disruption key routing with
//!   replication and precomputed bucket tables
//! - **Deterministic compilation** - the same plan, partitions, and seed
//!   always produce the same graph shape
//! - **Two-phase offset/limit** - per-partition pushdown followed by an
//!   exact pass on a single merge target
//! - **In-process test executor** - run compiled graphs on one machine,
//!   with shuffle batches round-tripped through the wire codec
//!
//! ## Quick Start
//!
//! ```ignore
//! use loomflow::*;
//! use loomflow::testing::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! // Describe the computation lazily.
//! let plan = LogicalPlan::new();
//! let words = from_partitions(&plan, vec![
//!     vec!["loom".to_string(), "flow".to_string()],
//!     vec!["loom".to_string()],
//! ]);
//!
//! let distinct = words
//!     .local_sort(|w: &String| w.clone())
//!     .reduce_by_key(Deduplicate);
//!
//! // Compile it for a two-partition cluster.
//! let graph = DataflowGraph::new(test_partitions(2));
//! let mut ctx = CompileContext::new(graph, 42);
//! let channels = distinct.channels(&mut ctx)?;
//!
//! // Execute in-process and read the results.
//! let mut exec = LocalExecutor::new();
//! exec.run(&ctx.into_graph())?;
//! let results: Vec<String> = exec.collect(&channels)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### LogicalPlan and Dataset
//!
//! A [`LogicalPlan`] is the arena holding an immutable expression tree.
//! [`Dataset<T>`] handles wrap expression ids and expose combinators;
//! nothing executes until the handle is compiled.
//!
//! ### Compilation
//!
//! [`Dataset::channels`] walks the expression tree bottom-up through a
//! [`CompileContext`], placing [`Node`]s on the partitions of a
//! [`DataflowGraph`] and returning the dataset's output channels. Shared
//! subtrees compile once per context thanks to a memo table keyed by
//! (expression, nonce).
//!
//! ### Execution
//!
//! A compiled [`Node`] binds exactly once against a [`TaskContext`], the
//! seam an execution substrate implements to supply input channels and
//! accept output channels. [`testing::LocalExecutor`] is the in-process
//! implementation used by this crate's tests.

pub mod context;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod node;
pub mod partition;
pub mod reducers;
pub mod schema;
pub mod sharder;
pub mod stream_id;
pub mod task;
pub mod testing;

pub use context::CompileContext;
pub use dataset::{
    Dataset, ExprId, LocallySortedDataset, LogicalPlan, NO_LIMIT, NO_OFFSET, Record, SortedDataset,
    empty, from_partitions,
};
pub use error::{BindError, CompileError};
pub use graph::DataflowGraph;
pub use node::{MergeFn, Node, NodeKind, RouteFn, UnaryFn};
pub use partition::Partition;
pub use reducers::{Deduplicate, Fold, Merge, Reducer, merge_sorted_runs};
pub use schema::{Batch, StreamSchema, TypeTag};
pub use sharder::RendezvousSharder;
pub use stream_id::StreamId;
pub use task::TaskContext;
