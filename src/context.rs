//! Compilation context threaded through the dataset algebra.
//!
//! A [`CompileContext`] carries the target [`DataflowGraph`], the explicit
//! nonce used to pin otherwise-arbitrary partition choices, and the memo
//! table that guarantees a shared logical subtree compiles its nodes only
//! once. Compilation is a pure function of (logical plan, seed, cluster
//! state): no ambient randomness, no globals.
//!
//! The nonce starts at the seed and is overridden per subtree with
//! [`scoped_nonce`](CompileContext::scoped_nonce); the memo table is keyed
//! by (expression id, nonce), so the same expression compiled under two
//! different nonces is treated as two compilation contexts.

use crate::dataset::ExprId;
use crate::graph::DataflowGraph;
use crate::stream_id::StreamId;
use std::collections::HashMap;

/// Mutable state for one compilation of a logical query.
pub struct CompileContext {
    graph: DataflowGraph,
    memo: HashMap<(ExprId, u64), Vec<StreamId>>,
    seed: u64,
    nonce: u64,
}

impl CompileContext {
    /// Start a compilation into `graph` with an explicit `seed`.
    ///
    /// Reusing a seed against the same plan and partition list reproduces
    /// the physical graph structurally, which is what makes compiled plans
    /// debuggable and cacheable.
    pub fn new(graph: DataflowGraph, seed: u64) -> Self {
        Self {
            graph,
            memo: HashMap::new(),
            seed,
            nonce: seed,
        }
    }

    /// The seed this compilation was started with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The nonce currently in scope.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Run `f` with `nonce` pinned, restoring the previous nonce after.
    pub(crate) fn scoped_nonce<R>(&mut self, nonce: u64, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = std::mem::replace(&mut self.nonce, nonce);
        let result = f(self);
        self.nonce = prev;
        result
    }

    /// The graph being compiled into.
    pub fn graph(&self) -> &DataflowGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut DataflowGraph {
        &mut self.graph
    }

    /// A fresh graph-scoped node index.
    pub fn next_node_index(&mut self) -> u32 {
        self.graph.next_node_index()
    }

    /// Finish the compilation and hand the graph to the execution layer.
    pub fn into_graph(self) -> DataflowGraph {
        self.graph
    }

    pub(crate) fn memo_get(&self, id: ExprId) -> Option<&Vec<StreamId>> {
        self.memo.get(&(id, self.nonce))
    }

    pub(crate) fn memo_insert(&mut self, id: ExprId, channels: Vec<StreamId>) {
        self.memo.insert((id, self.nonce), channels);
    }
}
