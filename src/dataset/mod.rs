//! The logical, lazy dataset algebra.
//!
//! A [`LogicalPlan`] is the arena holding an immutable expression tree;
//! typed handles ([`Dataset`], [`LocallySortedDataset`], [`SortedDataset`])
//! wrap an expression id and expose combinators. Nothing touches a cluster
//! until [`Dataset::channels`] compiles the tree into a
//! [`DataflowGraph`](crate::graph::DataflowGraph) through a
//! [`CompileContext`](crate::context::CompileContext).
//!
//! Combinators capture their typed logic (mapping functions, key
//! extractors, reducers) as type-erased closures at the call site, so the
//! stored expression tree and the compiled graph are free of generic
//! parameters.
//!
//! Sortedness is tracked in the types: `LocallySortedDataset` promises each
//! underlying partition is sorted by the extracted key, `SortedDataset`
//! additionally promises the partitions are globally ordered. Sorted
//! handles carry their key extractor so downstream shuffles and merges can
//! reuse it.

pub(crate) mod expr;
mod offset_limit;
pub(crate) mod shuffle;

pub use offset_limit::{NO_LIMIT, NO_OFFSET};

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::node::{MergeFn, RouteFn, UnaryFn};
use crate::reducers::{Merge, Reducer, merge_sorted_runs};
use crate::schema::{Batch, StreamSchema};
use crate::sharder::RendezvousSharder;
use crate::stream_id::StreamId;
use expr::{Expr, RouteFactory, SliceFactory};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

/// Bound for record types that can flow on a channel.
pub trait Record: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}
impl<T> Record for T where T: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}

/// Identity of one logical expression within its plan arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ExprId(u64);

impl ExprId {
    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Arena owning the immutable logical expression tree of one or more
/// queries.
pub struct LogicalPlan {
    inner: Arc<Mutex<PlanInner>>,
}

struct PlanInner {
    next_id: u64,
    exprs: HashMap<ExprId, Expr>,
}

impl Default for LogicalPlan {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlanInner {
                next_id: 0,
                exprs: HashMap::new(),
            })),
        }
    }
}

impl Clone for LogicalPlan {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl LogicalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, expr: Expr) -> ExprId {
        let mut inner = self.inner.lock().unwrap();
        let id = ExprId(inner.next_id);
        inner.next_id += 1;
        inner.exprs.insert(id, expr);
        id
    }

    pub(crate) fn expr(&self, id: ExprId) -> Result<Expr, CompileError> {
        let inner = self.inner.lock().unwrap();
        inner
            .exprs
            .get(&id)
            .cloned()
            .ok_or(CompileError::UnknownExpr(id.raw()))
    }
}

/// A lazy, typed description of a distributed collection.
pub struct Dataset<T> {
    plan: LogicalPlan,
    id: ExprId,
    _t: PhantomData<T>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            id: self.id,
            _t: PhantomData,
        }
    }
}

/// A dataset whose records are sorted by `K` within each partition.
pub struct LocallySortedDataset<T, K> {
    plan: LogicalPlan,
    id: ExprId,
    key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>,
    _t: PhantomData<T>,
}

impl<T, K> Clone for LocallySortedDataset<T, K> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            id: self.id,
            key_fn: self.key_fn.clone(),
            _t: PhantomData,
        }
    }
}

/// A dataset sorted by `K` across all partitions: concatenating its
/// channels in partition order yields the globally sorted whole.
pub struct SortedDataset<T, K> {
    inner: LocallySortedDataset<T, K>,
}

impl<T, K> Clone for SortedDataset<T, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Create a dataset from in-memory per-partition payloads.
///
/// Payload `i` is placed on partition `i mod |partitions|` at compile time,
/// producing one output channel per payload.
pub fn from_partitions<T: Record>(plan: &LogicalPlan, parts: Vec<Vec<T>>) -> Dataset<T> {
    let payloads = parts
        .into_iter()
        .map(|v| Arc::new(v) as Arc<dyn Any + Send + Sync>)
        .collect();
    let id = plan.insert(Expr::Source {
        schema: StreamSchema::of::<T>(),
        payloads,
    });
    Dataset {
        plan: plan.clone(),
        id,
        _t: PhantomData,
    }
}

/// A dataset with no partitions and no records.
pub fn empty<T: Record>(plan: &LogicalPlan) -> Dataset<T> {
    from_partitions(plan, Vec::new())
}

impl<T: Record> Dataset<T> {
    /// This dataset's expression identity within its plan.
    pub fn id(&self) -> ExprId {
        self.id
    }

    /// Element-wise transformation. Preserves partition structure.
    pub fn map<O: Record>(self, f: impl Fn(&T) -> O + Send + Sync + 'static) -> Dataset<O> {
        let id = self.plan.insert(Expr::Map {
            base: self.id,
            apply: unary_map::<T, O>(f),
        });
        Dataset {
            plan: self.plan,
            id,
            _t: PhantomData,
        }
    }

    /// Keep the records matching `pred`. Preserves partition structure.
    pub fn filter(self, pred: impl Fn(&T) -> bool + Send + Sync + 'static) -> Dataset<T> {
        let id = self.plan.insert(Expr::Filter {
            base: self.id,
            apply: unary_filter::<T>(pred),
        });
        Dataset {
            plan: self.plan,
            id,
            _t: PhantomData,
        }
    }

    /// Concatenate with `other`. Both datasets must come from the same
    /// plan.
    pub fn union(self, other: Dataset<T>) -> Dataset<T> {
        debug_assert!(
            Arc::ptr_eq(&self.plan.inner, &other.plan.inner),
            "union of datasets from different plans"
        );
        let id = self.plan.insert(Expr::Union {
            left: self.id,
            right: other.id,
            concat: concat_merge::<T>(),
        });
        Dataset {
            plan: self.plan,
            id,
            _t: PhantomData,
        }
    }

    /// Redistribute records across the full cluster by key. Arrival order
    /// within a target partition is unspecified beyond per-source order.
    pub fn repartition<K>(self, key_fn: impl Fn(&T) -> K + Send + Sync + 'static) -> Dataset<T>
    where
        K: Hash + Send + Sync + 'static,
    {
        let key_fn: Arc<dyn Fn(&T) -> K + Send + Sync> = Arc::new(key_fn);
        let id = self.plan.insert(Expr::Repartition {
            base: self.id,
            schema: StreamSchema::of::<T>(),
            route: key_route::<T, K>(key_fn),
            concat: concat_merge::<T>(),
        });
        Dataset {
            plan: self.plan,
            id,
            _t: PhantomData,
        }
    }

    /// Sort each partition independently by extracted key.
    pub fn local_sort<K>(
        self,
        key_fn: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> LocallySortedDataset<T, K>
    where
        K: Ord + Hash + Send + Sync + 'static,
    {
        let key_fn: Arc<dyn Fn(&T) -> K + Send + Sync> = Arc::new(key_fn);
        let id = self.plan.insert(Expr::LocalSort {
            base: self.id,
            sort: unary_sort::<T, K>(key_fn.clone()),
        });
        LocallySortedDataset {
            plan: self.plan,
            id,
            key_fn,
            _t: PhantomData,
        }
    }

    /// Take positions `[offset, offset+limit)` of the concatenated whole,
    /// in partition-concatenation order. Use [`NO_OFFSET`] / [`NO_LIMIT`]
    /// to leave either side unbounded.
    pub fn offset_limit(self, offset: u64, limit: u64) -> Dataset<T> {
        let id = self.plan.insert(Expr::OffsetLimit {
            base: self.id,
            offset,
            limit,
            schema: StreamSchema::of::<T>(),
            route: forward_route::<T>(),
            merge: concat_merge::<T>(),
            slice: slice_stage::<T>(),
        });
        Dataset {
            plan: self.plan,
            id,
            _t: PhantomData,
        }
    }

    /// Compile this dataset into the context's graph, returning its output
    /// channels — one per contributing partition.
    pub fn channels(&self, ctx: &mut CompileContext) -> Result<Vec<StreamId>, CompileError> {
        expr::channels(&self.plan, self.id, ctx)
    }
}

impl<T: Record, K> LocallySortedDataset<T, K>
where
    K: Ord + Hash + Send + Sync + 'static,
{
    /// This dataset's expression identity within its plan.
    pub fn id(&self) -> ExprId {
        self.id
    }

    /// Shuffle into a globally sorted dataset: records are routed to the
    /// partition their key shards to, and each partition k-way merges its
    /// incoming sorted sub-streams.
    pub fn repartition_sort(self) -> SortedDataset<T, K> {
        let id = self.plan.insert(Expr::RepartitionReduce {
            base: self.id,
            schema: StreamSchema::of::<T>(),
            route: key_route::<T, K>(self.key_fn.clone()),
            merge: sorted_merge::<T, K, _>(self.key_fn.clone(), Merge),
        });
        SortedDataset {
            inner: LocallySortedDataset {
                plan: self.plan,
                id,
                key_fn: self.key_fn,
                _t: PhantomData,
            },
        }
    }

    /// Shuffle and combine same-key runs with `reducer`, yielding a
    /// globally sorted dataset.
    pub fn reduce_by_key(self, reducer: impl Reducer<T>) -> SortedDataset<T, K> {
        let id = self.plan.insert(Expr::RepartitionReduce {
            base: self.id,
            schema: StreamSchema::of::<T>(),
            route: key_route::<T, K>(self.key_fn.clone()),
            merge: sorted_merge::<T, K, _>(self.key_fn.clone(), reducer),
        });
        SortedDataset {
            inner: LocallySortedDataset {
                plan: self.plan,
                id,
                key_fn: self.key_fn,
                _t: PhantomData,
            },
        }
    }

    /// Take positions `[offset, offset+limit)` of the key-sorted whole.
    ///
    /// The result lives on a single partition and is therefore globally
    /// sorted.
    pub fn offset_limit(self, offset: u64, limit: u64) -> SortedDataset<T, K> {
        let id = self.plan.insert(Expr::OffsetLimit {
            base: self.id,
            offset,
            limit,
            schema: StreamSchema::of::<T>(),
            route: key_route::<T, K>(self.key_fn.clone()),
            merge: sorted_merge::<T, K, _>(self.key_fn.clone(), Merge),
            slice: slice_stage::<T>(),
        });
        SortedDataset {
            inner: LocallySortedDataset {
                plan: self.plan,
                id,
                key_fn: self.key_fn,
                _t: PhantomData,
            },
        }
    }

    /// Forget the sortedness invariant.
    pub fn into_dataset(self) -> Dataset<T> {
        Dataset {
            plan: self.plan,
            id: self.id,
            _t: PhantomData,
        }
    }

    /// Compile this dataset into the context's graph.
    pub fn channels(&self, ctx: &mut CompileContext) -> Result<Vec<StreamId>, CompileError> {
        expr::channels(&self.plan, self.id, ctx)
    }
}

impl<T: Record, K> SortedDataset<T, K>
where
    K: Ord + Hash + Send + Sync + 'static,
{
    /// This dataset's expression identity within its plan.
    pub fn id(&self) -> ExprId {
        self.inner.id
    }

    /// Take positions `[offset, offset+limit)` of the globally sorted
    /// whole.
    pub fn offset_limit(self, offset: u64, limit: u64) -> SortedDataset<T, K> {
        self.inner.offset_limit(offset, limit)
    }

    /// View as locally sorted (every globally sorted dataset is).
    pub fn into_locally_sorted(self) -> LocallySortedDataset<T, K> {
        self.inner
    }

    /// Forget the sortedness invariant.
    pub fn into_dataset(self) -> Dataset<T> {
        self.inner.into_dataset()
    }

    /// Compile this dataset into the context's graph.
    pub fn channels(&self, ctx: &mut CompileContext) -> Result<Vec<StreamId>, CompileError> {
        self.inner.channels(ctx)
    }
}

/* ---------- type-erased closure factories ---------- */

fn unary_map<T: Record, O: Record>(f: impl Fn(&T) -> O + Send + Sync + 'static) -> UnaryFn {
    Arc::new(move |batch: Batch| {
        let v = *batch.downcast::<Vec<T>>().expect("map input batch");
        let out: Vec<O> = v.iter().map(|t| f(t)).collect();
        Box::new(out) as Batch
    })
}

fn unary_filter<T: Record>(pred: impl Fn(&T) -> bool + Send + Sync + 'static) -> UnaryFn {
    Arc::new(move |batch: Batch| {
        let mut v = *batch.downcast::<Vec<T>>().expect("filter input batch");
        v.retain(|t| pred(t));
        Box::new(v) as Batch
    })
}

fn unary_sort<T: Record, K>(key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>) -> UnaryFn
where
    K: Ord + Send + Sync + 'static,
{
    Arc::new(move |batch: Batch| {
        let mut v = *batch.downcast::<Vec<T>>().expect("sort input batch");
        v.sort_by(|a, b| key_fn(a).cmp(&key_fn(b)));
        Box::new(v) as Batch
    })
}

fn concat_merge<T: Record>() -> MergeFn {
    Arc::new(move |batches: Vec<Batch>| {
        let mut out: Vec<T> = Vec::new();
        for batch in batches {
            out.extend(*batch.downcast::<Vec<T>>().expect("concat input batch"));
        }
        Box::new(out) as Batch
    })
}

fn sorted_merge<T: Record, K, R>(key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>, reducer: R) -> MergeFn
where
    K: Ord + Send + Sync + 'static,
    R: Reducer<T>,
{
    Arc::new(move |batches: Vec<Batch>| {
        let inputs: Vec<Vec<T>> = batches
            .into_iter()
            .map(|b| *b.downcast::<Vec<T>>().expect("merge input batch"))
            .collect();
        let merged = merge_sorted_runs(inputs, |t| key_fn(t), &reducer);
        Box::new(merged) as Batch
    })
}

/// Route each record to the destination its key shards to.
fn key_route<T: Record, K>(key_fn: Arc<dyn Fn(&T) -> K + Send + Sync>) -> RouteFactory
where
    K: Hash + Send + Sync + 'static,
{
    Arc::new(move |sharder: RendezvousSharder| {
        let key_fn = key_fn.clone();
        let fan_out = sharder.slot_count();
        Arc::new(move |batch: Batch| {
            let v = *batch.downcast::<Vec<T>>().expect("shard input batch");
            let mut parts: Vec<Vec<T>> = (0..fan_out).map(|_| Vec::new()).collect();
            for record in v {
                let slot = sharder.shard(&key_fn(&record))[0];
                parts[slot].push(record);
            }
            parts.into_iter().map(|p| Box::new(p) as Batch).collect()
        }) as RouteFn
    })
}

/// Route every record to the first destination. Used by shuffles with a
/// single target, where the key plays no role in routing.
fn forward_route<T: Record>() -> RouteFactory {
    Arc::new(move |sharder: RendezvousSharder| {
        let fan_out = sharder.slot_count();
        Arc::new(move |batch: Batch| {
            let mut parts: Vec<Batch> = Vec::with_capacity(fan_out);
            parts.push(batch);
            for _ in 1..fan_out {
                parts.push(Box::new(Vec::<T>::new()) as Batch);
            }
            parts
        }) as RouteFn
    })
}

fn slice_stage<T: Record>() -> SliceFactory {
    Arc::new(|offset: u64, limit: u64| {
        Arc::new(move |batch: Batch| {
            let v = *batch.downcast::<Vec<T>>().expect("offset/limit input batch");
            let out: Vec<T> = v
                .into_iter()
                .skip(offset.min(usize::MAX as u64) as usize)
                .take(limit.min(usize::MAX as u64) as usize)
                .collect();
            Box::new(out) as Batch
        }) as UnaryFn
    })
}
