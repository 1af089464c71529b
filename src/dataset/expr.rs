//! The closed logical expression tree and its lowering to physical nodes.
//!
//! Every dataset combinator inserts one `Expr` variant into the plan arena,
//! capturing its typed logic as type-erased closures at the point where the
//! element type is known. Compilation is bottom-up and lazy: a variant's
//! [`channels`] call compiles its bases first, then lowers itself into the
//! graph. Results are memoized per (expression, nonce) by the context so a
//! shared subtree never duplicates nodes.

use crate::context::CompileContext;
use crate::dataset::offset_limit;
use crate::dataset::shuffle::repartition_and_reduce;
use crate::dataset::{ExprId, LogicalPlan};
use crate::error::CompileError;
use crate::node::{MergeFn, Node, NodeKind, RouteFn, UnaryFn};
use crate::partition::Partition;
use crate::schema::StreamSchema;
use crate::sharder::RendezvousSharder;
use crate::stream_id::StreamId;
use std::any::Any;
use std::sync::Arc;

/// Builds a shuffle router once the destination sharder is known.
pub(crate) type RouteFactory = Arc<dyn Fn(RendezvousSharder) -> RouteFn + Send + Sync>;

/// Builds an exact skip/take stage for a concrete (offset, limit) pair.
pub(crate) type SliceFactory = Arc<dyn Fn(u64, u64) -> UnaryFn + Send + Sync>;

/// One logical dataset node. Immutable after construction.
#[derive(Clone)]
pub(crate) enum Expr {
    /// In-memory per-partition source: payload `i` lands on partition
    /// `i mod |partitions|`.
    Source {
        schema: StreamSchema,
        payloads: Vec<Arc<dyn Any + Send + Sync>>,
    },
    Map {
        base: ExprId,
        apply: UnaryFn,
    },
    Filter {
        base: ExprId,
        apply: UnaryFn,
    },
    /// Concatenation of two datasets; co-located channels are joined by a
    /// union node, lone channels pass through untouched.
    Union {
        left: ExprId,
        right: ExprId,
        concat: MergeFn,
    },
    /// In-partition sort by extracted key.
    LocalSort {
        base: ExprId,
        sort: UnaryFn,
    },
    /// Key-routed shuffle across the full cluster, arrival-order fan-in.
    Repartition {
        base: ExprId,
        schema: StreamSchema,
        route: RouteFactory,
        concat: MergeFn,
    },
    /// Key-routed shuffle with sorted k-way merge fan-in (the reducer is
    /// embedded in `merge`).
    RepartitionReduce {
        base: ExprId,
        schema: StreamSchema,
        route: RouteFactory,
        merge: MergeFn,
    },
    /// Two-phase distributed offset/limit.
    OffsetLimit {
        base: ExprId,
        offset: u64,
        limit: u64,
        schema: StreamSchema,
        route: RouteFactory,
        merge: MergeFn,
        slice: SliceFactory,
    },
}

/// Compile the expression `id` and return its output channels, one per
/// contributing partition. Memoized per (expression, nonce).
pub(crate) fn channels(
    plan: &LogicalPlan,
    id: ExprId,
    ctx: &mut CompileContext,
) -> Result<Vec<StreamId>, CompileError> {
    if let Some(ids) = ctx.memo_get(id) {
        return Ok(ids.clone());
    }
    let expr = plan.expr(id)?;
    let ids = compile_expr(plan, id, &expr, ctx)?;
    ctx.memo_insert(id, ids.clone());
    Ok(ids)
}

fn compile_expr(
    plan: &LogicalPlan,
    id: ExprId,
    expr: &Expr,
    ctx: &mut CompileContext,
) -> Result<Vec<StreamId>, CompileError> {
    match expr {
        Expr::Source { schema, payloads } => {
            if payloads.is_empty() {
                return Ok(Vec::new());
            }
            let partitions = ctx.graph().partitions().to_vec();
            if partitions.is_empty() {
                return Err(CompileError::NoAlivePartitions);
            }
            let mut out = Vec::with_capacity(payloads.len());
            for (i, payload) in payloads.iter().enumerate() {
                let partition = &partitions[i % partitions.len()];
                let output = StreamId::new();
                let index = ctx.next_node_index();
                let node = Node::new(
                    index,
                    NodeKind::Source {
                        schema: schema.clone(),
                        payload: payload.clone(),
                        output,
                    },
                );
                ctx.graph_mut().add_node(partition, node)?;
                out.push(output);
            }
            Ok(out)
        }

        Expr::Map { base, apply } => {
            let inputs = channels(plan, *base, ctx)?;
            unary_stage(ctx, inputs, |input, output| NodeKind::Map {
                apply: apply.clone(),
                input,
                output,
            })
        }

        Expr::Filter { base, apply } => {
            let inputs = channels(plan, *base, ctx)?;
            unary_stage(ctx, inputs, |input, output| NodeKind::Filter {
                apply: apply.clone(),
                input,
                output,
            })
        }

        Expr::LocalSort { base, sort } => {
            let inputs = channels(plan, *base, ctx)?;
            unary_stage(ctx, inputs, |input, output| NodeKind::Sort {
                apply: sort.clone(),
                input,
                output,
            })
        }

        Expr::Union {
            left,
            right,
            concat,
        } => {
            let mut ids = channels(plan, *left, ctx)?;
            ids.extend(channels(plan, *right, ctx)?);

            let mut groups: Vec<(Partition, Vec<StreamId>)> = Vec::new();
            for stream in ids {
                let partition = ctx.graph().partition_of(stream)?.clone();
                match groups.iter_mut().find(|(p, _)| *p == partition) {
                    Some((_, streams)) => streams.push(stream),
                    None => groups.push((partition, vec![stream])),
                }
            }

            let mut out = Vec::with_capacity(groups.len());
            for (partition, streams) in groups {
                if streams.len() == 1 {
                    out.push(streams[0]);
                    continue;
                }
                let output = StreamId::new();
                let index = ctx.next_node_index();
                let node = Node::new(
                    index,
                    NodeKind::Union {
                        merge: concat.clone(),
                        inputs: streams,
                        output,
                    },
                );
                ctx.graph_mut().add_node(&partition, node)?;
                out.push(output);
            }
            Ok(out)
        }

        Expr::Repartition {
            base,
            schema,
            route,
            concat,
        } => {
            let sources = channels(plan, *base, ctx)?;
            let targets = ctx.graph().partitions().to_vec();
            repartition_and_reduce(ctx, &sources, schema, route, concat, &targets)
        }

        Expr::RepartitionReduce {
            base,
            schema,
            route,
            merge,
        } => {
            let sources = channels(plan, *base, ctx)?;
            let targets = ctx.graph().partitions().to_vec();
            repartition_and_reduce(ctx, &sources, schema, route, merge, &targets)
        }

        Expr::OffsetLimit {
            base,
            offset,
            limit,
            schema,
            route,
            merge,
            slice,
        } => offset_limit::compile(plan, id, *base, *offset, *limit, schema, route, merge, slice, ctx),
    }
}

/// Add one single-input node per upstream channel, on the channel's own
/// partition. Pure combinators preserve the 1:1 partition/channel structure.
fn unary_stage(
    ctx: &mut CompileContext,
    inputs: Vec<StreamId>,
    make: impl Fn(StreamId, StreamId) -> NodeKind,
) -> Result<Vec<StreamId>, CompileError> {
    let mut out = Vec::with_capacity(inputs.len());
    for input in inputs {
        let partition = ctx.graph().partition_of(input)?.clone();
        let output = StreamId::new();
        let index = ctx.next_node_index();
        ctx.graph_mut()
            .add_node(&partition, Node::new(index, make(input, output)))?;
        out.push(output);
    }
    Ok(out)
}
