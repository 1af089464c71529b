//! Two-phase distributed offset/limit.
//!
//! Taking positions `[offset, offset+limit)` of a logically concatenated
//! whole cannot be done per partition alone, and shipping everything to one
//! node is unbounded. The lowering therefore runs in two phases:
//!
//! 1. **Local pushdown** — when the limit is bounded, each partition's
//!    stream is independently capped at `offset + limit` records, a safe
//!    over-approximation of what any partition can contribute.
//! 2. **Merge** — the surviving streams shuffle into one deterministically
//!    chosen partition, merge in key order, and a final exact offset/limit
//!    node cuts the result.
//!
//! The merge partition is picked by the subtree nonce taken modulo the
//! stream count, not by the sharder, so the choice is independent of
//! cluster topology. The nonce derives from (compilation seed, expression
//! id), making repeated compilation of the same logical query reproduce the
//! same physical plan.

use crate::context::CompileContext;
use crate::dataset::expr::{RouteFactory, SliceFactory, channels};
use crate::dataset::shuffle::repartition_and_reduce;
use crate::dataset::{ExprId, LogicalPlan};
use crate::error::CompileError;
use crate::node::{MergeFn, Node, NodeKind};
use crate::schema::StreamSchema;
use crate::sharder::hash_of;
use crate::stream_id::StreamId;

/// Sentinel meaning "skip nothing".
pub const NO_OFFSET: u64 = 0;

/// Sentinel meaning "take everything".
pub const NO_LIMIT: u64 = u64::MAX;

#[allow(clippy::too_many_arguments)]
pub(crate) fn compile(
    plan: &LogicalPlan,
    id: ExprId,
    base: ExprId,
    offset: u64,
    limit: u64,
    schema: &StreamSchema,
    route: &RouteFactory,
    merge: &MergeFn,
    slice: &SliceFactory,
    ctx: &mut CompileContext,
) -> Result<Vec<StreamId>, CompileError> {
    let nonce = hash_of(&(ctx.seed(), id.raw()));
    ctx.scoped_nonce(nonce, |ctx| {
        let mut streams = channels(plan, base, ctx)?;

        if offset == NO_OFFSET && limit == NO_LIMIT {
            return Ok(streams);
        }
        if streams.is_empty() {
            return Ok(streams);
        }
        if streams.len() == 1 {
            return Ok(vec![exact_stage(ctx, offset, limit, slice, streams[0])?]);
        }

        if limit != NO_LIMIT {
            let cap = offset.saturating_add(limit);
            let mut capped = Vec::with_capacity(streams.len());
            for stream in streams {
                capped.push(limit_stream(ctx, cap, slice, stream)?);
            }
            streams = capped;
        }

        let picked = streams[(nonce % streams.len() as u64) as usize];
        let target = ctx.graph().partition_of(picked)?.clone();
        let merged = repartition_and_reduce(ctx, &streams, schema, route, merge, &[target])?;
        debug_assert_eq!(merged.len(), 1);

        Ok(vec![exact_stage(ctx, offset, limit, slice, merged[0])?])
    })
}

/// Cap `stream` at its first `cap` records, in place on its own partition.
pub(crate) fn limit_stream(
    ctx: &mut CompileContext,
    cap: u64,
    slice: &SliceFactory,
    stream: StreamId,
) -> Result<StreamId, CompileError> {
    exact_stage(ctx, NO_OFFSET, cap, slice, stream)
}

fn exact_stage(
    ctx: &mut CompileContext,
    offset: u64,
    limit: u64,
    slice: &SliceFactory,
    stream: StreamId,
) -> Result<StreamId, CompileError> {
    let partition = ctx.graph().partition_of(stream)?.clone();
    let output = StreamId::new();
    let index = ctx.next_node_index();
    let node = Node::new(
        index,
        NodeKind::OffsetLimit {
            offset,
            limit,
            apply: slice(offset, limit),
            input: stream,
            output,
        },
    );
    ctx.graph_mut().add_node(&partition, node)?;
    Ok(output)
}
