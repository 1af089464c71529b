//! Repartition-and-reduce: the shuffle+merge primitive.
//!
//! Given locally sorted source streams, a destination sharder, and a merge
//! reducer, redistribute every record to the one target partition its key
//! maps to and combine same-key runs there while preserving key order. The
//! lowering adds one shard node per source (fan-out = number of targets)
//! and one reduce node per target (fan-in = number of sources); this is a
//! distributed merge-sort-by-key, never a materialize-then-sort.

use crate::context::CompileContext;
use crate::dataset::expr::RouteFactory;
use crate::error::CompileError;
use crate::node::{MergeFn, Node, NodeKind};
use crate::partition::Partition;
use crate::schema::StreamSchema;
use crate::sharder::RendezvousSharder;
use crate::stream_id::StreamId;

/// Lower a shuffle of `sources` into `targets`, returning one output stream
/// per target partition.
///
/// Every record reaches the target selected by a rendezvous sharder built
/// over `targets` (replication 1); each target k-way merges its incoming
/// sub-streams through `merge`. An empty source list yields an empty result
/// with no nodes; a single source already co-located with a single target
/// short-circuits the shuffle entirely.
pub(crate) fn repartition_and_reduce(
    ctx: &mut CompileContext,
    sources: &[StreamId],
    schema: &StreamSchema,
    route: &RouteFactory,
    merge: &MergeFn,
    targets: &[Partition],
) -> Result<Vec<StreamId>, CompileError> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    if targets.is_empty() {
        return Err(CompileError::NoAlivePartitions);
    }
    if sources.len() == 1
        && targets.len() == 1
        && ctx.graph().partition_of(sources[0])? == &targets[0]
    {
        return Ok(sources.to_vec());
    }

    // fan-out: one shard node per source partition
    let mut per_target_inputs: Vec<Vec<StreamId>> = vec![Vec::new(); targets.len()];
    for &source in sources {
        let partition = ctx.graph().partition_of(source)?.clone();
        let sharder = RendezvousSharder::build(targets, targets, 1, false)?;
        let outputs: Vec<StreamId> = (0..targets.len()).map(|_| StreamId::new()).collect();
        for (target_inputs, output) in per_target_inputs.iter_mut().zip(&outputs) {
            target_inputs.push(*output);
        }
        let index = ctx.next_node_index();
        let node = Node::new(
            index,
            NodeKind::Shard {
                schema: schema.clone(),
                route: route(sharder),
                input: source,
                outputs,
            },
        );
        ctx.graph_mut().add_node(&partition, node)?;
    }

    // fan-in: one reduce node per target partition
    let mut out = Vec::with_capacity(targets.len());
    for (target, inputs) in targets.iter().zip(per_target_inputs) {
        let output = StreamId::new();
        let index = ctx.next_node_index();
        let node = Node::new(
            index,
            NodeKind::Reduce {
                merge: merge.clone(),
                inputs,
                output,
            },
        );
        ctx.graph_mut().add_node(target, node)?;
        out.push(output);
    }
    Ok(out)
}
