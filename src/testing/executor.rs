//! In-process graph execution for tests.

use crate::dataset::Record;
use crate::graph::DataflowGraph;
use crate::node::NodeKind;
use crate::schema::Batch;
use crate::stream_id::StreamId;
use crate::task::TaskContext;
use anyhow::{Context, anyhow, bail};
use rayon::prelude::*;
use std::collections::HashMap;

/// Runs every node of a graph inside the current process.
///
/// Channels are in-memory batches with exactly one producer and at most
/// one consumer. Nodes are executed in waves: each wave binds, in
/// parallel, every node whose inputs are all available. Shuffle fan-out
/// batches are round-tripped through the stream codec, emulating the
/// serialization a real partition boundary would impose.
#[derive(Default)]
pub struct LocalExecutor {
    channels: HashMap<StreamId, Batch>,
}

struct NodeTask {
    inputs: HashMap<StreamId, Batch>,
    outputs: Vec<(StreamId, Batch)>,
}

impl TaskContext for NodeTask {
    fn take_input(&mut self, stream: StreamId) -> Option<Batch> {
        self.inputs.remove(&stream)
    }

    fn export(&mut self, stream: StreamId, batch: Batch) {
        self.outputs.push((stream, batch));
    }
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute every node of `graph` to completion.
    ///
    /// Fails if a node exports onto an occupied channel, if a shuffle
    /// batch does not survive the codec round trip, or if some node never
    /// becomes ready (a cycle or a missing producer).
    pub fn run(&mut self, graph: &DataflowGraph) -> anyhow::Result<()> {
        loop {
            let ready: Vec<_> = graph
                .nodes()
                .filter(|(_, node)| {
                    !node.is_bound()
                        && node
                            .inputs()
                            .iter()
                            .all(|stream| self.channels.contains_key(stream))
                })
                .collect();
            if ready.is_empty() {
                break;
            }

            let mut tasks = Vec::with_capacity(ready.len());
            for (_, node) in &ready {
                let mut inputs = HashMap::new();
                for stream in node.inputs() {
                    let batch = self
                        .channels
                        .remove(&stream)
                        .with_context(|| format!("{stream} consumed twice"))?;
                    inputs.insert(stream, batch);
                }
                tasks.push(NodeTask {
                    inputs,
                    outputs: Vec::new(),
                });
            }

            let done: Vec<anyhow::Result<NodeTask>> = ready
                .par_iter()
                .zip(tasks)
                .map(|((partition, node), mut task)| {
                    node.bind(&mut task).with_context(|| {
                        format!("binding {} node {} on {partition}", node.kind_name(), node.index())
                    })?;
                    if let NodeKind::Shard { schema, .. } = node.kind() {
                        for (stream, batch) in task.outputs.iter_mut() {
                            let bytes = schema
                                .encode(batch.as_ref())
                                .with_context(|| format!("encoding batch for {stream}"))?;
                            *batch = schema
                                .decode(&bytes)
                                .with_context(|| format!("decoding batch for {stream}"))?;
                        }
                    }
                    Ok(task)
                })
                .collect();

            for task in done {
                for (stream, batch) in task?.outputs {
                    if self.channels.insert(stream, batch).is_some() {
                        bail!("duplicate batch exported on {stream}");
                    }
                }
            }
        }

        if let Some((partition, node)) = graph.nodes().find(|(_, node)| !node.is_bound()) {
            bail!(
                "{} node {} on {partition} never became ready",
                node.kind_name(),
                node.index()
            );
        }
        Ok(())
    }

    /// Consume the batch on `stream` as a typed vector.
    pub fn take<T: Record>(&mut self, stream: StreamId) -> anyhow::Result<Vec<T>> {
        let batch = self
            .channels
            .remove(&stream)
            .with_context(|| format!("no batch available on {stream}"))?;
        let batch = batch
            .downcast::<Vec<T>>()
            .map_err(|_| anyhow!("unexpected payload type on {stream}"))?;
        Ok(*batch)
    }

    /// Consume and concatenate the batches on `streams`, in order.
    pub fn collect<T: Record>(&mut self, streams: &[StreamId]) -> anyhow::Result<Vec<T>> {
        let mut out = Vec::new();
        for &stream in streams {
            out.extend(self.take::<T>(stream)?);
        }
        Ok(out)
    }
}
