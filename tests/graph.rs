use loomflow::testing::test_partitions;
use loomflow::{
    Batch, BindError, CompileError, DataflowGraph, Node, NodeKind, StreamId, StreamSchema,
    TaskContext,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct MemoryTask {
    inputs: HashMap<StreamId, Batch>,
    outputs: Vec<(StreamId, Batch)>,
}

impl TaskContext for MemoryTask {
    fn take_input(&mut self, stream: StreamId) -> Option<Batch> {
        self.inputs.remove(&stream)
    }

    fn export(&mut self, stream: StreamId, batch: Batch) {
        self.outputs.push((stream, batch));
    }
}

fn source_node(index: u32, payload: Vec<i32>, output: StreamId) -> Node {
    Node::new(
        index,
        NodeKind::Source {
            schema: StreamSchema::of::<i32>(),
            payload: Arc::new(payload) as Arc<dyn Any + Send + Sync>,
            output,
        },
    )
}

#[test]
fn rejects_nodes_on_unknown_partitions() -> anyhow::Result<()> {
    let partitions = test_partitions(2);
    let mut graph = DataflowGraph::new(partitions.clone());

    graph.add_node(&partitions[0], source_node(0, vec![1], StreamId::new()))?;

    let stranger = loomflow::Partition::new("worker-99");
    let err = graph
        .add_node(&stranger, source_node(1, vec![2], StreamId::new()))
        .unwrap_err();
    assert!(matches!(err, CompileError::UnknownPartition(_)));
    Ok(())
}

#[test]
fn rejects_a_second_producer_for_the_same_stream() -> anyhow::Result<()> {
    let partitions = test_partitions(2);
    let mut graph = DataflowGraph::new(partitions.clone());

    let stream = StreamId::new();
    graph.add_node(&partitions[0], source_node(0, vec![1], stream))?;

    let err = graph
        .add_node(&partitions[1], source_node(1, vec![2], stream))
        .unwrap_err();
    assert!(matches!(err, CompileError::DuplicateProducer(s) if s == stream));
    Ok(())
}

#[test]
fn partition_of_resolves_producers_and_rejects_strangers() -> anyhow::Result<()> {
    let partitions = test_partitions(2);
    let mut graph = DataflowGraph::new(partitions.clone());

    let stream = StreamId::new();
    graph.add_node(&partitions[1], source_node(0, vec![1], stream))?;

    assert_eq!(graph.partition_of(stream)?, &partitions[1]);

    let unknown = StreamId::new();
    let err = graph.partition_of(unknown).unwrap_err();
    assert!(matches!(err, CompileError::UnknownStream(s) if s == unknown));
    Ok(())
}

#[test]
fn nodes_bind_exactly_once() -> anyhow::Result<()> {
    let node = source_node(7, vec![1, 2, 3], StreamId::new());
    let mut task = MemoryTask::default();

    assert!(!node.is_bound());
    node.bind(&mut task)?;
    assert!(node.is_bound());
    assert_eq!(task.outputs.len(), 1);

    let err = node.bind(&mut task).unwrap_err();
    assert!(matches!(err, BindError::AlreadyBound { index: 7 }));
    Ok(())
}

#[test]
fn binding_with_a_missing_input_fails() {
    let input = StreamId::new();
    let node = Node::new(
        0,
        NodeKind::Map {
            apply: Arc::new(|batch| batch),
            input,
            output: StreamId::new(),
        },
    );

    let mut task = MemoryTask::default();
    let err = node.bind(&mut task).unwrap_err();
    assert!(matches!(err, BindError::UnresolvedInput { stream, .. } if stream == input));
}

#[test]
fn binding_a_source_with_a_mismatched_payload_fails() {
    let output = StreamId::new();
    let node = Node::new(
        0,
        NodeKind::Source {
            schema: StreamSchema::of::<i32>(),
            payload: Arc::new(vec!["oops".to_string()]) as Arc<dyn Any + Send + Sync>,
            output,
        },
    );

    let mut task = MemoryTask::default();
    let err = node.bind(&mut task).unwrap_err();
    assert!(matches!(err, BindError::PayloadType { stream, .. } if stream == output));
}
