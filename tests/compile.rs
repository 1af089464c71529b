use loomflow::testing::*;
use loomflow::{
    CompileContext, DataflowGraph, Dataset, LogicalPlan, StreamSchema, from_partitions,
};

fn context(partitions: usize, seed: u64) -> CompileContext {
    CompileContext::new(DataflowGraph::new(test_partitions(partitions)), seed)
}

#[test]
fn map_and_filter_stay_on_their_partitions() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = from_partitions(&plan, vec![vec![1, 2, 3], vec![4, 5]])
        .map(|x: &i32| x * 10)
        .filter(|x: &i32| *x >= 20);

    let mut ctx = context(2, 0);
    let channels = dataset.channels(&mut ctx)?;
    assert_eq!(channels.len(), 2, "one output channel per payload");

    let graph = ctx.into_graph();
    // source + map + filter on each of the two partitions, no shuffle
    assert_eq!(graph.node_count(), 6);
    for partition in graph.partitions() {
        assert_eq!(graph.nodes_on(partition).len(), 3);
    }

    let mut exec = LocalExecutor::new();
    exec.run(&graph)?;
    assert_collections_unordered_equal(&exec.collect::<i32>(&channels)?, &[20, 30, 40, 50]);
    Ok(())
}

#[test]
fn sources_wrap_around_a_smaller_cluster() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = from_partitions(&plan, vec![vec![1], vec![2], vec![3]]);

    let mut ctx = context(2, 0);
    let channels = dataset.channels(&mut ctx)?;
    assert_eq!(channels.len(), 3);

    let graph = ctx.into_graph();
    // payloads 0 and 2 share worker-0, payload 1 lands on worker-1
    assert_eq!(graph.nodes_on(&graph.partitions()[0]).len(), 2);
    assert_eq!(graph.nodes_on(&graph.partitions()[1]).len(), 1);
    Ok(())
}

#[test]
fn empty_dataset_compiles_to_nothing() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = loomflow::empty::<i32>(&plan).map(|x| x + 1);

    let mut ctx = context(3, 0);
    let channels = dataset.channels(&mut ctx)?;
    assert!(channels.is_empty());
    assert_eq!(ctx.graph().node_count(), 0);
    Ok(())
}

#[test]
fn union_joins_colocated_channels_and_passes_lone_ones_through() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let left = from_partitions(&plan, vec![vec![1, 2], vec![3]]);
    let right = from_partitions(&plan, vec![vec![4]]);
    let both = left.union(right);

    let mut ctx = context(2, 0);
    let channels = both.channels(&mut ctx)?;
    // worker-0 carries channels from both sides and gets a union node;
    // worker-1 carries only the left side's second channel
    assert_eq!(channels.len(), 2);

    let graph = ctx.into_graph();
    let mut exec = LocalExecutor::new();
    exec.run(&graph)?;
    assert_collections_unordered_equal(&exec.collect::<i32>(&channels)?, &[1, 2, 3, 4]);
    Ok(())
}

#[test]
fn shared_subtrees_compile_once_per_context() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let base = from_partitions(&plan, vec![vec![1, 2], vec![3, 4]]);
    let evens = base.clone().filter(|x: &i32| x % 2 == 0);
    let doubled = base.clone().map(|x: &i32| x * 2);

    let mut ctx = context(2, 0);
    let even_channels = evens.channels(&mut ctx)?;
    let nodes_after_first = ctx.graph().node_count();
    assert_eq!(nodes_after_first, 4);

    // the second query reuses the memoized source channels
    let doubled_channels = doubled.channels(&mut ctx)?;
    assert_eq!(ctx.graph().node_count(), nodes_after_first + 2);

    // recompiling either handle adds nothing at all
    let again = evens.channels(&mut ctx)?;
    assert_eq!(again, even_channels);
    assert_eq!(ctx.graph().node_count(), nodes_after_first + 2);

    let graph = ctx.into_graph();
    let mut exec = LocalExecutor::new();
    exec.run(&graph)?;
    assert_collections_unordered_equal(&exec.collect::<i32>(&even_channels)?, &[2, 4]);
    assert_collections_unordered_equal(&exec.collect::<i32>(&doubled_channels)?, &[2, 4, 6, 8]);
    Ok(())
}

fn sample_query(plan: &LogicalPlan) -> Dataset<i32> {
    from_partitions(plan, vec![vec![5, 1, 4], vec![2, 3], vec![9]])
        .filter(|x: &i32| *x < 9)
        .local_sort(|x: &i32| *x)
        .repartition_sort()
        .into_dataset()
        .offset_limit(1, 3)
}

#[test]
fn compilation_is_deterministic_for_a_fixed_seed() -> anyhow::Result<()> {
    let mut signatures = Vec::new();
    for _ in 0..2 {
        let plan = LogicalPlan::new();
        let mut ctx = context(3, 42);
        sample_query(&plan).channels(&mut ctx)?;
        signatures.push(graph_signature(ctx.graph()));
    }
    assert_eq!(signatures[0], signatures[1]);
    Ok(())
}

#[test]
fn stream_schema_round_trips_batches() -> anyhow::Result<()> {
    let schema = StreamSchema::of::<String>();
    let batch = vec!["alpha".to_string(), "beta".to_string()];

    let bytes = schema.encode(&batch).expect("typed batch must encode");
    let decoded = schema.decode(&bytes).expect("bytes must decode");
    let decoded = decoded.downcast::<Vec<String>>().expect("decoded type");
    assert_collections_equal(&decoded, &batch);

    // a batch of the wrong element type is rejected, not mis-encoded
    let wrong = vec![1u64, 2];
    assert!(schema.encode(&wrong).is_none());
    Ok(())
}
