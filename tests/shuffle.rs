use loomflow::testing::*;
use loomflow::{
    CompileContext, DataflowGraph, Deduplicate, Fold, LogicalPlan, from_partitions,
};

fn context(partitions: usize) -> CompileContext {
    CompileContext::new(DataflowGraph::new(test_partitions(partitions)), 0)
}

#[test]
fn repartition_preserves_the_multiset_and_groups_by_key() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let records: Vec<i32> = (0..40).collect();
    let dataset = from_partitions(
        &plan,
        vec![
            records[..15].to_vec(),
            records[15..25].to_vec(),
            records[25..].to_vec(),
        ],
    )
    .repartition(|x: &i32| x % 7);

    let mut ctx = context(3);
    let channels = dataset.channels(&mut ctx)?;
    assert_eq!(channels.len(), 3, "one output channel per target partition");

    let mut exec = LocalExecutor::new();
    exec.run(&ctx.into_graph())?;

    let mut seen = Vec::new();
    for &channel in &channels {
        let batch = exec.take::<i32>(channel)?;
        // records sharing a key never split across channels
        for record in &batch {
            assert!(
                !seen.iter().any(|other: &i32| other % 7 == record % 7),
                "key {} appears on two channels",
                record % 7
            );
        }
        let keys: std::collections::HashSet<i32> = batch.iter().map(|x| x % 7).collect();
        seen.extend(keys);
    }
    Ok(())
}

#[test]
fn repartition_keeps_every_record() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = from_partitions(&plan, vec![vec![1, 1, 2], vec![3, 1], vec![2, 5]])
        .repartition(|x: &i32| *x);

    let mut ctx = context(2);
    let channels = dataset.channels(&mut ctx)?;

    let mut exec = LocalExecutor::new();
    exec.run(&ctx.into_graph())?;
    assert_collections_unordered_equal(
        &exec.collect::<i32>(&channels)?,
        &[1, 1, 1, 2, 2, 3, 5],
    );
    Ok(())
}

#[test]
fn repartition_sort_yields_a_globally_sorted_whole() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = from_partitions(&plan, vec![vec![9, 3, 7], vec![8, 1], vec![5, 2, 6, 4]])
        .local_sort(|x: &i32| *x)
        .repartition_sort();

    let mut ctx = context(3);
    let channels = dataset.channels(&mut ctx)?;

    let mut exec = LocalExecutor::new();
    exec.run(&ctx.into_graph())?;

    let mut all = Vec::new();
    for &channel in &channels {
        let batch = exec.take::<i32>(channel)?;
        assert!(batch.is_sorted(), "channel not sorted: {batch:?}");
        all.extend(batch);
    }
    assert_collections_unordered_equal(&all, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    Ok(())
}

#[test]
fn reduce_by_key_deduplicates_across_partitions() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = from_partitions(&plan, vec![vec![2, 2, 3], vec![1, 3], vec![3, 1]])
        .local_sort(|x: &i32| *x)
        .reduce_by_key(Deduplicate);

    let mut ctx = context(2);
    let channels = dataset.channels(&mut ctx)?;

    let mut exec = LocalExecutor::new();
    exec.run(&ctx.into_graph())?;
    assert_collections_unordered_equal(&exec.collect::<i32>(&channels)?, &[1, 2, 3]);
    Ok(())
}

#[test]
fn reduce_by_key_folds_counts_like_a_word_count() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let words = from_partitions(
        &plan,
        vec![
            vec!["loom".to_string(), "flow".to_string(), "loom".to_string()],
            vec!["flow".to_string(), "loom".to_string()],
        ],
    );

    let counts = words
        .map(|w: &String| (w.clone(), 1u64))
        .local_sort(|(w, _): &(String, u64)| w.clone())
        .reduce_by_key(Fold::new(|(w, a): (String, u64), (_, b)| (w, a + b)));

    let mut ctx = context(2);
    let channels = counts.channels(&mut ctx)?;

    let mut exec = LocalExecutor::new();
    exec.run(&ctx.into_graph())?;
    assert_collections_unordered_equal(
        &exec.collect::<(String, u64)>(&channels)?,
        &[("flow".to_string(), 2), ("loom".to_string(), 3)],
    );
    Ok(())
}

#[test]
fn a_colocated_single_stream_shuffle_adds_no_nodes() -> anyhow::Result<()> {
    let plan = LogicalPlan::new();
    let dataset = from_partitions(&plan, vec![vec![3, 1, 2]])
        .local_sort(|x: &i32| *x)
        .repartition_sort();

    let mut ctx = context(1);
    let channels = dataset.channels(&mut ctx)?;
    assert_eq!(channels.len(), 1);

    let graph = ctx.into_graph();
    // source + sort only: a one-partition shuffle into itself is elided
    assert_eq!(graph.node_count(), 2);

    let mut exec = LocalExecutor::new();
    exec.run(&graph)?;
    assert_collections_equal(&exec.take::<i32>(channels[0])?, &[1, 2, 3]);
    Ok(())
}
