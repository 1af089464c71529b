use loomflow::{CompileError, RendezvousSharder};
use std::collections::HashSet;

fn cluster() -> Vec<String> {
    ["one", "two", "three", "four", "five"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn assignment_lists_match_replication_and_have_no_duplicates() -> anyhow::Result<()> {
    let all = cluster();
    let sharder = RendezvousSharder::build(&all, &all, 3, false)?;

    for key in 0..100 {
        let slots = sharder.shard(&key);
        assert_eq!(slots.len(), 3, "key {key} got {slots:?}");
        let distinct: HashSet<_> = slots.iter().collect();
        assert_eq!(distinct.len(), slots.len(), "key {key} got {slots:?}");
        assert!(slots.iter().all(|&s| s < sharder.slot_count()));
    }
    Ok(())
}

#[test]
fn removing_an_assignee_preserves_surviving_assignments() -> anyhow::Result<()> {
    let all = cluster();
    let before = RendezvousSharder::build(&all, &all, 3, false)?;

    // Partition "five" (slot 4) goes down; everyone else survives.
    let alive: Vec<String> = all[..4].to_vec();
    let after = RendezvousSharder::build(&all, &alive, 3, false)?;

    for key in 0..100 {
        let survivors: Vec<usize> = before
            .shard(&key)
            .iter()
            .copied()
            .filter(|&slot| slot != 4)
            .collect();
        let rebuilt = after.shard(&key);
        assert_eq!(
            &rebuilt[..survivors.len()],
            &survivors[..],
            "key {key}: surviving prefix changed"
        );
        assert!(!rebuilt.contains(&4), "key {key} still routed to slot 4");
    }
    Ok(())
}

#[test]
fn rebuilding_with_identical_membership_is_deterministic() -> anyhow::Result<()> {
    let all = cluster();
    let a = RendezvousSharder::build(&all, &all, 2, false)?;
    let b = RendezvousSharder::build(&all, &all, 2, false)?;

    for key in 0..100 {
        assert_eq!(a.shard(&key), b.shard(&key));
    }
    Ok(())
}

#[test]
fn excess_mode_ranks_every_alive_slot_identically_for_all_keys() -> anyhow::Result<()> {
    let all = cluster();
    let sharder = RendezvousSharder::build(&all, &all, 1, true)?;

    let first = sharder.shard(&0).to_vec();
    assert_eq!(first.len(), all.len());
    for key in 1..100 {
        assert_eq!(sharder.shard(&key), &first[..], "key {key} diverged");
    }
    Ok(())
}

#[test]
fn build_rejects_degenerate_inputs() {
    let all = cluster();

    let err = RendezvousSharder::build(&all, &[], 3, false).unwrap_err();
    assert!(matches!(err, CompileError::NoAlivePartitions));

    let err = RendezvousSharder::build(&all, &all, 0, false).unwrap_err();
    assert!(matches!(err, CompileError::InvalidReplication(0)));

    let stranger = vec!["six".to_string()];
    let err = RendezvousSharder::build(&all, &stranger, 1, false).unwrap_err();
    assert!(matches!(err, CompileError::UnknownAssignee));
}
