//! Assertion functions for comparing executed channel contents with
//! expected results.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections hold the same multiset of elements,
/// ignoring order. Duplicates count.
///
/// # Panics
///
/// Panics if the collections differ in content (ignoring order).
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    let actual_counts = counts(actual);
    let expected_counts = counts(expected);

    if actual_counts != expected_counts {
        let missing: Vec<_> = expected
            .iter()
            .filter(|e| actual_counts.get(e).copied().unwrap_or(0) < expected_counts[e])
            .collect();
        let extra: Vec<_> = actual
            .iter()
            .filter(|a| expected_counts.get(a).copied().unwrap_or(0) < actual_counts[a])
            .collect();
        panic!(
            "Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

fn counts<T: Eq + Hash>(items: &[T]) -> HashMap<&T, usize> {
    let mut out = HashMap::new();
    for item in items {
        *out.entry(item).or_insert(0) += 1;
    }
    out
}

/// Assert that all elements match a predicate.
///
/// # Panics
///
/// Panics if any element fails the predicate.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool, message: &str) {
    let failures: Vec<_> = collection.iter().filter(|t| !predicate(t)).collect();
    assert!(
        failures.is_empty(),
        "Predicate failed ({message}):\n  Failing elements: {failures:?}"
    );
}
