//! Merge semantics for runs of equal keys during a shuffle fan-in.
//!
//! When repartition-and-reduce fans sorted sub-streams into a target
//! partition, records sharing a key arrive as one contiguous run. A
//! [`Reducer`] decides what survives of that run: everything ([`Merge`]),
//! the first record ([`Deduplicate`]), or a folded accumulation ([`Fold`]).

/// How a run of equal-keyed records is combined at a shuffle target.
pub trait Reducer<T>: Send + Sync + 'static {
    /// Combine one run of records sharing a key. `run` preserves the
    /// source-stream order of the incoming records.
    fn reduce(&self, run: Vec<T>) -> Vec<T>;
}

/// Keep every record of the run, preserving order. This is the
/// union-preserving-order reducer used by distributed offset/limit and
/// repartition-sort.
#[derive(Clone, Copy, Debug, Default)]
pub struct Merge;

impl<T: Send + Sync + 'static> Reducer<T> for Merge {
    fn reduce(&self, run: Vec<T>) -> Vec<T> {
        run
    }
}

/// Keep only the first record per key; the rest of the run is dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct Deduplicate;

impl<T: Send + Sync + 'static> Reducer<T> for Deduplicate {
    fn reduce(&self, mut run: Vec<T>) -> Vec<T> {
        run.truncate(1);
        run
    }
}

/// Fold the run into a single record with a binary accumulator.
#[derive(Clone, Copy, Debug)]
pub struct Fold<F>(F);

impl<F> Fold<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, F> Reducer<T> for Fold<F>
where
    T: Send + Sync + 'static,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    fn reduce(&self, run: Vec<T>) -> Vec<T> {
        let mut records = run.into_iter();
        match records.next() {
            None => Vec::new(),
            Some(first) => vec![records.fold(first, |acc, next| (self.0)(acc, next))],
        }
    }
}

/// K-way merge of already-sorted inputs, applying `reducer` to each run of
/// equal keys. The result is sorted by extracted key; within a run, records
/// keep input order (earlier inputs first).
pub fn merge_sorted_runs<T, K: Ord>(
    inputs: Vec<Vec<T>>,
    key_fn: impl Fn(&T) -> K,
    reducer: &impl Reducer<T>,
) -> Vec<T> {
    let mut cursors: Vec<_> = inputs
        .into_iter()
        .map(|v| v.into_iter().peekable())
        .collect();
    let mut out = Vec::new();
    loop {
        let mut min_key: Option<K> = None;
        for cursor in cursors.iter_mut() {
            if let Some(head) = cursor.peek() {
                let key = key_fn(head);
                if min_key.as_ref().is_none_or(|m| key < *m) {
                    min_key = Some(key);
                }
            }
        }
        let Some(min_key) = min_key else {
            break;
        };
        let mut run = Vec::new();
        for cursor in cursors.iter_mut() {
            while let Some(record) = cursor.next_if(|r| key_fn(r) == min_key) {
                run.push(record);
            }
        }
        out.extend(reducer.reduce(run));
    }
    out
}
