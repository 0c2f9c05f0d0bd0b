//! Property tests for range splitting, and for loops and reductions over
//! arbitrary ranges.

use std::sync::Mutex;
use std::sync::OnceLock;

use proptest::prelude::*;
use stride::{PoolConfig, Range, ThreadPool};

fn pool() -> &'static ThreadPool {
    static POOL: OnceLock<&'static ThreadPool> = OnceLock::new();
    POOL.get_or_init(|| ThreadPool::build(PoolConfig::default().num_threads(Some(3))))
}

/// Ranges with at least one index, of any step and chunk size.
fn any_range() -> impl Strategy<Value = Range> {
    (-1_000_000_i64..1_000_000, 1_i64..5_000, 1_i64..50, 1_i64..20).prop_map(
        |(begin, width, step, chunk)| Range::new(begin, begin + width, step, chunk).unwrap(),
    )
}

/// Ranges anywhere in the index domain, including near its bounds.
fn wide_range() -> impl Strategy<Value = Range> {
    (any::<i64>(), any::<i64>(), 1_i64..=1 << 40)
        .prop_filter("begin must be below end", |(a, b, _)| a != b)
        .prop_map(|(a, b, step)| Range::new(a.min(b), a.max(b), step, 1).unwrap())
}

proptest! {
    #[test]
    fn middle_is_a_strided_interior_point(range in wide_range()) {
        prop_assume!(range.len() >= 2);
        let middle = range.middle();
        prop_assert!(range.begin() < middle);
        prop_assert!(middle < range.end());
        prop_assert_eq!((middle.abs_diff(range.begin())) % range.step() as u64, 0);
    }

    #[test]
    fn split_halves_are_balanced(range in wide_range()) {
        prop_assume!(range.len() >= 2);
        let (left, right) = range.split().unwrap();
        prop_assert_eq!(left.begin(), range.begin());
        prop_assert_eq!(left.end(), right.begin());
        prop_assert_eq!(right.end(), range.end());
        prop_assert_eq!(left.len() + right.len(), range.len());
        prop_assert!(left.len() >= right.len());
        prop_assert!(left.len() - right.len() <= 1);
        prop_assert_eq!((left.step(), left.chunk()), (range.step(), range.chunk()));
        prop_assert_eq!((right.step(), right.chunk()), (range.step(), range.chunk()));
    }

    #[test]
    fn split_preserves_indices(range in any_range()) {
        let all: Vec<i64> = range.indices().collect();
        prop_assert_eq!(all.len() as u64, range.len());
        match range.split() {
            Some((left, right)) => {
                let joined: Vec<i64> = left.indices().chain(right.indices()).collect();
                prop_assert_eq!(joined, all);
            }
            None => prop_assert!(range.len() <= range.chunk() as u64),
        }
    }

    #[test]
    fn invalid_arguments_are_rejected(begin in any::<i64>(), end in any::<i64>(), step in any::<i64>(), chunk in any::<i64>()) {
        let valid = begin < end && step > 0 && chunk > 0;
        prop_assert_eq!(Range::new(begin, end, step, chunk).is_ok(), valid);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn loop_visits_exactly_the_indices(range in any_range()) {
        let visited = Mutex::new(Vec::new());
        pool().for_each(range, |i| visited.lock().unwrap().push(i)).unwrap();
        let mut visited = visited.into_inner().unwrap();
        visited.sort_unstable();
        prop_assert_eq!(visited, range.indices().collect::<Vec<_>>());
    }

    #[test]
    fn reduce_equals_sequential_fold(range in any_range()) {
        let concatenated = pool()
            .reduce(range, |i| vec![i], |mut a, b| {
                a.extend(b);
                a
            })
            .unwrap();
        prop_assert_eq!(concatenated, range.indices().collect::<Vec<_>>());
    }
}
