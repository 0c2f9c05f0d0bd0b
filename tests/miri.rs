//! Tests specifically for miri

#![cfg(miri)]

use stride::{PoolConfig, Range, ThreadPool, Worker};
use tracing::info;

/// A node in a binary tree.
struct Node {
    val: u64,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    // Constructs a new binary tree with the given number of layers.
    pub fn tree(layers: usize) -> Self {
        Self {
            val: 1,
            left: (layers != 1).then(|| Box::new(Self::tree(layers - 1))),
            right: (layers != 1).then(|| Box::new(Self::tree(layers - 1))),
        }
    }
}

fn sum(node: &Node, worker: &Worker) -> u64 {
    let (left, right) = worker.join(
        |w| node.left.as_deref().map(|n| sum(n, w)).unwrap_or_default(),
        |w| node.right.as_deref().map(|n| sum(n, w)).unwrap_or_default(),
    );

    node.val + left + right
}

#[test]
fn reduce_and_join() {
    let pool = ThreadPool::build(PoolConfig::default().num_threads(Some(2)));
    let layers = 6;
    let target = (1 << layers) - 1;
    let tree = Node::tree(layers);

    info!("Work beginning");
    let sums = pool
        .reduce(
            Range::upto(4).unwrap(),
            |_| Worker::map_current(|worker| sum(&tree, worker)).unwrap(),
            |a, b| a + b,
        )
        .unwrap();
    assert_eq!(sums, 4 * target);
    info!("Work completed");
}

#[test]
fn panic_is_contained() {
    let pool = ThreadPool::build(PoolConfig::default().num_threads(Some(2)));
    let result = pool.for_each(Range::upto(4).unwrap(), |i| {
        if i == 2 {
            panic!("boom");
        }
    });
    assert_eq!(result.unwrap_err().message(), Some("boom"));
}
