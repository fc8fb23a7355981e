//! Order-statistic tree
//!
//! A treap where every node tracks the size of its subtree, giving
//! O(log n) expected insert, remove, rank and positional range reads. Keys are
//! unique; the ranking store makes them unique by pairing the score with
//! the player id.

use std::cmp::Ordering;

type Link<K> = Option<Box<Node<K>>>;

struct Node<K> {
    key: K,
    priority: u64,
    size: usize,
    left: Link<K>,
    right: Link<K>,
}

impl<K> Node<K> {
    fn new(key: K, priority: u64) -> Box<Self> {
        Box::new(Self {
            key,
            priority,
            size: 1,
            left: None,
            right: None,
        })
    }

    fn update(&mut self) {
        self.size = 1 + size(&self.left) + size(&self.right);
    }
}

fn size<K>(link: &Link<K>) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

/// Split into keys `< key` and keys `>= key`
fn split<K: Ord>(link: Link<K>, key: &K) -> (Link<K>, Link<K>) {
    match link {
        None => (None, None),
        Some(mut node) => {
            if node.key < *key {
                let (l, r) = split(node.right.take(), key);
                node.right = l;
                node.update();
                (Some(node), r)
            } else {
                let (l, r) = split(node.left.take(), key);
                node.left = r;
                node.update();
                (l, Some(node))
            }
        }
    }
}

/// Join two trees where every key of `a` is less than every key of `b`
fn merge<K>(a: Link<K>, b: Link<K>) -> Link<K> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(mut a), Some(mut b)) => {
            if a.priority > b.priority {
                a.right = merge(a.right.take(), Some(b));
                a.update();
                Some(a)
            } else {
                b.left = merge(Some(a), b.left.take());
                b.update();
                Some(b)
            }
        }
    }
}

fn remove<K: Ord>(link: &mut Link<K>, key: &K) -> bool {
    let Some(node) = link else {
        return false;
    };
    match key.cmp(&node.key) {
        Ordering::Less => {
            let removed = remove(&mut node.left, key);
            if removed {
                node.size -= 1;
            }
            removed
        }
        Ordering::Greater => {
            let removed = remove(&mut node.right, key);
            if removed {
                node.size -= 1;
            }
            removed
        }
        Ordering::Equal => {
            let left = node.left.take();
            let right = node.right.take();
            *link = merge(left, right);
            true
        }
    }
}

fn collect<'a, K>(link: &'a Link<K>, start: usize, end: usize, out: &mut Vec<&'a K>) {
    let Some(node) = link else {
        return;
    };
    if start >= end {
        return;
    }
    let left = size(&node.left);
    if start < left {
        collect(&node.left, start, end.min(left), out);
    }
    if start <= left && left < end {
        out.push(&node.key);
    }
    if end > left + 1 {
        collect(
            &node.right,
            start.saturating_sub(left + 1),
            end - left - 1,
            out,
        );
    }
}

/// Ordered set with positional queries
pub struct OrderStatTree<K> {
    root: Link<K>,
    seed: u64,
}

impl<K: Ord> OrderStatTree<K> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            seed: 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Number of keys in the tree
    #[must_use]
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert a key. Returns `false` if it was already present.
    pub fn insert(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        let priority = self.next_priority();
        let (l, r) = split(self.root.take(), &key);
        self.root = merge(merge(l, Some(Node::new(key, priority))), r);
        true
    }

    /// Remove a key. Returns `false` if it was absent.
    pub fn remove(&mut self, key: &K) -> bool {
        remove(&mut self.root, key)
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            match key.cmp(&node.key) {
                Ordering::Less => cur = node.left.as_deref(),
                Ordering::Greater => cur = node.right.as_deref(),
                Ordering::Equal => return true,
            }
        }
        false
    }

    /// Number of keys strictly less than `key`.
    ///
    /// For a present key this is its 0-based position.
    #[must_use]
    pub fn rank(&self, key: &K) -> usize {
        let mut count = 0;
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            if *key <= node.key {
                cur = node.left.as_deref();
            } else {
                count += size(&node.left) + 1;
                cur = node.right.as_deref();
            }
        }
        count
    }

    /// Keys at positions `[start, end)`, in order. Out-of-range bounds are clamped.
    #[must_use]
    pub fn range(&self, start: usize, end: usize) -> Vec<&K> {
        let end = end.min(self.len());
        let mut out = Vec::with_capacity(end.saturating_sub(start));
        collect(&self.root, start, end, &mut out);
        out
    }

    // xorshift64*; priorities only need to look random, not be secure
    fn next_priority(&mut self) -> u64 {
        let mut x = self.seed;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.seed = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}

impl<K: Ord> Default for OrderStatTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;

    #[test]
    fn test_insert_and_rank() {
        let mut tree = OrderStatTree::new();
        for k in [50, 10, 40, 20, 30] {
            assert!(tree.insert(k));
        }
        assert!(!tree.insert(30));
        assert_eq!(tree.len(), 5);

        assert_eq!(tree.rank(&10), 0);
        assert_eq!(tree.rank(&30), 2);
        // Absent key: count of smaller keys
        assert_eq!(tree.rank(&35), 3);
        assert_eq!(tree.rank(&99), 5);

        assert_eq!(tree.range(0, 1), vec![&10]);
        assert_eq!(tree.range(4, 5), vec![&50]);
        assert!(tree.range(5, 6).is_empty());
    }

    #[test]
    fn test_remove() {
        let mut tree = OrderStatTree::new();
        for k in 0..100 {
            tree.insert(k);
        }
        for k in (0..100).step_by(2) {
            assert!(tree.remove(&k));
        }
        assert!(!tree.remove(&0));
        assert_eq!(tree.len(), 50);
        assert_eq!(tree.range(0, 1), vec![&1]);
        assert_eq!(tree.rank(&51), 25);
        assert!(!tree.contains(&50));
        assert!(tree.contains(&51));
    }

    #[test]
    fn test_range_clamps() {
        let mut tree = OrderStatTree::new();
        for k in 1..=10 {
            tree.insert(Reverse(k));
        }
        let top: Vec<i32> = tree.range(0, 3).into_iter().map(|r| r.0).collect();
        assert_eq!(top, vec![10, 9, 8]);

        let mid: Vec<i32> = tree.range(4, 7).into_iter().map(|r| r.0).collect();
        assert_eq!(mid, vec![6, 5, 4]);

        assert_eq!(tree.range(8, 100).len(), 2);
        assert!(tree.range(20, 30).is_empty());
        assert!(tree.range(5, 5).is_empty());
    }

    #[test]
    fn test_matches_sorted_vec_under_churn() {
        let mut tree = OrderStatTree::new();
        let mut model: Vec<u64> = Vec::new();
        let mut x: u64 = 7;
        for _ in 0..2_000 {
            x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let key = (x >> 33) % 500;
            if x % 3 == 0 {
                let removed = tree.remove(&key);
                let pos = model.binary_search(&key);
                assert_eq!(removed, pos.is_ok());
                if let Ok(pos) = pos {
                    model.remove(pos);
                }
            } else {
                let inserted = tree.insert(key);
                if let Err(pos) = model.binary_search(&key) {
                    assert!(inserted);
                    model.insert(pos, key);
                } else {
                    assert!(!inserted);
                }
            }
        }

        assert_eq!(tree.len(), model.len());
        let all: Vec<u64> = tree.range(0, tree.len()).into_iter().copied().collect();
        assert_eq!(all, model);
        for (i, k) in model.iter().enumerate() {
            assert_eq!(tree.rank(k), i);
        }
    }
}
