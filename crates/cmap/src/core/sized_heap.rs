//! A bounded max-heap for collecting the `k` nearest neighbors of a point.

use std::{cmp::Ordering, collections::BinaryHeap};

/// A max-heap that holds at most `k` items, keeping the smallest ones.
///
/// Items are usually `(distance, index)` pairs, so that ties in distance are
/// broken by the lower index and neighbor searches are deterministic.
pub struct SizedHeap<T: PartialOrd> {
    /// The heap of items.
    heap: BinaryHeap<MaxItem<T>>,
    /// The maximum size of the heap.
    k: usize,
}

impl<T: PartialOrd> SizedHeap<T> {
    /// Creates a new `SizedHeap` holding at most `k` items.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k),
            k,
        }
    }

    /// Returns the maximum size of the heap.
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Pushes an item onto the heap if it is smaller than the current
    /// largest item or the heap is not yet full.
    pub fn push(&mut self, item: T) {
        if self.heap.len() < self.k {
            self.heap.push(MaxItem(item));
        } else if let Some(top) = self.heap.peek() {
            if item < top.0 {
                self.heap.pop();
                self.heap.push(MaxItem(item));
            }
        }
    }

    /// Peeks at the largest item in the heap.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|MaxItem(x)| x)
    }

    /// Returns the number of items in the heap.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns whether the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns whether the heap holds `k` items.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.heap.len() == self.k
    }

    /// Consumes the heap and returns its items in ascending order.
    #[must_use]
    pub fn into_sorted_vec(self) -> Vec<T> {
        self.heap.into_sorted_vec().into_iter().map(|MaxItem(x)| x).collect()
    }
}

impl<T: PartialOrd> Extend<T> for SizedHeap<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        for item in items {
            self.push(item);
        }
    }
}

/// A wrapper that gives a total order to a `PartialOrd` type.
///
/// Incomparable values, e.g. `NaN` distances, compare as `Less` and so never
/// displace a real neighbor.
struct MaxItem<T: PartialOrd>(T);

impl<T: PartialOrd> PartialEq for MaxItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: PartialOrd> Eq for MaxItem<T> {}

impl<T: PartialOrd> PartialOrd for MaxItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: PartialOrd> Ord for MaxItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Less)
    }
}

#[cfg(test)]
mod tests {
    use super::SizedHeap;

    #[test]
    fn keeps_smallest() {
        let mut heap = SizedHeap::new(3);
        heap.extend([(5.0, 0), (1.0, 1), (4.0, 2), (1.0, 3), (3.0, 4)]);

        assert!(heap.is_full());
        assert_eq!(heap.peek(), Some(&(3.0, 4)));
        assert_eq!(heap.into_sorted_vec(), vec![(1.0, 1), (1.0, 3), (3.0, 4)]);
    }
}
