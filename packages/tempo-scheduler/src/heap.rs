use smallvec::SmallVec;
use std::cmp::Ordering;

/// Array-backed binary min-heap with an injectable comparator.
///
/// Ties are broken only by the comparator itself; callers that need a
/// deterministic tie-break must encode it there (tasks do, via their
/// sequence number).
pub struct MinHeap<T> {
    items: SmallVec<[T; 8]>,
    cmp: Box<dyn Fn(&T, &T) -> Ordering>,
}

impl<T: Ord + 'static> MinHeap<T> {
    /// Heap ordered by natural ordering.
    pub fn new() -> Self {
        Self::with_comparator(|a: &T, b: &T| a.cmp(b))
    }
}

impl<T: Ord + 'static> Default for MinHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MinHeap<T> {
    pub fn with_comparator(cmp: impl Fn(&T, &T) -> Ordering + 'static) -> Self {
        Self {
            items: SmallVec::new(),
            cmp: Box::new(cmp),
        }
    }

    /// Append and sift up. O(log n).
    pub fn insert(&mut self, value: T) {
        self.items.push(value);
        self.sift_up(self.items.len() - 1);
    }

    /// The minimum element, without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Remove and return the minimum element.
    pub fn remove(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let root = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        root
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Restore heap order after sort keys were mutated externally
    /// (Floyd's bottom-up rebuild, O(n)).
    pub fn reheapify(&mut self) {
        for idx in (0..self.items.len() / 2).rev() {
            self.sift_down(idx);
        }
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if (self.cmp)(&self.items[idx], &self.items[parent]) == Ordering::Less {
                self.items.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = idx;
            if (self.cmp)(&self.items[left], &self.items[smallest]) == Ordering::Less {
                smallest = left;
            }
            if right < len && (self.cmp)(&self.items[right], &self.items[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.items.swap(idx, smallest);
            idx = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_returns_minimum() {
        let mut heap = MinHeap::new();
        for n in [7, 3, 9, 1, 4] {
            heap.insert(n);
        }
        assert_eq!(heap.peek(), Some(&1));
        assert_eq!(heap.len(), 5);
    }

    #[test]
    fn remove_yields_non_decreasing_order() {
        let mut heap = MinHeap::new();
        for n in [5, 1, 8, 1, 9, 0, 3, 7, 2, 6] {
            heap.insert(n);
        }
        let mut drained = Vec::new();
        while let Some(n) = heap.remove() {
            drained.push(n);
        }
        let mut sorted = drained.clone();
        sorted.sort();
        assert_eq!(drained, sorted);
        assert!(heap.is_empty());
    }

    #[test]
    fn empty_heap_returns_none() {
        let mut heap: MinHeap<i32> = MinHeap::new();
        assert_eq!(heap.peek(), None);
        assert_eq!(heap.remove(), None);
    }

    #[test]
    fn injected_comparator_inverts_order() {
        let mut heap = MinHeap::with_comparator(|a: &i32, b: &i32| b.cmp(a));
        for n in [2, 9, 4] {
            heap.insert(n);
        }
        assert_eq!(heap.remove(), Some(9));
        assert_eq!(heap.remove(), Some(4));
        assert_eq!(heap.remove(), Some(2));
    }

    #[test]
    fn reheapify_restores_order_after_key_change() {
        use std::cell::Cell;
        use std::rc::Rc;

        let keys: Vec<Rc<Cell<i32>>> = (0..5).map(|n| Rc::new(Cell::new(n))).collect();
        let mut heap = MinHeap::with_comparator(|a: &Rc<Cell<i32>>, b: &Rc<Cell<i32>>| {
            a.get().cmp(&b.get())
        });
        for key in &keys {
            heap.insert(key.clone());
        }
        keys[0].set(100);
        heap.reheapify();
        assert_eq!(heap.remove().map(|k| k.get()), Some(1));
    }

    #[test]
    fn clear_empties_the_heap() {
        let mut heap = MinHeap::new();
        heap.insert(1);
        heap.insert(2);
        heap.clear();
        assert!(heap.is_empty());
    }
}
