//! Fixed-capacity rolling window.
//!
//! A ring buffer over a preallocated arena: `head` is the slot the next push
//! writes to and `len` counts live elements. Once full, every push overwrites
//! the oldest element. Strategies use it for lookback statistics and the
//! chunked replayer uses it to retain warm-up rows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RollingWindow<T> {
    /// Create an empty window. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append `item`, returning the evicted oldest element when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = self.slots[self.head].replace(item);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
            None
        } else {
            evicted
        }
    }

    /// Element `index` positions after the oldest (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let slot = (self.head + self.capacity() - self.len + index) % self.capacity();
        self.slots[slot].as_ref()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn newest(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// The newest `n` elements, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.head = 0;
        self.len = 0;
    }
}

impl<T: Clone> RollingWindow<T> {
    /// Oldest to newest, cloned into a `Vec`.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl RollingWindow<f64> {
    pub fn sum(&self) -> f64 {
        self.iter().sum()
    }

    /// Mean of the newest `n` values, `None` if fewer are available.
    pub fn mean_last(&self, n: usize) -> Option<f64> {
        if n == 0 || self.len < n {
            return None;
        }
        Some(self.last_n(n).sum::<f64>() / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full_then_overwrite_oldest() {
        let mut w = RollingWindow::new(3);
        assert_eq!(w.push(1), None);
        assert_eq!(w.push(2), None);
        assert_eq!(w.push(3), None);
        assert!(w.is_full());
        assert_eq!(w.push(4), Some(1));
        assert_eq!(w.to_vec(), vec![2, 3, 4]);
        assert_eq!(w.oldest(), Some(&2));
        assert_eq!(w.newest(), Some(&4));
    }

    #[test]
    fn get_out_of_range_is_none() {
        let mut w = RollingWindow::new(4);
        w.push('a');
        assert_eq!(w.get(0), Some(&'a'));
        assert_eq!(w.get(1), None);
    }

    #[test]
    fn last_n_clamps_to_len() {
        let mut w = RollingWindow::new(5);
        for i in 0..7 {
            w.push(i);
        }
        let tail: Vec<_> = w.last_n(2).copied().collect();
        assert_eq!(tail, vec![5, 6]);
        let all: Vec<_> = w.last_n(50).copied().collect();
        assert_eq!(all, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn mean_of_last_values() {
        let mut w = RollingWindow::new(4);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            w.push(v);
        }
        assert_eq!(w.mean_last(2), Some(4.5));
        assert_eq!(w.mean_last(4), Some(3.5));
        assert_eq!(w.mean_last(5), None);
        assert_eq!(w.sum(), 14.0);
    }

    #[test]
    fn clear_resets() {
        let mut w = RollingWindow::new(2);
        w.push(1);
        w.push(2);
        w.clear();
        assert!(w.is_empty());
        w.push(9);
        assert_eq!(w.to_vec(), vec![9]);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut w = RollingWindow::new(0);
        w.push(1);
        assert_eq!(w.push(2), Some(1));
        assert_eq!(w.capacity(), 1);
    }
}
