//! Removal by value and by predicate.

use crate::node::Node;
use crate::{ArrayAllocator, PooledVec};

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Removes the first element equal to `value`. Returns `true` if one was found.
    pub fn remove(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.assert_live();
        match self.index_of(value) {
            Some(index) => self.remove_at(index).is_ok(),
            None => false,
        }
    }

    /// Removes every element equal to `value`, returning how many were removed.
    pub fn remove_all(&mut self, value: &T) -> usize
    where
        T: PartialEq,
    {
        self.remove_all_matching(|item| item == value)
    }

    /// Removes every element matching `pred`, returning how many were removed.
    ///
    /// The relative order of the remaining elements is preserved. A vector
    /// held in one segment is compacted in a single pass.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::{Options, PooledVec};
    ///
    /// let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
    /// vec.extend(0..100);
    /// assert_eq!(vec.remove_all_matching(|x| x % 2 == 1), 50);
    /// assert_eq!(vec.len(), 50);
    /// assert_eq!(vec[10], 20);
    /// ```
    pub fn remove_all_matching<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        self.assert_live();
        if let Some(Node::Segment(segment)) = self.root.as_mut() {
            let removed = segment.items_mut().remove_matching(&mut pred, lease!(self));
            if removed > 0 {
                self.len -= removed;
                self.bump_version();
                self.settle();
            }
            return removed;
        }

        let mut removed = 0;
        let mut start = 0;
        while let Some(index) = self.find_index(&mut pred, start) {
            if self.remove_at(index).is_err() {
                break;
            }
            removed += 1;
            start = index;
        }
        removed
    }

    /// Keeps only the elements matching `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.remove_all_matching(|item| !keep(item));
    }
}

#[cfg(test)]
mod tests {
    use crate::{Options, PooledVec};

    fn small(n: i32) -> PooledVec<i32> {
        let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
        vec.extend(0..n);
        vec
    }

    #[test]
    fn test_remove_first_match() {
        let mut vec = small(40);
        vec.push(5);
        assert!(vec.remove(&5));
        assert_eq!(vec[5], 6);
        assert_eq!(vec.last(), Some(&5));
        assert!(!vec.remove(&1000));
        assert_eq!(vec.len(), 40);
    }

    #[test]
    fn test_remove_all_single_segment() {
        let mut vec = small(0);
        vec.extend([1, 2, 1, 3, 1]);
        let version = vec.version();
        assert_eq!(vec.remove_all(&1), 3);
        assert_eq!(vec, [2, 3][..]);
        assert_ne!(vec.version(), version);

        let version = vec.version();
        assert_eq!(vec.remove_all(&9), 0);
        assert_eq!(vec.version(), version);
    }

    #[test]
    fn test_remove_all_deep() {
        let mut vec = small(200);
        assert_eq!(vec.remove_all_matching(|x| x % 3 == 0), 67);
        assert_eq!(vec.len(), 133);
        assert!(vec.iter().all(|x| x % 3 != 0));
        assert_eq!(vec.last(), Some(&199));
        let sizes: Vec<usize> = vec.segments().map(<[i32]>::len).collect();
        assert!(sizes[..sizes.len() - 1].iter().all(|&n| n == 16));
    }

    #[test]
    fn test_remove_all_empties() {
        let mut vec = small(50);
        assert_eq!(vec.remove_all_matching(|_| true), 50);
        assert!(vec.is_empty());
        assert_eq!(vec.depth(), 0);
        vec.push(1);
        assert_eq!(vec, [1][..]);
    }

    #[test]
    fn test_retain() {
        let mut vec = small(10);
        vec.retain(|x| *x < 3);
        assert_eq!(vec, [0, 1, 2][..]);
    }
}
