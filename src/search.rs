//! Linear and binary search.
//!
//! Binary searches follow the slice convention: `Ok(index)` for a match,
//! `Err(index)` for the position where the value would be inserted to keep
//! the order.

use std::cmp::Ordering;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::{ArrayAllocator, PooledVec};

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Returns the index of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.index_of_from(value, 0)
    }

    /// Returns the index of the first element at or after `start` equal to `value`.
    pub fn index_of_from(&self, value: &T, start: usize) -> Option<usize>
    where
        T: PartialEq,
    {
        self.find_index(|item| item == value, start)
    }

    /// Returns `true` if some element equals `value`.
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.index_of(value).is_some()
    }

    /// Returns the index of the first element at or after `start` matching `pred`.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::PooledVec;
    ///
    /// let vec: PooledVec<i32> = (0..10).collect();
    /// assert_eq!(vec.find_index(|x| x % 4 == 0, 1), Some(4));
    /// assert_eq!(vec.find_index(|x| *x > 20, 0), None);
    /// ```
    pub fn find_index<F>(&self, pred: F, start: usize) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        if start >= self.len {
            return None;
        }
        self.position_within(start, self.len, pred)
    }

    /// Returns the index of the first element in `range` matching `pred`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `range` is reversed or extends
    /// past the end.
    pub fn find_index_in<F>(&self, range: Range<usize>, pred: F) -> Result<Option<usize>>
    where
        F: FnMut(&T) -> bool,
    {
        self.check_search_range(&range)?;
        Ok(self.position_within(range.start, range.end, pred))
    }

    /// Returns the index of the last element matching `pred`.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::PooledVec;
    ///
    /// let vec: PooledVec<i32> = (0..10).collect();
    /// assert_eq!(vec.find_last_index(|x| x % 4 == 0), Some(8));
    /// assert_eq!(vec.find_last_index_in(0..8, |x| x % 4 == 0), Ok(Some(4)));
    /// ```
    pub fn find_last_index<F>(&self, pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.rposition_within(0, self.len, pred)
    }

    /// Returns the index of the last element in `range` matching `pred`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `range` is reversed or extends
    /// past the end.
    pub fn find_last_index_in<F>(&self, range: Range<usize>, pred: F) -> Result<Option<usize>>
    where
        F: FnMut(&T) -> bool,
    {
        self.check_search_range(&range)?;
        Ok(self.rposition_within(range.start, range.end, pred))
    }

    fn position_within<F>(&self, start: usize, end: usize, mut pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(slice) = self.as_slice() {
            return slice[start..end]
                .iter()
                .position(|item| pred(item))
                .map(|found| found + start);
        }
        self.root.as_ref()?.position(start, end, &mut pred)
    }

    fn rposition_within<F>(&self, start: usize, end: usize, mut pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(slice) = self.as_slice() {
            return slice[start..end]
                .iter()
                .rposition(|item| pred(item))
                .map(|found| found + start);
        }
        self.root.as_ref()?.rposition(start, end, &mut pred)
    }

    fn check_search_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.len {
            return Err(Error::invalid_argument(
                "range",
                format!(
                    "{}..{} is not a valid range for length {}",
                    range.start, range.end, self.len
                ),
            ));
        }
        Ok(())
    }

    /// Binary searches a sorted vector for `value`.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::PooledVec;
    ///
    /// let vec: PooledVec<i32> = [1, 3, 5, 7].into_iter().collect();
    /// assert_eq!(vec.binary_search(&5), Ok(2));
    /// assert_eq!(vec.binary_search(&4), Err(2));
    /// assert_eq!(vec.binary_search(&9), Err(4));
    /// ```
    pub fn binary_search(&self, value: &T) -> std::result::Result<usize, usize>
    where
        T: Ord,
    {
        self.binary_search_by(|item| item.cmp(value))
    }

    /// Binary searches with a comparator returning the order of an element
    /// relative to the target.
    pub fn binary_search_by<F>(&self, f: F) -> std::result::Result<usize, usize>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.search_within(0, self.len, f)
    }

    /// Binary searches for the element whose key, as extracted by `f`, is `key`.
    pub fn binary_search_by_key<B, F>(&self, key: &B, mut f: F) -> std::result::Result<usize, usize>
    where
        B: Ord,
        F: FnMut(&T) -> B,
    {
        self.binary_search_by(|item| f(item).cmp(key))
    }

    /// Binary searches the sorted sub-range `range` for `value`.
    ///
    /// Indices in the result are absolute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `range` is reversed or extends
    /// past the end.
    pub fn binary_search_range(
        &self,
        range: Range<usize>,
        value: &T,
    ) -> Result<std::result::Result<usize, usize>>
    where
        T: Ord,
    {
        self.binary_search_range_by(range, |item| item.cmp(value))
    }

    /// Comparator form of [`PooledVec::binary_search_range`].
    pub fn binary_search_range_by<F>(
        &self,
        range: Range<usize>,
        f: F,
    ) -> Result<std::result::Result<usize, usize>>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.check_search_range(&range)?;
        Ok(self.search_within(range.start, range.end, f))
    }

    fn search_within<F>(&self, start: usize, end: usize, mut f: F) -> std::result::Result<usize, usize>
    where
        F: FnMut(&T) -> Ordering,
    {
        if let Some(slice) = self.as_slice() {
            return match slice[start..end].binary_search_by(f) {
                Ok(found) => Ok(found + start),
                Err(at) => Err(at + start),
            };
        }
        let (mut lo, mut hi) = (start, end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let Some(item) = self.get(mid) else {
                break;
            };
            match f(item) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;

    fn evens(n: i32) -> PooledVec<i32> {
        let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
        vec.extend((0..n).map(|x| x * 2));
        vec
    }

    #[test]
    fn test_index_of_across_segments() {
        let vec = evens(100);
        assert_eq!(vec.index_of(&0), Some(0));
        assert_eq!(vec.index_of(&40), Some(20));
        assert_eq!(vec.index_of(&41), None);
        assert_eq!(vec.index_of_from(&40, 21), None);
        assert_eq!(vec.index_of_from(&40, 500), None);
        assert!(vec.contains(&198));
        assert!(!vec.contains(&200));
    }

    #[test]
    fn test_find_index_from_start() {
        let vec = evens(100);
        assert_eq!(vec.find_index(|x| x % 10 == 0, 1), Some(5));
        assert_eq!(vec.find_index(|x| x % 10 == 0, 96), None);
        assert_eq!(vec.find_index(|x| *x >= 150, 17), Some(75));
    }

    #[test]
    fn test_find_index_in_bounded() {
        let vec = evens(100);
        assert_eq!(vec.find_index_in(10..20, |x| x % 10 == 0), Ok(Some(10)));
        assert_eq!(vec.find_index_in(11..15, |x| x % 10 == 0), Ok(None));
        assert_eq!(vec.find_index_in(11..16, |x| x % 10 == 0), Ok(Some(15)));
        assert_eq!(vec.find_index_in(30..30, |_| true), Ok(None));
        assert!(vec.find_index_in(90..101, |_| true).is_err());
    }

    #[test]
    fn test_find_last_index() {
        let vec = evens(100);
        assert!(vec.depth() > 1);
        assert_eq!(vec.find_last_index(|x| x % 10 == 0), Some(95));
        assert_eq!(vec.find_last_index(|x| *x < 33), Some(16));
        assert_eq!(vec.find_last_index(|x| *x > 500), None);
        assert_eq!(vec.find_last_index_in(0..95, |x| x % 10 == 0), Ok(Some(90)));
        assert_eq!(vec.find_last_index_in(16..20, |x| x % 10 == 0), Ok(None));
        assert_eq!(vec.find_last_index_in(15..16, |x| x % 10 == 0), Ok(Some(15)));

        let flat = evens(10);
        assert_eq!(flat.find_last_index(|x| x % 4 == 0), Some(8));
        assert_eq!(flat.find_last_index_in(0..4, |x| x % 4 == 0), Ok(Some(2)));
        assert!(evens(0).find_last_index(|_| true).is_none());
    }

    #[test]
    fn test_binary_search_deep() {
        let vec = evens(1000);
        assert!(vec.depth() > 1);
        for i in [0, 1, 15, 16, 17, 500, 999] {
            assert_eq!(vec.binary_search(&(i * 2)), Ok(i as usize));
            assert_eq!(vec.binary_search(&(i * 2 + 1)), Err(i as usize + 1));
        }
        assert_eq!(vec.binary_search(&-1), Err(0));
        assert_eq!(vec.binary_search_by_key(&250, |x| x / 2), Ok(250));
    }

    #[test]
    fn test_binary_search_empty() {
        let vec = evens(0);
        assert_eq!(vec.binary_search(&3), Err(0));
    }

    #[test]
    fn test_binary_search_range() {
        let vec = evens(100);
        assert_eq!(vec.binary_search_range(20..40, &50), Ok(Ok(25)));
        assert_eq!(vec.binary_search_range(20..40, &2), Ok(Err(20)));
        assert_eq!(vec.binary_search_range(20..40, &190), Ok(Err(40)));
        assert_eq!(vec.binary_search_range(5..5, &10), Ok(Err(5)));

        let small = evens(10);
        assert_eq!(small.binary_search_range(2..6, &8), Ok(Ok(4)));
        assert_eq!(small.binary_search_range(2..6, &13), Ok(Err(6)));
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn test_binary_search_range_rejects_invalid() {
        let vec = evens(10);
        assert!(matches!(
            vec.binary_search_range(4..2, &0),
            Err(Error::InvalidArgument { name: "range", .. })
        ));
        assert!(vec.binary_search_range(0..11, &0).is_err());
    }
}
