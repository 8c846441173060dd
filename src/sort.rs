//! Sorting and reversal.
//!
//! A vector held in one segment is sorted as a plain slice. Deeper vectors
//! either move their elements out, sort them contiguously and rebuild the
//! tree (stable sorts), or run an introsort in place through indexed access
//! (unstable sorts).

use std::cmp::Ordering;

use crate::{ArrayAllocator, PooledVec};

/// Threshold for switching to insertion sort.
const INSERTION_SORT_THRESHOLD: usize = 20;

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Sorts the vector. The sort is stable.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::PooledVec;
    ///
    /// let mut vec: PooledVec<i32> = [5, 1, 4, 2, 3].into_iter().collect();
    /// vec.sort();
    /// assert_eq!(vec, [1, 2, 3, 4, 5][..]);
    /// ```
    pub fn sort(&mut self)
    where
        T: Ord,
    {
        self.sort_by(T::cmp);
    }

    /// Sorts the vector with a comparator. The sort is stable.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.assert_live();
        if let Some(slice) = self.as_mut_slice() {
            slice.sort_by(compare);
        } else {
            self.sort_rebuilt(&mut compare);
        }
        self.bump_version();
    }

    /// Sorts the vector with a key extraction function. The sort is stable.
    pub fn sort_by_key<K, F>(&mut self, mut f: F)
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.sort_by(|a, b| f(a).cmp(&f(b)));
    }

    /// Sorts the vector in place without preserving the order of equal elements.
    ///
    /// Never allocates for a vector deeper than one segment: elements are
    /// swapped across segments where they lie.
    pub fn sort_unstable(&mut self)
    where
        T: Ord,
    {
        self.sort_unstable_by(T::cmp);
    }

    /// Comparator form of [`PooledVec::sort_unstable`].
    pub fn sort_unstable_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.assert_live();
        if let Some(slice) = self.as_mut_slice() {
            slice.sort_unstable_by(compare);
        } else {
            let len = self.len;
            let mut is_less = |a: &T, b: &T| compare(a, b) == Ordering::Less;
            quicksort(self, 0, len, &mut is_less);
        }
        self.bump_version();
    }

    /// Returns `true` if the elements are in non-decreasing order.
    pub fn is_sorted(&self) -> bool
    where
        T: PartialOrd,
    {
        self.is_sorted_by(|a, b| a <= b)
    }

    /// Returns `true` if `compare` holds for every adjacent pair.
    pub fn is_sorted_by<F>(&self, mut compare: F) -> bool
    where
        F: FnMut(&T, &T) -> bool,
    {
        let mut iter = self.iter();
        let Some(mut prev) = iter.next() else {
            return true;
        };
        for item in iter {
            if !compare(prev, item) {
                return false;
            }
            prev = item;
        }
        true
    }

    /// Reverses the order of the elements.
    pub fn reverse(&mut self) {
        self.assert_live();
        if let Some(slice) = self.as_mut_slice() {
            slice.reverse();
        } else {
            let len = self.len;
            for i in 0..len / 2 {
                self.swap(i, len - 1 - i);
            }
        }
        self.bump_version();
    }

    #[cold]
    #[inline(never)]
    fn sort_rebuilt<F>(&mut self, compare: &mut F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let version = self.version;
        let mut all = self.take_all();
        tracing::debug!(len = all.len(), "sorting through a rebuilt tree");
        all.sort_by(compare);
        self.extend(all);
        self.version = version;
    }
}

/// Sorts `v[start..end]` using insertion sort.
fn insertion_sort<T, A, F>(v: &mut PooledVec<T, A>, start: usize, end: usize, is_less: &mut F)
where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    for i in (start + 1)..end {
        let mut j = i;
        while j > start && is_less(&v[j], &v[j - 1]) {
            v.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Sorts `v[start..end]` using heapsort. Guarantees O(n log n) worst-case.
#[inline(never)]
fn heapsort<T, A, F>(v: &mut PooledVec<T, A>, start: usize, end: usize, is_less: &mut F)
where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    let len = end - start;
    if len < 2 {
        return;
    }
    for i in (0..len / 2).rev() {
        sift_down(v, start, i, len, is_less);
    }
    for i in (1..len).rev() {
        v.swap(start, start + i);
        sift_down(v, start, 0, i, is_less);
    }
}

/// Sift down element at `node` in heap rooted at `start` with size `heap_size`.
fn sift_down<T, A, F>(
    v: &mut PooledVec<T, A>,
    start: usize,
    mut node: usize,
    heap_size: usize,
    is_less: &mut F,
) where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    loop {
        let mut child = 2 * node + 1;
        if child >= heap_size {
            break;
        }
        if child + 1 < heap_size && is_less(&v[start + child], &v[start + child + 1]) {
            child += 1;
        }
        if !is_less(&v[start + node], &v[start + child]) {
            break;
        }
        v.swap(start + node, start + child);
        node = child;
    }
}

/// Sorts `v[start..end]` using quicksort with heapsort fallback.
fn quicksort<T, A, F>(v: &mut PooledVec<T, A>, start: usize, end: usize, is_less: &mut F)
where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    let len = end - start;
    if len < 2 {
        return;
    }
    // Limit recursion depth to 2 * log2(len).
    let limit = 2 * (usize::BITS - len.leading_zeros());
    quicksort_recursive(v, start, end, is_less, limit);
}

fn quicksort_recursive<T, A, F>(
    v: &mut PooledVec<T, A>,
    mut start: usize,
    mut end: usize,
    is_less: &mut F,
    mut limit: u32,
) where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    loop {
        let len = end - start;
        if len <= INSERTION_SORT_THRESHOLD {
            insertion_sort(v, start, end, is_less);
            return;
        }
        if limit == 0 {
            heapsort(v, start, end, is_less);
            return;
        }
        limit -= 1;

        let mid = start + len / 2;
        let pivot = choose_pivot(v, start, mid, end - 1, is_less);
        v.swap(start, pivot);
        let pivot = partition(v, start, end, is_less);

        // Recurse into the smaller side, loop on the larger.
        if pivot - start < end - pivot - 1 {
            quicksort_recursive(v, start, pivot, is_less, limit);
            start = pivot + 1;
        } else {
            quicksort_recursive(v, pivot + 1, end, is_less, limit);
            end = pivot;
        }
    }
}

/// Index of the median of `v[a]`, `v[b]` and `v[c]`.
fn choose_pivot<T, A, F>(v: &PooledVec<T, A>, a: usize, b: usize, c: usize, is_less: &mut F) -> usize
where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    if is_less(&v[a], &v[b]) {
        if is_less(&v[b], &v[c]) {
            b
        } else if is_less(&v[a], &v[c]) {
            c
        } else {
            a
        }
    } else if is_less(&v[a], &v[c]) {
        a
    } else if is_less(&v[b], &v[c]) {
        c
    } else {
        b
    }
}

/// Hoare partition of `v[start..end]` around the pivot at `v[start]`.
/// Returns the final position of the pivot.
fn partition<T, A, F>(v: &mut PooledVec<T, A>, start: usize, end: usize, is_less: &mut F) -> usize
where
    A: ArrayAllocator<T>,
    F: FnMut(&T, &T) -> bool,
{
    let mut left = start + 1;
    let mut right = end - 1;
    loop {
        while left <= right && is_less(&v[left], &v[start]) {
            left += 1;
        }
        while left <= right && !is_less(&v[right], &v[start]) {
            right -= 1;
        }
        if left > right {
            break;
        }
        v.swap(left, right);
        left += 1;
        right -= 1;
    }
    v.swap(start, right);
    right
}
