//! Bulk operations: growing to a size, truncating and copying ranges.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::{ArrayAllocator, PooledVec};

/// Checks that `start..start + count` lies within `len`.
pub(crate) fn check_range(name: &'static str, start: usize, count: usize, len: usize) -> Result<()> {
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::invalid_argument(
            name,
            format!("range of {count} elements at {start} exceeds length {len}"),
        )),
    }
}

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Grows the vector to at least `size` elements, filling new slots with
    /// clones of `value`. Does nothing when the vector is already that long.
    ///
    /// Free room in the tail segment is filled first; the remainder is spilled
    /// into new segments of up to [`PooledVec::max_segment_capacity`] elements.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::{Options, PooledVec};
    ///
    /// let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
    /// vec.push(1);
    /// vec.ensure(40, 0);
    /// assert_eq!(vec.len(), 40);
    /// assert_eq!(vec[0], 1);
    /// assert_eq!(vec[39], 0);
    /// assert_eq!(vec.segment_count(), 3);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the vector has been disposed.
    pub fn ensure(&mut self, size: usize, value: T)
    where
        T: Clone,
    {
        self.assert_live();
        if self.len >= size {
            return;
        }
        let max = self.options.segment_capacity();
        let mut extra = size - self.len;
        if self.root.is_none() {
            self.root = Some(Node::empty_segment(extra, max, lease!(self)));
        }
        while extra > 0 {
            let lease = lease!(self);
            let Some(root) = self.root.as_mut() else {
                break;
            };
            if let Some(sibling) = root.ensure(&mut extra, &value, lease) {
                self.grow_root(sibling);
            }
        }
        self.len = size;
        self.bump_version();
        self.refresh_tail();
    }

    /// Resizes the vector to `len`, filling new slots with clones of `value`.
    pub fn resize(&mut self, len: usize, value: T)
    where
        T: Clone,
    {
        if len > self.len {
            self.ensure(len, value);
        } else {
            self.truncate(len);
        }
    }

    /// Shortens the vector to `len` elements, dropping the rest from the back.
    ///
    /// Segments emptied on the way are given back. Does nothing when `len`
    /// is not smaller than the current length.
    ///
    /// # Panics
    ///
    /// Panics if the vector has been disposed.
    pub fn truncate(&mut self, len: usize) {
        self.assert_live();
        if len >= self.len {
            return;
        }
        if len == 0 {
            self.clear();
            return;
        }
        let lease = lease!(self);
        match self.root.as_mut() {
            Some(Node::Segment(segment)) => segment.items_mut().truncate(len, lease),
            Some(root) => {
                for _ in len..self.len {
                    drop(root.remove_last(lease));
                }
            }
            None => {}
        }
        self.len = len;
        self.bump_version();
        self.settle();
    }

    /// Stores `value` at `index`, first growing the vector with default
    /// values if `index` lies past the end.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::PooledVec;
    ///
    /// let mut vec = PooledVec::new();
    /// vec.place_at(3, 7);
    /// assert_eq!(vec, [0, 0, 0, 7][..]);
    /// ```
    pub fn place_at(&mut self, index: usize, value: T)
    where
        T: Default + Clone,
    {
        self.assert_live();
        if index >= self.len {
            self.ensure(index + 1, T::default());
        }
        if let Some(slot) = self.get_mut(index) {
            *slot = value;
        }
    }

    /// Clones `count` elements starting at `src_index` into `dest[dest_index..]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when either range is out of bounds;
    /// nothing is copied in that case.
    pub fn copy_to(&self, src_index: usize, dest: &mut [T], dest_index: usize, count: usize) -> Result<()>
    where
        T: Clone,
    {
        check_range("src_index", src_index, count, self.len)?;
        check_range("dest_index", dest_index, count, dest.len())?;
        let dest = &mut dest[dest_index..dest_index + count];
        if let Some(slice) = self.as_slice() {
            dest.clone_from_slice(&slice[src_index..src_index + count]);
            return Ok(());
        }
        for (offset, slot) in dest.iter_mut().enumerate() {
            if let Some(item) = self.get(src_index + offset) {
                slot.clone_from(item);
            }
        }
        Ok(())
    }

    /// Overwrites `count` elements starting at `dest_index` with clones of
    /// `src[src_index..]`.
    ///
    /// Leaves the version untouched, like [`PooledVec::set`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when either range is out of bounds;
    /// nothing is written in that case.
    pub fn copy_from(&mut self, src: &[T], src_index: usize, dest_index: usize, count: usize) -> Result<()>
    where
        T: Clone,
    {
        self.assert_live();
        check_range("src_index", src_index, count, src.len())?;
        check_range("dest_index", dest_index, count, self.len)?;
        let src = &src[src_index..src_index + count];
        if let Some(slice) = self.as_mut_slice() {
            slice[dest_index..dest_index + count].clone_from_slice(src);
            return Ok(());
        }
        for (offset, item) in src.iter().enumerate() {
            if let Some(slot) = self.get_mut(dest_index + offset) {
                slot.clone_from(item);
            }
        }
        Ok(())
    }

    /// Appends clones of every element of `other`.
    pub fn extend_from_slice(&mut self, other: &[T])
    where
        T: Clone,
    {
        for item in other {
            self.push(item.clone());
        }
    }

    /// Clones the elements into a new `Vec`.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::with_capacity(self.len);
        for segment in self.segments() {
            out.extend_from_slice(segment);
        }
        out
    }
}
