//! The pooled buffer primitive: one rented buffer plus a hard size limit.

use crate::alloc::{ArrayAllocator, Lease};
use crate::error::{Error, Result};

/// A list backed by exactly one rented buffer, never larger than `max_capacity`.
///
/// Growth rents a new buffer of `min(max(capacity * 2, 2), max_capacity)`
/// elements, moves the contents over and gives the old buffer back. Once the
/// list becomes empty through removal its buffer is given back immediately.
pub(crate) struct PoolList<T> {
    items: Vec<T>,
    max_capacity: usize,
}

impl<T> PoolList<T> {
    /// Creates a list without a buffer.
    #[cfg(test)]
    pub(crate) const fn new(max_capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            max_capacity,
        }
    }

    /// Creates a list with a buffer of `min(capacity, max_capacity)` elements.
    pub(crate) fn with_capacity<A>(capacity: usize, max_capacity: usize, lease: Lease<'_, A>) -> Self
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let capacity = capacity.min(max_capacity);
        let items = if capacity == 0 {
            Vec::new()
        } else {
            lease.rent(capacity)
        };
        Self {
            items,
            max_capacity,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.items.capacity()
    }

    #[inline]
    pub(crate) fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Returns `true` when no further element may be added.
    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.items.len() >= self.max_capacity
    }

    /// Returns `true` when an element fits without renting a new buffer.
    #[inline]
    pub(crate) fn has_spare(&self) -> bool {
        let len = self.items.len();
        len < self.items.capacity() && len < self.max_capacity
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    #[inline]
    pub(crate) fn last_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    /// Appends into spare room. Callers check [`PoolList::has_spare`] first.
    #[inline]
    pub(crate) fn push_within_capacity(&mut self, item: T) {
        debug_assert!(self.has_spare());
        self.items.push(item);
    }

    /// Appends an element, growing the buffer geometrically when it is full.
    pub(crate) fn add<A>(&mut self, item: T, lease: Lease<'_, A>) -> Result<()>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        self.make_room(lease)?;
        self.items.push(item);
        Ok(())
    }

    /// Inserts an element at `index`, shifting the tail right.
    pub(crate) fn insert<A>(&mut self, index: usize, item: T, lease: Lease<'_, A>) -> Result<()>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        self.make_room(lease)?;
        self.items.insert(index, item);
        Ok(())
    }

    /// Removes the element at `index`, shifting the tail left.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub(crate) fn remove_at<A>(&mut self, index: usize, lease: Lease<'_, A>) -> T
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let item = self.items.remove(index);
        self.give_back_if_empty(lease);
        item
    }

    /// Removes the last element.
    pub(crate) fn pop<A>(&mut self, lease: Lease<'_, A>) -> Option<T>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let item = self.items.pop()?;
        self.give_back_if_empty(lease);
        Some(item)
    }

    /// Removes the last element without ever giving the buffer back.
    #[inline]
    pub(crate) fn pop_keep(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Compacts the list in place, dropping every element matching `pred`.
    /// Returns the number of removed elements.
    pub(crate) fn remove_matching<A, F>(&mut self, mut pred: F, lease: Lease<'_, A>) -> usize
    where
        A: ArrayAllocator<T> + ?Sized,
        F: FnMut(&T) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|item| !pred(item));
        let removed = before - self.items.len();
        if removed > 0 {
            self.give_back_if_empty(lease);
        }
        removed
    }

    /// Drops elements past `len`.
    pub(crate) fn truncate<A>(&mut self, len: usize, lease: Lease<'_, A>)
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        self.items.truncate(len);
        self.give_back_if_empty(lease);
    }

    /// Appends `count` clones of `value`, renting a larger buffer once if needed.
    pub(crate) fn fill<A>(&mut self, count: usize, value: &T, lease: Lease<'_, A>) -> Result<()>
    where
        A: ArrayAllocator<T> + ?Sized,
        T: Clone,
    {
        let target = self.items.len() + count;
        if target > self.max_capacity {
            return Err(Error::CapacityExceeded {
                max_capacity: self.max_capacity,
            });
        }
        if target > self.items.capacity() {
            self.regrow(target, lease);
        }
        self.items.resize(target, value.clone());
        Ok(())
    }

    /// Gives the buffer back, dropping its elements per the lease policy.
    pub(crate) fn clear<A>(&mut self, lease: Lease<'_, A>)
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let items = std::mem::take(&mut self.items);
        if items.capacity() > 0 {
            lease.give_back(items);
        }
    }

    /// Takes the buffer out, leaving the list without one.
    #[inline]
    pub(crate) fn take_buffer(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    fn make_room<A>(&mut self, lease: Lease<'_, A>) -> Result<()>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let len = self.items.len();
        if len >= self.max_capacity {
            return Err(Error::CapacityExceeded {
                max_capacity: self.max_capacity,
            });
        }
        if len == self.items.capacity() {
            let grown = self.items.capacity().saturating_mul(2).max(2).min(self.max_capacity);
            self.regrow(grown, lease);
        }
        Ok(())
    }

    #[cold]
    #[inline(never)]
    fn regrow<A>(&mut self, capacity: usize, lease: Lease<'_, A>)
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let mut grown = lease.rent(capacity);
        grown.append(&mut self.items);
        let old = std::mem::replace(&mut self.items, grown);
        if old.capacity() > 0 {
            lease.give_back(old);
        }
    }

    fn give_back_if_empty<A>(&mut self, lease: Lease<'_, A>)
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        if self.items.is_empty() && self.items.capacity() > 0 {
            lease.give_back(std::mem::take(&mut self.items));
        }
    }
}

impl<T> std::ops::Index<usize> for PoolList<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> std::ops::IndexMut<usize> for PoolList<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}
