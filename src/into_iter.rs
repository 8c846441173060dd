//! Owning iterator for `PooledVec`.

use std::mem::ManuallyDrop;

use crate::{ArrayAllocator, HeapAllocator, PooledVec};

/// An owning iterator over elements of a `PooledVec`.
///
/// This struct is created by the `into_iter` method on `PooledVec`
/// (provided by the [`IntoIterator`] trait). Each segment buffer is given back
/// to the allocator as soon as it has been drained.
pub struct IntoIter<T, A: ArrayAllocator<T> = HeapAllocator> {
    /// Remaining buffers, last to be visited first; each stored reversed.
    buffers: Vec<Vec<T>>,
    remaining: usize,
    clear_on_return: bool,
    allocator: A,
}

impl<T, A: ArrayAllocator<T>> IntoIter<T, A> {
    pub(crate) fn new(vec: PooledVec<T, A>) -> Self {
        let mut vec = ManuallyDrop::new(vec);
        let mut buffers = Vec::new();
        if let Some(mut root) = vec.root.take() {
            root.drain_buffers(&mut buffers);
        }
        vec.tail = None;
        buffers.reverse();
        for buffer in &mut buffers {
            buffer.reverse();
        }
        // SAFETY: the tree was moved out above and the remaining fields own
        // nothing; `vec` is never used or dropped after this read.
        let allocator = unsafe { std::ptr::read(&vec.allocator) };
        Self {
            buffers,
            remaining: vec.len,
            clear_on_return: vec.options.clears_on_return(),
            allocator,
        }
    }
}

impl<T, A: ArrayAllocator<T>> Iterator for IntoIter<T, A> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let buffer = self.buffers.last_mut()?;
            if let Some(item) = buffer.pop() {
                self.remaining -= 1;
                return Some(item);
            }
            if let Some(drained) = self.buffers.pop() {
                self.allocator.release(drained, self.clear_on_return);
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, A: ArrayAllocator<T>> ExactSizeIterator for IntoIter<T, A> {}

impl<T, A: ArrayAllocator<T>> std::iter::FusedIterator for IntoIter<T, A> {}

impl<T, A: ArrayAllocator<T>> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        for buffer in self.buffers.drain(..) {
            self.allocator.release(buffer, self.clear_on_return);
        }
    }
}

impl<T, A: ArrayAllocator<T>> std::fmt::Debug for IntoIter<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntoIter")
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<T, A: ArrayAllocator<T>> IntoIterator for PooledVec<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self)
    }
}
