//! Stack and queue adapters.
//!
//! The vector itself serves as a stack: [`PooledVec::push`] and
//! [`PooledVec::pop`] work on the tail segment through the cached pointer.
//! [`StackView`] and [`QueueView`] are read-only views over the same storage,
//! and [`Queue`] is an owning FIFO built on a vector of slots.

use crate::error::{Error, Result};
use crate::{ArrayAllocator, HeapAllocator, Iter, Options, PooledVec};

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Returns the top of the stack, the last element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if the vector is empty.
    #[inline]
    pub fn peek(&self) -> Result<&T> {
        self.last().ok_or(Error::Empty)
    }

    /// Removes and returns the top of the stack.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if the vector is empty.
    pub fn remove_last(&mut self) -> Result<T> {
        self.pop().ok_or(Error::Empty)
    }

    /// Views the vector as a stack whose top is the last element.
    pub fn as_stack(&self) -> StackView<'_, T, A> {
        StackView { vec: self }
    }

    /// Views the vector as a queue whose front is the first element.
    pub fn as_queue(&self) -> QueueView<'_, T, A> {
        QueueView { vec: self }
    }
}

/// A read-only stack view over a [`PooledVec`].
///
/// # Example
///
/// ```
/// use pooled_vec::PooledVec;
///
/// let vec: PooledVec<i32> = (1..=3).collect();
/// let stack = vec.as_stack();
/// assert_eq!(stack.peek(), Ok(&3));
/// assert_eq!(stack.iter().copied().collect::<Vec<_>>(), [3, 2, 1]);
/// ```
pub struct StackView<'a, T, A: ArrayAllocator<T> = HeapAllocator> {
    vec: &'a PooledVec<T, A>,
}

impl<'a, T, A: ArrayAllocator<T>> StackView<'a, T, A> {
    #[inline]
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Returns the element `pop` would return next.
    pub fn peek(&self) -> Result<&'a T> {
        self.vec.last().ok_or(Error::Empty)
    }

    /// Iterates in pop order, top first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a T> + ExactSizeIterator + 'a {
        let vec = self.vec;
        (0..vec.len()).rev().map(move |index| &vec[index])
    }
}

impl<T, A: ArrayAllocator<T>> Clone for StackView<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: ArrayAllocator<T>> Copy for StackView<'_, T, A> {}

/// A read-only queue view over a [`PooledVec`].
pub struct QueueView<'a, T, A: ArrayAllocator<T> = HeapAllocator> {
    vec: &'a PooledVec<T, A>,
}

impl<'a, T, A: ArrayAllocator<T>> QueueView<'a, T, A> {
    #[inline]
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Returns the element a dequeue would return next.
    pub fn peek(&self) -> Result<&'a T> {
        self.vec.first().ok_or(Error::Empty)
    }

    /// Iterates in dequeue order, front first.
    pub fn iter(&self) -> Iter<'a, T> {
        self.vec.iter()
    }
}

impl<T, A: ArrayAllocator<T>> Clone for QueueView<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: ArrayAllocator<T>> Copy for QueueView<'_, T, A> {}

/// A first-in first-out queue stored in a [`PooledVec`].
///
/// Dequeuing advances a start offset instead of shifting the storage; the
/// storage is cleared, and its buffers given back, once the queue drains.
///
/// # Example
///
/// ```
/// use pooled_vec::{Error, Queue};
///
/// let mut queue = Queue::new();
/// queue.enqueue("a");
/// queue.enqueue("b");
/// assert_eq!(queue.dequeue(), Ok("a"));
/// assert_eq!(queue.peek(), Ok(&"b"));
/// assert_eq!(queue.dequeue(), Ok("b"));
/// assert_eq!(queue.dequeue(), Err(Error::Empty));
/// ```
pub struct Queue<T, A: ArrayAllocator<Option<T>> = HeapAllocator> {
    slots: PooledVec<Option<T>, A>,
    head: usize,
}

impl<T> Queue<T> {
    pub const fn new() -> Self {
        Self::new_in(HeapAllocator)
    }

    pub const fn with_options(options: Options) -> Self {
        Self::with_options_in(options, HeapAllocator)
    }
}

impl<T, A: ArrayAllocator<Option<T>>> Queue<T, A> {
    pub const fn new_in(allocator: A) -> Self {
        Self::with_options_in(Options::new(), allocator)
    }

    pub const fn with_options_in(options: Options, allocator: A) -> Self {
        Self {
            slots: PooledVec::with_options_in(options, allocator),
            head: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds an element at the back.
    pub fn enqueue(&mut self, item: T) {
        self.slots.push(Some(item));
    }

    /// Removes the element at the front.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if the queue is empty.
    pub fn dequeue(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::Empty);
        }
        let item = self.slots.get_mut(self.head).and_then(Option::take);
        self.head += 1;
        if self.is_empty() {
            self.clear();
        }
        item.ok_or(Error::Empty)
    }

    /// Returns the element at the front.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if the queue is empty.
    pub fn peek(&self) -> Result<&T> {
        self.slots
            .get(self.head)
            .and_then(Option::as_ref)
            .ok_or(Error::Empty)
    }

    /// Removes every element and gives the storage back.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    /// Iterates front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().skip(self.head).filter_map(Option::as_ref)
    }
}

impl<T, A: ArrayAllocator<Option<T>>> Extend<T> for Queue<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.enqueue(item);
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug, A: ArrayAllocator<Option<T>>> std::fmt::Debug for Queue<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(n: i32) -> PooledVec<i32> {
        let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
        vec.extend(0..n);
        vec
    }

    #[test]
    fn test_stack_api() {
        let mut vec = small(20);
        assert_eq!(vec.peek(), Ok(&19));
        assert_eq!(vec.remove_last(), Ok(19));
        assert_eq!(vec.peek(), Ok(&18));
        vec.clear();
        assert_eq!(vec.peek(), Err(Error::Empty));
        assert_eq!(vec.remove_last(), Err(Error::Empty));
    }

    #[test]
    fn test_stack_view_pop_order() {
        let vec = small(40);
        let stack = vec.as_stack();
        assert_eq!(stack.len(), 40);
        assert_eq!(stack.peek(), Ok(&39));
        assert!(stack.iter().copied().eq((0..40).rev()));
        assert_eq!(stack.iter().len(), 40);
    }

    #[test]
    fn test_queue_view_front() {
        let vec = small(3);
        let queue = vec.as_queue();
        assert_eq!(queue.peek(), Ok(&0));
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), [0, 1, 2]);

        let empty = small(0);
        assert_eq!(empty.as_queue().peek(), Err(Error::Empty));
        assert!(empty.as_stack().is_empty());
    }

    #[test]
    fn test_queue_fifo_across_segments() {
        let mut queue = Queue::with_options(Options::new().max_segment_capacity(16));
        queue.extend(0..50);
        for expected in 0..30 {
            assert_eq!(queue.dequeue(), Ok(expected));
        }
        assert_eq!(queue.len(), 20);
        queue.enqueue(50);
        assert!(queue.iter().copied().eq(30..51));
        assert_eq!(queue.peek(), Ok(&30));
    }

    #[test]
    fn test_queue_resets_when_drained() {
        let mut queue = Queue::new();
        queue.extend([1, 2]);
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Ok(2));
        assert!(queue.is_empty());
        assert_eq!(queue.slots.len(), 0);
        assert_eq!(queue.head, 0);
        assert_eq!(queue.peek(), Err(Error::Empty));
        queue.enqueue(3);
        assert_eq!(format!("{queue:?}"), "[3]");
    }
}
