//! Allocator strategies backing every pooled buffer.
//!
//! A buffer is a `Vec<T>` whose capacity is the rented array length and whose
//! length is the number of live elements. Renting always hands out an empty
//! buffer, so a reused allocation never exposes elements of a previous owner.
//!
//! Three strategies are provided:
//!
//! - [`HeapAllocator`]: allocate on demand, drop on release.
//! - [`SharedPool`]: retains released buffers in power-of-two size classes.
//! - [`HybridAllocator`]: heap for small buffers, a pool for large ones.

use std::cell::RefCell;
use std::rc::Rc;

/// A rent/release capability for element buffers.
///
/// `rent(len)` returns an empty buffer with `capacity() >= len`.
/// `release(buffer, must_clear)` hands a buffer back; when `must_clear` is set
/// the allocator drops any elements left in it before the buffer can be reused.
/// Otherwise leftovers may be dropped lazily, on the next rent of that buffer.
pub trait ArrayAllocator<T> {
    /// Returns an empty buffer able to hold at least `len` elements.
    fn rent(&self, len: usize) -> Vec<T>;

    /// Gives a buffer back to the allocator.
    fn release(&self, buffer: Vec<T>, must_clear: bool);
}

impl<T, P: ArrayAllocator<T> + ?Sized> ArrayAllocator<T> for &P {
    #[inline]
    fn rent(&self, len: usize) -> Vec<T> {
        (**self).rent(len)
    }

    #[inline]
    fn release(&self, buffer: Vec<T>, must_clear: bool) {
        (**self).release(buffer, must_clear)
    }
}

impl<T, P: ArrayAllocator<T> + ?Sized> ArrayAllocator<T> for Rc<P> {
    #[inline]
    fn rent(&self, len: usize) -> Vec<T> {
        (**self).rent(len)
    }

    #[inline]
    fn release(&self, buffer: Vec<T>, must_clear: bool) {
        (**self).release(buffer, must_clear)
    }
}

/// Allocates a fresh buffer for every rent and frees it on release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapAllocator;

impl<T> ArrayAllocator<T> for HeapAllocator {
    #[inline]
    fn rent(&self, len: usize) -> Vec<T> {
        Vec::with_capacity(len)
    }

    #[inline]
    fn release(&self, buffer: Vec<T>, _must_clear: bool) {
        drop(buffer);
    }
}

/// A single-threaded pool of buffers grouped in power-of-two size classes.
///
/// Class `k` holds buffers whose capacity is at least `2^k`. Each class keeps
/// at most [`SharedPool::max_per_class`] buffers; extra releases are freed.
///
/// Share one pool between several containers with `Rc<SharedPool<T>>` or
/// `&SharedPool<T>`.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use pooled_vec::{Options, PooledVec, SharedPool};
///
/// let pool = Rc::new(SharedPool::new());
/// let mut a = PooledVec::with_options_in(Options::new().max_segment_capacity(16), Rc::clone(&pool));
/// a.extend(0..100);
/// a.clear();
/// assert!(pool.retained() > 0);
///
/// let mut b = PooledVec::with_options_in(Options::new().max_segment_capacity(16), Rc::clone(&pool));
/// b.extend(0..100);
/// assert_eq!(b[99], 99);
/// ```
#[derive(Debug)]
pub struct SharedPool<T> {
    classes: RefCell<Vec<Vec<Vec<T>>>>,
    max_per_class: usize,
}

impl<T> SharedPool<T> {
    /// Default number of buffers retained per size class.
    pub const DEFAULT_MAX_PER_CLASS: usize = 50;

    /// Creates an empty pool.
    pub const fn new() -> Self {
        Self::with_max_per_class(Self::DEFAULT_MAX_PER_CLASS)
    }

    /// Creates an empty pool retaining at most `max_per_class` buffers per class.
    pub const fn with_max_per_class(max_per_class: usize) -> Self {
        Self {
            classes: RefCell::new(Vec::new()),
            max_per_class,
        }
    }

    /// Returns the per-class retention limit.
    pub fn max_per_class(&self) -> usize {
        self.max_per_class
    }

    /// Returns the number of buffers currently held by the pool.
    pub fn retained(&self) -> usize {
        self.classes.borrow().iter().map(Vec::len).sum()
    }

    /// Frees every retained buffer.
    pub fn trim(&self) {
        self.classes.borrow_mut().clear();
    }
}

impl<T> Default for SharedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ArrayAllocator<T> for SharedPool<T> {
    fn rent(&self, len: usize) -> Vec<T> {
        if len == 0 {
            return Vec::new();
        }
        let Some(rounded) = len.checked_next_power_of_two() else {
            return Vec::with_capacity(len);
        };
        let class = rounded.trailing_zeros() as usize;

        let reused = self
            .classes
            .borrow_mut()
            .get_mut(class)
            .and_then(Vec::pop);

        match reused {
            Some(mut buffer) => {
                // Lazily drop whatever a non-clearing release left behind.
                buffer.clear();
                buffer
            }
            None => Vec::with_capacity(rounded),
        }
    }

    fn release(&self, mut buffer: Vec<T>, must_clear: bool) {
        let capacity = buffer.capacity();
        if capacity == 0 {
            return;
        }
        if must_clear {
            buffer.clear();
        }
        let class = (usize::BITS - 1 - capacity.leading_zeros()) as usize;

        let mut classes = self.classes.borrow_mut();
        if classes.len() <= class {
            classes.resize_with(class + 1, Vec::new);
        }
        let slot = &mut classes[class];
        if slot.len() < self.max_per_class {
            slot.push(buffer);
        }
    }
}

/// Serves buffers up to `threshold` elements from the heap and larger
/// buffers from an owned [`SharedPool`].
#[derive(Debug)]
pub struct HybridAllocator<T> {
    threshold: usize,
    pool: SharedPool<T>,
}

impl<T> HybridAllocator<T> {
    /// Default size threshold below which buffers come from the heap.
    pub const DEFAULT_THRESHOLD: usize = 64;

    /// Creates an allocator with the default threshold.
    pub const fn new() -> Self {
        Self::with_threshold(Self::DEFAULT_THRESHOLD)
    }

    /// Creates an allocator that pools buffers larger than `threshold`.
    pub const fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            pool: SharedPool::new(),
        }
    }

    /// Returns the heap/pool size threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns the pool serving large buffers.
    pub fn pool(&self) -> &SharedPool<T> {
        &self.pool
    }
}

impl<T> Default for HybridAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ArrayAllocator<T> for HybridAllocator<T> {
    #[inline]
    fn rent(&self, len: usize) -> Vec<T> {
        if len <= self.threshold {
            Vec::with_capacity(len)
        } else {
            self.pool.rent(len)
        }
    }

    #[inline]
    fn release(&self, buffer: Vec<T>, must_clear: bool) {
        if buffer.capacity() > self.threshold {
            self.pool.release(buffer, must_clear);
        }
    }
}

/// The allocator and return policy in effect for one operation.
pub(crate) struct Lease<'a, A: ?Sized> {
    allocator: &'a A,
    clear_on_return: bool,
}

impl<A: ?Sized> Clone for Lease<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: ?Sized> Copy for Lease<'_, A> {}

impl<'a, A: ?Sized> Lease<'a, A> {
    #[inline]
    pub(crate) const fn new(allocator: &'a A, clear_on_return: bool) -> Self {
        Self {
            allocator,
            clear_on_return,
        }
    }

    #[inline]
    pub(crate) fn rent<T>(self, len: usize) -> Vec<T>
    where
        A: ArrayAllocator<T>,
    {
        self.allocator.rent(len)
    }

    #[inline]
    pub(crate) fn give_back<T>(self, buffer: Vec<T>)
    where
        A: ArrayAllocator<T>,
    {
        self.allocator.release(buffer, self.clear_on_return)
    }
}

/// Lease used for the child lists of branch nodes.
pub(crate) const NODE_LEASE: Lease<'static, HeapAllocator> = Lease::new(&HeapAllocator, false);
