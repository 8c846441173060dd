//! A random-access vector stored as a tree of fixed-capacity pooled segments.
//!
//! Elements live in segments of at most [`Options::segment_capacity`] elements.
//! Segments are leaves of a tree whose branches hold up to 65536 children, so
//! indexing is a handful of shifts even for very large collections. Every
//! segment buffer is rented from an [`ArrayAllocator`] and given back once the
//! segment empties or the vector is cleared.
//!
//! A vector that fits in one segment behaves exactly like a flat array.
//! Larger vectors keep every segment but the last one full: insertion carries
//! elements forward across segment boundaries and removal borrows them back.
//!
//! # Example
//!
//! ```
//! use pooled_vec::{Options, PooledVec};
//!
//! let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
//! for i in 0..100 {
//!     vec.push(i);
//! }
//! assert_eq!(vec.len(), 100);
//! assert_eq!(vec[42], 42);
//! assert!(vec.depth() > 1);
//!
//! vec.insert(0, -1).unwrap();
//! assert_eq!(vec[0], -1);
//! assert_eq!(vec.remove_at(0), Ok(-1));
//! ```

/// The allocation lease in effect for a `PooledVec`.
macro_rules! lease {
    ($vec:expr) => {
        $crate::alloc::Lease::new(&$vec.allocator, $vec.options.clears_on_return())
    };
}

mod alloc;
mod array;
mod error;
mod into_iter;
mod iter;
mod node;
mod options;
mod pool_list;
mod remove;
mod search;
mod serialization;
mod sort;
mod stack;

pub use alloc::{ArrayAllocator, HeapAllocator, HybridAllocator, SharedPool};
pub use error::{Error, Result};
pub use into_iter::IntoIter;
pub use iter::{Cursor, Iter, Segments};
pub use options::Options;
pub use serialization::{
    MemoryStore, Metadata, PostcardSink, PostcardSource, SerializationSink, SerializationSource,
    SerializeError,
};
pub use stack::{Queue, QueueView, StackView};

use node::{Node, Segment};
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

/// Buffer size of the first segment when no capacity hint was given.
const DEFAULT_FIRST_CAPACITY: usize = 2;

/// A growable vector built from pooled, fixed-capacity segments.
///
/// `PooledVec` keeps a cached pointer to the tail segment, so `push` writes
/// straight into the last buffer without descending the tree. Every
/// structural mutation bumps a 16-bit wrapping version, which detached
/// [`Cursor`]s use to detect modification during enumeration.
///
/// # Disposal
///
/// [`PooledVec::dispose`] gives every buffer back and poisons the vector.
/// Any mutating call after that panics; `clear` and `dispose` stay no-ops.
pub struct PooledVec<T, A: ArrayAllocator<T> = HeapAllocator> {
    root: Option<Node<T>>,
    len: usize,
    version: u16,
    /// The segment holding the last element, `None` when empty.
    tail: Option<NonNull<Segment<T>>>,
    options: Options,
    first_capacity: usize,
    disposed: bool,
    allocator: A,
}

// SAFETY: `tail` only ever points into the segments owned by `root`.
unsafe impl<T: Send, A: ArrayAllocator<T> + Send> Send for PooledVec<T, A> {}
// SAFETY: shared access never writes through `tail`.
unsafe impl<T: Sync, A: ArrayAllocator<T> + Sync> Sync for PooledVec<T, A> {}

impl<T> PooledVec<T> {
    /// Creates an empty vector with default options on the heap allocator.
    ///
    /// Does not allocate until elements are pushed.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::PooledVec;
    /// let vec: PooledVec<i32> = PooledVec::new();
    /// assert!(vec.is_empty());
    /// ```
    #[inline]
    pub const fn new() -> Self {
        Self::with_options_in(Options::new(), HeapAllocator)
    }

    /// Creates an empty vector whose first segment is sized for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Options::new(), HeapAllocator)
    }

    /// Creates an empty vector with the given options.
    pub const fn with_options(options: Options) -> Self {
        Self::with_options_in(options, HeapAllocator)
    }
}

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Creates an empty vector with default options on `allocator`.
    #[inline]
    pub const fn new_in(allocator: A) -> Self {
        Self::with_options_in(Options::new(), allocator)
    }

    /// Creates an empty vector with `options` on `allocator`.
    pub const fn with_options_in(options: Options, allocator: A) -> Self {
        Self {
            root: None,
            len: 0,
            version: 0,
            tail: None,
            options,
            first_capacity: DEFAULT_FIRST_CAPACITY,
            disposed: false,
            allocator,
        }
    }

    /// Creates an empty vector whose first segment is sized for `capacity`
    /// elements, capped at the segment capacity.
    pub fn with_capacity_in(capacity: usize, options: Options, allocator: A) -> Self {
        let mut vec = Self::with_options_in(options, allocator);
        vec.first_capacity = capacity.clamp(DEFAULT_FIRST_CAPACITY, options.segment_capacity());
        vec
    }

    /// Returns the number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector holds no elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the structural version. Wraps around at `u16::MAX`.
    #[inline]
    pub const fn version(&self) -> u16 {
        self.version
    }

    #[inline]
    pub const fn options(&self) -> Options {
        self.options
    }

    /// Returns the maximum number of elements per segment.
    #[inline]
    pub const fn max_segment_capacity(&self) -> usize {
        self.options.segment_capacity()
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Returns `true` once [`PooledVec::dispose`] has run.
    #[inline]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Number of tree levels: 0 when empty, 1 for a single segment.
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.level() as usize + 1)
    }

    /// Number of segments currently holding elements.
    pub fn segment_count(&self) -> usize {
        self.root.as_ref().map_or(0, Node::segment_count)
    }

    /// Returns the backing slice when every element lives in one segment.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::{Options, PooledVec};
    ///
    /// let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
    /// vec.extend(0..16);
    /// assert_eq!(vec.as_slice().map(<[i32]>::len), Some(16));
    /// vec.push(16);
    /// assert!(vec.as_slice().is_none());
    /// ```
    pub fn as_slice(&self) -> Option<&[T]> {
        match &self.root {
            None => Some(&[]),
            Some(Node::Segment(segment)) => Some(segment.items().as_slice()),
            Some(Node::Branch(_)) => None,
        }
    }

    /// Mutable counterpart of [`PooledVec::as_slice`].
    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        match &mut self.root {
            None => Some(&mut []),
            Some(Node::Segment(segment)) => Some(segment.items_mut().as_mut_slice()),
            Some(Node::Branch(_)) => None,
        }
    }

    /// Appends an element.
    ///
    /// # Panics
    ///
    /// Panics if the vector has been disposed.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.assert_live();
        if let Some(mut tail) = self.tail {
            // SAFETY: `tail` points at the last segment of `root` and is
            // refreshed after every structural change; `&mut self` rules out
            // any other borrow of the tree.
            let items = unsafe { tail.as_mut() }.items_mut();
            if items.has_spare() {
                items.push_within_capacity(value);
                self.len += 1;
                self.bump_version();
                return;
            }
            if !items.is_full() {
                node::checked(items.add(value, lease!(self)));
                self.len += 1;
                self.bump_version();
                return;
            }
        }
        self.push_slow(value);
    }

    #[cold]
    #[inline(never)]
    fn push_slow(&mut self, value: T) {
        self.append_to_root(value);
        self.len += 1;
        self.bump_version();
        self.refresh_tail();
    }

    /// Appends through the tree, creating the root or a new level as needed.
    /// Leaves `len`, `version` and `tail` to the caller.
    fn append_to_root(&mut self, value: T) {
        let lease = lease!(self);
        match self.root.as_mut() {
            None => {
                let max = self.options.segment_capacity();
                self.root = Some(Node::first_segment(value, self.first_capacity, max, lease));
            }
            Some(root) => {
                if let Some(sibling) = root.add(value, lease) {
                    self.grow_root(sibling);
                }
            }
        }
    }

    /// Makes the current root and `sibling` the children of a new root.
    fn grow_root(&mut self, sibling: Node<T>) {
        let Some(root) = self.root.take() else {
            self.root = Some(sibling);
            return;
        };
        let leaf_shift = self.options.segment_capacity().trailing_zeros();
        let root = root.wrap(sibling, leaf_shift);
        tracing::debug!(depth = root.level() + 1, len = self.len, "pooled vec grew a level");
        self.root = Some(root);
    }

    /// Removes the last element and returns it, or `None` if empty.
    pub fn pop(&mut self) -> Option<T> {
        self.assert_live();
        if self.len == 0 {
            return None;
        }
        if let Some(mut tail) = self.tail {
            // SAFETY: see `push`.
            let items = unsafe { tail.as_mut() }.items_mut();
            if items.len() > 1 {
                let item = items.pop_keep();
                self.len -= 1;
                self.bump_version();
                return item;
            }
        }
        self.pop_slow()
    }

    #[cold]
    #[inline(never)]
    fn pop_slow(&mut self) -> Option<T> {
        let lease = lease!(self);
        let item = self.root.as_mut()?.remove_last(lease)?;
        self.len -= 1;
        self.bump_version();
        self.settle();
        Some(item)
    }

    /// Inserts an element at `index`, shifting later elements right.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index > len`.
    ///
    /// # Panics
    ///
    /// Panics if the vector has been disposed.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.assert_live();
        if index > self.len {
            return Err(Error::index_out_of_range(index, self.len));
        }
        if index == self.len {
            self.push(value);
            return Ok(());
        }

        let lease = lease!(self);
        if let Some(Node::Segment(segment)) = self.root.as_mut() {
            let items = segment.items_mut();
            if !items.is_full() {
                node::checked(items.insert(index, value, lease));
                self.len += 1;
                self.bump_version();
                return Ok(());
            }
        }
        self.insert_slow(index, value);
        Ok(())
    }

    #[cold]
    #[inline(never)]
    fn insert_slow(&mut self, index: usize, value: T) {
        let lease = lease!(self);
        if let Some(root) = self.root.as_mut() {
            if let Some(carry) = root.try_insert_and_push(index, value, lease) {
                if let Some(sibling) = root.add(carry, lease) {
                    self.grow_root(sibling);
                }
            }
        }
        self.len += 1;
        self.bump_version();
        self.refresh_tail();
    }

    /// Removes and returns the element at `index`, shifting later elements left.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len`.
    ///
    /// # Panics
    ///
    /// Panics if the vector has been disposed.
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        self.assert_live();
        if index >= self.len {
            return Err(Error::index_out_of_range(index, self.len));
        }
        let lease = lease!(self);
        let removed = match self.root.as_mut() {
            Some(Node::Segment(segment)) => segment.items_mut().remove_at(index, lease),
            Some(root) => root.remove_at_and_pop(index, None, lease),
            None => return Err(Error::index_out_of_range(index, self.len)),
        };
        self.len -= 1;
        self.bump_version();
        self.settle();
        Ok(removed)
    }

    /// Returns a reference to the element at `index`, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.root.as_ref()?.get(index)
    }

    /// Returns a mutable reference to the element at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        self.root.as_mut()?.get_mut(index)
    }

    /// Returns a clone of the element at `index`, or `default` if out of bounds.
    pub fn get_or(&self, index: usize, default: T) -> T
    where
        T: Clone,
    {
        self.get(index).cloned().unwrap_or(default)
    }

    /// Replaces the element at `index`, returning the previous value.
    ///
    /// Does not change the version: the structure is untouched.
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        self.assert_live();
        let len = self.len;
        let slot = self
            .get_mut(index)
            .ok_or_else(|| Error::index_out_of_range(index, len))?;
        Ok(std::mem::replace(slot, value))
    }

    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    #[inline]
    pub fn first_mut(&mut self) -> Option<&mut T> {
        self.get_mut(0)
    }

    /// Returns the last element without descending the tree.
    #[inline]
    pub fn last(&self) -> Option<&T> {
        let tail = self.tail?;
        // SAFETY: `tail` is valid while `root` is; `&self` rules out writers.
        unsafe { tail.as_ref() }.items().as_slice().last()
    }

    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut T> {
        let mut tail = self.tail?;
        // SAFETY: see `push`.
        unsafe { tail.as_mut() }.items_mut().last_mut()
    }

    /// Swaps two elements.
    ///
    /// # Panics
    ///
    /// Panics if `a` or `b` is out of bounds.
    pub fn swap(&mut self, a: usize, b: usize) {
        let len = self.len;
        assert!(
            a < len && b < len,
            "swap indices ({a}, {b}) out of bounds for length {len}"
        );
        if a == b {
            return;
        }
        if let Some(root) = self.root.as_mut() {
            root.swap(a, b);
        }
    }

    /// Removes every element and gives every buffer back to the allocator.
    ///
    /// The vector stays usable. Clearing an empty vector does nothing.
    pub fn clear(&mut self) {
        if self.len == 0 && self.root.is_none() {
            return;
        }
        if let Some(mut root) = self.root.take() {
            root.release(lease!(self));
        }
        self.tail = None;
        self.len = 0;
        self.bump_version();
    }

    /// Clears the vector and marks it unusable.
    ///
    /// Idempotent. After disposal the version reads `u16::MAX` and every
    /// mutating call panics.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear();
        self.version = u16::MAX;
        self.disposed = true;
        tracing::trace!("pooled vec disposed");
    }

    #[inline]
    #[track_caller]
    fn assert_live(&self) {
        assert!(!self.disposed, "PooledVec used after dispose");
    }

    #[inline]
    fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    #[inline]
    fn refresh_tail(&mut self) {
        self.tail = self.root.as_mut().and_then(Node::last_segment);
    }

    /// Restores the empty state or the tail cache after a removal.
    fn settle(&mut self) {
        if self.len > 0 {
            self.refresh_tail();
            return;
        }
        if let Some(mut root) = self.root.take() {
            root.release(lease!(self));
        }
        self.tail = None;
        tracing::trace!("pooled vec collapsed to empty");
    }

    /// Moves every element out in order, giving the buffers back as they empty.
    /// Leaves the vector empty without touching the version.
    pub(crate) fn take_all(&mut self) -> Vec<T> {
        let mut buffers = Vec::new();
        if let Some(mut root) = self.root.take() {
            root.drain_buffers(&mut buffers);
        }
        self.tail = None;

        let mut all = Vec::with_capacity(self.len);
        self.len = 0;
        for mut buffer in buffers {
            all.append(&mut buffer);
            if buffer.capacity() > 0 {
                lease!(self).give_back(buffer);
            }
        }
        all
    }
}

impl<T, A: ArrayAllocator<T>> Drop for PooledVec<T, A> {
    fn drop(&mut self) {
        if !self.disposed && self.len > 0 {
            tracing::trace!(
                len = self.len,
                segments = self.segment_count(),
                "dropping pooled vec that was never disposed"
            );
        }
        self.clear();
    }
}

impl<T: Clone, A: ArrayAllocator<T> + Clone> Clone for PooledVec<T, A> {
    fn clone(&self) -> Self {
        let mut cloned = Self::with_options_in(self.options, self.allocator.clone());
        cloned.first_capacity = self.first_capacity;
        cloned.extend(self.iter().cloned());
        cloned
    }
}

impl<T: PartialEq, A: ArrayAllocator<T>, B: ArrayAllocator<T>> PartialEq<PooledVec<T, B>>
    for PooledVec<T, A>
{
    fn eq(&self, other: &PooledVec<T, B>) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq, A: ArrayAllocator<T>> Eq for PooledVec<T, A> {}

impl<T: PartialEq, A: ArrayAllocator<T>> PartialEq<[T]> for PooledVec<T, A> {
    fn eq(&self, other: &[T]) -> bool {
        self.len == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: PartialEq, A: ArrayAllocator<T>> PartialEq<Vec<T>> for PooledVec<T, A> {
    fn eq(&self, other: &Vec<T>) -> bool {
        *self == **other
    }
}

impl<T: std::fmt::Debug, A: ArrayAllocator<T>> std::fmt::Debug for PooledVec<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, A: ArrayAllocator<T> + Default> Default for PooledVec<T, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T, A: ArrayAllocator<T>> Index<usize> for PooledVec<T, A> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!(
                "index out of bounds: the len is {} but the index is {}",
                self.len, index
            ),
        }
    }
}

impl<T, A: ArrayAllocator<T>> IndexMut<usize> for PooledVec<T, A> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        let len = self.len;
        match self.get_mut(index) {
            Some(item) => item,
            None => panic!("index out of bounds: the len is {len} but the index is {index}"),
        }
    }
}

impl<T, A: ArrayAllocator<T>> Extend<T> for PooledVec<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<'a, T: Copy + 'a, A: ArrayAllocator<T>> Extend<&'a T> for PooledVec<T, A> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        for item in iter {
            self.push(*item);
        }
    }
}

impl<T> FromIterator<T> for PooledVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vec = PooledVec::new();
        vec.extend(iter);
        vec
    }
}
