//! Borrowing iterators and the detached cursor for `PooledVec`.

use crate::error::{Error, Result};
use crate::node::Node;
use crate::{ArrayAllocator, PooledVec};

/// An iterator over the segments of a `PooledVec`, in logical order.
///
/// Each item is the slice of live elements of one segment. Every slice but
/// the last is exactly [`PooledVec::max_segment_capacity`] long.
pub struct Segments<'a, T> {
    stack: Vec<std::slice::Iter<'a, Node<T>>>,
}

impl<'a, T> Segments<'a, T> {
    pub(crate) fn new(root: Option<&'a Node<T>>) -> Self {
        let stack = root
            .map(|root| vec![std::slice::from_ref(root).iter()])
            .unwrap_or_default();
        Self { stack }
    }
}

impl<'a, T> Iterator for Segments<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                None => {
                    self.stack.pop();
                }
                Some(node) => match node.as_segment() {
                    Some(items) => return Some(items.as_slice()),
                    None => self.stack.push(node.children().iter()),
                },
            }
        }
    }
}

impl<T> std::iter::FusedIterator for Segments<'_, T> {}

/// An iterator over references to elements of a `PooledVec`.
pub struct Iter<'a, T> {
    segments: Segments<'a, T>,
    current: std::slice::Iter<'a, T>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.current.next() {
            self.remaining -= 1;
            return Some(item);
        }
        self.next_segment()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> Iter<'a, T> {
    #[cold]
    fn next_segment(&mut self) -> Option<&'a T> {
        loop {
            self.current = self.segments.next()?.iter();
            if let Some(item) = self.current.next() {
                self.remaining -= 1;
                return Some(item);
            }
        }
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> std::iter::FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            segments: Segments {
                stack: self.segments.stack.clone(),
            },
            current: self.current.clone(),
            remaining: self.remaining,
        }
    }
}

/// A detached enumeration position that revalidates the vector on every step.
///
/// Unlike [`Iter`], a cursor does not borrow the vector between steps, so the
/// vector may be mutated in the meantime. The next step then fails with
/// [`Error::Modified`], and every later step fails the same way.
///
/// # Example
///
/// ```
/// use pooled_vec::{Error, PooledVec};
///
/// let mut vec: PooledVec<i32> = (0..3).collect();
/// let mut cursor = vec.cursor();
/// assert_eq!(cursor.advance(&vec), Ok(Some(&0)));
/// vec.push(3);
/// assert_eq!(cursor.advance(&vec), Err(Error::Modified));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    version: u16,
    index: usize,
}

impl Cursor {
    /// Returns the next element, `Ok(None)` at the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Modified`] if `vec` changed structurally since the
    /// cursor was created.
    pub fn advance<'a, T, A: ArrayAllocator<T>>(
        &mut self,
        vec: &'a PooledVec<T, A>,
    ) -> Result<Option<&'a T>> {
        if vec.version() != self.version {
            return Err(Error::Modified);
        }
        let item = vec.get(self.index);
        if item.is_some() {
            self.index += 1;
        }
        Ok(item)
    }

    /// Number of elements yielded so far.
    pub fn position(&self) -> usize {
        self.index
    }
}

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Returns an iterator over the elements.
    ///
    /// A vector held in one segment is walked as a plain slice.
    pub fn iter(&self) -> Iter<'_, T> {
        let (segments, current) = match self.as_slice() {
            Some(slice) => (Segments::new(None), slice.iter()),
            None => (Segments::new(self.root.as_ref()), Default::default()),
        };
        Iter {
            segments,
            current,
            remaining: self.len,
        }
    }

    /// Returns an iterator over the segment slices in logical order.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::{Options, PooledVec};
    ///
    /// let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
    /// vec.extend(0..40);
    /// let sizes: Vec<usize> = vec.segments().map(<[i32]>::len).collect();
    /// assert_eq!(sizes, [16, 16, 8]);
    /// ```
    pub fn segments(&self) -> Segments<'_, T> {
        Segments::new(self.root.as_ref())
    }

    /// Starts a detached enumeration at the first element.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            version: self.version,
            index: 0,
        }
    }
}

impl<'a, T, A: ArrayAllocator<T>> IntoIterator for &'a PooledVec<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
