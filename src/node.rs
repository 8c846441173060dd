//! Tree nodes: leaf segments holding elements, branches holding children.
//!
//! Every child of a branch except the last is full relative to its own
//! capacity. That keeps index decomposition a pair of shifts:
//! `child = index >> step_base`, `offset = index - (child << step_base)`.
//! Insertion carries the last element of a full segment into the next one,
//! removal borrows the first element of the next segment to refill the
//! previous one, so only the tail segment is ever under-full.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::alloc::{ArrayAllocator, Lease, NODE_LEASE};
use crate::error::{Error, Result};
use crate::pool_list::PoolList;

/// Maximum number of children of a branch.
pub(crate) const BRANCH_CAPACITY: usize = 1 << BRANCH_SHIFT;
const BRANCH_SHIFT: u32 = 16;
const INITIAL_CHILDREN: usize = 16;

/// Initial buffer size of a segment created by overflow.
pub(crate) const OVERFLOW_SEGMENT_CAPACITY: usize = 16;

#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn invariant_breach(err: Error) -> ! {
    panic!("pooled buffer invariant violated: {err}")
}

#[inline]
#[track_caller]
pub(crate) fn checked(result: Result<()>) {
    if let Err(err) = result {
        invariant_breach(err)
    }
}

/// A leaf holding one pooled buffer.
pub(crate) struct Segment<T> {
    items: PoolList<T>,
}

impl<T> Segment<T> {
    #[inline]
    pub(crate) fn items(&self) -> &PoolList<T> {
        &self.items
    }

    #[inline]
    pub(crate) fn items_mut(&mut self) -> &mut PoolList<T> {
        &mut self.items
    }

    fn add<A>(&mut self, item: T, lease: Lease<'_, A>) -> Option<Node<T>>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        if self.items.is_full() {
            let max = self.items.max_capacity();
            let mut next = PoolList::with_capacity(OVERFLOW_SEGMENT_CAPACITY, max, lease);
            checked(next.add(item, lease));
            return Some(Node::segment(next));
        }
        checked(self.items.add(item, lease));
        None
    }

    fn ensure<A>(&mut self, extra: &mut usize, value: &T, lease: Lease<'_, A>) -> Option<Node<T>>
    where
        A: ArrayAllocator<T> + ?Sized,
        T: Clone,
    {
        let max = self.items.max_capacity();
        let room = max - self.items.len();
        if room > 0 {
            let count = (*extra).min(room);
            checked(self.items.fill(count, value, lease));
            *extra -= count;
            return None;
        }
        if *extra == 0 {
            return None;
        }

        let count = (*extra).min(max);
        let mut next = PoolList::with_capacity(count, max, lease);
        checked(next.fill(count, value, lease));
        *extra -= count;
        Some(Node::segment(next))
    }

    fn try_insert_and_push<A>(&mut self, index: usize, item: T, lease: Lease<'_, A>) -> Option<T>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        if !self.items.is_full() {
            checked(self.items.insert(index, item, lease));
            return None;
        }
        if index >= self.items.len() {
            return Some(item);
        }
        let carry = self.items.pop_keep();
        checked(self.items.insert(index, item, lease));
        carry
    }

    fn remove_at_and_pop<A>(&mut self, index: usize, incoming: Option<T>, lease: Lease<'_, A>) -> T
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let removed = self.items.remove_at(index, lease);
        if let Some(item) = incoming {
            checked(self.items.add(item, lease));
        }
        removed
    }
}

/// Owning handle to a heap-allocated [`Segment`].
///
/// The segment never moves while the handle lives, so the container can keep
/// a raw pointer to the tail segment across restructuring of the branches.
pub(crate) struct SegmentHandle<T> {
    ptr: NonNull<Segment<T>>,
    _owns: PhantomData<Box<Segment<T>>>,
}

impl<T> SegmentHandle<T> {
    fn new(segment: Segment<T>) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(segment))),
            _owns: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> NonNull<Segment<T>> {
        self.ptr
    }
}

impl<T> Deref for SegmentHandle<T> {
    type Target = Segment<T>;

    #[inline]
    fn deref(&self) -> &Segment<T> {
        // SAFETY: the handle owns the allocation for its whole lifetime.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for SegmentHandle<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Segment<T> {
        // SAFETY: the handle owns the allocation and `&mut self` is unique.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for SegmentHandle<T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `Box::leak` and is freed only here.
        unsafe { drop(Box::from_raw(self.ptr.as_ptr())) }
    }
}

/// An internal node: an ordered list of same-level children.
pub(crate) struct Branch<T> {
    level: u32,
    leaf_shift: u32,
    step_base: u32,
    children: PoolList<Node<T>>,
}

impl<T> Branch<T> {
    pub(crate) fn new(level: u32, leaf_shift: u32, first: Node<T>, second: Option<Node<T>>) -> Self {
        debug_assert!(level >= 1);
        let mut children = PoolList::with_capacity(INITIAL_CHILDREN, BRANCH_CAPACITY, NODE_LEASE);
        checked(children.add(first, NODE_LEASE));
        if let Some(second) = second {
            checked(children.add(second, NODE_LEASE));
        }
        Self {
            level,
            leaf_shift,
            step_base: leaf_shift + BRANCH_SHIFT * (level - 1),
            children,
        }
    }

    #[inline]
    fn split(&self, index: usize) -> (usize, usize) {
        let child = index.checked_shr(self.step_base).unwrap_or(0);
        (child, index - self.base_of(child))
    }

    #[inline]
    fn base_of(&self, child: usize) -> usize {
        if child == 0 {
            0
        } else {
            child << self.step_base
        }
    }

    #[inline]
    fn last_child(&mut self) -> &mut Node<T> {
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Links an overflow sibling produced by the last child.
    fn adopt(&mut self, node: Node<T>) -> Option<Node<T>> {
        if self.children.is_full() {
            let sibling = Branch::new(self.level, self.leaf_shift, node, None);
            return Some(Node::Branch(Box::new(sibling)));
        }
        checked(self.children.add(node, NODE_LEASE));
        None
    }

    fn add<A>(&mut self, item: T, lease: Lease<'_, A>) -> Option<Node<T>>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let overflow = self.last_child().add(item, lease)?;
        self.adopt(overflow)
    }

    fn ensure<A>(&mut self, extra: &mut usize, value: &T, lease: Lease<'_, A>) -> Option<Node<T>>
    where
        A: ArrayAllocator<T> + ?Sized,
        T: Clone,
    {
        let overflow = self.last_child().ensure(extra, value, lease)?;
        self.adopt(overflow)
    }

    fn try_insert_and_push<A>(&mut self, index: usize, item: T, lease: Lease<'_, A>) -> Option<T>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let (current, mut offset) = self.split(index);
        let mut item = item;
        for child in self.children.as_mut_slice().iter_mut().skip(current) {
            item = child.try_insert_and_push(offset, item, lease)?;
            offset = 0;
        }
        Some(item)
    }

    fn remove_at_and_pop<A>(&mut self, index: usize, incoming: Option<T>, lease: Lease<'_, A>) -> T
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let (current, offset) = self.split(index);
        debug_assert!(current < self.children.len());

        let mut carry = incoming;
        let mut i = self.children.len();
        loop {
            i -= 1;
            let child = &mut self.children[i];
            let target = if i == current { offset } else { 0 };
            let popped = child.remove_at_and_pop(target, carry.take(), lease);
            if child.is_empty() {
                drop(self.children.remove_at(i, NODE_LEASE));
            }
            if i == current {
                return popped;
            }
            carry = Some(popped);
        }
    }

    fn remove_last<A>(&mut self, lease: Lease<'_, A>) -> Option<T>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let last = self.children.len().checked_sub(1)?;
        let child = &mut self.children[last];
        let item = child.remove_last(lease);
        if child.is_empty() {
            drop(self.children.remove_at(last, NODE_LEASE));
        }
        item
    }
}

/// A tree node.
pub(crate) enum Node<T> {
    Segment(SegmentHandle<T>),
    Branch(Box<Branch<T>>),
}

impl<T> Node<T> {
    #[inline]
    pub(crate) fn segment(items: PoolList<T>) -> Self {
        Node::Segment(SegmentHandle::new(Segment { items }))
    }

    /// A fresh segment holding `item` in a buffer of `capacity` elements.
    pub(crate) fn first_segment<A>(item: T, capacity: usize, max_capacity: usize, lease: Lease<'_, A>) -> Self
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        let mut items = PoolList::with_capacity(capacity, max_capacity, lease);
        checked(items.add(item, lease));
        Node::segment(items)
    }

    /// An empty segment with a buffer of `min(capacity, max_capacity)` elements.
    pub(crate) fn empty_segment<A>(capacity: usize, max_capacity: usize, lease: Lease<'_, A>) -> Self
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        Node::segment(PoolList::with_capacity(capacity, max_capacity, lease))
    }

    /// Makes `self` and `sibling` the two children of a new branch one level up.
    pub(crate) fn wrap(self, sibling: Node<T>, leaf_shift: u32) -> Self {
        let level = self.level() + 1;
        Node::Branch(Box::new(Branch::new(level, leaf_shift, self, Some(sibling))))
    }

    #[inline]
    pub(crate) fn level(&self) -> u32 {
        match self {
            Node::Segment(_) => 0,
            Node::Branch(branch) => branch.level,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Node::Segment(segment) => segment.items.is_empty(),
            Node::Branch(branch) => branch.children.is_empty(),
        }
    }

    #[inline]
    pub(crate) fn as_segment(&self) -> Option<&PoolList<T>> {
        match self {
            Node::Segment(segment) => Some(&segment.items),
            Node::Branch(_) => None,
        }
    }

    /// Children of a branch, empty for a segment.
    #[inline]
    pub(crate) fn children(&self) -> &[Node<T>] {
        match self {
            Node::Segment(_) => &[],
            Node::Branch(branch) => branch.children.as_slice(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        match self {
            Node::Segment(segment) => segment.items.get(index),
            Node::Branch(branch) => {
                let (child, offset) = branch.split(index);
                branch.children.get(child)?.get(offset)
            }
        }
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match self {
            Node::Segment(segment) => segment.items.get_mut(index),
            Node::Branch(branch) => {
                let (child, offset) = branch.split(index);
                branch.children.get_mut(child)?.get_mut(offset)
            }
        }
    }

    /// Swaps two elements of this subtree. Both indices must be in range.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        match self {
            Node::Segment(segment) => segment.items.as_mut_slice().swap(a, b),
            Node::Branch(branch) => {
                let (child_a, offset_a) = branch.split(a);
                let (child_b, offset_b) = branch.split(b);
                let children = branch.children.as_mut_slice();
                if child_a == child_b {
                    children[child_a].swap(offset_a, offset_b);
                    return;
                }
                let (lo, lo_offset, hi, hi_offset) = if child_a < child_b {
                    (child_a, offset_a, child_b, offset_b)
                } else {
                    (child_b, offset_b, child_a, offset_a)
                };
                let (left, right) = children.split_at_mut(hi);
                if let (Some(x), Some(y)) = (left[lo].get_mut(lo_offset), right[0].get_mut(hi_offset)) {
                    std::mem::swap(x, y);
                }
            }
        }
    }

    /// Appends to the tail of this subtree. Returns a same-level sibling
    /// holding `item` when this subtree is full.
    pub(crate) fn add<A>(&mut self, item: T, lease: Lease<'_, A>) -> Option<Node<T>>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        match self {
            Node::Segment(segment) => segment.add(item, lease),
            Node::Branch(branch) => branch.add(item, lease),
        }
    }

    /// Appends up to `extra` clones of `value`, decrementing `extra` by the
    /// number placed. Returns a same-level sibling when this subtree was full.
    pub(crate) fn ensure<A>(&mut self, extra: &mut usize, value: &T, lease: Lease<'_, A>) -> Option<Node<T>>
    where
        A: ArrayAllocator<T> + ?Sized,
        T: Clone,
    {
        match self {
            Node::Segment(segment) => segment.ensure(extra, value, lease),
            Node::Branch(branch) => branch.ensure(extra, value, lease),
        }
    }

    /// Inserts `item` at `index`. Returns the element pushed out of the end
    /// of this subtree, if any.
    pub(crate) fn try_insert_and_push<A>(&mut self, index: usize, item: T, lease: Lease<'_, A>) -> Option<T>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        match self {
            Node::Segment(segment) => segment.try_insert_and_push(index, item, lease),
            Node::Branch(branch) => branch.try_insert_and_push(index, item, lease),
        }
    }

    /// Removes the element at `index` and appends `incoming` to the tail of
    /// this subtree. Returns the removed element.
    pub(crate) fn remove_at_and_pop<A>(&mut self, index: usize, incoming: Option<T>, lease: Lease<'_, A>) -> T
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        match self {
            Node::Segment(segment) => segment.remove_at_and_pop(index, incoming, lease),
            Node::Branch(branch) => branch.remove_at_and_pop(index, incoming, lease),
        }
    }

    pub(crate) fn remove_last<A>(&mut self, lease: Lease<'_, A>) -> Option<T>
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        match self {
            Node::Segment(segment) => segment.items.pop(lease),
            Node::Branch(branch) => branch.remove_last(lease),
        }
    }

    /// Returns the first index in `start..end` whose element matches `pred`.
    pub(crate) fn position<F>(&self, start: usize, end: usize, pred: &mut F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        match self {
            Node::Segment(segment) => {
                let items = segment.items.as_slice();
                let window = items.get(start..end.min(items.len()))?;
                window.iter().position(|item| pred(item)).map(|found| found + start)
            }
            Node::Branch(branch) => {
                let (current, mut offset) = branch.split(start);
                let children = branch.children.as_slice();
                for (i, child) in children.iter().enumerate().skip(current) {
                    let base = branch.base_of(i);
                    if base >= end {
                        break;
                    }
                    if let Some(found) = child.position(offset, end - base, pred) {
                        return Some(base + found);
                    }
                    offset = 0;
                }
                None
            }
        }
    }

    /// Returns the last index in `start..end` whose element matches `pred`.
    pub(crate) fn rposition<F>(&self, start: usize, end: usize, pred: &mut F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        if start >= end {
            return None;
        }
        match self {
            Node::Segment(segment) => {
                let items = segment.items.as_slice();
                let window = items.get(start..end.min(items.len()))?;
                window.iter().rposition(|item| pred(item)).map(|found| found + start)
            }
            Node::Branch(branch) => {
                let children = branch.children.as_slice();
                let (last, _) = branch.split(end - 1);
                let last = last.min(children.len().checked_sub(1)?);
                for i in (0..=last).rev() {
                    let base = branch.base_of(i);
                    let found = children[i].rposition(start.saturating_sub(base), end - base, pred);
                    if let Some(found) = found {
                        return Some(base + found);
                    }
                    if base <= start {
                        break;
                    }
                }
                None
            }
        }
    }

    /// Pointer to the segment holding the last element of this subtree.
    pub(crate) fn last_segment(&mut self) -> Option<NonNull<Segment<T>>> {
        match self {
            Node::Segment(segment) => Some(segment.as_ptr()),
            Node::Branch(branch) => branch.children.last_mut()?.last_segment(),
        }
    }

    pub(crate) fn segment_count(&self) -> usize {
        match self {
            Node::Segment(_) => 1,
            Node::Branch(branch) => branch.children.as_slice().iter().map(Node::segment_count).sum(),
        }
    }

    /// Visits every segment in tree order.
    pub(crate) fn for_each_segment_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut PoolList<T>),
    {
        match self {
            Node::Segment(segment) => f(&mut segment.items),
            Node::Branch(branch) => {
                for child in branch.children.as_mut_slice() {
                    child.for_each_segment_mut(f);
                }
            }
        }
    }

    /// Gives every buffer of this subtree back to the allocator.
    pub(crate) fn release<A>(&mut self, lease: Lease<'_, A>)
    where
        A: ArrayAllocator<T> + ?Sized,
    {
        match self {
            Node::Segment(segment) => segment.items.clear(lease),
            Node::Branch(branch) => {
                for child in branch.children.as_mut_slice() {
                    child.release(lease);
                }
                branch.children.clear(NODE_LEASE);
            }
        }
    }

    /// Moves every segment buffer out, in tree order, without giving them back.
    pub(crate) fn drain_buffers(&mut self, out: &mut Vec<Vec<T>>) {
        match self {
            Node::Segment(segment) => out.push(segment.items.take_buffer()),
            Node::Branch(branch) => {
                for child in branch.children.as_mut_slice() {
                    child.drain_buffers(out);
                }
                branch.children.clear(NODE_LEASE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::HeapAllocator;

    const LEAF_SHIFT: u32 = 4;

    fn lease() -> Lease<'static, HeapAllocator> {
        Lease::new(&HeapAllocator, true)
    }

    fn build(n: usize) -> Node<usize> {
        let mut root = Node::segment(PoolList::with_capacity(2, 1 << LEAF_SHIFT, lease()));
        for i in 0..n {
            if let Some(sibling) = root.add(i, lease()) {
                root = root.wrap(sibling, LEAF_SHIFT);
            }
        }
        root
    }

    fn flatten(node: &Node<usize>, out: &mut Vec<usize>) {
        match node.as_segment() {
            Some(items) => out.extend_from_slice(items.as_slice()),
            None => node.children().iter().for_each(|child| flatten(child, out)),
        }
    }

    fn contents(node: &Node<usize>) -> Vec<usize> {
        let mut out = Vec::new();
        flatten(node, &mut out);
        out
    }

    #[test]
    fn test_overflow_grows_a_level() {
        let root = build(16);
        assert_eq!(root.level(), 0);

        let root = build(17);
        assert_eq!(root.level(), 1);
        assert_eq!(root.segment_count(), 2);
        assert_eq!(root.get(16), Some(&16));
        assert_eq!(root.get(17), None);
    }

    #[test]
    fn test_index_decomposition() {
        let root = build(100);
        for i in 0..100 {
            assert_eq!(root.get(i), Some(&i));
        }
        assert_eq!(root.segment_count(), 7);
    }

    #[test]
    fn test_insert_carries_across_segments() {
        let mut root = build(40);
        assert_eq!(root.try_insert_and_push(3, 1000, lease()), None);

        let mut expected: Vec<usize> = (0..40).collect();
        expected.insert(3, 1000);
        assert_eq!(contents(&root), expected);
        assert_eq!(root.get(16), Some(&15));
    }

    #[test]
    fn test_insert_carries_out_of_full_tree() {
        let mut root = build(32);
        let carry = root.try_insert_and_push(0, 1000, lease());
        assert_eq!(carry, Some(31));
        assert_eq!(contents(&root)[..3], [1000, 0, 1]);
    }

    #[test]
    fn test_remove_borrows_from_later_segments() {
        let mut root = build(40);
        assert_eq!(root.remove_at_and_pop(5, None, lease()), 5);

        let mut expected: Vec<usize> = (0..40).collect();
        expected.remove(5);
        assert_eq!(contents(&root), expected);
        assert_eq!(root.segment_count(), 3);
    }

    #[test]
    fn test_remove_prunes_emptied_tail() {
        let mut root = build(17);
        assert_eq!(root.remove_at_and_pop(0, None, lease()), 0);
        assert_eq!(root.segment_count(), 1);
        assert_eq!(root.level(), 1);
        assert_eq!(contents(&root), (1..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_position_from_start() {
        let root = build(50);
        let mut is_seven = |x: &usize| *x % 10 == 7;
        assert_eq!(root.position(0, 50, &mut is_seven), Some(7));
        assert_eq!(root.position(8, 50, &mut is_seven), Some(17));
        assert_eq!(root.position(8, 17, &mut is_seven), None);
        assert_eq!(root.position(48, 50, &mut is_seven), None);
    }

    #[test]
    fn test_rposition_bounded() {
        let root = build(50);
        let mut is_seven = |x: &usize| *x % 10 == 7;
        assert_eq!(root.rposition(0, 50, &mut is_seven), Some(47));
        assert_eq!(root.rposition(0, 47, &mut is_seven), Some(37));
        assert_eq!(root.rposition(18, 27, &mut is_seven), None);
        assert_eq!(root.rposition(17, 18, &mut is_seven), Some(17));
        assert_eq!(root.rposition(0, 7, &mut is_seven), None);
    }

    #[test]
    fn test_ensure_fills_then_spills() {
        let mut root = build(10);
        let mut extra = 20;
        assert!(root.ensure(&mut extra, &7, lease()).is_none());
        assert_eq!(extra, 14);
        let sibling = root.ensure(&mut extra, &7, lease()).expect("segment is full");
        assert_eq!(extra, 0);
        root = root.wrap(sibling, LEAF_SHIFT);
        assert_eq!(root.get(29), Some(&7));
        assert_eq!(root.get(9), Some(&9));
    }

    #[test]
    fn test_swap_across_segments() {
        let mut root = build(40);
        root.swap(2, 35);
        root.swap(20, 21);
        assert_eq!(root.get(2), Some(&35));
        assert_eq!(root.get(35), Some(&2));
        assert_eq!(root.get(20), Some(&21));
        assert_eq!(root.get(21), Some(&20));
    }

    #[test]
    fn test_last_segment_tracks_tail() {
        let mut root = build(40);
        let tail = root.last_segment().unwrap();
        // SAFETY: the tree is alive and not borrowed.
        let items = unsafe { tail.as_ref() }.items().as_slice();
        assert_eq!(items, &[32, 33, 34, 35, 36, 37, 38, 39]);
    }
}
