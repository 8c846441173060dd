//! Construction options for `PooledVec`.

/// Tunables applied when a `PooledVec` is created.
///
/// # Example
///
/// ```
/// use pooled_vec::Options;
///
/// let options = Options::new().max_segment_capacity(1000).clear_on_return(false);
/// assert_eq!(options.segment_capacity(), 1024);
/// assert!(!options.clears_on_return());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    max_segment_capacity: usize,
    clear_on_return: bool,
}

impl Options {
    /// Smallest allowed segment capacity.
    pub const MIN_SEGMENT_CAPACITY: usize = 16;

    /// Largest allowed segment capacity, also the default.
    pub const MAX_SEGMENT_CAPACITY: usize = 1 << 20;

    /// Default options: segments of `1 << 20` elements, buffers cleared on return.
    pub const fn new() -> Self {
        Self {
            max_segment_capacity: Self::MAX_SEGMENT_CAPACITY,
            clear_on_return: true,
        }
    }

    /// Sets the maximum number of elements per segment.
    ///
    /// The value is aligned to the nearest power of two (in log space) and
    /// clamped to `[MIN_SEGMENT_CAPACITY, MAX_SEGMENT_CAPACITY]`. Zero selects
    /// the minimum.
    pub fn max_segment_capacity(mut self, capacity: usize) -> Self {
        self.max_segment_capacity = align_segment_capacity(capacity);
        self
    }

    /// Sets whether buffers are cleared when handed back to the allocator.
    pub const fn clear_on_return(mut self, clear: bool) -> Self {
        self.clear_on_return = clear;
        self
    }

    /// Returns the aligned maximum segment capacity.
    #[inline]
    pub const fn segment_capacity(&self) -> usize {
        self.max_segment_capacity
    }

    /// Returns the `must_clear` flag passed with every returned buffer.
    #[inline]
    pub const fn clears_on_return(&self) -> bool {
        self.clear_on_return
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn align_segment_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        return Options::MIN_SEGMENT_CAPACITY;
    }
    let exp = (capacity as f64).log2().round() as u32;
    let aligned = 1usize
        .checked_shl(exp)
        .unwrap_or(Options::MAX_SEGMENT_CAPACITY);
    aligned.clamp(Options::MIN_SEGMENT_CAPACITY, Options::MAX_SEGMENT_CAPACITY)
}
