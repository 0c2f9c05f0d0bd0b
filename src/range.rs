//! Validated iteration spaces and the splitter that bisects them.

use crate::error::RangeError;

/// The indices `begin, begin + step, begin + 2 * step, ...` strictly below
/// `end`, together with the chunk size below which they are processed
/// sequentially.
///
/// A `Range` can only be obtained through [`Range::new`] (or one of its
/// shorthands), which guarantees `begin < end`, `step > 0` and `chunk > 0`.
/// Splitting produces new ranges and never modifies an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    begin: i64,
    end: i64,
    step: u64,
    chunk: u64,
}

impl Range {
    /// Validates and creates a range.
    ///
    /// ```
    /// use stride::{Range, RangeError};
    ///
    /// let range = Range::new(0, 10, 3, 1).unwrap();
    /// assert_eq!(range.indices().collect::<Vec<_>>(), [0, 3, 6, 9]);
    ///
    /// assert_eq!(Range::new(4, 4, 1, 1), Err(RangeError::EmptyRange { begin: 4, end: 4 }));
    /// assert_eq!(Range::new(0, 4, 0, 1), Err(RangeError::NonPositiveStep(0)));
    /// assert_eq!(Range::new(0, 4, 1, -2), Err(RangeError::NonPositiveChunk(-2)));
    /// ```
    pub fn new(begin: i64, end: i64, step: i64, chunk: i64) -> Result<Range, RangeError> {
        if begin >= end {
            return Err(RangeError::EmptyRange { begin, end });
        }
        if step <= 0 {
            return Err(RangeError::NonPositiveStep(step));
        }
        if chunk <= 0 {
            return Err(RangeError::NonPositiveChunk(chunk));
        }
        Ok(Range {
            begin,
            end,
            step: step as u64,
            chunk: chunk as u64,
        })
    }

    /// The range `0..end` with unit step and chunk.
    pub fn upto(end: i64) -> Result<Range, RangeError> {
        Range::new(0, end, 1, 1)
    }

    /// The range `begin..end` with unit step and chunk.
    pub fn between(begin: i64, end: i64) -> Result<Range, RangeError> {
        Range::new(begin, end, 1, 1)
    }

    /// The first index.
    #[inline]
    pub fn begin(&self) -> i64 {
        self.begin
    }

    /// The exclusive upper bound.
    #[inline]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// The distance between consecutive indices.
    #[inline]
    pub fn step(&self) -> i64 {
        self.step as i64
    }

    /// The number of indices at or below which the range is not split.
    #[inline]
    pub fn chunk(&self) -> i64 {
        self.chunk as i64
    }

    /// The number of indices in the range. Always at least one.
    #[inline]
    pub fn len(&self) -> u64 {
        (self.span() - 1) / self.step + 1
    }

    /// Ranges are never empty; provided for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true when the range holds no more than `chunk` indices and is
    /// therefore always processed sequentially.
    #[inline]
    pub fn is_base_case(&self) -> bool {
        self.len() <= self.chunk
    }

    /// Iterates over the indices in increasing order.
    #[inline]
    pub fn indices(&self) -> impl Iterator<Item = i64> + use<> {
        let Range { begin, step, .. } = *self;
        // `k * step` is below the span, so the offset fits and the sum stays
        // within `begin..end`.
        (0..self.len()).map(move |k| begin.wrapping_add_unsigned(k * step))
    }

    /// Returns the index at which the range is bisected. The result is
    /// `begin` plus a positive multiple of `step`, and the left part
    /// `begin..middle` holds at least as many indices as the right part
    /// `middle..end` (and at most one more).
    ///
    /// The range must hold at least two indices for the right part to be
    /// non-empty; [`Range::split`] checks this.
    #[inline]
    pub fn middle(&self) -> i64 {
        let offset = self.step + (self.span() - 1) / 2 / self.step * self.step;
        self.begin.wrapping_add_unsigned(offset)
    }

    /// Bisects the range at [`Range::middle`], or returns `None` when the
    /// range is a base case. Both halves keep the step and chunk size.
    ///
    /// ```
    /// use stride::Range;
    ///
    /// let (left, right) = Range::new(0, 10, 1, 2).unwrap().split().unwrap();
    /// assert_eq!((left.begin(), left.end()), (0, 5));
    /// assert_eq!((right.begin(), right.end()), (5, 10));
    ///
    /// assert!(Range::new(0, 2, 1, 2).unwrap().split().is_none());
    /// ```
    pub fn split(&self) -> Option<(Range, Range)> {
        if self.is_base_case() {
            return None;
        }
        let middle = self.middle();
        debug_assert!(self.begin < middle && middle < self.end);
        let left = Range {
            end: middle,
            ..*self
        };
        let right = Range {
            begin: middle,
            ..*self
        };
        Some((left, right))
    }

    /// `end - begin`, which is positive and always fits in a `u64`.
    #[inline]
    fn span(&self) -> u64 {
        self.end.abs_diff(self.begin)
    }
}

impl TryFrom<core::ops::Range<i64>> for Range {
    type Error = RangeError;

    fn try_from(range: core::ops::Range<i64>) -> Result<Range, RangeError> {
        Range::between(range.start, range.end)
    }
}
