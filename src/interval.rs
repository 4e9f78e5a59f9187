//! Run-tracking composite used by run segmentation

use crate::op::AssociativeOp;

/// Summary of a contiguous span of elements, in terms of the maximal runs
/// that start inside of it
///
/// When the span starts at element 0 of the input, `run_start` is the
/// absolute index where the run containing the last element begins, and
/// `run_count - 1` is the index of that run among all runs of the input.
///
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, bytemuck::NoUninit)]
pub struct Interval {
    /// Number of runs that start inside of the span
    pub run_count: u32,

    /// Offset from the start of the span to the start of the run containing
    /// its last element, or 0 if that run starts before the span
    pub run_start: u32,

    /// Number of elements in the span
    pub element_count: u32,

    /// Truth that the last element of the span starts a new run
    pub starts_new_run: bool,

    // Explicit padding, table slots must not contain uninitialized bytes
    _padding: [u8; 3],
}
//
impl Interval {
    /// Empty span, neutral element of `IntervalMerge`
    pub const EMPTY: Self = Self {
        run_count: 0,
        run_start: 0,
        element_count: 0,
        starts_new_run: false,
        _padding: [0; 3],
    };

    /// Span made of a single element
    pub const fn element(starts_new_run: bool) -> Self {
        Self {
            run_count: starts_new_run as u32,
            run_start: 0,
            element_count: 1,
            starts_new_run,
            _padding: [0; 3],
        }
    }

    /// Index of the run containing the last element of a prefix
    ///
    /// Only meaningful for spans starting at element 0, which always contain
    /// at least one run start.
    ///
    pub fn run_index(&self) -> usize {
        debug_assert!(self.run_count > 0, "span contains no run start");
        self.run_count as usize - 1
    }
}

/// Segmented-scan merge of two adjacent `Interval`s
///
/// This operation is associative but not commutative: `left` must cover the
/// elements immediately before those of `right`.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IntervalMerge;
//
impl AssociativeOp<Interval> for IntervalMerge {
    #[inline(always)]
    fn identity(&self) -> Interval {
        Interval::EMPTY
    }

    #[inline]
    fn combine(&self, left: Interval, right: Interval) -> Interval {
        let right_starts_runs = right.run_count > 0;
        Interval {
            run_count: left.run_count + right.run_count,
            run_start: if right_starts_runs {
                left.element_count + right.run_start
            } else {
                left.run_start
            },
            element_count: left.element_count + right.element_count,
            starts_new_run: if right.element_count == 0 {
                left.starts_new_run
            } else {
                right.starts_new_run
            },
            _padding: [0; 3],
        }
    }
}
