//! Concurrent writes into disjoint parts of a caller-provided buffer

use std::{marker::PhantomData, ops::Range};

/// Mutable slice that tile workers write into concurrently
///
/// Once a tile knows its predecessor aggregate, the output locations it must
/// write are known and disjoint from those of every other tile, but they are
/// only known at runtime, so the borrow checker cannot split the slice ahead
/// of time. Writers are responsible for disjointness, hence the `unsafe`
/// accessors. Bounds are always checked.
///
pub struct ScatterSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _borrow: PhantomData<&'a mut [T]>,
}

// Safety: Sharing a ScatterSlice only gives access to its content through
//         unsafe methods whose contract forbids concurrent access to the same
//         element, so this is equivalent to sending &mut T across threads.
unsafe impl<T: Send> Send for ScatterSlice<'_, T> {}
unsafe impl<T: Send> Sync for ScatterSlice<'_, T> {}
//
impl<'a, T> ScatterSlice<'a, T> {
    /// Mutably borrow a slice for the duration of a parallel scatter
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _borrow: PhantomData,
        }
    }

    /// Length of the underlying slice
    pub fn len(&self) -> usize {
        self.len
    }

    /// Truth that the underlying slice is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrite one element
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    ///
    /// # Safety
    ///
    /// No other thread may access element `index` until this write is
    /// synchronized with it (e.g. by the end of the fork-join region).
    ///
    #[inline]
    pub unsafe fn write(&self, index: usize, value: T) {
        assert!(index < self.len, "scatter index {index} out of bounds ({})", self.len);
        *self.ptr.add(index) = value;
    }

    /// Mutable access to a sub-range of the slice
    ///
    /// # Panics
    ///
    /// If `range` is out of bounds or decreasing.
    ///
    /// # Safety
    ///
    /// The returned slice must not overlap with any other live sub-slice or
    /// concurrent `write()` from this `ScatterSlice`.
    ///
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [T] {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "scatter range {range:?} out of bounds ({})",
            self.len
        );
        std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.end - range.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::tile_ranges;

    #[test]
    fn disjoint_parallel_writes() {
        let mut data = vec![0usize; 1000];
        {
            let scatter = ScatterSlice::new(&mut data);
            assert_eq!(scatter.len(), 1000);
            std::thread::scope(|s| {
                for range in tile_ranges(1000, 7) {
                    let scatter = &scatter;
                    s.spawn(move || {
                        // Safety: tile ranges do not overlap
                        let tile = unsafe { scatter.slice_mut(range.clone()) };
                        for (dst, idx) in tile.iter_mut().zip(range) {
                            *dst = idx;
                        }
                    });
                }
            });
        }
        assert!(data.iter().enumerate().all(|(idx, &value)| idx == value));
    }

    #[test]
    fn single_writes() {
        let mut data = vec![String::new(); 3];
        {
            let scatter = ScatterSlice::new(&mut data);
            // Safety: single-threaded, each index written once
            unsafe {
                scatter.write(2, "c".to_owned());
                scatter.write(0, "a".to_owned());
            }
        }
        assert_eq!(data, ["a", "", "c"]);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_write() {
        let mut data = [0u8; 2];
        let scatter = ScatterSlice::new(&mut data);
        unsafe { scatter.write(2, 1) };
    }

    #[test]
    fn empty_slice() {
        let mut data: [u8; 0] = [];
        let scatter = ScatterSlice::new(&mut data);
        assert!(scatter.is_empty());
        assert!(unsafe { scatter.slice_mut(0..0) }.is_empty());
    }
}
