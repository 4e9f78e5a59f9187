//! Inclusive prefix scan

use crate::{
    engine::{Engine, TileKernel},
    error::{Error, Result},
    op::{AssociativeOp, TileValue},
    scatter::ScatterSlice,
    thread::ForkJoin,
};
use std::ops::Range;

/// Tile kernel of the inclusive scan
///
/// `reduce` scans the tile into the output, `apply` then combines the
/// predecessor aggregate into every output element of the tile.
///
struct ScanKernel<'a, T, Op> {
    /// Input elements, or `None` if the output is scanned in place
    input: Option<&'a [T]>,

    /// Output elements
    output: ScatterSlice<'a, T>,

    /// Scan operator
    op: Op,
}
//
impl<T: TileValue, Op: AssociativeOp<T>> TileKernel for ScanKernel<'_, T, Op> {
    type Value = T;
    type Op = Op;
    type Local = ();

    fn len(&self) -> usize {
        self.output.len()
    }

    fn op(&self) -> &Op {
        &self.op
    }

    fn reduce(&self, _tile: u32, range: Range<usize>) -> (T, ()) {
        // Safety: tiles do not overlap, and this tile's range is not accessed
        //         by anyone else until apply() is called on it
        let output = unsafe { self.output.slice_mut(range.clone()) };
        if let Some(input) = self.input {
            output.copy_from_slice(&input[range]);
        }
        let mut accumulator = self.op.identity();
        for elem in output {
            accumulator = self.op.combine(accumulator, *elem);
            *elem = accumulator;
        }
        (accumulator, ())
    }

    fn apply(&self, _tile: u32, range: Range<usize>, predecessor: Option<T>, (): ()) {
        let Some(predecessor) = predecessor else {
            return;
        };
        // Safety: Same as in reduce()
        for elem in unsafe { self.output.slice_mut(range) } {
            *elem = self.op.combine(predecessor, *elem);
        }
    }
}

impl<E: ForkJoin> Engine<E> {
    /// Inclusive scan of `input` into `output`
    ///
    /// Once this returns, `output[k]` is the combination of `input[0..=k]`.
    /// `output` must have the same length as `input`.
    ///
    pub fn scan<T: TileValue>(
        &self,
        input: &[T],
        output: &mut [T],
        op: impl AssociativeOp<T>,
    ) -> Result<()> {
        if output.len() != input.len() {
            return Err(Error::OutputLength {
                expected: input.len(),
                actual: output.len(),
            });
        }
        self.run(&ScanKernel {
            input: Some(input),
            output: ScatterSlice::new(output),
            op,
        });
        Ok(())
    }

    /// Inclusive scan of `data`, overwriting it
    pub fn scan_in_place<T: TileValue>(&self, data: &mut [T], op: impl AssociativeOp<T>) {
        self.run(&ScanKernel {
            input: None,
            output: ScatterSlice::new(data),
            op,
        });
    }
}
