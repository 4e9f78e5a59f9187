//! Stable stream compaction ("copy-if")

use crate::{
    engine::{Engine, TileKernel},
    error::{self, Result},
    op::Sum,
    scatter::ScatterSlice,
    thread::ForkJoin,
};
use std::ops::Range;

/// Tile kernel of stream compaction
///
/// The value flowing between tiles is the number of elements that passed the
/// predicate, which is also the output offset of the next surviving element.
///
struct CompactKernel<'a, T, P> {
    input: &'a [T],
    predicate: P,
    output: ScatterSlice<'a, T>,
}
//
impl<T, P> TileKernel for CompactKernel<'_, T, P>
where
    T: Clone + Send + Sync,
    P: Fn(&T) -> bool + Sync,
{
    type Value = u32;
    type Op = Sum;

    /// Predicate outcome of each element of the tile
    type Local = Vec<bool>;

    fn len(&self) -> usize {
        self.input.len()
    }

    fn op(&self) -> &Sum {
        &Sum
    }

    fn reduce(&self, _tile: u32, range: Range<usize>) -> (u32, Vec<bool>) {
        let flags = self.input[range]
            .iter()
            .map(&self.predicate)
            .collect::<Vec<_>>();
        let count = flags.iter().filter(|&&flag| flag).count();
        (count as u32, flags)
    }

    fn apply(&self, _tile: u32, range: Range<usize>, predecessor: Option<u32>, flags: Vec<bool>) {
        let mut offset = predecessor.unwrap_or(0) as usize;
        for (elem, flag) in self.input[range].iter().zip(flags) {
            if flag {
                // Safety: offsets are strictly increasing within a tile, and
                //         every tile's offsets start after its predecessors'
                unsafe { self.output.write(offset, elem.clone()) };
                offset += 1;
            }
        }
    }
}

impl<E: ForkJoin> Engine<E> {
    /// Copy the elements of `input` that match `predicate` to the front of
    /// `output`, in order, and return how many were copied
    ///
    /// Since every element may match, `output` must be at least as long as
    /// `input`. Elements of `output` past the returned count are left as is.
    ///
    pub fn compact<T: Clone + Send + Sync>(
        &self,
        input: &[T],
        predicate: impl Fn(&T) -> bool + Sync,
        output: &mut [T],
    ) -> Result<usize> {
        error::check_countable(input.len())?;
        error::check_worst_case_output(input.len(), output.len())?;
        let count = self.run(&CompactKernel {
            input,
            predicate,
            output: ScatterSlice::new(output),
        });
        log::debug!("Kept {count} out of {} elements", input.len());
        Ok(count as usize)
    }
}
