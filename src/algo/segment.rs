//! Run segmentation ("chunk-by")

use crate::{
    engine::{Engine, TileKernel},
    error::{self, Result},
    interval::{Interval, IntervalMerge},
    op::AssociativeOp,
    scatter::ScatterSlice,
    thread::ForkJoin,
};
use std::ops::Range;

/// Tile kernel of run segmentation
///
/// Each element is summarized as a one-element `Interval`, and the value
/// flowing between tiles is the `Interval` of everything before the tile.
/// Once the predecessor is known, the scan of the tile's intervals tells, for
/// every element that ends a run, where that run starts and what its index
/// is among all runs.
///
struct SegmentKernel<'a, T, A> {
    input: &'a [T],
    adjacent: A,
    output: ScatterSlice<'a, Range<usize>>,
}
//
impl<T: Sync, A: Fn(&T, &T) -> bool + Sync> SegmentKernel<'_, T, A> {
    /// Truth that element `index` is the first element of a run
    ///
    /// The element past the end of the input is considered to start a run,
    /// which marks the last element as the end of the last run.
    ///
    fn starts_run(&self, index: usize) -> bool {
        index == 0
            || index >= self.input.len()
            || !(self.adjacent)(&self.input[index - 1], &self.input[index])
    }
}
//
impl<T: Sync, A: Fn(&T, &T) -> bool + Sync> TileKernel for SegmentKernel<'_, T, A> {
    type Value = Interval;
    type Op = IntervalMerge;

    /// Run start flags of the tile's elements, followed by that of the first
    /// element after the tile
    type Local = Vec<bool>;

    fn len(&self) -> usize {
        self.input.len()
    }

    fn op(&self) -> &IntervalMerge {
        &IntervalMerge
    }

    fn reduce(&self, _tile: u32, range: Range<usize>) -> (Interval, Vec<bool>) {
        let flags = (range.start..=range.end)
            .map(|index| self.starts_run(index))
            .collect::<Vec<_>>();
        let local = flags[..range.len()]
            .iter()
            .fold(Interval::EMPTY, |acc, &flag| {
                IntervalMerge.combine(acc, Interval::element(flag))
            });
        (local, flags)
    }

    fn apply(
        &self,
        _tile: u32,
        range: Range<usize>,
        predecessor: Option<Interval>,
        flags: Vec<bool>,
    ) {
        let mut prefix = predecessor.unwrap_or(Interval::EMPTY);
        for (index, pair) in range.zip(flags.windows(2)) {
            prefix = IntervalMerge.combine(prefix, Interval::element(pair[0]));
            let ends_run = pair[1];
            if ends_run {
                // Safety: each run has exactly one last element, so each run
                //         index is written once
                unsafe {
                    self.output
                        .write(prefix.run_index(), prefix.run_start as usize..index + 1)
                };
            }
        }
    }
}

impl<E: ForkJoin> Engine<E> {
    /// Split `input` into maximal runs of elements where each element is
    /// `adjacent` to the previous one, and return the number of runs
    ///
    /// The index range of the i-th run is written to `output[i]`. Since every
    /// element may start a run, `output` must be at least as long as `input`.
    /// Elements of `output` past the returned count are left as is.
    ///
    pub fn segment<T: Sync>(
        &self,
        input: &[T],
        adjacent: impl Fn(&T, &T) -> bool + Sync,
        output: &mut [Range<usize>],
    ) -> Result<usize> {
        error::check_countable(input.len())?;
        error::check_worst_case_output(input.len(), output.len())?;
        let total = self.run(&SegmentKernel {
            input,
            adjacent,
            output: ScatterSlice::new(output),
        });
        log::debug!("Found {} runs in {} elements", total.run_count, input.len());
        Ok(total.run_count as usize)
    }
}

#[cfg(test)]
mod tests {
    use crate::{engine::Engine, error::Error, test_utils, thread::Sequential};
    use proptest::prelude::*;

    fn neither_is_space(a: &u8, b: &u8) -> bool {
        *a != b' ' && *b != b' '
    }

    #[test]
    fn words_and_spaces() {
        test_utils::init_logging();
        for tile_count in 1..=6 {
            for (name, engine) in test_utils::engines(tile_count) {
                let mut output = vec![0..0; 5];
                let count = engine
                    .segment(b"aa bb", neither_is_space, &mut output)
                    .unwrap();
                assert_eq!(count, 3, "{name} with {tile_count} tiles");
                assert_eq!(output[..count], [0..2, 2..3, 3..5], "{name}");
            }
        }
    }

    #[test]
    fn single_run_and_all_runs() {
        for (name, engine) in test_utils::engines(3) {
            let input = [4, 4, 4, 4, 4];
            let mut output = vec![0..0; 5];
            let count = engine.segment(&input, |a, b| a == b, &mut output).unwrap();
            assert_eq!(output[..count], [0..5], "{name}");

            let count = engine.segment(&input, |_, _| false, &mut output).unwrap();
            assert_eq!(output[..count], [0..1, 1..2, 2..3, 3..4, 4..5], "{name}");
        }
    }

    #[test]
    fn empty_input() {
        for (name, engine) in test_utils::engines(2) {
            let count = engine.segment(&[0u8; 0], |_, _| true, &mut []).unwrap();
            assert_eq!(count, 0, "{name}");
        }
    }

    #[test]
    fn output_too_short() {
        let engine = Engine::with_executor(1, Sequential).unwrap();
        let mut output = vec![0..0; 2];
        assert!(matches!(
            engine.segment(b"abc", |_, _| true, &mut output),
            Err(Error::OutputTooShort {
                needed: 3,
                available: 2
            })
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn input_too_long_to_count() {
        let engine = Engine::with_executor(4, Sequential).unwrap();
        let input = vec![(); u32::MAX as usize + 1];
        let mut output = vec![0..0; 1];
        assert!(matches!(
            engine.segment(&input, |_, _| true, &mut output),
            Err(Error::InputTooLong { len, max }) if len == input.len() && max == u32::MAX as usize
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn runs_are_maximal_and_cover_input(
            (input, tile_count) in test_utils::input_and_tile_count(0u8..4)
        ) {
            test_utils::init_logging();
            let adjacent = |a: &u8, b: &u8| a == b;
            let expected = test_utils::sequential_runs(&input, adjacent);
            for (name, engine) in test_utils::engines(tile_count) {
                let mut output = vec![0..0; input.len()];
                let count = engine.segment(&input, adjacent, &mut output).unwrap();
                let runs = &output[..count];
                prop_assert_eq!(runs, &expected[..], "{}", name);

                // Concatenating runs gives back the input
                let rebuilt = runs
                    .iter()
                    .flat_map(|run| input[run.clone()].iter().copied())
                    .collect::<Vec<_>>();
                prop_assert_eq!(&rebuilt, &input, "{}", name);

                // Neighbouring runs could not be merged
                for pair in runs.windows(2) {
                    prop_assert_eq!(pair[0].end, pair[1].start);
                    prop_assert!(!adjacent(&input[pair[0].end - 1], &input[pair[1].start]));
                }
            }
        }
    }
}
