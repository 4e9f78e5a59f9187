//! Compaction and segmentation as flag pass, global scan, scatter pass
//!
//! Each pass goes over the whole input and ends with a barrier. The global
//! scan in the middle goes through the engine, whatever its strategy.

use crate::{
    engine::Engine,
    error::{self, Result},
    interval::{Interval, IntervalMerge},
    op::Sum,
    scatter::ScatterSlice,
    scheduler::for_each_tile,
    thread::ForkJoin,
    tiling::{effective_tile_count, range_for_tile},
};
use std::ops::Range;

/// Stable stream compaction, see `Engine::compact()`
pub fn compact<E: ForkJoin, T: Clone + Send + Sync>(
    engine: &Engine<E>,
    input: &[T],
    predicate: impl Fn(&T) -> bool + Sync,
    output: &mut [T],
) -> Result<usize> {
    error::check_countable(input.len())?;
    error::check_worst_case_output(input.len(), output.len())?;

    // Pass 1: predicate flags
    let mut offsets = vec![0u32; input.len()];
    {
        let offsets = ScatterSlice::new(&mut offsets);
        for_each_range(engine, input.len(), |range| {
            // Safety: tile ranges do not overlap
            let flags = unsafe { offsets.slice_mut(range.clone()) };
            for (flag, elem) in flags.iter_mut().zip(&input[range]) {
                *flag = u32::from(predicate(elem));
            }
        });
    }

    // Pass 2: inclusive scan, the output index of a surviving element is then
    // its scanned value minus one
    engine.scan_in_place(&mut offsets, Sum);

    // Pass 3: scatter
    {
        let output = ScatterSlice::new(output);
        let offsets = &offsets;
        for_each_range(engine, input.len(), |range| {
            for index in range {
                let before = if index == 0 { 0 } else { offsets[index - 1] };
                if offsets[index] != before {
                    // Safety: scanned values of surviving elements are unique
                    unsafe { output.write(before as usize, input[index].clone()) };
                }
            }
        });
    }
    Ok(offsets.last().map_or(0, |&count| count as usize))
}

/// Run segmentation, see `Engine::segment()`
pub fn segment<E: ForkJoin, T: Sync>(
    engine: &Engine<E>,
    input: &[T],
    adjacent: impl Fn(&T, &T) -> bool + Sync,
    output: &mut [Range<usize>],
) -> Result<usize> {
    error::check_countable(input.len())?;
    error::check_worst_case_output(input.len(), output.len())?;

    // Pass 1: one-element intervals
    let mut prefixes = vec![Interval::EMPTY; input.len()];
    {
        let prefixes = ScatterSlice::new(&mut prefixes);
        for_each_range(engine, input.len(), |range| {
            // Safety: tile ranges do not overlap
            let leaves = unsafe { prefixes.slice_mut(range.clone()) };
            for (leaf, index) in leaves.iter_mut().zip(range) {
                let starts_run = index == 0 || !adjacent(&input[index - 1], &input[index]);
                *leaf = Interval::element(starts_run);
            }
        });
    }

    // Pass 2: prefix intervals
    engine.scan_in_place(&mut prefixes, IntervalMerge);

    // Pass 3: every element that ends a run writes that run's range
    {
        let output = ScatterSlice::new(output);
        let prefixes = &prefixes;
        for_each_range(engine, input.len(), |range| {
            for index in range {
                let ends_run = prefixes
                    .get(index + 1)
                    .map_or(true, |next| next.starts_new_run);
                if ends_run {
                    let prefix = prefixes[index];
                    // Safety: each run has exactly one last element
                    unsafe {
                        output.write(prefix.run_index(), prefix.run_start as usize..index + 1)
                    };
                }
            }
        });
    }
    Ok(prefixes.last().map_or(0, |prefix| prefix.run_count as usize))
}

/// Run a full pass over the input, one tile at a time, on the engine's
/// executor
fn for_each_range<E: ForkJoin>(
    engine: &Engine<E>,
    len: usize,
    process: impl Fn(Range<usize>) + Sync,
) {
    let tile_count = effective_tile_count(len, engine.tile_count());
    for_each_tile(engine.executor(), tile_count, |claim| {
        process(range_for_tile(len, claim.index(), tile_count))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, test_utils, thread::Sequential};
    use proptest::prelude::*;

    #[test]
    fn negative_numbers() {
        test_utils::init_logging();
        for (name, engine) in test_utils::engines(2) {
            let mut output = [0; 5];
            let count = compact(&engine, &[-1, 2, -3, 4, -5], |&x| x < 0, &mut output).unwrap();
            assert_eq!(output[..count], [-1, -3, -5], "{name}");
        }
    }

    #[test]
    fn words_and_spaces() {
        for (name, engine) in test_utils::engines(2) {
            let mut output = vec![0..0; 5];
            let count = segment(
                &engine,
                b"aa bb",
                |a, b| *a != b' ' && *b != b' ',
                &mut output,
            )
            .unwrap();
            assert_eq!(output[..count], [0..2, 2..3, 3..5], "{name}");
        }
    }

    #[test]
    fn more_tiles_than_elements() {
        let engine = Engine::with_executor(100_000_000, Sequential).unwrap();
        let mut output = [0; 4];
        assert_eq!(compact(&engine, &[1, -2, 3, -4], |&x| x > 0, &mut output).unwrap(), 2);
        assert_eq!(output[..2], [1, 3]);
        let mut runs = vec![0..0; 4];
        assert_eq!(segment(&engine, &[1, 1, 2, 2], |a, b| a == b, &mut runs).unwrap(), 2);
        assert_eq!(runs[..2], [0..2, 2..4]);
    }

    #[test]
    fn buffer_checks() {
        let engine = Engine::with_executor(2, Sequential).unwrap();
        assert!(matches!(
            compact(&engine, &[1, 2], |_| true, &mut [0]),
            Err(Error::OutputTooShort { .. })
        ));
        assert!(matches!(
            segment(&engine, &[1, 2], |_, _| true, &mut []),
            Err(Error::OutputTooShort { .. })
        ));
        assert_eq!(segment(&engine, &[0u8; 0], |_, _| true, &mut []).unwrap(), 0);
        assert_eq!(compact(&engine, &[0u8; 0], |_| true, &mut []).unwrap(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn agrees_with_single_pass(
            (input, tile_count) in test_utils::input_and_tile_count(0u8..3)
        ) {
            test_utils::init_logging();
            for (name, engine) in test_utils::engines(tile_count) {
                let mut single = vec![0; input.len()];
                let mut three = vec![0; input.len()];
                let even = |x: &u8| x % 2 == 0;
                let count = engine.compact(&input, even, &mut single).unwrap();
                prop_assert_eq!(compact(&engine, &input, even, &mut three).unwrap(), count);
                prop_assert_eq!(&single[..count], &three[..count], "{}", name);

                let mut single = vec![0..0; input.len()];
                let mut three = vec![0..0; input.len()];
                let same = |a: &u8, b: &u8| a == b;
                let count = engine.segment(&input, same, &mut single).unwrap();
                prop_assert_eq!(segment(&engine, &input, same, &mut three).unwrap(), count);
                prop_assert_eq!(&single[..count], &three[..count], "{}", name);
            }
        }
    }
}
