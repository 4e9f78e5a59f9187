use crate::{
    engine::TileKernel,
    op::AssociativeOp,
    scheduler::for_each_tile,
    thread::ForkJoin,
    tiling::{effective_tile_count, range_for_tile},
};
use std::sync::{Mutex, PoisonError};

/// Run a kernel with two barriers instead of a lookback
///
/// 1. Upsweep: reduce every tile in parallel and keep the partials.
/// 2. Scan the per-tile partials sequentially on the calling thread.
/// 3. Downsweep: apply every tile in parallel with its predecessor.
///
/// Returns the aggregate of the whole input. Tiles that would lie past the
/// end of the input are not scheduled.
///
pub fn upsweep_downsweep<K: TileKernel>(
    kernel: &K,
    tile_count: u32,
    executor: &(impl ForkJoin + ?Sized),
) -> K::Value {
    let len = kernel.len();
    let op = kernel.op();
    let tile_count = effective_tile_count(len, tile_count);

    // Slots are only ever locked by the tile's own worker or after the
    // fork-join barrier, so they are never contended
    let slots = (0..tile_count)
        .map(|_| Mutex::new(None))
        .collect::<Box<[_]>>();
    for_each_tile(executor, tile_count, |claim| {
        let tile = claim.index();
        let reduced = kernel.reduce(tile, range_for_tile(len, tile, tile_count));
        *slots[tile as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reduced);
    });

    let mut running = op.identity();
    let slots = slots
        .into_vec()
        .into_iter()
        .enumerate()
        .map(|(tile, slot)| {
            let Some((partial, local)) = slot.into_inner().unwrap_or_else(PoisonError::into_inner)
            else {
                unreachable!("tile {tile} was not reduced")
            };
            let predecessor = (tile > 0).then_some(running);
            running = op.combine(running, partial);
            Mutex::new(Some((predecessor, local)))
        })
        .collect::<Box<[_]>>();
    log::trace!("Scanned the partials of {tile_count} tiles");

    for_each_tile(executor, tile_count, |claim| {
        let tile = claim.index();
        let taken = slots[tile as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some((predecessor, local)) = taken else {
            unreachable!("tile {tile} was applied twice")
        };
        kernel.apply(
            tile,
            range_for_tile(len, tile, tile_count),
            predecessor,
            local,
        );
    });
    running
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interval::{Interval, IntervalMerge},
        op::FnOp,
        test_utils::{self, Affine},
    };
    use std::ops::Range;

    type AffineOp = FnOp<Affine, fn(Affine, Affine) -> Affine>;

    /// Kernel whose partials are the `Affine` maps stored in `maps`, one per
    /// tile, recording what each tile gets as a predecessor
    struct Maps {
        maps: Vec<Affine>,
        op: AffineOp,
        seen: Mutex<Vec<(u32, Option<Affine>)>>,
    }
    //
    impl TileKernel for Maps {
        type Value = Affine;
        type Op = AffineOp;
        type Local = Affine;

        fn len(&self) -> usize {
            self.maps.len()
        }

        fn op(&self) -> &Self::Op {
            &self.op
        }

        fn reduce(&self, tile: u32, range: Range<usize>) -> (Affine, Affine) {
            assert_eq!(range, tile as usize..tile as usize + 1);
            (self.maps[range.start], self.maps[range.start])
        }

        fn apply(&self, tile: u32, _range: Range<usize>, predecessor: Option<Affine>, local: Affine) {
            assert_eq!(local, self.maps[tile as usize]);
            self.seen.lock().unwrap().push((tile, predecessor));
        }
    }

    #[test]
    fn predecessors_are_combined_in_order() {
        test_utils::init_logging();
        let maps = vec![
            Affine { mul: 3, add: 0 },
            Affine { mul: 1, add: 2 },
            Affine { mul: 2, add: 0 },
            Affine { mul: 1, add: 7 },
        ];
        for (name, executor) in test_utils::executors() {
            let kernel = Maps {
                maps: maps.clone(),
                op: FnOp::new(Affine::IDENTITY, Affine::then as fn(_, _) -> _),
                seen: Mutex::new(Vec::new()),
            };
            let total = upsweep_downsweep(&kernel, 4, &executor);
            // ((3x + 2) * 2) + 7 = 6x + 11
            assert_eq!(total, Affine { mul: 6, add: 11 }, "{name}");

            let mut seen = kernel.seen.into_inner().unwrap();
            seen.sort_unstable_by_key(|&(tile, _)| tile);
            assert_eq!(
                seen,
                [
                    (0, None),
                    (1, Some(Affine { mul: 3, add: 0 })),
                    (2, Some(Affine { mul: 3, add: 2 })),
                    (3, Some(Affine { mul: 6, add: 4 })),
                ],
                "{name}"
            );
        }
    }

    #[test]
    fn segmentation_partials() {
        struct Leaves(Vec<bool>);
        impl TileKernel for Leaves {
            type Value = Interval;
            type Op = IntervalMerge;
            type Local = ();
            fn len(&self) -> usize {
                self.0.len()
            }
            fn op(&self) -> &IntervalMerge {
                &IntervalMerge
            }
            fn reduce(&self, _: u32, range: Range<usize>) -> (Interval, ()) {
                let local = self.0[range].iter().fold(Interval::EMPTY, |acc, &flag| {
                    IntervalMerge.combine(acc, Interval::element(flag))
                });
                (local, ())
            }
            fn apply(&self, _: u32, _: Range<usize>, _: Option<Interval>, (): ()) {}
        }

        // "aa bb"
        let kernel = Leaves(vec![true, false, true, true, false]);
        for tile_count in [1, 2, 3, 4, 5, 6, u32::MAX] {
            let total = upsweep_downsweep(&kernel, tile_count, &crate::thread::Sequential);
            assert_eq!(total.run_count, 3);
            assert_eq!(total.run_start, 3);
            assert_eq!(total.element_count, 5);
        }
    }
}
