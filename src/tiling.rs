use std::ops::Range;

/// Sub-range of a `total_len`-element input covered by tile `tile`
///
/// Tiles are `ceil(total_len / tile_count)` elements long, so the last
/// non-empty tile may be shorter and trailing tiles may be empty. Out-of-range
/// tiles and a zero tile count yield empty ranges at the end of the input.
///
pub fn range_for_tile(total_len: usize, tile: u32, tile_count: u32) -> Range<usize> {
    if tile_count == 0 {
        return total_len..total_len;
    }
    let tile_size = total_len.div_ceil(tile_count as usize);
    let start = (tile as usize).saturating_mul(tile_size).min(total_len);
    let end = (tile as usize + 1).saturating_mul(tile_size).min(total_len);
    start..end
}

/// Number of tiles worth scheduling for a `total_len`-element input
///
/// Tiles past the input length are always empty, so dropping them leaves the
/// partition of the input unchanged. At least one tile is kept.
///
pub fn effective_tile_count(total_len: usize, tile_count: u32) -> u32 {
    let max_useful = u32::try_from(total_len.max(1)).unwrap_or(u32::MAX);
    tile_count.min(max_useful)
}

/// Iterator over every tile range of an input, in tile order
pub fn tile_ranges(total_len: usize, tile_count: u32) -> impl Iterator<Item = Range<usize>> {
    (0..tile_count).map(move |tile| range_for_tile(total_len, tile, tile_count))
}
