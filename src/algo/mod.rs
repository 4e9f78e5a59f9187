//! Algorithms built on the engine
//!
//! Each algorithm is a `TileKernel` plus an `Engine` method that checks the
//! caller's buffers and runs the kernel. They only differ in the value that
//! flows between tiles: the elements themselves for scan, a count of
//! surviving elements for compaction, and an `Interval` for segmentation.

pub mod compact;
pub mod scan;
pub mod segment;
