//! Combine operators parametrizing the engine
//!
//! Every algorithm built on the engine boils down to a value type, an
//! associative binary operation on it, and that operation's identity element.
//! The engine never assumes commutativity: the left operand of `combine` is
//! always the aggregate of the lower-index elements.

/// Value that can be published through the tile status table
///
/// Table slots are `atomic::Atomic<T>` cells, which is why values must be
/// plain bytes without padding.
///
pub trait TileValue: bytemuck::NoUninit + Send + Sync {}
//
impl<T: bytemuck::NoUninit + Send + Sync> TileValue for T {}

/// Associative (but not necessarily commutative) binary operation with an
/// identity element
pub trait AssociativeOp<T>: Sync {
    /// Neutral element, such that `combine(identity, x) == combine(x, identity) == x`
    fn identity(&self) -> T;

    /// Combine an older aggregate `left` with a newer aggregate `right`
    fn combine(&self, left: T, right: T) -> T;
}

/// Wrapping addition
///
/// Used both for numerical prefix sums and for the predicate counts of stream
/// compaction.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sum;
//
impl<T: num_traits::WrappingAdd + num_traits::Zero> AssociativeOp<T> for Sum {
    #[inline(always)]
    fn identity(&self) -> T {
        T::zero()
    }

    #[inline(always)]
    fn combine(&self, left: T, right: T) -> T {
        left.wrapping_add(&right)
    }
}

/// Operator assembled from an identity value and a closure
///
/// The closure must be associative and `identity` must be its neutral element,
/// none of which can be checked here.
///
#[derive(Clone, Copy, Debug)]
pub struct FnOp<T, F> {
    identity: T,
    combine: F,
}
//
impl<T, F> FnOp<T, F> {
    /// Wrap a closure and its identity element
    pub fn new(identity: T, combine: F) -> Self {
        Self { identity, combine }
    }
}
//
impl<T: Copy + Sync, F: Fn(T, T) -> T + Sync> AssociativeOp<T> for FnOp<T, F> {
    #[inline]
    fn identity(&self) -> T {
        self.identity
    }

    #[inline]
    fn combine(&self, left: T, right: T) -> T {
        (self.combine)(left, right)
    }
}

impl<T, Op: AssociativeOp<T> + ?Sized> AssociativeOp<T> for &Op {
    #[inline(always)]
    fn identity(&self) -> T {
        (**self).identity()
    }

    #[inline(always)]
    fn combine(&self, left: T, right: T) -> T {
        (**self).combine(left, right)
    }
}
