/// A newtype index into one of the arenas in [`maps`](crate::maps).
///
/// Implementations are expected to be cheap to copy and to round-trip through
/// `usize` exactly, i.e. `I::new(i).index() == i`. Use [`impl_index!`] or
/// [`impl_index_nonzero!`] rather than implementing this by hand.
///
/// [`impl_index!`]: crate::impl_index
/// [`impl_index_nonzero!`]: crate::impl_index_nonzero
pub trait IndexRef: Copy + Eq {
    fn index(&self) -> usize;
    fn new(input: usize) -> Self;
}

#[cfg(test)]
mod tests {
    use crate::{IndexRef, impl_index, impl_index_nonzero};
    use std::num::NonZeroU32;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Plain(u32);
    impl_index!(Plain);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Niche(NonZeroU32);
    impl_index_nonzero!(Niche);

    #[test]
    fn nonzero_indices_start_at_zero() {
        let idx = Niche::new(0);
        assert_eq!(idx.index(), 0);
        assert_eq!(idx.0.get(), 1);
        assert_eq!(
            std::mem::size_of::<Option<Niche>>(),
            std::mem::size_of::<Niche>()
        );
    }

    #[test]
    fn conversions_agree() {
        assert_eq!(Plain::from(7_usize), Plain::new(7));
        assert_eq!(Plain::from(7_u32).index(), 7);
        assert_eq!(Niche::from(41_usize).index(), 41);
    }
}
