#[macro_export]
/// Implements [`IndexRef`](crate::IndexRef) for a tuple struct wrapping an
/// unsigned integer. The backing type defaults to [`u32`] and can be given as
/// the second argument.
macro_rules! impl_index {
    ($struct_name: ident) => {
        $crate::impl_index!($struct_name, u32);
    };

    ($struct_name: ident, $backing_ty: ty) => {
        impl $crate::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0 as usize
            }

            fn new(input: usize) -> Self {
                Self(input as $backing_ty)
            }
        }

        impl From<$backing_ty> for $struct_name {
            fn from(input: $backing_ty) -> Self {
                $struct_name(input)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                $crate::IndexRef::new(input)
            }
        }
    };
}

#[macro_export]
/// Implements [`IndexRef`](crate::IndexRef) for a tuple struct wrapping a
/// [`NonZeroU32`](std::num::NonZeroU32). Index `0` is stored as `1` so that
/// `Option<Idx>` costs no extra space.
macro_rules! impl_index_nonzero {
    ($struct_name: ident) => {
        impl $crate::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0.get() as usize - 1
            }

            fn new(input: usize) -> Self {
                let raw = u32::try_from(input + 1)
                    .ok()
                    .and_then(std::num::NonZeroU32::new)
                    .expect("index space exhausted");
                Self(raw)
            }
        }

        impl From<std::num::NonZeroU32> for $struct_name {
            fn from(input: std::num::NonZeroU32) -> Self {
                $struct_name(input)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                $crate::IndexRef::new(input)
            }
        }
    };
}
