//! Value types that can be carried by signals and registers.

use std::fmt::Debug;

/// A value that can live on a [`Signal`](crate::structures::Signal) or in a
/// [`Register`](crate::structures::Register).
///
/// The unknown (`x`) state is tracked next to the value rather than inside it,
/// so any plain data type can be used. [`WIDTH`](Self::WIDTH) is the default
/// display width used when tracing and [`to_bits`](Self::to_bits) is the
/// encoding written to a trace sink; only the low `width` bits are shown.
pub trait SignalValue: Clone + PartialEq + Default + Debug + 'static {
    const WIDTH: u32;

    fn to_bits(&self) -> u64;
}

impl SignalValue for bool {
    const WIDTH: u32 = 1;

    fn to_bits(&self) -> u64 {
        u64::from(*self)
    }
}

macro_rules! unsigned_value {
    ($($ty:ty),+) => {
        $(
            impl SignalValue for $ty {
                const WIDTH: u32 = <$ty>::BITS;

                fn to_bits(&self) -> u64 {
                    *self as u64
                }
            }
        )+
    };
}

macro_rules! signed_value {
    ($($ty:ty => $unsigned:ty),+) => {
        $(
            impl SignalValue for $ty {
                const WIDTH: u32 = <$ty>::BITS;

                fn to_bits(&self) -> u64 {
                    // two's complement pattern, without sign extension
                    *self as $unsigned as u64
                }
            }
        )+
    };
}

unsigned_value!(u8, u16, u32, u64, usize);
signed_value!(i8 => u8, i16 => u16, i32 => u32, i64 => u64, isize => usize);

impl SignalValue for f32 {
    const WIDTH: u32 = 32;

    fn to_bits(&self) -> u64 {
        u64::from(f32::to_bits(*self))
    }
}

impl SignalValue for f64 {
    const WIDTH: u32 = 64;

    fn to_bits(&self) -> u64 {
        f64::to_bits(*self)
    }
}

/// Renders the low `width` bits of `bits`, most significant bit first.
/// Widths above 64 are padded with leading zeros.
pub fn format_bits(bits: u64, width: u32) -> String {
    (0..width)
        .rev()
        .map(|bit| {
            if bit < 64 && (bits >> bit) & 1 == 1 {
                '1'
            } else {
                '0'
            }
        })
        .collect()
}

/// The rendering of an unknown value of the given width.
pub fn format_unknown(width: u32) -> String {
    "x".repeat(width as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_widths() {
        assert_eq!(bool::WIDTH, 1);
        assert_eq!(u8::WIDTH, 8);
        assert_eq!(i16::WIDTH, 16);
        assert_eq!(f64::WIDTH, 64);
    }

    #[test]
    fn signed_values_do_not_sign_extend() {
        assert_eq!((-1_i8).to_bits(), 0xff);
        assert_eq!((-2_i32).to_bits(), 0xffff_fffe);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_bits(0b1011, 4), "1011");
        assert_eq!(format_bits(0b1011, 2), "11");
        assert_eq!(format_bits(1, 1), "1");
        assert_eq!(format_bits(5, 6), "000101");
        assert_eq!(format_unknown(3), "xxx");
        assert_eq!(format_bits(SignalValue::to_bits(&1.0_f32), 32).len(), 32);
    }
}
