use std::{fmt, marker::PhantomData, num::NonZeroU32};

use pvsim_idx::{IndexRef, impl_index_nonzero};

use crate::values::SignalValue;

/// A non-zero index into the module arena of a
/// [`SimContext`](super::SimContext)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdx(NonZeroU32);
impl_index_nonzero!(ModuleIdx);

/// The public name for a module in the design hierarchy.
pub type ModuleId = ModuleIdx;

/// A non-zero index into the signal arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalIdx(NonZeroU32);
impl_index_nonzero!(SignalIdx);

/// A non-zero index into the register arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterIdx(NonZeroU32);
impl_index_nonzero!(RegisterIdx);

/// Anything a module can be sensitized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetRef {
    Signal(SignalIdx),
    Register(RegisterIdx),
}

impl From<SignalIdx> for NetRef {
    fn from(v: SignalIdx) -> Self {
        Self::Signal(v)
    }
}

impl From<RegisterIdx> for NetRef {
    fn from(v: RegisterIdx) -> Self {
        Self::Register(v)
    }
}

impl fmt::Display for NetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetRef::Signal(s) => write!(f, "signal #{}", s.index()),
            NetRef::Register(r) => write!(f, "register #{}", r.index()),
        }
    }
}

/// Which module, if any, a signal triggers when its value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Sensitizes the declaring module
    Wire,
    /// Sensitizes the declaring module. Not allowed on the root.
    Input,
    /// Sensitizes the parent of the declaring module. Not allowed on the
    /// root.
    Output,
    /// Sensitizes nothing, only observable
    Quiet,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Wire => "wire",
            SignalKind::Input => "input",
            SignalKind::Output => "output",
            SignalKind::Quiet => "qwire",
        }
    }

    pub fn is_port(&self) -> bool {
        matches!(self, SignalKind::Input | SignalKind::Output)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed handle to a combinational signal. Handles are plain indices and
/// are only meaningful for the context that created them.
pub struct Signal<T> {
    idx: SignalIdx,
    _marker: PhantomData<fn() -> T>,
}

/// A typed handle to a two-stage register.
pub struct Register<T> {
    idx: RegisterIdx,
    _marker: PhantomData<fn() -> T>,
}

// The derives would put bounds on `T`, which the handles do not need.
macro_rules! handle_impls {
    ($handle:ident, $idx:ident, $variant:ident) => {
        impl<T> $handle<T> {
            pub(crate) fn new(idx: $idx) -> Self {
                Self {
                    idx,
                    _marker: PhantomData,
                }
            }

            pub fn idx(&self) -> $idx {
                self.idx
            }
        }

        impl<T> Clone for $handle<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $handle<T> {}

        impl<T> PartialEq for $handle<T> {
            fn eq(&self, other: &Self) -> bool {
                self.idx == other.idx
            }
        }

        impl<T> Eq for $handle<T> {}

        impl<T> fmt::Debug for $handle<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($handle)).field(&self.idx).finish()
            }
        }

        impl<T: SignalValue> From<$handle<T>> for NetRef {
            fn from(h: $handle<T>) -> Self {
                NetRef::$variant(h.idx)
            }
        }
    };
}

handle_impls!(Signal, SignalIdx, Signal);
handle_impls!(Register, RegisterIdx, Register);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_small_and_copy() {
        assert_eq!(size_of::<Option<ModuleIdx>>(), size_of::<u32>());
        assert_eq!(size_of::<Signal<u64>>(), size_of::<u32>());
        let s: Signal<u8> = Signal::new(SignalIdx::new(3));
        let t = s;
        assert_eq!(s, t);
        assert_eq!(NetRef::from(t), NetRef::Signal(SignalIdx::new(3)));
    }

    #[test]
    fn net_refs_order_signals_first() {
        let s = NetRef::from(SignalIdx::new(10));
        let r = NetRef::from(RegisterIdx::new(0));
        assert!(s < r);
        assert_eq!(r.to_string(), "register #0");
    }
}
