//! Opaque native identities
//!
//! The bridge never dereferences these values. They are only compared,
//! hashed, and handed back to the engine that produced them.

use std::fmt;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// The null value ("no native object")
            pub const NULL: Self = Self(0);

            /// Wrap a raw value handed out by the engine
            #[inline]
            pub const fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            /// Get the raw value
            #[inline]
            pub const fn as_raw(self) -> usize {
                self.0
            }

            /// Check for the null value
            #[inline]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, "{}(NULL)", stringify!($name))
                } else {
                    write!(f, "{}({:#x})", stringify!($name), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

opaque_handle!(
    /// Reference-counted native object owned by the engine
    NativeHandle
);

opaque_handle!(
    /// Native representation of a registered type
    NativeType
);

opaque_handle!(
    /// Native dependency-property registration
    PropertyHandle
);
