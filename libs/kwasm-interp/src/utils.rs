// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Generates `is_*`, getter and `unwrap_*` methods for enums whose variants
/// each carry a single `Copy` payload. A name after `|` additionally
/// generates a getter that consumes `self`.
///
/// ```ignore
/// variant_accessors! {
///     e
///     (I32(i32) is_i32 i32 unwrap_i32 => *e)
///     (Func(Func) is_func get_func unwrap_func | into_func => *e)
/// }
/// ```
macro_rules! variant_accessors {
    ($bind:ident $(($variant:ident($ty:ty) $is:ident $get:ident $unwrap:ident $(| $into:ident)? => $cvt:expr))*) => {$(
        #[doc = concat!("Returns `true` if this is a `", stringify!($variant), "`.")]
        #[inline]
        pub fn $is(&self) -> bool {
            matches!(self, Self::$variant(_))
        }

        #[doc = concat!("Returns the payload of a `", stringify!($variant), "`, `None` for other variants.")]
        #[inline]
        pub fn $get(&self) -> Option<$ty> {
            match self {
                Self::$variant($bind) => Some($cvt),
                _ => None,
            }
        }

        #[doc = concat!("Returns the payload of a `", stringify!($variant), "`.")]
        ///
        /// # Panics
        ///
        /// Panics if `self` is a different variant.
        #[inline]
        pub fn $unwrap(&self) -> $ty {
            match self {
                Self::$variant($bind) => $cvt,
                _ => panic!(concat!("expected ", stringify!($variant))),
            }
        }

        $(
            #[inline]
            pub fn $into(self) -> Option<$ty> {
                self.$get()
            }
        )?
    )*};
}

pub(crate) use variant_accessors;
