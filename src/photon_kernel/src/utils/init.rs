use core::cell::UnsafeCell;

/// A constant default value, usable where `Default::default()` isn't (in
/// `const` context).
///
/// Every piece of kernel state implements this, so that a port can place the
/// whole [`Kernel`](crate::Kernel) in a `static` without running any code
/// before boot.
pub trait Init {
    const INIT: Self;
}

impl<T> Init for Option<T> {
    const INIT: Self = None;
}

impl<T: Init, const LEN: usize> Init for [T; LEN] {
    const INIT: Self = [const { T::INIT }; LEN];
}

#[allow(clippy::declare_interior_mutable_const)]
impl<T: Init> Init for UnsafeCell<T> {
    const INIT: Self = UnsafeCell::new(T::INIT);
}

/// Empty
impl<const CAP: usize> Init for arrayvec::ArrayString<CAP> {
    const INIT: Self = Self::new_const();
}

macro_rules! impl_init_zero {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Init for $ty {
                const INIT: Self = 0;
            }
        )*
    };
}

impl_init_zero!(u8, u16, u32, u64, usize);

impl Init for bool {
    const INIT: Self = false;
}
