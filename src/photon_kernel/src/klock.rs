//! CPU Lock, the critical section guarding every piece of kernel state
//!
//! Kernel state is kept in [`CpuLockCell`]s. Their contents can only be
//! reached with the singleton token held by a [`CpuLockGuard`], and the only
//! way to get a guard is [`lock_cpu`]. An access outside CPU Lock doesn't
//! compile.
use core::{fmt, marker::PhantomData, ops};
use tokenlock::{SingletonTokenId, UnsyncSingletonToken, UnsyncTokenLock};

use crate::{error::BadContextError, utils::Init, PortThreading};

/// Keeps the tokens of different ports apart.
pub(crate) struct CpuLockTag<Traits>(PhantomData<Traits>);

type CpuLockToken<Traits> = UnsyncSingletonToken<CpuLockTag<Traits>>;

/// A `&mut CpuLockGuard` without the indirection. Pass this to functions that
/// need the lock, and reborrow it with `borrow_mut()` to keep using it after
/// the call.
pub(crate) type CpuLockTokenRefMut<'a, Traits> =
    tokenlock::UnsyncSingletonTokenRefMut<'a, CpuLockTag<Traits>>;

/// A cell whose contents are only accessible during CPU Lock.
pub(crate) struct CpuLockCell<Traits, T: ?Sized>(
    UnsyncTokenLock<T, SingletonTokenId<CpuLockTag<Traits>>>,
);

impl<Traits, T> CpuLockCell<Traits, T> {
    pub(crate) const fn new(x: T) -> Self {
        Self(UnsyncTokenLock::new(SingletonTokenId::new(), x))
    }
}

impl<Traits, T: Init> Init for CpuLockCell<Traits, T> {
    const INIT: Self = Self::new(T::INIT);
}

impl<Traits: PortThreading, T: ?Sized> CpuLockCell<Traits, T> {
    /// Return a debug formatting proxy of the cell. `f` is called with CPU
    /// Lock active, so a nested `CpuLockCell` shows up as `< locked >`.
    pub(crate) fn debug_fmt_with_ref<'a, F: 'a + Fn(&T, &mut fmt::Formatter) -> fmt::Result>(
        &'a self,
        f: F,
    ) -> impl fmt::Debug + 'a {
        struct DebugFmtWithRef<'a, Traits, T: ?Sized, F> {
            cell: &'a CpuLockCell<Traits, T>,
            f: F,
        }

        impl<Traits: PortThreading, T: ?Sized, F: Fn(&T, &mut fmt::Formatter) -> fmt::Result>
            fmt::Debug for DebugFmtWithRef<'_, Traits, T, F>
        {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if let Ok(lock) = lock_cpu::<Traits>() {
                    f.write_str("CpuLockCell(")?;
                    (self.f)(self.cell.0.read(&*lock), f)?;
                    f.write_str(")")
                } else {
                    f.write_str("CpuLockCell(< locked >)")
                }
            }
        }

        DebugFmtWithRef { cell: self, f }
    }
}

impl<Traits: PortThreading, T: fmt::Debug> fmt::Debug for CpuLockCell<Traits, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.debug_fmt_with_ref(|x, f| x.fmt(f)).fmt(f)
    }
}

// `read`, `write`, and `replace` come from `UnsyncTokenLock`
impl<Traits, T> ops::Deref for CpuLockCell<Traits, T> {
    type Target = UnsyncTokenLock<T, SingletonTokenId<CpuLockTag<Traits>>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Enter CPU Lock. Fails with `BadContext` if it's already active, which
/// includes every call made from inside a kernel operation.
pub(crate) fn lock_cpu<Traits: PortThreading>() -> Result<CpuLockGuard<Traits>, BadContextError> {
    // Safety: The kernel owns CPU Lock
    if !unsafe { Traits::try_enter_cpu_lock() } {
        return Err(BadContextError::BadContext);
    }

    debug_assert!(Traits::is_cpu_lock_active());

    Ok(CpuLockGuard {
        // Safety: CPU Lock was inactive a moment ago, so no other guard (and
        //         no other token) exists
        token: unsafe { CpuLockToken::new_unchecked() },
    })
}

/// Proof of an active CPU Lock. Leaves CPU Lock when dropped.
pub(crate) struct CpuLockGuard<Traits: PortThreading> {
    token: CpuLockToken<Traits>,
}

impl<Traits: PortThreading> CpuLockGuard<Traits> {
    pub(crate) fn borrow_mut(&mut self) -> CpuLockTokenRefMut<'_, Traits> {
        self.token.borrow_mut()
    }
}

impl<Traits: PortThreading> Drop for CpuLockGuard<Traits> {
    fn drop(&mut self) {
        // Safety: We entered CPU Lock in `lock_cpu`
        unsafe { Traits::leave_cpu_lock() };
    }
}

impl<Traits: PortThreading> ops::Deref for CpuLockGuard<Traits> {
    type Target = CpuLockToken<Traits>;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl<Traits: PortThreading> ops::DerefMut for CpuLockGuard<Traits> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}
