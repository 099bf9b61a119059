#![cfg_attr(feature = "std", allow(dead_code))]
use crate::{
    loom::{
        atomic::{AtomicBool, Ordering::*},
        cell::{MutPtr, UnsafeCell},
    },
    util::Backoff,
};
use core::{fmt, marker::PhantomData, ops};

/// A spinning lock for `no_std` builds.
///
/// Node locks are only ever held for the duration of one coupling step, so
/// contention is short-lived and spinning (then yielding) is adequate.
pub(crate) struct Mutex<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

pub(crate) struct MutexGuard<'lock, T> {
    locked: &'lock AtomicBool,
    data: MutPtr<T>,
    // the guard hands out `&mut T` for as long as it is held, so it borrows
    // the data as well as the flag (and `T: 'lock` is implied)
    _data: PhantomData<&'lock mut T>,
}

impl<T> Mutex<T> {
    #[cfg(not(all(test, loom)))]
    pub(crate) const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[cfg(all(test, loom))]
    pub(crate) fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        test_println!("locking {}...", core::any::type_name::<T>());
        let mut backoff = Backoff::new();
        while test_dbg!(self.locked.compare_exchange(false, true, AcqRel, Acquire)).is_err() {
            while self.locked.load(Relaxed) {
                backoff.spin_yield();
            }
        }

        test_println!("-> locked {}!", core::any::type_name::<T>());
        MutexGuard {
            locked: &self.locked,
            data: self.data.get_mut(),
            _data: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.locked.load(Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> MutexGuard<'_, T> {
    #[inline]
    fn get_ref(&self) -> &T {
        unsafe {
            // Safety: the mutex is locked, so we cannot create a concurrent
            // mutable access, and we have a borrow on the lock's state boolean,
            // so it will not be dropped while the guard exists.
            &*self.data.deref()
        }
    }
}

impl<T> ops::Deref for MutexGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        self.get_ref()
    }
}

impl<T> ops::DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe {
            // Safety: the mutex is locked and this guard is borrowed mutably,
            // so this is the only access to the data.
            &mut *self.data.deref()
        }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        test_dbg!(self.locked.store(false, Release));
        test_println!("unlocked!");
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get_ref().fmt(f)
    }
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}
unsafe impl<T: Send> Send for MutexGuard<'_, T> {}
unsafe impl<T: Send + Sync> Sync for MutexGuard<'_, T> {}
