//! The per-node lock.
//!
//! With the `std` feature this is `std::sync::Mutex`, wrapped so that a
//! poisoned lock is recovered rather than propagated; without it, a spinning
//! lock built on an `AtomicBool`. Both hand out RAII guards, so a panicking
//! predicate or visitor always releases the locks it was holding.

feature! {
    #![feature = "std"]
    pub(crate) use self::std_impl::*;
    mod std_impl;
}

#[cfg(not(feature = "std"))]
pub(crate) use self::spin_impl::*;

#[cfg(any(not(feature = "std"), test))]
mod spin_impl;
