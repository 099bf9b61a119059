use crate::loom;

pub(crate) mod mutex;
pub(crate) mod panic;

/// Exponential backoff for the spinning node lock.
///
/// Each round spins an exponentially growing number of `spin_loop` hints
/// (capped after a few rounds) and then yields the thread, when there is a
/// thread to yield.
#[derive(Debug)]
#[cfg_attr(feature = "std", allow(dead_code))]
pub(crate) struct Backoff(u8);

// === impl Backoff ===

#[cfg_attr(feature = "std", allow(dead_code))]
impl Backoff {
    const MAX_SPINS: u8 = 3;
    const MAX_YIELDS: u8 = 6;

    #[inline]
    pub(crate) fn new() -> Self {
        Self(0)
    }

    #[inline(always)]
    pub(crate) fn spin_yield(&mut self) {
        if self.0 <= Self::MAX_SPINS || cfg!(not(any(feature = "std", test))) {
            #[cfg(not(all(loom, test)))]
            for _ in 0..1 << self.0 {
                loom::hint::spin_loop();
            }

            test_println!("hint::spin_loop() (x{})", 1 << self.0);
        }

        test_println!("thread::yield_now()");
        #[cfg(any(all(loom, test), feature = "std"))]
        loom::thread::yield_now();

        if self.0 <= Self::MAX_YIELDS {
            self.0 += 1;
        }
    }
}
