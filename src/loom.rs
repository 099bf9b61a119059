pub(crate) use self::inner::*;

#[cfg(all(loom, test))]
mod inner {
    pub(crate) mod atomic {
        pub use loom::sync::atomic::*;
        pub use std::sync::atomic::Ordering;
    }

    pub(crate) use loom::{cell, sync, thread};
    use std::{cell::RefCell, fmt::Write};

    std::thread_local! {
        static TRACE_BUF: RefCell<String> = RefCell::new(String::new());
    }

    pub(crate) fn traceln(args: std::fmt::Arguments) {
        let mut args = Some(args);
        TRACE_BUF
            .try_with(|buf| {
                let mut buf = buf.borrow_mut();
                let _ = buf.write_fmt(args.take().unwrap());
                let _ = buf.write_char('\n');
            })
            .unwrap_or_else(|_| println!("{}", args.take().unwrap()))
    }

    pub(crate) fn run_builder(
        builder: loom::model::Builder,
        model: impl Fn() + Sync + Send + std::panic::UnwindSafe + 'static,
    ) {
        use std::{
            env, io,
            sync::atomic::{AtomicUsize, Ordering},
        };
        use tracing_subscriber::{filter::Targets, fmt, prelude::*};

        struct TracebufWriter;

        impl<'a> fmt::writer::MakeWriter<'a> for TracebufWriter {
            type Writer = Self;
            fn make_writer(&'a self) -> Self::Writer {
                TracebufWriter
            }
        }

        impl io::Write for TracebufWriter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let len = buf.len();
                let s = std::str::from_utf8(buf)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                TRACE_BUF.with(|buf| buf.borrow_mut().push_str(s));
                Ok(len)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        const LOOM_LOG: &str = "LOOM_LOG";

        if let Some(filter) = env::var(LOOM_LOG)
            .ok()
            .and_then(|var| match var.parse::<Targets>() {
                Err(e) => {
                    eprintln!("invalid {}={:?}: {}", LOOM_LOG, var, e);
                    None
                }
                Ok(targets) => Some(targets),
            })
        {
            let _ = fmt::Subscriber::builder()
                .with_writer(TracebufWriter)
                .without_time()
                .finish()
                .with(filter)
                .try_init();
        }

        let current_iteration = std::sync::Arc::new(AtomicUsize::new(1));
        let result = {
            let current_iteration = current_iteration.clone();
            std::panic::catch_unwind(move || {
                builder.check(move || {
                    traceln(format_args!(
                        "\n---- {} iteration {} ----",
                        std::thread::current().name().unwrap_or("<unknown test>"),
                        current_iteration.fetch_add(1, Ordering::Relaxed)
                    ));

                    model();
                    // the iteration passed, so nobody needs its trace
                    TRACE_BUF.with(|buf| buf.borrow_mut().clear());
                })
            })
        };

        if let Err(panic) = result {
            TRACE_BUF
                .try_with(|buf| {
                    if let Ok(buf) = buf.try_borrow() {
                        eprint!("{}", buf);
                    } else {
                        eprint!("trace buf already mutably borrowed?");
                    }
                })
                .unwrap_or_else(|e| eprintln!("trace buf already torn down: {}", e));
            eprintln!(
                "test '{}' panicked after {} iterations!",
                std::thread::current().name().unwrap_or("<unknown test>"),
                current_iteration.load(Ordering::Relaxed),
            );
            std::panic::resume_unwind(panic);
        }
    }

    pub(crate) fn model(model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static) {
        run_builder(loom::model::Builder::default(), model)
    }

    /// Runs `model` with a bounded number of preemptions.
    ///
    /// Lists with more than a couple of nodes blow up the state space, so the
    /// longer traversal tests cap the preemption bound instead of exploring
    /// every interleaving.
    pub(crate) fn model_bounded(
        max_preemptions: usize,
        model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static,
    ) {
        let mut builder = loom::model::Builder::default();
        builder.preemption_bound = Some(max_preemptions);
        run_builder(builder, model)
    }

    pub(crate) mod alloc {
        use loom::alloc;
        use std::fmt;
        /// Track allocations, detecting leaks and double frees of list
        /// elements.
        pub struct Track<T>(alloc::Track<T>);

        impl<T> Track<T> {
            #[inline(always)]
            pub fn new(value: T) -> Track<T> {
                Track(alloc::Track::new(value))
            }

            #[inline(always)]
            pub fn get_ref(&self) -> &T {
                self.0.get_ref()
            }
        }

        impl<T: fmt::Debug> fmt::Debug for Track<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    }
}

#[cfg(not(all(loom, test)))]
mod inner {
    #![allow(dead_code)]

    pub(crate) use core::sync::atomic;

    #[cfg(feature = "std")]
    pub(crate) use std::thread;

    pub(crate) mod hint {
        pub(crate) use core::hint::spin_loop;
    }

    pub(crate) mod cell {
        /// An `UnsafeCell` with the same access API as `loom::cell::UnsafeCell`.
        #[derive(Debug)]
        pub(crate) struct UnsafeCell<T>(core::cell::UnsafeCell<T>);

        /// A raw mutable pointer into an [`UnsafeCell`], mirroring
        /// `loom::cell::MutPtr`.
        pub(crate) struct MutPtr<T: ?Sized>(*mut T);

        impl<T> UnsafeCell<T> {
            pub(crate) const fn new(data: T) -> UnsafeCell<T> {
                UnsafeCell(core::cell::UnsafeCell::new(data))
            }

            #[inline(always)]
            pub(crate) fn get_mut(&self) -> MutPtr<T> {
                MutPtr(self.0.get())
            }
        }

        impl<T: ?Sized> MutPtr<T> {
            /// # Safety
            ///
            /// The caller must ensure no other reference to the cell's
            /// contents exists for the lifetime of the returned borrow.
            #[inline(always)]
            #[allow(clippy::mut_from_ref)]
            pub(crate) unsafe fn deref(&self) -> &mut T {
                &mut *self.0
            }
        }
    }

    #[cfg(all(test, feature = "std"))]
    pub(crate) fn model(model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static) {
        model()
    }

    #[cfg(all(test, feature = "std"))]
    pub(crate) fn model_bounded(
        _max_preemptions: usize,
        model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static,
    ) {
        model()
    }

    pub(crate) mod alloc {
        /// Track allocations, detecting leaks
        #[derive(Debug, Default)]
        pub struct Track<T> {
            value: T,
        }

        impl<T> Track<T> {
            #[inline(always)]
            pub fn new(value: T) -> Track<T> {
                Track { value }
            }

            #[inline(always)]
            pub fn get_ref(&self) -> &T {
                &self.value
            }
        }
    }

    #[cfg(feature = "std")]
    pub(crate) fn traceln(args: std::fmt::Arguments) {
        eprintln!("{}", args);
    }

    #[cfg(not(feature = "std"))]
    pub(crate) fn traceln(_: core::fmt::Arguments) {}
}
