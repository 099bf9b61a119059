//! A singly-linked list for concurrent use, with one lock per node.
//!
//! [`ConcurrentList`] never serializes the whole structure behind a single
//! lock. Instead, every traversal walks the chain with *hand-over-hand*
//! locking (also known as lock coupling): it locks the next node before
//! releasing the one it is on, so it never holds more than two node locks
//! and never loses its place while other threads insert, update, or remove
//! elsewhere in the list.
//!
//! # Features
//!
//! - `std` (default): node locks are `std::sync::Mutex`es. Locks poisoned by
//!   a panicking callback are recovered, so one panic does not make the list
//!   unusable.
//! - `alloc`: builds on `no_std` targets with an allocator. Node locks are
//!   spin locks.
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;

mod loom;
mod util;

feature! {
    #![feature = "alloc"]
    extern crate alloc;

    mod list;
    pub use self::list::{ConcurrentList, Update};
}
