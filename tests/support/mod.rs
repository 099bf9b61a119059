#![allow(dead_code)]
use handover::ConcurrentList;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Collects the list's elements, front to back.
pub fn contents<T: Clone>(list: &ConcurrentList<T>) -> Vec<T> {
    let mut contents = Vec::new();
    list.for_each(|value| contents.push(value.clone()));
    contents
}

/// A value that counts how many times it has been dropped.
#[derive(Debug)]
pub struct Counted {
    pub value: usize,
    drops: Arc<AtomicUsize>,
}

impl Counted {
    pub fn new(value: usize, drops: &Arc<AtomicUsize>) -> Self {
        Self {
            value,
            drops: drops.clone(),
        }
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}
