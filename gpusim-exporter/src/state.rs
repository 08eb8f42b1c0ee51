//! Shared mutable state
//!
//! Single lock-guarded alias used for every shared value in the
//! exporter: the store's current snapshot handle and the listener
//! states. Everything else is immutable after startup.

use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
