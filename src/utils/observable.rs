//! A minimal latest-value reactive cell.
//!
//! The pipeline publishes `is_open`, `is_streaming` and `last_error` through
//! these cells. Subscribers always observe the latest value plus every
//! subsequent change; there is no back-pressure and no history.

use tokio::sync::watch;

/// A value cell that notifies subscribers on every `set`.
///
/// Cloning the observable clones the handle, not the value; all clones share
/// the same underlying cell.
#[derive(Clone)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Creates a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Stores a new value and notifies all subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Returns a receiver that yields the current value immediately and
    /// every change after it.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}
