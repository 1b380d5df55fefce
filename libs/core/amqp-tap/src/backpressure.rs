//! Bridge between a push source (broker deliveries) and a pull consumer.
//!
//! The broker pushes deliveries as fast as it likes; the reader of the tap
//! pulls records when it is ready. [`BackpressureAdapter`] sits between them:
//!
//! - every offered item is buffered in arrival order, nothing is dropped while
//!   the adapter is accepting
//! - once the buffer reaches the high-water mark the adapter reports itself
//!   paused; the next pull clears the flag
//! - after [`close_input`](BackpressureAdapter::close_input) new offers are
//!   rejected, but already-buffered items remain readable
//! - after [`finish`](BackpressureAdapter::finish) the reader sees end of stream
//!   once the buffer drains
//!
//! The adapter is single-consumer: one task pulls, any number may offer.

use futures::Stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Outcome of [`BackpressureAdapter::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Buffered, consumer is keeping up
    Accepted,
    /// Buffered, and the buffer just reached the high-water mark
    Paused,
    /// Buffered while already paused
    Backlogged,
    /// Not buffered: input has been closed
    Rejected,
}

impl Offer {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Offer::Rejected)
    }
}

struct Buffer<T> {
    items: VecDeque<T>,
    paused: bool,
    input_closed: bool,
    finished: bool,
}

struct Shared<T> {
    buffer: Mutex<Buffer<T>>,
    ready: Notify,
    high_water_mark: usize,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Buffer<T>> {
        // A panic while holding the lock cannot leave the buffer half-updated
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Buffered push-to-pull adapter. Cloning shares the same buffer.
pub struct BackpressureAdapter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BackpressureAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for BackpressureAdapter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buffer = self.shared.lock();
        f.debug_struct("BackpressureAdapter")
            .field("buffered", &buffer.items.len())
            .field("high_water_mark", &self.shared.high_water_mark)
            .field("paused", &buffer.paused)
            .field("input_closed", &buffer.input_closed)
            .field("finished", &buffer.finished)
            .finish()
    }
}

impl<T> BackpressureAdapter<T> {
    /// Create an adapter that pauses once `high_water_mark` items are buffered.
    /// A mark of zero is treated as one.
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                buffer: Mutex::new(Buffer {
                    items: VecDeque::new(),
                    paused: false,
                    input_closed: false,
                    finished: false,
                }),
                ready: Notify::new(),
                high_water_mark: high_water_mark.max(1),
            }),
        }
    }

    pub fn high_water_mark(&self) -> usize {
        self.shared.high_water_mark
    }

    /// Buffer an item for the consumer.
    pub fn offer(&self, item: T) -> Offer {
        let outcome = {
            let mut buffer = self.shared.lock();
            if buffer.input_closed {
                return Offer::Rejected;
            }

            buffer.items.push_back(item);
            if buffer.paused {
                Offer::Backlogged
            } else if buffer.items.len() >= self.shared.high_water_mark {
                buffer.paused = true;
                Offer::Paused
            } else {
                Offer::Accepted
            }
        };

        self.shared.ready.notify_one();
        outcome
    }

    /// Pull the next item, waiting until one is available.
    ///
    /// Returns `None` once the adapter is finished and drained, and keeps
    /// returning `None` after that.
    pub async fn next(&self) -> Option<T> {
        loop {
            // Registered before inspecting the buffer; a notify_one between the
            // check and the await leaves a permit behind.
            let notified = self.shared.ready.notified();
            {
                let mut buffer = self.shared.lock();
                buffer.paused = false;
                if let Some(item) = buffer.items.pop_front() {
                    return Some(item);
                }
                if buffer.finished {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Pull without waiting. `None` means nothing is buffered right now.
    pub fn try_next(&self) -> Option<T> {
        let mut buffer = self.shared.lock();
        buffer.paused = false;
        buffer.items.pop_front()
    }

    /// Stop accepting new items. Buffered items stay readable.
    pub fn close_input(&self) {
        self.shared.lock().input_closed = true;
    }

    /// Signal end of stream. Returns `false` if it was already signalled.
    pub fn finish(&self) -> bool {
        let first = {
            let mut buffer = self.shared.lock();
            buffer.input_closed = true;
            !std::mem::replace(&mut buffer.finished, true)
        };
        if first {
            self.shared.ready.notify_one();
        }
        first
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> BackpressureAdapter<T> {
    /// Consume the adapter as a [`Stream`] that ends at end of stream.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static {
        futures::stream::unfold(self, |adapter| async move {
            let item = adapter.next().await?;
            Some((item, adapter))
        })
    }
}
