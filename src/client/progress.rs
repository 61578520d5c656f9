//! Upload progress accounting.
//!
//! [`ProgressTracker`] turns byte counts into integer percentages that never
//! go backwards. [`ProgressReporter`] shares a tracker between the upload
//! body stream and the caller's callback, and can be closed so nothing is
//! delivered once the submission has resolved.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream::{self, Stream, StreamExt};

/// Size of the chunks an upload body is streamed in.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Callback receiving upload percentages in [0, 100].
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Converts byte counts into monotonic percentages.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    total: Option<u64>,
    loaded: u64,
    last: Option<u8>,
}

impl ProgressTracker {
    /// Creates a tracker for an upload of `total` bytes, if known.
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            loaded: 0,
            last: None,
        }
    }

    /// Records an absolute progress observation.
    ///
    /// Returns the percentage to emit, or None when the total is unknown or
    /// the value would not move past the last one emitted.
    pub fn observe(&mut self, loaded: u64, total: Option<u64>) -> Option<u8> {
        let total = match total {
            Some(t) if t > 0 => t,
            _ => return None,
        };
        let loaded = loaded.min(total);
        let percent = (loaded as u128 * 100 / total as u128) as u8;

        if let Some(last) = self.last {
            if percent <= last {
                return None;
            }
        }
        self.last = Some(percent);
        Some(percent)
    }

    /// Records `bytes` more bytes sent.
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.loaded = self.loaded.saturating_add(bytes);
        self.observe(self.loaded, self.total)
    }

    /// Bytes recorded so far through `advance`.
    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    /// Last percentage emitted.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

struct ReporterInner {
    tracker: Mutex<ProgressTracker>,
    callback: ProgressCallback,
    closed: AtomicBool,
}

/// Shared, closable progress sink for one submission.
///
/// Cloning shares the same tracker. A reporter without a callback discards
/// everything.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    inner: Option<Arc<ReporterInner>>,
}

impl ProgressReporter {
    /// Creates a reporter for an upload of `total` bytes.
    pub fn new(callback: Option<ProgressCallback>, total: Option<u64>) -> Self {
        Self {
            inner: callback.map(|callback| {
                Arc::new(ReporterInner {
                    tracker: Mutex::new(ProgressTracker::new(total)),
                    callback,
                    closed: AtomicBool::new(false),
                })
            }),
        }
    }

    /// Creates a reporter that never calls anything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Records `bytes` more bytes sent.
    pub fn advance(&self, bytes: u64) {
        self.update(|tracker| tracker.advance(bytes));
    }

    /// Records an absolute progress observation.
    pub fn observe(&self, loaded: u64, total: Option<u64>) {
        self.update(|tracker| tracker.observe(loaded, total));
    }

    /// Stops all further delivery. Returns once no callback is running.
    pub fn close(&self) {
        if let Some(inner) = &self.inner {
            let _guard = inner.tracker.lock().unwrap_or_else(|e| e.into_inner());
            inner.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner
            .as_ref()
            .map_or(false, |inner| inner.closed.load(Ordering::SeqCst))
    }

    fn update(&self, step: impl FnOnce(&mut ProgressTracker) -> Option<u8>) {
        let Some(inner) = &self.inner else {
            return;
        };
        // The callback runs under the lock so events reach it in order.
        let mut tracker = inner.tracker.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(percent) = step(&mut *tracker) {
            (inner.callback)(percent);
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.inner.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Streams `data` in fixed-size chunks, advancing `reporter` as each chunk
/// is handed to the transport.
pub fn chunked_upload(
    data: Arc<[u8]>,
    reporter: ProgressReporter,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    let len = data.len();
    stream::iter((0..len).step_by(UPLOAD_CHUNK_SIZE)).map(move |start| {
        let end = (start + UPLOAD_CHUNK_SIZE).min(len);
        reporter.advance((end - start) as u64);
        Ok(data[start..end].to_vec())
    })
}
