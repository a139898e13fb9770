//! Random-access reads over a sequential, unseekable byte source.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tokio::sync::Mutex;
use tracing::trace;

/// The result of one [`GrowableBuffer::read_at`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The requested range, clipped to what the source has produced.
    pub data: Bytes,
    /// `true` when `data` is empty, i.e. nothing exists at or past the requested offset.
    pub end_of_stream: bool,
    /// Total number of bytes buffered after this call.
    pub buffered: u64,
}

struct Inner<S> {
    buffer: Vec<u8>,
    /// `None` once the source has reported end of input.
    source: Option<S>,
}

/// A buffer that only grows, fed on demand from `S`.
///
/// Every byte the source yields is kept, so any range that was served once is served again
/// identically. Reads that reach past the buffered length pull more bytes from the source first.
/// All access is serialized by one async mutex; the source is never read concurrently.
/// Whether the source is exhausted can be asked without that mutex, so callers are not held up
/// by a read that is waiting on a slow source.
pub struct GrowableBuffer<S> {
    inner: Mutex<Inner<S>>,
    exhausted: AtomicBool,
}

impl<S: AsyncRead + Unpin + Send> GrowableBuffer<S> {
    /// Wrap `source`. Nothing is read until the first [`read_at`](Self::read_at).
    pub fn new(source: S) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: Vec::new(),
                source: Some(source),
            }),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Return up to `size` bytes starting at `offset`.
    ///
    /// If the buffer is shorter than `offset + size`, the missing bytes are requested from the
    /// source first. A source that runs dry early is not an error; the result is just shorter.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the source. Bytes read before the failure stay buffered.
    pub async fn read_at(&self, offset: u64, size: u32) -> std::io::Result<Chunk> {
        let mut inner = self.inner.lock().await;
        let Inner { buffer, source } = &mut *inner;

        let end = offset.saturating_add(u64::from(size));
        let have = buffer.len() as u64;
        if have < end
            && let Some(src) = source.as_mut()
        {
            let want = end - have;
            let got = src.take(want).read_to_end(buffer).await?;
            trace!(want, got, buffered = buffer.len(), "filled from source");
            if (got as u64) < want {
                *source = None;
                self.exhausted.store(true, Ordering::Release);
            }
        }

        let len = buffer.len() as u64;
        let lo = usize::try_from(offset.min(len)).unwrap_or(buffer.len());
        let hi = usize::try_from(end.min(len)).unwrap_or(buffer.len());
        let data = Bytes::copy_from_slice(&buffer[lo..hi]);
        Ok(Chunk {
            end_of_stream: data.is_empty(),
            data,
            buffered: len,
        })
    }

    /// Number of bytes buffered so far.
    pub async fn len(&self) -> u64 {
        self.inner.lock().await.buffer.len() as u64
    }

    /// Returns `true` if nothing has been buffered yet.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.buffer.is_empty()
    }

    /// Returns `true` once the source has reported end of input.
    ///
    /// Never waits on an in-flight read.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }
}
