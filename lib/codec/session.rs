//! A transcode in progress, owned by one open file handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::process::{Child, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::encoder::EncoderProcess;
use super::error::CodecError;
use super::growable::GrowableBuffer;
use crate::cache::SizeCache;

/// One encoder process and the buffer its output is collected into.
///
/// Reads are served from a [`GrowableBuffer`] over the encoder's stdout. The first read that
/// comes back empty records the stream's total length in the [`SizeCache`] under `identity`.
pub struct TranscodeSession {
    identity: PathBuf,
    source: PathBuf,
    sizes: Arc<SizeCache>,
    stream: GrowableBuffer<ChildStdout>,
    child: Mutex<Option<Child>>,
    released: AtomicBool,
}

impl TranscodeSession {
    /// Wrap a freshly spawned encoder.
    ///
    /// `identity` is the virtual path the size is published under; `source` is the real file
    /// being encoded and only used for diagnostics.
    pub fn new(
        identity: PathBuf,
        source: PathBuf,
        process: EncoderProcess,
        sizes: Arc<SizeCache>,
    ) -> Self {
        let EncoderProcess { child, stdout } = process;
        Self {
            identity,
            source,
            sizes,
            stream: GrowableBuffer::new(stdout),
            child: Mutex::new(Some(child)),
            released: AtomicBool::new(false),
        }
    }

    /// Read up to `size` bytes at `offset`, pulling from the encoder as needed.
    ///
    /// An empty result marks end of stream. A stream cut short by [`release`](Self::release)
    /// never publishes a size.
    pub async fn read(&self, offset: u64, size: u32) -> Result<Bytes, CodecError> {
        let chunk = self.stream.read_at(offset, size).await?;
        if chunk.end_of_stream && !self.released.load(Ordering::Acquire) {
            self.sizes.publish(&self.identity, chunk.buffered);
            debug!(
                path = %self.identity.display(),
                size = chunk.buffered,
                "end of stream, size published"
            );
        }
        Ok(chunk.data)
    }

    /// Reap the encoder.
    ///
    /// If the whole stream was consumed, waits for the encoder and fails if it exited
    /// unsuccessfully. If the handle is released early, the encoder is killed, which also ends
    /// any read still waiting on it; that is not an error unless the encoder had already failed
    /// on its own. Never waits on the stream buffer.
    pub async fn release(&self) -> Result<(), CodecError> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        let status = if self.stream.is_exhausted() {
            child.wait().await?
        } else if let Some(status) = child.try_wait()? {
            status
        } else {
            debug!(source = %self.source.display(), "released early, stopping encoder");
            self.released.store(true, Ordering::Release);
            child.start_kill()?;
            let status = child.wait().await?;
            debug!(%status, "encoder stopped");
            return Ok(());
        };

        debug!(source = %self.source.display(), %status, "encoder reaped");
        if status.success() {
            Ok(())
        } else {
            warn!(source = %self.source.display(), %status, "encoder failed");
            Err(CodecError::EncoderExit(status))
        }
    }
}
