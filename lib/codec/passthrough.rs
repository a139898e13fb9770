//! Direct reads from a source file that needs no transcoding.

use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};
use tokio::sync::Mutex;

use super::error::CodecError;

/// Serves reads straight from the real file.
pub struct PassthroughReader {
    /// `None` after [`close`](Self::close).
    file: Mutex<Option<tokio::fs::File>>,
}

impl PassthroughReader {
    /// Open `path` for reading.
    pub async fn open(path: &Path) -> Result<Self, CodecError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            file: Mutex::new(Some(file)),
        })
    }

    /// Positioned read of up to `size` bytes. Hitting end of file yields a short result.
    pub async fn read(&self, offset: u64, size: u32) -> Result<Bytes, CodecError> {
        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| std::io::Error::from_raw_os_error(libc::EBADF))?;

        let mut buffer = vec![0u8; size as usize];
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut filled = 0;
        while filled < buffer.len() {
            let nbytes = file.read(&mut buffer[filled..]).await?;
            if nbytes == 0 {
                break;
            }
            filled += nbytes;
        }

        buffer.truncate(filled);
        Ok(Bytes::from(buffer))
    }

    /// Close the descriptor.
    pub async fn close(&self) {
        drop(self.file.lock().await.take());
    }
}
