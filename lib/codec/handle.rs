//! The reader behind every open file handle.

use bytes::Bytes;

use super::passthrough::PassthroughReader;
use super::session::TranscodeSession;
use crate::fs::FileReader;

/// What an open virtual file reads from.
pub enum CodecHandle {
    /// The source already has the target format.
    Passthrough(PassthroughReader),
    /// The source is being transcoded.
    Transcode(TranscodeSession),
}

impl FileReader for CodecHandle {
    async fn read(&self, offset: u64, size: u32) -> Result<Bytes, std::io::Error> {
        let data = match self {
            Self::Passthrough(reader) => reader.read(offset, size).await?,
            Self::Transcode(session) => session.read(offset, size).await?,
        };
        Ok(data)
    }

    async fn close(&self) -> Result<(), std::io::Error> {
        match self {
            Self::Passthrough(reader) => reader.close().await,
            Self::Transcode(session) => session.release().await?,
        }
        Ok(())
    }
}
