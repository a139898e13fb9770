//! Presenting a music library with audio files transcoded on open.
//!
//! [`node::Catalog`] maps the real tree to virtual nodes, [`provider::CodecProvider`] hands
//! those nodes to [`crate::fs::AsyncFs`], and [`handle::CodecHandle`] serves reads either
//! straight from disk or from a [`session::TranscodeSession`].

/// Audio detection by content sniffing.
pub mod classify;
/// The external encoder process.
pub mod encoder;
pub mod error;
/// Random-access buffer over a sequential source.
pub mod growable;
/// Open-file readers.
pub mod handle;
pub mod node;
/// Untranscoded reads.
pub mod passthrough;
pub mod provider;
/// A running transcode.
pub mod session;

pub use encoder::Encoder;
pub use error::CodecError;
pub use node::{Catalog, Node};
pub use provider::CodecProvider;
