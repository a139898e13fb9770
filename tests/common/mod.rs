#![allow(dead_code, missing_docs, clippy::unwrap_used)]

pub mod async_fs_mocks;

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use codec_fs::codec::encoder::INPUT_PLACEHOLDER;
use codec_fs::codec::{Catalog, CodecProvider, Encoder};

/// An MP3 header with an empty ID3v2 tag, enough for the classifier.
pub const ID3_HEADER: &[u8] = b"ID3\x03\x00\x00\x00\x00\x00\x00";

/// An encoder that "transcodes" by copying the source verbatim.
pub fn cat_encoder() -> Encoder {
    Encoder::new("cat", [INPUT_PLACEHOLDER], "ogg")
}

/// An encoder that copies the source, then exits with `code`.
pub fn failing_encoder(code: u8) -> Encoder {
    Encoder::new(
        "sh",
        [
            "-c".to_owned(),
            format!("cat \"$0\"; exit {code}"),
            INPUT_PLACEHOLDER.to_owned(),
        ],
        "ogg",
    )
}

/// An encoder whose output never ends.
pub fn endless_encoder() -> Encoder {
    Encoder::new("yes", ["{format}"], "ogg")
}

/// An encoder that writes `abc`, then hangs without closing its output.
pub fn stalled_encoder() -> Encoder {
    Encoder::new("sh", ["-c", "printf abc; exec sleep 1000"], "ogg")
}

/// A throwaway music library on disk.
pub struct Library {
    dir: TempDir,
}

impl Library {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write an ID3-tagged file followed by `body`. Returns the full contents written.
    pub fn audio(&self, rel: &str, body: &[u8]) -> Vec<u8> {
        let mut contents = ID3_HEADER.to_vec();
        contents.extend_from_slice(body);
        self.file(rel, &contents);
        contents
    }

    pub fn file(&self, rel: &str, contents: &[u8]) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    pub fn dir(&self, rel: &str) {
        std::fs::create_dir_all(self.path(rel)).unwrap();
    }

    pub fn catalog(&self, encoder: Encoder) -> Catalog {
        Catalog::new(self.root().to_path_buf(), encoder)
    }

    pub fn provider(&self, encoder: Encoder) -> CodecProvider {
        CodecProvider::new(self.catalog(encoder), 1000, 1000)
    }
}

/// `n` bytes of a repeating, easy-to-check pattern.
pub fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}
