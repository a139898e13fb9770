//! Decides whether a source file holds audio that should be transcoded.
//!
//! Classification looks at the first [`SNIFF_LEN`] bytes of the file and matches them against
//! the audio and video signatures of the WHATWG MIME sniffing tables. Files whose name ends in
//! `.flac` count as audio regardless of content.

use std::path::Path;

use tokio::io::AsyncReadExt as _;
use tracing::trace;

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 512;

/// A byte pattern compared under a mask, anchored at offset zero.
struct MaskedSig {
    mask: &'static [u8],
    pat: &'static [u8],
}

impl MaskedSig {
    fn matches(&self, data: &[u8]) -> bool {
        data.len() >= self.pat.len()
            && self
                .mask
                .iter()
                .zip(self.pat)
                .zip(data)
                .all(|((&m, &p), &d)| d & m == p)
    }
}

const SIGNATURES: &[MaskedSig] = &[
    // AIFF
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pat: b"FORM\x00\x00\x00\x00AIFF",
    },
    // MP3 with an ID3v2 tag
    MaskedSig {
        mask: b"\xFF\xFF\xFF",
        pat: b"ID3",
    },
    // Ogg
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pat: b"OggS\x00",
    },
    // Standard MIDI
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF",
        pat: b"MThd\x00\x00\x00\x06",
    },
    // Sun/NeXT audio
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF",
        pat: b".snd",
    },
    // AVI
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pat: b"RIFF\x00\x00\x00\x00AVI ",
    },
    // WAVE
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pat: b"RIFF\x00\x00\x00\x00WAVE",
    },
    // FLAC
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF",
        pat: b"fLaC",
    },
    // WebM / Matroska EBML header
    MaskedSig {
        mask: b"\xFF\xFF\xFF\xFF",
        pat: b"\x1A\x45\xDF\xA3",
    },
];

/// MPEG audio frame header without a tag: 11 sync bits and a non-reserved layer.
fn is_mpeg_frame(data: &[u8]) -> bool {
    matches!(data, [0xFF, b, ..] if b & 0xE0 == 0xE0 && b & 0x06 != 0)
}

/// ISO base media file starting with an `ftyp` box that names an `mp4` brand.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }

    // Brands start at 8; bytes 12..16 are the minor version.
    (8..box_size)
        .step_by(4)
        .filter(|&st| st != 12)
        .any(|st| data.get(st..st + 3) == Some(b"mp4".as_slice()))
}

/// Returns `true` if `data` starts with a known audio or video signature.
#[must_use]
pub fn sniff(data: &[u8]) -> bool {
    SIGNATURES.iter().any(|sig| sig.matches(data)) || is_mpeg_frame(data) || is_mp4(data)
}

fn has_flac_suffix(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().ends_with(b".flac")
}

/// Returns `true` if the file at `path` should be presented as transcodable audio.
///
/// A file that cannot be opened or read is never audio.
pub async fn is_audio(path: &Path) -> bool {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let read = async {
        let file = tokio::fs::File::open(path).await?;
        file.take(SNIFF_LEN as u64).read_to_end(&mut head).await
    };
    if let Err(e) = read.await {
        trace!(path = %path.display(), error = %e, "unreadable, not audio");
        return false;
    }

    sniff(&head) || has_flac_suffix(path)
}
