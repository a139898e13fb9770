#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::ffi::{OsStr, OsString};

use codec_fs::codec::{CodecError, Node};

use common::{Library, cat_encoder};

fn names(listing: &[(OsString, Node)]) -> Vec<&str> {
    listing
        .iter()
        .map(|(name, _)| name.to_str().unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn audio_is_listed_renamed_and_mapped() {
    let lib = Library::new();
    lib.audio("track.mp3", b"frames");
    let catalog = lib.catalog(cat_encoder());

    let listing = catalog
        .list(&Node::Directory(lib.root().to_path_buf()))
        .await
        .unwrap();

    assert_eq!(names(&listing), vec!["track.ogg"]);
    assert_eq!(listing[0].1, Node::File(lib.path("track.ogg")));
    assert_eq!(
        catalog.names().resolve(&lib.path("track.ogg")),
        Some(lib.path("track.mp3"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_listings_are_identical() {
    let lib = Library::new();
    lib.audio("a.mp3", b"a");
    lib.audio("b.wav", b"b");
    lib.file("cover.jpg", b"\xFF\xD8\xFF\xE0 not audio");
    lib.dir("disc2");
    let catalog = lib.catalog(cat_encoder());
    let root = Node::Directory(lib.root().to_path_buf());

    let first = catalog.list(&root).await.unwrap();
    let second = catalog.list(&root).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(names(&first), vec!["a.ogg", "b.ogg", "cover.jpg", "disc2"]);
    assert_eq!(catalog.names().len(), 2, "no duplicate mappings");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn real_file_at_renamed_path_blocks_the_mapping() {
    let lib = Library::new();
    lib.audio("intro.mp3", b"mp3 body");
    lib.file("intro.ogg", b"OggS\x00 real ogg");
    let catalog = lib.catalog(cat_encoder());

    let listing = catalog
        .list(&Node::Directory(lib.root().to_path_buf()))
        .await
        .unwrap();

    assert_eq!(names(&listing), vec!["intro.ogg"], "listed once");
    assert_eq!(listing[0].1, Node::File(lib.path("intro.ogg")));
    assert!(catalog.names().is_empty());
    assert_eq!(catalog.names().resolve(&lib.path("intro.ogg")), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_audio_is_listed_verbatim() {
    let lib = Library::new();
    lib.file("notes.txt", b"liner notes");
    let catalog = lib.catalog(cat_encoder());

    let listing = catalog
        .list(&Node::Directory(lib.root().to_path_buf()))
        .await
        .unwrap();

    assert_eq!(names(&listing), vec!["notes.txt"]);
    assert!(catalog.names().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flac_suffix_counts_as_audio() {
    let lib = Library::new();
    lib.file("live.flac", b"not really flac");
    let catalog = lib.catalog(cat_encoder());

    let listing = catalog
        .list(&Node::Directory(lib.root().to_path_buf()))
        .await
        .unwrap();
    assert_eq!(names(&listing), vec!["live.ogg"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn target_format_audio_is_not_renamed_or_mapped() {
    let lib = Library::new();
    lib.file("done.ogg", b"OggS\x00 already encoded");
    let catalog = lib.catalog(cat_encoder());

    let listing = catalog
        .list(&Node::Directory(lib.root().to_path_buf()))
        .await
        .unwrap();
    assert_eq!(names(&listing), vec!["done.ogg"]);
    assert!(catalog.names().is_empty());
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn symlinks_are_skipped() {
    let lib = Library::new();
    lib.audio("real.mp3", b"x");
    std::os::unix::fs::symlink(lib.path("real.mp3"), lib.path("link.mp3")).unwrap();
    let catalog = lib.catalog(cat_encoder());

    let listing = catalog
        .list(&Node::Directory(lib.root().to_path_buf()))
        .await
        .unwrap();
    assert_eq!(names(&listing), vec!["real.ogg"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resolve_missing_name_is_not_found() {
    let lib = Library::new();
    let catalog = lib.catalog(cat_encoder());

    let err = catalog
        .resolve(
            &Node::Directory(lib.root().to_path_buf()),
            OsStr::new("missing.ogg"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CodecError::NotFound(_)), "got {err:?}");
    assert_eq!(i32::from(err), libc::ENOENT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resolve_renamed_name_needs_a_prior_listing() {
    let lib = Library::new();
    lib.audio("track.mp3", b"frames");
    let catalog = lib.catalog(cat_encoder());
    let dir = Node::Directory(lib.root().to_path_buf());

    assert!(matches!(
        catalog.resolve(&dir, OsStr::new("track.ogg")).await,
        Err(CodecError::NotFound(_))
    ));

    catalog.list(&dir).await.unwrap();
    assert_eq!(
        catalog.resolve(&dir, OsStr::new("track.ogg")).await.unwrap(),
        Node::File(lib.path("track.ogg"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resolve_literal_entries() {
    let lib = Library::new();
    lib.audio("track.mp3", b"frames");
    lib.dir("disc2");
    let catalog = lib.catalog(cat_encoder());
    let dir = Node::Directory(lib.root().to_path_buf());

    assert_eq!(
        catalog.resolve(&dir, OsStr::new("track.mp3")).await.unwrap(),
        Node::File(lib.path("track.mp3"))
    );
    assert_eq!(
        catalog.resolve(&dir, OsStr::new("disc2")).await.unwrap(),
        Node::Directory(lib.path("disc2"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resolve_refuses_to_leave_the_directory() {
    let lib = Library::new();
    lib.dir("inner");
    let catalog = lib.catalog(cat_encoder());
    let inner = Node::Directory(lib.path("inner"));

    for name in ["..", ".", "../inner"] {
        assert!(
            matches!(
                catalog.resolve(&inner, OsStr::new(name)).await,
                Err(CodecError::NotFound(_))
            ),
            "{name}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_directories_are_mirrored() {
    let lib = Library::new();
    lib.audio("artist/album/01.mp3", b"one");
    let catalog = lib.catalog(cat_encoder());

    let artist = catalog
        .resolve(&Node::Directory(lib.root().to_path_buf()), OsStr::new("artist"))
        .await
        .unwrap();
    let album = catalog.resolve(&artist, OsStr::new("album")).await.unwrap();
    let listing = catalog.list(&album).await.unwrap();

    assert_eq!(names(&listing), vec!["01.ogg"]);
    assert_eq!(
        catalog.names().resolve(&lib.path("artist/album/01.ogg")),
        Some(lib.path("artist/album/01.mp3"))
    );
}
