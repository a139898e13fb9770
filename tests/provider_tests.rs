#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::ffi::{OsStr, OsString};

use codec_fs::codec::CodecProvider;
use codec_fs::codec::provider::ROOT_ADDR;
use codec_fs::fs::{AsyncFs, INodeType, InodePerms, OpenFlags};

use common::{Library, cat_encoder, pattern};

fn mount(lib: &Library) -> AsyncFs<CodecProvider> {
    let provider = lib.provider(cat_encoder());
    let root = provider.root_inode();
    AsyncFs::new(provider, root)
}

async fn listing(fs: &AsyncFs<CodecProvider>, dir: u64) -> Vec<(OsString, u64, INodeType)> {
    let mut out = Vec::new();
    fs.readdir(dir, 0, |entry, _| {
        out.push((entry.name, entry.inode.addr, entry.inode.itype));
        false
    })
    .await
    .unwrap();
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn root_holds_one_category_directory() {
    let lib = Library::new();
    let fs = mount(&lib);

    let root = fs.getattr(ROOT_ADDR).await.unwrap();
    assert_eq!(root.itype, INodeType::Directory);
    assert_eq!(root.permissions, InodePerms::READ_ONLY);
    assert!(root.is_root());

    assert_eq!(
        listing(&fs, ROOT_ADDR).await,
        vec![("ogg".into(), 2, INodeType::Directory)]
    );
    assert_eq!(fs.lookup(ROOT_ADDR, OsStr::new("ogg")).await.unwrap().addr, 2);

    let err = fs.lookup(ROOT_ADDR, OsStr::new("mp3")).await.unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inode_numbers_are_stable() {
    let lib = Library::new();
    lib.audio("a.mp3", b"a");
    lib.dir("disc2");
    let fs = mount(&lib);
    fs.lookup(ROOT_ADDR, OsStr::new("ogg")).await.unwrap();

    let first = listing(&fs, 2).await;
    let second = listing(&fs, 2).await;
    assert_eq!(first, second);

    let a = fs.lookup(2, OsStr::new("a.ogg")).await.unwrap();
    assert_eq!(a.addr, first[0].1);
    assert_eq!(a.parent, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transcode_through_the_front() {
    let lib = Library::new();
    let contents = lib.audio("track.mp3", &pattern(6000));
    let fs = mount(&lib);
    fs.lookup(ROOT_ADDR, OsStr::new("ogg")).await.unwrap();

    let entries = listing(&fs, 2).await;
    assert_eq!(entries.len(), 1);
    let (name, ino, kind) = &entries[0];
    assert_eq!(name, "track.ogg");
    assert_eq!(*kind, INodeType::File);

    let fabricated = fs.getattr(*ino).await.unwrap();
    assert_eq!(fabricated.size, 10 * contents.len() as u64);
    assert_eq!(fabricated.permissions, InodePerms::READ_ONLY);
    assert_eq!((fabricated.uid, fabricated.gid), (1000, 1000));

    let fh = fs.open(*ino, OpenFlags::RDONLY).await.unwrap();
    let mut streamed = Vec::new();
    loop {
        let data = fs.read(fh, streamed.len() as u64, 4096).await.unwrap();
        if data.is_empty() {
            break;
        }
        streamed.extend_from_slice(&data);
    }
    assert_eq!(streamed, contents);
    fs.release(fh).await.unwrap();

    let real = fs.getattr(*ino).await.unwrap();
    assert_eq!(real.size, contents.len() as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lookup_without_listing_finds_only_real_names() {
    let lib = Library::new();
    lib.audio("track.mp3", b"x");
    let fs = mount(&lib);
    fs.lookup(ROOT_ADDR, OsStr::new("ogg")).await.unwrap();

    let err = fs.lookup(2, OsStr::new("track.ogg")).await.unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    assert!(fs.lookup(2, OsStr::new("track.mp3")).await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn source_removed_after_listing() {
    let lib = Library::new();
    lib.audio("gone.mp3", b"x");
    lib.file("notes.txt", b"kept");
    let fs = mount(&lib);
    fs.lookup(ROOT_ADDR, OsStr::new("ogg")).await.unwrap();
    let entries = listing(&fs, 2).await;
    let gone = entries.iter().find(|(n, _, _)| n == "gone.ogg").unwrap().1;

    std::fs::remove_file(lib.path("gone.mp3")).unwrap();

    let err = fs.getattr(gone).await.unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    let names: Vec<_> = listing(&fs, 2).await.into_iter().map(|(n, _, _)| n).collect();
    assert_eq!(names, vec![OsString::from("notes.txt")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn directories_refuse_file_operations() {
    let lib = Library::new();
    lib.file("notes.txt", b"kept");
    let fs = mount(&lib);
    fs.lookup(ROOT_ADDR, OsStr::new("ogg")).await.unwrap();
    let notes = fs.lookup(2, OsStr::new("notes.txt")).await.unwrap();

    let err = fs.open(2, OpenFlags::RDONLY).await.unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EISDIR));
    let err = fs.readdir(notes.addr, 0, |_, _| false).await.unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));
    let err = fs.open(notes.addr, OpenFlags::RDWR).await.unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EROFS));
}
