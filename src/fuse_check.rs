//! FUSE availability checks.

use std::path::Path;

#[cfg(target_os = "macos")]
mod paths {
    pub const MACFUSE_FS_BUNDLE: &str = "/Library/Filesystems/macfuse.fs";
    pub const OSXFUSE_FS_BUNDLE: &str = "/Library/Filesystems/osxfuse.fs";
    pub const MACFUSE_MOUNT_HELPER: &str =
        "/Library/Filesystems/macfuse.fs/Contents/Resources/mount_macfuse";
    pub const OSXFUSE_MOUNT_HELPER: &str =
        "/Library/Filesystems/osxfuse.fs/Contents/Resources/mount_osxfuse";
}

#[cfg(not(target_os = "macos"))]
mod paths {
    pub const FUSE_DEVICE: &str = "/dev/fuse";
}

/// Errors that can occur when verifying FUSE availability.
#[derive(Debug, thiserror::Error)]
pub enum FuseCheckError {
    /// macFUSE is not installed at all.
    #[cfg(target_os = "macos")]
    #[error(
        "macFUSE is not installed. codec-fs requires macFUSE to mount filesystems.\n\
         Install it from: https://macfuse.github.io/"
    )]
    NotInstalled,

    /// The mount helper binary is missing.
    #[cfg(target_os = "macos")]
    #[error(
        "macFUSE mount helper not found at {path}. Installation may be corrupt.\n\
         Reinstall from: https://macfuse.github.io/"
    )]
    MountHelperMissing {
        /// Path where the mount helper was expected.
        path: &'static str,
    },

    /// The kernel exposes no FUSE device.
    #[cfg(not(target_os = "macos"))]
    #[error(
        "{path} does not exist. Load the fuse kernel module (`modprobe fuse`) or install \
         your distribution's fuse package."
    )]
    NoDevice {
        /// Path of the missing device node.
        path: &'static str,
    },
}

/// Verify that FUSE is installed and usable on the current platform.
///
/// On macOS this checks for a macFUSE or osxfuse bundle and its mount helper.
#[cfg(target_os = "macos")]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    let helper = if Path::new(paths::MACFUSE_FS_BUNDLE).is_dir() {
        paths::MACFUSE_MOUNT_HELPER
    } else if Path::new(paths::OSXFUSE_FS_BUNDLE).is_dir() {
        paths::OSXFUSE_MOUNT_HELPER
    } else {
        return Err(FuseCheckError::NotInstalled);
    };

    if !Path::new(helper).is_file() {
        return Err(FuseCheckError::MountHelperMissing { path: helper });
    }

    Ok(())
}

/// Verify that FUSE is installed and usable on the current platform.
///
/// Elsewhere this checks that the FUSE device node exists.
#[cfg(not(target_os = "macos"))]
pub fn ensure_fuse() -> Result<(), FuseCheckError> {
    if Path::new(paths::FUSE_DEVICE).exists() {
        Ok(())
    } else {
        Err(FuseCheckError::NoDevice {
            path: paths::FUSE_DEVICE,
        })
    }
}
