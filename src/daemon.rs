use std::path::{Path, PathBuf};

use tokio::select;

use crate::app_config;
use tracing::{debug, error, info};

mod managed_fuse {
    //! This module feels a little confusing, but it's designed to help you manage the lifecycle of
    //! fuse slightly better. fuser will not attempt to fuse unmount the filesystem when the
    //! `BackgroundSession` is dropped, and will only do a regular unmount, but we want to be
    //! aggressive and force an unmount if possible.
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use nix::errno::Errno;

    use super::{app_config, debug, error};
    use codec_fs::codec::CodecProvider;
    use codec_fs::fs::AsyncFs;
    use codec_fs::fs::fuser::FuserAdapter;
    use fuser::BackgroundSession;

    /// Name the mount shows up under in the mount table.
    const FS_NAME: &str = "codecfs";

    pub struct FuseCoreScope {
        _session: BackgroundSession,
    }

    impl FuseCoreScope {
        fn spawn(
            config: &app_config::Config,
            source_root: PathBuf,
            handle: tokio::runtime::Handle,
        ) -> Result<Self, std::io::Error> {
            Ok(Self {
                _session: Self::spawn_fuse(config, source_root, handle)?,
            })
        }

        fn spawn_fuse(
            config: &app_config::Config,
            source_root: PathBuf,
            handle: tokio::runtime::Handle,
        ) -> Result<BackgroundSession, std::io::Error> {
            let provider = CodecProvider::new(config.catalog(source_root), config.uid, config.gid);
            let root = provider.root_inode();
            let fs = Arc::new(AsyncFs::new(provider, root));
            let fuse_adapter = FuserAdapter::new(fs, handle);
            let mount_opts = [
                fuser::MountOption::FSName(FS_NAME.to_owned()),
                fuser::MountOption::Subtype(FS_NAME.to_owned()),
                fuser::MountOption::RO,
                fuser::MountOption::NoDev,
                fuser::MountOption::AutoUnmount,
                fuser::MountOption::DefaultPermissions,
            ];

            fuser::spawn_mount2(fuse_adapter, &config.mount_point, &mount_opts)
        }
    }

    /// Outcome of a single forced unmount attempt.
    enum Unmount {
        Done,
        Busy,
        NotMounted,
        Failed(Errno),
    }

    fn force_unmount(mount_point: &Path) -> Unmount {
        let result = {
            #[cfg(target_os = "macos")]
            {
                nix::mount::unmount(mount_point, nix::mount::MntFlags::MNT_FORCE)
            }

            #[cfg(target_os = "linux")]
            {
                nix::mount::umount2(mount_point, nix::mount::MntFlags::MNT_DETACH)
            }
        };

        match result {
            Ok(()) => Unmount::Done,
            Err(Errno::EBUSY) => Unmount::Busy,
            Err(Errno::EINVAL | Errno::ENOENT) => Unmount::NotMounted,
            Err(e) => Unmount::Failed(e),
        }
    }

    /// Detach whatever a previous run may have left mounted at `mount_point`.
    pub fn detach_stale(mount_point: &Path) {
        match force_unmount(mount_point) {
            Unmount::Done => debug!(?mount_point, "Detached a stale mount."),
            Unmount::NotMounted => {}
            Unmount::Busy => debug!(?mount_point, "Stale mount is busy, leaving it."),
            Unmount::Failed(e) => debug!(?mount_point, error = %e, "Could not detach stale mount."),
        }
    }

    pub struct ManagedFuse {
        mount_point: PathBuf,
    }

    impl ManagedFuse {
        pub fn new(config: &app_config::Config) -> Self {
            Self {
                mount_point: config.mount_point.clone(),
            }
        }

        pub fn spawn(
            &self,
            config: &app_config::Config,
            source_root: PathBuf,
            handle: tokio::runtime::Handle,
        ) -> Result<FuseCoreScope, std::io::Error> {
            _ = self; // self used for calling convention.
            FuseCoreScope::spawn(config, source_root, handle)
        }
    }

    impl Drop for ManagedFuse {
        fn drop(&mut self) {
            const UMOUNT_ATTEMPT_COUNT: usize = 10;
            const UMOUNT_ATTEMPT_DELAY: Duration = Duration::from_millis(10);

            debug!(mount_point = ?self.mount_point, "Confirming unmount of FUSE filesystem...");

            for i in 0..UMOUNT_ATTEMPT_COUNT {
                match force_unmount(&self.mount_point) {
                    Unmount::Done => {
                        debug!(
                            "Successfully unmounted FUSE filesystem on attempt {}",
                            i + 1
                        );
                        break;
                    }
                    Unmount::Busy => {
                        debug!(
                            "FUSE filesystem still busy on attempt {}. Retrying...",
                            i + 1
                        );
                        std::thread::sleep(UMOUNT_ATTEMPT_DELAY);
                    }
                    Unmount::NotMounted => {
                        debug!("FUSE filesystem already unmounted (attempt {})", i + 1);
                        break;
                    }
                    Unmount::Failed(e) => {
                        error!(
                            "Failed to unmount FUSE filesystem on attempt {}: {}",
                            i + 1,
                            e
                        );
                        break;
                    }
                }
            }
        }
    }
}

/// Prepares the mount point directory.
///
/// - If the directory exists and is non-empty, returns an error.
/// - If the directory does not exist, creates it (including parents, mode `0755`).
/// - If the directory exists and is empty, does nothing.
async fn prepare_mount_point(mount_point: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::read_dir(mount_point).await {
        Ok(mut entries) => {
            if entries.next_entry().await?.is_some() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "Mount point '{}' already exists and is not empty.",
                        mount_point.display()
                    ),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(mount_point)
                .await?;
            info!(path = %mount_point.display(), "Created mount point directory.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn wait_for_exit() -> Result<(), std::io::Error> {
    use tokio::signal;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sighup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
    select! {
        _ = signal::ctrl_c() => {
            debug!("Received Ctrl+C signal, shutting down...");
        },
        _ = sigterm.recv() => {
            debug!("Received termination signal, shutting down...");
        },
        _ = sighup.recv() => {
            debug!("Received hangup signal, shutting down...");
        },
    }
    Ok(())
}

/// Main entry point for the daemon.
pub async fn run(
    config: app_config::Config,
    source_root: PathBuf,
    handle: tokio::runtime::Handle,
) -> Result<(), std::io::Error> {
    managed_fuse::detach_stale(&config.mount_point);
    prepare_mount_point(&config.mount_point).await?;

    info!(
        source = %source_root.display(),
        "Mounting filesystem at {}.",
        config.mount_point.display()
    );

    let fuse = managed_fuse::ManagedFuse::new(&config);
    {
        let _session = fuse.spawn(&config, source_root, handle.clone())?;
        info!("codec-fs is running. Press Ctrl+C to stop.");

        wait_for_exit().await?;
    }
    Ok(())
}

pub fn spawn(config: app_config::Config, source_root: PathBuf) -> Result<(), std::io::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, source_root, runtime.handle().clone()))
}
