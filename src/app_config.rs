//! Module for application configuration settings.
//!
//! User configurations may be specified in a configuration file. Every key is optional; a
//! missing file means all defaults.

use thiserror::Error;
use tracing::debug;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use codec_fs::codec::node::DEFAULT_FABRICATION_FACTOR;
use codec_fs::codec::{Catalog, Encoder};

fn codec_fs_runtime_dir() -> Option<PathBuf> {
    let runtime_dir = dirs::runtime_dir();
    if let Some(path) = runtime_dir {
        return Some(path.join("codec-fs"));
    }

    let home_dir = dirs::home_dir();
    if let Some(path) = home_dir {
        return Some(path.join(".local").join("share").join("codec-fs"));
    }

    None
}

fn default_pid_file() -> PathBuf {
    codec_fs_runtime_dir().map_or_else(
        || PathBuf::from("/var/run/codec-fs.pid"),
        |rd| rd.join("codec-fs.pid"),
    )
}

fn default_mount_point() -> PathBuf {
    PathBuf::from("/tmp/codecfs")
}

fn default_fabrication_factor() -> u64 {
    DEFAULT_FABRICATION_FACTOR
}

fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

fn default_program() -> String {
    "ffmpeg".to_owned()
}

fn default_format() -> String {
    "ogg".to_owned()
}

fn default_args() -> Vec<String> {
    ["-i", "{input}", "-f", "{format}", "-"]
        .map(str::to_owned)
        .to_vec()
}

/// How the encoder is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EncoderConfig {
    /// The encoder executable.
    #[serde(default = "default_program")]
    pub program: String,

    /// Output format passed to the encoder, also the name of the top-level directory.
    #[serde(default = "default_format")]
    pub format: String,

    /// Extension given to transcoded files, without the dot. Defaults to `format`.
    #[serde(default)]
    pub extension: Option<String>,

    /// Argument template. `{input}` as a whole argument is the source file, `{format}` is
    /// substituted anywhere.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            format: default_format(),
            extension: None,
            args: default_args(),
        }
    }
}

impl EncoderConfig {
    /// The extension transcoded files are listed with.
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(&self.format)
    }

    /// Build the encoder this configuration describes.
    pub fn to_encoder(&self) -> Encoder {
        Encoder::new(&self.program, &self.args, &self.format)
    }
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DaemonConfig {
    /// The path to the PID file for the daemon.
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Where the daemon's stdout and stderr go. Discarded if not specified.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            log_file: None,
        }
    }
}

/// Application configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// The mount point for the filesystem.
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// Encoder invocation.
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Multiplier for the size reported before a file has been transcoded once.
    #[serde(default = "default_fabrication_factor")]
    pub size_fabrication_factor: u64,

    /// Settings used with `--daemonize`.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// The user that owns every file in the mount. Defaults to the current user.
    #[serde(default = "current_uid")]
    pub uid: u32,

    /// The group that owns every file in the mount. Defaults to the current group.
    #[serde(default = "current_gid")]
    pub gid: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount_point: default_mount_point(),
            encoder: EncoderConfig::default(),
            size_fabrication_factor: default_fabrication_factor(),
            daemon: DaemonConfig::default(),
            uid: current_uid(),
            gid: current_gid(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns:
    /// - `Ok(())` if the configuration is valid.
    /// - `Err(Vec<String>)` containing every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.encoder.program.trim().is_empty() {
            errors.push("Encoder program must not be empty.".to_owned());
        }

        if self.encoder.format.trim().is_empty() {
            errors.push("Encoder format must not be empty.".to_owned());
        }

        let extension = self.encoder.extension();
        if extension.is_empty() || extension.contains(['.', '/']) {
            errors.push(format!(
                "Extension '{extension}' must be non-empty and contain no '.' or '/'."
            ));
        }

        if self.encoder.format.contains('/') {
            errors.push(format!(
                "Format '{}' is used as a directory name and must not contain '/'.",
                self.encoder.format
            ));
        }

        if self.size_fabrication_factor == 0 {
            errors.push("Size fabrication factor must be at least 1.".to_owned());
        }

        if self.daemon.pid_file.parent().is_none() {
            errors.push(format!(
                "PID file path '{}' has no parent directory.",
                self.daemon.pid_file.display()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The catalog presenting `source_root` under this configuration.
    pub fn catalog(&self, source_root: PathBuf) -> Catalog {
        Catalog::new(source_root, self.encoder.to_encoder())
            .with_extension(self.encoder.extension())
            .with_fabrication_factor(self.size_fabrication_factor)
    }

    /// Returns config file paths in descending priority order.
    /// On macOS, skips `dirs::config_dir()` (resolves to ~/Library/Application Support/).
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("codec-fs").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("codec-fs").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/codec-fs/config.toml"));

        paths
    }

    /// Finds the first existing config file from search paths.
    fn find_config_file() -> Option<PathBuf> {
        Self::config_search_paths().into_iter().find(|p| p.exists())
    }

    /// Loads config from a single TOML file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads configuration from the external path if given, else the first found config file.
    pub fn load(external_config_path: Option<&Path>) -> Option<Result<Self, ConfigError>> {
        if let Some(path) = external_config_path {
            return Some(Self::load_from_file(path));
        }

        Self::find_config_file().map(|path| Self::load_from_file(&path))
    }

    /// Loads config, falling back to defaults if no file exists.
    /// Errors if a config file exists but is malformed.
    pub fn load_or_default(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::load(external_config_path) {
            Some(res) => res,
            None => {
                debug!("No configuration file found, using defaults.");
                Ok(Self::default())
            }
        }
    }
}
