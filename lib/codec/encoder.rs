//! The external encoder process.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use super::error::CodecError;

/// Argument that is replaced by the source path, verbatim.
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Substring that is replaced by the target format name.
pub const FORMAT_PLACEHOLDER: &str = "{format}";

/// Describes how to launch the encoder: program, argument template, and output format.
///
/// The encoder reads the source named by [`INPUT_PLACEHOLDER`] and writes the encoded stream
/// to its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoder {
    program: String,
    args: Vec<String>,
    format: String,
}

/// A running encoder and its output pipe.
#[derive(Debug)]
pub struct EncoderProcess {
    /// The child process. Killed if dropped while still running.
    pub child: Child,
    /// The encoder's stdout.
    pub stdout: ChildStdout,
}

impl Encoder {
    /// Build an encoder from a program, an argument template, and an output format.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            format: format.into(),
        }
    }

    /// `ffmpeg -i {input} -f {format} -`
    pub fn ffmpeg(format: impl Into<String>) -> Self {
        Self::new(
            "ffmpeg",
            ["-i", INPUT_PLACEHOLDER, "-f", FORMAT_PLACEHOLDER, "-"],
            format,
        )
    }

    /// The output format handed to the encoder.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Expand the argument template for `input`.
    #[must_use]
    pub fn args_for(&self, input: &Path) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| {
                if arg == INPUT_PLACEHOLDER {
                    input.as_os_str().to_owned()
                } else {
                    arg.replace(FORMAT_PLACEHOLDER, &self.format).into()
                }
            })
            .collect()
    }

    fn command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(input))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Start encoding `input`.
    pub fn spawn(&self, input: &Path) -> Result<EncoderProcess, CodecError> {
        let mut child = self
            .command(input)
            .spawn()
            .map_err(|source| CodecError::EncoderSpawn {
                program: self.program.clone(),
                source,
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CodecError::EncoderPipe(self.program.clone()))?;

        debug!(
            program = %self.program,
            pid = child.id(),
            input = %input.display(),
            "encoder spawned"
        );
        Ok(EncoderProcess { child, stdout })
    }
}
