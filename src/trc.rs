//! Tracing configuration and initialization.

use std::io::IsTerminal;

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{
    EnvFilter,
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

fn force_color() -> bool {
    std::env::var_os("FORCE_COLOR").is_some_and(|v| !v.is_empty())
}

fn no_color() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty())
}

/// Whether output written to `stream` should carry ANSI colors.
pub fn should_use_color<T: IsTerminal>(stream: &T) -> bool {
    force_color() || (stream.is_terminal() && !no_color())
}

enum TrcMode {
    /// Compact output with progress-bar aware writer.
    Pretty,
    /// Plain, verbose output with span events.
    Ugly,
    /// Plain output into the daemon's log file.
    Daemon { color: bool },
}

pub struct Trc {
    mode: TrcMode,
    env_filter: EnvFilter,
}

impl Default for Trc {
    fn default() -> Self {
        let maybe_env_filter =
            EnvFilter::try_from_env("CODEC_FS_LOG").or_else(|_| EnvFilter::try_from_default_env());

        match maybe_env_filter {
            Ok(env_filter) => Self {
                // A user who sets a filter is debugging; give them the plain output.
                mode: TrcMode::Ugly,
                env_filter,
            },
            Err(_) => Self {
                mode: TrcMode::Pretty,
                env_filter: EnvFilter::new("info"),
            },
        }
    }
}

impl Trc {
    /// Switch to daemon output. The filter chosen by [`Default`] is kept.
    pub fn daemonized(self, color: bool) -> Self {
        Self {
            mode: TrcMode::Daemon { color },
            ..self
        }
    }

    pub fn init(self) -> Result<(), TryInitError> {
        match self.mode {
            TrcMode::Pretty => self.init_pretty_mode(),
            TrcMode::Ugly => self.init_ugly_mode(should_use_color(&std::io::stderr())),
            TrcMode::Daemon { color } => self.init_ugly_mode(color),
        }
    }

    fn init_ugly_mode(self, color: bool) -> Result<(), TryInitError> {
        // "Ugly mode" is the plain, verbose, rust logging mode.
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter)
            .with_ansi(color)
            .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
            .finish()
            .try_init()
    }

    fn init_pretty_mode(self) -> Result<(), TryInitError> {
        // "Pretty mode" is the compact mode for interactive use.
        let indicatif_layer = IndicatifLayer::new();
        tracing_subscriber::registry()
            .with(self.env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(indicatif_layer.get_stderr_writer())
                    .with_target(false)
                    .without_time()
                    .compact(),
            )
            .with(indicatif_layer)
            .try_init()
    }
}
