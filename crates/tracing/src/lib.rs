//! Tracing setup shared by the arbor binaries.
//!
//! A [Tracer] collects layers (stdout, journald and a rotating log file) and installs them as
//! the global subscriber:
//!
//! ```no_run
//! use arbor_tracing::{ArborTracer, LayerInfo, LogFormat, Tracer};
//!
//! let _guard = ArborTracer::new()
//!     .with_stdout(LayerInfo::new(LogFormat::Terminal, "info".to_string(), String::new(), None))
//!     .init()
//!     .expect("failed to initialize tracing");
//! ```

mod formatter;
mod layers;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Directive, layer::SubscriberExt, util::SubscriberInitExt};

pub use formatter::LogFormat;
pub use layers::{FileInfo, FileWorkerGuard};
pub use tracing_subscriber;

use crate::layers::Layers;

/// Installs the global tracing subscriber.
pub trait Tracer {
    /// Builds the configured layers and installs them.
    ///
    /// Returns the file writer's guard when a file layer was configured. Log lines buffered
    /// for the file are lost if the guard is dropped early.
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>>;
}

/// The [Tracer] used by the arbor cli.
#[derive(Debug, Clone)]
pub struct ArborTracer {
    stdout: LayerInfo,
    journald: Option<String>,
    file: Option<(LayerInfo, FileInfo)>,
}

impl ArborTracer {
    /// Creates a tracer logging `INFO` and above to stdout.
    pub fn new() -> Self {
        Self { stdout: LayerInfo::default(), journald: None, file: None }
    }

    /// Replaces the stdout layer.
    pub fn with_stdout(mut self, config: LayerInfo) -> Self {
        self.stdout = config;
        self
    }

    /// Also logs to journald, filtered by `filter`.
    pub fn with_journald(mut self, filter: String) -> Self {
        self.journald = Some(filter);
        self
    }

    /// Also logs to a rotating file.
    pub fn with_file(mut self, config: LayerInfo, file: FileInfo) -> Self {
        self.file = Some((config, file));
        self
    }
}

impl Default for ArborTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for ArborTracer {
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>> {
        let mut layers = Layers::new();

        layers.stdout(
            self.stdout.format,
            self.stdout.default_directive.parse()?,
            &self.stdout.filters,
            self.stdout.color,
        )?;

        if let Some(filter) = self.journald {
            layers.journald(&filter)?;
        }

        let file_guard = match self.file {
            Some((config, file)) => Some(layers.file(config.format, &config.filters, file)?),
            None => None,
        };

        tracing_subscriber::registry().with(layers.into_inner()).try_init()?;
        Ok(file_guard)
    }
}

/// The configuration of one layer.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    format: LogFormat,
    default_directive: String,
    filters: String,
    color: Option<String>,
}

impl LayerInfo {
    /// Creates a layer configuration.
    ///
    /// `default_directive` applies to every target `filters` (a comma separated directive
    /// list, e.g. `arbor_structurizer=trace`) does not name. `color` is `always`, `auto` or
    /// `never`.
    pub fn new(
        format: LogFormat,
        default_directive: String,
        filters: String,
        color: Option<String>,
    ) -> Self {
        Self { format, default_directive, filters, color }
    }
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            default_directive: Directive::from(LevelFilter::INFO).to_string(),
            filters: String::new(),
            color: Some("always".to_string()),
        }
    }
}
