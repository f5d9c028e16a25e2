use std::fmt::{self, Display};

use clap::ValueEnum;
use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{registry::LookupSpan, EnvFilter, Layer};

use crate::layers::BoxedLayer;

/// The format of log lines written by a layer.
#[derive(Debug, Copy, Clone, ValueEnum, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// `key=value` pairs, see <https://brandur.org/logfmt>
    LogFmt,
    /// Human readable lines
    Terminal,
}

impl LogFormat {
    /// Builds a layer writing this format, filtered by `filter`.
    ///
    /// `color` is the name of a color mode (`always`, `auto` or `never`); only the terminal
    /// format honors it. Without a `file_writer` the layer writes to stdout.
    pub fn apply<S>(
        &self,
        filter: EnvFilter,
        color: Option<String>,
        file_writer: Option<NonBlocking>,
    ) -> BoxedLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let ansi = match color.as_deref() {
            Some("always") => true,
            Some("auto") => std::env::var_os("NO_COLOR").is_none(),
            _ => false,
        };
        let target = std::env::var("RUST_LOG_TARGET").map_or(true, |value| value != "0");

        match self {
            Self::Json => {
                let layer = tracing_subscriber::fmt::layer().json().with_ansi(false);
                match file_writer {
                    Some(writer) => layer.with_writer(writer).with_filter(filter).boxed(),
                    None => layer.with_filter(filter).boxed(),
                }
            }
            Self::LogFmt => {
                let layer = tracing_subscriber::fmt::layer()
                    .event_format(tracing_logfmt::EventsFormatter::default())
                    .fmt_fields(tracing_logfmt::FieldsFormatter::default());
                match file_writer {
                    Some(writer) => layer.with_writer(writer).with_filter(filter).boxed(),
                    None => layer.with_filter(filter).boxed(),
                }
            }
            Self::Terminal => {
                let layer = tracing_subscriber::fmt::layer().with_target(target);
                match file_writer {
                    Some(writer) => {
                        layer.with_ansi(false).with_writer(writer).with_filter(filter).boxed()
                    }
                    None => layer.with_ansi(ansi).with_filter(filter).boxed(),
                }
            }
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::LogFmt => write!(f, "log-fmt"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}
