use std::marker::PhantomData;

use chrono::Local;
use owo_colors::{
    colors::{Black, Default, Red, Yellow},
    Color, OwoColorize,
};
use tracing::{field::Visit, metadata::LevelFilter, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Registry,
};

/// Installs the global subscriber. Events go to stderr so stdout only ever
/// carries the graph.
///
/// - `NODESCAN_LOG_VERBOSITY` sets the filter, using `RUST_LOG` syntax. The
///   default level is `WARN`.
/// - A non-zero `verbosity` overrides the global level but keeps per-module
///   directives from the environment.
pub fn init(verbosity: u8, is_ansi: bool) {
    let level_override = match verbosity {
        0 => None,
        1 => Some(LevelFilter::INFO),
        2 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var("NODESCAN_LOG_VERBOSITY")
        .from_env_lossy();

    let filter = if let Some(max_level) = level_override {
        filter.add_directive(max_level.into())
    } else {
        filter
    };

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(NodescanFormatter::new_with_ansi(is_ansi))
        .with_filter(filter);

    Registry::default().with(stderr).init();
}

/// Errors are red, warnings are yellow, info is printed as is, and debug and
/// trace lines carry a timestamp, the level and the event target.
///
/// Spans and fields other than the message are not printed.
pub struct NodescanFormatter {
    is_ansi: bool,
}

impl NodescanFormatter {
    pub fn new_with_ansi(is_ansi: bool) -> Self {
        Self { is_ansi }
    }
}

impl<S, N> FormatEvent<S, N> for NodescanFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let level = event.metadata().level();
        let target = event.metadata().target();

        match *level {
            Level::ERROR => {
                write_string::<Red, Black>(writer.by_ref(), self.is_ansi, level.as_str())
                    .and_then(|_| write_message::<Red, Default>(writer, self.is_ansi, event))
            }
            Level::WARN => {
                write_string::<Yellow, Black>(writer.by_ref(), self.is_ansi, level.as_str())
                    .and_then(|_| write_message::<Yellow, Default>(writer, self.is_ansi, event))
            }
            Level::INFO => write_message::<Default, Default>(writer, self.is_ansi, event),
            _ => {
                let now = Local::now();
                write!(
                    writer,
                    "{} [{}] {}: ",
                    now.format("%Y-%m-%dT%H:%M:%S.%3f%z"),
                    level,
                    target,
                )
                .and_then(|_| write_message::<Default, Default>(writer, self.is_ansi, event))
            }
        }
    }
}

struct MessageVisitor<'a, FG: Color, BG: Color> {
    colorize: bool,
    writer: Writer<'a>,
    _fg: PhantomData<FG>,
    _bg: PhantomData<BG>,
}

impl<'a, FG: Color, BG: Color> Visit for MessageVisitor<'a, FG, BG> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() != "message" {
            return;
        }
        let _ = if self.colorize {
            write!(self.writer, "{:?}", value.fg::<FG>().bg::<BG>())
        } else {
            write!(self.writer, "{:?}", value)
        };
    }
}

fn write_string<FG: Color, BG: Color>(
    mut writer: Writer<'_>,
    colorize: bool,
    value: &str,
) -> std::fmt::Result {
    if colorize {
        write!(writer, "{} ", value.fg::<FG>().bg::<BG>())
    } else {
        write!(writer, "{} ", value)
    }
}

fn write_message<FG: Color, BG: Color>(
    mut writer: Writer<'_>,
    colorize: bool,
    event: &Event,
) -> std::fmt::Result {
    let mut visitor = MessageVisitor::<FG, BG> {
        colorize,
        writer: writer.by_ref(),
        _fg: PhantomData,
        _bg: PhantomData,
    };
    event.record(&mut visitor);
    writeln!(writer)
}
