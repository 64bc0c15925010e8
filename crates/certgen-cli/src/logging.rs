//! Console logging for `certgen`

use clap::ValueEnum;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Trace => LevelFilter::Trace,
            LogLevelArg::Debug => LevelFilter::Debug,
            LogLevelArg::Info => LevelFilter::Info,
            LogLevelArg::Warn => LevelFilter::Warn,
            LogLevelArg::Error => LevelFilter::Error,
            LogLevelArg::Off => LevelFilter::Off,
        }
    }
}

/// Level actually applied: `--quiet` wins over `--log-level`
pub fn effective_level(level: LogLevelArg, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        level.into()
    }
}

/// Log to stderr so the summary on stdout stays clean. Engine crates are
/// tagged with their module when running at debug or below.
pub fn init_logging(level: LevelFilter, timestamps: bool) {
    let show_target = level >= LevelFilter::Debug;

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .format(move |buf, record| {
            let style = buf.default_level_style(record.level());
            if timestamps {
                write!(buf, "{} ", chrono::Local::now().format("%H:%M:%S%.3f"))?;
            }
            write!(buf, "{style}{:<5}{style:#} ", record.level())?;
            if show_target {
                write!(buf, "{}: ", record.target())?;
            }
            writeln!(buf, "{}", record.args())
        });

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}
