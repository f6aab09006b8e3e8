pub mod config;

use std::io::{self, IsTerminal};
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use config::{LogLevel, LogName, LogsConfig};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

pub fn init(dir: &Path, name: &str, cfg: &LogsConfig) -> Result<()> {
    let level = match cfg.level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warning => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
    };

    let colored = match cfg.name {
        LogName::Stdout => io::stdout().is_terminal(),
        LogName::Stderr => io::stderr().is_terminal(),
        LogName::File => false,
    };

    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Magenta);

    let dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            let now = humantime::format_rfc3339_millis(SystemTime::now());
            if colored {
                out.finish(format_args!(
                    "{now} [{}] {message}",
                    colors.color(record.level())
                ))
            } else {
                out.finish(format_args!("{now} [{}] {message}", record.level()))
            }
        })
        .level(level)
        // The HTTP stack is chatty at debug level.
        .level_for("actix_server", LevelFilter::Info)
        .level_for("reqwest", LevelFilter::Info);

    let dispatch = match cfg.name {
        LogName::Stdout => dispatch.chain(io::stdout()),
        LogName::Stderr => dispatch.chain(io::stderr()),
        LogName::File => {
            let path = dir.join(format!("{name}.log"));
            let file = fern::log_file(&path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            dispatch.chain(file)
        }
    };

    dispatch.apply().context("init logger")?;
    Ok(())
}
