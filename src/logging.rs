use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Step,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Step => "STEP",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(self) -> &'static str {
        match self {
            LogLevel::Step => "magenta",
            LogLevel::Info => "cyan",
            LogLevel::Success => "green",
            LogLevel::Warning => "yellow",
            LogLevel::Error => "red",
        }
    }
}

const ALL_LEVELS: [LogLevel; 5] = [
    LogLevel::Step,
    LogLevel::Info,
    LogLevel::Success,
    LogLevel::Warning,
    LogLevel::Error,
];

// Visual width of "[ WARNING ]" plus one space, so messages line up.
static TARGET_PREFIX_WIDTH: Lazy<usize> = Lazy::new(|| {
    ALL_LEVELS
        .iter()
        .map(|l| l.label().len())
        .max()
        .unwrap_or(7)
        + 5
});

static LOG_PREFIXES: Lazy<HashMap<LogLevel, String>> = Lazy::new(|| {
    colored::control::set_override(true);

    ALL_LEVELS
        .iter()
        .map(|&level| {
            let label = level.label();
            let padding = TARGET_PREFIX_WIDTH.saturating_sub(label.len() + 4);
            let colored_label = format!(" {} ", label).color(level.color()).bold();
            (
                level,
                format!("[{}]{}", colored_label, " ".repeat(padding)),
            )
        })
        .collect()
});

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_level(false)
        .with_target(false)
        .compact();

    tracing_subscriber::fmt()
        .event_format(format)
        .with_ansi(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

pub fn log(level: LogLevel, message: &str) {
    let prefix = LOG_PREFIXES
        .get(&level)
        .cloned()
        .unwrap_or_else(|| format!("[{:<7}] ", level.label()));

    match level {
        LogLevel::Step => tracing::info!(target: "step", "{}", format!("{}{}", prefix, message)),
        LogLevel::Info | LogLevel::Success => {
            tracing::info!("{}", format!("{}{}", prefix, message))
        }
        LogLevel::Warning => tracing::warn!("{}", format!("{}{}", prefix, message)),
        LogLevel::Error => tracing::error!("{}", format!("{}{}", prefix, message)),
    }
}
