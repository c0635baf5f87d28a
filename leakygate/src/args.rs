use std::{
    fmt,
    io::IsTerminal,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
};

use clap::{Parser, ValueEnum};
use config::Config;
use log::LevelFilter;
use logforth::filter::EnvFilter;

const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

/// Crates whose records follow `--log`; every other target stays at `warn`.
const WORKSPACE_CRATES: [&str; 4] = ["leakygate", "server", "rate_limit", "config"];

#[derive(Debug, Parser)]
#[command(name = "leakygate", version, about = "Leaky-bucket admission gate backed by Redis")]
pub struct Args {
    /// Address to listen on, overrides `server.listen_address` [default: 127.0.0.1:8080]
    #[arg(short, long, env = "LEAKYGATE_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,
    /// Path to the TOML configuration file, defaults apply when it does not exist
    #[arg(long, short, env = "LEAKYGATE_CONFIG_PATH", default_value = "./leakygate.toml")]
    pub config: PathBuf,
    /// Log level of the leakygate crates
    #[arg(long = "log", env = "LEAKYGATE_LOG", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
    /// Log output format [default: color on a terminal, text otherwise]
    #[arg(long, env = "LEAKYGATE_LOG_STYLE")]
    pub log_style: Option<LogStyle>,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<Config> {
        if !self.config.exists() {
            log::warn!(
                "No configuration file at {}, serving with defaults",
                self.config.display()
            );

            return Ok(Config::default());
        }

        Config::load(&self.config)
    }

    /// The flag wins over `server.listen_address`, which wins over 127.0.0.1:8080.
    pub fn listen_address(&self, config: &Config) -> SocketAddr {
        self.listen_address
            .or(config.server.listen_address)
            .unwrap_or(DEFAULT_LISTEN_ADDRESS)
    }

    pub fn log_style(&self) -> LogStyle {
        match self.log_style {
            Some(style) => style,
            None if std::io::stdout().is_terminal() => LogStyle::Color,
            None => LogStyle::Text,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogStyle {
    /// Colorized text
    Color,
    /// Plain text
    Text,
    /// One JSON object per record
    Json,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}

impl LogLevel {
    /// Directives for the selected level, e.g. `warn,leakygate=debug,server=debug,...`.
    pub fn directives(self) -> String {
        let level = LevelFilter::from(self);

        if level == LevelFilter::Off {
            return "off".to_string();
        }

        let level = level.as_str().to_lowercase();

        WORKSPACE_CRATES
            .iter()
            .fold("warn".to_string(), |directives, krate| format!("{directives},{krate}={level}"))
    }

    pub fn env_filter(self) -> anyhow::Result<EnvFilter> {
        let directives = self.directives();

        EnvFilter::from_str(&directives).map_err(|e| anyhow::anyhow!("Invalid log filter '{directives}': {e}"))
    }
}
