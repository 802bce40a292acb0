//! Logger setup: stderr always, plus a file when configured.

use std::fs::OpenOptions;

use simplelog::ColorChoice;
use simplelog::CombinedLogger;
use simplelog::Config;
use simplelog::ConfigBuilder;
use simplelog::SharedLogger;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;

use crate::config::ServerConfig;
use crate::error::ServerError;

pub fn init(config: &ServerConfig) -> Result<(), ServerError> {
    let log_config = log_config();

    let term: Box<dyn SharedLogger> = TermLogger::new(
        config.log_level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
    let mut loggers = vec![term];

    if let Some(path) = &config.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ServerError::LogFile {
                path: path.clone(),
                source,
            })?;
        loggers.push(WriteLogger::new(config.log_level, log_config, file));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

// Records from upcache crates only.
fn log_config() -> Config {
    ConfigBuilder::new()
        .add_filter_allow_str("upcache")
        .build()
}
