use clap::{builder::ValueParser, Arg, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Levels in verbosity order; the index is the `-v` count.
const LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// Accept a verbosity count or a level name (`error`..`trace`, any case) as the count.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        let level = level.trim();

        let index = match level.parse::<usize>() {
            Ok(count) => (count < LEVELS.len()).then_some(count),
            Err(_) => LEVELS
                .iter()
                .position(|known| known.as_str().eq_ignore_ascii_case(level)),
        };

        index
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| {
                let names: Vec<String> = LEVELS
                    .iter()
                    .map(|known| known.as_str().to_lowercase())
                    .collect();
                format!(
                    "invalid log level '{level}', expected 0-4 or one of: {}",
                    names.join(", ")
                )
            })
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("SESSIONLOCK_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
