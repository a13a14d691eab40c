use clap::{Arg, Command};

pub const NAME: &str = "server";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(NAME)
        .about("Serve the signup, login, risk and protected endpoints")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SESSIONLOCK_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("HMAC secret used to sign and verify bearer tokens")
                .env("SESSIONLOCK_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("jwt-ttl")
                .long("jwt-ttl")
                .help("Bearer token lifetime in seconds")
                .default_value("3600")
                .env("SESSIONLOCK_JWT_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("freshness-window")
                .long("freshness-window")
                .help("Maximum age in milliseconds of a locked token timestamp")
                .default_value("3000")
                .env("SESSIONLOCK_FRESHNESS_WINDOW_MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("max-clock-skew")
                .long("max-clock-skew")
                .help("Reject locked tokens timestamped further than this many milliseconds in the future")
                .env("SESSIONLOCK_MAX_CLOCK_SKEW_MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("allowed-origin")
                .long("allowed-origin")
                .help("Origin allowed by CORS, example: https://app.example.com (default: any)")
                .env("SESSIONLOCK_ALLOWED_ORIGIN"),
        )
}
