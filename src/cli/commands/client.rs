use clap::{Arg, ArgAction, Command};

pub const NAME: &str = "client";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(NAME)
        .about("Authenticate, lock the bearer token and call the protected endpoint")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .help("Server base URL")
                .default_value("http://127.0.0.1:8080/")
                .env("SESSIONLOCK_URL"),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .help("Account username")
                .env("SESSIONLOCK_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Account password")
                .env("SESSIONLOCK_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("risk-event")
                .long("risk-event")
                .help("Path to a JSON file with the fraud-scoring result for this attempt")
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("signup")
                .long("signup")
                .help("Create the account instead of logging in")
                .action(ArgAction::SetTrue),
        )
}
