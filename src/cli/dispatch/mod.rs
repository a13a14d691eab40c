use crate::{
    api::jwt::DEFAULT_TOKEN_TTL_SECONDS,
    cli::{
        actions::{client, server, Action},
        commands,
    },
    lock::FRESHNESS_WINDOW_MS,
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::server::NAME, sub_m)) => Ok(Action::Server(server_args(sub_m)?)),
        Some((commands::client::NAME, sub_m)) => Ok(Action::Client(client_args(sub_m)?)),
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn server_args(matches: &clap::ArgMatches) -> Result<server::Args> {
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .context("missing required argument: --jwt-secret")?;

    Ok(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        jwt_secret: SecretString::from(jwt_secret),
        jwt_ttl: matches
            .get_one::<u64>("jwt-ttl")
            .copied()
            .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS),
        freshness_window_ms: matches
            .get_one::<u64>("freshness-window")
            .copied()
            .unwrap_or(FRESHNESS_WINDOW_MS),
        max_clock_skew_ms: matches.get_one::<u64>("max-clock-skew").copied(),
        allowed_origin: matches.get_one::<String>("allowed-origin").cloned(),
    })
}

fn client_args(matches: &clap::ArgMatches) -> Result<client::Args> {
    let password = matches
        .get_one::<String>("password")
        .cloned()
        .context("missing required argument: --password")?;

    Ok(client::Args {
        url: matches
            .get_one::<String>("url")
            .cloned()
            .context("missing required argument: --url")?,
        username: matches
            .get_one::<String>("username")
            .cloned()
            .context("missing required argument: --username")?,
        password: SecretString::from(password),
        risk_event: matches
            .get_one::<PathBuf>("risk-event")
            .cloned()
            .context("missing required argument: --risk-event")?,
        signup: matches.get_flag("signup"),
    })
}
