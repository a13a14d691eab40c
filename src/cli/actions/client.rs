use crate::{
    client::{Access, AuthOutcome, SessionClient},
    risk::RiskEvent,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub url: String,
    pub username: String,
    pub password: SecretString,
    pub risk_event: PathBuf,
    pub signup: bool,
}

/// Load a fraud-scoring result from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid risk event.
pub fn read_risk_event(path: &Path) -> Result<RiskEvent> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read risk event: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid risk event: {}", path.display()))
}

/// Execute the client action: authenticate, then call the protected endpoint once.
/// # Errors
/// Returns an error if the risk event cannot be loaded or the server is unreachable.
pub async fn execute(args: Args) -> Result<()> {
    let risk_event = read_risk_event(&args.risk_event)?;

    let mut client = SessionClient::new(&args.url)?;
    client.start().await?;

    let outcome = if args.signup {
        client
            .signup(&args.username, &args.password, risk_event)
            .await?
    } else {
        client
            .login(&args.username, &args.password, risk_event)
            .await?
    };

    print_outcome(&outcome)?;

    if !outcome.is_authenticated() {
        return Ok(());
    }

    match client.protected().await? {
        Access::Granted { message } => println!("{message}"),
        Access::Rejected { status, error } => println!("Rejected ({status}): {error}"),
        Access::Failed { status, error } => println!("Failed ({status}): {error}"),
    }

    client.logout().await?;
    debug!("session closed");

    Ok(())
}

fn print_outcome(outcome: &AuthOutcome) -> Result<()> {
    let determination = outcome
        .determination
        .map_or("unknown", |determination| determination.as_str());
    println!("Status: {} (risk: {determination})", outcome.status);

    if let Some(error) = &outcome.error {
        println!("Error: {error}");
    }
    if let Some(risk_response) = &outcome.risk_response {
        println!("{}", serde_json::to_string_pretty(risk_response)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::Determination;
    use std::io::Write;

    #[test]
    fn read_risk_event_from_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("risk-event-{}.json", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path)?;
        file.write_all(
            br#"{"signals":["tor"],"riskParams":{"deny":{"tor":true}},"fingerprintId":"fp"}"#,
        )?;

        let event = read_risk_event(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(event.classify(), Determination::Deny);
        Ok(())
    }

    #[test]
    fn read_risk_event_missing_file() {
        assert!(read_risk_event(Path::new("/nonexistent/risk-event.json")).is_err());
    }
}
