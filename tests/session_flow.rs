use anyhow::Result;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{json, Value};
use sessionlock::{
    api::{self, jwt::TokenIssuer, users::MemoryUserStore, AuthState},
    client::{Access, SessionClient},
    keystore::KeyStore,
    lock::{self, LockVerifier},
    risk::{Determination, RiskEvent},
};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn_server() -> Result<String> {
    let state = Arc::new(AuthState::new(
        TokenIssuer::new(&SecretString::from("integration-secret".to_string()), 300),
        Arc::new(MemoryUserStore::default()),
        LockVerifier::default(),
    ));
    let app = api::router(state, None)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    Ok(format!("http://{addr}/"))
}

fn risk_event(warn: bool, deny: bool) -> Result<RiskEvent> {
    Ok(serde_json::from_value(json!({
        "signals": ["new_device"],
        "riskParams": {
            "warn": { "new_device": warn },
            "deny": { "tor_exit_node": deny },
        },
        "location": { "country": "CH" },
        "fingerprintId": "fp-integration",
    }))?)
}

fn password() -> SecretString {
    SecretString::from("correct horse battery".to_string())
}

#[tokio::test]
async fn signup_then_protected_then_logout() -> Result<()> {
    let base_url = spawn_server().await?;
    let mut client = SessionClient::new(&base_url)?;
    client.start().await?;

    let outcome = client
        .signup("alice", &password(), risk_event(false, false)?)
        .await?;
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.determination, Some(Determination::Allow));
    assert!(client.bearer_token().is_some());

    let access = client.protected().await?;
    assert!(
        matches!(&access, Access::Granted { message } if message.starts_with("Hello, alice!")),
        "unexpected access: {access:?}"
    );

    // each call produces a fresh lock
    assert!(matches!(client.protected().await?, Access::Granted { .. }));

    client.logout().await?;
    assert!(client.bearer_token().is_none());
    assert!(client.keystore().private_key_handle().await.is_err());
    Ok(())
}

#[tokio::test]
async fn login_after_signup_binds_new_session() -> Result<()> {
    let base_url = spawn_server().await?;

    let mut first = SessionClient::new(&base_url)?;
    first
        .signup("bob", &password(), risk_event(false, false)?)
        .await?;
    first.logout().await?;

    let mut second = SessionClient::new(&base_url)?;
    let outcome = second
        .login("bob", &password(), risk_event(false, false)?)
        .await?;
    assert!(outcome.is_authenticated());
    assert!(matches!(second.protected().await?, Access::Granted { .. }));

    let wrong = SecretString::from("nope".to_string());
    let mut third = SessionClient::new(&base_url)?;
    let outcome = third
        .login("bob", &wrong, risk_event(false, false)?)
        .await?;
    assert_eq!(outcome.status, StatusCode::UNAUTHORIZED);
    assert!(third.bearer_token().is_none());
    Ok(())
}

#[tokio::test]
async fn risk_gate_blocks_signup() -> Result<()> {
    let base_url = spawn_server().await?;

    let mut warned = SessionClient::new(&base_url)?;
    let outcome = warned
        .signup("carol", &password(), risk_event(true, false)?)
        .await?;
    assert_eq!(outcome.status, StatusCode::MULTIPLE_CHOICES);
    assert_eq!(outcome.determination, Some(Determination::Warn));
    assert!(warned.bearer_token().is_none());

    let mut denied = SessionClient::new(&base_url)?;
    let outcome = denied
        .signup("carol", &password(), risk_event(true, true)?)
        .await?;
    assert_eq!(outcome.status, StatusCode::FORBIDDEN);
    assert_eq!(outcome.determination, Some(Determination::Deny));

    // nothing was created, so the name is still free
    let mut allowed = SessionClient::new(&base_url)?;
    let outcome = allowed
        .signup("carol", &password(), risk_event(false, false)?)
        .await?;
    assert_eq!(outcome.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn rotated_session_key_tears_session_down() -> Result<()> {
    let base_url = spawn_server().await?;
    let mut client = SessionClient::new(&base_url)?;
    client
        .signup("dave", &password(), risk_event(false, false)?)
        .await?;

    client.keystore().clear().await?;
    client.keystore().ensure_key_pair().await?;

    let access = client.protected().await?;
    assert_eq!(
        access,
        Access::Rejected {
            status: StatusCode::UNAUTHORIZED,
            error: "InvalidSignature".to_string(),
        }
    );
    assert!(client.bearer_token().is_none());
    assert!(client.keystore().private_key_handle().await.is_err());
    Ok(())
}

#[tokio::test]
async fn stolen_bearer_token_is_useless() -> Result<()> {
    let base_url = spawn_server().await?;
    let mut victim = SessionClient::new(&base_url)?;
    victim
        .signup("erin", &password(), risk_event(false, false)?)
        .await?;
    let stolen = victim.bearer_token().unwrap_or_default().to_string();

    let http = reqwest::Client::new();
    let protected = format!("{base_url}api/protected");

    let response = http.get(&protected).bearer_auth(&stolen).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Malformed");

    let attacker = KeyStore::in_memory();
    attacker.ensure_key_pair().await?;
    let locked = lock::lock(&attacker, &stolen).await?;
    let response = http.get(&protected).bearer_auth(&locked).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "InvalidSignature");

    // a stale lock replayed from the victim's own session
    let replayed = lock::lock_at(
        victim.keystore(),
        &stolen,
        lock::now_unix_millis() - 60_000,
    )
    .await?;
    let response = http.get(&protected).bearer_auth(&replayed).send().await?;
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Expired");
    Ok(())
}

#[tokio::test]
async fn risk_endpoint_and_health() -> Result<()> {
    let base_url = spawn_server().await?;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base_url}api/risk"))
        .json(&json!({ "riskEvent": risk_event(true, false)? }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::MULTIPLE_CHOICES);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await?;
    assert_eq!(body["riskResponse"]["riskDetermination"], "Warn");

    let response = http.get(format!("{base_url}health")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    Ok(())
}

#[tokio::test]
async fn envelope_without_risk_params_never_issues_token() -> Result<()> {
    let base_url = spawn_server().await?;
    let http = reqwest::Client::new();
    let public_key = KeyStore::in_memory().ensure_key_pair().await?;

    for path in ["api/signup", "api/login"] {
        let response = http
            .post(format!("{base_url}{path}"))
            .json(&json!({
                "username": "frank",
                "password": "correct horse battery",
                "publicKey": public_key,
                "riskEvent": {},
            }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        let body: Value = response.json().await?;
        assert!(body.get("token").is_none(), "{path} issued a token");
        assert!(body["error"]
            .as_str()
            .is_some_and(|error| error.contains("riskParams")));
    }

    let response = http.post(format!("{base_url}api/signup")).send().await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert!(body["error"]
        .as_str()
        .is_some_and(|error| error.contains("Content-Type")));
    Ok(())
}
