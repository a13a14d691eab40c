//! Client side of the session lock.
//!
//! A [`SessionClient`] owns one session: its [`KeyStore`] and the bearer token obtained
//! at signup/login. Every call to the protected resource locks the bearer token first.
//! Any rejection of the locked token tears the session down.

use crate::{
    api::types::{ApiResponse, SignupRequest},
    keystore::KeyStore,
    lock,
    risk::{Determination, RiskEvent},
    APP_USER_AGENT,
};
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Outcome of a signup or login attempt.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub status: StatusCode,
    pub determination: Option<Determination>,
    pub risk_response: Option<RiskEvent>,
    pub error: Option<String>,
}

impl AuthOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// Outcome of a call to the protected resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted { message: String },
    /// The locked token failed verification; the session has been torn down.
    Rejected { status: StatusCode, error: String },
    /// Any other failure. The session is kept and the call may be retried.
    Failed { status: StatusCode, error: String },
}

#[derive(Debug)]
pub struct SessionClient {
    http: Client,
    base_url: Url,
    keystore: KeyStore,
    bearer_token: Option<SecretString>,
}

impl SessionClient {
    /// # Errors
    /// Returns an error if `base_url` is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid server URL: {base_url}"))?;
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            keystore: KeyStore::in_memory(),
            bearer_token: None,
        })
    }

    #[must_use]
    pub fn with_keystore(mut self, keystore: KeyStore) -> Self {
        self.keystore = keystore;
        self
    }

    #[must_use]
    pub const fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_ref().map(ExposeSecret::expose_secret)
    }

    /// Reconcile state at startup: a key pair without a bearer token is discarded.
    ///
    /// # Errors
    /// Returns an error if the key store cannot be cleared.
    pub async fn start(&mut self) -> Result<()> {
        if self.bearer_token.is_none() {
            self.keystore.clear().await?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error on transport failures or an unreadable response.
    pub async fn signup(
        &mut self,
        username: &str,
        password: &SecretString,
        risk_event: RiskEvent,
    ) -> Result<AuthOutcome> {
        self.authenticate("api/signup", username, password, risk_event)
            .await
    }

    /// # Errors
    /// Returns an error on transport failures or an unreadable response.
    pub async fn login(
        &mut self,
        username: &str,
        password: &SecretString,
        risk_event: RiskEvent,
    ) -> Result<AuthOutcome> {
        self.authenticate("api/login", username, password, risk_event)
            .await
    }

    #[instrument(skip(self, password, risk_event))]
    async fn authenticate(
        &mut self,
        path: &str,
        username: &str,
        password: &SecretString,
        risk_event: RiskEvent,
    ) -> Result<AuthOutcome> {
        let public_key = self.keystore.ensure_key_pair().await?;
        let request = SignupRequest {
            username: username.to_string(),
            password: password.expose_secret().to_string(),
            public_key,
            risk_event,
        };

        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {path}"))?;
        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid response body from {path} ({status})"))?;

        let determination = body
            .risk_response
            .as_ref()
            .and_then(|risk| risk.risk_determination);

        if status == StatusCode::OK {
            let token = body
                .token
                .ok_or_else(|| anyhow!("{path} succeeded without a token"))?;
            self.bearer_token = Some(SecretString::from(token));
            info!("authenticated");
        } else {
            debug!(%status, "authentication not granted");
        }

        Ok(AuthOutcome {
            status,
            determination,
            risk_response: body.risk_response,
            error: body.error,
        })
    }

    /// Lock the bearer token and call the protected resource. A 401 tears the session down.
    ///
    /// # Errors
    /// Returns an error if there is no bearer token, the token cannot be locked, or the
    /// request fails in transport.
    pub async fn protected(&mut self) -> Result<Access> {
        let token = self
            .bearer_token()
            .ok_or_else(|| anyhow!("not authenticated"))?
            .to_string();
        let locked = lock::lock(&self.keystore, &token).await?;

        let response = self
            .http
            .get(self.endpoint("api/protected")?)
            .bearer_auth(locked)
            .send()
            .await
            .context("Failed to reach api/protected")?;
        let status = response.status();
        let body: ApiResponse = response.json().await.unwrap_or_default();

        if status == StatusCode::OK {
            return Ok(Access::Granted {
                message: body.message.unwrap_or_default(),
            });
        }

        let error = body.error.unwrap_or_else(|| status.to_string());
        if status != StatusCode::UNAUTHORIZED {
            warn!(%status, %error, "protected resource unavailable");
            return Ok(Access::Failed { status, error });
        }

        warn!(%status, %error, "protected resource rejected the session");
        self.logout().await?;

        Ok(Access::Rejected { status, error })
    }

    /// Forget the bearer token and erase the session key pair.
    ///
    /// # Errors
    /// Returns an error if the key store cannot be cleared.
    pub async fn logout(&mut self) -> Result<()> {
        self.bearer_token = None;
        self.keystore.clear().await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path: {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() -> Result<()> {
        let client = SessionClient::new("http://127.0.0.1:8080/")?;
        assert_eq!(
            client.endpoint("api/protected")?.as_str(),
            "http://127.0.0.1:8080/api/protected"
        );
        Ok(())
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(SessionClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn start_without_token_clears_keys() -> Result<()> {
        let mut client = SessionClient::new("http://127.0.0.1:8080/")?;
        client.keystore().ensure_key_pair().await?;
        client.start().await?;
        assert!(client.keystore().private_key_handle().await.is_err());
        Ok(())
    }

    async fn serve_protected(status: StatusCode) -> Result<String> {
        use axum::{routing::get, Json, Router};

        let app = Router::new().route(
            "/api/protected",
            get(move || async move { (status, Json(ApiResponse::error("nope"))) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(format!("http://{addr}/"))
    }

    async fn authenticated_client(base_url: &str) -> Result<SessionClient> {
        let mut client = SessionClient::new(base_url)?;
        client.keystore().ensure_key_pair().await?;
        client.bearer_token = Some(SecretString::from("h.p.s".to_string()));
        Ok(client)
    }

    #[tokio::test]
    async fn server_error_keeps_session() -> Result<()> {
        let base_url = serve_protected(StatusCode::INTERNAL_SERVER_ERROR).await?;
        let mut client = authenticated_client(&base_url).await?;

        let access = client.protected().await?;
        assert!(matches!(
            access,
            Access::Failed { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(client.bearer_token().is_some());
        assert!(client.keystore().private_key_handle().await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_tears_session_down() -> Result<()> {
        let base_url = serve_protected(StatusCode::UNAUTHORIZED).await?;
        let mut client = authenticated_client(&base_url).await?;

        let access = client.protected().await?;
        assert!(matches!(access, Access::Rejected { ref error, .. } if error == "nope"));
        assert!(client.bearer_token().is_none());
        assert!(client.keystore().private_key_handle().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn protected_requires_token() -> Result<()> {
        let mut client = SessionClient::new("http://127.0.0.1:8080/")?;
        assert!(client.protected().await.is_err());
        Ok(())
    }
}
