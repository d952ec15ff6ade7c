//! The Rdio login strategy.
//!
//! A login attempt runs two network steps in order, then hands off to the
//! application:
//!
//! ```text
//! TokenPending --exchange_token--> ProfilePending --fetch_profile--> Complete
//!       \                                \
//!        +------------> Failed <----------+
//! ```
//!
//! Nothing is retried. A failed step ends the attempt before the verify
//! callback runs.

use crate::config::RdioConfig;
use crate::oauth2::OAuth2Client;
use crate::profile::Profile;
use crate::token::{TokenGrant, TokenSet};
use crate::transport::{OAuthTransport, ReqwestTransport};
use crate::AuthError;
use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Pending stages of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    TokenPending,
    ProfilePending,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginStage::TokenPending => write!(f, "token_pending"),
            LoginStage::ProfilePending => write!(f, "profile_pending"),
        }
    }
}

/// One authentication method against one provider.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// URL to redirect the user agent to for consent.
    fn authorization_url(&self, state: Option<&str>) -> Url;

    async fn exchange_token(&self, grant: TokenGrant) -> Result<TokenSet, AuthError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, AuthError>;
}

pub type VerifyError = Box<dyn StdError + Send + Sync>;

/// Application decision after a successful token exchange and profile fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome<U> {
    Authenticated(U),
    /// Credentials were valid but the application refused the login.
    Rejected(Option<String>),
}

/// Application-supplied verification callback.
///
/// Implemented for any `Fn(String, Option<String>, Profile) -> impl Future`
/// returning `Result<VerifyOutcome<U>, VerifyError>`.
#[async_trait]
pub trait Verify: Send + Sync {
    type User: Send;

    async fn verify(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        profile: Profile,
    ) -> Result<VerifyOutcome<Self::User>, VerifyError>;
}

#[async_trait]
impl<F, Fut, U> Verify for F
where
    F: Fn(String, Option<String>, Profile) -> Fut + Send + Sync,
    Fut: Future<Output = Result<VerifyOutcome<U>, VerifyError>> + Send + 'static,
    U: Send + 'static,
{
    type User = U;

    async fn verify(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        profile: Profile,
    ) -> Result<VerifyOutcome<U>, VerifyError> {
        (self)(
            access_token.to_string(),
            refresh_token.map(str::to_string),
            profile,
        )
        .await
    }
}

/// Completed login attempt.
#[derive(Debug, Clone)]
pub struct LoginOutcome<U> {
    pub tokens: TokenSet,
    pub profile: Profile,
    pub outcome: VerifyOutcome<U>,
}

impl<U> LoginOutcome<U> {
    pub fn user(&self) -> Option<&U> {
        match &self.outcome {
            VerifyOutcome::Authenticated(user) => Some(user),
            VerifyOutcome::Rejected(_) => None,
        }
    }
}

/// Rdio OAuth 2.0 strategy.
pub struct RdioStrategy<U, T = ReqwestTransport> {
    config: RdioConfig,
    client: OAuth2Client<T>,
    profile_url: Url,
    verify: Arc<dyn Verify<User = U>>,
}

impl<U> RdioStrategy<U, ReqwestTransport> {
    pub fn builder(config: RdioConfig) -> RdioStrategyBuilder<U, ReqwestTransport> {
        RdioStrategyBuilder {
            config,
            transport: ReqwestTransport::default(),
            verify: None,
        }
    }
}

pub struct RdioStrategyBuilder<U, T> {
    config: RdioConfig,
    transport: T,
    verify: Option<Arc<dyn Verify<User = U>>>,
}

impl<U, T: OAuthTransport> RdioStrategyBuilder<U, T> {
    pub fn transport<T2: OAuthTransport>(self, transport: T2) -> RdioStrategyBuilder<U, T2> {
        RdioStrategyBuilder {
            config: self.config,
            transport,
            verify: self.verify,
        }
    }

    pub fn verify<V>(mut self, verify: V) -> Self
    where
        V: Verify<User = U> + 'static,
    {
        self.verify = Some(Arc::new(verify));
        self
    }

    /// Validate the configuration and assemble the strategy.
    ///
    /// Fails if no verify callback was supplied.
    pub fn build(self) -> Result<RdioStrategy<U, T>, AuthError> {
        let verify = self.verify.ok_or_else(|| {
            AuthError::Config(format!(
                "strategy '{}' requires a verify callback",
                self.config.name
            ))
        })?;
        self.config.validate()?;

        let client = OAuth2Client::new(
            self.config.client_id.clone(),
            self.config.client_secret.clone(),
            Url::parse(&self.config.authorization_url)?,
            Url::parse(&self.config.token_url)?,
            self.transport,
        )
        .with_auth_method(self.config.token_endpoint_auth_method)
        .with_custom_headers(self.config.custom_headers.clone());
        let profile_url = Url::parse(&self.config.profile_url)?;

        Ok(RdioStrategy {
            config: self.config,
            client,
            profile_url,
            verify,
        })
    }
}

impl<U: Send + 'static, T: OAuthTransport> RdioStrategy<U, T> {
    pub fn config(&self) -> &RdioConfig {
        &self.config
    }

    pub fn client(&self) -> &OAuth2Client<T> {
        &self.client
    }

    /// Complete a login from the authorization code returned to the callback URL.
    #[instrument(skip_all, fields(strategy = %self.config.name), level = "debug")]
    pub async fn authenticate(&self, code: &str) -> Result<LoginOutcome<U>, AuthError> {
        let grant = TokenGrant::authorization_code(code, self.config.callback_url.clone());

        let tokens = self.exchange_token(grant).await.inspect_err(|e| {
            warn!(stage = %LoginStage::TokenPending, error = %e, "Login failed");
        })?;

        let profile = self
            .fetch_profile(&tokens.access_token)
            .await
            .inspect_err(|e| {
                warn!(stage = %LoginStage::ProfilePending, error = %e, "Login failed");
            })?;

        let outcome = self
            .verify
            .verify(&tokens.access_token, tokens.refresh_token.as_deref(), profile.clone())
            .await
            .map_err(AuthError::Verify)?;

        debug!(
            authenticated = matches!(outcome, VerifyOutcome::Authenticated(_)),
            "Login complete"
        );

        Ok(LoginOutcome {
            tokens,
            profile,
            outcome,
        })
    }

    /// Obtain a fresh access token without user interaction.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.exchange_token(TokenGrant::refresh_token(refresh_token)).await
    }

    fn profile_params(&self) -> Vec<(&str, String)> {
        let mut params = vec![("method", "currentUser".to_string())];
        if !self.config.profile_extras.is_empty() {
            params.push(("extras", self.config.profile_extras.join(", ")));
        }
        params
    }
}

#[async_trait]
impl<U, T> AuthStrategy for RdioStrategy<U, T>
where
    U: Send + 'static,
    T: OAuthTransport,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    fn authorization_url(&self, state: Option<&str>) -> Url {
        let scope = self.config.scope_string();
        let mut params = vec![("response_type", "code")];
        if let Some(callback_url) = self.config.callback_url.as_deref() {
            params.push(("redirect_uri", callback_url));
        }
        if let Some(scope) = scope.as_deref() {
            params.push(("scope", scope));
        }
        if let Some(state) = state {
            params.push(("state", state));
        }
        self.client.authorize_url(&params)
    }

    #[instrument(skip_all, fields(grant_type = grant.grant_type()), level = "debug")]
    async fn exchange_token(&self, grant: TokenGrant) -> Result<TokenSet, AuthError> {
        let tokens = self
            .client
            .exchange(&grant, &[])
            .await
            .map_err(AuthError::TokenExchange)?;
        debug!(
            format = ?tokens.format,
            has_refresh_token = tokens.refresh_token.is_some(),
            "Access token obtained"
        );
        Ok(tokens)
    }

    #[instrument(skip_all, level = "debug")]
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        let params = self.profile_params();
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let res = self
            .client
            .post_form(self.profile_url.clone(), access_token, &params)
            .await
            .map_err(AuthError::ProfileFetch)?;

        let profile = Profile::parse(&res.body)?;
        debug!(provider = %profile.provider, "Profile normalized");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn accept_all(
        _access_token: String,
        _refresh_token: Option<String>,
        profile: Profile,
    ) -> Result<VerifyOutcome<String>, VerifyError> {
        Ok(VerifyOutcome::Authenticated(profile.id))
    }

    fn config_for(server: &MockServer) -> RdioConfig {
        let mut config = RdioConfig::new("rdio-client", "rdio-secret")
            .with_callback_url("https://app.example/auth/rdio/callback");
        config.authorization_url = format!("{}/oauth2/authorize", server.uri());
        config.token_url = format!("{}/oauth2/token", server.uri());
        config.profile_url = format!("{}/api/1/", server.uri());
        config
    }

    #[test]
    fn build_requires_verify_callback() {
        let err = RdioStrategy::<String>::builder(RdioConfig::new("client", "secret"))
            .build()
            .err()
            .expect("build should fail without verify");
        assert!(matches!(err, AuthError::Config(_)));
        assert!(err.to_string().contains("requires a verify callback"));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let err = RdioStrategy::builder(RdioConfig::new("", "secret"))
            .verify(accept_all)
            .build()
            .err()
            .expect("build should fail with empty client id");
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn authorization_url_carries_callback_scope_and_state() {
        let config = RdioConfig::new("rdio-client", "rdio-secret")
            .with_callback_url("https://app.example/auth/rdio/callback")
            .with_scope(["email"]);
        let strategy = RdioStrategy::builder(config)
            .verify(accept_all)
            .build()
            .expect("strategy should build");

        assert_eq!(strategy.name(), "rdio");
        let url = strategy.authorization_url(Some("csrf-state"));
        assert_eq!(url.host_str(), Some("www.rdio.com"));
        assert_eq!(url.path(), "/oauth2/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "rdio-client".to_string()),
                ("response_type".to_string(), "code".to_string()),
                (
                    "redirect_uri".to_string(),
                    "https://app.example/auth/rdio/callback".to_string()
                ),
                ("scope".to_string(), "email".to_string()),
                ("state".to_string(), "csrf-state".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_profile_posts_current_user_method() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1/"))
            .and(header("authorization", "Bearer access-token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("method=currentUser&extras=email%2C+vanityName"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "result": {
                    "key": "s1234",
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "vanityName": "ada",
                    "email": "ada@example.com"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let strategy = RdioStrategy::builder(config_for(&mock_server))
            .verify(accept_all)
            .build()
            .unwrap();
        let profile = strategy
            .fetch_profile("access-token")
            .await
            .expect("profile should fetch");

        assert_eq!(profile.id, "s1234");
        assert_eq!(profile.username.as_deref(), Some("ada"));
        assert_eq!(profile.emails, vec!["ada@example.com"]);
    }

    #[tokio::test]
    async fn profile_transport_failure_is_wrapped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let strategy = RdioStrategy::builder(config_for(&mock_server))
            .verify(accept_all)
            .build()
            .unwrap();
        let err = strategy.fetch_profile("access-token").await.unwrap_err();

        assert!(matches!(err, AuthError::ProfileFetch(_)));
        assert_eq!(err.stage(), Some(LoginStage::ProfilePending));
        assert!(err.to_string().starts_with("Failed to fetch user profile"));
        assert!(StdError::source(&err).is_some());
    }

    #[tokio::test]
    async fn provider_error_status_is_a_rejection() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "Invalid or expired access token"
            })))
            .mount(&mock_server)
            .await;

        let strategy = RdioStrategy::builder(config_for(&mock_server))
            .verify(accept_all)
            .build()
            .unwrap();

        match strategy.fetch_profile("expired").await.unwrap_err() {
            AuthError::Rejected(message) => {
                assert_eq!(message, "Invalid or expired access token")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_extras_sends_only_method() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1/"))
            .and(body_string("method=currentUser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "result": { "key": "s1", "firstName": "A", "lastName": "B" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = config_for(&mock_server);
        config.profile_extras.clear();
        let strategy = RdioStrategy::builder(config)
            .verify(accept_all)
            .build()
            .unwrap();
        strategy
            .fetch_profile("access-token")
            .await
            .expect("profile should fetch");
    }

    #[tokio::test]
    async fn refresh_exchanges_refresh_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string("grant_type=refresh_token&refresh_token=rt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "refresh_token": "rt-2"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let strategy = RdioStrategy::builder(config_for(&mock_server))
            .verify(accept_all)
            .build()
            .unwrap();
        let tokens = strategy.refresh("rt-1").await.expect("refresh should succeed");
        assert_eq!(tokens.access_token, "at-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-2"));
    }
}
