//! Rdio authentication strategy.
//!
//! Delegates user login to Rdio over OAuth 2.0:
//! - Builds the authorization redirect URL
//! - Exchanges the returned code (or a refresh token) for an access token,
//!   authenticating the client with HTTP Basic as Rdio requires
//! - Fetches the current user via the Rdio web service API and normalizes it
//!   into a [`Profile`]
//! - Hands tokens and profile to an application-supplied [`Verify`] callback
//!
//! HTTP goes through the [`OAuthTransport`] seam; [`ReqwestTransport`] is the
//! default implementation.

pub mod config;
pub mod oauth2;
pub mod profile;
pub mod strategy;
pub mod token;
pub mod transport;

use std::error::Error as StdError;
use thiserror::Error;

pub use config::{RdioConfig, TokenEndpointAuthMethod};
pub use oauth2::OAuth2Client;
pub use profile::{Profile, ProfileName, PROVIDER};
pub use strategy::{
    AuthStrategy, LoginOutcome, LoginStage, RdioStrategy, RdioStrategyBuilder, Verify,
    VerifyError, VerifyOutcome,
};
pub use token::{ExchangeError, PayloadFormat, TokenGrant, TokenPayload, TokenSet};
pub use transport::{
    OAuthTransport, ReqwestTransport, TransportError, TransportRequest, TransportResponse,
};

/// Errors surfaced by the Rdio strategy.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to obtain access token: {0}")]
    TokenExchange(#[source] ExchangeError),

    #[error("Failed to fetch user profile: {0}")]
    ProfileFetch(#[source] TransportError),

    #[error("Failed to parse user profile: {0}")]
    ProfileParse(String),

    #[error("Provider rejected request: {0}")]
    Rejected(String),

    #[error("Verification failed: {0}")]
    Verify(#[source] Box<dyn StdError + Send + Sync>),
}

impl AuthError {
    /// The login stage this error terminated, if it came from one.
    pub fn stage(&self) -> Option<LoginStage> {
        match self {
            AuthError::TokenExchange(_) => Some(LoginStage::TokenPending),
            AuthError::ProfileFetch(_) | AuthError::ProfileParse(_) | AuthError::Rejected(_) => {
                Some(LoginStage::ProfilePending)
            }
            AuthError::Config(_) | AuthError::Verify(_) => None,
        }
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Config(format!("invalid URL: {}", err))
    }
}
