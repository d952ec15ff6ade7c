use crate::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_NAME: &str = "rdio";
pub const DEFAULT_AUTHORIZATION_URL: &str = "https://www.rdio.com/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://services.rdio.com/oauth2/token";
pub const DEFAULT_PROFILE_URL: &str = "https://services.rdio.com/api/1/";

/// How the client authenticates itself at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// `Authorization: Basic base64(client_id:client_secret)`. Required by Rdio.
    #[default]
    ClientSecretBasic,
    /// RFC 6749 client credentials in request body.
    ClientSecretPost,
    /// Public client; only `client_id` is sent.
    #[serde(rename = "none")]
    NoAuthentication,
}

impl TokenEndpointAuthMethod {
    pub fn requires_client_secret(self) -> bool {
        !matches!(self, TokenEndpointAuthMethod::NoAuthentication)
    }
}

/// Strategy configuration.
///
/// Field aliases accept the option names used by passport-style configs
/// (`clientID`, `consumerKey`, `callbackURL`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(alias = "clientID", alias = "consumerKey")]
    pub client_id: String,
    #[serde(default, alias = "clientSecret", alias = "consumerSecret")]
    pub client_secret: String,
    #[serde(default, alias = "callbackURL")]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub scope: Vec<String>,

    #[serde(default = "default_authorization_url", alias = "authorizationURL")]
    pub authorization_url: String,
    #[serde(default = "default_token_url", alias = "tokenURL")]
    pub token_url: String,
    #[serde(
        default = "default_profile_url",
        alias = "profileURL",
        alias = "userProfileURL"
    )]
    pub profile_url: String,

    #[serde(default, alias = "customHeaders")]
    pub custom_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    #[serde(default = "default_profile_extras")]
    pub profile_extras: Vec<String>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_authorization_url() -> String {
    DEFAULT_AUTHORIZATION_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_profile_url() -> String {
    DEFAULT_PROFILE_URL.to_string()
}

fn default_profile_extras() -> Vec<String> {
    vec!["email".to_string(), "vanityName".to_string()]
}

impl RdioConfig {
    /// Config with Rdio's default endpoints and the given client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: None,
            scope: Vec::new(),
            authorization_url: default_authorization_url(),
            token_url: default_token_url(),
            profile_url: default_profile_url(),
            custom_headers: BTreeMap::new(),
            token_endpoint_auth_method: TokenEndpointAuthMethod::default(),
            profile_extras: default_profile_extras(),
        }
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a TOML document into a config. Does not validate.
    pub fn from_toml_str(raw: &str) -> Result<Self, AuthError> {
        toml::from_str(raw).map_err(|e| AuthError::Config(format!("invalid config: {}", e)))
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::Config("strategy name cannot be empty".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Config(format!(
                "strategy '{}' requires a client_id",
                self.name
            )));
        }
        if self.token_endpoint_auth_method.requires_client_secret()
            && self.client_secret.trim().is_empty()
        {
            return Err(AuthError::Config(format!(
                "strategy '{}' requires a client_secret",
                self.name
            )));
        }

        for (option, value) in [
            ("authorization_url", &self.authorization_url),
            ("token_url", &self.token_url),
            ("profile_url", &self.profile_url),
        ] {
            Url::parse(value).map_err(|e| {
                AuthError::Config(format!(
                    "strategy '{}' {} is not a valid URL: {}",
                    self.name, option, e
                ))
            })?;
        }
        if let Some(callback_url) = &self.callback_url {
            Url::parse(callback_url).map_err(|e| {
                AuthError::Config(format!(
                    "strategy '{}' callback_url is not a valid URL: {}",
                    self.name, e
                ))
            })?;
        }

        Ok(())
    }

    pub fn scope_string(&self) -> Option<String> {
        if self.scope.is_empty() {
            None
        } else {
            Some(self.scope.join(" "))
        }
    }
}
