//! Token endpoint grants and response handling.

use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::form_urlencoded;

/// Credential presented at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    AuthorizationCode {
        code: String,
        redirect_uri: Option<String>,
    },
    RefreshToken {
        refresh_token: String,
    },
}

impl TokenGrant {
    pub fn authorization_code(code: impl Into<String>, redirect_uri: Option<String>) -> Self {
        TokenGrant::AuthorizationCode {
            code: code.into(),
            redirect_uri,
        }
    }

    pub fn refresh_token(refresh_token: impl Into<String>) -> Self {
        TokenGrant::RefreshToken {
            refresh_token: refresh_token.into(),
        }
    }

    /// Value of the `grant_type` form parameter.
    pub fn grant_type(&self) -> &'static str {
        match self {
            TokenGrant::AuthorizationCode { .. } => "authorization_code",
            TokenGrant::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Form parameters identifying this grant, `grant_type` first.
    pub fn form_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("grant_type", self.grant_type())];
        match self {
            TokenGrant::AuthorizationCode { code, redirect_uri } => {
                params.push(("code", code.as_str()));
                if let Some(redirect_uri) = redirect_uri {
                    params.push(("redirect_uri", redirect_uri.as_str()));
                }
            }
            TokenGrant::RefreshToken { refresh_token } => {
                params.push(("refresh_token", refresh_token.as_str()));
            }
        }
        params
    }
}

/// Which parse path produced a token payload.
///
/// `Json` means the body was a JSON object. Valid JSON of any other shape
/// (`null`, arrays, scalars) carries no token fields, so it goes through form
/// decoding like any other non-object body and is reported as `Form`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Json,
    Form,
}

/// Token endpoint response body after the two-step parse.
///
/// A JSON object is taken as-is. Anything else is decoded as
/// `application/x-www-form-urlencoded`, since some providers answer with a
/// query string regardless of the declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenPayload {
    Json(Map<String, Value>),
    Form(Map<String, Value>),
}

impl TokenPayload {
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => TokenPayload::Json(map),
            _ => TokenPayload::Form(decode_form(body)),
        }
    }

    pub fn format(&self) -> PayloadFormat {
        match self {
            TokenPayload::Json(_) => PayloadFormat::Json,
            TokenPayload::Form(_) => PayloadFormat::Form,
        }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        match self {
            TokenPayload::Json(map) | TokenPayload::Form(map) => map,
        }
    }
}

/// Repeated keys collect into an array, matching querystring semantics.
fn decode_form(body: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in form_urlencoded::parse(body.trim().as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

pub(crate) fn value_string(value: Option<&Value>) -> Option<String> {
    value.and_then(|v| {
        if let Some(s) = v.as_str() {
            Some(s.to_string())
        } else if v.is_number() || v.is_boolean() {
            Some(v.to_string())
        } else {
            None
        }
    })
}

/// Result of a successful token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Remaining response fields. Never contains `refresh_token`.
    #[serde(default)]
    pub params: Map<String, Value>,
    pub format: PayloadFormat,
}

impl TokenSet {
    pub fn from_payload(payload: TokenPayload) -> Result<Self, ExchangeError> {
        let format = payload.format();
        let mut params = payload.into_fields();

        let refresh_token = params
            .remove("refresh_token")
            .and_then(|v| value_string(Some(&v)));
        let access_token = value_string(params.get("access_token"))
            .filter(|t| !t.is_empty())
            .ok_or(ExchangeError::MissingAccessToken { format })?;

        Ok(Self {
            access_token,
            refresh_token,
            params,
            format,
        })
    }

    /// Lifetime in seconds, when the provider reported one.
    pub fn expires_in(&self) -> Option<u64> {
        value_string(self.params.get("expires_in")).and_then(|v| v.parse().ok())
    }
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("token response ({format:?}) did not include an access_token")]
    MissingAccessToken { format: PayloadFormat },
}
