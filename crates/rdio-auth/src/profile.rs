//! Normalized user profile built from Rdio's `currentUser` response.
//!
//! Success responses nest the user under `result`:
//!
//! ```json
//! {"status": "ok", "result": {"key": "s123", "firstName": "Ada", "lastName": "Lovelace",
//!  "vanityName": "ada", "email": "ada@example.com"}}
//! ```
//!
//! Failures arrive with a 2xx status and `{"status": "error", "message": "..."}`.

use crate::token::value_string;
use crate::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value of [`Profile::provider`].
pub const PROVIDER: &str = "rdio";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    pub given_name: String,
    pub family_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub provider: String,
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub display_name: String,
    pub name: ProfileName,
    #[serde(default)]
    pub emails: Vec<String>,
    /// Response body as received.
    #[serde(rename = "_raw")]
    pub raw: String,
    /// Parsed response body, including fields not mapped above.
    #[serde(rename = "_json")]
    pub json: Value,
}

impl Profile {
    /// Build a profile from a `currentUser` response body.
    ///
    /// Never returns a partially populated profile: invalid JSON or a missing
    /// `result.key` is a parse error, and `status: "error"` is a rejection.
    pub fn parse(body: &str) -> Result<Self, AuthError> {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| AuthError::ProfileParse(format!("invalid JSON: {}", e)))?;

        if json.get("status").and_then(Value::as_str) == Some("error") {
            let message = value_string(json.get("message"))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(AuthError::Rejected(message));
        }

        let result = json
            .get("result")
            .filter(|r| r.is_object())
            .ok_or_else(|| AuthError::ProfileParse("response has no result object".to_string()))?;

        let id = value_string(result.get("key"))
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AuthError::ProfileParse("result is missing key".to_string()))?;

        let given_name = value_string(result.get("firstName")).unwrap_or_default();
        let family_name = value_string(result.get("lastName")).unwrap_or_default();
        let display_name = [given_name.as_str(), family_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        let username = value_string(result.get("username"))
            .or_else(|| value_string(result.get("vanityName")))
            .filter(|u| !u.is_empty());

        let emails = value_string(result.get("email"))
            .filter(|e| !e.is_empty())
            .into_iter()
            .collect();

        Ok(Self {
            provider: PROVIDER.to_string(),
            id,
            username,
            display_name,
            name: ProfileName {
                given_name,
                family_name,
            },
            emails,
            raw: body.to_string(),
            json,
        })
    }
}
