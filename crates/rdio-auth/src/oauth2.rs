use crate::config::TokenEndpointAuthMethod;
use crate::token::{ExchangeError, TokenGrant, TokenPayload, TokenSet};
use crate::transport::{OAuthTransport, TransportError, TransportRequest, TransportResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use url::{form_urlencoded, Url};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const RESERVED_HEADERS: [&str; 2] = ["content-type", "authorization"];

/// Generic OAuth 2.0 client: authorization URLs, token exchange, and
/// bearer-authenticated requests over an injected transport.
///
/// Provider quirks are expressed through configuration (client auth method,
/// custom headers) rather than by overriding client behavior.
#[derive(Debug, Clone)]
pub struct OAuth2Client<T> {
    client_id: String,
    client_secret: String,
    authorization_url: Url,
    token_url: Url,
    auth_method: TokenEndpointAuthMethod,
    custom_headers: BTreeMap<String, String>,
    transport: T,
}

impl<T: OAuthTransport> OAuth2Client<T> {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorization_url: Url,
        token_url: Url,
        transport: T,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_url,
            token_url,
            auth_method: TokenEndpointAuthMethod::ClientSecretPost,
            custom_headers: BTreeMap::new(),
            transport,
        }
    }

    pub fn with_auth_method(mut self, auth_method: TokenEndpointAuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    pub fn with_custom_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.custom_headers = headers;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Authorization endpoint URL with `client_id` plus the given parameters.
    pub fn authorize_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.authorization_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// `Basic base64(client_id:client_secret)`.
    pub fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }

    /// Exchange a grant for tokens.
    ///
    /// `extra_params` are appended to the form body after the grant fields.
    #[instrument(skip_all, fields(grant_type = grant.grant_type()), level = "debug")]
    pub async fn exchange(
        &self,
        grant: &TokenGrant,
        extra_params: &[(&str, &str)],
    ) -> Result<TokenSet, ExchangeError> {
        // The serializer is not Send; it must be gone before the first await.
        let body = {
            let mut form = form_urlencoded::Serializer::new(String::new());
            for (key, value) in grant.form_params() {
                form.append_pair(key, value);
            }
            for (key, value) in extra_params {
                form.append_pair(key, value);
            }
            match self.auth_method {
                TokenEndpointAuthMethod::ClientSecretBasic => {}
                TokenEndpointAuthMethod::ClientSecretPost => {
                    form.append_pair("client_id", &self.client_id);
                    form.append_pair("client_secret", &self.client_secret);
                }
                TokenEndpointAuthMethod::NoAuthentication => {
                    form.append_pair("client_id", &self.client_id);
                }
            }
            form.finish()
        };

        let mut request = self.base_request(self.token_url.clone());
        if self.auth_method == TokenEndpointAuthMethod::ClientSecretBasic {
            request = request.header("Authorization", self.basic_auth_header());
        }
        let request = request.form_body(body);

        let res = self.transport.execute(request).await?;
        let payload = TokenPayload::parse(&res.body);
        debug!(format = ?payload.format(), "Token response parsed");

        TokenSet::from_payload(payload)
    }

    /// POST a form body to `url`, authenticated with `Authorization: Bearer`.
    #[instrument(skip_all, fields(path = url.path()), level = "debug")]
    pub async fn post_form(
        &self,
        url: Url,
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        let body = {
            let mut form = form_urlencoded::Serializer::new(String::new());
            for (key, value) in params {
                form.append_pair(key, value);
            }
            form.finish()
        };

        let request = self
            .base_request(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .form_body(body);

        self.transport.execute(request).await
    }

    /// Custom headers never override `Content-Type` or `Authorization`.
    fn base_request(&self, url: Url) -> TransportRequest {
        let mut request = TransportRequest::post(url);
        for (name, value) in &self.custom_headers {
            if RESERVED_HEADERS
                .iter()
                .any(|reserved| name.eq_ignore_ascii_case(reserved))
            {
                debug!(header = %name, "Ignoring reserved custom header");
                continue;
            }
            request = request.header(name.clone(), value.clone());
        }
        request.header("Content-Type", FORM_CONTENT_TYPE)
    }
}
