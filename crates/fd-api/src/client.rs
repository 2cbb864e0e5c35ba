//! Forge OAuth web flow client
//!
//! Implements the network half of the browser sign-in flow against
//! Forgejo/Gitea-compatible forges: building the authorization page URL,
//! exchanging the callback code for an access token, and fetching the
//! account that owns the token.

use crate::endpoint::Endpoint;
use async_trait::async_trait;
use fd_types::{Account, AppError, AppResult};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use tracing::{debug, error, info, warn};

/// Redirect URI registered with the OAuth application. The desktop shell
/// owns the `forgedesk://` scheme and forwards callback URLs to the broker.
pub const OAUTH_CALLBACK_URL: &str = "forgedesk://oauth-callback";

/// User-Agent sent with every request; forges reject anonymous API clients.
const USER_AGENT: &str = concat!("ForgeDesk/", env!("CARGO_PKG_VERSION"));

/// OAuth application registered on codeberg.org for development builds.
/// Release builds and self-hosted setups override these via the environment.
const DEV_CLIENT_ID: &str = "6a0f7f55-1c2f-44e5-9e4c-b0a4dd1a2b6e";
const DEV_CLIENT_SECRET: &str = "gto_4c1f0a2d9b8e7f6a5c4d3b2a1908f7e6d5c4b3a2";

/// Credentials of the OAuth application driving the browser sign-in flow
#[derive(Debug, Clone)]
pub struct OAuthApplication {
    /// Client ID issued by the forge when the application was registered
    pub client_id: String,
    /// Client secret for the token exchange (confidential client)
    pub client_secret: String,
    /// Scopes requested on the authorization page
    pub scopes: Vec<String>,
}

impl OAuthApplication {
    /// Credentials from `FORGEDESK_OAUTH_CLIENT_ID` /
    /// `FORGEDESK_OAUTH_CLIENT_SECRET`, each falling back to the built-in
    /// development application when unset.
    pub fn from_env() -> Self {
        let client_id =
            env::var("FORGEDESK_OAUTH_CLIENT_ID").unwrap_or_else(|_| DEV_CLIENT_ID.to_string());
        let client_secret = env::var("FORGEDESK_OAUTH_CLIENT_SECRET")
            .unwrap_or_else(|_| DEV_CLIENT_SECRET.to_string());

        Self {
            client_id,
            client_secret,
            scopes: default_scopes(),
        }
    }
}

impl Default for OAuthApplication {
    fn default() -> Self {
        Self {
            client_id: DEV_CLIENT_ID.to_string(),
            client_secret: DEV_CLIENT_SECRET.to_string(),
            scopes: default_scopes(),
        }
    }
}

fn default_scopes() -> Vec<String> {
    vec!["read:user".to_string(), "repository".to_string()]
}

/// Network operations consumed by the sign-in broker.
///
/// [`ForgeClient`] is the production implementation; tests substitute
/// recording doubles.
#[async_trait]
pub trait AuthorizationApi: Send + Sync {
    /// Build the browser authorization URL for `endpoint`, embedding `state`
    /// as the anti-forgery parameter. Pure and deterministic.
    fn authorization_url(&self, endpoint: &Endpoint, state: &str) -> String;

    /// Exchange an authorization code for an access token.
    ///
    /// Returns `Ok(None)` when the forge declines the code (denied or
    /// cancelled authorization), `Ok(Some(token))` on success.
    async fn exchange_code(
        &self,
        endpoint: &Endpoint,
        state: &str,
        code: &str,
    ) -> AppResult<Option<String>>;

    /// Fetch the profile of the account that owns `token`.
    async fn fetch_account(&self, endpoint: &Endpoint, token: &str) -> AppResult<Account>;
}

/// Token response from the forge's OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Access token, absent when the forge reports an error instead
    #[serde(default)]
    access_token: Option<String>,

    /// Error code reported instead of a token (e.g. "access_denied")
    #[serde(default)]
    error: Option<String>,

    /// Human-readable error detail
    #[serde(default)]
    error_description: Option<String>,
}

/// HTTP implementation of [`AuthorizationApi`] for Forgejo/Gitea forges
pub struct ForgeClient {
    client: Client,
    app: OAuthApplication,
}

impl ForgeClient {
    /// Create a client for the given OAuth application
    pub fn new(app: OAuthApplication) -> Self {
        Self {
            client: Client::new(),
            app,
        }
    }
}

impl Default for ForgeClient {
    fn default() -> Self {
        Self::new(OAuthApplication::from_env())
    }
}

#[async_trait]
impl AuthorizationApi for ForgeClient {
    fn authorization_url(&self, endpoint: &Endpoint, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            endpoint.web_url("login/oauth/authorize"),
            urlencoding::encode(&self.app.client_id),
            urlencoding::encode(OAUTH_CALLBACK_URL),
            urlencoding::encode(state),
        );

        // Add scopes if the application requests any
        if !self.app.scopes.is_empty() {
            let scopes = self.app.scopes.join(" ");
            url.push_str(&format!("&scope={}", urlencoding::encode(&scopes)));
        }

        url
    }

    async fn exchange_code(
        &self,
        endpoint: &Endpoint,
        state: &str,
        code: &str,
    ) -> AppResult<Option<String>> {
        debug!("Exchanging authorization code against {}", endpoint);

        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), "authorization_code".to_string());
        params.insert("code".to_string(), code.to_string());
        params.insert("redirect_uri".to_string(), OAUTH_CALLBACK_URL.to_string());
        params.insert("client_id".to_string(), self.app.client_id.clone());
        params.insert("client_secret".to_string(), self.app.client_secret.clone());
        params.insert("state".to_string(), state.to_string());

        let response = self
            .client
            .post(endpoint.web_url("login/oauth/access_token"))
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Api(format!("Failed to send token request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(AppError::Api(format!(
                "Token exchange failed with status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Api(format!("Failed to parse token response: {}", e)))?;

        // A 2xx body can still carry a denial instead of a token
        if let Some(error) = token_response.error {
            warn!(
                "Forge declined the authorization code: {} {}",
                error,
                token_response.error_description.unwrap_or_default()
            );
            return Ok(None);
        }

        Ok(token_response.access_token)
    }

    async fn fetch_account(&self, endpoint: &Endpoint, token: &str) -> AppResult<Account> {
        debug!("Fetching authenticated account from {}", endpoint);

        let response = self
            .client
            .get(endpoint.api_url("user"))
            .header("Authorization", format!("token {}", token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| AppError::Api(format!("Failed to send account request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Account fetch failed with status {}: {}", status, body);
            return Err(AppError::Api(format!(
                "Account fetch failed with status {}: {}",
                status, body
            )));
        }

        let account: Account = response
            .json()
            .await
            .map_err(|e| AppError::Api(format!("Failed to parse account response: {}", e)))?;

        info!("Authenticated as {} on {}", account.login, endpoint);

        Ok(account)
    }
}
