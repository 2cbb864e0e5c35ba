//! Deep-link callback parsing

use fd_api::OAUTH_CALLBACK_URL;
use fd_types::{AppError, AppResult};
use tracing::debug;

/// Parameters delivered by the forge through the `forgedesk://` deep link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCallback {
    /// Authorization code to exchange for an access token
    pub code: String,
    /// Echo of the anti-forgery state sent with the authorization URL
    pub state: String,
}

/// Parse a `forgedesk://oauth-callback?code=...&state=...` URL as handed
/// over by the operating system's URL scheme handler.
///
/// A provider-reported `error` parameter takes precedence over missing
/// fields so the caller sees the forge's own wording.
pub fn parse_callback_url(url: &str) -> AppResult<OAuthCallback> {
    let query = url
        .strip_prefix(OAUTH_CALLBACK_URL)
        .and_then(|rest| rest.strip_prefix('?'))
        .ok_or_else(|| AppError::OAuth(format!("Unexpected callback URL: {}", url)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        let value = urlencoding::decode(value)
            .map_err(|e| {
                AppError::OAuth(format!("Undecodable callback parameter {}: {}", key, e))
            })?
            .into_owned();

        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            "error_description" => error_description = Some(value),
            _ => debug!("Ignoring unknown callback parameter: {}", key),
        }
    }

    if let Some(error) = error {
        return Err(AppError::OAuth(format!(
            "Callback reported an error: {} {}",
            error,
            error_description.unwrap_or_default()
        )));
    }

    match (code, state) {
        (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => {
            Ok(OAuthCallback { code, state })
        }
        _ => Err(AppError::OAuth(
            "Callback is missing the code or state parameter".to_string(),
        )),
    }
}
