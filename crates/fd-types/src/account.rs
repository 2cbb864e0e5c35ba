//! Authenticated account profile

use serde::{Deserialize, Serialize};

/// Profile of the user that completed a browser sign-in, as returned by the
/// forge's `/api/v1/user` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable numeric identifier assigned by the forge
    pub id: u64,
    /// Login name used for attribution and URLs
    pub login: String,
    /// Display name, when the user has set one
    #[serde(default)]
    pub full_name: Option<String>,
    /// Primary email address, when visible to the token's scopes
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
}
