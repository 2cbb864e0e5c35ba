//! Forge API client for ForgeDesk
//!
//! HTTP access to Forgejo/Gitea-compatible forges for the browser sign-in
//! flow: authorization URL construction, authorization code exchange, and
//! authenticated account lookup.

pub mod client;
pub mod endpoint;

pub use client::{AuthorizationApi, ForgeClient, OAuthApplication, OAUTH_CALLBACK_URL};
pub use endpoint::Endpoint;
