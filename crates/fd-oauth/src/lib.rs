//! Browser sign-in flow for ForgeDesk
//!
//! Implements the single-flight, browser-delegated OAuth handshake: the
//! broker opens the forge's authorization page in the user's browser, the
//! desktop shell feeds the `forgedesk://` deep-link callback back in, and
//! the pending handle settles with the authenticated account.

pub mod broker;
pub mod browser;
pub mod callback;
pub mod state;

pub use broker::{AuthorizationBroker, PendingSignIn};
pub use browser::{SystemBrowser, UrlOpener};
pub use callback::{parse_callback_url, OAuthCallback};
pub use state::generate_login_state;
