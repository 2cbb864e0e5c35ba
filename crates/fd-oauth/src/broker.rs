//! Single-flight browser sign-in broker
//!
//! At most one sign-in attempt is in flight at any time. Beginning an
//! attempt stores the anti-forgery state and a settlement channel in the
//! broker's slot and opens the forge's authorization page in the user's
//! browser. The deep-link callback later drives
//! [`AuthorizationBroker::complete_sign_in`], and the caller finishes the
//! attempt through `resolve_sign_in` / `reject_sign_in`, which settle the
//! [`PendingSignIn`] handle and clear the slot.

use crate::browser::UrlOpener;
use crate::callback::OAuthCallback;
use crate::state::generate_login_state;
use fd_api::{AuthorizationApi, Endpoint};
use fd_types::{Account, AppError, AppResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// In-flight sign-in attempt occupying the broker's single slot
struct LoginSession {
    /// Anti-forgery state embedded in the authorization URL
    state: String,
    /// Forge instance the user is signing in to
    endpoint: Endpoint,
    /// Settles the [`PendingSignIn`] handed to the caller
    settle_tx: oneshot::Sender<AppResult<Account>>,
}

/// Awaitable outcome of a sign-in attempt started by
/// [`AuthorizationBroker::begin_sign_in`]
pub struct PendingSignIn {
    settle_rx: oneshot::Receiver<AppResult<Account>>,
}

impl PendingSignIn {
    /// Wait until the attempt is resolved, rejected, or superseded.
    ///
    /// Never times out on its own: an abandoned browser leaves the handle
    /// pending until a newer attempt supersedes it.
    pub async fn wait(self) -> AppResult<Account> {
        match self.settle_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::OAuth(
                "Sign-in was abandoned before completion".to_string(),
            )),
        }
    }
}

/// Single-flight broker for the browser-delegated OAuth handshake
pub struct AuthorizationBroker {
    /// Network collaborator for URLs, code exchange, and account lookup
    api: Arc<dyn AuthorizationApi>,
    /// Browser collaborator, best-effort
    browser: Arc<dyn UrlOpener>,
    /// The slot; empty when no sign-in is in flight
    session: Mutex<Option<LoginSession>>,
}

impl AuthorizationBroker {
    /// Create a broker over the given collaborators
    pub fn new(api: Arc<dyn AuthorizationApi>, browser: Arc<dyn UrlOpener>) -> Self {
        Self {
            api,
            browser,
            session: Mutex::new(None),
        }
    }

    /// Start a sign-in against `endpoint`.
    ///
    /// Generates a fresh anti-forgery state, stores the attempt in the
    /// slot, and opens the forge's authorization page in the user's
    /// browser. An attempt already in the slot is superseded: its handle
    /// settles with [`AppError::LoginSuperseded`].
    ///
    /// # Returns
    /// * A [`PendingSignIn`] that settles once `resolve_sign_in` or
    ///   `reject_sign_in` is called
    pub fn begin_sign_in(&self, endpoint: Endpoint) -> PendingSignIn {
        let state = generate_login_state();
        let (settle_tx, settle_rx) = oneshot::channel();

        info!("Starting browser sign-in for {}", endpoint);

        let session = LoginSession {
            state: state.clone(),
            endpoint: endpoint.clone(),
            settle_tx,
        };

        // Stash the attempt; settle any attempt it replaces
        let superseded = self.session.lock().replace(session);
        if let Some(stale) = superseded {
            warn!(
                "A sign-in for {} was still pending; superseding it",
                stale.endpoint
            );
            if stale
                .settle_tx
                .send(Err(AppError::LoginSuperseded))
                .is_err()
            {
                debug!("Superseded sign-in handle was already dropped");
            }
        }

        let url = self.api.authorization_url(&endpoint, &state);
        self.browser.open(&url);

        PendingSignIn { settle_rx }
    }

    /// Exchange a deep-link callback for the authenticated account.
    ///
    /// Reads the pending attempt without settling it; deciding between
    /// `resolve_sign_in` and `reject_sign_in` stays with the caller.
    ///
    /// # Returns
    /// * `Ok(Some(account))` when the forge granted a token and the
    ///   account was fetched
    /// * `Ok(None)` when the forge denied the code, or the callback's
    ///   state did not match the pending attempt
    /// * `Err` on network or API failures, or when no attempt is pending
    pub async fn complete_sign_in(&self, callback: &OAuthCallback) -> AppResult<Option<Account>> {
        // Read the attempt under the lock; drop the guard before awaiting
        let (endpoint, expected_state) = {
            let guard = self.session.lock();
            match guard.as_ref() {
                Some(session) => (session.endpoint.clone(), session.state.clone()),
                None => {
                    error!("Received a sign-in callback with no sign-in in progress");
                    return Err(AppError::NoPendingLogin);
                }
            }
        };

        if callback.state != expected_state {
            warn!("Callback state does not match the pending sign-in; treating as denied");
            return Ok(None);
        }

        let token = match self
            .api
            .exchange_code(&endpoint, &expected_state, &callback.code)
            .await?
        {
            Some(token) => token,
            None => {
                info!("Forge declined the authorization code for {}", endpoint);
                return Ok(None);
            }
        };

        let account = self.api.fetch_account(&endpoint, &token).await?;
        Ok(Some(account))
    }

    /// Settle the pending attempt with `account` and clear the slot.
    ///
    /// Returns [`AppError::NoPendingLogin`] when the slot is empty, which
    /// also covers settling the same attempt twice.
    pub fn resolve_sign_in(&self, account: Account) -> AppResult<()> {
        let session = self.session.lock().take().ok_or_else(|| {
            error!("resolve_sign_in called with no sign-in in progress");
            AppError::NoPendingLogin
        })?;

        info!(
            "Sign-in to {} resolved as {}",
            session.endpoint, account.login
        );
        if session.settle_tx.send(Ok(account)).is_err() {
            debug!("Sign-in handle was dropped before resolution");
        }

        Ok(())
    }

    /// Settle the pending attempt with `error` and clear the slot.
    pub fn reject_sign_in(&self, error: AppError) -> AppResult<()> {
        let session = self.session.lock().take().ok_or_else(|| {
            error!("reject_sign_in called with no sign-in in progress");
            AppError::NoPendingLogin
        })?;

        info!("Sign-in to {} rejected: {}", session.endpoint, error);
        if session.settle_tx.send(Err(error)).is_err() {
            debug!("Sign-in handle was dropped before rejection");
        }

        Ok(())
    }

    /// Whether an attempt currently occupies the slot
    pub fn has_pending_sign_in(&self) -> bool {
        self.session.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubApi {
        /// Token handed out by `exchange_code`; `None` simulates a denial
        token: Option<String>,
        exchange_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
    }

    impl StubApi {
        fn granting(token: &str) -> Self {
            Self {
                token: Some(token.to_string()),
                exchange_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
            }
        }

        fn denying() -> Self {
            Self {
                token: None,
                exchange_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthorizationApi for StubApi {
        fn authorization_url(&self, endpoint: &Endpoint, state: &str) -> String {
            format!(
                "{}/login/oauth/authorize?response_type=code&state={}",
                endpoint.as_str(),
                state
            )
        }

        async fn exchange_code(
            &self,
            _endpoint: &Endpoint,
            _state: &str,
            code: &str,
        ) -> AppResult<Option<String>> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            if code == "errcode" {
                return Err(AppError::Api("token endpoint unreachable".to_string()));
            }
            Ok(self.token.clone())
        }

        async fn fetch_account(&self, _endpoint: &Endpoint, _token: &str) -> AppResult<Account> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(test_account(1, "alice"))
        }
    }

    #[derive(Default)]
    struct RecordingBrowser {
        opened: Mutex<Vec<String>>,
    }

    impl UrlOpener for RecordingBrowser {
        fn open(&self, url: &str) {
            self.opened.lock().push(url.to_string());
        }
    }

    fn test_account(id: u64, login: &str) -> Account {
        Account {
            id,
            login: login.to_string(),
            full_name: None,
            email: None,
            avatar_url: None,
        }
    }

    fn test_endpoint() -> Endpoint {
        Endpoint::new("https://example.com").unwrap()
    }

    fn test_broker(api: StubApi) -> (AuthorizationBroker, Arc<StubApi>, Arc<RecordingBrowser>) {
        let api = Arc::new(api);
        let browser = Arc::new(RecordingBrowser::default());
        let broker = AuthorizationBroker::new(api.clone(), browser.clone());
        (broker, api, browser)
    }

    /// State parameter of the URL the stub built in `authorization_url`
    fn state_from_url(url: &str) -> String {
        url.split("state=").nth(1).unwrap().to_string()
    }

    #[test]
    fn test_begin_sign_in_opens_authorization_url() {
        let (broker, _api, browser) = test_broker(StubApi::granting("tok"));

        let _pending = broker.begin_sign_in(test_endpoint());

        let opened = browser.opened.lock();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].starts_with("https://example.com/login/oauth/authorize"));

        let state = state_from_url(&opened[0]);
        assert_eq!(state.len(), 32);
        assert!(broker.has_pending_sign_in());
    }

    #[test]
    fn test_each_attempt_gets_fresh_state() {
        let (broker, _api, browser) = test_broker(StubApi::granting("tok"));

        let _first = broker.begin_sign_in(test_endpoint());
        let _second = broker.begin_sign_in(test_endpoint());

        let opened = browser.opened.lock();
        assert_ne!(state_from_url(&opened[0]), state_from_url(&opened[1]));
    }

    #[tokio::test]
    async fn test_begin_supersedes_pending_attempt() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let first = broker.begin_sign_in(test_endpoint());
        let second = broker.begin_sign_in(test_endpoint());

        // The stale handle settles instead of hanging forever
        let result = first.wait().await;
        assert!(matches!(result, Err(AppError::LoginSuperseded)));

        // The newer attempt is still live
        assert!(broker.has_pending_sign_in());
        broker.resolve_sign_in(test_account(1, "alice")).unwrap();
        let account = second.wait().await.unwrap();
        assert_eq!(account.login, "alice");
    }

    #[tokio::test]
    async fn test_resolve_settles_handle_and_clears_slot() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let pending = broker.begin_sign_in(test_endpoint());
        broker.resolve_sign_in(test_account(7, "bob")).unwrap();

        let account = pending.wait().await.unwrap();
        assert_eq!(account.id, 7);
        assert_eq!(account.login, "bob");
        assert!(!broker.has_pending_sign_in());
    }

    #[tokio::test]
    async fn test_reject_settles_handle_with_error() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let pending = broker.begin_sign_in(test_endpoint());
        broker
            .reject_sign_in(AppError::OAuth("user closed the browser".to_string()))
            .unwrap();

        let result = pending.wait().await;
        assert!(matches!(result, Err(AppError::OAuth(_))));
        assert!(!broker.has_pending_sign_in());
    }

    #[test]
    fn test_resolve_without_pending_sign_in() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let result = broker.resolve_sign_in(test_account(1, "alice"));
        assert!(matches!(result, Err(AppError::NoPendingLogin)));
        assert!(!broker.has_pending_sign_in());
    }

    #[test]
    fn test_reject_without_pending_sign_in() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let result = broker.reject_sign_in(AppError::OAuth("nope".to_string()));
        assert!(matches!(result, Err(AppError::NoPendingLogin)));
    }

    #[tokio::test]
    async fn test_resolve_twice_hits_empty_slot() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let pending = broker.begin_sign_in(test_endpoint());
        broker.resolve_sign_in(test_account(1, "alice")).unwrap();
        pending.wait().await.unwrap();

        // The first resolve cleared the slot
        let result = broker.resolve_sign_in(test_account(2, "mallory"));
        assert!(matches!(result, Err(AppError::NoPendingLogin)));
    }

    #[tokio::test]
    async fn test_complete_sign_in_without_pending_sign_in() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let callback = OAuthCallback {
            code: "abc".to_string(),
            state: "xyz".to_string(),
        };
        let result = broker.complete_sign_in(&callback).await;
        assert!(matches!(result, Err(AppError::NoPendingLogin)));
    }

    #[tokio::test]
    async fn test_complete_sign_in_returns_account() {
        let (broker, api, browser) = test_broker(StubApi::granting("tok123"));

        let _pending = broker.begin_sign_in(test_endpoint());
        let state = state_from_url(&browser.opened.lock()[0]);

        let callback = OAuthCallback {
            code: "goodcode".to_string(),
            state,
        };
        let account = broker.complete_sign_in(&callback).await.unwrap().unwrap();

        assert_eq!(account.login, "alice");
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);

        // Completion leaves finalization to the caller
        assert!(broker.has_pending_sign_in());
    }

    #[tokio::test]
    async fn test_complete_sign_in_denied_skips_account_fetch() {
        let (broker, api, browser) = test_broker(StubApi::denying());

        let _pending = broker.begin_sign_in(test_endpoint());
        let state = state_from_url(&browser.opened.lock()[0]);

        let callback = OAuthCallback {
            code: "badcode".to_string(),
            state,
        };
        let result = broker.complete_sign_in(&callback).await.unwrap();

        assert!(result.is_none());
        assert_eq!(api.exchange_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_sign_in_state_mismatch_is_denied() {
        let (broker, api, _browser) = test_broker(StubApi::granting("tok"));

        let _pending = broker.begin_sign_in(test_endpoint());

        let callback = OAuthCallback {
            code: "goodcode".to_string(),
            state: "forged-state-value".to_string(),
        };
        let result = broker.complete_sign_in(&callback).await.unwrap();

        // A mismatched callback never reaches the network
        assert!(result.is_none());
        assert_eq!(api.exchange_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_sign_in_propagates_exchange_failure() {
        let (broker, _api, browser) = test_broker(StubApi::granting("tok"));

        let _pending = broker.begin_sign_in(test_endpoint());
        let state = state_from_url(&browser.opened.lock()[0]);

        let callback = OAuthCallback {
            code: "errcode".to_string(),
            state,
        };
        let result = broker.complete_sign_in(&callback).await;
        assert!(matches!(result, Err(AppError::Api(_))));
    }

    #[tokio::test]
    async fn test_dropped_broker_settles_handle() {
        let (broker, _api, _browser) = test_broker(StubApi::granting("tok"));

        let pending = broker.begin_sign_in(test_endpoint());
        drop(broker);

        let result = pending.wait().await;
        assert!(matches!(result, Err(AppError::OAuth(_))));
    }
}
