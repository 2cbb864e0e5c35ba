//! System browser launching

use tracing::warn;

/// Fire-and-forget URL opening.
///
/// The broker never learns whether a browser actually appeared; the
/// sign-in only progresses when the forge redirects back through the
/// deep link.
pub trait UrlOpener: Send + Sync {
    /// Ask the operating environment to open `url` in the default browser
    fn open(&self, url: &str);
}

/// Opens URLs through the platform's default URL handler
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) {
        #[cfg(target_os = "macos")]
        {
            if let Err(e) = std::process::Command::new("open").arg(url).spawn() {
                warn!("Failed to launch browser: {}", e);
            }
        }
        #[cfg(target_os = "linux")]
        {
            if let Err(e) = std::process::Command::new("xdg-open").arg(url).spawn() {
                warn!("Failed to launch browser: {}", e);
            }
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            warn!(
                "Automatic browser launch is not supported on this platform; open manually: {}",
                url
            );
        }
    }
}
