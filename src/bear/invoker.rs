//! Hands finished URLs to the operating system.

use super::BearError;

/// Something that can open a URL with the system's default handler.
///
/// Opening is fire-and-forget: success only means the OS accepted the URL,
/// not that Bear did anything with it. The dispatcher calls openers on
/// tokio's blocking pool, so an implementation may block.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), BearError>;
}

/// Opens URLs through the platform URL handler via `webbrowser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), BearError> {
        webbrowser::open(url).map_err(|e| BearError::LaunchFailure(e.to_string()))
    }
}
