//! Bear x-callback-url bridge.
//!
//! Turns typed action requests into `bear://x-callback-url/...` URLs, opens
//! them through the operating system, and optionally waits for Bear to report
//! back through a short-lived local HTTP listener.
//!
//! # Submodules
//!
//! - `action` - Typed request variants, one per Bear action, with validation
//! - `url` - Percent-encoding and `bear://` URL construction
//! - `invoker` - Hands finished URLs to the OS URL handler
//! - `callback` - Ephemeral listener that receives `x-success` / `x-error`
//! - `dispatcher` - Ties validation, invocation and callbacks together
//! - `notes` - Typed views over Bear's JSON-encoded callback values

pub mod action;
pub mod callback;
pub mod dispatcher;
pub mod invoker;
pub mod notes;
pub mod url;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

// Re-exports for external use
pub use action::{Action, ActionRequest};
pub use callback::CallbackListener;
pub use dispatcher::{ActionResponse, Dispatcher};
pub use invoker::{SystemOpener, UrlOpener};

/// Base of every URL sent to Bear.
pub const BASE_URL: &str = "bear://x-callback-url";

/// Errors raised while talking to Bear.
#[derive(Debug, thiserror::Error)]
pub enum BearError {
    /// The request failed validation before anything was sent.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// No API token was configured.
    #[error("Missing Bear API token. Set BEAR_API_TOKEN or pass --token.")]
    MissingToken,

    /// The operating system refused to open the URL.
    #[error("Failed to open Bear URL: {0}")]
    LaunchFailure(String),

    /// Bear never called back.
    #[error("Timed out after {}s waiting for Bear to respond", .0.as_secs_f64())]
    CallbackTimeout(Duration),

    /// Bear reported an error through `x-error`.
    #[error("Bear reported an error (code {code}): {message}")]
    ActionFailed { code: i32, message: String },

    /// The local callback listener could not be set up or accept.
    #[error("Callback listener failed: {0}")]
    CallbackListener(#[from] std::io::Error),

    /// Downloading a remote attachment failed.
    #[error("Failed to fetch file: {0}")]
    FileFetch(String),

    /// Bear returned something we could not decode.
    #[error("Malformed response from Bear: {0}")]
    MalformedResponse(String),
}

impl BearError {
    /// Stable name of the error kind, used as structured error data.
    pub fn kind(&self) -> &'static str {
        match self {
            BearError::InvalidParameters(_) => "InvalidParameters",
            BearError::MissingToken => "MissingToken",
            BearError::LaunchFailure(_) => "LaunchFailure",
            BearError::CallbackTimeout(_) => "CallbackTimeout",
            BearError::ActionFailed { .. } => "ActionFailed",
            BearError::CallbackListener(_) => "CallbackListener",
            BearError::FileFetch(_) => "FileFetch",
            BearError::MalformedResponse(_) => "MalformedResponse",
        }
    }
}

/// Query parameters delivered by Bear's `x-success` callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CallbackFields(BTreeMap<String, String>);

impl CallbackFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, String)> for CallbackFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
