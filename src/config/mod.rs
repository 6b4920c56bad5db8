//! Runtime configuration.
//!
//! Built once at startup from command-line flags and environment variables,
//! then handed to the dispatcher. Nothing reads configuration from globals.

use std::fmt;
use std::time::Duration;

use crate::bear::BearError;

/// Default time to wait for Bear's callback.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the Bear API token.
pub const TOKEN_ENV: &str = "BEAR_API_TOKEN";

#[derive(Clone)]
pub struct Config {
    /// Bear API token, appended to every request.
    token: String,

    /// How long to wait for an `x-success` / `x-error` callback.
    pub callback_timeout: Duration,

    /// Ask Bear not to raise windows or open notes.
    pub background: bool,
}

impl Config {
    /// Creates a configuration with default settings.
    ///
    /// Fails with `MissingToken` when the token is empty or blank.
    pub fn new(token: impl Into<String>) -> Result<Self, BearError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(BearError::MissingToken);
        }

        Ok(Self {
            token,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            background: false,
        })
    }

    /// Builds a configuration from an optional token, as parsed from the CLI.
    pub fn from_token(token: Option<String>) -> Result<Self, BearError> {
        Self::new(token.unwrap_or_default())
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Keep the token out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"***")
            .field("callback_timeout", &self.callback_timeout)
            .field("background", &self.background)
            .finish()
    }
}
