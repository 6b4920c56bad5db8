//! Action dispatcher.
//!
//! Validates a request, resolves remote attachments, builds the Bear URL,
//! opens it, and for callback actions waits for Bear's reply.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::action::{Action, ActionRequest};
use super::callback::CallbackListener;
use super::invoker::{SystemOpener, UrlOpener};
use super::url::{bear_url, mask_token};
use super::{BearError, CallbackFields};
use crate::config::Config;

/// Outcome of a dispatched action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResponse {
    /// Fire-and-forget action handed to Bear; nothing to read back.
    Acknowledged(Action),
    /// Fields delivered by Bear's `x-success` callback.
    Callback(CallbackFields),
}

/// Sends action requests to Bear.
#[derive(Clone)]
pub struct Dispatcher {
    config: Config,
    opener: Arc<dyn UrlOpener>,
    http: reqwest::Client,
}

impl Dispatcher {
    /// Creates a dispatcher that opens URLs through the operating system.
    pub fn new(config: Config) -> Self {
        Self::with_opener(config, Arc::new(SystemOpener))
    }

    /// Creates a dispatcher with a custom URL opener.
    pub fn with_opener(config: Config, opener: Arc<dyn UrlOpener>) -> Self {
        Self {
            config,
            opener,
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the HTTP client used to download `add-file` attachments.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the URL a request would open, without callback parameters.
    ///
    /// Remote `add-file` attachments are not downloaded here.
    pub fn preview_url(&self, request: &ActionRequest) -> Result<String, BearError> {
        self.build_url(request, None)
    }

    /// Sends a request to Bear and, if the action has one, waits for its reply.
    pub async fn dispatch(&self, request: ActionRequest) -> Result<ActionResponse, BearError> {
        request.validate()?;
        let request = self.resolve_attachments(request).await?;
        let action = request.action();

        if !action.expects_callback() {
            let url = self.build_url(&request, None)?;
            self.open(action, url).await?;
            return Ok(ActionResponse::Acknowledged(action));
        }

        // Bind before opening so Bear can never call back into nothing
        let listener = CallbackListener::bind().await?;
        let url = self.build_url(&request, Some(&listener))?;
        self.open(action, url).await?;

        let fields = listener.wait(self.config.callback_timeout).await?;
        tracing::info!("Bear answered {action} with {} field(s)", fields.len());
        Ok(ActionResponse::Callback(fields))
    }

    fn build_url(
        &self,
        request: &ActionRequest,
        callback: Option<&CallbackListener>,
    ) -> Result<String, BearError> {
        let action = request.action();
        let mut params = request.query_params()?;

        if self.config.background {
            params.extend(
                action
                    .background_flags()
                    .iter()
                    .map(|(key, value)| (*key, value.to_string())),
            );
        }
        params.push(("token", self.config.token().to_string()));
        if let Some(listener) = callback {
            params.push(("x-success", listener.success_url()));
            params.push(("x-error", listener.error_url()));
        }

        Ok(bear_url(
            action.path(),
            params.iter().map(|(key, value)| (*key, value.as_str())),
        ))
    }

    /// Hands the URL to the opener on the blocking pool, since the system
    /// handler may wait on a child process such as `xdg-open`.
    async fn open(&self, action: Action, url: String) -> Result<(), BearError> {
        tracing::debug!("Opening {}", mask_token(&url, self.config.token()));
        let opener = Arc::clone(&self.opener);
        tokio::task::spawn_blocking(move || opener.open(&url))
            .await
            .map_err(|e| BearError::LaunchFailure(format!("URL opener panicked: {e}")))?
            .inspect_err(|e| {
                tracing::warn!("Could not hand {action} to Bear: {e}");
            })
    }

    /// Downloads `add-file` attachments given as URLs and inlines them as base64.
    async fn resolve_attachments(
        &self,
        request: ActionRequest,
    ) -> Result<ActionRequest, BearError> {
        match request {
            ActionRequest::AddFile(mut params) if params.is_remote() => {
                let url = params.file.take().unwrap_or_default();
                params.file = Some(self.fetch_file(&url).await?);
                Ok(ActionRequest::AddFile(params))
            }
            other => Ok(other),
        }
    }

    async fn fetch_file(&self, url: &str) -> Result<String, BearError> {
        tracing::debug!("Downloading attachment from {url}");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BearError::FileFetch(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BearError::FileFetch(format!(
                "{url} returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| BearError::FileFetch(format!("{url}: {e}")))?;
        Ok(STANDARD.encode(&body))
    }
}
