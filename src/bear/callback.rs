//! Ephemeral HTTP listener for Bear's `x-success` / `x-error` callbacks.
//!
//! A listener is bound on a fresh loopback port before the Bear URL is
//! opened, and its two callback URLs are embedded in the request. Waiting
//! consumes the listener, so the port is released on every exit path,
//! including when the waiting future is dropped.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use uuid::Uuid;

use super::url::parse_query_string;
use super::{BearError, CallbackFields};

/// How long a single connection may take to send its request head.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a request body we are willing to drain.
const MAX_BODY_BYTES: u64 = 1024 * 1024;

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Bear MCP</title></head>
<body>
    <p>Bear responded. You can close this window.</p>
</body>
</html>"#;

/// A one-shot listener waiting for Bear to call back.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
    request_id: String,
}

/// What a single incoming connection turned out to be.
enum Delivery {
    /// Not for us (wrong path or id); keep waiting.
    Ignored,
    Success(CallbackFields),
    Failure { code: i32, message: String },
}

impl CallbackListener {
    /// Binds a listener on an ephemeral loopback port.
    pub async fn bind() -> Result<Self, BearError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let request_id = Uuid::new_v4().simple().to_string();

        tracing::debug!("Callback listener bound on {addr} for request {request_id}");

        Ok(Self {
            listener,
            addr,
            request_id,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL Bear should open on success.
    pub fn success_url(&self) -> String {
        format!("http://{}/{}/success", self.addr, self.request_id)
    }

    /// URL Bear should open on failure.
    pub fn error_url(&self) -> String {
        format!("http://{}/{}/error", self.addr, self.request_id)
    }

    /// Waits for Bear's callback, giving up after `timeout`.
    ///
    /// Returns the decoded query parameters of the success callback, or
    /// `ActionFailed` if Bear called the error URL.
    pub async fn wait(self, timeout: Duration) -> Result<CallbackFields, BearError> {
        let result = match tokio::time::timeout(timeout, self.accept_callback()).await {
            Ok(result) => result,
            Err(_) => Err(BearError::CallbackTimeout(timeout)),
        };
        tracing::debug!("Releasing callback listener on {}", self.addr);
        result
    }

    /// Accepts connections until one carries this request's callback.
    ///
    /// Connections are read concurrently, so an idle socket (a browser
    /// preconnect, say) cannot hold up a callback queued behind it. Pending
    /// reads are aborted when the returned future is dropped.
    async fn accept_callback(&self) -> Result<CallbackFields, BearError> {
        let request_id: Arc<str> = Arc::from(self.request_id.as_str());
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let request_id = request_id.clone();
                    connections.spawn(async move {
                        (peer, handle_connection(stream, &request_id).await)
                    });
                }
                Some(joined) = connections.join_next() => {
                    let Ok((peer, handled)) = joined else { continue };
                    match handled {
                        Ok(Delivery::Success(fields)) => return Ok(fields),
                        Ok(Delivery::Failure { code, message }) => {
                            return Err(BearError::ActionFailed { code, message })
                        }
                        Ok(Delivery::Ignored) => {
                            tracing::debug!("Ignoring unrelated request from {peer}");
                        }
                        Err(e) => {
                            // Might be a browser prefetch or a half-open connection
                            tracing::debug!("Callback connection from {peer} failed: {e}");
                        }
                    }
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, request_id: &str) -> io::Result<Delivery> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let target = tokio::time::timeout(REQUEST_READ_TIMEOUT, read_request_head(&mut reader))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request head timed out"))??;

    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let outcome = path
        .strip_prefix('/')
        .and_then(|rest| rest.split_once('/'))
        .filter(|(id, _)| *id == request_id)
        .map(|(_, outcome)| outcome);

    let delivery = match outcome {
        Some("success") => Delivery::Success(parse_query_string(query).into_iter().collect()),
        Some("error") => {
            let fields: CallbackFields = parse_query_string(query).into_iter().collect();
            Delivery::Failure {
                code: fields
                    .get("error-Code")
                    .and_then(|c| c.trim().parse().ok())
                    .unwrap_or(0),
                message: fields.get("errorMessage").unwrap_or_default().to_string(),
            }
        }
        _ => Delivery::Ignored,
    };

    match delivery {
        Delivery::Ignored => send_response(&mut writer, 404, "Not Found", "Not Found").await,
        _ => send_response(&mut writer, 200, "OK", SUCCESS_HTML).await,
    }

    Ok(delivery)
}

/// Reads the request line and headers, drains any body, and returns the
/// request target (path plus query).
async fn read_request_head<R>(reader: &mut BufReader<R>) -> io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // GET /<id>/success?identifier=...&title=... HTTP/1.1
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 || !matches!(parts[0], "GET" | "POST") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid HTTP request line",
        ));
    }
    let target = parts[1].to_string();

    let mut content_length: u64 = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    if content_length > 0 {
        let mut body = Vec::new();
        (&mut *reader)
            .take(content_length.min(MAX_BODY_BYTES))
            .read_to_end(&mut body)
            .await?;
    }

    Ok(target)
}

async fn send_response<W>(writer: &mut W, status: u16, status_text: &str, body: &str)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {} {}\r\n\
        Content-Type: text/html\r\n\
        Content-Length: {}\r\n\
        Connection: close\r\n\
        \r\n\
        {}",
        status,
        status_text,
        body.len(),
        body
    );

    let _ = writer.write_all(response.as_bytes()).await;
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Path and query of a callback URL, e.g. `/abc/success`.
    fn path_of(url: &str) -> String {
        format!("/{}", url.splitn(4, '/').nth(3).unwrap())
    }

    async fn send_get(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {target} HTTP/1.1\r\nHost: {addr}\r\nAccept: */*\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_callback_urls_share_request_id() {
        let listener = CallbackListener::bind().await.unwrap();
        let success = listener.success_url();
        let error = listener.error_url();

        assert!(success.starts_with("http://127.0.0.1:"));
        assert!(success.ends_with("/success"));
        assert_eq!(
            success.trim_end_matches("/success"),
            error.trim_end_matches("/error")
        );
    }

    #[tokio::test]
    async fn test_success_callback_returns_fields() {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.local_addr();
        let target = format!(
            "{}?identifier=ABC-123&title=Grocery%20list",
            path_of(&listener.success_url())
        );
        let waiter = tokio::spawn(listener.wait(Duration::from_secs(5)));

        let response = send_get(addr, &target).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let fields = waiter.await.unwrap().unwrap();
        assert_eq!(fields.get("identifier"), Some("ABC-123"));
        assert_eq!(fields.get("title"), Some("Grocery list"));
    }

    #[tokio::test]
    async fn test_error_callback_is_action_failed() {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.local_addr();
        let target = format!(
            "{}?error-Code=499&errorMessage=test%20error%20message",
            path_of(&listener.error_url())
        );
        let waiter = tokio::spawn(listener.wait(Duration::from_secs(5)));

        send_get(addr, &target).await;

        match waiter.await.unwrap() {
            Err(BearError::ActionFailed { code, message }) => {
                assert_eq!(code, 499);
                assert_eq!(message, "test error message");
            }
            other => panic!("expected ActionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrelated_requests_are_ignored() {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.local_addr();
        let target = format!("{}?note=body", path_of(&listener.success_url()));
        let waiter = tokio::spawn(listener.wait(Duration::from_secs(5)));

        let response = send_get(addr, "/favicon.ico").await;
        assert!(response.starts_with("HTTP/1.1 404"));
        let response = send_get(addr, "/someone-else/success?note=x").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        send_get(addr, &target).await;
        let fields = waiter.await.unwrap().unwrap();
        assert_eq!(fields.get("note"), Some("body"));
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_callback() {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.local_addr();
        let target = format!("{}?note=ok", path_of(&listener.success_url()));
        let waiter = tokio::spawn(listener.wait(Duration::from_secs(3)));

        // Connected first, never sends a byte
        let _idle = TcpStream::connect(addr).await.unwrap();
        let _idle_too = TcpStream::connect(addr).await.unwrap();

        let started = std::time::Instant::now();
        let response = send_get(addr, &target).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let fields = waiter.await.unwrap().unwrap();
        assert_eq!(fields.get("note"), Some("ok"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_timeout_releases_port() {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.local_addr();

        let result = listener.wait(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(BearError::CallbackTimeout(_))));

        let rebound = std::net::TcpListener::bind(addr);
        assert!(rebound.is_ok(), "port {} should be free again", addr.port());
    }

    #[tokio::test]
    async fn test_cancelled_wait_releases_port() {
        let listener = CallbackListener::bind().await.unwrap();
        let addr = listener.local_addr();

        let waiter = tokio::spawn(listener.wait(Duration::from_secs(30)));
        waiter.abort();
        let _ = waiter.await;

        assert!(std::net::TcpListener::bind(addr).is_ok());
    }
}
