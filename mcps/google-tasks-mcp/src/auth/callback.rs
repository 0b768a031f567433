//! One-shot loopback listener for the OAuth redirect

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use url::Url;

use super::error::{AuthError, AuthResult};

const SUCCESS_HTML: &str =
    "<html><body><h1>Authentication successful</h1><p>You may close this window.</p></body></html>";
const ERROR_HTML: &str =
    "<html><body><h1>Authentication failed</h1><p>You may close this window and retry.</p></body></html>";
const MAX_REQUEST_BYTES: usize = 8192;
/// Per connection; browsers keep spare connections open without sending
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug)]
pub struct CallbackListener {
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
    redirect_uri: Url,
}

/// A connection together with its (possibly timed out) request head
type ReadOutcome = (
    TcpStream,
    SocketAddr,
    Result<std::io::Result<String>, tokio::time::error::Elapsed>,
);

impl CallbackListener {
    /// Bind on the host/port of a loopback redirect URI (port 0 or none means
    /// ephemeral) and fix up the URI with the port actually bound.
    ///
    /// `localhost` listens on both 127.0.0.1 and ::1 with the same port.
    pub async fn bind(redirect_uri: &str) -> AuthResult<Self> {
        let mut redirect_uri = Url::parse(redirect_uri).map_err(|e| {
            AuthError::Configuration(format!("invalid redirect URI {redirect_uri:?}: {e}"))
        })?;

        let bind_hosts: &[&str] = match redirect_uri.host_str() {
            Some("localhost") => &["127.0.0.1", "::1"],
            Some("127.0.0.1") => &["127.0.0.1"],
            Some("[::1]") => &["::1"],
            other => {
                return Err(AuthError::Configuration(format!(
                    "interactive consent needs a loopback redirect URI, got host {:?}",
                    other.unwrap_or_default()
                )))
            }
        };

        let mut port = redirect_uri.port().unwrap_or(0);
        let mut listener_v4 = None;
        let mut listener_v6 = None;
        let mut bind_errors = Vec::new();

        for host in bind_hosts {
            let listener = match TcpListener::bind((*host, port)).await {
                Ok(listener) => listener,
                Err(e) => {
                    bind_errors.push(format!("{host}:{port} ({e})"));
                    continue;
                }
            };
            port = listener
                .local_addr()
                .map_err(|e| AuthError::provider(format!("callback listener has no address: {e}")))?
                .port();
            if host.contains(':') {
                listener_v6 = Some(listener);
            } else {
                listener_v4 = Some(listener);
            }
        }

        if listener_v4.is_none() && listener_v6.is_none() {
            return Err(AuthError::provider(format!(
                "cannot listen for the OAuth redirect: {}",
                bind_errors.join("; ")
            )));
        }
        if !bind_errors.is_empty() {
            tracing::debug!("Callback listener bound partially: {}", bind_errors.join("; "));
        }

        redirect_uri
            .set_port(Some(port))
            .map_err(|_| AuthError::Configuration("redirect URI cannot carry a port".into()))?;

        Ok(Self {
            listener_v4,
            listener_v6,
            redirect_uri,
        })
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        match (&self.listener_v4, &self.listener_v6) {
            (Some(v4), Some(v6)) => tokio::select! {
                accepted = v4.accept() => accepted,
                accepted = v6.accept() => accepted,
            },
            (Some(listener), None) | (None, Some(listener)) => listener.accept().await,
            (None, None) => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no callback listener bound",
            )),
        }
    }

    /// Wait, without timeout, for the browser to deliver the redirect
    ///
    /// Connections are read concurrently, each with its own read timeout.
    /// Unrelated requests (favicon probes and the like) are answered with 404
    /// and ignored.
    pub async fn wait_for_callback(&self, expected_state: &str) -> AuthResult<CallbackPayload> {
        let mut reads: JoinSet<ReadOutcome> = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.accept() => {
                    let (mut socket, peer) = accepted
                        .map_err(|e| AuthError::provider(format!("callback accept failed: {e}")))?;
                    reads.spawn(async move {
                        let head = tokio::time::timeout(
                            REQUEST_READ_TIMEOUT,
                            read_request_head(&mut socket),
                        )
                        .await;
                        (socket, peer, head)
                    });
                }
                Some(joined) = reads.join_next() => {
                    let Ok((mut socket, peer, head)) = joined else {
                        continue;
                    };
                    let request = match head {
                        Ok(Ok(request)) => request,
                        Ok(Err(e)) => {
                            tracing::debug!(%peer, "Dropping unreadable callback request: {}", e);
                            continue;
                        }
                        Err(_) => {
                            tracing::debug!(%peer, "Dropping idle callback connection");
                            continue;
                        }
                    };

                    let Some(payload) = request_target(&request).and_then(parse_callback_target)
                    else {
                        respond(&mut socket, "404 Not Found", "").await;
                        continue;
                    };

                    if payload.state.as_deref() != Some(expected_state) {
                        respond(&mut socket, "400 Bad Request", ERROR_HTML).await;
                        return Err(AuthError::provider(
                            "OAuth redirect carried an unexpected state parameter",
                        ));
                    }

                    if payload.error.is_some() {
                        respond(&mut socket, "400 Bad Request", ERROR_HTML).await;
                    } else {
                        respond(&mut socket, "200 OK", SUCCESS_HTML).await;
                    }
                    return Ok(payload);
                }
            }
        }
    }
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(2).any(|w| w == b"\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    if buffer.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty request",
        ));
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Extract the target from an HTTP request line (`GET /?code=.. HTTP/1.1`)
fn request_target(request: &str) -> Option<&str> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    if !method.eq_ignore_ascii_case("GET") {
        return None;
    }
    parts.next()
}

/// Parse the redirect query; `None` when it carries neither `code` nor `error`
fn parse_callback_target(target: &str) -> Option<CallbackPayload> {
    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;

    let mut payload = CallbackPayload::default();
    for (key, value) in url.query_pairs() {
        let value = Some(value.into_owned());
        match key.as_ref() {
            "code" => payload.code = value,
            "state" => payload.state = value,
            "error" => payload.error = value,
            "error_description" => payload.error_description = value,
            _ => {}
        }
    }

    if payload.code.is_none() && payload.error.is_none() {
        return None;
    }
    Some(payload)
}
