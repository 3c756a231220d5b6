use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

use crate::error::AuthError;

/// Default port for the loopback redirect URI
pub const BASE_CALLBACK_PORT: u16 = 3334;

/// How many consecutive ports are probed before giving up
pub const PORT_PROBE_LIMIT: u16 = 10;

/// Query parameters the authorization server may append to the redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Validate a callback against the state we sent; yields the code
///
/// A state mismatch is treated as CSRF and aborts the flow.
pub fn verify_callback(query: &CallbackQuery, expected_state: &str) -> Result<String, AuthError> {
    if query.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }

    if let Some(error) = &query.error {
        return Err(AuthError::CallbackError {
            error: error.clone(),
            description: query.error_description.clone(),
        });
    }

    query.code.clone().ok_or(AuthError::MissingCode)
}

/// One-shot loopback HTTP server awaiting the authorization redirect
pub struct CallbackServer {
    port: u16,
    result: oneshot::Receiver<CallbackQuery>,
    shutdown: Option<oneshot::Sender<()>>,
}

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<CallbackQuery>>>>;

impl CallbackServer {
    /// Bind the callback server, probing up to ten consecutive ports
    pub async fn bind(base_port: u16) -> Result<Self, AuthError> {
        let (listener, port) = bind_listener(base_port).await?;
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let slot: CallbackSlot = Arc::new(Mutex::new(Some(result_tx)));
        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(slot);

        tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                tracing::warn!(error = %e, "callback server terminated abnormally");
            }
        });

        Ok(Self {
            port,
            result: result_rx,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    /// Wait for the browser redirect
    ///
    /// The five-minute ceiling bounds how long an abandoned sign-in can hold
    /// the port.
    pub async fn wait(mut self, timeout: std::time::Duration) -> Result<CallbackQuery, AuthError> {
        let received = tokio::time::timeout(timeout, &mut self.result).await;
        self.stop();

        match received {
            Ok(Ok(query)) => Ok(query),
            Ok(Err(_)) => Err(AuthError::CallbackTimeout),
            Err(_) => Err(AuthError::CallbackTimeout),
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    let body = if query.error.is_some() {
        "<html><body><h1>Authorization failed</h1>\
         <p>The authorization server reported an error. You can close this tab \
         and check the terminal for details.</p></body></html>"
    } else {
        "<html><body><h1>Authorization complete</h1>\
         <p>You can close this tab and return to the terminal.</p></body></html>"
    };

    if let Some(tx) = slot.lock().await.take() {
        let _ = tx.send(query);
    }

    Html(body)
}

/// Bind the first free port in `base..base+10`
async fn bind_listener(base: u16) -> Result<(TcpListener, u16), AuthError> {
    let end = base + PORT_PROBE_LIMIT - 1;

    for port in base..=end {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                if port != base {
                    tracing::warn!(base, port, "callback port {base} busy, using {port}");
                }
                return Ok((listener, port));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
            Err(e) => {
                return Err(AuthError::Bind {
                    addr: format!("127.0.0.1:{port}"),
                    source: e,
                });
            }
        }
    }

    Err(AuthError::PortsExhausted { start: base, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackQuery {
        CallbackQuery {
            code: code.map(String::from),
            state: state.map(String::from),
            error: error.map(String::from),
            error_description: None,
        }
    }

    #[test]
    fn state_mismatch_is_csrf() {
        let result = verify_callback(&query(Some("c"), Some("other"), None), "expected");
        assert!(matches!(result, Err(AuthError::StateMismatch)));

        let result = verify_callback(&query(Some("c"), None, None), "expected");
        assert!(matches!(result, Err(AuthError::StateMismatch)));
    }

    #[test]
    fn server_error_surfaces() {
        let result = verify_callback(&query(None, Some("s"), Some("access_denied")), "s");
        assert!(matches!(result, Err(AuthError::CallbackError { .. })));
    }

    #[test]
    fn missing_code_is_protocol_error() {
        let result = verify_callback(&query(None, Some("s"), None), "s");
        assert!(matches!(result, Err(AuthError::MissingCode)));
    }

    #[test]
    fn valid_callback_yields_code() {
        let code = verify_callback(&query(Some("abc"), Some("s"), None), "s").expect("code");
        assert_eq!(code, "abc");
    }

    #[tokio::test]
    async fn busy_base_port_moves_to_next() {
        let base = 3334;
        let _occupier = TcpListener::bind(("127.0.0.1", base)).await.expect("bind");

        let (listener, port) = bind_listener(base).await.expect("probe");
        assert_eq!(port, base + 1);
        drop(listener);
    }

    #[tokio::test]
    async fn exhausted_range_names_all_ports() {
        let base = 3434;
        let mut occupiers = Vec::new();
        for port in base..base + PORT_PROBE_LIMIT {
            occupiers.push(TcpListener::bind(("127.0.0.1", port)).await.expect("bind"));
        }

        let err = bind_listener(base).await.expect_err("should exhaust");
        let message = err.to_string();
        assert!(message.contains("3434"));
        assert!(message.contains("3443"));
    }

    #[tokio::test]
    async fn callback_server_receives_redirect() {
        let server = CallbackServer::bind(3534).await.expect("bind");
        let uri = format!(
            "http://127.0.0.1:{}/callback?code=abc&state=xyz",
            server.port()
        );

        tokio::spawn(async move {
            let _ = reqwest::get(uri).await;
        });

        let query = server
            .wait(std::time::Duration::from_secs(5))
            .await
            .expect("callback");
        assert_eq!(query.code.as_deref(), Some("abc"));
        assert_eq!(query.state.as_deref(), Some("xyz"));
    }
}
