use std::time::Duration;

use please_config::OauthOptions;
use serde::Deserialize;
use url::Url;

use crate::callback::{BASE_CALLBACK_PORT, CallbackServer, verify_callback};
use crate::error::AuthError;
use crate::metadata::{AuthorizationEndpoints, discover};
use crate::pkce::{generate_pkce, generate_state};
use crate::session::{ClientInfo, OAuthSession, TokenResponse};
use crate::store::TokenStore;

/// How long the loopback server waits for the browser redirect
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Drives the OAuth 2.1 authorization-code grant for one upstream server
///
/// Dynamic registration (RFC 7591) with a public client and PKCE-S256 is the
/// primary path; a cached registration and a stored refresh token let
/// subsequent invocations skip the browser entirely.
pub struct OAuthManager {
    server_name: String,
    server_url: Url,
    options: OauthOptions,
    store: TokenStore,
    http: reqwest::Client,
    base_port: u16,
}

/// RFC 7591 registration response; extra fields are ignored
#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

impl OAuthManager {
    pub fn new(
        server_name: impl Into<String>,
        server_url: Url,
        options: OauthOptions,
        store: TokenStore,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            server_url,
            options,
            store,
            http: reqwest::Client::new(),
            base_port: BASE_CALLBACK_PORT,
        }
    }

    /// Override the callback base port (tests)
    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    fn url_key(&self) -> &str {
        self.server_url.as_str()
    }

    /// Produce a usable access token, refreshing or re-authorizing as needed
    ///
    /// Absent session → full flow. Session within the refresh buffer with a
    /// refresh token → refresh grant, falling back to the full flow when the
    /// grant is rejected.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        let Some(session) = self.store.load_session(self.url_key(), true)? else {
            let session = self.authorize().await?;
            return Ok(session.access_token);
        };

        if !session.needs_refresh(chrono::Utc::now()) {
            return Ok(session.access_token);
        }

        match self.refresh(&session).await {
            Ok(refreshed) => Ok(refreshed.access_token),
            Err(e) => {
                tracing::warn!(
                    server = %self.server_name,
                    error = %e,
                    "token refresh failed, starting a fresh authorization flow"
                );
                let session = self.authorize().await?;
                Ok(session.access_token)
            }
        }
    }

    /// A non-interactive token lookup for contexts that must not open a
    /// browser (discovery, execution). Refresh is still attempted.
    pub async fn get_access_token_noninteractive(&self) -> Result<String, AuthError> {
        let Some(session) = self.store.load_session(self.url_key(), true)? else {
            return Err(AuthError::NoSession {
                server: self.server_name.clone(),
            });
        };

        if !session.needs_refresh(chrono::Utc::now()) {
            return Ok(session.access_token);
        }

        match self.refresh(&session).await {
            Ok(refreshed) => Ok(refreshed.access_token),
            Err(_) if !session.is_expired(chrono::Utc::now()) => {
                // Inside the buffer but not yet expired: the old token still works
                Ok(session.access_token)
            }
            Err(_) => Err(AuthError::NoSession {
                server: self.server_name.clone(),
            }),
        }
    }

    /// Run the full interactive authorization flow and persist the session
    pub async fn authorize(&self) -> Result<OAuthSession, AuthError> {
        let endpoints = discover(
            &self.http,
            &self.server_url,
            self.options.authorization_server.as_ref(),
        )
        .await?;

        let callback = CallbackServer::bind(self.base_port).await?;
        let redirect_uri = callback.redirect_uri();

        let client = self.ensure_client(&endpoints, &redirect_uri).await?;

        let state = generate_state();
        let pkce = endpoints.supports_s256().then(generate_pkce);

        let auth_url = self.authorization_url(&endpoints, &client, &redirect_uri, &state, &pkce);

        tracing::info!(
            server = %self.server_name,
            url = %auth_url,
            "opening browser for authorization"
        );
        open_browser(auth_url.as_str());

        let query = callback.wait(CALLBACK_TIMEOUT).await?;
        let code = verify_callback(&query, &state)?;

        let response = self
            .exchange_code(&endpoints, &client, &redirect_uri, &code, pkce.as_ref())
            .await?;

        let session = OAuthSession::from_response(response, chrono::Utc::now());
        self.store.save_session(self.url_key(), &session)?;

        tracing::info!(server = %self.server_name, "authorization complete");
        Ok(session)
    }

    /// Drop the stored session for this upstream
    pub fn revoke(&self) -> Result<(), AuthError> {
        self.store.clear_session(self.url_key())
    }

    /// Cached client registration, or a fresh RFC 7591 registration
    async fn ensure_client(
        &self,
        endpoints: &AuthorizationEndpoints,
        redirect_uri: &str,
    ) -> Result<ClientInfo, AuthError> {
        if let Some(cached) = self.store.load_client_info(self.url_key())? {
            return Ok(cached);
        }

        let registration_endpoint = endpoints.registration_endpoint.as_ref().ok_or_else(|| {
            AuthError::Registration("authorization server offers no registration endpoint".into())
        })?;

        let request = serde_json::json!({
            "client_name": format!("please gateway ({})", self.server_name),
            "redirect_uris": [redirect_uri],
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "none",
        });

        let response = self
            .http
            .post(registration_endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::Registration(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Registration(format!("{status}: {body}")));
        }

        let registered: RegistrationResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Registration(format!("invalid registration response: {e}")))?;

        let info = ClientInfo {
            client_id: registered.client_id,
            client_secret: registered.client_secret,
        };
        self.store.save_client_info(self.url_key(), &info)?;

        tracing::debug!(server = %self.server_name, client_id = %info.client_id, "registered OAuth client");
        Ok(info)
    }

    fn authorization_url(
        &self,
        endpoints: &AuthorizationEndpoints,
        client: &ClientInfo,
        redirect_uri: &str,
        state: &str,
        pkce: &Option<crate::pkce::PkcePair>,
    ) -> Url {
        let mut url = endpoints.authorization_endpoint.clone();

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &client.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("state", state)
                .append_pair("prompt", "consent");

            if let Some(pair) = pkce {
                query
                    .append_pair("code_challenge", &pair.challenge)
                    .append_pair("code_challenge_method", "S256");
            }

            if !self.options.scopes.is_empty() {
                query.append_pair("scope", &self.options.scopes.join(" "));
            }

            if let Some(resource) = &self.options.resource {
                query.append_pair("resource", resource);
            }
        }

        url
    }

    async fn exchange_code(
        &self,
        endpoints: &AuthorizationEndpoints,
        client: &ClientInfo,
        redirect_uri: &str,
        code: &str,
        pkce: Option<&crate::pkce::PkcePair>,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("client_id", client.client_id.clone()),
        ];
        if let Some(pair) = pkce {
            form.push(("code_verifier", pair.verifier.clone()));
        }

        let response = self
            .http
            .post(endpoints.token_endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!("{status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {e}")))
    }

    /// Run the refresh grant and persist the result
    async fn refresh(&self, session: &OAuthSession) -> Result<OAuthSession, AuthError> {
        let refresh_token = session
            .refresh_token
            .as_ref()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token stored".into()))?;

        let client = self
            .store
            .load_client_info(self.url_key())?
            .ok_or_else(|| AuthError::RefreshFailed("no cached client registration".into()))?;

        let endpoints = discover(
            &self.http,
            &self.server_url,
            self.options.authorization_server.as_ref(),
        )
        .await?;

        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
            ("client_id", client.client_id),
        ];

        let response = self
            .http
            .post(endpoints.token_endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("{status}: {body}")));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("invalid token response: {e}")))?;

        self.store.update_tokens(self.url_key(), token_response)
    }
}

/// Launch the platform browser opener; failure is non-fatal since the URL is
/// already logged for manual use.
fn open_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = std::process::Command::new("open");
        c.arg(url);
        c
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/c", "start", "", url]);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut c = std::process::Command::new("xdg-open");
        c.arg(url);
        c
    };

    if let Err(e) = command
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        tracing::warn!(error = %e, "could not open a browser; visit the logged URL manually");
    }
}
