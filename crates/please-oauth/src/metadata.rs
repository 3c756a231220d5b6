use serde::Deserialize;
use url::Url;

use crate::error::AuthError;

/// Resolved authorization-server endpoints for one upstream
#[derive(Debug, Clone)]
pub struct AuthorizationEndpoints {
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub registration_endpoint: Option<Url>,
    pub code_challenge_methods_supported: Vec<String>,
}

impl AuthorizationEndpoints {
    /// PKCE is used iff the server advertises S256 support
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == "S256")
    }
}

/// Protected-resource metadata (RFC 9728)
#[derive(Debug, Deserialize)]
struct ProtectedResourceMetadata {
    #[serde(default)]
    authorization_servers: Vec<Url>,
}

/// Authorization-server metadata (RFC 8414)
#[derive(Debug, Deserialize)]
struct ServerMetadata {
    authorization_endpoint: Url,
    token_endpoint: Url,
    #[serde(default)]
    registration_endpoint: Option<Url>,
    #[serde(default)]
    code_challenge_methods_supported: Vec<String>,
}

/// Discover the authorization endpoints for an upstream MCP server
///
/// Order of preference:
/// 1. protected-resource metadata at the upstream origin naming an
///    authorization server, whose own metadata is then fetched;
/// 2. authorization-server metadata at the upstream origin itself;
/// 3. hard-coded `/authorize`, `/token`, `/register` on the origin.
///
/// An explicit `authorization_server` from config short-circuits steps 1-2.
pub async fn discover(
    http: &reqwest::Client,
    server_url: &Url,
    authorization_server: Option<&Url>,
) -> Result<AuthorizationEndpoints, AuthError> {
    if let Some(issuer) = authorization_server {
        return fetch_server_metadata(http, issuer).await;
    }

    let origin = origin_of(server_url)?;

    if let Some(issuer) = fetch_protected_resource(http, &origin).await {
        match fetch_server_metadata(http, &issuer).await {
            Ok(endpoints) => return Ok(endpoints),
            Err(e) => {
                tracing::warn!(
                    issuer = %issuer,
                    error = %e,
                    "protected-resource metadata named an unreachable authorization server"
                );
            }
        }
    }

    if let Ok(endpoints) = fetch_server_metadata(http, &origin).await {
        return Ok(endpoints);
    }

    tracing::debug!(origin = %origin, "no OAuth metadata published, using default endpoints");
    fallback_endpoints(&origin)
}

/// RFC 9728 lookup; returns the first advertised authorization server
async fn fetch_protected_resource(http: &reqwest::Client, origin: &Url) -> Option<Url> {
    let url = well_known(origin, "oauth-protected-resource").ok()?;

    let response = http.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }

    let metadata: ProtectedResourceMetadata = response.json().await.ok()?;
    metadata.authorization_servers.into_iter().next()
}

/// RFC 8414 lookup against an issuer origin
async fn fetch_server_metadata(
    http: &reqwest::Client,
    issuer: &Url,
) -> Result<AuthorizationEndpoints, AuthError> {
    let origin = origin_of(issuer)?;
    let url = well_known(&origin, "oauth-authorization-server")?;

    let response = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| AuthError::Discovery(format!("GET {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(AuthError::Discovery(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }

    let metadata: ServerMetadata = response
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("invalid metadata from {url}: {e}")))?;

    Ok(AuthorizationEndpoints {
        authorization_endpoint: metadata.authorization_endpoint,
        token_endpoint: metadata.token_endpoint,
        registration_endpoint: metadata.registration_endpoint,
        code_challenge_methods_supported: metadata.code_challenge_methods_supported,
    })
}

fn fallback_endpoints(origin: &Url) -> Result<AuthorizationEndpoints, AuthError> {
    let join = |path: &str| {
        origin
            .join(path)
            .map_err(|e| AuthError::Discovery(format!("cannot derive {path} endpoint: {e}")))
    };

    Ok(AuthorizationEndpoints {
        authorization_endpoint: join("/authorize")?,
        token_endpoint: join("/token")?,
        registration_endpoint: Some(join("/register")?),
        code_challenge_methods_supported: Vec::new(),
    })
}

fn origin_of(url: &Url) -> Result<Url, AuthError> {
    let mut origin = url.clone();
    origin.set_path("");
    origin.set_query(None);
    origin.set_fragment(None);
    Ok(origin)
}

fn well_known(origin: &Url, suffix: &str) -> Result<Url, AuthError> {
    origin
        .join(&format!("/.well-known/{suffix}"))
        .map_err(|e| AuthError::Discovery(format!("cannot derive well-known URL: {e}")))
}
