#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! OAuth 2.1 client for upstream MCP servers: secure token persistence,
//! endpoint discovery, dynamic client registration, the authorization-code +
//! PKCE flow, and proactive refresh.

mod callback;
mod error;
mod manager;
mod metadata;
mod pkce;
mod session;
mod store;

pub use callback::{BASE_CALLBACK_PORT, CallbackQuery, PORT_PROBE_LIMIT, verify_callback};
pub use error::AuthError;
pub use manager::OAuthManager;
pub use metadata::AuthorizationEndpoints;
pub use session::{ClientInfo, OAuthSession, REFRESH_BUFFER_SECS, TokenResponse};
pub use store::TokenStore;
