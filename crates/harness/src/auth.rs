// HTTP login against the admin console.
//
// The console page is guarded by Basic auth. A successful login answers
// with a `jwt` session cookie whose value authenticates admin channels.

use std::fmt;
use std::time::Duration;

use reqwest::header::SET_COOKIE;
use reqwest::{redirect, Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Name of the session cookie the console issues.
pub const SESSION_COOKIE: &str = "jwt";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),

    #[error("request to `{url}` failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

const REDACTED_PREFIX_CHARS: usize = 6;

/// Session token taken from the `jwt` cookie. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Shows a short prefix only, enough to tell tokens apart in logs.
impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_CHARS).collect();
        write!(f, "{prefix}...")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub secure: bool,
}

/// Parse one `Set-Cookie` header value. Attribute names are case-insensitive.
pub fn parse_set_cookie(header: &str) -> Option<SessionCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = SessionCookie {
        name: name.to_owned(),
        value: value.trim().trim_matches('"').to_owned(),
        path: None,
        secure: false,
    };
    for attribute in parts {
        let (key, value) = match attribute.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (attribute.trim(), None),
        };
        if key.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if key.eq_ignore_ascii_case("path") {
            cookie.path = value.map(str::to_owned);
        }
    }
    Some(cookie)
}

/// Result of a Basic-auth request to the console.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub status: StatusCode,
    /// Raw `Set-Cookie` header values, in response order.
    pub set_cookies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LoginClient {
    client: Client,
    console: Url,
}

impl LoginClient {
    pub fn new(console: Url, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(AuthError::Client)?;
        Ok(Self { client, console })
    }

    /// Request the console with `credentials`, or with none at all.
    pub async fn login(&self, credentials: Option<&Credentials>) -> Result<LoginResponse, AuthError> {
        let mut request = self.client.get(self.console.clone());
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.password));
        }

        let response = request.send().await.map_err(|source| AuthError::Request {
            url: self.console.to_string(),
            source,
        })?;

        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        debug!(status = %response.status(), cookies = set_cookies.len(), "console login answered");

        Ok(LoginResponse { status: response.status(), set_cookies })
    }
}
