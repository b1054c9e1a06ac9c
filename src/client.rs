//! HTTP test client tools

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use indexmap::IndexMap;
use reqwest::{redirect::Policy, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Error, session::SessionStore};

/// The authenticated principal a test acts as.
///
/// The `guard` names the authentication context the principal should be
/// validated under and is passed through to the screens unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Arbitrary user payload
    pub user: Value,

    /// Authentication guard, `None` for the default one
    pub guard: Option<String>,
}

/// Shared configuration applied to every request the client issues
#[derive(Default)]
struct ClientConfig {
    default_headers: HeaderMap,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    principal: Option<Principal>,
}

/// The HTTP test client the harness delegates requests to.
///
/// Wraps [`reqwest::Client`] construction with the accumulated
/// configuration: default headers, user agent, timeout, redirect policy and
/// the authenticated principal. Cloning produces another handle to the same
/// configuration; the harness never owns this state exclusively.
///
/// This type deliberately exposes a finite set of configuration operations
/// rather than an open-ended forwarding surface.
#[derive(Clone)]
pub struct ScreenClient {
    base_url: String,
    session: SessionStore,
    config: Arc<RwLock<ClientConfig>>,
}

impl std::fmt::Debug for ScreenClient {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ScreenClient {
    pub(crate) fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            base_url: base_url.into(),
            session,
            config: Arc::new(RwLock::new(ClientConfig::default())),
        }
    }

    /// Base URL of the server this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session store the client injects payloads into
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Adds a header sent with every subsequent request
    pub fn set_default_header(&self, name: HeaderName, value: HeaderValue) {
        self.config
            .write()
            .expect("poisoned client config lock")
            .default_headers
            .insert(name, value);
    }

    /// Sets the `User-Agent` used for subsequent requests
    pub fn set_user_agent(&self, agent: impl Into<String>) {
        self.config
            .write()
            .expect("poisoned client config lock")
            .user_agent = Some(agent.into());
    }

    /// Sets the request timeout for subsequent requests
    pub fn set_timeout(&self, timeout: Duration) {
        self.config
            .write()
            .expect("poisoned client config lock")
            .timeout = Some(timeout);
    }

    /// Sets the authenticated principal for subsequent requests
    pub fn set_principal(&self, principal: Principal) {
        self.config
            .write()
            .expect("poisoned client config lock")
            .principal = Some(principal);
    }

    /// Returns the currently configured principal, if any
    pub fn principal(&self) -> Option<Principal> {
        self.config
            .read()
            .expect("poisoned client config lock")
            .principal
            .clone()
    }

    /// Replaces the simulated session payload wholesale
    pub fn inject_session(&self, values: IndexMap<String, Value>) {
        self.session.replace(values);
    }

    /// Sets the session's simulated "previous URL"
    pub fn set_previous_url(&self, url: &str) {
        self.session.set_previous_url(url);
    }

    /// Issues a GET request
    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        follow_redirects: bool,
    ) -> Result<Response, Error> {
        let client = self.build(follow_redirects)?;
        let response = client.get(url).headers(headers).send().await?;
        Ok(response)
    }

    /// Issues a POST request with a form-encoded body
    pub async fn post_form(
        &self,
        url: &str,
        form: &IndexMap<String, Value>,
        headers: HeaderMap,
        follow_redirects: bool,
    ) -> Result<Response, Error> {
        let client = self.build(follow_redirects)?;
        let response = client.post(url).headers(headers).form(form).send().await?;
        Ok(response)
    }

    /// Builds a [`reqwest::Client`] for one request, applying the
    /// accumulated configuration and the redirect policy.
    fn build(&self, follow_redirects: bool) -> Result<reqwest::Client, Error> {
        let config = self.config.read().expect("poisoned client config lock");

        let mut headers = config.default_headers.clone();
        if let Some(principal) = &config.principal {
            headers.insert(AUTHORIZATION, encode_principal(principal)?);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if !follow_redirects {
            builder = builder.redirect(Policy::none());
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder.build()?)
    }
}

/// Serializes the principal into a bearer token header value
pub(crate) fn encode_principal(principal: &Principal) -> Result<HeaderValue, Error> {
    let payload = serde_json::to_vec(principal)?;
    let token = BASE64.encode(payload);
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(hyper::http::Error::from)?;
    Ok(value)
}

/// Recovers the principal from the request headers, if one was sent.
///
/// A missing or malformed token yields no principal rather than a failure;
/// the `"auth"` layer decides whether that is acceptable.
pub(crate) fn decode_principal(headers: &HeaderMap) -> Option<Principal> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    let payload = BASE64.decode(token).ok()?;
    serde_json::from_slice(&payload).ok()
}

#[cfg(test)]
mod tests {
    use super::{decode_principal, encode_principal, Principal, ScreenClient};
    use crate::session::SessionStore;
    use hyper::header::{HeaderMap, AUTHORIZATION};
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn it_round_trips_principal_through_bearer_token() {
        let principal = Principal {
            user: json!({"id": 7, "name": "kate"}),
            guard: Some("api".to_owned()),
        };

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, encode_principal(&principal).unwrap());

        assert_eq!(decode_principal(&headers), Some(principal));
    }

    #[test]
    fn it_yields_no_principal_for_malformed_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer not-base64!".parse().unwrap());

        assert_eq!(decode_principal(&headers), None);
        assert_eq!(decode_principal(&HeaderMap::new()), None);
    }

    #[test]
    fn it_injects_session_payload_into_shared_store() {
        let session = SessionStore::new();
        let client = ScreenClient::new("http://127.0.0.1:0", session.clone());

        let mut payload = IndexMap::new();
        payload.insert("user".to_owned(), json!("kate"));
        client.inject_session(payload);

        assert_eq!(session.get("user"), Some(json!("kate")));
    }

    #[test]
    fn it_shares_configuration_across_handles() {
        let client = ScreenClient::new("http://127.0.0.1:0", SessionStore::new());
        let other = client.clone();

        other.set_principal(Principal { user: json!(1), guard: None });

        assert!(client.principal().is_some());
    }
}
