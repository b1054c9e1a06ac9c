//! The fluent screen-testing harness

use std::time::Duration;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use reqwest::Response;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    client::{Principal, ScreenClient},
    error::Error,
    router::ScreenRouter,
    stage::Stage,
};

/// Loose key/value mapping used for route parameters, form bodies and
/// session payloads
pub type Params = IndexMap<String, Value>;

/// A throwaway route bound to a screen component, driven through simulated
/// HTTP requests.
///
/// `TestScreen` is a builder-style helper scoped to a single test: register
/// a route for the screen under test, chain configuration, then trigger a
/// request with [`display`](Self::display) (GET) or [`method`](Self::method)
/// (POST) and assert on the returned response.
///
/// # Example
/// ```no_run
/// use serde_json::json;
/// use stagehand::{Stage, TestScreen};
///
/// # async fn example(stage: Stage) -> Result<(), stagehand::Error> {
/// let mut screen = TestScreen::new(&stage);
/// let response = screen
///     .register("profile")?
///     .parameters([("tab", "settings")])
///     .session([("user_id", json!(7))])
///     .display()
///     .await?;
///
/// assert!(response.status().is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TestScreen {
    name: String,
    parameters: Params,
    session: Params,
    follow_redirects: bool,
    router: ScreenRouter,
    client: ScreenClient,
}

impl TestScreen {
    /// Creates a harness with a freshly generated unique route name
    pub fn new(stage: &Stage) -> Self {
        Self::named(stage, generated_name())
    }

    /// Creates a harness with an explicit route name
    pub fn named(stage: &Stage, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Params::new(),
            session: Params::new(),
            follow_redirects: true,
            router: stage.router().clone(),
            client: stage.client().clone(),
        }
    }

    /// The route name this harness registers and resolves
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the screen at `/_test/<name>` with the `"web"` layer
    pub fn register(&mut self, screen_id: &str) -> Result<&mut Self, Error> {
        self.register_with(screen_id, None, &["web"])
    }

    /// Registers the screen at `/_test/<segment>` with the `"web"` layer
    pub fn register_at(&mut self, screen_id: &str, segment: &str) -> Result<&mut Self, Error> {
        self.register_with(screen_id, Some(segment), &["web"])
    }

    /// Registers the screen with an explicit route segment and middleware
    /// list.
    ///
    /// The segment defaults to the route name. The route name index is
    /// refreshed afterwards so the new route is immediately resolvable by
    /// name. Duplicate registrations are not validated; each call adds
    /// another route sharing this harness's configuration.
    pub fn register_with(
        &mut self,
        screen_id: &str,
        segment: Option<&str>,
        middleware: &[&str],
    ) -> Result<&mut Self, Error> {
        let segment = segment.unwrap_or(&self.name);
        self.router.register(screen_id, segment, middleware, &self.name)?;
        self.router.refresh_names();
        Ok(self)
    }

    /// Replaces the stored route parameters wholesale
    pub fn parameters<K, V, I>(&mut self, parameters: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters = collect_params(parameters);
        self
    }

    /// Replaces the stored session payload wholesale
    pub fn session<K, V, I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.session = collect_params(values);
        self
    }

    /// Acts as the given user under the default guard
    pub fn acting_as(&mut self, user: impl Into<Value>) -> &mut Self {
        self.client.set_principal(Principal {
            user: user.into(),
            guard: None,
        });
        self
    }

    /// Synonym of [`acting_as`](Self::acting_as)
    #[inline]
    pub fn be(&mut self, user: impl Into<Value>) -> &mut Self {
        self.acting_as(user)
    }

    /// Acts as the given user under a named guard, passed through unchanged
    pub fn acting_as_via(
        &mut self,
        user: impl Into<Value>,
        guard: impl Into<String>,
    ) -> &mut Self {
        self.client.set_principal(Principal {
            user: user.into(),
            guard: Some(guard.into()),
        });
        self
    }

    /// Sets the session's simulated "previous URL" directly
    #[allow(clippy::should_implement_trait)]
    pub fn from(&mut self, url: &str) -> &mut Self {
        self.client.set_previous_url(url);
        self
    }

    /// Follows redirect responses transparently (the default)
    pub fn following_redirects(&mut self) -> &mut Self {
        self.follow_redirects = true;
        self
    }

    /// Returns redirect responses as-is instead of following them
    pub fn without_following_redirects(&mut self) -> &mut Self {
        self.follow_redirects = false;
        self
    }

    /// Forwards a default header to the client; the client's result is
    /// discarded and the harness is returned for further chaining
    pub fn with_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.client.set_default_header(name, value);
        self
    }

    /// Forwards a `User-Agent` to the client, returning the harness
    pub fn with_user_agent(&mut self, agent: impl Into<String>) -> &mut Self {
        self.client.set_user_agent(agent);
        self
    }

    /// Forwards a request timeout to the client, returning the harness
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.client.set_timeout(timeout);
        self
    }

    /// Issues a GET request against the registered route.
    ///
    /// The URL is built from the route name and the stored parameters; the
    /// stored session payload is injected first. The client's response is
    /// returned unmodified.
    pub async fn display(&self) -> Result<Response, Error> {
        self.display_with(HeaderMap::new()).await
    }

    /// Same as [`display`](Self::display), with extra request headers
    pub async fn display_with(&self, headers: HeaderMap) -> Result<Response, Error> {
        let url = self.route_url(&self.parameters)?;

        tracing::debug!(name = %self.name, %url, "displaying screen");

        self.client.inject_session(self.session.clone());
        self.client.get(&url, headers, self.follow_redirects).await
    }

    /// Invokes a named action on the screen.
    ///
    /// The URL is built from the stored parameters merged with
    /// `method=<action>` (the stored parameters are not mutated); the
    /// session's previous URL is set to that URL before a POST is issued
    /// with `parameters` as the form body.
    pub async fn method<K, V, I>(&self, action: &str, parameters: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.method_with(action, parameters, HeaderMap::new()).await
    }

    /// Same as [`method`](Self::method), with extra request headers
    pub async fn method_with<K, V, I>(
        &self,
        action: &str,
        parameters: I,
        headers: HeaderMap,
    ) -> Result<Response, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let url = self.route_url(&self.action_query(action))?;
        let body = collect_params(parameters);

        tracing::debug!(name = %self.name, action, %url, "calling screen action");

        self.client.inject_session(self.session.clone());
        self.client.set_previous_url(&url);
        self.client
            .post_form(&url, &body, headers, self.follow_redirects)
            .await
    }

    /// Exact alias of [`method`](Self::method)
    #[inline]
    pub async fn call<K, V, I>(&self, action: &str, parameters: I) -> Result<Response, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.method(action, parameters).await
    }

    /// Exact alias of [`method_with`](Self::method_with)
    #[inline]
    pub async fn call_with<K, V, I>(
        &self,
        action: &str,
        parameters: I,
        headers: HeaderMap,
    ) -> Result<Response, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.method_with(action, parameters, headers).await
    }

    /// The stored parameters merged with the action selector
    fn action_query(&self, action: &str) -> Params {
        let mut query = self.parameters.clone();
        query.insert("method".to_owned(), Value::from(action));
        query
    }

    /// Resolves the route name and appends the given parameters as a query
    fn route_url(&self, parameters: &Params) -> Result<String, Error> {
        let path = self.router.resolve(&self.name)?;
        let mut url = format!("{}{path}", self.client.base_url());
        if !parameters.is_empty() {
            let query = serde_urlencoded::to_string(parameters)?;
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }
}

/// Generates a unique route name
fn generated_name() -> String {
    Uuid::new_v4().to_string()
}

fn collect_params<K, V, I>(values: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
