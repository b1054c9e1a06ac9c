//! Screen components, their request context and responses

use std::{future::Future, sync::Arc};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::Full;
use hyper::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION},
    http::{Method, Uri},
    Response, StatusCode,
};
use indexmap::IndexMap;

use crate::{client::Principal, error::Error, session::SessionStore};

/// The outcome of a screen handler or middleware layer
pub type ScreenResult = Result<View, Error>;

/// Points to a display or action handler of a [`Screen`]
pub type ScreenFn = Arc<
    dyn Fn(ScreenContext) -> BoxFuture<'static, ScreenResult>
    + Send
    + Sync
>;

/// A named UI component under test.
///
/// A screen renders on GET through its display handler and reacts to POST
/// actions through named action handlers. Handlers are plain async closures
/// taking a [`ScreenContext`].
///
/// # Example
/// ```no_run
/// use stagehand::{Screen, View};
///
/// let screen = Screen::new(|_ctx| async { Ok(View::html("<h1>Counter</h1>")) })
///     .on_action("increment", |ctx| async move {
///         Ok(View::back(&ctx))
///     });
/// ```
#[derive(Clone)]
pub struct Screen {
    display: ScreenFn,
    actions: IndexMap<String, ScreenFn>,
}

impl std::fmt::Debug for Screen {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Screen {
    /// Creates a new screen with the given display handler
    pub fn new<F, Fut>(display: F) -> Self
    where
        F: Fn(ScreenContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScreenResult> + Send + 'static,
    {
        Self {
            display: screen_fn(display),
            actions: IndexMap::new(),
        }
    }

    /// Attaches a named action handler
    pub fn on_action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(ScreenContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScreenResult> + Send + 'static,
    {
        self.actions.insert(name.into(), screen_fn(action));
        self
    }

    /// Returns the display handler
    pub(crate) fn display(&self) -> ScreenFn {
        self.display.clone()
    }

    /// Returns the handler of the named action, if the screen defines it
    pub(crate) fn action(&self, name: &str) -> Option<ScreenFn> {
        self.actions.get(name).cloned()
    }
}

/// Wraps an async closure into a [`ScreenFn`]
pub(crate) fn screen_fn<F, Fut>(handler: F) -> ScreenFn
where
    F: Fn(ScreenContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ScreenResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(handler(ctx)))
}

/// Per-request context handed to middleware layers and screen handlers.
///
/// Query and form parameters are exposed as they arrived on the wire;
/// the session handle is only present when the route carries the `"web"`
/// middleware layer.
#[derive(Debug)]
pub struct ScreenContext {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) params: IndexMap<String, String>,
    pub(crate) form: IndexMap<String, String>,
    pub(crate) headers: HeaderMap,
    pub(crate) principal: Option<Principal>,
    pub(crate) session: Option<SessionStore>,
}

impl ScreenContext {
    /// HTTP method of the current request
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URI of the current request
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Query parameters of the current request
    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    /// A single query parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Form body values of the current request (empty for GET)
    pub fn form(&self) -> &IndexMap<String, String> {
        &self.form
    }

    /// A single form value by name
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single request header as a string, by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// The authenticated principal, if one was set for the request
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The session store, if the route carries the `"web"` layer
    pub fn session(&self) -> Option<&SessionStore> {
        self.session.as_ref()
    }

    /// The session's simulated "previous URL" value
    pub fn previous_url(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(SessionStore::previous_url)
    }

    /// Attaches the session store; called by the `"web"` layer
    pub(crate) fn attach_session(&mut self, session: SessionStore) {
        self.session = Some(session);
    }
}

/// A screen's response: status, headers and body.
///
/// Produced by screen handlers and middleware layers, converted into the
/// HTTP response by the server.
#[derive(Debug)]
pub struct View {
    status: StatusCode,
    headers: HeaderMap,
    location: Option<String>,
    content_type: Option<mime::Mime>,
    body: Bytes,
}

impl View {
    /// A `200 OK` response with a plain text body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            location: None,
            content_type: Some(mime::TEXT_PLAIN_UTF_8),
            body: Bytes::from(body.into()),
        }
    }

    /// A `200 OK` response with an HTML body
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            location: None,
            content_type: Some(mime::TEXT_HTML_UTF_8),
            body: Bytes::from(body.into()),
        }
    }

    /// An empty response with the given status code
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            location: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// A `302 Found` redirect to the given location
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            headers: HeaderMap::new(),
            location: Some(location.into()),
            content_type: None,
            body: Bytes::new(),
        }
    }

    /// A `302 Found` redirect back to the session's previous URL,
    /// falling back to `/` when none is recorded
    pub fn back(ctx: &ScreenContext) -> Self {
        let location = ctx.previous_url().unwrap_or_else(|| "/".to_owned());
        Self::redirect(location)
    }

    /// Adds a response header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Status code of this view
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Converts the view into an HTTP response
    pub(crate) fn into_response(self) -> Result<Response<Full<Bytes>>, Error> {
        let mut response = Response::builder()
            .status(self.status)
            .body(Full::new(self.body))?;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            headers.insert(name, value.clone());
        }
        if let Some(content_type) = self.content_type {
            let value = HeaderValue::from_str(content_type.as_ref())
                .map_err(hyper::http::Error::from)?;
            headers.insert(CONTENT_TYPE, value);
        }
        if let Some(location) = self.location {
            let value = HeaderValue::from_str(&location)
                .map_err(hyper::http::Error::from)?;
            headers.insert(LOCATION, value);
        }
        Ok(response)
    }
}
