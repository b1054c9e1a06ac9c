//! Background HTTP server hosting the registered screens

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Incoming,
    header::{HeaderValue, ALLOW},
    http::Method,
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use indexmap::IndexMap;
use tokio::{net::TcpListener, sync::oneshot};

use crate::{
    client::decode_principal,
    error::Error,
    middleware::{compose, NextFn},
    router::ScreenRouter,
    screen::ScreenContext,
};

/// A running screen server bound to a randomly assigned local port.
///
/// The server is spawned in the background when a stage is built and shut
/// down gracefully, either explicitly or when dropped. Each instance is
/// fully isolated: no ports or state are shared between stages.
#[derive(Debug)]
pub struct ScreenServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ScreenServer {
    /// Binds to a free local port and starts serving the router's screens.
    ///
    /// The listener is bound before this function returns, so requests can
    /// be issued immediately.
    pub(crate) async fn spawn(router: ScreenRouter) -> Result<Self, Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let (tx, rx) = oneshot::channel();

        let server_handle = tokio::spawn(serve(listener, router, rx));

        tracing::debug!(port, "screen server started");

        Ok(Self {
            port,
            shutdown_tx: Some(tx),
            server_handle: Some(server_handle),
        })
    }

    /// The local port the server is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Constructs an absolute URL for the given path
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    /// Gracefully shuts down the server.
    ///
    /// Signals the accept loop to stop and waits for the background task to
    /// complete, up to a fixed timeout. Calling this is optional; the
    /// server also shuts down when dropped, but an explicit call keeps test
    /// teardown deterministic.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = tokio::time::timeout(
                tokio::time::Duration::from_secs(5),
                handle
            ).await;
        }
    }
}

impl Drop for ScreenServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Accept loop: serves each connection on its own task until shut down
async fn serve(
    listener: TcpListener,
    router: ScreenRouter,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => {
                let (stream, _peer) = match accepted {
                    Ok(connection) => connection,
                    Err(err) => {
                        tracing::error!("error accepting connection: {err:#}");
                        continue;
                    }
                };

                let router = router.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |request| {
                        let router = router.clone();
                        async move {
                            Ok::<_, Infallible>(dispatch(request, router).await)
                        }
                    });

                    let connection = http1::Builder::new()
                        .serve_connection(io, service);
                    if let Err(_err) = connection.await {
                        tracing::debug!("error serving connection: {_err:#}");
                    }
                });
            }
        }
    }

    tracing::debug!("screen server stopped");
}

/// Runs one request through the route table, rendering failures as the
/// HTTP status they correspond to.
async fn dispatch(
    request: Request<Incoming>,
    router: ScreenRouter,
) -> Response<Full<Bytes>> {
    match handle(request, router).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!("request failed: {err}");
            status_response(err.status, err.to_string())
        }
    }
}

async fn handle(
    request: Request<Incoming>,
    router: ScreenRouter,
) -> Result<Response<Full<Bytes>>, Error> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_owned();

    tracing::trace!(path, method = %parts.method, "dispatching screen request");

    let Some(entry) = router.find(&path) else {
        return Ok(status_response(StatusCode::NOT_FOUND, "route not found"));
    };

    tracing::trace!(
        name = %entry.name,
        middleware = ?entry.middleware,
        "matched screen route"
    );

    let params = parse_pairs(parts.uri.query().unwrap_or_default())?;

    let terminal: NextFn = if parts.method == Method::GET || parts.method == Method::HEAD {
        entry.screen.display()
    } else if parts.method == Method::POST {
        let Some(action) = params.get("method").cloned() else {
            return Ok(status_response(
                StatusCode::BAD_REQUEST,
                "missing method parameter",
            ));
        };
        let Some(handler) = entry.screen.action(&action) else {
            return Ok(status_response(
                StatusCode::NOT_FOUND,
                format!("screen has no action {action:?}"),
            ));
        };
        handler
    } else {
        let mut response = status_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed",
        );
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET, HEAD, POST"));
        return Ok(response);
    };

    let form = if parts.method == Method::POST {
        let bytes = body
            .collect()
            .await
            .map_err(Error::server_error)?
            .to_bytes();
        let text = std::str::from_utf8(&bytes).map_err(Error::client_error)?;
        parse_pairs(text)?
    } else {
        IndexMap::new()
    };

    let principal = decode_principal(&parts.headers);

    let ctx = ScreenContext {
        method: parts.method,
        uri: parts.uri,
        params,
        form,
        headers: parts.headers,
        principal,
        // attached by the "web" layer, if the route carries it
        session: None,
    };

    let pipeline = compose(&entry.layers, terminal);
    let view = pipeline(ctx).await?;
    view.into_response()
}

/// Parses a urlencoded query or form body into an ordered map
fn parse_pairs(encoded: &str) -> Result<IndexMap<String, String>, Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded)
        .map_err(Error::client_error)?;
    Ok(pairs.into_iter().collect())
}

/// A plain response carrying a status code and a short text body
fn status_response(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.into())));
    *response.status_mut() = status;
    response
}
