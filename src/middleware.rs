//! Middleware layers and pipeline composition

use std::{future::Future, sync::Arc};

use futures_util::future::BoxFuture;
use hyper::{
    header::{HeaderValue, WWW_AUTHENTICATE},
    StatusCode,
};

use crate::{
    screen::{ScreenContext, ScreenResult, View},
    session::SessionStore,
};

/// Points to the next middleware layer or the screen handler
pub type NextFn = Arc<
    dyn Fn(ScreenContext) -> BoxFuture<'static, ScreenResult>
    + Send
    + Sync
>;

/// Points to a middleware layer
pub type MiddlewareFn = Arc<
    dyn Fn(ScreenContext, NextFn) -> BoxFuture<'static, ScreenResult>
    + Send
    + Sync
>;

/// Wraps an async closure into a [`MiddlewareFn`]
pub fn layer_fn<F, Fut>(layer: F) -> MiddlewareFn
where
    F: Fn(ScreenContext, NextFn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ScreenResult> + Send + 'static,
{
    Arc::new(move |ctx, next| Box::pin(layer(ctx, next)))
}

/// Composes the route's layers around the screen handler into a
/// "Linked List" and returns its head.
///
/// Layers run in registration order; each decides whether to call through
/// to the next one.
pub(crate) fn compose(layers: &[MiddlewareFn], handler: NextFn) -> NextFn {
    let mut next = handler;
    for layer in layers.iter().rev() {
        let current = layer.clone();
        let prev_next = next;
        next = Arc::new(move |ctx| current(ctx, prev_next.clone()));
    }
    next
}

/// The `"web"` layer: attaches the session store to the request context.
///
/// Screens on routes registered without this layer see no session state,
/// injected or otherwise.
pub(crate) fn web_layer(session: SessionStore) -> MiddlewareFn {
    Arc::new(move |mut ctx, next| {
        ctx.attach_session(session.clone());
        next(ctx)
    })
}

/// The `"auth"` layer: rejects requests without an authenticated principal
pub(crate) fn auth_layer() -> MiddlewareFn {
    layer_fn(|ctx, next| async move {
        if ctx.principal().is_none() {
            tracing::debug!("request rejected: no authenticated principal");
            return Ok(View::status(StatusCode::UNAUTHORIZED)
                .with_header(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")));
        }
        next(ctx).await
    })
}

#[cfg(test)]
mod tests {
    use super::{auth_layer, compose, layer_fn, web_layer, NextFn};
    use crate::{
        screen::{ScreenContext, View},
        session::SessionStore,
    };
    use hyper::{http::Method, StatusCode};
    use indexmap::IndexMap;
    use std::sync::{Arc, Mutex};

    fn context() -> ScreenContext {
        ScreenContext {
            method: Method::GET,
            uri: "/_test/front".parse().unwrap(),
            params: IndexMap::new(),
            form: IndexMap::new(),
            headers: Default::default(),
            principal: None,
            session: None,
        }
    }

    fn terminal(calls: Arc<Mutex<Vec<&'static str>>>) -> NextFn {
        Arc::new(move |_ctx| {
            let calls = calls.clone();
            Box::pin(async move {
                calls.lock().unwrap().push("handler");
                Ok(View::text("done"))
            })
        })
    }

    #[tokio::test]
    async fn it_runs_layers_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let calls = calls.clone();
            layer_fn(move |ctx, next| {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push("first");
                    next(ctx).await
                }
            })
        };
        let second = {
            let calls = calls.clone();
            layer_fn(move |ctx, next| {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push("second");
                    next(ctx).await
                }
            })
        };

        let chain = compose(&[first, second], terminal(calls.clone()));
        chain(context()).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn it_runs_bare_handler_without_layers() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let chain = compose(&[], terminal(calls.clone()));
        chain(context()).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["handler"]);
    }

    #[tokio::test]
    async fn it_attaches_session_in_web_layer() {
        let session = SessionStore::new();
        session.insert("user", "kate");

        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let seen_inner = seen.clone();
        let handler: NextFn = Arc::new(move |ctx| {
            let seen = seen_inner.clone();
            Box::pin(async move {
                let value = ctx
                    .session()
                    .and_then(|s| s.get("user"))
                    .and_then(|v| v.as_str().map(str::to_owned));
                *seen.lock().unwrap() = value;
                Ok(View::text("done"))
            })
        });

        let chain = compose(&[web_layer(session)], handler);
        chain(context()).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("kate"));
    }

    #[tokio::test]
    async fn it_rejects_anonymous_requests_in_auth_layer() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let chain = compose(&[auth_layer()], terminal(calls.clone()));
        let view = chain(context()).await.unwrap();

        assert_eq!(view.status_code(), StatusCode::UNAUTHORIZED);
        assert!(calls.lock().unwrap().is_empty());
    }
}
