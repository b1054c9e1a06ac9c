//! Route registration and name lookup tools

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use indexmap::IndexMap;

use crate::{error::Error, middleware::MiddlewareFn, screen::Screen};

/// Every harness route lives under this path prefix
pub(crate) const ROUTE_PREFIX: &str = "/_test/";

/// A registered route: the resolved screen component, its middleware
/// pipeline and the route name.
#[derive(Clone)]
pub(crate) struct RouteEntry {
    pub(crate) screen: Arc<Screen>,
    pub(crate) layers: Vec<MiddlewareFn>,
    pub(crate) name: String,
    pub(crate) middleware: Vec<String>,
}

struct RouterInner {
    screens: IndexMap<String, Arc<Screen>>,
    layers: IndexMap<String, MiddlewareFn>,
    routes: IndexMap<String, RouteEntry>,
    names: HashMap<String, String>,
    names_stale: bool,
}

/// The route table screens are registered against.
///
/// Routes are matched by the path segment following [`ROUTE_PREFIX`]. The
/// name → path index is built lazily: registrations mark it stale and
/// [`refresh_names`](Self::refresh_names) rebuilds it, so a freshly
/// registered route is only resolvable by name after a refresh.
///
/// Cloning produces another handle to the same table.
#[derive(Clone)]
pub struct ScreenRouter {
    inner: Arc<RwLock<RouterInner>>,
}

impl std::fmt::Debug for ScreenRouter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenRouter(...)").finish()
    }
}

impl Default for ScreenRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenRouter {
    /// Creates an empty route table
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RouterInner {
                screens: IndexMap::new(),
                layers: IndexMap::new(),
                routes: IndexMap::new(),
                names: HashMap::new(),
                names_stale: false,
            })),
        }
    }

    /// Makes a screen component resolvable under `id`
    pub fn add_screen(&self, id: impl Into<String>, screen: Screen) {
        self.inner
            .write()
            .expect("poisoned router lock")
            .screens
            .insert(id.into(), Arc::new(screen));
    }

    /// Makes a middleware layer attachable under `name`
    pub fn add_layer(&self, name: impl Into<String>, layer: MiddlewareFn) {
        self.inner
            .write()
            .expect("poisoned router lock")
            .layers
            .insert(name.into(), layer);
    }

    /// Registers a route at `/_test/<segment>` bound to the screen
    /// resolved from `screen_id`, with the named middleware layers
    /// attached, under the route name `name`.
    ///
    /// Unresolvable screen identifiers and unknown layer names fail here;
    /// duplicate segments or names are not validated, the last registration
    /// wins.
    pub fn register(
        &self,
        screen_id: &str,
        segment: &str,
        middleware: &[&str],
        name: &str,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write().expect("poisoned router lock");

        let screen = inner
            .screens
            .get(screen_id)
            .cloned()
            .ok_or_else(|| Error::not_found(
                format!("unresolvable screen component {screen_id:?}")
            ))?;

        let mut layers = Vec::with_capacity(middleware.len());
        for layer_name in middleware {
            let layer = inner
                .layers
                .get(*layer_name)
                .cloned()
                .ok_or_else(|| Error::not_found(
                    format!("unknown middleware layer {layer_name:?}")
                ))?;
            layers.push(layer);
        }

        tracing::debug!(segment, name, "registering screen route");

        let entry = RouteEntry {
            screen,
            layers,
            name: name.to_owned(),
            middleware: middleware.iter().map(|m| (*m).to_owned()).collect(),
        };
        inner.routes.insert(segment.to_owned(), entry);
        inner.names_stale = true;
        Ok(())
    }

    /// Rebuilds the name → path index from the current route table
    pub fn refresh_names(&self) {
        let mut inner = self.inner.write().expect("poisoned router lock");

        let names = inner
            .routes
            .iter()
            .map(|(segment, entry)| {
                (entry.name.clone(), format!("{ROUTE_PREFIX}{segment}"))
            })
            .collect();
        inner.names = names;
        inner.names_stale = false;

        tracing::trace!(routes = inner.names.len(), "route name index refreshed");
    }

    /// Resolves a route name to its path through the name index.
    ///
    /// Registrations made since the last [`refresh_names`](Self::refresh_names)
    /// are not visible here.
    pub fn resolve(&self, name: &str) -> Result<String, Error> {
        let inner = self.inner.read().expect("poisoned router lock");
        if inner.names_stale {
            tracing::debug!(name, "name index is stale; recent registrations are not resolvable");
        }
        inner
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no route named {name:?}")))
    }

    /// Looks up the route entry matching a request path
    pub(crate) fn find(&self, path: &str) -> Option<RouteEntry> {
        let segment = path.strip_prefix(ROUTE_PREFIX)?;
        self.inner
            .read()
            .expect("poisoned router lock")
            .routes
            .get(segment)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::ScreenRouter;
    use crate::{middleware::layer_fn, screen::{Screen, View}};
    use hyper::StatusCode;

    fn blank_screen() -> Screen {
        Screen::new(|_| async { Ok(View::text("blank")) })
    }

    fn router_with_screen() -> ScreenRouter {
        let router = ScreenRouter::new();
        router.add_screen("blank", blank_screen());
        router
    }

    #[test]
    fn it_registers_and_finds_route() {
        let router = router_with_screen();

        router.register("blank", "front", &[], "front-route").unwrap();

        let entry = router.find("/_test/front").unwrap();
        assert_eq!(entry.name, "front-route");
        assert!(router.find("/_test/other").is_none());
        assert!(router.find("/front").is_none());
    }

    #[test]
    fn it_rejects_unresolvable_screen() {
        let router = ScreenRouter::new();

        let err = router
            .register("ghost", "front", &[], "front-route")
            .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn it_rejects_unknown_middleware_layer() {
        let router = router_with_screen();

        let err = router
            .register("blank", "front", &["ghost"], "front-route")
            .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn it_resolves_names_only_after_refresh() {
        let router = router_with_screen();
        router.register("blank", "front", &[], "front-route").unwrap();

        assert!(router.resolve("front-route").is_err());

        router.refresh_names();

        assert_eq!(router.resolve("front-route").unwrap(), "/_test/front");
    }

    #[test]
    fn it_keeps_last_registration_for_duplicate_names() {
        let router = router_with_screen();
        router.register("blank", "first", &[], "shared").unwrap();
        router.register("blank", "second", &[], "shared").unwrap();
        router.refresh_names();

        assert_eq!(router.resolve("shared").unwrap(), "/_test/second");
    }

    #[test]
    fn it_attaches_registered_layers() {
        let router = router_with_screen();
        router.add_layer("noop", layer_fn(|ctx, next| next(ctx)));

        router
            .register("blank", "front", &["noop"], "front-route")
            .unwrap();

        let entry = router.find("/_test/front").unwrap();
        assert_eq!(entry.layers.len(), 1);
        assert_eq!(entry.middleware, vec!["noop"]);
    }
}
