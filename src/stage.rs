//! Test stage: the host context screens and layers are installed into

use std::future::Future;

use crate::{
    client::ScreenClient,
    error::Error,
    middleware::{auth_layer, layer_fn, web_layer, MiddlewareFn, NextFn},
    router::ScreenRouter,
    screen::{Screen, ScreenContext, ScreenResult},
    server::ScreenServer,
    session::SessionStore,
};

/// Builder for configuring and booting a [`Stage`].
///
/// Screens and named middleware layers are collected first; [`build`]
/// installs them into a fresh router, spins up the background server and
/// wires the shared session store into the `"web"` layer.
///
/// [`build`]: StageBuilder::build
pub struct StageBuilder {
    screens: Vec<(String, Screen)>,
    layers: Vec<(String, MiddlewareFn)>,
}

impl std::fmt::Debug for StageBuilder {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageBuilder(...)").finish()
    }
}

impl Default for StageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StageBuilder {
    /// Creates a new [`StageBuilder`]
    pub fn new() -> Self {
        Self {
            screens: Vec::new(),
            layers: Vec::new(),
        }
    }

    /// Installs a screen component, resolvable by `id` at registration time
    pub fn with_screen(mut self, id: impl Into<String>, screen: Screen) -> Self {
        self.screens.push((id.into(), screen));
        self
    }

    /// Installs a named middleware layer next to the built-in `"web"` and
    /// `"auth"` ones
    pub fn with_layer<F, Fut>(mut self, name: impl Into<String>, layer: F) -> Self
    where
        F: Fn(ScreenContext, NextFn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScreenResult> + Send + 'static,
    {
        self.layers.push((name.into(), layer_fn(layer)));
        self
    }

    /// Boots the stage: installs screens and layers and starts the server
    pub async fn build(self) -> Result<Stage, Error> {
        let session = SessionStore::new();
        let router = ScreenRouter::new();

        router.add_layer("web", web_layer(session.clone()));
        router.add_layer("auth", auth_layer());
        for (name, layer) in self.layers {
            router.add_layer(name, layer);
        }
        for (id, screen) in self.screens {
            router.add_screen(id, screen);
        }

        let server = ScreenServer::spawn(router.clone()).await?;
        let client = ScreenClient::new(server.url(""), session.clone());

        Ok(Stage {
            router,
            session,
            client,
            server,
        })
    }
}

/// A running test application hosting screen components.
///
/// The stage owns the collaborators a [`TestScreen`](crate::TestScreen)
/// needs (the router, the session store and the HTTP test client) and
/// hands out handles to them explicitly; nothing is resolved from global
/// state.
///
/// # Example
/// ```no_run
/// use stagehand::{Screen, Stage, TestScreen, View};
///
/// # async fn example() -> Result<(), stagehand::Error> {
/// let stage = Stage::builder()
///     .with_screen("counter", Screen::new(|_| async { Ok(View::html("<p>0</p>")) }))
///     .build()
///     .await?;
///
/// let mut screen = TestScreen::new(&stage);
/// let response = screen.register("counter")?.display().await?;
/// assert!(response.status().is_success());
///
/// stage.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Stage {
    router: ScreenRouter,
    session: SessionStore,
    client: ScreenClient,
    server: ScreenServer,
}

impl Stage {
    /// Creates a new [`StageBuilder`]
    #[inline]
    pub fn builder() -> StageBuilder {
        StageBuilder::new()
    }

    /// Boots a stage hosting a single screen.
    ///
    /// Equivalent to:
    ///
    /// ```rust,ignore
    /// Stage::builder()
    ///     .with_screen(id, screen)
    ///     .build()
    ///     .await
    /// ```
    #[inline]
    pub async fn spawn(id: impl Into<String>, screen: Screen) -> Result<Self, Error> {
        StageBuilder::new()
            .with_screen(id, screen)
            .build()
            .await
    }

    /// The stage's route table
    pub fn router(&self) -> &ScreenRouter {
        &self.router
    }

    /// The stage's session store
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// The stage's HTTP test client
    pub fn client(&self) -> &ScreenClient {
        &self.client
    }

    /// Constructs an absolute URL for the given path
    pub fn url(&self, path: &str) -> String {
        self.server.url(path)
    }

    /// Gracefully shuts down the stage's server
    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}
