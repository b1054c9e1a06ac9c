//! # Stagehand
//!
//! > Fluent testing harness for UI screens served over HTTP: register a
//! > throwaway route for the screen under test, drive it with simulated GET
//! > and POST requests, and assert on the raw responses.
//!
//! ## Features
//! * Throwaway routes under `/_test/`, resolvable by name
//! * Fluent, chainable request configuration
//! * Simulated session store with redirect-back support
//! * Named middleware layers (`"web"`, `"auth"`, custom)
//! * Authenticated-principal support with pass-through guards
//! * Runs on stable Rust 1.80+
//!
//! ## Example
//! ```no_run
//! use stagehand::{Screen, Stage, TestScreen, View};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stagehand::Error> {
//!     let stage = Stage::builder()
//!         .with_screen("greeter", Screen::new(|ctx| async move {
//!             let name = ctx.param("name").unwrap_or("world").to_owned();
//!             Ok(View::html(format!("<h1>Hello {name}!</h1>")))
//!         }))
//!         .build()
//!         .await?;
//!
//!     let mut screen = TestScreen::new(&stage);
//!     let response = screen
//!         .register("greeter")?
//!         .parameters([("name", "crew")])
//!         .display()
//!         .await?;
//!
//!     assert!(response.status().is_success());
//!
//!     stage.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod harness;
pub mod middleware;
pub mod router;
pub mod screen;
pub mod server;
pub mod session;
pub mod stage;

pub use crate::{
    client::{Principal, ScreenClient},
    error::Error,
    harness::{Params, TestScreen},
    router::ScreenRouter,
    screen::{Screen, ScreenContext, ScreenResult, View},
    server::ScreenServer,
    session::SessionStore,
    stage::{Stage, StageBuilder},
};

/// Middleware composition helpers
pub use crate::middleware::{layer_fn, MiddlewareFn, NextFn};
