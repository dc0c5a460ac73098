//! Request dispatch
//!
//! `App` is the entry point: it resolves the route of an internal request,
//! enters the request scope and hands the request to the client its URI
//! selects.
//!
//! # Architecture
//!
//! - `Client` is the common `execute(request, response) -> response`
//!   contract; `InternalClient` runs registered controllers and
//!   `ExternalClient` talks to remote origins
//! - `RequestScope` holds the initial and current requests; nested
//!   dispatch restores its caller through a drop guard
//! - `DispatchOutcome` classifies handler results at the internal boundary,
//!   where `ErrorResponder` turns failures into 500 responses

pub mod external;
pub mod internal;
pub mod outcome;
pub mod scope;

use std::rc::Rc;

use tracing::{info, warn};

use crate::config::Config;
use crate::cookie::CookieJar;
use crate::error::Result;
use crate::request::{ClientKind, Request};
use crate::response::Response;
use crate::rest::{FormatterRegistry, MemoryViews, ViewRenderer};
use crate::route::Router;

pub use external::{ExternalClient, Outbound, StreamTransport, Transport};
pub use internal::{Context, Controller, FnController, HandlerRegistry, InternalClient};
pub use outcome::{DispatchOutcome, ErrorResponder};
pub use scope::{RequestScope, ScopeGuard};

/// Executes a request into a response
pub trait Client {
    fn execute(&self, app: &App, request: &Request, response: Response) -> Result<Response>;
}

/// Application: configuration plus everything dispatch needs
///
/// An `App` is single-threaded; nested dispatch happens on the calling
/// thread through `Context::execute`.
pub struct App {
    config: Config,
    router: Router,
    handlers: HandlerRegistry,
    formatters: FormatterRegistry,
    views: Rc<dyn ViewRenderer>,
    error_responder: ErrorResponder,
    cookies: CookieJar,
    internal: InternalClient,
    external: ExternalClient,
    scope: RequestScope,
}

impl App {
    /// Application with the default route, the built-in formatters and an
    /// empty in-memory view set
    pub fn new(config: Config) -> Self {
        App {
            router: Router::with_default_route(),
            handlers: HandlerRegistry::new(),
            formatters: FormatterRegistry::with_builtin(),
            views: Rc::new(MemoryViews::new()),
            error_responder: ErrorResponder::new(config.errors.expose),
            cookies: CookieJar::new(config.cookie.clone()),
            internal: InternalClient,
            external: ExternalClient::new(config.client.clone()),
            scope: RequestScope::new(),
            config,
        }
    }

    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn with_views(mut self, views: impl ViewRenderer + 'static) -> Self {
        self.views = Rc::new(views);
        self
    }

    pub fn with_external_client(mut self, client: ExternalClient) -> Self {
        self.external = client;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    pub fn formatters_mut(&mut self) -> &mut FormatterRegistry {
        &mut self.formatters
    }

    pub fn views(&self) -> &Rc<dyn ViewRenderer> {
        &self.views
    }

    pub fn error_responder(&self) -> &ErrorResponder {
        &self.error_responder
    }

    /// Cookie jar built from the `cookie` config section
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn external_client(&self) -> &ExternalClient {
        &self.external
    }

    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Dispatch a request
    ///
    /// Internal requests always come back as `Ok`: every failure has been
    /// turned into a response by then. External requests fail with
    /// `Error::Transport` when the origin cannot be reached.
    pub fn execute(&self, mut request: Request) -> Result<Response> {
        if request.client() == ClientKind::Internal && request.route().is_none() {
            if let Some(route) = self.router.resolve(request.uri()) {
                request.set_route(route);
            }
        }

        let request = Rc::new(request);
        let _scope = self.scope.enter(Rc::clone(&request));

        info!(
            method = %request.method(),
            uri = request.uri(),
            client = ?request.client(),
            "dispatching request"
        );

        let response = Response::default();
        let result = match request.client() {
            ClientKind::Internal => self.internal.execute(self, &request, response),
            ClientKind::External => self.external.execute(self, &request, response),
        };

        match &result {
            Ok(response) => info!(uri = request.uri(), status = response.status().code(), "request finished"),
            Err(e) => warn!(uri = request.uri(), error = %e, "request failed"),
        }
        result
    }
}
