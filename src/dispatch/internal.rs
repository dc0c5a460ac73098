//! In-process dispatch
//!
//! The internal client looks the routed (directory, controller) pair up in
//! the handler registry, runs the controller and hands back whatever
//! response came out of it. Every failure is turned into a response here.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::outcome::DispatchOutcome;
use super::{App, Client};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exception::{self, HttpException};
use crate::request::Request;
use crate::response::Response;
use crate::route::RouteMatch;

/// A request handler
///
/// `execute` runs `before`, the routed action and `after`, then returns the
/// response held by the context. Overriding `execute` is allowed, but the
/// boxed value it returns must be a `Response`.
pub trait Controller {
    fn before(&mut self, _cx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    /// Run a named action; unknown names should return
    /// `cx.action_not_found()`
    fn action(&mut self, action: &str, cx: &mut Context<'_>) -> Result<()>;

    fn after(&mut self, _cx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, cx: &mut Context<'_>) -> Result<Box<dyn Any>> {
        self.before(cx)?;
        let action = cx.action().to_string();
        self.action(&action, cx)?;
        self.after(cx)?;
        Ok(Box::new(cx.take_response()))
    }
}

/// Controller built from a closure over (action, context)
pub struct FnController<F> {
    handler: F,
}

impl<F> FnController<F>
where
    F: FnMut(&str, &mut Context<'_>) -> Result<()>,
{
    pub fn new(handler: F) -> Self {
        FnController { handler }
    }
}

impl<F> Controller for FnController<F>
where
    F: FnMut(&str, &mut Context<'_>) -> Result<()>,
{
    fn action(&mut self, action: &str, cx: &mut Context<'_>) -> Result<()> {
        (self.handler)(action, cx)
    }
}

/// A controller's view of the dispatch it is running in
pub struct Context<'a> {
    app: &'a App,
    request: &'a Request,
    action: String,
    response: Response,
}

impl<'a> Context<'a> {
    pub fn new(app: &'a App, request: &'a Request, action: impl Into<String>, response: Response) -> Self {
        Context {
            app,
            request,
            action: action.into(),
            response,
        }
    }

    pub fn app(&self) -> &'a App {
        self.app
    }

    pub fn config(&self) -> &'a Config {
        self.app.config()
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Move the response out, leaving an empty `200 OK` behind
    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Action about to run
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Change the action; only meaningful from `before`
    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    /// Route parameter of the current request
    pub fn param(&self, key: &str) -> Option<&'a str> {
        self.request.param(key)
    }

    pub fn route(&self) -> Option<&'a RouteMatch> {
        self.request.route()
    }

    /// Dispatch a sub-request through the application
    pub fn execute(&self, request: Request) -> Result<Response> {
        self.app.execute(request)
    }

    /// Innermost request being dispatched by the application
    pub fn current_request(&self) -> Option<Rc<Request>> {
        self.app.scope().current()
    }

    /// Request that started it all
    pub fn initial_request(&self) -> Option<Rc<Request>> {
        self.app.scope().initial()
    }

    /// Request cookie, verified against the configured salt
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.app.cookies().get(self.request, name)
    }

    /// Queue a cookie on the response, signed for the requesting user agent
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        let user_agent = self.request.header("User-Agent").unwrap_or("");
        let cookie = self.app.cookies().make(name, value, user_agent);
        self.response.set_cookie(cookie);
    }

    pub fn delete_cookie(&mut self, name: &str) {
        let cookie = self.app.cookies().removal(name);
        self.response.set_cookie(cookie);
    }

    /// 404 for an action this controller does not have
    pub fn action_not_found(&self) -> Error {
        HttpException::not_found(self.request.uri()).into()
    }

    /// Error that redirects to `uri`, relative to the site base URL
    pub fn redirect(&self, uri: &str, code: u16) -> Error {
        exception::redirect(uri, code, &self.app.config().site)
    }

    /// Set ETag and caching headers, failing with `304` when the client's
    /// copy is current
    pub fn check_cache(&mut self, etag: Option<&str>) -> Result<()> {
        self.response.check_cache(self.request, etag)?;
        Ok(())
    }
}

type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller>>;

enum HandlerEntry {
    Concrete(ControllerFactory),
    /// Registered name that may not be instantiated
    Abstract,
}

/// Maps (directory, controller) to controller factories
///
/// Names are case-insensitive and directories are stored without
/// surrounding slashes.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: HashMap<(String, String), HandlerEntry>,
}

fn registry_key(directory: &str, controller: &str) -> (String, String) {
    (
        directory.trim_matches('/').to_ascii_lowercase(),
        controller.to_ascii_lowercase(),
    )
}

fn display_name(directory: &str, controller: &str) -> String {
    if directory.is_empty() {
        controller.to_string()
    } else {
        format!("{}/{}", directory.trim_matches('/'), controller)
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller factory, replacing any earlier entry
    pub fn register<C, F>(&mut self, directory: &str, controller: &str, factory: F) -> &mut Self
    where
        C: Controller + 'static,
        F: Fn() -> C + 'static,
    {
        let factory: ControllerFactory = Box::new(move || Box::new(factory()));
        self.entries
            .insert(registry_key(directory, controller), HandlerEntry::Concrete(factory));
        self
    }

    /// Reserve a name that routing may reach but that cannot run
    pub fn register_abstract(&mut self, directory: &str, controller: &str) -> &mut Self {
        self.entries
            .insert(registry_key(directory, controller), HandlerEntry::Abstract);
        self
    }

    pub fn contains(&self, directory: &str, controller: &str) -> bool {
        self.entries.contains_key(&registry_key(directory, controller))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Instantiate the controller for a name
    ///
    /// `Ok(None)` when nothing is registered under it.
    pub fn instantiate(&self, directory: &str, controller: &str) -> Result<Option<Box<dyn Controller>>> {
        match self.entries.get(&registry_key(directory, controller)) {
            None => Ok(None),
            Some(HandlerEntry::Concrete(factory)) => Ok(Some(factory())),
            Some(HandlerEntry::Abstract) => Err(Error::Configuration(format!(
                "Cannot create instances of abstract controller: {}",
                display_name(directory, controller)
            ))),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .map(|(directory, controller)| display_name(directory, controller))
            .collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("controllers", &names).finish()
    }
}

/// Client running requests against registered controllers
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalClient;

impl InternalClient {
    fn dispatch(&self, app: &App, request: &Request, response: Response) -> Result<Response> {
        let route = request.route().ok_or_else(|| {
            HttpException::factory(
                404,
                Some("Unable to find a route to match the URI: :uri"),
                &[(":uri", request.uri())],
            )
            .with_request_uri(request.uri())
        })?;

        let mut controller = app
            .handlers()
            .instantiate(&route.directory, &route.controller)?
            .ok_or_else(|| HttpException::not_found(request.uri()))?;

        debug!(
            directory = %route.directory,
            controller = %route.controller,
            action = %route.action,
            "executing controller"
        );

        let mut cx = Context::new(app, request, route.action.clone(), response);
        let output = controller.execute(&mut cx)?;

        match output.downcast::<Response>() {
            Ok(response) => Ok(*response),
            Err(_) => Err(Error::ContractViolation(format!(
                "Controller {} did not return a Response",
                display_name(&route.directory, &route.controller)
            ))),
        }
    }
}

impl Client for InternalClient {
    fn execute(&self, app: &App, request: &Request, response: Response) -> Result<Response> {
        let outcome = DispatchOutcome::from_result(self.dispatch(app, request, response));
        debug!(uri = request.uri(), status = outcome.status().code(), "internal dispatch finished");
        Ok(outcome.into_response(app.error_responder()))
    }
}
