//! ko7-dispatch - HTTP request dispatch core
//!
//! A synchronous request/response pipeline: requests are routed either to
//! in-process controllers (internal dispatch) or to a remote origin over a
//! blocking socket transport (external dispatch), and HTTP exceptions such
//! as redirects or `304 Not Modified` short-circuit into ready-made
//! responses at the dispatch boundary.
//!
//! ```
//! use ko7_dispatch::{App, Config, Context, Request};
//! use ko7_dispatch::dispatch::FnController;
//!
//! let mut app = App::new(Config::default());
//! app.handlers_mut().register("", "welcome", || {
//!     FnController::new(|action: &str, cx: &mut Context<'_>| match action {
//!         "index" => {
//!             cx.response_mut().set_body("hello, world!");
//!             Ok(())
//!         }
//!         _ => Err(cx.action_not_found()),
//!     })
//! });
//!
//! let response = app.execute(Request::factory("/welcome")).unwrap();
//! assert_eq!(response.status().code(), 200);
//! assert_eq!(response.body(), b"hello, world!".as_slice());
//! ```

pub mod config;
pub mod cookie;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod http;
pub mod request;
pub mod response;
pub mod rest;
pub mod route;
pub mod server;

pub use config::Config;
pub use dispatch::{App, Context, Controller, DispatchOutcome};
pub use error::{Error, Result};
pub use exception::HttpException;
pub use request::Request;
pub use response::Response;
