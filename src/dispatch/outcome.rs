//! Dispatch outcomes
//!
//! Handlers report through `Result<Response>`. At the dispatch boundary the
//! result is classified once into a `DispatchOutcome` and every outcome is
//! turned into a well-formed response; no error leaves `execute`.

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::exception::{Expectation, ExceptionKind};
use crate::http::Status;
use crate::response::Response;

/// What a dispatch ended in
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler produced a response
    Handled(Response),
    /// An expected redirect
    Redirect(Response),
    /// An expected `304 Not Modified`
    NotModified(Response),
    /// Any other HTTP exception: 401, 404, 405 and friends
    Rejected(Response),
    /// A failure that is not an HTTP exception, or an HTTP exception that
    /// could not produce its response
    Failed(Error),
}

impl DispatchOutcome {
    /// Classify the result of running a handler
    pub fn from_result(result: Result<Response>) -> Self {
        let exception = match result {
            Ok(response) => return DispatchOutcome::Handled(response),
            Err(Error::Http(exception)) => exception,
            Err(other) => return DispatchOutcome::Failed(other),
        };

        let kind = exception.kind();
        debug!(
            status = exception.status().code(),
            detail = exception.message(),
            "unwrapping HTTP exception"
        );
        match exception.into_response() {
            Ok(response) => match kind {
                ExceptionKind::Expected(Expectation::Redirect) => DispatchOutcome::Redirect(response),
                ExceptionKind::Expected(Expectation::NotModified) => {
                    DispatchOutcome::NotModified(response)
                }
                _ => DispatchOutcome::Rejected(response),
            },
            Err(invalid) => DispatchOutcome::Failed(invalid),
        }
    }

    /// Status the outcome will be answered with
    pub fn status(&self) -> Status {
        match self {
            DispatchOutcome::Handled(r)
            | DispatchOutcome::Redirect(r)
            | DispatchOutcome::NotModified(r)
            | DispatchOutcome::Rejected(r) => r.status(),
            DispatchOutcome::Failed(_) => Status::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled(_))
    }

    /// Final response; failures go through `responder`
    pub fn into_response(self, responder: &ErrorResponder) -> Response {
        match self {
            DispatchOutcome::Handled(r)
            | DispatchOutcome::Redirect(r)
            | DispatchOutcome::NotModified(r)
            | DispatchOutcome::Rejected(r) => r,
            DispatchOutcome::Failed(e) => responder.respond(&e),
        }
    }
}

/// Turns uncaught errors into `500 Internal Server Error` responses
#[derive(Debug, Clone, Default)]
pub struct ErrorResponder {
    expose: bool,
}

impl ErrorResponder {
    /// With `expose` set, the body names the error class and message
    pub fn new(expose: bool) -> Self {
        ErrorResponder { expose }
    }

    pub fn respond(&self, err: &Error) -> Response {
        error!(class = err.class(), error = %err, "uncaught error during dispatch");

        let body = if self.expose {
            format!("{}: {}", err.class(), err)
        } else {
            Status::INTERNAL_SERVER_ERROR.reason_phrase().to_string()
        };

        let mut response = Response::new(Status::INTERNAL_SERVER_ERROR);
        response
            .set_header("Content-Type", "text/plain; charset=utf-8")
            .set_body(body);
        response
    }
}
