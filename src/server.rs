//! Inbound HTTP/1.1 front end
//!
//! Reads one request per connection, dispatches it through an `App` and
//! writes the response back with `Connection: close`. Whatever happens,
//! the client gets a well-formed response: unparsable requests are answered
//! with `400 Bad Request`, oversized ones with `413` and dispatch failures
//! with `500`. Only a peer that vanished or went silent gets nothing.

use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatch::App;
use crate::exception::HttpException;
use crate::http::chunked::ChunkedDecoder;
use crate::http::parser::find_head_end;
use crate::http::session::FdSessionOps;
use crate::http::{self, Error, Headers, HttpSession, Method, SessionOps};
use crate::request::Request;
use crate::response::Response;

/// Read buffer size for request data
const READ_CHUNK: usize = 4096;

/// Upper bound on a buffered request message
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Whether `buf` holds a complete request message
fn message_complete(buf: &[u8]) -> http::Result<bool> {
    let Some((len, term)) = find_head_end(buf) else {
        return Ok(false);
    };
    let head = String::from_utf8_lossy(&buf[..len]);
    let headers = match head.split_once('\n') {
        Some((_, block)) => Headers::parse(block),
        None => Headers::new(),
    };
    let rest = &buf[len + term..];

    if let Some(encoding) = headers.get("Transfer-Encoding") {
        if encoding.to_ascii_lowercase().contains("chunked") {
            let mut decoder = ChunkedDecoder::with_limit(MAX_REQUEST_SIZE);
            decoder.decode(rest)?;
            return Ok(decoder.is_complete());
        }
    }

    match headers.get("Content-Length") {
        Some(cl) => {
            let length = cl
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl)))?;
            if length > MAX_REQUEST_SIZE {
                return Err(Error::TooLarge(MAX_REQUEST_SIZE));
            }
            Ok(rest.len() >= length)
        }
        None => Ok(true),
    }
}

/// Server side of one connection
pub struct InboundConnection<S: SessionOps> {
    session: HttpSession<S>,
    buffer: Vec<u8>,
}

impl<S: SessionOps> InboundConnection<S> {
    pub fn new(session: S, timeout: Option<Duration>) -> Self {
        InboundConnection {
            session: HttpSession::new(session, timeout),
            buffer: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Read raw bytes until a complete request message is buffered
    pub fn receive_request(&mut self) -> http::Result<Vec<u8>> {
        self.buffer.clear();
        let mut temp = vec![0u8; READ_CHUNK];

        loop {
            let n = self.session.read(&mut temp)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.buffer.extend_from_slice(&temp[..n]);

            if message_complete(&self.buffer)? {
                return Ok(std::mem::take(&mut self.buffer));
            }
            if self.buffer.len() > MAX_REQUEST_SIZE {
                return Err(Error::TooLarge(MAX_REQUEST_SIZE));
            }
        }
    }

    /// Write a response; `head_only` omits the body, as for `HEAD`
    pub fn send_response(&mut self, response: &Response, head_only: bool) -> http::Result<()> {
        let wire = if head_only {
            response.head_to_wire()
        } else {
            response.to_wire()
        };
        self.session.write_all(&wire)
    }

    pub fn close(&mut self) -> http::Result<()> {
        self.session.close()
    }
}

/// Answer for a request that could not be read or parsed
fn reject(app: &App, error: &Error) -> Response {
    warn!(error = %error, "malformed request");
    let code = match error {
        Error::TooLarge(_) => 413,
        _ => 400,
    };
    match HttpException::factory(code, Some(&error.to_string()), &[]).into_response() {
        Ok(response) => response,
        Err(e) => app.error_responder().respond(&e),
    }
}

/// Failures after which nobody is left to answer
fn is_disconnect(error: &Error) -> bool {
    matches!(error, Error::ConnectionClosed | Error::Timeout | Error::Io(_))
}

/// Answer a single connection
pub fn serve_connection(app: &App, stream: TcpStream, timeout: Option<Duration>) -> http::Result<()> {
    let peer = stream.peer_addr().ok();
    let mut conn = InboundConnection::new(FdSessionOps::new(stream), timeout);

    let parsed = match conn.receive_request() {
        Ok(raw) => Request::from_wire(&raw),
        Err(e) if is_disconnect(&e) => return Err(e),
        Err(e) => Err(e),
    };
    let (mut response, head_only) = match parsed {
        Ok(request) => {
            let head_only = request.method() == Method::Head;
            let response = match app.execute(request) {
                Ok(response) => response,
                Err(e) => app.error_responder().respond(&e),
            };
            (response, head_only)
        }
        Err(e) => (reject(app, &e), false),
    };

    response.set_header("Connection", "close");
    debug!(?peer, status = response.status().code(), "sending response");
    conn.send_response(&response, head_only)?;
    conn.close()
}

/// Accept connections and answer them one at a time
///
/// Stops after `max_connections` when given. Errors on single connections
/// are logged and do not stop the loop.
pub fn serve(
    app: &App,
    listener: &TcpListener,
    timeout: Option<Duration>,
    max_connections: Option<usize>,
) -> http::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "accepting connections");
    let mut served = 0;

    for stream in listener.incoming() {
        let stream = stream?;
        if let Err(e) = serve_connection(app, stream, timeout) {
            warn!(error = %e, "connection failed");
        }

        served += 1;
        if max_connections.map_or(false, |max| served >= max) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_complete() {
        assert!(!message_complete(b"GET / HTTP/1.1\r\nHost: x\r\n").unwrap());
        assert!(message_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap());
        assert!(!message_complete(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab").unwrap());
        assert!(message_complete(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nabcde").unwrap());
        assert!(!message_complete(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n").unwrap());
        assert!(message_complete(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n").unwrap());
        assert!(message_complete(b"POST / HTTP/1.1\r\nContent-Length: x\r\n\r\n").is_err());
    }

    #[test]
    fn test_declared_length_over_limit() {
        let head = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_REQUEST_SIZE + 1);
        assert!(matches!(
            message_complete(head.as_bytes()),
            Err(Error::TooLarge(MAX_REQUEST_SIZE))
        ));
    }

    #[test]
    fn test_rejections_are_well_formed() {
        let app = App::new(crate::Config::default());

        let bad = reject(&app, &Error::Parse("Invalid Content-Length: abc".to_string()));
        assert_eq!(bad.status().code(), 400);
        assert!(String::from_utf8(bad.to_wire()).unwrap().starts_with("HTTP/1.1 400 Bad Request\r\n"));

        let huge = reject(&app, &Error::TooLarge(MAX_REQUEST_SIZE));
        assert_eq!(huge.status().code(), 413);

        assert!(is_disconnect(&Error::Timeout));
        assert!(!is_disconnect(&Error::InvalidChunkSize("zz".to_string())));
    }
}
