//! Single request/response exchange over a session
//!
//! The external client opens one connection per request (`Connection:
//! close`), writes the serialized request and reads the response back.

use super::parser::{ResponseHead, ResponseParser};
use super::{Error, HttpSession, Result, SessionOps};
use std::time::Duration;

/// Read buffer size for response data
const READ_CHUNK: usize = 8192;

/// HTTP connection
///
/// Provides sending a request and receiving the matching response.
pub struct HttpConnection<S: SessionOps> {
    session: HttpSession<S>,
}

impl<S: SessionOps> HttpConnection<S> {
    /// Create a new connection over a session
    pub fn new(session: S, timeout: Option<Duration>) -> Self {
        HttpConnection {
            session: HttpSession::new(session, timeout),
        }
    }

    /// Send a serialized request
    pub fn send_request(&mut self, wire: &[u8]) -> Result<()> {
        self.session.write_all(wire)
    }

    /// Receive a complete response
    ///
    /// A response to `HEAD` is parsed without a body.
    pub fn receive_response(&mut self, head_request: bool) -> Result<(ResponseHead, Vec<u8>)> {
        let mut parser = ResponseParser::new(head_request);
        let mut temp = vec![0u8; READ_CHUNK];

        loop {
            let n = match self.session.read(&mut temp) {
                Ok(n) => n,
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => 0,
                Err(e) => return Err(e),
            };

            if n == 0 {
                return parser.finish();
            }

            if let Some(message) = parser.parse(&temp[..n])? {
                return Ok(message);
            }
        }
    }

    /// Send a request and wait for its response, then close
    pub fn round_trip(&mut self, wire: &[u8], head_request: bool) -> Result<(ResponseHead, Vec<u8>)> {
        self.send_request(wire)?;
        let result = self.receive_response(head_request);
        let _ = self.session.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::FdSessionOps;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn test_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            let n = stream.read(&mut buf).unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nHello")
                .unwrap();
            request
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut connection = HttpConnection::new(FdSessionOps::new(stream), Some(Duration::from_secs(5)));

        let (head, body) = connection
            .round_trip(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n", false)
            .unwrap();

        assert_eq!(head.status.code(), 200);
        assert_eq!(body, b"Hello");
        assert_eq!(head.headers.get("Content-Type"), Some("text/plain"));

        let request = handle.join().unwrap();
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn test_body_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = stream.read(&mut buf).unwrap();
            stream.write_all(b"HTTP/1.0 200 OK\r\n\r\nstreamed").unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut connection = HttpConnection::new(FdSessionOps::new(stream), Some(Duration::from_secs(5)));
        let (_, body) = connection.round_trip(b"GET / HTTP/1.0\r\n\r\n", false).unwrap();
        assert_eq!(body, b"streamed");

        handle.join().unwrap();
    }
}
