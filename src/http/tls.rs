//! TLS session operations
//!
//! Implements `SessionOps` over an OpenSSL client stream so `https://`
//! origins go through the same HTTP code as plain connections.

use super::session::{poll_fd, PollEvents, SessionOps};
use super::{Error, Result};
use openssl::ssl::{SslConnector, SslMethod, SslStream, SslVerifyMode};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// TLS client session operations
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
}

impl TlsSessionOps {
    /// Perform a client handshake over an established TCP stream
    ///
    /// `servername` is used for SNI and hostname verification. With
    /// `verify_peer` off the certificate chain is not checked.
    pub fn connect(tcp_stream: TcpStream, servername: &str, verify_peer: bool) -> Result<Self> {
        let mut builder =
            SslConnector::builder(SslMethod::tls_client()).map_err(|e| Error::Tls(e.to_string()))?;
        if !verify_peer {
            builder.set_verify(SslVerifyMode::NONE);
        }
        let connector = builder.build();

        let mut config = connector
            .configure()
            .map_err(|e| Error::Tls(e.to_string()))?;
        if !verify_peer {
            config.set_verify_hostname(false);
        }

        // Blocking handshake, bounded by the socket read/write timeouts
        let stream = config
            .connect(servername, tcp_stream)
            .map_err(|e| Error::Tls(format!("handshake with {} failed: {}", servername, e)))?;

        Ok(TlsSessionOps { stream })
    }
}

impl SessionOps for TlsSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        // Decrypted bytes may already be buffered inside OpenSSL
        if events == PollEvents::Read && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            // Servers often skip close_notify; treat that as EOF
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        // Best effort close_notify, then drop the socket
        let _ = self.stream.shutdown();
        Ok(())
    }
}
