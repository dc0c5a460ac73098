//! HTTP message parsing
//!
//! Request/status line parsing and an incremental response parser used by
//! the external client.

use super::chunked::ChunkedDecoder;
use super::{Error, Headers, Method, Result, Status, Version};

/// Parse HTTP request line
///
/// Format: METHOD URI VERSION
/// Example: GET /index.html HTTP/1.1
pub fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() != 3 {
        return Err(Error::Parse(format!(
            "Invalid request line: expected 3 parts, got {}",
            parts.len()
        )));
    }

    let method = Method::from_str(parts[0])?;
    let uri = parts[1].to_string();
    let version = Version::from_str(parts[2])?;

    Ok((method, uri, version))
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON
/// Example: HTTP/1.1 200 OK
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.trim_end().splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::from_str(parts[0])?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = match parts.get(2) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Locate the end of a header block
///
/// Returns (head length without terminator, terminator length). Bare LF
/// line endings are accepted.
pub(crate) fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        if buf[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
    }
    None
}

/// Status line and headers of a parsed response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: Version,
    pub status: Status,
    pub reason: String,
    pub headers: Headers,
}

#[derive(Debug)]
enum ParserState {
    Head,
    Length(usize),
    Chunked(ChunkedDecoder),
    UntilClose,
    Complete,
}

/// HTTP response parser
pub struct ResponseParser {
    state: ParserState,
    buffer: Vec<u8>,
    head: Option<ResponseHead>,
    body: Vec<u8>,
    head_request: bool,
}

impl ResponseParser {
    /// Create a new response parser
    ///
    /// `head_request` marks responses to `HEAD`, which never carry a body.
    pub fn new(head_request: bool) -> Self {
        ResponseParser {
            state: ParserState::Head,
            buffer: Vec::new(),
            head: None,
            body: Vec::new(),
            head_request,
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(..)) once a complete response is parsed, Ok(None) if
    /// more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<(ResponseHead, Vec<u8>)>> {
        self.buffer.extend_from_slice(data);

        loop {
            match &mut self.state {
                ParserState::Head => {
                    let Some((len, term)) = find_head_end(&self.buffer) else {
                        return Ok(None);
                    };
                    let raw = String::from_utf8_lossy(&self.buffer[..len]).to_string();
                    self.buffer.drain(..len + term);

                    let (status_line, header_block) =
                        raw.split_once('\n').unwrap_or((raw.as_str(), ""));
                    let (version, status, reason) = parse_status_line(status_line)?;

                    // Interim 1xx responses precede the real one
                    if status.is_informational() {
                        continue;
                    }

                    let headers = Headers::parse(header_block);
                    self.state = self.body_state(status, &headers)?;
                    self.head = Some(ResponseHead {
                        version,
                        status,
                        reason,
                        headers,
                    });
                }

                ParserState::Length(remaining) => {
                    let take = (*remaining).min(self.buffer.len());
                    self.body.extend(self.buffer.drain(..take));
                    *remaining -= take;
                    if *remaining > 0 {
                        return Ok(None);
                    }
                    self.state = ParserState::Complete;
                }

                ParserState::Chunked(decoder) => {
                    let consumed = decoder.decode(&self.buffer)?;
                    self.buffer.drain(..consumed);
                    if !decoder.is_complete() {
                        return Ok(None);
                    }
                    if let ParserState::Chunked(decoder) =
                        std::mem::replace(&mut self.state, ParserState::Complete)
                    {
                        self.body = decoder.into_body();
                    }
                }

                ParserState::UntilClose => {
                    self.body.append(&mut self.buffer);
                    return Ok(None);
                }

                ParserState::Complete => return Ok(self.take_message()),
            }
        }
    }

    /// Signal end of stream
    ///
    /// Only a body delimited by connection close may end here; anything
    /// else is a truncated response.
    pub fn finish(&mut self) -> Result<(ResponseHead, Vec<u8>)> {
        match self.state {
            ParserState::UntilClose => {
                self.body.append(&mut self.buffer);
                self.state = ParserState::Complete;
                self.take_message().ok_or(Error::ConnectionClosed)
            }
            ParserState::Complete => self.take_message().ok_or(Error::ConnectionClosed),
            _ => Err(Error::ConnectionClosed),
        }
    }

    fn body_state(&self, status: Status, headers: &Headers) -> Result<ParserState> {
        if self.head_request || status.is_bodiless() {
            return Ok(ParserState::Complete);
        }

        if let Some(encoding) = headers.get("Transfer-Encoding") {
            if encoding.to_ascii_lowercase().contains("chunked") {
                return Ok(ParserState::Chunked(ChunkedDecoder::new()));
            }
        }

        if let Some(cl_str) = headers.get("Content-Length") {
            let length = cl_str
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl_str)))?;
            return Ok(ParserState::Length(length));
        }

        Ok(ParserState::UntilClose)
    }

    fn take_message(&mut self) -> Option<(ResponseHead, Vec<u8>)> {
        let head = self.head.take()?;
        Some((head, std::mem::take(&mut self.body)))
    }
}
