//! Chunked transfer coding
//!
//! Both directions of the crate meet chunked bodies: remote origins answer
//! with them and inbound clients may send them. The decoder here is
//! incremental and optionally bounded.

use super::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Size,
    Data { remaining: usize },
    DataEnd,
    Trailer,
    Done,
}

/// Incremental chunked body decoder
///
/// Feed it whatever bytes have arrived. It consumes as much as it can and
/// keeps its place between calls.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
    body: Vec<u8>,
    limit: Option<usize>,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: State::Size,
            body: Vec::new(),
            limit: None,
        }
    }

    /// Decoder that fails once the decoded body would exceed `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        ChunkedDecoder {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Decode from `input`, returning how many bytes were consumed
    ///
    /// Unconsumed bytes must be offered again, followed by more data, on the
    /// next call.
    pub fn decode(&mut self, input: &[u8]) -> Result<usize> {
        let mut pos = 0;

        loop {
            let pending = &input[pos..];
            match self.state {
                State::Size => {
                    let Some(eol) = find_crlf(pending) else {
                        return Ok(pos);
                    };
                    let size = parse_size_line(&pending[..eol])?;
                    self.reserve(size)?;
                    pos += eol + 2;
                    self.state = match size {
                        0 => State::Trailer,
                        n => State::Data { remaining: n },
                    };
                }

                State::Data { remaining } => {
                    let take = remaining.min(pending.len());
                    self.body.extend_from_slice(&pending[..take]);
                    pos += take;
                    if take < remaining {
                        self.state = State::Data {
                            remaining: remaining - take,
                        };
                        return Ok(pos);
                    }
                    self.state = State::DataEnd;
                }

                State::DataEnd => {
                    if pending.len() < 2 {
                        return Ok(pos);
                    }
                    if !pending.starts_with(b"\r\n") {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    pos += 2;
                    self.state = State::Size;
                }

                // Trailer fields are skipped up to the empty line
                State::Trailer => {
                    let Some(eol) = find_crlf(pending) else {
                        return Ok(pos);
                    };
                    pos += eol + 2;
                    if eol == 0 {
                        self.state = State::Done;
                    }
                }

                State::Done => return Ok(pos),
            }
        }
    }

    fn reserve(&mut self, size: usize) -> Result<()> {
        let total = self.body.len().saturating_add(size);
        match self.limit {
            Some(limit) if total > limit => Err(Error::TooLarge(limit)),
            _ => Ok(()),
        }
    }

    /// Whether the last chunk and the trailer have been seen
    pub fn is_complete(&self) -> bool {
        self.state == State::Done
    }

    /// Bytes decoded so far
    pub fn decoded_len(&self) -> usize {
        self.body.len()
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Size line: hex digits, optionally followed by `;extensions`
fn parse_size_line(line: &[u8]) -> Result<usize> {
    let digits = line.split(|&b| b == b';').next().unwrap_or(line);
    let digits = String::from_utf8_lossy(digits);
    let digits = digits.trim();
    if digits.is_empty() {
        return Err(Error::InvalidChunkSize(String::new()));
    }
    usize::from_str_radix(digits, 16).map_err(|_| Error::InvalidChunkSize(digits.to_string()))
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Decode a body that must be complete already
///
/// A body cut short reports `ConnectionClosed`.
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ChunkedDecoder::new();
    decoder.decode(input)?;

    if !decoder.is_complete() {
        return Err(Error::ConnectionClosed);
    }

    Ok(decoder.into_body())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_multiple_chunks() {
        let output = decode_chunked_body(b"5\r\nHello\r\n6\r\n World\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"Hello World");
    }

    #[test]
    fn test_decode_with_extension_and_trailer() {
        let input = b"5;name=value\r\nHello\r\n0\r\nX-Trailer: yes\r\n\r\n";
        assert_eq!(decode_chunked_body(input).unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_truncated_body() {
        assert!(matches!(
            decode_chunked_body(b"5\r\nHel"),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(matches!(
            decode_chunked_body(b"zz\r\nHello\r\n"),
            Err(Error::InvalidChunkSize(s)) if s == "zz"
        ));
        assert!(matches!(
            decode_chunked_body(b"\r\n"),
            Err(Error::InvalidChunkSize(_))
        ));
    }

    #[test]
    fn test_missing_crlf_after_data() {
        assert!(matches!(
            decode_chunked_body(b"2\r\nokXX0\r\n\r\n"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_limit_is_enforced() {
        let mut decoder = ChunkedDecoder::with_limit(8);
        decoder.decode(b"5\r\nHello\r\n").unwrap();
        assert_eq!(decoder.decoded_len(), 5);
        assert!(matches!(decoder.decode(b"5\r\nWorld\r\n"), Err(Error::TooLarge(8))));
    }

    #[test]
    fn test_decoder_incremental() {
        let input = b"5\r\nHello\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut pending = Vec::new();

        for piece in input.chunks(3) {
            pending.extend_from_slice(piece);
            let consumed = decoder.decode(&pending).unwrap();
            pending.drain(..consumed);
        }

        assert!(decoder.is_complete());
        assert_eq!(decoder.into_body(), b"Hello");
    }
}
