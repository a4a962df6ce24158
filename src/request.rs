use std::io::{self, BufRead, Read, Write};

use headers::HeaderMapExt;
use http::{request::Parts, HeaderMap, Method, Request, Version};
use thiserror::Error;

use crate::{
    body::{Body, HttpBody},
    response::Encoding,
};

/// Upper bound for the request line (or status line) plus headers.
const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid message: {0}")]
    Invalid(#[from] httparse::Error),
    #[error("incomplete message")]
    IncompleteMessage,
    #[error("message head too large")]
    HeadTooLarge,
    #[error("unsupported http version: {0}")]
    UnsupportedHttpVersion(u8),
    #[error("invalid Transfer-Encoding header")]
    InvalidTransferEncoding,
    #[error("invalid header")]
    InvalidHeader(#[from] headers::Error),
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("failed to parse http message")]
    Unknown,
}

/// Reads everything up to and including the empty line that ends a message head.
pub(crate) fn read_head(stream: &mut impl BufRead) -> Result<Vec<u8>, ParseError> {
    let mut buf = Vec::with_capacity(800);
    let mut stream = Read::take(stream, MAX_HEAD_SIZE as u64 + 1);

    loop {
        if stream.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        match buf.as_slice() {
            // Stray line breaks between pipelined messages
            [b'\r', b'\n'] | [b'\n'] => buf.clear(),
            [.., b'\r', b'\n', b'\r', b'\n'] => break,
            [.., b'\n', b'\n'] => break,
            _ => continue,
        }
    }

    if buf.is_empty() {
        return Err(ParseError::ConnectionClosed);
    }
    if buf.len() > MAX_HEAD_SIZE {
        return Err(ParseError::HeadTooLarge);
    }

    Ok(buf)
}

pub(crate) fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version.ok_or(ParseError::IncompleteMessage)? {
        0 => Ok(Version::HTTP_10),
        1 => Ok(Version::HTTP_11),
        version => Err(ParseError::UnsupportedHttpVersion(version)),
    }
}

/// Parses the request line and headers, leaving the body in `stream`.
pub(crate) fn parse_request_head(stream: &mut impl BufRead) -> Result<Request<()>, ParseError> {
    let buf = read_head(stream)?;

    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers);
    if req.parse(&buf)?.is_partial() {
        return Err(ParseError::IncompleteMessage);
    }

    let method = req
        .method
        .map(|method| method.as_bytes())
        .ok_or(ParseError::IncompleteMessage)?;

    let path = req.path.ok_or(ParseError::IncompleteMessage)?;

    let version = parse_version(req.version)?;

    let request = Request::builder()
        .method(Method::from_bytes(method).map_err(|_| ParseError::IncompleteMessage)?)
        .uri(path)
        .version(version);

    req.headers
        .iter()
        .take_while(|header| **header != httparse::EMPTY_HEADER)
        .map(|header| (header.name, header.value))
        .fold(request, |builder, (name, value)| builder.header(name, value))
        .body(())
        .map_err(|_| ParseError::Unknown)
}

/// Reads the body announced by `headers` into memory.
pub(crate) fn read_request_body(
    headers: &HeaderMap,
    stream: &mut impl BufRead,
) -> Result<Body, ParseError> {
    if let Some(encoding) = headers.typed_try_get::<headers::TransferEncoding>()? {
        if !encoding.is_chunked() {
            // https://datatracker.ietf.org/doc/html/rfc9112#section-6.1
            return Err(ParseError::InvalidTransferEncoding);
        }
        let mut chunks = ChunkedReader::new(&mut *stream);
        let body = chunks.by_ref().collect::<Vec<_>>().concat();
        chunks.finish()?;
        Ok(Body::from(body))
    } else if let Some(len) = headers.typed_try_get::<headers::ContentLength>()? {
        let mut buf = Vec::with_capacity(len.0.min(MAX_HEAD_SIZE as u64) as usize);
        stream.by_ref().take(len.0).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len.0 {
            return Err(ParseError::IncompleteMessage);
        }
        Ok(Body::from(buf))
    } else {
        Ok(Body::empty())
    }
}

pub(crate) fn write_request<B: HttpBody>(
    req: http::Request<B>,
    stream: &mut impl Write,
) -> io::Result<()> {
    let (
        Parts {
            method,
            uri,
            version,
            mut headers,
            ..
        },
        body,
    ) = req.into_parts();

    let has_chunked_encoding = headers
        .typed_get::<headers::TransferEncoding>()
        .filter(|te| te.is_chunked())
        .is_some();

    let content_length = headers.typed_get::<headers::ContentLength>();

    let encoding = if has_chunked_encoding && version == Version::HTTP_11 {
        Encoding::Chunked
    } else {
        match (content_length, body.len()) {
            (Some(len), Some(body_len)) if len.0 != body_len => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "content-length doesn't match body length",
                ));
            }
            (Some(len), _) => Encoding::FixedLength(len.0),
            (None, Some(0)) => Encoding::FixedLength(0),
            (None, Some(len)) => {
                headers.typed_insert(headers::ContentLength(len));
                Encoding::FixedLength(len)
            }
            (None, None) if version == Version::HTTP_11 => {
                headers.typed_insert(headers::TransferEncoding::chunked());
                Encoding::Chunked
            }
            (None, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "could not determine the size of the body",
                ));
            }
        }
    };

    let version = match version {
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_10 => "HTTP/1.0",
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported http version",
            ))
        }
    };

    let path = uri.path_and_query().map_or("/", |path| path.as_str());

    stream.write_all(format!("{method} {path} {version}\r\n").as_bytes())?;
    write_headers(&headers, stream)?;
    write_body(body.into(), encoding, stream)
}

pub(crate) fn write_headers(headers: &HeaderMap, stream: &mut impl Write) -> io::Result<()> {
    for (name, val) in headers.iter() {
        stream.write_all(&[format!("{name}: ").as_bytes(), val.as_bytes(), b"\r\n"].concat())?;
    }
    stream.write_all(b"\r\n")
}

pub(crate) fn write_body(
    body: Body,
    encoding: Encoding,
    stream: &mut impl Write,
) -> io::Result<()> {
    match encoding {
        // Just buffer small bodies
        Encoding::FixedLength(len) if len < 1024 => {
            stream.write_all(&body.into_bytes()?)?;
        }
        Encoding::FixedLength(_) | Encoding::CloseDelimited => {
            io::copy(&mut body.into_reader(), stream)?;
        }
        Encoding::Chunked => {
            for chunk in body.into_iter().filter(|chunk| !chunk.is_empty()) {
                stream.write_all(format!("{:x}\r\n", chunk.len()).as_bytes())?;
                stream.write_all(&chunk)?;
                stream.write_all(b"\r\n")?;
                stream.flush()?;
            }
            stream.write_all(b"0\r\n\r\n")?;
        }
    };

    Ok(())
}

/// Decodes a chunked body, yielding one item per chunk.
///
/// Iteration stops at the last chunk or at the first framing error; [`ChunkedReader::finish`]
/// tells both apart.
pub(crate) struct ChunkedReader<R> {
    stream: R,
    state: ChunkedState,
}

enum ChunkedState {
    Reading,
    Done,
    Failed(ParseError),
}

impl<R: BufRead> ChunkedReader<R> {
    pub(crate) fn new(stream: R) -> Self {
        Self {
            stream,
            state: ChunkedState::Reading,
        }
    }

    pub(crate) fn finish(self) -> Result<(), ParseError> {
        match self.state {
            ChunkedState::Done => Ok(()),
            ChunkedState::Failed(err) => Err(err),
            ChunkedState::Reading => Err(ParseError::IncompleteMessage),
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ParseError> {
        let mut buf = Vec::new();

        let size = loop {
            if self.stream.read_until(b'\n', &mut buf)? == 0 {
                return Err(ParseError::IncompleteMessage);
            }

            match httparse::parse_chunk_size(&buf) {
                Ok(httparse::Status::Complete((_pos, size))) => break size,
                Ok(httparse::Status::Partial) => continue,
                Err(_) => return Err(ParseError::InvalidChunkSize),
            }
        };

        if size == 0 {
            self.skip_trailers()?;
            return Ok(None);
        }

        // Grows with the bytes that actually arrive, whatever size was announced
        let mut chunk = Vec::new();
        self.stream.by_ref().take(size).read_to_end(&mut chunk)?;
        if (chunk.len() as u64) < size {
            return Err(ParseError::IncompleteMessage);
        }

        buf.clear();
        self.stream.read_until(b'\n', &mut buf)?;
        if buf != b"\r\n" && buf != b"\n" {
            return Err(ParseError::InvalidChunkSize);
        }

        Ok(Some(chunk))
    }

    fn skip_trailers(&mut self) -> Result<(), ParseError> {
        let mut line = Vec::new();
        loop {
            line.clear();
            match self.stream.read_until(b'\n', &mut line)? {
                0 => return Ok(()),
                _ if line == b"\r\n" || line == b"\n" => return Ok(()),
                _ => continue,
            }
        }
    }
}

impl<R: BufRead> Iterator for ChunkedReader<R> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if !matches!(self.state, ChunkedState::Reading) {
            return None;
        }

        match self.next_chunk() {
            Ok(Some(chunk)) => Some(chunk),
            Ok(None) => {
                self.state = ChunkedState::Done;
                None
            }
            Err(err) => {
                self.state = ChunkedState::Failed(err);
                None
            }
        }
    }
}
