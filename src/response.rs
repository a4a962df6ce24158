use std::io::{self, BufRead, Write};

use headers::HeaderMapExt;
use http::{header, HeaderValue, Response, StatusCode, Version};

use crate::{
    body::{Body, HttpBody},
    request::{self, ChunkedReader, ParseError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    FixedLength(u64),
    Chunked,
    CloseDelimited,
}

/// What should happen to the connection after a response was written.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    KeepAlive,
    Close,
}

/// Responses with these statuses never carry a body.
fn is_bodiless(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// The response given to requests no handler was registered for.
pub fn not_found() -> Response<Body> {
    let mut res = Response::new(Body::from("404 page not found\n"));
    *res.status_mut() = StatusCode::NOT_FOUND;
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    res
}

/// Writes `res` to `stream`. When `head` is set the body is framed as usual but its bytes are
/// left out, as answers to `HEAD` requests require.
pub(crate) fn write_response<B: HttpBody>(
    res: Response<B>,
    stream: &mut impl Write,
    head: bool,
) -> io::Result<Outcome> {
    let (parts, body) = res.into_parts();
    let mut headers = parts.headers;

    let has_chunked_encoding = headers
        .typed_get::<headers::TransferEncoding>()
        .filter(|te| te.is_chunked())
        .is_some();

    let content_length = headers.typed_get::<headers::ContentLength>();

    let encoding = if is_bodiless(parts.status) {
        Encoding::FixedLength(0)
    } else if has_chunked_encoding && parts.version == Version::HTTP_11 {
        Encoding::Chunked
    } else if let Some(len) = content_length {
        Encoding::FixedLength(len.0)
    } else if let Some(len) = body.len() {
        headers.typed_insert(headers::ContentLength(len));
        Encoding::FixedLength(len)
    } else if parts.version == Version::HTTP_11 {
        headers.typed_insert(headers::TransferEncoding::chunked());
        Encoding::Chunked
    } else {
        Encoding::CloseDelimited
    };

    let asks_for_close = headers
        .typed_get::<headers::Connection>()
        .filter(|conn| conn.contains("close"))
        .is_some();

    stream.write_all(format!("{:?} {}\r\n", parts.version, parts.status).as_bytes())?;
    request::write_headers(&headers, stream)?;

    if !head && !is_bodiless(parts.status) {
        request::write_body(body.into(), encoding, stream)?;
    }

    if asks_for_close || encoding == Encoding::CloseDelimited {
        Ok(Outcome::Close)
    } else {
        Ok(Outcome::KeepAlive)
    }
}

/// Parses a response head from `stream`. The returned body streams from `stream`; `has_body`
/// is false for answers to `HEAD` requests.
pub(crate) fn parse_response(
    mut stream: impl BufRead + 'static,
    has_body: bool,
) -> Result<Response<Body>, ParseError> {
    let buf = request::read_head(&mut stream)?;

    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut res = httparse::Response::new(&mut headers);
    if res.parse(&buf)?.is_partial() {
        return Err(ParseError::IncompleteMessage);
    }

    let version = request::parse_version(res.version)?;
    let status = res
        .code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or(ParseError::IncompleteMessage)?;

    let response = Response::builder().status(status).version(version);

    let response = res
        .headers
        .iter()
        .take_while(|header| **header != httparse::EMPTY_HEADER)
        .map(|header| (header.name, header.value))
        .fold(response, |res, (name, value)| res.header(name, value));

    let headers = response.headers_ref().ok_or(ParseError::Unknown)?;

    let body = if !has_body || is_bodiless(status) {
        Body::empty()
    } else if let Some(encoding) = headers.typed_try_get::<headers::TransferEncoding>()? {
        if !encoding.is_chunked() {
            return Err(ParseError::InvalidTransferEncoding);
        }
        Body::from_iter(ChunkedReader::new(stream))
    } else if let Some(len) = headers.typed_try_get::<headers::ContentLength>()? {
        let len = usize::try_from(len.0).map_err(|_| ParseError::Unknown)?;
        Body::from_reader(stream, len)
    } else {
        Body::from_reader(stream, None)
    };

    response.body(body).map_err(|_| ParseError::Unknown)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn writes_responses_without_bodies() {
        let res = Response::builder()
            .status(StatusCode::OK)
            .header("some", "header")
            .body(())
            .unwrap();

        let mut output = Vec::new();
        let outcome = write_response(res, &mut output, false).unwrap();

        assert_eq!(
            output,
            b"HTTP/1.1 200 OK\r\nsome: header\r\ncontent-length: 0\r\n\r\n"
        );
        assert_eq!(outcome, Outcome::KeepAlive);
    }

    #[test]
    fn writes_responses_with_bodies() {
        let res = Response::builder()
            .status(StatusCode::OK)
            .body("pong!")
            .unwrap();

        let mut output = Vec::new();
        write_response(res, &mut output, false).unwrap();

        assert_eq!(output, b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\npong!");
    }

    #[test]
    fn leaves_out_body_bytes_for_head_requests() {
        let res = Response::builder()
            .status(StatusCode::OK)
            .body("pong!")
            .unwrap();

        let mut output = Vec::new();
        write_response(res, &mut output, true).unwrap();

        assert_eq!(output, b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n");
    }

    #[test]
    fn streams_unknown_length_bodies_as_chunks() {
        let res = Response::builder()
            .body(Body::from_iter(["po", "ng!"]))
            .unwrap();

        let mut output = Vec::new();
        let outcome = write_response(res, &mut output, false).unwrap();

        assert_eq!(
            output,
            b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n2\r\npo\r\n3\r\nng!\r\n0\r\n\r\n"
        );
        assert_eq!(outcome, Outcome::KeepAlive);
    }

    #[test]
    fn closes_after_unknown_length_bodies_on_http_10() {
        let res = Response::builder()
            .version(Version::HTTP_10)
            .body(Body::from_iter(["pong!"]))
            .unwrap();

        let mut output = Vec::new();
        let outcome = write_response(res, &mut output, false).unwrap();

        assert_eq!(output, b"HTTP/1.0 200 OK\r\n\r\npong!");
        assert_eq!(outcome, Outcome::Close);
    }

    #[test]
    fn honors_connection_close_header() {
        let res = Response::builder()
            .header("connection", "close")
            .body("pong!")
            .unwrap();

        let outcome = write_response(res, &mut Vec::new(), false).unwrap();
        assert_eq!(outcome, Outcome::Close);
    }

    #[test]
    fn not_found_has_default_body() {
        let res = not_found();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            res.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        assert_eq!(res.into_body().into_bytes().unwrap(), b"404 page not found\n");
    }

    #[test]
    fn parses_content_length_response() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\npong!extra";
        let res = parse_response(Cursor::new(raw), true).unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.version(), Version::HTTP_11);
        assert_eq!(res.into_body().into_bytes().unwrap(), b"pong!");
    }

    #[test]
    fn parses_chunked_response() {
        let raw = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\npo\r\n3\r\nng!\r\n0\r\n\r\n";
        let res = parse_response(Cursor::new(raw), true).unwrap();

        assert_eq!(res.into_body().into_bytes().unwrap(), b"pong!");
    }

    #[test]
    fn parses_close_delimited_response() {
        let raw = "HTTP/1.0 200 OK\r\n\r\npong!";
        let res = parse_response(Cursor::new(raw), true).unwrap();

        assert_eq!(res.version(), Version::HTTP_10);
        assert_eq!(res.into_body().into_bytes().unwrap(), b"pong!");
    }

    #[test]
    fn head_responses_have_no_body() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n";
        let res = parse_response(Cursor::new(raw), false).unwrap();

        assert_eq!(res.headers()["content-length"], "5");
        assert_eq!(res.into_body().into_bytes().unwrap(), b"");
    }

    #[test]
    fn rejects_truncated_status_line() {
        assert!(matches!(
            parse_response(Cursor::new("HTTP/1.1 20"), true),
            Err(ParseError::IncompleteMessage)
        ));
    }
}
