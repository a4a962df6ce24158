//! One-shot HTTP client: every request dials its own connection, which lives exactly as long as
//! the response body.

use std::{
    io::{self, BufReader, BufWriter, Write},
    net::TcpStream,
};

use http::{
    header::{CONNECTION, HOST},
    HeaderValue, Method, Request, Response,
};
use log::debug;
use thiserror::Error;

use crate::{request, response, Body, Connection, HttpBody, ParseError};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid uri")]
    InvalidUri,
    #[error("unsupported scheme")]
    UnsupportedScheme,
    #[error("connect {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
}

/// Sends a `GET` request to `uri`.
pub fn get(uri: &str) -> Result<Response<Body>, RequestError> {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(())
        .map_err(|_| RequestError::InvalidUri)?;

    request(req)
}

/// Dials the server `req` points to and sends it. The connection is closed once the body of the
/// returned response has been read or dropped.
pub fn request<B: HttpBody>(mut req: Request<B>) -> Result<Response<Body>, RequestError> {
    match req.uri().scheme_str() {
        Some("http") => {}
        Some(_) => return Err(RequestError::UnsupportedScheme),
        None => return Err(RequestError::InvalidUri),
    }

    let authority = req
        .uri()
        .authority()
        .ok_or(RequestError::InvalidUri)?
        .clone();

    let addr = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

    debug!("{} {}", req.method(), req.uri());

    let conn = TcpStream::connect(&addr).map_err(|source| RequestError::Connect { addr, source })?;

    let host = HeaderValue::from_str(authority.as_str()).map_err(|_| RequestError::InvalidUri)?;
    req.headers_mut().insert(HOST, host);
    req.headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));

    send(conn, req)
}

/// Writes `req` over `connection` and reads back the response head.
pub fn send<C, B>(connection: C, req: Request<B>) -> Result<Response<Body>, RequestError>
where
    C: Into<Connection>,
    B: HttpBody,
{
    let conn = connection.into();
    let has_body = req.method() != Method::HEAD;

    let reader = BufReader::new(conn.try_clone()?);
    let mut writer = BufWriter::new(conn);

    request::write_request(req, &mut writer)?;
    writer.flush()?;
    drop(writer);

    Ok(response::parse_response(reader, has_body)?)
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        net::{TcpListener, TcpStream},
        thread,
    };

    use http::{Request, StatusCode};

    use super::*;
    use crate::Server;

    fn spawn_echo() -> u16 {
        let listener = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            Server::builder()
                .max_threads(4)
                .from_listener(listener)
                .serve(|req: Request<Body>| {
                    let path = req.uri().to_string();
                    let body = req.into_body().into_bytes().unwrap();
                    Ok::<_, Infallible>(
                        http::Response::builder()
                            .header("x-path", path)
                            .body(body)
                            .unwrap(),
                    )
                })
                .ok()
        });

        port
    }

    #[test]
    fn test_client() {
        let port = spawn_echo();
        let uri = format!("http://localhost:{port}/echo?x=1");

        let res = request(
            http::Request::builder()
                .uri(&uri)
                .method("POST")
                .body("Hello world")
                .unwrap(),
        )
        .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-path"], "/echo?x=1");
        assert_eq!(res.into_body().into_bytes().unwrap(), b"Hello world");
    }

    #[test]
    fn get_reads_empty_bodies() {
        let port = spawn_echo();

        let res = get(&format!("http://127.0.0.1:{port}/")).unwrap();
        assert_eq!(res.into_body().into_bytes().unwrap(), b"");
    }

    #[test]
    fn send_request() {
        let port = spawn_echo();
        let conn = TcpStream::connect(("127.0.0.1", port)).unwrap();

        let req = http::Request::builder()
            .method("POST")
            .header("transfer-encoding", "chunked")
            .body(Body::from_iter(vec![&b"lol"[..], &b"wut"[..]]))
            .unwrap();
        let res = send(conn, req).unwrap();
        assert_eq!(res.into_body().into_bytes().unwrap(), b"lolwut");
    }

    #[test]
    fn head_requests_do_not_wait_for_a_body() {
        let port = spawn_echo();

        let req = http::Request::builder()
            .method(Method::HEAD)
            .uri(format!("http://127.0.0.1:{port}/"))
            .body(())
            .unwrap();

        let res = request(req).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.into_body().into_bytes().unwrap(), b"");
    }

    #[test]
    fn reading_the_body_releases_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            request::parse_request_head(&mut reader).unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\npong!")
                .unwrap();

            // Only ends once the client dropped its side
            let mut rest = Vec::new();
            std::io::Read::read_to_end(&mut reader, &mut rest).unwrap();
            rest
        });

        let body = get(&format!("http://127.0.0.1:{port}/ping"))
            .unwrap()
            .into_body()
            .into_bytes()
            .unwrap();

        assert_eq!(body, b"pong!");
        assert!(server.join().unwrap().is_empty());
    }

    #[test]
    fn refuses_unsupported_uris() {
        assert!(matches!(
            get("https://localhost/ping"),
            Err(RequestError::UnsupportedScheme)
        ));
        assert!(matches!(get("/ping"), Err(RequestError::InvalidUri)));
        assert!(matches!(get("not a uri"), Err(RequestError::InvalidUri)));
    }

    #[test]
    fn reports_refused_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = get(&format!("http://127.0.0.1:{port}/ping")).unwrap_err();

        assert!(matches!(
            err,
            RequestError::Connect { ref source, .. } if source.kind() == io::ErrorKind::ConnectionRefused
        ));
        assert!(err.to_string().starts_with(&format!("connect 127.0.0.1:{port}: ")));
    }
}
