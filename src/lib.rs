//! A small synchronous HTTP/1.x stack and the ping/pong programs built on it.
//!
//! The server answers `GET /ping` with `pong!`:
//!
//! ```no_run
//! use pingpong::{ping, Server};
//!
//! fn main() -> std::io::Result<()> {
//!     Server::try_bind(ping::SERVER_ADDR)?.serve(ping::app())
//! }
//! ```
//!
//! and the client prints whatever the server said:
//!
//! ```no_run
//! let body = pingpong::client::get("http://localhost:8080/ping")?
//!     .into_body()
//!     .into_bytes()?;
//! println!("{}", String::from_utf8_lossy(&body));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod body;
pub mod client;
mod connection;
pub mod mux;
pub mod ping;
mod request;
mod response;
pub mod server;

use std::{
    error::Error,
    io::{self, BufReader, BufWriter, Write},
};

pub use body::{Body, HttpBody};
pub use connection::Connection;
use headers::HeaderMapExt;
pub use http::{header, Method, Request, Response, StatusCode, Uri, Version};
use http::HeaderValue;
use log::debug;
pub use mux::Mux;
pub use request::ParseError;
use response::Outcome;
pub use response::not_found;
pub use server::Server;

type IncomingRequest = Request<Body>;

/// Maps [`Request`]s to [`Response`]s.
///
/// Usually you don't need to manually implement this trait, as its `Fn` implementation might suffice
/// most of the needs.
///
/// ```no_run
/// # use std::convert::Infallible;
/// # use pingpong::{Body, Request, Response, Server};
/// fn app(_req: Request<Body>) -> Result<Response<&'static str>, Infallible> {
///     Ok(Response::new("pong!"))
/// }
///
/// fn main() -> std::io::Result<()> {
///     Server::try_bind("0.0.0.0:8080")?.serve(app)
/// }
/// ```
///
/// Implementing it by hand lets you answer `Expect: 100-continue` requests.
pub trait App {
    type Body: HttpBody;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    fn handle(&self, request: IncomingRequest) -> Result<Response<Self::Body>, Self::Error>;

    fn should_continue(&self, _: &IncomingRequest) -> StatusCode {
        StatusCode::CONTINUE
    }
}

impl<F, Body, Err> App for F
where
    F: Fn(IncomingRequest) -> Result<Response<Body>, Err>,
    F: Sync + Send,
    F: Clone,
    Body: HttpBody,
    Err: Into<Box<dyn Error + Send + Sync>>,
{
    type Body = Body;
    type Error = Err;

    fn handle(&self, request: IncomingRequest) -> Result<Response<Self::Body>, Self::Error> {
        self(request)
    }
}

fn status_only(status: StatusCode) -> Response<()> {
    let mut res = Response::new(());
    *res.status_mut() = status;
    res
}

/// Answers a request that could not be parsed with `400 Bad Request` and gives up on the
/// connection.
fn reject(err: ParseError, writer: &mut impl Write) -> io::Result<()> {
    if let ParseError::Io(err) = err {
        return Err(err);
    }

    let mut res = status_only(StatusCode::BAD_REQUEST);
    res.headers_mut()
        .insert("connection", HeaderValue::from_static("close"));
    response::write_response(res, writer, false)?;
    writer.flush()?;

    Err(io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Serves every request sent over `stream` until either side closes the connection.
pub(crate) fn serve<C: Into<Connection>, A: App>(stream: C, app: A) -> io::Result<()> {
    let conn = stream.into();
    let mut reader = BufReader::new(conn.try_clone()?);
    let mut writer = BufWriter::new(conn);

    loop {
        let head = request::parse_request_head(&mut reader);
        let mut req = match head {
            Ok(req) => req.map(|()| Body::empty()),
            Err(ParseError::ConnectionClosed) => break,
            Err(err) => return reject(err, &mut writer),
        };

        let asks_for_close = req
            .headers()
            .typed_get::<headers::Connection>()
            .filter(|conn| conn.contains("close"))
            .is_some();

        let asks_for_keep_alive = req
            .headers()
            .typed_get::<headers::Connection>()
            .filter(|conn| conn.contains("keep-alive"))
            .is_some();

        let version = req.version();

        let demands_close = match version {
            Version::HTTP_09 => true,
            Version::HTTP_10 => !asks_for_keep_alive,
            _ => asks_for_close,
        };

        let expects_continue = req
            .headers()
            .typed_get::<headers::Expect>()
            .filter(|expect| expect == &headers::Expect::CONTINUE)
            .is_some();

        if expects_continue {
            match app.should_continue(&req) {
                status @ StatusCode::CONTINUE => {
                    response::write_response(status_only(status), &mut writer, false)?;
                    writer.flush()?;
                }
                // The body was never asked for, so nothing else on this connection can be trusted
                status => {
                    let mut res = status_only(status);
                    res.headers_mut()
                        .insert("connection", HeaderValue::from_static("close"));
                    response::write_response(res, &mut writer, false)?;
                    break;
                }
            };
        }

        let body = match request::read_request_body(req.headers(), &mut reader) {
            Ok(body) => body,
            Err(err) => return reject(err, &mut writer),
        };
        *req.body_mut() = body;

        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let mut res = app
            .handle(req)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        debug!("{method} {path} {:?} -> {}", version, res.status());

        *res.version_mut() = version;

        if version == Version::HTTP_10 && asks_for_keep_alive {
            res.headers_mut()
                .insert("connection", HeaderValue::from_static("keep-alive"));
        } else if demands_close {
            res.headers_mut()
                .insert("connection", HeaderValue::from_static("close"));
        }

        match response::write_response(res, &mut writer, method == Method::HEAD)? {
            Outcome::KeepAlive if demands_close => break,
            Outcome::KeepAlive => writer.flush()?,
            Outcome::Close => break,
        }
    }

    writer.flush()
}
