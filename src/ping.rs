//! The ping/pong programs: a server answering `/ping` with `pong!` and a client printing what
//! it answered.

use std::{
    convert::Infallible,
    io::{self, Write},
    net::{Ipv4Addr, ToSocketAddrs},
};

use http::{Request, Response};
use log::info;

use crate::{
    client::{self, RequestError},
    Body, Mux, Server,
};

pub const PING_PATH: &str = "/ping";

/// Body of every answer to [`PING_PATH`].
pub const PONG: &[u8] = b"pong!";

pub const PORT: u16 = 8080;

/// Where the server listens: every interface, port [`PORT`].
pub const SERVER_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::UNSPECIFIED, PORT);

/// What the client asks for.
pub const CLIENT_URL: &str = "http://localhost:8080/ping";

/// Answers any request with `200 OK` and [`PONG`].
pub fn pong(_req: Request<Body>) -> Result<Response<&'static [u8]>, Infallible> {
    Ok(Response::new(PONG))
}

pub fn app() -> Mux {
    Mux::new().handle_func(PING_PATH, pong)
}

/// Binds `addr` and serves [`app`] on it. Only returns when binding or accepting fails.
pub fn run_server<A: ToSocketAddrs>(addr: A) -> io::Result<()> {
    let server = Server::try_bind(addr)?;

    if let Some(addr) = server.local_addr() {
        info!("listening on {addr}");
    }

    server.serve(app())
}

/// Fetches `url`, returning its body. Failing to read the body yields an empty one.
pub fn fetch(url: &str) -> Result<Vec<u8>, RequestError> {
    let res = client::get(url)?;
    Ok(res.into_body().into_bytes().unwrap_or_default())
}

/// Fetches `url` and writes a single line to `out`: the body of the response, whatever its
/// status, or the reason the request failed.
pub fn run_client(url: &str, out: &mut impl Write) -> io::Result<()> {
    match fetch(url) {
        Ok(body) => writeln!(out, "{}", String::from_utf8_lossy(&body)),
        Err(err) => writeln!(out, "Get {url:?}: {err}"),
    }
}
