use std::{collections::HashMap, error::Error, sync::Arc};

use http::{Request, Response};

use crate::{response::not_found, App, Body};

type BoxError = Box<dyn Error + Send + Sync>;

type Handler = dyn Fn(Request<Body>) -> Result<Response<Body>, BoxError> + Send + Sync;

/// Dispatches requests to handlers registered for their exact path.
///
/// The query string plays no part in matching, neither does the method. Requests for any other
/// path are answered with [`not_found`].
///
/// ```no_run
/// # use std::convert::Infallible;
/// # use pingpong::{Body, Mux, Request, Response, Server};
/// fn health(_req: Request<Body>) -> Result<Response<&'static str>, Infallible> {
///     Ok(Response::new("ok"))
/// }
///
/// let app = Mux::new().handle_func("/health", health);
/// Server::try_bind("0.0.0.0:8080")?.serve(app)?;
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct Mux {
    handlers: HashMap<String, Arc<Handler>>,
}

impl Mux {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `handler` for `path`, replacing whatever was registered for it before.
    pub fn handle_func<P, F, B, E>(mut self, path: P, handler: F) -> Self
    where
        P: Into<String>,
        F: Fn(Request<Body>) -> Result<Response<B>, E> + Send + Sync + 'static,
        B: Into<Body>,
        E: Into<BoxError>,
    {
        let handler = move |req: Request<Body>| -> Result<Response<Body>, BoxError> {
            handler(req)
                .map(|res| res.map(Into::into))
                .map_err(Into::into)
        };
        self.handlers.insert(path.into(), Arc::new(handler));
        self
    }
}

impl App for Mux {
    type Body = Body;
    type Error = BoxError;

    fn handle(&self, request: Request<Body>) -> Result<Response<Body>, Self::Error> {
        match self.handlers.get(request.uri().path()) {
            Some(handler) => handler(request),
            None => Ok(not_found()),
        }
    }
}
