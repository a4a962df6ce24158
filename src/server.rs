use std::{
    io,
    net::{SocketAddr, TcpListener, ToSocketAddrs},
};

use log::{debug, warn};
use threadpool::ThreadPool;

use crate::{connection::Connection, serve, App};

/// Accepts connections and serves each one on a worker pool.
pub struct Server<'a> {
    thread_pool: ThreadPool,
    local_addr: Option<SocketAddr>,
    incoming: Box<dyn Iterator<Item = io::Result<Connection>> + 'a>,
}

impl<'a> Server<'a> {
    /// Serves `app` until the source of connections runs dry or fails. A failure to accept a
    /// connection is returned; requests already being served keep going on the pool.
    pub fn serve<Handle>(self, app: Handle) -> io::Result<()>
    where
        Handle: App,
        Handle: Send + Clone + 'static,
    {
        for conn in self.incoming {
            let conn = conn?;
            let app = app.clone();

            if let Some(peer) = conn.peer_addr() {
                debug!("accepted connection from {peer}");
            }

            self.thread_pool.execute(move || {
                if let Err(err) = serve(conn, app) {
                    debug!("connection closed with error: {err}");
                }
            });
        }

        Ok(())
    }

    /// Address of the listener, when the server was bound to one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn builder() -> ServerBuilder {
        Default::default()
    }

    pub fn try_bind<A: ToSocketAddrs>(addr: A) -> io::Result<Server<'static>> {
        Self::builder().try_bind(addr)
    }
}

impl From<TcpListener> for Server<'static> {
    fn from(listener: TcpListener) -> Self {
        Server::builder().from_listener(listener)
    }
}

pub struct ServerBuilder {
    max_threads: usize,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self { max_threads: 512 }
    }
}

impl ServerBuilder {
    /// Upper bound of connections served at the same time.
    pub fn max_threads(self, max_threads: usize) -> Self {
        Self { max_threads }
    }

    pub fn from_connections<'a, T: IntoIterator<Item = Connection> + 'a>(
        self,
        conns: T,
    ) -> Server<'a> {
        Server {
            thread_pool: ThreadPool::new(self.max_threads),
            local_addr: None,
            incoming: Box::new(conns.into_iter().map(Ok)),
        }
    }

    pub fn from_listener(self, listener: TcpListener) -> Server<'static> {
        Server {
            thread_pool: ThreadPool::new(self.max_threads),
            local_addr: listener.local_addr().ok(),
            incoming: Box::new(TcpAcceptor { listener }),
        }
    }

    pub fn try_bind<A: ToSocketAddrs>(self, addr: A) -> io::Result<Server<'static>> {
        let listener = TcpListener::bind(addr)?;
        Ok(self.from_listener(listener))
    }
}

struct TcpAcceptor {
    listener: TcpListener,
}

impl Iterator for TcpAcceptor {
    type Item = io::Result<Connection>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.listener.accept() {
                Ok(conn) => return Some(Ok(conn.into())),
                // Failures of a single connection, the listener itself is fine
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    warn!("failed to accept connection: {err}");
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
