use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream},
};

/// A TCP stream carrying HTTP, either accepted by the server or dialed by the client.
///
/// The socket is closed once every handle obtained through [`Connection::try_clone`] is dropped.
#[derive(Debug)]
pub struct Connection(TcpStream);

impl Connection {
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.0.peer_addr().ok()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.0.local_addr().ok()
    }

    /// Creates an independent handle to the same socket, usually one for reading and another one
    /// for writing.
    pub fn try_clone(&self) -> io::Result<Self> {
        self.0.try_clone().map(Connection)
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl From<TcpStream> for Connection {
    fn from(conn: TcpStream) -> Self {
        Connection(conn)
    }
}

impl From<(TcpStream, SocketAddr)> for Connection {
    fn from((conn, _addr): (TcpStream, SocketAddr)) -> Self {
        Connection(conn)
    }
}
