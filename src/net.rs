//! Blocking transport: TCP or Unix-domain socket, with an opportunistic TLS
//! upgrade. Grounded on `qs/src/net/socket.rs`'s `Socket { kind: Kind }`
//! wrapper, reworked from tokio's `AsyncRead`/`AsyncWrite` to blocking
//! `std::io::{Read, Write}` for a preemptive-thread model.
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::error::{AuthError, Error};
use crate::message::frontend::SslRequest;

/// A connected byte stream speaking the PostgreSQL wire protocol: plain
/// TCP, a Unix-domain socket, or either wrapped in TLS after a successful
/// `SSLRequest` negotiation.
pub enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    #[cfg(feature = "tls")]
    Tls(native_tls::TlsStream<TcpStream>),
}

impl Socket {
    pub fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Socket::Tcp(stream))
    }

    #[cfg(unix)]
    pub fn connect_unix(path: &str) -> io::Result<Socket> {
        Ok(Socket::Unix(UnixStream::connect(path)?))
    }

    #[cfg(not(unix))]
    pub fn connect_unix(_path: &str) -> io::Result<Socket> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "unix sockets are not supported on this platform"))
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.set_read_timeout(timeout),
            #[cfg(unix)]
            Socket::Unix(s) => s.set_read_timeout(timeout),
            #[cfg(feature = "tls")]
            Socket::Tls(s) => s.get_ref().set_read_timeout(timeout),
        }
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.set_write_timeout(timeout),
            #[cfg(unix)]
            Socket::Unix(s) => s.set_write_timeout(timeout),
            #[cfg(feature = "tls")]
            Socket::Tls(s) => s.get_ref().set_write_timeout(timeout),
        }
    }

    /// Send the tagless `SSLRequest` and read the server's one-byte
    /// response (§4.4 startup). `'S'` means accepted — the caller should
    /// wrap `self` in TLS; any other byte means declined/unsupported.
    pub fn request_ssl(&mut self) -> io::Result<bool> {
        let mut buf = Vec::with_capacity(8);
        SslRequest.encode(&mut buf);
        self.write_all(&buf)?;
        self.flush()?;
        let mut response = [0u8; 1];
        self.read_exact(&mut response)?;
        Ok(response[0] == b'S')
    }
}

#[cfg(feature = "tls")]
impl Socket {
    /// Upgrade a TCP socket that has just accepted an `SSLRequest` into a
    /// TLS stream. Only `Socket::Tcp` can be upgraded — a Unix-domain
    /// socket has no matching server-side listener for SSL in practice.
    pub fn upgrade_tls(self, host: &str) -> Result<Socket, Error> {
        let Socket::Tcp(tcp) = self else {
            return Err(AuthError::Unsupported(0).into());
        };
        let connector = native_tls::TlsConnector::new().map_err(|e| io::Error::other(e.to_string()))?;
        let stream = connector.connect(host, tcp).map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Socket::Tls(stream))
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Socket::Unix(s) => s.read(buf),
            #[cfg(feature = "tls")]
            Socket::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Socket::Unix(s) => s.write(buf),
            #[cfg(feature = "tls")]
            Socket::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Socket::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Socket::Unix(s) => s.flush(),
            #[cfg(feature = "tls")]
            Socket::Tls(s) => s.flush(),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Socket::Tcp(s) => write!(f, "Socket::Tcp({s:?})"),
            #[cfg(unix)]
            Socket::Unix(s) => write!(f, "Socket::Unix({s:?})"),
            #[cfg(feature = "tls")]
            Socket::Tls(_) => f.write_str("Socket::Tls(..)"),
        }
    }
}
