#[cfg(feature = "rustls")]
use std::sync::Arc;
use std::{
    io::{self, Read, Write},
    mem,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

#[cfg(feature = "native-tls")]
use native_tls::TlsStream;
#[cfg(feature = "rustls")]
use rustls::{ClientConnection, StreamOwned};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use super::tls::{InnerTlsParameters, TlsParameters};
use crate::transport::smtp::{error, Error};

/// A network stream
#[derive(Debug)]
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

/// Represents the different types of underlying network streams
// usually only one TLS backend at a time is going to be enabled,
// so clippy::large_enum_variant doesn't make sense here
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    #[cfg(feature = "native-tls")]
    NativeTls(TlsStream<TcpStream>),
    /// Encrypted TCP stream
    #[cfg(feature = "rustls")]
    RustlsTls(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// Can't be built
    None,
}

impl NetworkStream {
    fn new(inner: InnerNetworkStream) -> Self {
        if let InnerNetworkStream::None = inner {
            debug_assert!(false, "InnerNetworkStream::None must never be built");
        }

        NetworkStream { inner }
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match &self.inner {
            InnerNetworkStream::Tcp(s) => s.peer_addr(),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.get_ref().peer_addr(),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(s) => s.sock.peer_addr(),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }

    /// Shutdowns the connection
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match &self.inner {
            InnerNetworkStream::Tcp(s) => s.shutdown(how),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.get_ref().shutdown(how),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(s) => s.sock.shutdown(how),
            InnerNetworkStream::None => Ok(()),
        }
    }

    /// Opens a TCP connection to the first reachable address, wrapping it in
    /// TLS when parameters are given
    pub fn connect<T: ToSocketAddrs>(
        server: T,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<NetworkStream, Error> {
        let tcp_stream = try_connect(server, timeout)?;
        tcp_stream
            .set_read_timeout(timeout)
            .map_err(error::network)?;
        tcp_stream
            .set_write_timeout(timeout)
            .map_err(error::network)?;

        let mut stream = NetworkStream::new(InnerNetworkStream::Tcp(tcp_stream));
        if let Some(tls_parameters) = tls_parameters {
            stream.upgrade_tls(tls_parameters)?;
        }
        Ok(stream)
    }

    /// Performs the TLS handshake over the current plaintext stream
    pub fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        if !matches!(self.inner, InnerNetworkStream::Tcp(_)) {
            return Ok(());
        }

        let InnerNetworkStream::Tcp(tcp_stream) =
            mem::replace(&mut self.inner, InnerNetworkStream::None)
        else {
            return Err(error::client("stream is not a plaintext TCP stream"));
        };

        self.inner = Self::upgrade_tls_impl(tcp_stream, tls_parameters)?;
        Ok(())
    }

    #[allow(unused_variables, unused_mut)]
    fn upgrade_tls_impl(
        mut tcp_stream: TcpStream,
        tls_parameters: &TlsParameters,
    ) -> Result<InnerNetworkStream, Error> {
        Ok(match tls_parameters.connector {
            #[cfg(feature = "native-tls")]
            InnerTlsParameters::NativeTls { ref connector } => {
                let stream = connector
                    .connect(tls_parameters.domain(), tcp_stream)
                    .map_err(|err| error::tls(err.to_string()))?;
                InnerNetworkStream::NativeTls(stream)
            }
            #[cfg(feature = "rustls")]
            InnerTlsParameters::Rustls {
                ref config,
                ref server_name,
            } => {
                let mut connection = ClientConnection::new(Arc::clone(config), server_name.clone())
                    .map_err(error::tls)?;
                while connection.is_handshaking() {
                    connection
                        .complete_io(&mut tcp_stream)
                        .map_err(error::tls)?;
                }
                InnerNetworkStream::RustlsTls(Box::new(StreamOwned::new(connection, tcp_stream)))
            }
        })
    }

    /// Tells if the stream is encrypted
    pub fn is_encrypted(&self) -> bool {
        match &self.inner {
            InnerNetworkStream::Tcp(_) | InnerNetworkStream::None => false,
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(_) => true,
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(_) => true,
        }
    }

    /// Set read timeout for IO calls
    pub fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(stream) => stream.set_read_timeout(duration),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(stream) => stream.get_ref().set_read_timeout(duration),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(stream) => stream.sock.set_read_timeout(duration),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }

    /// Set write timeout for IO calls
    pub fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(stream) => stream.set_write_timeout(duration),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(stream) => stream.get_ref().set_write_timeout(duration),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(stream) => stream.sock.set_write_timeout(duration),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.read(buf),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.read(buf),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(s) => s.read(buf),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.write(buf),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.write(buf),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(s) => s.write(buf),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            InnerNetworkStream::Tcp(s) => s.flush(),
            #[cfg(feature = "native-tls")]
            InnerNetworkStream::NativeTls(s) => s.flush(),
            #[cfg(feature = "rustls")]
            InnerNetworkStream::RustlsTls(s) => s.flush(),
            InnerNetworkStream::None => Err(none_stream()),
        }
    }
}

fn none_stream() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is not connected")
}

/// Tries every resolved address in turn, returning the first connected socket
///
/// All attempts share the same timeout.
fn try_connect<T: ToSocketAddrs>(server: T, timeout: Option<Duration>) -> Result<TcpStream, Error> {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let addrs = server.to_socket_addrs().map_err(error::connection)?;

    let mut last_err = None;
    for addr in addrs {
        let remaining = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if remaining.is_some_and(|remaining| remaining.is_zero()) {
            break;
        }

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(error::connection)?;
        let sock_addr = SockAddr::from(addr);

        let connected = match remaining {
            Some(remaining) => socket.connect_timeout(&sock_addr, remaining),
            None => socket.connect(&sock_addr),
        };

        match connected {
            Ok(()) => return Ok(socket.into()),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("connecting to {addr} failed: {err}");
                last_err = Some(err);
            }
        }
    }

    Err(match last_err {
        Some(last_err) => error::connection(last_err),
        None => error::connection("could not resolve to any supported address"),
    })
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, TcpListener};

    use super::*;

    #[test]
    fn test_connect_plaintext() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let stream =
            NetworkStream::connect(addr, Some(Duration::from_secs(1)), None).unwrap();
        assert!(!stream.is_encrypted());
        assert_eq!(stream.peer_addr().unwrap(), addr);
        stream.shutdown(Shutdown::Both).unwrap();
    }

    #[test]
    fn test_connect_refused() {
        let addr = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap()
        };

        let err = NetworkStream::connect(addr, Some(Duration::from_secs(1)), None).unwrap_err();
        assert!(err.is_connection());
    }

    #[test]
    fn test_connect_no_address() {
        let addrs: Vec<SocketAddr> = Vec::new();
        let err = NetworkStream::connect(addrs.as_slice(), None, None).unwrap_err();

        assert!(err.is_connection());
        assert!(err.to_string().contains("could not resolve"));
    }
}
