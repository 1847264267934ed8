//! SMTP client
//!
//! `SmtpConnection` allows manually driving an SMTP session. The prober only
//! uses the session opening, `STARTTLS`, `AUTH` and `QUIT`.

#[cfg(feature = "tracing")]
use std::borrow::Cow;

pub use self::{
    connection::SmtpConnection,
    net::NetworkStream,
    tls::{Certificate, CertificateStore, Tls, TlsParameters, TlsParametersBuilder, TlsVersion},
};
use crate::transport::smtp::error::Error;

mod connection;
mod net;
mod tls;

/// Tracks whether the session can still be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    /// The connection is healthy
    Ok,
    /// The server sent something that could not be parsed
    BrokenResponse,
    /// An I/O operation failed
    BrokenConnection,
}

/// Wraps a stream and refuses any further operation once it has broken
#[derive(Debug)]
pub(crate) struct ConnectionWrapper<C> {
    conn: C,
    state: ConnectionState,
}

impl<C> ConnectionWrapper<C> {
    pub(crate) fn new(conn: C) -> Self {
        Self {
            conn,
            state: ConnectionState::Ok,
        }
    }

    pub(crate) fn get_ref(&self) -> &C {
        &self.conn
    }

    /// Access to the stream regardless of its state, for configuration only
    pub(crate) fn get_mut_unchecked(&mut self) -> &mut C {
        &mut self.conn
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Runs `op` on the inner stream, marking the connection broken if it
    /// fails
    pub(crate) fn sync_op<T, F>(&mut self, op: F) -> Result<T, Error>
    where
        F: FnOnce(&mut C) -> Result<T, Error>,
    {
        if self.state == ConnectionState::BrokenConnection {
            return Err(crate::transport::smtp::error::network(
                "attempted to use a broken connection",
            ));
        }

        match op(&mut self.conn) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = ConnectionState::BrokenConnection;
                Err(err)
            }
        }
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
///
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> Cow<'_, str> {
    if string.contains("\r\n") {
        Cow::Owned(string.replace("\r\n", "<CRLF>"))
    } else {
        Cow::Borrowed(string)
    }
}
