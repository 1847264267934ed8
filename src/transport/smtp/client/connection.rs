use std::{
    fmt::{self, Display},
    io::{self, BufRead, BufReader, Write},
    net::{Shutdown, ToSocketAddrs},
    str,
    time::{Duration, Instant},
};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{tls::TlsParameters, ConnectionState, ConnectionWrapper, NetworkStream};
use crate::transport::smtp::{
    authentication::{Credentials, Mechanism},
    commands::{Auth, Ehlo, Quit, Starttls},
    error::{self, Error},
    extension::{ClientId, Extension, ServerInfo},
    response::{parse_response, Response},
};

/// Maximum number of challenges answered in a single AUTH exchange
const MAX_CHALLENGES: u8 = 10;

/// Maximum size of a single reply, continuation lines included
const MAX_RESPONSE_LEN: usize = 4096;

/// Structure that implements the SMTP client
pub struct SmtpConnection {
    /// TCP stream between client and server
    stream: ConnectionWrapper<BufReader<NetworkStream>>,
    /// Whether QUIT has been sent
    sent_quit: bool,
    /// Information about the server
    server_info: ServerInfo,
    /// Point in time after which no more I/O is attempted
    deadline: Option<Instant>,
}

impl fmt::Debug for SmtpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConnection")
            .field("state", &self.stream.state())
            .field("sent_quit", &self.sent_quit)
            .field("server_info", &self.server_info)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl SmtpConnection {
    /// Get information about the server
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Connects to the configured server
    ///
    /// Reads the greeting, then sends EHLO and parses server information.
    ///
    /// The timeout bounds the whole session: it starts before the TCP
    /// connection and every later read and write only gets the time that is
    /// left. Once it is spent, operations fail with a timeout error.
    pub fn connect<A: ToSocketAddrs>(
        server: A,
        timeout: Option<Duration>,
        hello_name: &ClientId,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<SmtpConnection, Error> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let stream = NetworkStream::connect(server, timeout, tls_parameters)?;
        let stream = BufReader::new(stream);
        let mut conn = SmtpConnection {
            stream: ConnectionWrapper::new(stream),
            sent_quit: false,
            server_info: ServerInfo::default(),
            deadline,
        };

        let greeting = conn.read_response()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("greeting: {}", greeting.text());
        #[cfg(not(feature = "tracing"))]
        let _ = greeting;

        conn.ehlo(hello_name)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", conn.server_info);
        Ok(conn)
    }

    /// Upgrades the connection with `STARTTLS`, then sends EHLO again
    ///
    /// Fails without sending anything if the server does not advertise the
    /// extension.
    pub fn starttls(
        &mut self,
        tls_parameters: &TlsParameters,
        hello_name: &ClientId,
    ) -> Result<(), Error> {
        if !self.server_info.supports_feature(Extension::StartTls) {
            return Err(error::client("STARTTLS is not supported on this server"));
        }

        self.command(Starttls)?;
        self.arm()?;
        self.stream
            .sync_op(|stream| stream.get_mut().upgrade_tls(tls_parameters))?;
        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");
        // The server forgets everything learned before the upgrade
        self.ehlo(hello_name)
    }

    /// Send EHLO and update server info
    fn ehlo(&mut self, hello_name: &ClientId) -> Result<(), Error> {
        let ehlo_response = self.command(Ehlo::new(hello_name.clone()))?;
        self.server_info = ServerInfo::from_response(&ehlo_response)?;
        Ok(())
    }

    /// Sends QUIT
    pub fn quit(&mut self) -> Result<Response, Error> {
        self.sent_quit = true;
        self.command(Quit)
    }

    /// Ends the session, ignoring failures
    ///
    /// Sends QUIT unless it was already sent, then shuts the socket down.
    pub fn abort(&mut self) {
        if !self.sent_quit {
            let _ = self.quit();
        }

        if !matches!(self.stream.state(), ConnectionState::BrokenConnection) {
            let _ = self.stream.sync_op(|stream| {
                stream
                    .get_mut()
                    .shutdown(Shutdown::Both)
                    .map_err(error::network)
            });
        }
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().get_ref().is_encrypted()
    }

    /// Set timeout
    pub fn set_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        let stream = self.stream.get_mut_unchecked().get_mut();
        stream.set_read_timeout(duration)?;
        stream.set_write_timeout(duration)
    }

    /// Gives the socket the time left before the deadline
    fn arm(&mut self) -> Result<(), Error> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            self.stream.set_state(ConnectionState::BrokenConnection);
            return Err(error::timeout());
        }
        self.set_timeout(Some(remaining)).map_err(error::network)
    }

    /// Sends an AUTH command with the first mechanism of `mechanisms` the
    /// server supports, and answers its challenges
    pub fn auth(
        &mut self,
        mechanisms: &[Mechanism],
        credentials: &Credentials,
    ) -> Result<Response, Error> {
        let mechanism = self
            .server_info
            .get_auth_mechanism(mechanisms)
            .ok_or_else(|| error::client("No compatible authentication mechanism was found"))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "authenticating as {} with {}",
            credentials.username(),
            mechanism
        );

        let mut challenges = MAX_CHALLENGES;
        let mut response = self.secret_command(Auth::new(mechanism, credentials)?)?;

        while challenges > 0 && response.has_code(334) {
            challenges -= 1;
            response =
                self.secret_command(Auth::new_from_response(mechanism, credentials, &response)?)?;
        }

        if challenges == 0 {
            Err(error::response("Unexpected number of challenges"))
        } else {
            Ok(response)
        }
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        let line = command.to_string();
        self.write(line.as_bytes())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(">> {}", escape_crlf(&line));
        self.read_response()
    }

    /// Sends a command carrying credentials, keeping its content out of the
    /// logs
    fn secret_command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;
        #[cfg(feature = "tracing")]
        tracing::debug!(">> <redacted AUTH data>");
        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, string: &[u8]) -> Result<(), Error> {
        self.arm()?;
        self.stream
            .sync_op(|stream| stream.get_mut().write_all(string).map_err(error::io_error))?;
        self.stream
            .sync_op(|stream| stream.get_mut().flush().map_err(error::io_error))
    }

    /// Appends everything up to the next line feed to `buffer`
    ///
    /// Stops early at the end of the stream or once `buffer` outgrows
    /// [`MAX_RESPONSE_LEN`]. Returns the number of bytes appended.
    fn read_line(&mut self, buffer: &mut Vec<u8>) -> Result<usize, Error> {
        let start = buffer.len();

        loop {
            self.arm()?;
            let done = self.stream.sync_op(|stream| {
                let available = stream.fill_buf().map_err(error::io_error)?;
                let (used, done) = match available.iter().position(|b| *b == b'\n') {
                    Some(end) => (end + 1, true),
                    None => (available.len(), available.is_empty()),
                };
                buffer.extend_from_slice(&available[..used]);
                stream.consume(used);
                Ok(done)
            })?;

            if done || buffer.len() > MAX_RESPONSE_LEN {
                return Ok(buffer.len() - start);
            }
        }
    }

    /// Gets the SMTP response
    ///
    /// Negative replies are turned into errors carrying the reply code and
    /// text. Replies larger than 4 KiB are refused.
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = Vec::with_capacity(100);

        while self.read_line(&mut buffer)? > 0 {
            if buffer.len() > MAX_RESPONSE_LEN {
                self.stream.set_state(ConnectionState::BrokenResponse);
                return Err(error::response(format!(
                    "response exceeds {MAX_RESPONSE_LEN} bytes"
                )));
            }
            let text = match str::from_utf8(&buffer) {
                Ok(text) => text,
                Err(err) => {
                    self.stream.set_state(ConnectionState::BrokenResponse);
                    return Err(error::response(err));
                }
            };

            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(text));
            match parse_response(text) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(response.code(), Some(response.text())))
                    };
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Failure(e) | nom::Err::Error(e)) => {
                    self.stream.set_state(ConnectionState::BrokenResponse);
                    return Err(error::response(e.to_string()));
                }
            }
        }

        self.stream.set_state(ConnectionState::BrokenConnection);
        Err(error::response("incomplete response"))
    }
}
