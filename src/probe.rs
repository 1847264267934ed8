//! Live connection checks against the relay of a submitted configuration
//!
//! The check opens a real SMTP session, negotiates exactly the security
//! layer that was asked for, authenticates when credentials were given, then
//! closes the session. No message is ever sent.

use std::{sync::Arc, time::Duration};

use crate::{
    config::Secure,
    transport::smtp::{
        authentication::{Mechanism, DEFAULT_MECHANISMS},
        client::{Certificate, CertificateStore, SmtpConnection, Tls},
        error::Error,
        extension::ClientId,
    },
    validate::ProbeTarget,
};

/// Bound on a whole probe, from the TCP connection to `QUIT`
///
/// Every SMTP read and write only gets the time left, so a server trickling its
/// replies cannot hold a probe past this limit.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether authentication has to be attempted
///
/// Credentials only count as a pair: both values must be non-blank. The
/// values themselves are never trimmed before being sent.
///
/// ```
/// use smtp_settings::auth_mode;
///
/// assert!(auth_mode("mailer", "hunter2"));
/// assert!(!auth_mode("mailer", ""));
/// assert!(!auth_mode(" ", "hunter2"));
/// ```
pub fn auth_mode(username: &str, password: &str) -> bool {
    !username.trim().is_empty() && !password.trim().is_empty()
}

/// Outcome of a connection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The session was opened, secured and authenticated as requested
    Success {
        /// Name the server gave in its `EHLO` reply
        server: String,
        /// Whether the session was encrypted when it was closed
        encrypted: bool,
    },
    /// The server rejected the credentials or offered no way to use them
    AuthenticationFailed(String),
    /// The server could not be reached, secured or understood
    ConnectionFailed(String),
}

impl ProbeResult {
    /// Returns true for [`ProbeResult::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success { .. })
    }

    /// The transport diagnostic of a failure
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ProbeResult::Success { .. } => None,
            ProbeResult::AuthenticationFailed(diagnostic)
            | ProbeResult::ConnectionFailed(diagnostic) => Some(diagnostic),
        }
    }
}

/// Checks that a relay accepts a configuration
///
/// [`SmtpProber`] is the implementation talking to real servers.
pub trait Prober {
    /// Runs the check, blocking until it completes or times out
    fn probe(&self, target: &ProbeTarget) -> ProbeResult;
}

impl<P: Prober + ?Sized> Prober for &P {
    fn probe(&self, target: &ProbeTarget) -> ProbeResult {
        (**self).probe(target)
    }
}

impl<P: Prober + ?Sized> Prober for Arc<P> {
    fn probe(&self, target: &ProbeTarget) -> ProbeResult {
        (**self).probe(target)
    }
}

/// Probes relays over SMTP
///
/// ```rust,no_run
/// use smtp_settings::{
///     transport::smtp::extension::ClientId, Prober, ProbeTarget, Secure, SmtpProber,
/// };
///
/// let prober = SmtpProber::builder()
///     .hello_name(ClientId::Domain("settings.example.com".to_owned()))
///     .build();
///
/// let result = prober.probe(&ProbeTarget {
///     host: "smtp.example.com".to_owned(),
///     port: 465,
///     secure: Secure::Ssl,
///     credentials: Some(("mailer", "hunter2").into()),
/// });
/// println!("{result:?}");
/// ```
#[derive(Debug, Clone)]
pub struct SmtpProber {
    hello_name: ClientId,
    mechanisms: Vec<Mechanism>,
    cert_store: CertificateStore,
    root_certs: Vec<Certificate>,
    accept_invalid_certs: bool,
    accept_invalid_hostnames: bool,
}

impl Default for SmtpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpProber {
    /// Creates a prober with the default `EHLO` name and TLS settings
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new [`SmtpProberBuilder`]
    pub fn builder() -> SmtpProberBuilder {
        SmtpProberBuilder::new()
    }

    fn tls(&self, target: &ProbeTarget) -> Result<Tls, Error> {
        match target.secure {
            Secure::None => Ok(Tls::None),
            #[cfg(any(feature = "native-tls", feature = "rustls"))]
            Secure::Tls => self.tls_parameters(&target.host).map(Tls::Required),
            #[cfg(any(feature = "native-tls", feature = "rustls"))]
            Secure::Ssl => self.tls_parameters(&target.host).map(Tls::Wrapper),
            #[cfg(not(any(feature = "native-tls", feature = "rustls")))]
            Secure::Tls | Secure::Ssl => Err(crate::transport::smtp::error::client(
                "TLS support is not enabled",
            )),
        }
    }

    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    fn tls_parameters(
        &self,
        host: &str,
    ) -> Result<crate::transport::smtp::client::TlsParameters, Error> {
        use crate::transport::smtp::client::TlsParameters;

        self.root_certs
            .iter()
            .cloned()
            .fold(
                TlsParameters::builder(bare_host(host).to_owned()),
                |builder, cert| builder.add_root_certificate(cert),
            )
            .certificate_store(self.cert_store.clone())
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .dangerous_accept_invalid_hostnames(self.accept_invalid_hostnames)
            .build()
    }

    /// Opens the session and secures it as requested
    fn open(&self, target: &ProbeTarget, tls: &Tls) -> Result<SmtpConnection, Error> {
        let wrapper = match tls {
            #[cfg(any(feature = "native-tls", feature = "rustls"))]
            Tls::Wrapper(tls_parameters) => Some(tls_parameters),
            _ => None,
        };

        let mut conn = SmtpConnection::connect(
            (bare_host(&target.host), target.port),
            Some(PROBE_TIMEOUT),
            &self.hello_name,
            wrapper,
        )?;

        #[cfg(any(feature = "native-tls", feature = "rustls"))]
        if let Tls::Required(tls_parameters) = tls {
            if let Err(err) = conn.starttls(tls_parameters, &self.hello_name) {
                conn.abort();
                return Err(err);
            }
        }

        Ok(conn)
    }

    fn authenticate(&self, conn: &mut SmtpConnection, target: &ProbeTarget) -> ProbeResult {
        let Some(credentials) = &target.credentials else {
            #[cfg(feature = "tracing")]
            tracing::debug!("no credentials given, skipping authentication");
            return success(conn);
        };

        if !conn.server_info().advertises_auth() {
            return ProbeResult::AuthenticationFailed(
                "server does not support authentication".to_owned(),
            );
        }

        match conn.auth(&self.mechanisms, credentials) {
            Ok(_) => success(conn),
            Err(err) if err.is_permanent() || err.is_transient() || err.is_client() => {
                ProbeResult::AuthenticationFailed(err.to_string())
            }
            Err(err) => ProbeResult::ConnectionFailed(err.to_string()),
        }
    }
}

impl Prober for SmtpProber {
    fn probe(&self, target: &ProbeTarget) -> ProbeResult {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            host = %target.host,
            port = target.port,
            secure = %target.secure,
            auth = target.auth_mode(),
            "probing smtp server"
        );

        let result = match self.tls(target).and_then(|tls| self.open(target, &tls)) {
            Ok(mut conn) => {
                let result = self.authenticate(&mut conn, target);
                conn.abort();
                result
            }
            Err(err) => ProbeResult::ConnectionFailed(err.to_string()),
        };

        #[cfg(feature = "tracing")]
        match &result {
            ProbeResult::Success { server, encrypted } => {
                tracing::debug!(%server, encrypted, "probe succeeded");
            }
            ProbeResult::AuthenticationFailed(diagnostic)
            | ProbeResult::ConnectionFailed(diagnostic) => {
                tracing::debug!(%diagnostic, "probe failed");
            }
        }
        result
    }
}

fn success(conn: &SmtpConnection) -> ProbeResult {
    ProbeResult::Success {
        server: conn.server_info().name().to_owned(),
        encrypted: conn.is_encrypted(),
    }
}

fn bare_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Builder for [`SmtpProber`]
#[derive(Debug, Clone)]
pub struct SmtpProberBuilder {
    prober: SmtpProber,
}

impl Default for SmtpProberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpProberBuilder {
    /// Creates a builder with the default settings
    pub fn new() -> Self {
        Self {
            prober: SmtpProber {
                hello_name: ClientId::default(),
                mechanisms: DEFAULT_MECHANISMS.into(),
                cert_store: CertificateStore::Default,
                root_certs: Vec::new(),
                accept_invalid_certs: false,
                accept_invalid_hostnames: false,
            },
        }
    }

    /// Set the name used during EHLO
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.prober.hello_name = name;
        self
    }

    /// Set the authentication mechanisms to try, in order of preference
    pub fn authentication(mut self, mechanisms: Vec<Mechanism>) -> Self {
        self.prober.mechanisms = mechanisms;
        self
    }

    /// Set the source for the base set of root certificates to trust
    pub fn certificate_store(mut self, cert_store: CertificateStore) -> Self {
        self.prober.cert_store = cert_store;
        self
    }

    /// Trust an additional root certificate
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.prober.root_certs.push(cert);
        self
    }

    /// Controls whether invalid certificates are accepted
    ///
    /// # Warning
    ///
    /// Only meant for development relays using self-signed certificates.
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.prober.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Controls whether certificates with an invalid hostname are accepted
    pub fn dangerous_accept_invalid_hostnames(mut self, accept_invalid_hostnames: bool) -> Self {
        self.prober.accept_invalid_hostnames = accept_invalid_hostnames;
        self
    }

    /// Build the prober
    pub fn build(self) -> SmtpProber {
        self.prober
    }
}
