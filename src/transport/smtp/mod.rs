//! A minimal SMTP client, sufficient to verify that a relay accepts a session.
//!
//! The client follows [RFC 5321](https://tools.ietf.org/html/rfc5321) for the
//! parts of the dialogue a connection check needs:
//!
//! * greeting, `EHLO` and `QUIT`
//! * STARTTLS ([RFC 3207](https://tools.ietf.org/html/rfc3207)) and implicit
//!   TLS ([RFC 8314](https://tools.ietf.org/html/rfc8314))
//! * AUTH ([RFC 4954](http://tools.ietf.org/html/rfc4954)) with the PLAIN and
//!   LOGIN mechanisms
//!
//! #### Lower level
//!
//! A session can be driven by hand:
//!
//! ```rust,no_run
//! use smtp_settings::transport::smtp::{
//!     authentication::{Credentials, DEFAULT_MECHANISMS},
//!     client::SmtpConnection,
//!     extension::ClientId,
//!     SUBMISSION_PORT,
//! };
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), smtp_settings::transport::smtp::Error> {
//! let hello = ClientId::Domain("my_hostname".to_string());
//! let mut conn = SmtpConnection::connect(
//!     ("localhost", SUBMISSION_PORT),
//!     Some(Duration::from_secs(5)),
//!     &hello,
//!     None,
//! )?;
//! conn.auth(DEFAULT_MECHANISMS, &Credentials::new("user".into(), "pass".into()))?;
//! conn.quit()?;
//! # Ok(())
//! # }
//! ```

pub use self::{
    authentication::{Credentials, Mechanism, DEFAULT_MECHANISMS},
    client::{
        Certificate, CertificateStore, SmtpConnection, Tls, TlsParameters, TlsParametersBuilder,
        TlsVersion,
    },
    error::Error,
    extension::{ClientId, ServerInfo},
    response::{Code, Response},
};

pub mod authentication;
pub mod client;
pub mod commands;
pub mod error;
pub mod extension;
pub mod response;

// Registered port numbers:
// https://www.iana.org/assignments/service-names-port-numbers/service-names-port-numbers.xhtml

/// Default smtp port
pub const SMTP_PORT: u16 = 25;
/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;
/// Default submission over TLS port
///
/// Defined in [RFC8314](https://tools.ietf.org/html/rfc8314)
pub const SUBMISSIONS_PORT: u16 = 465;
