//! SMTP settings of a project, as submitted and as stored

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use url::Url;

pub use self::patch::SmtpConfigPatch;
use crate::{probe::auth_mode, validate::ValidationError};

mod connection_url;
mod patch;

/// Outbound mail settings of a project
///
/// Every field is kept as submitted, including values that would be
/// rejected for an enabled configuration. Use [`validate`](crate::validate())
/// to check the fields, or go through
/// [`SmtpSettings::update`](crate::SmtpSettings::update) which also runs the
/// connection check.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmtpConfig {
    /// When false the other fields are stored but never checked
    pub enabled: bool,
    /// Address mail is sent from
    pub sender_email: String,
    /// Display name mail is sent with
    pub sender_name: String,
    /// Optional reply-to address, empty when unset
    pub reply_to: String,
    /// Host name or IP address of the relay
    pub host: String,
    /// TCP port of the relay, valid between 1 and 65535
    pub port: i64,
    /// Optional username, empty when unset
    pub username: String,
    /// Optional password, empty when unset
    pub password: String,
    /// `""`, `"tls"` or `"ssl"`, see [`Secure`]
    pub secure: String,
}

impl SmtpConfig {
    /// Whether authentication will be attempted with these settings
    ///
    /// Both the username and the password must be non-blank. A single
    /// credential counts as none.
    pub fn is_authenticated(&self) -> bool {
        auth_mode(&self.username, &self.password)
    }

    /// The parsed security mode, if `secure` holds a known value
    pub fn secure_mode(&self) -> Option<Secure> {
        self.secure.parse().ok()
    }

    /// Renders the server part of the settings as a connection URL
    ///
    /// The password is never included. Returns `None` when the host or the
    /// port cannot be represented.
    ///
    /// ```
    /// use smtp_settings::SmtpConfig;
    ///
    /// let config = SmtpConfig {
    ///     host: "smtp.example.com".to_owned(),
    ///     port: 587,
    ///     username: "mailer".to_owned(),
    ///     password: "hunter2".to_owned(),
    ///     secure: "tls".to_owned(),
    ///     ..SmtpConfig::default()
    /// };
    ///
    /// assert_eq!(
    ///     config.to_url().unwrap().as_str(),
    ///     "smtp://mailer@smtp.example.com:587?tls=required"
    /// );
    /// ```
    pub fn to_url(&self) -> Option<Url> {
        self::connection_url::to_url(self)
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("enabled", &self.enabled)
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("reply_to", &self.reply_to)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &Redacted(&self.password))
            .field("secure", &self.secure)
            .finish()
    }
}

/// Shows whether a secret is set without showing it
pub(crate) struct Redacted<'a>(pub(crate) &'a str);

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("<redacted>")
        }
    }
}

/// Transport security requested for the relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Secure {
    /// `""`: plaintext, `STARTTLS` is never attempted
    #[default]
    None,
    /// `"tls"`: plaintext greeting upgraded with a mandatory `STARTTLS`
    Tls,
    /// `"ssl"`: TLS from the first byte
    Ssl,
}

impl Secure {
    /// The value as stored in [`SmtpConfig::secure`]
    pub fn as_str(self) -> &'static str {
        match self {
            Secure::None => "",
            Secure::Tls => "tls",
            Secure::Ssl => "ssl",
        }
    }
}

impl FromStr for Secure {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Secure::None),
            "tls" => Ok(Secure::Tls),
            "ssl" => Ok(Secure::Ssl),
            _ => Err(ValidationError::SecureInvalid),
        }
    }
}

impl Display for Secure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secure::None => f.write_str("none"),
            Secure::Tls => f.write_str("starttls"),
            Secure::Ssl => f.write_str("implicit tls"),
        }
    }
}
