//! Field checks run on submitted settings before any connection is made

use std::{error::Error as StdError, fmt};

use crate::{
    address::{Address, AddressError},
    config::{Secure, SmtpConfig},
    probe::auth_mode,
    transport::smtp::authentication::Credentials,
};

/// The first field of an enabled configuration that failed its check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// `senderName` is blank
    SenderNameRequired,
    /// `senderEmail` is blank
    SenderEmailRequired,
    /// `senderEmail` is not an email address
    SenderEmailInvalid(AddressError),
    /// `host` is blank
    HostRequired,
    /// `port` is outside of 1..=65535
    PortInvalid,
    /// `replyTo` is set but is not an email address
    ReplyToInvalid(AddressError),
    /// `secure` is not one of `""`, `"tls"` or `"ssl"`
    SecureInvalid,
}

impl ValidationError {
    /// The camelCase name of the rejected field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::SenderNameRequired => "senderName",
            ValidationError::SenderEmailRequired | ValidationError::SenderEmailInvalid(_) => {
                "senderEmail"
            }
            ValidationError::HostRequired => "host",
            ValidationError::PortInvalid => "port",
            ValidationError::ReplyToInvalid(_) => "replyTo",
            ValidationError::SecureInvalid => "secure",
        }
    }

    /// The message reported to the caller
    pub fn message(&self) -> &'static str {
        match self {
            ValidationError::SenderNameRequired => "Sender name is required",
            ValidationError::SenderEmailRequired => "Sender email is required",
            ValidationError::SenderEmailInvalid(_) => "Sender email is invalid",
            ValidationError::HostRequired => "Host is required",
            ValidationError::PortInvalid => "Port is invalid",
            ValidationError::ReplyToInvalid(_) => "Reply-to email is invalid",
            ValidationError::SecureInvalid => "Secure option is invalid",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl StdError for ValidationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ValidationError::SenderEmailInvalid(err) | ValidationError::ReplyToInvalid(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The settings are disabled. They are stored as they are and nothing
    /// is checked.
    Disabled,
    /// The settings are enabled and well formed, the server must be checked
    Probe(ProbeTarget),
}

/// What the prober needs to know about the server to check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Host name or IP address, without surrounding whitespace
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Requested transport security
    pub secure: Secure,
    /// Credentials to authenticate with, present only when both the
    /// username and the password are non-blank
    pub credentials: Option<Credentials>,
}

impl ProbeTarget {
    /// Whether authentication will be attempted
    pub fn auth_mode(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Checks the fields of submitted settings
///
/// Disabled settings are always accepted. For enabled settings the fields
/// are checked in a fixed order and the first failure is returned:
/// `senderName`, `senderEmail`, `host`, `port`, `replyTo`, `secure`.
///
/// ```
/// use smtp_settings::{validate, SmtpConfig, ValidationError};
///
/// let config = SmtpConfig {
///     enabled: true,
///     sender_name: "Example".to_owned(),
///     sender_email: "noreply@example.com".to_owned(),
///     ..SmtpConfig::default()
/// };
///
/// assert_eq!(validate(&config), Err(ValidationError::HostRequired));
/// ```
pub fn validate(config: &SmtpConfig) -> Result<Verdict, ValidationError> {
    if !config.enabled {
        return Ok(Verdict::Disabled);
    }

    if config.sender_name.trim().is_empty() {
        return Err(ValidationError::SenderNameRequired);
    }

    let sender_email = config.sender_email.trim();
    if sender_email.is_empty() {
        return Err(ValidationError::SenderEmailRequired);
    }
    sender_email
        .parse::<Address>()
        .map_err(ValidationError::SenderEmailInvalid)?;

    let host = config.host.trim();
    if host.is_empty() {
        return Err(ValidationError::HostRequired);
    }

    let port = u16::try_from(config.port)
        .ok()
        .filter(|port| *port > 0)
        .ok_or(ValidationError::PortInvalid)?;

    let reply_to = config.reply_to.trim();
    if !reply_to.is_empty() {
        reply_to
            .parse::<Address>()
            .map_err(ValidationError::ReplyToInvalid)?;
    }

    let secure = config.secure.parse::<Secure>()?;

    let credentials = auth_mode(&config.username, &config.password)
        .then(|| Credentials::new(config.username.clone(), config.password.clone()));

    Ok(Verdict::Probe(ProbeTarget {
        host: host.to_owned(),
        port,
        secure,
        credentials,
    }))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn valid() -> SmtpConfig {
        SmtpConfig {
            enabled: true,
            sender_email: "noreply@example.com".to_owned(),
            sender_name: "Example".to_owned(),
            reply_to: String::new(),
            host: "smtp.example.com".to_owned(),
            port: 587,
            username: "mailer".to_owned(),
            password: "hunter2".to_owned(),
            secure: "tls".to_owned(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(
            validate(&valid()),
            Ok(Verdict::Probe(ProbeTarget {
                host: "smtp.example.com".to_owned(),
                port: 587,
                secure: Secure::Tls,
                credentials: Some(Credentials::new(
                    "mailer".to_owned(),
                    "hunter2".to_owned()
                )),
            }))
        );
    }

    #[test]
    fn test_disabled_config_is_not_checked() {
        let config = SmtpConfig {
            enabled: false,
            port: -1,
            secure: "bogus".to_owned(),
            ..SmtpConfig::default()
        };

        assert_eq!(validate(&config), Ok(Verdict::Disabled));
    }

    #[test]
    fn test_first_violation_wins() {
        let config = SmtpConfig {
            enabled: true,
            ..SmtpConfig::default()
        };
        assert_eq!(validate(&config), Err(ValidationError::SenderNameRequired));

        let config = SmtpConfig {
            sender_name: "Example".to_owned(),
            ..config
        };
        assert_eq!(validate(&config), Err(ValidationError::SenderEmailRequired));

        let config = SmtpConfig {
            sender_email: "noreply@example.com".to_owned(),
            ..config
        };
        assert_eq!(validate(&config), Err(ValidationError::HostRequired));

        let config = SmtpConfig {
            host: "smtp.example.com".to_owned(),
            ..config
        };
        assert_eq!(validate(&config), Err(ValidationError::PortInvalid));

        let config = SmtpConfig {
            port: 25,
            secure: "starttls".to_owned(),
            reply_to: "nobody".to_owned(),
            ..config
        };
        assert_eq!(
            validate(&config),
            Err(ValidationError::ReplyToInvalid(AddressError::MissingParts))
        );

        let config = SmtpConfig {
            reply_to: String::new(),
            ..config
        };
        assert_eq!(validate(&config), Err(ValidationError::SecureInvalid));
    }

    #[test]
    fn test_blank_fields() {
        let config = SmtpConfig {
            sender_name: " \t".to_owned(),
            ..valid()
        };
        assert_eq!(validate(&config), Err(ValidationError::SenderNameRequired));

        let config = SmtpConfig {
            sender_email: "   ".to_owned(),
            ..valid()
        };
        assert_eq!(validate(&config), Err(ValidationError::SenderEmailRequired));

        let config = SmtpConfig {
            host: "  ".to_owned(),
            ..valid()
        };
        assert_eq!(validate(&config), Err(ValidationError::HostRequired));
    }

    #[test]
    fn test_port_range() {
        for port in [0, -25, 65536, i64::MAX] {
            let config = SmtpConfig { port, ..valid() };
            assert_eq!(validate(&config), Err(ValidationError::PortInvalid), "{port}");
        }

        for port in [1, 65535] {
            let config = SmtpConfig { port, ..valid() };
            assert!(validate(&config).is_ok(), "{port}");
        }
    }

    #[test]
    fn test_sender_email_invalid() {
        let config = SmtpConfig {
            sender_email: "not an email".to_owned(),
            ..valid()
        };
        let err = validate(&config).unwrap_err();

        assert_eq!(err.field(), "senderEmail");
        assert_eq!(err.message(), "Sender email is invalid");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_partial_credentials_are_dropped() {
        for (username, password) in [("mailer", ""), ("", "hunter2"), ("mailer", "  ")] {
            let config = SmtpConfig {
                username: username.to_owned(),
                password: password.to_owned(),
                ..valid()
            };

            match validate(&config) {
                Ok(Verdict::Probe(target)) => assert!(!target.auth_mode()),
                other => panic!("unexpected verdict {other:?}"),
            }
        }
    }

    #[test]
    fn test_credentials_are_not_trimmed() {
        let config = SmtpConfig {
            username: " mailer ".to_owned(),
            host: " smtp.example.com ".to_owned(),
            ..valid()
        };

        match validate(&config) {
            Ok(Verdict::Probe(target)) => {
                assert_eq!(target.host, "smtp.example.com");
                assert_eq!(
                    target.credentials,
                    Some(Credentials::new(" mailer ".to_owned(), "hunter2".to_owned()))
                );
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }
}
