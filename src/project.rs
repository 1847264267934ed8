//! Project identifiers and the settings view returned to API callers

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    config::{Redacted, SmtpConfig},
    error::{self, Error},
};

const MAX_PROJECT_ID_LEN: usize = 36;

/// Identifier of the project owning a configuration
///
/// Starts with an ASCII letter or digit, followed by letters, digits, `.`,
/// `_` or `-`, up to 36 characters in total. This keeps identifiers usable
/// as file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Checks and wraps a project identifier
    pub fn new<S: Into<String>>(id: S) -> Result<Self, Error> {
        let id = id.into();
        check_project_id(&id)?;
        Ok(ProjectId(id))
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_project_id(id: &str) -> Result<(), Error> {
    let mut chars = id.chars();
    let valid = id.len() <= MAX_PROJECT_ID_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(error::invalid_argument(
            "Project ID is invalid",
            format!("invalid project id '{id}'"),
        ))
    }
}

impl FromStr for ProjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectId::new(s)
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        ProjectId::new(id).map_err(serde::de::Error::custom)
    }
}

/// The committed SMTP settings of a project, as echoed back to the caller
///
/// Every field of [`SmtpConfig`] appears with an `smtp` prefix, the password
/// included.
///
/// ```
/// use smtp_settings::{ProjectSmtp, SmtpConfig};
///
/// let view = ProjectSmtp::from(SmtpConfig::default());
/// let json = serde_json::to_value(&view)?;
///
/// assert_eq!(json["smtpEnabled"], false);
/// assert_eq!(json["smtpUsername"], "");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSmtp {
    /// Whether outbound mail is enabled
    pub smtp_enabled: bool,
    /// Address mail is sent from
    pub smtp_sender_email: String,
    /// Display name mail is sent with
    pub smtp_sender_name: String,
    /// Reply-to address, empty when unset
    pub smtp_reply_to: String,
    /// Relay host
    pub smtp_host: String,
    /// Relay port
    pub smtp_port: i64,
    /// Relay username, empty when unset
    pub smtp_username: String,
    /// Relay password, empty when unset
    pub smtp_password: String,
    /// `""`, `"tls"` or `"ssl"`
    pub smtp_secure: String,
}

impl ProjectSmtp {
    /// Turns the view back into the stored settings
    pub fn into_config(self) -> SmtpConfig {
        SmtpConfig {
            enabled: self.smtp_enabled,
            sender_email: self.smtp_sender_email,
            sender_name: self.smtp_sender_name,
            reply_to: self.smtp_reply_to,
            host: self.smtp_host,
            port: self.smtp_port,
            username: self.smtp_username,
            password: self.smtp_password,
            secure: self.smtp_secure,
        }
    }
}

impl From<SmtpConfig> for ProjectSmtp {
    fn from(config: SmtpConfig) -> Self {
        Self {
            smtp_enabled: config.enabled,
            smtp_sender_email: config.sender_email,
            smtp_sender_name: config.sender_name,
            smtp_reply_to: config.reply_to,
            smtp_host: config.host,
            smtp_port: config.port,
            smtp_username: config.username,
            smtp_password: config.password,
            smtp_secure: config.secure,
        }
    }
}

impl fmt::Debug for ProjectSmtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectSmtp")
            .field("smtp_enabled", &self.smtp_enabled)
            .field("smtp_sender_email", &self.smtp_sender_email)
            .field("smtp_sender_name", &self.smtp_sender_name)
            .field("smtp_reply_to", &self.smtp_reply_to)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &Redacted(&self.smtp_password))
            .field("smtp_secure", &self.smtp_secure)
            .finish()
    }
}
