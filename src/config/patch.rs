use std::fmt;

use serde::{Deserialize, Deserializer};

use super::{Redacted, SmtpConfig};

/// A partial update of a project's SMTP settings
///
/// `enabled` is always required. Every other field left out keeps its
/// currently stored value, or the empty default when the project has no
/// settings yet.
///
/// Deserializes from the camelCase JSON body of a settings update:
///
/// ```
/// use smtp_settings::SmtpConfigPatch;
///
/// let patch: SmtpConfigPatch = serde_json::from_str(
///     r#"{ "enabled": true, "host": "smtp.example.com", "port": 587 }"#,
/// )?;
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfigPatch {
    pub(crate) enabled: bool,
    #[serde(default)]
    pub(crate) sender_email: Option<String>,
    #[serde(default)]
    pub(crate) sender_name: Option<String>,
    #[serde(default)]
    pub(crate) reply_to: Option<String>,
    #[serde(default)]
    pub(crate) host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub(crate) port: Option<i64>,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default)]
    pub(crate) secure: Option<String>,
}

impl SmtpConfigPatch {
    /// Starts a patch enabling the settings
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Starts a patch disabling the settings
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Set the sender address and display name
    pub fn sender<E: Into<String>, N: Into<String>>(mut self, email: E, name: N) -> Self {
        self.sender_email = Some(email.into());
        self.sender_name = Some(name.into());
        self
    }

    /// Set the reply-to address, an empty string clears it
    pub fn reply_to<E: Into<String>>(mut self, email: E) -> Self {
        self.reply_to = Some(email.into());
        self
    }

    /// Set the relay host and port
    pub fn server<H: Into<String>>(mut self, host: H, port: i64) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// Set the username and password, empty strings clear them
    pub fn credentials<U: Into<String>, P: Into<String>>(mut self, username: U, password: P) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the security mode, one of `""`, `"tls"` or `"ssl"`
    pub fn secure<S: Into<String>>(mut self, secure: S) -> Self {
        self.secure = Some(secure.into());
        self
    }

    /// Whether the patch enables the settings
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Builds the full candidate settings from the stored ones
    pub fn apply(self, current: Option<&SmtpConfig>) -> SmtpConfig {
        let base = current.cloned().unwrap_or_default();

        SmtpConfig {
            enabled: self.enabled,
            sender_email: self.sender_email.unwrap_or(base.sender_email),
            sender_name: self.sender_name.unwrap_or(base.sender_name),
            reply_to: self.reply_to.unwrap_or(base.reply_to),
            host: self.host.unwrap_or(base.host),
            port: self.port.unwrap_or(base.port),
            username: self.username.unwrap_or(base.username),
            password: self.password.unwrap_or(base.password),
            secure: self.secure.unwrap_or(base.secure),
        }
    }
}

/// Accepts any JSON number as a port
///
/// Numbers without an exact `i64` value saturate to `i64::MIN` or `i64::MAX`,
/// which the validator then reports as an invalid port.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.map(|number| port_from_number(&number)))
}

fn port_from_number(number: &serde_json::Number) -> i64 {
    if let Some(port) = number.as_i64() {
        return port;
    }

    match number.as_f64() {
        Some(port) if port.fract() == 0.0 && port >= i64::MIN as f64 && port < i64::MAX as f64 => {
            port as i64
        }
        Some(port) if port < 0.0 => i64::MIN,
        _ => i64::MAX,
    }
}

impl From<SmtpConfig> for SmtpConfigPatch {
    fn from(config: SmtpConfig) -> Self {
        Self {
            enabled: config.enabled,
            sender_email: Some(config.sender_email),
            sender_name: Some(config.sender_name),
            reply_to: Some(config.reply_to),
            host: Some(config.host),
            port: Some(config.port),
            username: Some(config.username),
            password: Some(config.password),
            secure: Some(config.secure),
        }
    }
}

impl fmt::Debug for SmtpConfigPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfigPatch")
            .field("enabled", &self.enabled)
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("reply_to", &self.reply_to)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_deref().map(Redacted))
            .field("secure", &self.secure)
            .finish()
    }
}
