//! Errors returned by the settings service

use std::{error::Error as StdError, fmt};

use serde::{Deserialize, Serialize};

use crate::{store::StoreError, validate::ValidationError, BoxError};

/// Prefix of every message reporting a failed connection check
pub(crate) const PROBE_FAILURE_PREFIX: &str = "Could not connect to SMTP server: ";

/// The errors returned when reading or updating SMTP settings
///
/// Transport failures never appear here directly: a failed connection check
/// is reported as [`ErrorKind::ProjectSmtpConfigInvalid`] with the server
/// diagnostic in its message.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: ErrorKind,
    message: String,
    source: Option<BoxError>,
}

/// The externally visible category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A submitted field is missing or malformed. Nothing was attempted.
    InvalidArgument,
    /// The connection check ran against the submitted server and failed
    ProjectSmtpConfigInvalid,
    /// The settings could not be read from or written to the store
    Store,
}

impl ErrorKind {
    /// The wire name of the kind, used as `type` in [`ErrorPayload`]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "general_argument_invalid",
            ErrorKind::ProjectSmtpConfigInvalid => "project_smtp_config_invalid",
            ErrorKind::Store => "general_server_error",
        }
    }

    /// The HTTP status an API layer should answer with
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidArgument | ErrorKind::ProjectSmtpConfigInvalid => 400,
            ErrorKind::Store => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable body of an error response
///
/// ```json
/// { "type": "general_argument_invalid", "message": "Host is required" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Wire name of the [`ErrorKind`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Human readable message
    pub message: String,
}

impl Error {
    pub(crate) fn new<E>(kind: ErrorKind, message: impl Into<String>, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                message: message.into(),
                source: source.map(Into::into),
            }),
        }
    }

    /// The category of the error
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    /// The message shown to the caller
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Returns true if a submitted field was rejected
    pub fn is_invalid_argument(&self) -> bool {
        self.inner.kind == ErrorKind::InvalidArgument
    }

    /// Returns true if the connection check failed
    pub fn is_smtp_config_invalid(&self) -> bool {
        self.inner.kind == ErrorKind::ProjectSmtpConfigInvalid
    }

    /// Returns true if the store failed
    pub fn is_store(&self) -> bool {
        self.inner.kind == ErrorKind::Store
    }

    /// The HTTP status an API layer should answer with
    pub fn status_code(&self) -> u16 {
        self.inner.kind.status_code()
    }

    /// The serializable error body
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.inner.kind.as_str().to_owned(),
            message: self.inner.message.clone(),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("smtp_settings::Error");

        builder.field("kind", &self.inner.kind);
        builder.field("message", &self.inner.message);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inner.kind, self.inner.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn StdError + 'static) = &**e;
            r
        })
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::new(ErrorKind::InvalidArgument, err.message(), Some(err))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        store(err)
    }
}

pub(crate) fn invalid_argument<E: Into<BoxError>>(message: impl Into<String>, source: E) -> Error {
    Error::new(ErrorKind::InvalidArgument, message, Some(source))
}

pub(crate) fn smtp_config_invalid(diagnostic: &str) -> Error {
    Error::new::<BoxError>(
        ErrorKind::ProjectSmtpConfigInvalid,
        format!("{PROBE_FAILURE_PREFIX}{diagnostic}"),
        None,
    )
}

pub(crate) fn store(err: StoreError) -> Error {
    Error::new(ErrorKind::Store, "Could not access project settings", Some(err))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_validation_error_payload() {
        let err = Error::from(ValidationError::HostRequired);

        assert!(err.is_invalid_argument());
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.payload(),
            ErrorPayload {
                kind: "general_argument_invalid".to_owned(),
                message: "Host is required".to_owned(),
            }
        );
        assert_eq!(
            err.to_string(),
            "general_argument_invalid: Host is required"
        );
    }

    #[test]
    fn test_probe_failure_message() {
        let err = smtp_config_invalid("permanent error (535): 5.7.8 Bad credentials");

        assert!(err.is_smtp_config_invalid());
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.message(),
            "Could not connect to SMTP server: permanent error (535): 5.7.8 Bad credentials"
        );
    }

    #[test]
    fn test_store_error() {
        let err = Error::from(StoreError::Poisoned);

        assert!(err.is_store());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.payload().kind, "general_server_error");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_payload_json() {
        let payload = smtp_config_invalid("connection error: refused").payload();

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "type": "project_smtp_config_invalid",
                "message": "Could not connect to SMTP server: connection error: refused",
            })
        );
    }
}
