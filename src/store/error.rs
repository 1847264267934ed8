//! Error type of the project stores

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io,
};

use self::StoreError::*;

/// An enum of all store error kinds.
#[derive(Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// Internal store error
    Client(&'static str),
    /// IO error
    Io(io::Error),
    /// JSON serialization error
    JsonSerialization(serde_json::Error),
    /// A writer panicked while holding the store lock
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match *self {
            Client(err) => fmt.write_str(err),
            Io(ref err) => err.fmt(fmt),
            JsonSerialization(ref err) => err.fmt(fmt),
            Poisoned => fmt.write_str("store lock poisoned"),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Io(ref err) => Some(err),
            JsonSerialization(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> StoreError {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> StoreError {
        StoreError::JsonSerialization(err)
    }
}

impl From<&'static str> for StoreError {
    fn from(string: &'static str) -> StoreError {
        StoreError::Client(string)
    }
}
