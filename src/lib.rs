//! Validation, live probing and persistence of per-project SMTP settings.
//!
//! A project owns at most one [`SmtpConfig`]. Updating it goes through three
//! steps, evaluated in order:
//!
//! 1. the field validator ([`validate()`]) checks presence and shape of the
//!    submitted fields, without any I/O;
//! 2. when the configuration is enabled, the [`SmtpProber`] opens a real SMTP
//!    session against the submitted server, negotiates the requested
//!    security layer and authenticates if, and only if, both a username and a
//!    password were supplied;
//! 3. the whole configuration replaces the stored one through a
//!    [`ProjectStore`].
//!
//! Any failure leaves the previously committed configuration untouched.
//!
//! ## Example
//!
//! ```rust,no_run
//! use smtp_settings::{MemoryStore, ProjectId, SmtpConfigPatch, SmtpProber, SmtpSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SmtpSettings::new(MemoryStore::new(), SmtpProber::new());
//! let project = ProjectId::new("marketing")?;
//!
//! let patch = SmtpConfigPatch::enabled()
//!     .sender("noreply@example.com", "Example")
//!     .server("smtp.example.com", 587)
//!     .credentials("mailer", "hunter2")
//!     .secure("tls");
//!
//! match settings.update(&project, patch) {
//!     Ok(committed) => println!("committed {}", serde_json::to_string(&committed)?),
//!     Err(err) => println!("{}", serde_json::to_string(&err.payload())?),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **native-tls** (default): TLS through the platform library
//! * **rustls**: TLS through rustls, pick a crypto provider with **ring** or
//!   **aws-lc-rs** and a root store with **webpki-roots** or
//!   **rustls-native-certs** (**rustls-tls** selects ring and webpki-roots)
//! * **hostname** (default): use the local hostname in `EHLO`
//! * **tracing** (default): wire-level and decision logging via `tracing`
//! * **file-store** (default): the JSON-per-project [`FileStore`]
//! * **tokio1**: async update entry point running probes on tokio's
//!   blocking pool

#![doc(html_root_url = "https://docs.rs/smtp-settings/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    clippy::string_add,
    clippy::string_add_assign,
    clippy::clone_on_ref_ptr,
    clippy::verbose_file_reads,
    clippy::unnecessary_self_imports,
    clippy::inefficient_to_string
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(all(feature = "rustls", not(any(feature = "ring", feature = "aws-lc-rs"))))]
compile_error!(
    "feature `rustls` also requires a crypto provider: enable either `ring` or `aws-lc-rs`"
);

#[cfg(all(
    feature = "rustls",
    not(any(feature = "webpki-roots", feature = "rustls-native-certs"))
))]
compile_error!(
    "feature `rustls` also requires a root store: enable either `webpki-roots` or `rustls-native-certs`"
);

pub mod address;
pub mod config;
pub mod error;
pub mod probe;
pub mod project;
#[cfg(feature = "rustls")]
mod rustls_crypto;
pub mod service;
pub mod store;
pub mod transport;
pub mod validate;

pub use crate::{
    address::{Address, AddressError},
    config::{Secure, SmtpConfig, SmtpConfigPatch},
    error::{Error, ErrorKind, ErrorPayload},
    probe::{auth_mode, ProbeResult, Prober, SmtpProber, SmtpProberBuilder, PROBE_TIMEOUT},
    project::{ProjectId, ProjectSmtp},
    service::SmtpSettings,
    store::{MemoryStore, ProjectStore, StoreError},
    validate::{validate, ProbeTarget, ValidationError, Verdict},
};
#[cfg(feature = "file-store")]
pub use crate::store::FileStore;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
