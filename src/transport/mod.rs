//! Transports used to reach mail servers.
//!
//! Only SMTP is implemented. It is used by the [prober](crate::probe) to open
//! a session, negotiate the security layer and authenticate, then close the
//! session again without ever starting a mail transaction.

pub mod smtp;
