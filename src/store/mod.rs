//! Storage of the committed settings of each project
//!
//! A store only ever replaces the whole [`SmtpConfig`] of a project. Two
//! updates of the same project are serialized by the store and the last one
//! wins; no reader can observe a mix of both.

use std::sync::Arc;

#[cfg(feature = "file-store")]
pub use self::file::FileStore;
pub use self::{error::StoreError, memory::MemoryStore};
use crate::{config::SmtpConfig, project::ProjectId};

mod error;
#[cfg(feature = "file-store")]
mod file;
mod memory;

/// Reads and atomically replaces the settings of a project
pub trait ProjectStore {
    /// The committed settings, `None` if the project never had any
    fn load(&self, project: &ProjectId) -> Result<Option<SmtpConfig>, StoreError>;

    /// Replaces the committed settings as a whole
    fn replace(&self, project: &ProjectId, config: &SmtpConfig) -> Result<(), StoreError>;
}

impl<T: ProjectStore + ?Sized> ProjectStore for &T {
    fn load(&self, project: &ProjectId) -> Result<Option<SmtpConfig>, StoreError> {
        (**self).load(project)
    }

    fn replace(&self, project: &ProjectId, config: &SmtpConfig) -> Result<(), StoreError> {
        (**self).replace(project, config)
    }
}

impl<T: ProjectStore + ?Sized> ProjectStore for Arc<T> {
    fn load(&self, project: &ProjectId) -> Result<Option<SmtpConfig>, StoreError> {
        (**self).load(project)
    }

    fn replace(&self, project: &ProjectId, config: &SmtpConfig) -> Result<(), StoreError> {
        (**self).replace(project, config)
    }
}
