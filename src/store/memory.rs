use std::{collections::HashMap, sync::RwLock};

use super::{ProjectStore, StoreError};
use crate::{config::SmtpConfig, project::ProjectId};

/// Keeps the settings in memory, for tests and single-process deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<ProjectId, SmtpConfig>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of projects with committed settings
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.projects.read().map_err(|_| StoreError::Poisoned)?.len())
    }

    /// Whether no project has committed settings
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|len| len == 0)
    }
}

impl ProjectStore for MemoryStore {
    fn load(&self, project: &ProjectId) -> Result<Option<SmtpConfig>, StoreError> {
        let projects = self.projects.read().map_err(|_| StoreError::Poisoned)?;
        Ok(projects.get(project).cloned())
    }

    fn replace(&self, project: &ProjectId, config: &SmtpConfig) -> Result<(), StoreError> {
        let mut projects = self.projects.write().map_err(|_| StoreError::Poisoned)?;
        projects.insert(project.clone(), config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_replace_and_load() {
        let store = MemoryStore::new();
        let project = ProjectId::new("marketing").unwrap();
        assert_eq!(store.load(&project).unwrap(), None);
        assert!(store.is_empty().unwrap());

        let first = SmtpConfig {
            host: "smtp.example.com".to_owned(),
            port: 25,
            ..SmtpConfig::default()
        };
        store.replace(&project, &first).unwrap();
        assert_eq!(store.load(&project).unwrap(), Some(first));

        let second = SmtpConfig {
            enabled: true,
            host: "mail.example.org".to_owned(),
            ..SmtpConfig::default()
        };
        store.replace(&project, &second).unwrap();
        assert_eq!(store.load(&project).unwrap(), Some(second));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_projects_are_isolated() {
        let store = MemoryStore::new();
        let marketing = ProjectId::new("marketing").unwrap();
        let billing = ProjectId::new("billing").unwrap();

        store
            .replace(
                &marketing,
                &SmtpConfig {
                    host: "smtp.example.com".to_owned(),
                    ..SmtpConfig::default()
                },
            )
            .unwrap();

        assert_eq!(store.load(&billing).unwrap(), None);
    }
}
