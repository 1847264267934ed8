//! The file store keeps the settings of each project as a JSON document in a
//! directory. The name of the file will be `{project}.json`.
//!
//! A document is first written to a hidden temporary file next to it, then
//! renamed over the previous one, so readers see either the old or the new
//! settings in full.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use uuid::Uuid;

use super::{ProjectStore, StoreError};
use crate::{config::SmtpConfig, project::ProjectId};

/// Stores settings as one JSON file per project
#[derive(Debug, Clone)]
#[cfg_attr(docsrs, doc(cfg(feature = "file-store")))]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a new store in the given directory, creating it if needed
    pub fn new<P: AsRef<Path>>(path: P) -> Result<FileStore, StoreError> {
        let path = PathBuf::from(path.as_ref());
        fs::create_dir_all(&path)?;
        if !path.is_dir() {
            return Err(StoreError::Client("store path is not a directory"));
        }

        Ok(FileStore { path })
    }

    /// The directory the documents are written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document(&self, project: &ProjectId) -> PathBuf {
        self.path.join(format!("{project}.json"))
    }
}

impl ProjectStore for FileStore {
    fn load(&self, project: &ProjectId) -> Result<Option<SmtpConfig>, StoreError> {
        let serialized = match fs::read(self.document(project)) {
            Ok(serialized) => serialized,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_slice(&serialized)?))
    }

    fn replace(&self, project: &ProjectId, config: &SmtpConfig) -> Result<(), StoreError> {
        let serialized = serde_json::to_vec_pretty(config)?;
        let tmp = self
            .path
            .join(format!(".{project}.{}.tmp", Uuid::new_v4()));

        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(&serialized)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|()| fs::rename(&tmp, self.document(project))) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(%project, path = %self.path.display(), "settings written");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::env::temp_dir;

    use pretty_assertions::assert_eq;

    use super::*;

    fn store() -> FileStore {
        FileStore::new(temp_dir().join(format!("smtp-settings-{}", Uuid::new_v4()))).unwrap()
    }

    #[test]
    fn test_replace_and_load() {
        let store = store();
        let project = ProjectId::new("marketing").unwrap();
        assert_eq!(store.load(&project).unwrap(), None);

        let config = SmtpConfig {
            enabled: true,
            sender_email: "noreply@example.com".to_owned(),
            sender_name: "Example".to_owned(),
            host: "smtp.example.com".to_owned(),
            port: 587,
            secure: "tls".to_owned(),
            ..SmtpConfig::default()
        };
        store.replace(&project, &config).unwrap();
        assert_eq!(store.load(&project).unwrap(), Some(config));

        let disabled = SmtpConfig::default();
        store.replace(&project, &disabled).unwrap();
        assert_eq!(store.load(&project).unwrap(), Some(disabled));

        let files = fs::read_dir(store.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(files, vec!["marketing.json".to_owned()]);

        fs::remove_dir_all(store.path()).unwrap();
    }

    #[test]
    fn test_corrupted_document() {
        let store = store();
        let project = ProjectId::new("billing").unwrap();
        fs::write(store.path().join("billing.json"), b"{ not json").unwrap();

        assert!(matches!(
            store.load(&project),
            Err(StoreError::JsonSerialization(_))
        ));

        fs::remove_dir_all(store.path()).unwrap();
    }

    #[test]
    fn test_path_is_a_file() {
        let path = temp_dir().join(format!("smtp-settings-{}.json", Uuid::new_v4()));
        fs::write(&path, b"{}").unwrap();

        assert!(FileStore::new(&path).is_err());

        fs::remove_file(&path).unwrap();
    }
}
