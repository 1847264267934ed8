//! The update flow tying validation, probing and storage together

use crate::{
    config::{SmtpConfig, SmtpConfigPatch},
    error::{self, Error},
    probe::{ProbeResult, Prober},
    project::{ProjectId, ProjectSmtp},
    store::ProjectStore,
    validate::{validate, Verdict},
};

/// Reads and updates the SMTP settings of projects
///
/// An update is either committed as a whole or rejected, in which case the
/// previously committed settings stay untouched:
///
/// * invalid fields are rejected with [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument)
///   before any connection is made
/// * disabled settings are committed without probing
/// * enabled settings are committed only if the probe succeeds, otherwise
///   they are rejected with
///   [`ErrorKind::ProjectSmtpConfigInvalid`](crate::ErrorKind::ProjectSmtpConfigInvalid)
#[derive(Debug, Clone)]
pub struct SmtpSettings<S, P> {
    store: S,
    prober: P,
}

impl<S, P> SmtpSettings<S, P>
where
    S: ProjectStore,
    P: Prober,
{
    /// Creates a service on top of a store and a prober
    pub fn new(store: S, prober: P) -> Self {
        Self { store, prober }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying prober
    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// The committed settings of a project
    ///
    /// A project without settings gets the disabled, empty view.
    pub fn get(&self, project: &ProjectId) -> Result<ProjectSmtp, Error> {
        Ok(self
            .store
            .load(project)?
            .map(ProjectSmtp::from)
            .unwrap_or_default())
    }

    /// Validates, probes if enabled, then commits the patched settings
    ///
    /// Blocks for as long as the probe runs, which
    /// [`SmtpProber`](crate::SmtpProber) bounds with
    /// [`PROBE_TIMEOUT`](crate::PROBE_TIMEOUT).
    pub fn update(&self, project: &ProjectId, patch: SmtpConfigPatch) -> Result<ProjectSmtp, Error> {
        let candidate = self.candidate(project, patch)?;

        match validate(&candidate).map_err(|err| rejected(project, err.into()))? {
            Verdict::Disabled => {
                #[cfg(feature = "tracing")]
                tracing::debug!(%project, "settings disabled, skipping probe");
            }
            Verdict::Probe(target) => {
                check(self.prober.probe(&target)).map_err(|err| rejected(project, err))?;
            }
        }

        self.commit(project, candidate)
    }

    /// Same as [`update`](Self::update), with the patch given as a JSON body
    ///
    /// A body that is not a valid patch is rejected as an invalid argument.
    pub fn update_from_json(&self, project: &ProjectId, body: &str) -> Result<ProjectSmtp, Error> {
        let patch: SmtpConfigPatch = serde_json::from_str(body)
            .map_err(|err| error::invalid_argument("Request body is invalid", err))?;
        self.update(project, patch)
    }

    fn candidate(&self, project: &ProjectId, patch: SmtpConfigPatch) -> Result<SmtpConfig, Error> {
        let current = self.store.load(project)?;
        Ok(patch.apply(current.as_ref()))
    }

    fn commit(&self, project: &ProjectId, config: SmtpConfig) -> Result<ProjectSmtp, Error> {
        self.store.replace(project, &config)?;

        #[cfg(feature = "tracing")]
        tracing::info!(%project, enabled = config.enabled, "smtp settings committed");
        Ok(ProjectSmtp::from(config))
    }
}

#[cfg(feature = "tokio1")]
impl<S, P> SmtpSettings<S, P>
where
    S: ProjectStore,
    P: Prober + Clone + Send + 'static,
{
    /// Same as [`update`](Self::update), running the probe on tokio's
    /// blocking pool
    ///
    /// Dropping the returned future never commits the candidate. A probe
    /// already running still closes its connection when it ends.
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio1")))]
    pub async fn update_tokio1(
        &self,
        project: &ProjectId,
        patch: SmtpConfigPatch,
    ) -> Result<ProjectSmtp, Error> {
        let candidate = self.candidate(project, patch)?;

        if let Verdict::Probe(target) =
            validate(&candidate).map_err(|err| rejected(project, err.into()))?
        {
            let prober = self.prober.clone();
            let result = tokio1_crate::task::spawn_blocking(move || prober.probe(&target))
                .await
                .unwrap_or_else(|err| ProbeResult::ConnectionFailed(err.to_string()));
            check(result).map_err(|err| rejected(project, err))?;
        }

        self.commit(project, candidate)
    }
}

fn check(result: ProbeResult) -> Result<(), Error> {
    match result {
        ProbeResult::Success { .. } => Ok(()),
        ProbeResult::AuthenticationFailed(diagnostic)
        | ProbeResult::ConnectionFailed(diagnostic) => {
            Err(error::smtp_config_invalid(&diagnostic))
        }
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn rejected(project: &ProjectId, err: Error) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!(%project, kind = %err.kind(), message = err.message(), "smtp settings rejected");
    err
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::Secure,
        store::{MemoryStore, StoreError},
        transport::smtp::authentication::Credentials,
        validate::ProbeTarget,
        ErrorKind,
    };

    /// Answers every probe with the same result and remembers the targets
    struct RecordingProber {
        result: ProbeResult,
        targets: Mutex<Vec<ProbeTarget>>,
    }

    impl RecordingProber {
        fn new(result: ProbeResult) -> Self {
            Self {
                result,
                targets: Mutex::new(Vec::new()),
            }
        }

        fn accepting() -> Self {
            Self::new(ProbeResult::Success {
                server: "mx.example.com".to_owned(),
                encrypted: false,
            })
        }

        fn targets(&self) -> Vec<ProbeTarget> {
            self.targets.lock().unwrap().clone()
        }
    }

    impl Prober for RecordingProber {
        fn probe(&self, target: &ProbeTarget) -> ProbeResult {
            self.targets.lock().unwrap().push(target.clone());
            self.result.clone()
        }
    }

    struct BrokenStore;

    impl ProjectStore for BrokenStore {
        fn load(&self, _project: &ProjectId) -> Result<Option<SmtpConfig>, StoreError> {
            Ok(None)
        }

        fn replace(&self, _project: &ProjectId, _config: &SmtpConfig) -> Result<(), StoreError> {
            Err(StoreError::Client("read-only"))
        }
    }

    fn project() -> ProjectId {
        ProjectId::new("marketing").unwrap()
    }

    fn complete() -> SmtpConfigPatch {
        SmtpConfigPatch::enabled()
            .sender("noreply@example.com", "Example")
            .server("smtp.example.com", 587)
            .credentials("mailer", "hunter2")
            .secure("tls")
    }

    #[test]
    fn test_commit_after_successful_probe() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());

        let committed = settings.update(&project(), complete()).unwrap();

        assert!(committed.smtp_enabled);
        assert_eq!(committed.smtp_password, "hunter2");
        assert_eq!(settings.get(&project()).unwrap(), committed);
        assert_eq!(
            settings.prober().targets(),
            vec![ProbeTarget {
                host: "smtp.example.com".to_owned(),
                port: 587,
                secure: Secure::Tls,
                credentials: Some(Credentials::new("mailer".to_owned(), "hunter2".to_owned())),
            }]
        );
    }

    #[test]
    fn test_disabled_is_committed_without_probe() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());

        let committed = settings
            .update(
                &project(),
                SmtpConfigPatch::disabled().server("unreachable.invalid", 0),
            )
            .unwrap();

        assert!(!committed.smtp_enabled);
        assert_eq!(committed.smtp_port, 0);
        assert!(settings.prober().targets().is_empty());
    }

    #[test]
    fn test_failed_probe_keeps_previous_settings() {
        let store = MemoryStore::new();
        SmtpSettings::new(&store, RecordingProber::accepting())
            .update(&project(), complete())
            .unwrap();

        let settings = SmtpSettings::new(
            &store,
            RecordingProber::new(ProbeResult::AuthenticationFailed(
                "permanent error (535): 5.7.8 Bad credentials".to_owned(),
            )),
        );
        let err = settings
            .update(
                &project(),
                complete().credentials("mailer", "wrong").server("mail.example.org", 465),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProjectSmtpConfigInvalid);
        assert_eq!(
            err.message(),
            "Could not connect to SMTP server: permanent error (535): 5.7.8 Bad credentials"
        );

        let stored = settings.get(&project()).unwrap();
        assert_eq!(stored.smtp_host, "smtp.example.com");
        assert_eq!(stored.smtp_password, "hunter2");
    }

    #[test]
    fn test_invalid_fields_are_rejected_before_probe() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());

        let err = settings
            .update(&project(), complete().sender("noreply@example.com", "  "))
            .unwrap_err();

        assert!(err.is_invalid_argument());
        assert_eq!(err.message(), "Sender name is required");
        assert!(settings.prober().targets().is_empty());
        assert_eq!(settings.store().load(&project()).unwrap(), None);
    }

    #[test]
    fn test_partial_credentials_skip_authentication() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());

        let committed = settings
            .update(&project(), complete().credentials("mailer", ""))
            .unwrap();

        assert_eq!(committed.smtp_username, "mailer");
        assert_eq!(settings.prober().targets()[0].credentials, None);
    }

    #[test]
    fn test_patch_keeps_stored_fields() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());
        settings.update(&project(), complete()).unwrap();

        let committed = settings
            .update_from_json(&project(), r#"{"enabled":true,"port":2525}"#)
            .unwrap();

        assert_eq!(committed.smtp_port, 2525);
        assert_eq!(committed.smtp_host, "smtp.example.com");
        assert_eq!(committed.smtp_username, "mailer");
        assert_eq!(settings.prober().targets()[1].port, 2525);
    }

    #[test]
    fn test_resubmitting_is_idempotent() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());
        let first = settings.update(&project(), complete()).unwrap();

        let second = settings
            .update(&project(), SmtpConfigPatch::from(first.clone().into_config()))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(settings.get(&project()).unwrap(), first);
    }

    #[test]
    fn test_invalid_json_body() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());

        for body in ["", "{", r#"{"host":"smtp.example.com"}"#, r#"{"enabled":"yes"}"#] {
            let err = settings.update_from_json(&project(), body).unwrap_err();
            assert!(err.is_invalid_argument(), "{body}");
        }
    }

    #[test]
    fn test_out_of_range_json_port() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());
        settings.update(&project(), complete()).unwrap();

        for body in [
            r#"{"enabled":true,"port":1e20}"#,
            r#"{"enabled":true,"port":99999999999999999999}"#,
        ] {
            let err = settings.update_from_json(&project(), body).unwrap_err();
            assert!(err.is_invalid_argument(), "{body}");
            assert_eq!(err.message(), "Port is invalid");
        }
        assert_eq!(settings.prober().targets().len(), 1);
    }

    #[test]
    fn test_get_without_settings() {
        let settings = SmtpSettings::new(MemoryStore::new(), RecordingProber::accepting());

        assert_eq!(settings.get(&project()).unwrap(), ProjectSmtp::default());
    }

    #[test]
    fn test_store_failure() {
        let settings = SmtpSettings::new(BrokenStore, RecordingProber::accepting());

        let err = settings.update(&project(), complete()).unwrap_err();

        assert!(err.is_store());
        assert_eq!(err.status_code(), 500);
    }
}
