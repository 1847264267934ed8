mod support;

#[cfg(test)]
mod settings {
    use pretty_assertions::assert_eq;
    use smtp_settings::{
        transport::smtp::extension::ClientId, ErrorKind, MemoryStore, ProjectId, ProjectSmtp,
        SmtpConfigPatch, SmtpProber, SmtpSettings,
    };

    use crate::support::{received, Script, ScriptedServer};

    fn settings() -> SmtpSettings<MemoryStore, SmtpProber> {
        SmtpSettings::new(
            MemoryStore::new(),
            SmtpProber::builder()
                .hello_name(ClientId::Domain("settings.test".to_owned()))
                .build(),
        )
    }

    fn project() -> ProjectId {
        ProjectId::new("project-1").unwrap()
    }

    fn body(value: serde_json::Value) -> String {
        value.to_string()
    }

    #[test]
    #[ignore = "requires access to smtp.gmail.com"]
    fn rejects_wrong_credentials_on_public_relay() {
        let settings = settings();

        let err = settings
            .update_from_json(
                &project(),
                &body(serde_json::json!({
                    "enabled": true,
                    "senderEmail": "test@example.com",
                    "senderName": "Test Sender",
                    "host": "smtp.gmail.com",
                    "port": 587,
                    "username": "invalid_user@gmail.com",
                    "password": "wrong_password_123",
                    "secure": "tls",
                })),
            )
            .unwrap_err();

        assert_eq!(err.payload().kind, "project_smtp_config_invalid");
        assert!(err.message().contains("Could not connect to SMTP server"));
        assert_eq!(settings.get(&project()).unwrap(), ProjectSmtp::default());
    }

    #[test]
    fn commits_open_relay_without_credentials() {
        let server = ScriptedServer::start(Script::open());
        let settings = settings();

        let committed = settings
            .update_from_json(
                &project(),
                &body(serde_json::json!({
                    "enabled": true,
                    "senderEmail": "noreply@localhost.dev",
                    "senderName": "Local Mailer",
                    "host": "127.0.0.1",
                    "port": server.port(),
                    "username": "",
                    "password": "",
                    "secure": "",
                })),
            )
            .unwrap();

        assert!(committed.smtp_enabled);
        assert_eq!(committed.smtp_username, "");
        assert_eq!(committed.smtp_sender_name, "Local Mailer");
        assert!(!received(&server.lines(), "AUTH"));
        assert_eq!(settings.get(&project()).unwrap(), committed);
    }

    #[test]
    fn commits_accepted_credentials() {
        let server = ScriptedServer::start(Script::authenticated("testuser", "testpass123"));
        let settings = settings();

        let committed = settings
            .update_from_json(
                &project(),
                &body(serde_json::json!({
                    "enabled": true,
                    "senderEmail": "valid@testmail.com",
                    "senderName": "Valid Test Sender",
                    "host": "127.0.0.1",
                    "port": server.port(),
                    "username": "testuser",
                    "password": "testpass123",
                    "secure": "",
                })),
            )
            .unwrap();

        assert!(received(&server.lines(), "AUTH"));
        assert_eq!(
            serde_json::to_value(&committed).unwrap(),
            serde_json::json!({
                "smtpEnabled": true,
                "smtpSenderEmail": "valid@testmail.com",
                "smtpSenderName": "Valid Test Sender",
                "smtpReplyTo": "",
                "smtpHost": "127.0.0.1",
                "smtpPort": committed.smtp_port,
                "smtpUsername": "testuser",
                "smtpPassword": "testpass123",
                "smtpSecure": "",
            })
        );
    }

    #[test]
    fn rejects_wrong_credentials_and_keeps_previous_settings() {
        let settings = settings();
        settings
            .update(
                &project(),
                SmtpConfigPatch::disabled().sender("noreply@example.com", "Example"),
            )
            .unwrap();

        let server = ScriptedServer::start(Script::authenticated("testuser", "testpass123"));
        let err = settings
            .update(
                &project(),
                SmtpConfigPatch::enabled()
                    .server("127.0.0.1", i64::from(server.port()))
                    .credentials("testuser", "wrong"),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProjectSmtpConfigInvalid);
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.message(),
            "Could not connect to SMTP server: permanent error (535): 5.7.8 Authentication credentials invalid"
        );
        assert!(received(&server.lines(), "AUTH"));

        let stored = settings.get(&project()).unwrap();
        assert!(!stored.smtp_enabled);
        assert_eq!(stored.smtp_host, "");
    }

    fn rejected_field(field: &str, value: &str, message: &str) {
        let mut submitted = serde_json::json!({
            "enabled": true,
            "senderEmail": "test@example.com",
            "senderName": "Test Sender",
            "host": "smtp.example.com",
            "port": 587,
            "username": "user",
            "password": "pass",
            "secure": "tls",
        });
        submitted[field] = serde_json::Value::from(value);

        let settings = settings();
        let err = settings
            .update_from_json(&project(), &body(submitted))
            .unwrap_err();

        assert_eq!(
            serde_json::to_value(err.payload()).unwrap(),
            serde_json::json!({
                "type": "general_argument_invalid",
                "message": message,
            })
        );
        assert_eq!(settings.get(&project()).unwrap(), ProjectSmtp::default());
    }

    #[test]
    fn rejects_missing_sender_name() {
        rejected_field("senderName", "", "Sender name is required");
    }

    #[test]
    fn rejects_missing_sender_email() {
        rejected_field("senderEmail", "", "Sender email is required");
    }

    #[test]
    fn rejects_missing_host() {
        rejected_field("host", "", "Host is required");
    }

    #[test]
    fn rejects_unknown_secure_option() {
        rejected_field("secure", "starttls", "Secure option is invalid");
    }

    #[test]
    fn commits_disabled_settings_without_connecting() {
        let settings = settings();

        let committed = settings
            .update_from_json(
                &project(),
                &body(serde_json::json!({
                    "enabled": false,
                    "senderEmail": "",
                    "host": "unreachable.invalid",
                    "port": -1,
                    "secure": "bogus",
                })),
            )
            .unwrap();

        assert!(!committed.smtp_enabled);
        assert_eq!(committed.smtp_port, -1);
        assert_eq!(committed.smtp_secure, "bogus");
    }

    #[cfg(feature = "file-store")]
    #[test]
    fn file_store_survives_restart() {
        use smtp_settings::FileStore;

        let dir = std::env::temp_dir().join(format!("smtp-settings-{}", std::process::id()));
        let server = ScriptedServer::start(Script::open());

        let committed = SmtpSettings::new(FileStore::new(&dir).unwrap(), SmtpProber::new())
            .update(
                &project(),
                SmtpConfigPatch::enabled()
                    .sender("noreply@localhost.dev", "Local Mailer")
                    .server("127.0.0.1", i64::from(server.port())),
            )
            .unwrap();
        server.lines();

        let reopened = SmtpSettings::new(FileStore::new(&dir).unwrap(), SmtpProber::new());
        assert_eq!(reopened.get(&project()).unwrap(), committed);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
