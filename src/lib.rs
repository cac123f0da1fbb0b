//! One-shot provisioning for the result_management MongoDB database.
//!
//! Creates the application user and the empty collections the application
//! expects, then prints a status line. The backend handle is always passed
//! in explicitly; see [`provision`].

pub mod modules;
pub mod verify;

pub use modules::build_pipeline;
pub use verify::{verify, Finding};

use rms_kernel::{AdminBackend, ProvisionReport, Settings, StatusSink, StepCtx};

/// Run every provisioning step against `backend`, fail-fast.
///
/// On error the database may be partially provisioned; nothing is undone and
/// the status line is not emitted.
pub async fn provision(
    settings: &Settings,
    backend: &dyn AdminBackend,
    status: &dyn StatusSink,
) -> anyhow::Result<ProvisionReport> {
    let pipeline = build_pipeline(settings);
    let ctx = StepCtx::select_database(
        settings.provision.database.clone(),
        settings,
        backend,
        status,
    );

    let report = pipeline.run(&ctx).await?;

    tracing::info!(
        database = ctx.database(),
        created = report.created(),
        skipped = report.skipped(),
        "provisioning complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rms_db::MemoryBackend;
    use rms_kernel::{ExistingPolicy, NewUser, ProvisionError, RoleGrant, Secret, StepOutcome};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl StatusSink for RecordingSink {
        fn emit(&self, message: &str) -> anyhow::Result<()> {
            self.lines.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    #[tokio::test]
    async fn fresh_database_gets_user_and_three_empty_collections() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();
        let sink = RecordingSink::default();

        let report = provision(&settings, &backend, &sink).await.unwrap();

        assert_eq!(report.created(), 4);
        assert_eq!(
            backend
                .user_grants("result_management", "app_user")
                .await
                .unwrap(),
            Some(vec![RoleGrant {
                role: "readWrite".to_string(),
                db: "result_management".to_string(),
            }])
        );
        assert_eq!(
            backend.users().unwrap(),
            vec![("result_management".to_string(), "app_user".to_string())]
        );

        let names = backend.collection_names("result_management").await.unwrap();
        assert_eq!(sorted(names), vec!["results", "students", "subjects"]);
        for name in ["students", "results", "subjects"] {
            assert_eq!(
                backend
                    .count_documents("result_management", name)
                    .await
                    .unwrap(),
                0
            );
        }

        assert_eq!(sink.lines(), vec!["Database initialized successfully"]);
        assert!(verify(&settings, &backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn steps_run_user_then_collections_then_status() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();
        let sink = RecordingSink::default();

        let report = provision(&settings, &backend, &sink).await.unwrap();
        let order: Vec<(&str, &str)> = report
            .entries
            .iter()
            .map(|(summary, _)| (summary.step.as_str(), summary.target.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![
                ("create_user", "app_user [readWrite@result_management]"),
                ("create_collection", "students"),
                ("create_collection", "results"),
                ("create_collection", "subjects"),
                ("emit_status", "Database initialized successfully"),
            ]
        );
        assert_eq!(report.entries[4].1, StepOutcome::Emitted);
    }

    #[tokio::test]
    async fn second_run_fails_on_duplicate_user_without_status() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();
        let first = RecordingSink::default();
        provision(&settings, &backend, &first).await.unwrap();

        let second = RecordingSink::default();
        let err = provision(&settings, &backend, &second).await.unwrap_err();

        assert!(err.to_string().contains("step 'create_user' failed"));
        assert!(err.downcast_ref::<ProvisionError>().unwrap().is_conflict());
        assert!(second.lines().is_empty());
    }

    #[tokio::test]
    async fn existing_collection_aborts_before_later_collections() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();
        backend
            .insert_documents("result_management", "results", 1)
            .unwrap();
        let sink = RecordingSink::default();

        let err = provision(&settings, &backend, &sink).await.unwrap_err();

        assert!(format!("{:#}", err).contains("collection 'results' already exists"));
        let names = backend.collection_names("result_management").await.unwrap();
        assert!(!names.contains(&"subjects".to_string()));
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn skip_policy_makes_rerun_succeed() {
        let mut settings = Settings::default();
        settings.provision.on_existing = ExistingPolicy::Skip;
        let backend = MemoryBackend::new();
        provision(&settings, &backend, &RecordingSink::default())
            .await
            .unwrap();

        let sink = RecordingSink::default();
        let report = provision(&settings, &backend, &sink).await.unwrap();

        assert_eq!(report.skipped(), 4);
        assert_eq!(report.created(), 0);
        assert_eq!(sink.lines(), vec!["Database initialized successfully"]);
    }

    #[tokio::test]
    async fn verify_reports_drift() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();
        provision(&settings, &backend, &RecordingSink::default())
            .await
            .unwrap();
        backend
            .insert_documents("result_management", "students", 3)
            .unwrap();
        backend
            .insert_documents("result_management", "teachers", 1)
            .unwrap();

        let findings = verify(&settings, &backend).await.unwrap();

        assert_eq!(
            findings,
            vec![
                Finding::NonEmptyCollection {
                    name: "students".to_string(),
                    documents: 3,
                },
                Finding::UnexpectedCollection {
                    name: "teachers".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn verify_on_empty_database_reports_everything_missing() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();

        let findings = verify(&settings, &backend).await.unwrap();

        assert_eq!(
            findings,
            vec![
                Finding::MissingUser {
                    username: "app_user".to_string(),
                },
                Finding::MissingCollection {
                    name: "students".to_string(),
                },
                Finding::MissingCollection {
                    name: "results".to_string(),
                },
                Finding::MissingCollection {
                    name: "subjects".to_string(),
                },
            ]
        );
        assert_eq!(findings[0].to_string(), "user 'app_user' does not exist");
    }

    #[tokio::test]
    async fn verify_reports_wrong_grants() {
        let settings = Settings::default();
        let backend = MemoryBackend::new();
        let read_only = RoleGrant {
            role: "read".to_string(),
            db: "result_management".to_string(),
        };
        backend
            .create_user(
                "result_management",
                &NewUser {
                    username: "app_user".to_string(),
                    secret: Secret::new("pw"),
                    roles: vec![read_only.clone()],
                },
            )
            .await
            .unwrap();
        for name in ["students", "results", "subjects"] {
            backend
                .create_collection("result_management", name)
                .await
                .unwrap();
        }

        let findings = verify(&settings, &backend).await.unwrap();

        assert_eq!(
            findings,
            vec![Finding::GrantMismatch {
                username: "app_user".to_string(),
                expected: settings.provision.grants(),
                actual: vec![read_only],
            }]
        );
        assert_eq!(
            findings[0].to_string(),
            "user 'app_user' has grants [read@result_management] \
             but expected [readWrite@result_management]"
        );
    }
}
