//! Post-provisioning checks against a live backend.

use std::fmt;

use anyhow::Context;
use rms_kernel::{AdminBackend, RoleGrant, Settings};

/// A way in which the database differs from the provisioning plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    MissingUser {
        username: String,
    },
    GrantMismatch {
        username: String,
        expected: Vec<RoleGrant>,
        actual: Vec<RoleGrant>,
    },
    MissingCollection {
        name: String,
    },
    UnexpectedCollection {
        name: String,
    },
    NonEmptyCollection {
        name: String,
        documents: u64,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MissingUser { username } => write!(f, "user '{}' does not exist", username),
            Finding::GrantMismatch {
                username,
                expected,
                actual,
            } => write!(
                f,
                "user '{}' has grants {} but expected {}",
                username,
                render(actual),
                render(expected)
            ),
            Finding::MissingCollection { name } => {
                write!(f, "collection '{}' does not exist", name)
            }
            Finding::UnexpectedCollection { name } => {
                write!(f, "collection '{}' is not part of the plan", name)
            }
            Finding::NonEmptyCollection { name, documents } => {
                write!(f, "collection '{}' holds {} documents", name, documents)
            }
        }
    }
}

fn render(grants: &[RoleGrant]) -> String {
    let parts: Vec<String> = grants
        .iter()
        .map(|grant| format!("{}@{}", grant.role, grant.db))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Compare the target database with the plan derived from `settings`.
///
/// An empty result means the user holds exactly the planned grants and the
/// database contains exactly the planned collections, all empty.
pub async fn verify(
    settings: &Settings,
    backend: &dyn AdminBackend,
) -> anyhow::Result<Vec<Finding>> {
    let provision = &settings.provision;
    let database = provision.database.as_str();
    let username = provision.user.username.as_str();
    let mut findings = Vec::new();

    let grants = backend
        .user_grants(database, username)
        .await
        .with_context(|| format!("failed to look up user '{}'", username))?;

    match grants {
        None => findings.push(Finding::MissingUser {
            username: username.to_string(),
        }),
        Some(mut actual) => {
            let mut expected = provision.grants();
            actual.sort();
            expected.sort();
            if actual != expected {
                findings.push(Finding::GrantMismatch {
                    username: username.to_string(),
                    expected,
                    actual,
                });
            }
        }
    }

    let present = backend
        .collection_names(database)
        .await
        .with_context(|| format!("failed to list collections of '{}'", database))?;

    for name in &provision.collections {
        if !present.contains(name) {
            findings.push(Finding::MissingCollection { name: name.clone() });
            continue;
        }

        let documents = backend
            .count_documents(database, name)
            .await
            .with_context(|| format!("failed to count documents in '{}'", name))?;
        if documents > 0 {
            findings.push(Finding::NonEmptyCollection {
                name: name.clone(),
                documents,
            });
        }
    }

    for name in present {
        if !name.starts_with("system.") && !provision.collections.contains(&name) {
            findings.push(Finding::UnexpectedCollection { name });
        }
    }

    tracing::info!(database, findings = findings.len(), "verification finished");
    Ok(findings)
}
