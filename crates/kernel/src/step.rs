use std::io::Write;

use async_trait::async_trait;
use serde::Serialize;

use crate::backend::AdminBackend;
use crate::error::ProvisionError;
use crate::settings::{ExistingPolicy, Settings};

/// Destination for the completion message.
pub trait StatusSink: Send + Sync {
    fn emit(&self, message: &str) -> anyhow::Result<()>;
}

/// Writes status lines to standard output.
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn emit(&self, message: &str) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", message)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Context handed to every step, bound to a single target database.
pub struct StepCtx<'a> {
    pub settings: &'a Settings,
    pub backend: &'a dyn AdminBackend,
    pub status: &'a dyn StatusSink,
    database: String,
}

impl<'a> StepCtx<'a> {
    /// Bind the following steps to the database called `name`.
    pub fn select_database(
        name: impl Into<String>,
        settings: &'a Settings,
        backend: &'a dyn AdminBackend,
        status: &'a dyn StatusSink,
    ) -> Self {
        Self {
            settings,
            backend,
            status,
            database: name.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn policy(&self) -> ExistingPolicy {
        self.settings.provision.on_existing
    }
}

/// Result of applying a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Created,
    Skipped,
    Emitted,
}

/// Printable description of a step, available without a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub step: String,
    pub target: String,
}

/// One side-effecting provisioning action.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in logs and plans, e.g. `create_user`
    fn name(&self) -> &'static str;

    /// Object the step acts on
    fn target(&self) -> String;

    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError>;

    fn summary(&self) -> StepSummary {
        StepSummary {
            step: self.name().to_string(),
            target: self.target(),
        }
    }
}

impl ExistingPolicy {
    /// Turn a create call's result into a step outcome.
    ///
    /// Under [`ExistingPolicy::Skip`] a duplicate becomes
    /// [`StepOutcome::Skipped`]; every other error is returned unchanged.
    pub fn resolve(self, result: Result<(), ProvisionError>) -> Result<StepOutcome, ProvisionError> {
        match result {
            Ok(()) => Ok(StepOutcome::Created),
            Err(err) if err.is_conflict() && self == ExistingPolicy::Skip => {
                tracing::warn!(error = %err, "already provisioned, skipping");
                Ok(StepOutcome::Skipped)
            }
            Err(err) => Err(err),
        }
    }
}
