use anyhow::Context;
use std::sync::Arc;

use crate::step::{Step, StepCtx, StepOutcome, StepSummary};

/// Ordered, fail-fast sequence of provisioning steps
pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
}

/// Outcome of every step that ran, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub entries: Vec<(StepSummary, StepOutcome)>,
}

impl ProvisionReport {
    pub fn created(&self) -> usize {
        self.count(StepOutcome::Created)
    }

    pub fn skipped(&self) -> usize {
        self.count(StepOutcome::Skipped)
    }

    fn count(&self, outcome: StepOutcome) -> usize {
        self.entries.iter().filter(|(_, o)| *o == outcome).count()
    }
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step; steps run in registration order
    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Describe every step without touching the database
    pub fn summaries(&self) -> Vec<StepSummary> {
        self.steps.iter().map(|step| step.summary()).collect()
    }

    /// Apply all steps in order, stopping at the first failure.
    ///
    /// Nothing is rolled back: steps that already ran stay applied.
    pub async fn run(&self, ctx: &StepCtx<'_>) -> anyhow::Result<ProvisionReport> {
        tracing::info!(
            database = ctx.database(),
            steps = self.steps.len(),
            policy = ?ctx.policy(),
            "running provisioning steps"
        );

        let mut report = ProvisionReport::default();

        for step in &self.steps {
            let summary = step.summary();
            tracing::info!(step = step.name(), target = %summary.target, "applying step");

            let outcome = step.apply(ctx).await.with_context(|| {
                format!("step '{}' failed for '{}'", step.name(), summary.target)
            })?;

            tracing::debug!(step = step.name(), outcome = ?outcome, "step applied");
            report.entries.push((summary, outcome));
        }

        Ok(report)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
