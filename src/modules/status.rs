use async_trait::async_trait;
use rms_kernel::{ProvisionError, Step, StepCtx, StepOutcome};

/// Prints the completion line. Registered last so it only runs after every
/// creation step succeeded.
pub struct EmitStatusStep {
    message: String,
}

impl EmitStatusStep {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Step for EmitStatusStep {
    fn name(&self) -> &'static str {
        "emit_status"
    }

    fn target(&self) -> String {
        self.message.clone()
    }

    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError> {
        ctx.status.emit(&self.message)?;
        Ok(StepOutcome::Emitted)
    }
}
