use async_trait::async_trait;
use rms_kernel::{ProvisionError, Step, StepCtx, StepOutcome};

/// Creates one empty collection. No validator or index is attached.
pub struct CreateCollectionStep {
    name: String,
}

impl CreateCollectionStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Step for CreateCollectionStep {
    fn name(&self) -> &'static str {
        "create_collection"
    }

    fn target(&self) -> String {
        self.name.clone()
    }

    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError> {
        let result = ctx.backend.create_collection(ctx.database(), &self.name).await;
        ctx.policy().resolve(result)
    }
}
