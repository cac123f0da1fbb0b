pub mod collections;
pub mod status;
pub mod users;

use std::sync::Arc;

use rms_kernel::{Pipeline, Settings};

/// Register the provisioning steps in execution order:
/// user, then each collection, then the status line.
pub fn register_all(pipeline: &mut Pipeline, settings: &Settings) {
    pipeline.register(Arc::new(users::CreateUserStep::from_settings(settings)));

    for name in &settings.provision.collections {
        pipeline.register(Arc::new(collections::CreateCollectionStep::new(name.clone())));
    }

    pipeline.register(Arc::new(status::EmitStatusStep::new(
        settings.provision.status_message.clone(),
    )));
}

/// Build the full provisioning pipeline for `settings`.
pub fn build_pipeline(settings: &Settings) -> Pipeline {
    let mut pipeline = Pipeline::new();
    register_all(&mut pipeline, settings);
    pipeline
}
