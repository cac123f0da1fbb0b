use anyhow::Context;
use rms_kernel::{Settings, StdoutSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load provisioner settings")?;
    rms_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.provision.database,
        "rms-provision starting"
    );

    let backend = rms_db::connect(&settings.mongo)
        .await
        .with_context(|| "failed to connect to MongoDB")?;

    rms_provision::provision(&settings, &backend, &StdoutSink)
        .await
        .with_context(|| "provisioning aborted; the database may be partially initialized")?;

    Ok(())
}
