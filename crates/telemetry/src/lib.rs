//! Logging and tracing bootstrap.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use rms_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global tracing subscriber.
///
/// Logs go to stderr so stdout only carries the provisioning status line.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .map_err(|err| anyhow!("invalid log level '{}': {}", settings.log_level, err))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {}", err))?;

    tracing::debug!(
        target: "rms-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

