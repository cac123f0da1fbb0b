use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rms_kernel::{ExistingPolicy, Settings, StdoutSink};

/// Provision the result_management MongoDB database.
#[derive(Debug, Parser)]
#[command(name = "rms", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the application user and collections, then print a status line
    Init(InitArgs),
    /// Print the provisioning steps without connecting
    Plan {
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the database matches the plan
    Verify(ConnectionArgs),
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// MongoDB connection string with administrative credentials
    #[arg(long)]
    uri: Option<String>,
    /// Target database name
    #[arg(long)]
    database: Option<String>,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    /// What to do when the user or a collection already exists
    #[arg(long, value_enum)]
    on_existing: Option<OnExisting>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnExisting {
    Fail,
    Skip,
}

impl From<OnExisting> for ExistingPolicy {
    fn from(value: OnExisting) -> Self {
        match value {
            OnExisting::Fail => ExistingPolicy::Fail,
            OnExisting::Skip => ExistingPolicy::Skip,
        }
    }
}

impl ConnectionArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(uri) = &self.uri {
            settings.mongo.uri = uri.clone();
        }
        if let Some(database) = &self.database {
            settings.provision.database = database.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load provisioner settings")?;
    rms_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Init(args) => {
            args.connection.apply(&mut settings);
            if let Some(policy) = args.on_existing {
                settings.provision.on_existing = policy.into();
            }
            init(&settings).await
        }
        Command::Plan { json } => plan(&settings, json),
        Command::Verify(args) => {
            args.apply(&mut settings);
            verify(&settings).await
        }
    }
}

async fn init(settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        database = %settings.provision.database,
        "provisioning starting"
    );

    let backend = rms_db::connect(&settings.mongo)
        .await
        .with_context(|| "failed to connect to MongoDB")?;

    rms_provision::provision(settings, &backend, &StdoutSink)
        .await
        .with_context(|| "provisioning aborted; the database may be partially initialized")?;

    Ok(())
}

fn plan(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let summaries = rms_provision::build_pipeline(settings).summaries();

    if json {
        let rendered = serde_json::to_string_pretty(&serde_json::json!({
            "database": settings.provision.database,
            "on_existing": settings.provision.on_existing,
            "steps": summaries,
        }))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("database: {}", settings.provision.database);
    for (index, summary) in summaries.iter().enumerate() {
        println!("{:>2}. {} {}", index + 1, summary.step, summary.target);
    }
    Ok(())
}

async fn verify(settings: &Settings) -> anyhow::Result<()> {
    let backend = rms_db::connect(&settings.mongo)
        .await
        .with_context(|| "failed to connect to MongoDB")?;

    let findings = rms_provision::verify(settings, &backend).await?;
    if findings.is_empty() {
        println!("database '{}' matches the plan", settings.provision.database);
        return Ok(());
    }

    for finding in &findings {
        println!("- {}", finding);
    }
    Err(anyhow!(
        "database '{}' has {} problem(s)",
        settings.provision.database,
        findings.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn init_flags_override_settings() {
        let cli = Cli::parse_from([
            "rms",
            "init",
            "--uri",
            "mongodb://admin:pw@db:27017",
            "--database",
            "school",
            "--on-existing",
            "skip",
        ]);
        let Command::Init(args) = cli.command else {
            panic!("expected init");
        };

        let mut settings = Settings::default();
        args.connection.apply(&mut settings);
        settings.provision.on_existing = args.on_existing.unwrap().into();

        assert_eq!(settings.mongo.uri, "mongodb://admin:pw@db:27017");
        assert_eq!(settings.provision.database, "school");
        assert_eq!(settings.provision.on_existing, ExistingPolicy::Skip);
    }
}
