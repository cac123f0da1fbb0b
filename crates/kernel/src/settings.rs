use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::backend::RoleGrant;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "RMS_ENV";
const CONFIG_DIR_ENV: &str = "RMS_CONFIG_DIR";
const ENV_PREFIX: &str = "RMS";
const PASSWORD_ENV: &str = "RMS_PROVISION__USER__PASSWORD";

/// Built-in application password, matching the stock container setup.
pub const DEFAULT_APP_PASSWORD: &str = "app_secure_password";

/// Deployment environment the provisioner is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub mongo: MongoSettings,
    #[serde(default)]
    pub provision: ProvisionSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to the `config` directory next to the working directory.
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit config directory and environment name.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let vars = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Self::load_layers(config_dir, environment, vars)
    }

    fn load_layers(
        config_dir: &Path,
        environment: &str,
        vars: config::Map<String, String>,
    ) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        // Scalar parsing would turn a password such as "007" into 7.
        let password = vars.get(PASSWORD_ENV).cloned();

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("provision.collections")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .set_override_option("provision.user.password", password)
            .with_context(|| "failed to apply password override")?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    #[serde(default = "MongoSettings::default_uri")]
    pub uri: String,
    #[serde(default = "MongoSettings::default_app_name")]
    pub app_name: String,
    #[serde(default = "MongoSettings::default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "MongoSettings::default_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

impl MongoSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_app_name() -> String {
        "rms-provision".to_string()
    }

    fn default_timeout_ms() -> u64 {
        10_000
    }
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            app_name: Self::default_app_name(),
            connect_timeout_ms: Self::default_timeout_ms(),
            server_selection_timeout_ms: Self::default_timeout_ms(),
        }
    }
}

/// What to do when the user or a collection is already present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    /// Abort the run on the first duplicate.
    #[default]
    Fail,
    /// Log the duplicate and continue with the next step.
    Skip,
}

/// Plaintext credential that never shows up in `Debug` output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(\"***\")")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleSettings {
    pub role: String,
    /// Database the role is scoped to; the target database when omitted.
    #[serde(default)]
    pub db: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSettings {
    #[serde(default = "UserSettings::default_username")]
    pub username: String,
    #[serde(default = "UserSettings::default_password")]
    pub password: Secret,
    #[serde(default = "UserSettings::default_roles")]
    pub roles: Vec<RoleSettings>,
}

impl UserSettings {
    fn default_username() -> String {
        "app_user".to_string()
    }

    fn default_password() -> Secret {
        Secret::new(DEFAULT_APP_PASSWORD)
    }

    fn default_roles() -> Vec<RoleSettings> {
        vec![RoleSettings {
            role: "readWrite".to_string(),
            db: None,
        }]
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            username: Self::default_username(),
            password: Self::default_password(),
            roles: Self::default_roles(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionSettings {
    #[serde(default = "ProvisionSettings::default_database")]
    pub database: String,
    #[serde(default)]
    pub user: UserSettings,
    #[serde(default = "ProvisionSettings::default_collections")]
    pub collections: Vec<String>,
    #[serde(default)]
    pub on_existing: ExistingPolicy,
    #[serde(default = "ProvisionSettings::default_status_message")]
    pub status_message: String,
}

impl ProvisionSettings {
    fn default_database() -> String {
        "result_management".to_string()
    }

    fn default_collections() -> Vec<String> {
        vec![
            "students".to_string(),
            "results".to_string(),
            "subjects".to_string(),
        ]
    }

    fn default_status_message() -> String {
        "Database initialized successfully".to_string()
    }

    /// Role grants for the application user, scoped to the target database
    /// unless a role names its own.
    pub fn grants(&self) -> Vec<RoleGrant> {
        self.user
            .roles
            .iter()
            .map(|role| RoleGrant {
                role: role.role.clone(),
                db: role.db.clone().unwrap_or_else(|| self.database.clone()),
            })
            .collect()
    }
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            database: Self::default_database(),
            user: UserSettings::default(),
            collections: Self::default_collections(),
            on_existing: ExistingPolicy::default(),
            status_message: Self::default_status_message(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "TelemetrySettings::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetrySettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_plan_targets_result_management() {
        let settings = Settings::default();
        assert_eq!(settings.provision.database, "result_management");
        assert_eq!(settings.provision.user.username, "app_user");
        assert_eq!(
            settings.provision.collections,
            vec!["students", "results", "subjects"]
        );
        assert_eq!(settings.provision.on_existing, ExistingPolicy::Fail);
    }

    #[test]
    fn default_grant_is_read_write_on_target() {
        let grants = ProvisionSettings::default().grants();
        assert_eq!(
            grants,
            vec![RoleGrant {
                role: "readWrite".to_string(),
                db: "result_management".to_string(),
            }]
        );
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let settings = Settings::default();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains(DEFAULT_APP_PASSWORD));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn files_are_layered_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            r#"
                [provision]
                database = "school"
                collections = ["students"]

                [provision.user]
                username = "svc"
                password = "hunter2"
            "#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("staging.toml"),
            r#"
                [provision]
                on_existing = "skip"
            "#,
        )
        .unwrap();

        let settings = Settings::load_from(dir.path(), "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.provision.database, "school");
        assert_eq!(settings.provision.collections, vec!["students"]);
        assert_eq!(settings.provision.user.username, "svc");
        assert_eq!(settings.provision.user.password.expose(), "hunter2");
        assert_eq!(settings.provision.on_existing, ExistingPolicy::Skip);
        assert_eq!(settings.provision.grants()[0].db, "school");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(dir.path(), "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    fn env(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn env_password_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        for raw in ["007", "1e5", "TRUE"] {
            let vars = env(&[(PASSWORD_ENV, raw)]);
            let settings = Settings::load_layers(dir.path(), "local", vars).unwrap();
            assert_eq!(settings.provision.user.password.expose(), raw);
        }
    }

    #[test]
    fn env_password_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            r#"
                [provision.user]
                password = "from-file"
            "#,
        )
        .unwrap();

        let vars = env(&[(PASSWORD_ENV, "from-env")]);
        let settings = Settings::load_layers(dir.path(), "local", vars).unwrap();
        assert_eq!(settings.provision.user.password.expose(), "from-env");

        let settings = Settings::load_layers(dir.path(), "local", env(&[])).unwrap();
        assert_eq!(settings.provision.user.password.expose(), "from-file");
    }

    #[test]
    fn env_collections_are_split_into_a_list() {
        let dir = tempfile::tempdir().unwrap();
        let vars = env(&[
            ("RMS_PROVISION__COLLECTIONS", "a,b"),
            ("RMS_MONGO__SERVER_SELECTION_TIMEOUT_MS", "300"),
        ]);

        let settings = Settings::load_layers(dir.path(), "local", vars).unwrap();
        assert_eq!(settings.provision.collections, vec!["a", "b"]);
        assert_eq!(settings.mongo.server_selection_timeout_ms, 300);
    }
}
