use async_trait::async_trait;
use rms_kernel::settings::{Environment, DEFAULT_APP_PASSWORD};
use rms_kernel::{NewUser, ProvisionError, Settings, Step, StepCtx, StepOutcome};

/// Creates the application account with its role grants.
pub struct CreateUserStep {
    user: NewUser,
}

impl CreateUserStep {
    pub fn new(user: NewUser) -> Self {
        Self { user }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let provision = &settings.provision;
        Self::new(NewUser {
            username: provision.user.username.clone(),
            secret: provision.user.password.clone(),
            roles: provision.grants(),
        })
    }
}

#[async_trait]
impl Step for CreateUserStep {
    fn name(&self) -> &'static str {
        "create_user"
    }

    fn target(&self) -> String {
        let roles: Vec<String> = self
            .user
            .roles
            .iter()
            .map(|grant| format!("{}@{}", grant.role, grant.db))
            .collect();
        format!("{} [{}]", self.user.username, roles.join(", "))
    }

    async fn apply(&self, ctx: &StepCtx<'_>) -> Result<StepOutcome, ProvisionError> {
        if ctx.settings.environment == Environment::Production
            && self.user.secret.expose() == DEFAULT_APP_PASSWORD
        {
            tracing::warn!(
                user = %self.user.username,
                "creating user with the built-in default password; set RMS_PROVISION__USER__PASSWORD"
            );
        }

        let result = ctx.backend.create_user(ctx.database(), &self.user).await;
        ctx.policy().resolve(result)
    }
}
