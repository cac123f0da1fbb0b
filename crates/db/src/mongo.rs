use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::Client;

use rms_kernel::settings::MongoSettings;
use rms_kernel::{AdminBackend, EntityKind, NewUser, ProvisionError, RoleGrant};

/// `createUser` on an existing account (4.4+ and the older duplicate-key form).
const USER_EXISTS_CODES: &[i32] = &[51003, 11000];
/// `create` on an existing namespace.
const NAMESPACE_EXISTS_CODE: i32 = 48;

/// Admin backend over a live MongoDB deployment.
#[derive(Clone)]
pub struct MongoBackend {
    client: Client,
}

/// Build a client from settings and make sure the server answers.
///
/// The connection string must carry credentials allowed to create users.
pub async fn connect(settings: &MongoSettings) -> anyhow::Result<MongoBackend> {
    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .with_context(|| "failed to parse MongoDB connection string")?;
    options.app_name = Some(settings.app_name.clone());
    options.connect_timeout = Some(Duration::from_millis(settings.connect_timeout_ms));
    options.server_selection_timeout =
        Some(Duration::from_millis(settings.server_selection_timeout_ms));

    let client = Client::with_options(options).with_context(|| "failed to build MongoDB client")?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .with_context(|| "failed to ping MongoDB")?;

    tracing::info!(target: "rms-db", app_name = %settings.app_name, "connected to MongoDB");
    Ok(MongoBackend { client })
}

#[async_trait]
impl AdminBackend for MongoBackend {
    async fn create_user(&self, database: &str, user: &NewUser) -> Result<(), ProvisionError> {
        let command = create_user_command(user);

        self.client
            .database(database)
            .run_command(command)
            .await
            .map_err(|err| classify(err, EntityKind::User, &user.username))?;

        tracing::info!(target: "rms-db", database, user = %user.username, "user created");
        Ok(())
    }

    async fn create_collection(&self, database: &str, name: &str) -> Result<(), ProvisionError> {
        self.client
            .database(database)
            .create_collection(name)
            .await
            .map_err(|err| classify(err, EntityKind::Collection, name))?;

        tracing::info!(target: "rms-db", database, collection = name, "collection created");
        Ok(())
    }

    async fn user_grants(
        &self,
        database: &str,
        username: &str,
    ) -> Result<Option<Vec<RoleGrant>>, ProvisionError> {
        let reply = self
            .client
            .database(database)
            .run_command(doc! { "usersInfo": { "user": username, "db": database } })
            .await
            .with_context(|| format!("usersInfo failed for '{}'", username))?;

        Ok(parse_users_info(&reply)?)
    }

    async fn collection_names(&self, database: &str) -> Result<Vec<String>, ProvisionError> {
        let names = self
            .client
            .database(database)
            .list_collection_names()
            .await
            .with_context(|| format!("failed to list collections of '{}'", database))?;
        Ok(names)
    }

    async fn count_documents(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<u64, ProvisionError> {
        let count = self
            .client
            .database(database)
            .collection::<Document>(collection)
            .count_documents(doc! {})
            .await
            .with_context(|| format!("failed to count documents in '{}'", collection))?;
        Ok(count)
    }
}

fn create_user_command(user: &NewUser) -> Document {
    let roles: Vec<Document> = user
        .roles
        .iter()
        .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.db.as_str() })
        .collect();

    doc! {
        "createUser": user.username.as_str(),
        "pwd": user.secret.expose(),
        "roles": roles,
    }
}

fn parse_users_info(reply: &Document) -> anyhow::Result<Option<Vec<RoleGrant>>> {
    let users = reply
        .get_array("users")
        .with_context(|| "usersInfo reply has no 'users' array")?;

    let Some(user) = users.first().and_then(Bson::as_document) else {
        return Ok(None);
    };

    let mut grants = Vec::new();
    for role in user
        .get_array("roles")
        .with_context(|| "usersInfo entry has no 'roles' array")?
    {
        let Some(role) = role.as_document() else {
            continue;
        };
        grants.push(RoleGrant {
            role: role.get_str("role")?.to_string(),
            db: role.get_str("db")?.to_string(),
        });
    }

    Ok(Some(grants))
}

fn is_duplicate(kind: EntityKind, code: i32) -> bool {
    match kind {
        EntityKind::User => USER_EXISTS_CODES.contains(&code),
        EntityKind::Collection => code == NAMESPACE_EXISTS_CODE,
    }
}

fn classify(err: mongodb::error::Error, kind: EntityKind, name: &str) -> ProvisionError {
    if let ErrorKind::Command(command) = err.kind.as_ref() {
        if is_duplicate(kind, command.code) {
            return ProvisionError::already_exists(kind, name);
        }
    }
    let context = format!("failed to create {} '{}'", kind, name);
    ProvisionError::Backend(anyhow::Error::new(err).context(context))
}
