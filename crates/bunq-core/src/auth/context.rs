/*
[INPUT]:  A live session manager, or a context file on disk
[OUTPUT]: Serializable client snapshots and managers restored from them
[POS]:    Auth layer - persistence of identity, installation and session
[UPDATE]: When the persisted field set or file format changes
*/

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use tracing::info;

use crate::auth::{KeyPair, ServerPublicKey, SessionData, SessionManager};
use crate::http::{BunqClient, BunqError, ClientConfig, Result};
use crate::types::UserKind;

/// Everything needed to resume a client without repeating the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    pub api_url: String,
    pub private_key: String,
    pub installation_token: String,
    pub server_public_key: String,
    pub device_description: String,
    pub api_key: String,
    #[serde(default)]
    pub permitted_ips: Vec<String>,
    #[serde(default)]
    pub device_server_id: Option<u64>,
    #[serde(default)]
    pub session_id: Option<u64>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub session_user_id: Option<u64>,
    #[serde(default)]
    pub session_user_kind: Option<UserKind>,
    #[serde(default)]
    pub session_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub business_user: bool,
}

impl ClientContext {
    fn session(&self) -> Option<SessionData> {
        let (id, token, user_id) = match (&self.session_id, &self.session_token, &self.session_user_id)
        {
            (Some(id), Some(token), Some(user_id)) => (*id, token.clone(), *user_id),
            _ => return None,
        };
        let user_kind = self.session_user_kind.unwrap_or(if self.business_user {
            UserKind::Company
        } else {
            UserKind::Person
        });
        Some(SessionData {
            id,
            token,
            user_id,
            user_kind,
            created_at: self.session_created_at.unwrap_or_else(Utc::now),
        })
    }

    /// Forget the session, keeping the installed identity
    pub fn clear_session(&mut self) {
        self.session_id = None;
        self.session_token = None;
        self.session_user_id = None;
        self.session_user_kind = None;
        self.session_created_at = None;
        self.business_user = false;
    }
}

impl SessionManager {
    /// Snapshot the identity, installation and session state.
    ///
    /// Fails before installation: a context without installation token and
    /// server key cannot be resumed.
    pub fn export_context(&self) -> Result<ClientContext> {
        let client = self.client();
        let installation_token = client
            .installation_token()
            .ok_or_else(|| BunqError::InvalidState("client is not installed".to_string()))?;
        let server_public_key = client
            .server_public_key()
            .ok_or_else(|| BunqError::InvalidState("client is not installed".to_string()))?;
        let session = client.sessions().session();

        Ok(ClientContext {
            api_url: client.base_url().to_string(),
            private_key: client.key_pair().private_key_pem()?,
            installation_token: installation_token.to_string(),
            server_public_key: server_public_key.pem().to_string(),
            device_description: self.device_description().to_string(),
            api_key: self.api_key().to_string(),
            permitted_ips: self.permitted_ips().to_vec(),
            device_server_id: self.device_server_id(),
            session_id: session.as_ref().map(|s| s.id),
            session_token: session.as_ref().map(|s| s.token.clone()),
            session_user_id: session.as_ref().map(|s| s.user_id),
            session_user_kind: session.as_ref().map(|s| s.user_kind),
            session_created_at: session.as_ref().map(|s| s.created_at),
            business_user: session.as_ref().is_some_and(SessionData::is_business),
        })
    }

    /// Rebuild a manager from a snapshot without contacting the server
    pub fn from_context(context: &ClientContext, config: ClientConfig) -> Result<Self> {
        let key_pair = KeyPair::from_pkcs8_pem(&context.private_key)?;
        let server_public_key = ServerPublicKey::from_pem(&context.server_public_key)?;

        let client = BunqClient::with_config(config, &context.api_url, key_pair)?;
        client.set_installation(context.installation_token.clone(), server_public_key)?;
        if let Some(session) = context.session() {
            client.sessions().set_session(session);
        }

        let manager = SessionManager::new(
            client,
            context.api_key.clone(),
            context.device_description.clone(),
            context.permitted_ips.clone(),
        );
        if let Some(id) = context.device_server_id {
            manager.set_device_server_id(id);
        }
        Ok(manager)
    }
}

/// Generate a fresh identity and run the full handshake
pub async fn create_context(
    api_url: &str,
    api_key: &str,
    device_description: &str,
    permitted_ips: Vec<String>,
    config: ClientConfig,
) -> Result<SessionManager> {
    let key_pair = KeyPair::generate()?;
    let client = BunqClient::with_config(config, api_url, key_pair)?;
    let manager = SessionManager::new(client, api_key, device_description, permitted_ips);
    manager.init().await?;
    Ok(manager)
}

/// Write the context as indented JSON readable only by the owner
pub fn save_context(context: &ClientContext, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut encoded = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut encoded, PrettyFormatter::with_indent(b"    "));
    context.serialize(&mut serializer)?;

    // Mode only applies on creation; tighten an existing file before writing the key
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    let mut perms = file.metadata()?.permissions();
    if perms.mode() & 0o777 != 0o600 {
        perms.set_mode(0o600);
        file.set_permissions(perms)?;
    }
    file.write_all(&encoded)?;
    file.sync_all()?;

    info!(path = %path.display(), "context saved");
    Ok(())
}

/// Read a context file without resuming it
pub fn read_context(path: impl AsRef<Path>) -> Result<ClientContext> {
    let content = fs::read(path.as_ref())?;
    Ok(serde_json::from_slice(&content)?)
}

/// Resume a saved context, running any handshake steps it still lacks
pub async fn load_context(path: impl AsRef<Path>, config: ClientConfig) -> Result<SessionManager> {
    let context = read_context(path)?;
    let manager = SessionManager::from_context(&context, config)?;
    manager.init().await?;
    Ok(manager)
}
