/*
[INPUT]:  API key, device description, permitted IPs and a signing client
[OUTPUT]: Installed identity, registered device and active session
[POS]:    Auth layer - orchestrates the installation/device/session handshake
[UPDATE]: When handshake endpoints or flow steps change
*/

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, info};

use crate::auth::session::redact;
use crate::auth::{ServerPublicKey, SessionData};
use crate::http::client::AuthMode;
use crate::http::{ApiRequest, BunqClient, BunqError, HandshakeStep, Result};
use crate::types::{
    DeviceServer, DeviceServerRequest, HandshakeElement, Installation, InstallationRequest,
    ResponseEnvelope, SessionServer, SessionServerRequest,
};

const ENDPOINT_INSTALLATION: &str = "installation";
const ENDPOINT_DEVICE_SERVER: &str = "device-server";
const ENDPOINT_SESSION_SERVER: &str = "session-server";

/// Drives the handshake and owns session renewal for one API key
#[derive(Debug, Clone)]
pub struct SessionManager {
    client: BunqClient,
    api_key: String,
    device_description: String,
    permitted_ips: Vec<String>,
    device_server_id: Arc<RwLock<Option<u64>>>,
}

impl SessionManager {
    pub fn new(
        client: BunqClient,
        api_key: impl Into<String>,
        device_description: impl Into<String>,
        permitted_ips: Vec<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            device_description: device_description.into(),
            permitted_ips,
            device_server_id: Arc::new(RwLock::new(None)),
        }
    }

    /// The signing client; clones share this manager's session
    pub fn client(&self) -> &BunqClient {
        &self.client
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn device_description(&self) -> &str {
        &self.device_description
    }

    pub fn permitted_ips(&self) -> &[String] {
        &self.permitted_ips
    }

    pub fn device_server_id(&self) -> Option<u64> {
        *self
            .device_server_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_device_server_id(&self, id: u64) {
        let mut guard = self
            .device_server_id
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(id);
    }

    /// Run whichever handshake steps are still missing
    pub async fn init(&self) -> Result<()> {
        if !self.client.is_installed() {
            self.install().await?;
        }
        if self.device_server_id().is_none() {
            self.register_device().await?;
        }
        if !self.client.sessions().has_session() {
            self.create_session().await?;
        }
        Ok(())
    }

    /// Step 1: send the client public key, record installation token and server key
    ///
    /// POST /installation (unsigned, unauthenticated)
    pub async fn install(&self) -> Result<Installation> {
        self.try_install()
            .await
            .map_err(|e| BunqError::handshake(HandshakeStep::Installation, e))
    }

    async fn try_install(&self) -> Result<Installation> {
        if self.client.is_installed() {
            return Err(BunqError::InvalidState(
                "client is already installed".to_string(),
            ));
        }

        let body = InstallationRequest {
            client_public_key: self.client.key_pair().public_key_pem()?,
        };
        let request = ApiRequest::post(ENDPOINT_INSTALLATION)
            .json(&body)?
            .with_auth(AuthMode::None)
            .unsigned();

        let envelope: ResponseEnvelope<HandshakeElement> = self.client.execute(request).await?;
        let installation = Installation::try_from(envelope.response)?;
        let server_public_key = ServerPublicKey::from_pem(&installation.server_public_key)?;

        self.client
            .set_installation(installation.token.clone(), server_public_key)?;
        info!(installation_id = installation.id, "installation completed");
        Ok(installation)
    }

    /// Step 2: bind the API key and permitted IPs to the installed identity
    ///
    /// POST /device-server (installation token)
    pub async fn register_device(&self) -> Result<DeviceServer> {
        self.try_register_device()
            .await
            .map_err(|e| BunqError::handshake(HandshakeStep::DeviceRegistration, e))
    }

    async fn try_register_device(&self) -> Result<DeviceServer> {
        self.require_installed()?;

        let body = DeviceServerRequest {
            description: self.device_description.clone(),
            secret: self.api_key.clone(),
            permitted_ips: self.permitted_ips.clone(),
        };
        let request = ApiRequest::post(ENDPOINT_DEVICE_SERVER)
            .json(&body)?
            .with_auth(AuthMode::Installation);

        let envelope: ResponseEnvelope<HandshakeElement> = self.client.execute(request).await?;
        let device = DeviceServer::try_from(envelope.response)?;

        self.set_device_server_id(device.id);
        info!(device_server_id = device.id, "device registered");
        Ok(device)
    }

    /// Step 3: open a session, or renew the current one
    ///
    /// POST /session-server (installation token)
    pub async fn create_session(&self) -> Result<SessionServer> {
        self.try_create_session()
            .await
            .map_err(|e| BunqError::handshake(HandshakeStep::SessionCreation, e))
    }

    async fn try_create_session(&self) -> Result<SessionServer> {
        self.require_installed()?;
        if self.device_server_id().is_none() && !self.client.sessions().has_session() {
            return Err(BunqError::InvalidState(
                "device must be registered before creating a session".to_string(),
            ));
        }

        let body = SessionServerRequest {
            secret: self.api_key.clone(),
        };
        let request = ApiRequest::post(ENDPOINT_SESSION_SERVER)
            .json(&body)?
            .with_auth(AuthMode::Installation);

        let envelope: ResponseEnvelope<HandshakeElement> = self.client.execute(request).await?;
        let session = SessionServer::try_from(envelope.response)?;

        self.client.sessions().set_session(SessionData {
            id: session.id,
            token: session.token.clone(),
            user_id: session.user.id(),
            user_kind: session.user.kind(),
            created_at: Utc::now(),
        });
        debug!(token = %redact(&session.token), "updated client token to session token");
        info!(
            session_id = session.id,
            user_id = session.user.id(),
            business = session.user.kind().is_business(),
            "session created"
        );
        Ok(session)
    }

    /// End the current session remotely.
    ///
    /// Local session state is left untouched; callers drop it on success.
    ///
    /// DELETE /session/{id} (session token)
    pub async fn delete_session(&self) -> Result<()> {
        let session = self
            .client
            .sessions()
            .session()
            .ok_or_else(|| BunqError::InvalidState("no active session".to_string()))?;

        let request = ApiRequest::delete(format!("session/{}", session.id));
        match self.client.send(request).await {
            Ok(_) => {
                info!(session_id = session.id, "session deleted");
                Ok(())
            }
            Err(err) => match err.status() {
                Some(status) if status >= 300 => Err(BunqError::SessionDeletion { status }),
                _ => Err(err),
            },
        }
    }

    fn require_installed(&self) -> Result<()> {
        if self.client.is_installed() {
            Ok(())
        } else {
            Err(BunqError::InvalidState(
                "installation must complete first".to_string(),
            ))
        }
    }
}
