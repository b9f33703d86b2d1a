/*
[INPUT]:  HTTP configuration, client key pair, installation and session state
[OUTPUT]: Signed, retried and signature-verified API responses
[POS]:    HTTP layer - core client implementation (signed request pipeline)
[UPDATE]: When adding connection options or changing the request envelope
*/

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::session::redact;
use crate::auth::{KeyPair, ServerPublicKey, SessionStore};
use crate::http::backoff::{Backoff, BackoffConfig, RetryDecision};
use crate::http::signature::{HEADER_CLIENT_SIGNATURE, RequestSigner, verify_response};
use crate::http::{BunqError, Result};
use crate::types::{ErrorEnvelope, QueryMap, QueryParam, apply_all};

/// Base URLs for the bunq API
pub const PRODUCTION_URL: &str = "https://api.bunq.com/v1/";
pub const SANDBOX_URL: &str = "https://public-api.sandbox.bunq.com/v1/";

const HEADER_LANGUAGE: &str = "x-bunq-language";
const HEADER_REGION: &str = "x-bunq-region";
const HEADER_GEOLOCATION: &str = "x-bunq-geolocation";
const HEADER_REQUEST_ID: &str = "x-bunq-client-request-id";
const HEADER_AUTHENTICATION: &str = "x-bunq-client-authentication";

/// Which deployment to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    #[default]
    Sandbox,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_URL,
            Environment::Sandbox => SANDBOX_URL,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub language: String,
    pub region: String,
    pub geolocation: String,
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("bunq-core/{}", env!("CARGO_PKG_VERSION")),
            language: "en_US".to_string(),
            region: "nl_NL".to_string(),
            geolocation: "0 0 0 0 000".to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Token the request authenticates with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthMode {
    None,
    Installation,
    Session,
}

/// One logical API call: path, body bytes and query transformers
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Vec<u8>,
    params: Vec<QueryParam>,
    auth: AuthMode,
    signed: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Vec::new(),
            params: Vec::new(),
            auth: AuthMode::Session,
            signed: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON request body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = serde_json::to_vec(body)?;
        Ok(self)
    }

    pub fn param(mut self, param: QueryParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = QueryParam>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// No signature on the request and no verification of the response.
    /// Only valid before a server public key exists.
    pub(crate) fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }
}

/// A 2xx response whose body passed signature verification
#[derive(Debug, Clone)]
pub struct VerifiedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl VerifiedResponse {
    /// Decode the verified body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(BunqError::Decode)
    }
}

#[derive(Debug)]
pub(crate) struct InstallationState {
    pub(crate) token: String,
    pub(crate) server_public_key: ServerPublicKey,
}

/// Main HTTP client for the bunq API. Cheap to clone; clones share
/// installation and session state.
#[derive(Debug, Clone)]
pub struct BunqClient {
    http_client: Client,
    base_url: Url,
    config: ClientConfig,
    key_pair: KeyPair,
    signer: RequestSigner,
    installation: Arc<OnceLock<InstallationState>>,
    sessions: SessionStore,
}

impl BunqClient {
    /// Create a new client with default configuration
    pub fn new(base_url: &str, key_pair: KeyPair) -> Result<Self> {
        Self::with_config(ClientConfig::default(), base_url, key_pair)
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig, base_url: &str, key_pair: KeyPair) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http_client,
            base_url,
            config,
            signer: RequestSigner::new(key_pair.clone()),
            key_pair,
            installation: Arc::new(OnceLock::new()),
            sessions: SessionStore::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn is_installed(&self) -> bool {
        self.installation.get().is_some()
    }

    pub fn installation_token(&self) -> Option<&str> {
        self.installation.get().map(|state| state.token.as_str())
    }

    pub fn server_public_key(&self) -> Option<&ServerPublicKey> {
        self.installation.get().map(|state| &state.server_public_key)
    }

    /// User id of the active session, used to build per-user paths
    pub fn current_user_id(&self) -> Result<u64> {
        self.sessions
            .user_id()
            .ok_or_else(|| BunqError::InvalidState("no active session".to_string()))
    }

    /// Whether the active session belongs to a company user
    pub fn is_business(&self) -> bool {
        self.sessions.is_business()
    }

    /// Record the installation token and server key. Write-once.
    pub(crate) fn set_installation(
        &self,
        token: String,
        server_public_key: ServerPublicKey,
    ) -> Result<()> {
        self.installation
            .set(InstallationState {
                token,
                server_public_key,
            })
            .map_err(|_| BunqError::InvalidState("client is already installed".to_string()))
    }

    /// Perform a request and decode its verified payload
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Like [`BunqClient::execute`], aborting when `cancel` fires
    pub async fn execute_with_cancel<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.send_with_cancel(request, cancel).await?.json()
    }

    /// Perform a request and return the verified raw response
    pub async fn send(&self, request: ApiRequest) -> Result<VerifiedResponse> {
        self.send_inner(request, None).await
    }

    pub async fn send_with_cancel(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<VerifiedResponse> {
        self.send_inner(request, Some(cancel)).await
    }

    async fn send_inner(
        &self,
        request: ApiRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<VerifiedResponse> {
        let url = self.request_url(&request)?;
        let headers = self.request_headers(&request)?;
        let mut backoff = self.config.backoff.build();

        loop {
            debug!(method = %request.method, path = %request.path, "sending request");
            let send = self
                .http_client
                .request(request.method.clone(), url.clone())
                .headers(headers.clone())
                .body(request.body.clone())
                .send();
            let response = match cancellable(cancel, send).await? {
                Ok(response) => response,
                Err(err) if err.is_timeout() => {
                    wait_before_retry(&mut backoff, cancel, &request.path, err.into()).await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let status = response.status();
            let response_headers = response.headers().clone();
            let body = match cancellable(cancel, response.bytes()).await? {
                Ok(body) => body.to_vec(),
                Err(err) if err.is_timeout() => {
                    wait_before_retry(&mut backoff, cancel, &request.path, err.into()).await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if status.is_success() {
                if request.signed {
                    let server_key = self.server_public_key().ok_or_else(|| {
                        BunqError::InvalidState("server public key unknown".to_string())
                    })?;
                    if let Err(err) = verify_response(server_key, &response_headers, &body) {
                        warn!(
                            method = %request.method,
                            path = %request.path,
                            "response signature verification failed, discarding payload"
                        );
                        return Err(err);
                    }
                }
                return Ok(VerifiedResponse {
                    status,
                    headers: response_headers,
                    body,
                });
            }

            let Some(failure) = transient_failure(status) else {
                return Err(api_error(status, &body));
            };
            wait_before_retry(&mut backoff, cancel, &request.path, failure).await?;
        }
    }

    fn request_url(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.base_url.join(request.path.trim_start_matches('/'))?;

        let mut query: QueryMap = url.query_pairs().into_owned().collect();
        apply_all(&request.params, &mut query)?;

        if query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(query.iter());
        }
        Ok(url)
    }

    fn request_headers(&self, request: &ApiRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, config_header(&self.config.user_agent)?);
        headers.insert(HEADER_LANGUAGE, config_header(&self.config.language)?);
        headers.insert(HEADER_REGION, config_header(&self.config.region)?);
        headers.insert(HEADER_GEOLOCATION, config_header(&self.config.geolocation)?);
        headers.insert(
            HEADER_REQUEST_ID,
            config_header(&Uuid::new_v4().to_string())?,
        );

        if let Some(token) = self.auth_token(request.auth)? {
            debug!(token = %redact(&token), "attaching auth token");
            let value = HeaderValue::from_str(&token)
                .map_err(|_| BunqError::InvalidState("token is not a valid header".to_string()))?;
            headers.insert(HEADER_AUTHENTICATION, value);
        }

        if request.signed {
            let signature = self.signer.sign_request(&request.body);
            headers.insert(HEADER_CLIENT_SIGNATURE, config_header(&signature)?);
        }

        Ok(headers)
    }

    fn auth_token(&self, auth: AuthMode) -> Result<Option<String>> {
        match auth {
            AuthMode::None => Ok(None),
            AuthMode::Installation => self
                .installation_token()
                .map(|token| Some(token.to_string()))
                .ok_or_else(|| BunqError::InvalidState("client is not installed".to_string())),
            AuthMode::Session => self
                .sessions
                .token()
                .map(Some)
                .ok_or_else(|| BunqError::InvalidState("no active session".to_string())),
        }
    }
}

fn config_header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| BunqError::Config(format!("invalid header value: {value:?}")))
}

/// Rate limiting and server-side failures are retried; the error is what
/// surfaces once the backoff gives up.
fn transient_failure(status: StatusCode) -> Option<BunqError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(BunqError::RateLimitExceeded)
    } else if status.is_server_error() {
        Some(BunqError::InternalServerError {
            status: status.as_u16(),
        })
    } else {
        None
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> BunqError {
    let message = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.message())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    BunqError::api_error(status, message)
}

/// Sleep out the next backoff interval, or hand back `failure` once the
/// retry budget is spent.
async fn wait_before_retry(
    backoff: &mut Backoff,
    cancel: Option<&CancellationToken>,
    path: &str,
    failure: BunqError,
) -> Result<()> {
    match backoff.next_interval() {
        RetryDecision::Wait(interval) => {
            warn!(
                error = %failure,
                attempt = backoff.attempt(),
                wait_ms = interval.as_millis() as u64,
                path,
                "transient failure, retrying"
            );
            cancellable(cancel, tokio::time::sleep(interval)).await
        }
        RetryDecision::Stop => {
            warn!(error = %failure, path, "retry budget exhausted");
            Err(failure)
        }
    }
}

async fn cancellable<F: Future>(cancel: Option<&CancellationToken>, fut: F) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(BunqError::Cancelled),
            output = fut => Ok(output),
        },
        None => Ok(fut.await),
    }
}
