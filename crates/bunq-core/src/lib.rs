/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public bunq client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    ClientContext,
    KeyPair,
    ServerPublicKey,
    SessionData,
    SessionManager,
    SessionStore,
    create_context,
    load_context,
    read_context,
    save_context,
};

// Re-export commonly used types from http
pub use http::{
    ApiRequest,
    Backoff,
    BackoffConfig,
    BunqClient,
    BunqError,
    ClientConfig,
    Environment,
    HandshakeStep,
    PRODUCTION_URL,
    PaginationError,
    RequestSigner,
    Result,
    RetryDecision,
    SANDBOX_URL,
    VerifiedResponse,
};

// Re-export all types
pub use types::*;
