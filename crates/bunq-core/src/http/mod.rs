/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: Verified HTTP responses and typed API results
[POS]:    HTTP layer - signed REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod account;
pub mod backoff;
pub mod client;
pub mod error;
pub mod payment;
pub mod signature;

pub use backoff::{Backoff, BackoffConfig, RetryDecision};
pub use error::{BunqError, HandshakeStep, PaginationError, Result};
pub use signature::RequestSigner;

pub use client::{
    ApiRequest, BunqClient, ClientConfig, Environment, PRODUCTION_URL, SANDBOX_URL,
    VerifiedResponse,
};
