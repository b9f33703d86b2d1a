/*
[INPUT]:  Canonical request bytes, response bodies and signature headers
[OUTPUT]: Base64 request signatures and verified/unverified response verdicts
[POS]:    HTTP layer - signed envelope for every request and response
[UPDATE]: When changing signing algorithm, canonical bytes or header names
*/

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::HeaderMap;

use crate::auth::{KeyPair, ServerPublicKey};
use crate::http::{BunqError, Result};

pub const HEADER_CLIENT_SIGNATURE: &str = "x-bunq-client-signature";
pub const HEADER_SERVER_SIGNATURE: &str = "x-bunq-server-signature";

/// Signs outgoing requests with the client key
#[derive(Debug, Clone)]
pub struct RequestSigner {
    key_pair: KeyPair,
}

impl RequestSigner {
    pub fn new(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }

    /// Sign the canonical bytes of a request (its exact body bytes).
    ///
    /// Returns the base64-encoded RSA-SHA256 signature.
    pub fn sign_request(&self, body: &[u8]) -> String {
        BASE64.encode(self.key_pair.sign(body))
    }
}

/// Check the server signature header against the exact response body bytes
pub fn verify_response(
    server_key: &ServerPublicKey,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<()> {
    let signature = headers
        .get(HEADER_SERVER_SIGNATURE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| BASE64.decode(value.trim()).ok())
        .ok_or(BunqError::ResponseVerificationFailed)?;

    if server_key.verify(body, &signature) {
        Ok(())
    } else {
        Err(BunqError::ResponseVerificationFailed)
    }
}
