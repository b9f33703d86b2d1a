/*
[INPUT]:  Handshake parameters (public key, API key, device description, IPs)
[OUTPUT]: Serializable request bodies for the handshake endpoints
[POS]:    Data layer - request type definitions
[UPDATE]: When handshake request fields change
*/

use serde::{Deserialize, Serialize};

/// Accept requests from any address
pub const WILDCARD_IP: &str = "*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRequest {
    pub client_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceServerRequest {
    pub description: String,
    pub secret: String,
    /// Empty means the address the request originates from
    pub permitted_ips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionServerRequest {
    pub secret: String,
}
