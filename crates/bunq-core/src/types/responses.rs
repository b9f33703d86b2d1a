/*
[INPUT]:  Verified response bodies from handshake and list endpoints
[OUTPUT]: Tagged response elements, extracted handshake results, pages
[POS]:    Data layer - response type definitions
[UPDATE]: When API schema changes or new element kinds appear
*/

use serde::{Deserialize, Serialize};

use super::models::{
    BunqId, MonetaryAccountBank, Payment, ServerPublicKeyElement, Token, UserApiKey, UserCompany,
    UserKind, UserPerson,
};
use super::pagination::Pagination;
use crate::http::{BunqError, Result};

/// `{"Response": [...], "Pagination": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    #[serde(rename = "Response")]
    pub response: Vec<T>,
    #[serde(rename = "Pagination", default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// `{"Error": [{"error_description": ...}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "Error", default)]
    pub error: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub error_description: String,
    #[serde(default)]
    pub error_description_translated: Option<String>,
}

impl ErrorEnvelope {
    pub fn message(&self) -> Option<String> {
        if self.error.is_empty() {
            return None;
        }
        let descriptions: Vec<&str> = self
            .error
            .iter()
            .map(|detail| detail.error_description.as_str())
            .collect();
        Some(descriptions.join("; "))
    }
}

/// One element of a handshake response, keyed by its tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeElement {
    Id(BunqId),
    Token(Token),
    ServerPublicKey(ServerPublicKeyElement),
    UserPerson(UserPerson),
    UserCompany(UserCompany),
    UserApiKey(UserApiKey),
}

fn find_id(elements: &[HandshakeElement]) -> Result<u64> {
    elements
        .iter()
        .find_map(|element| match element {
            HandshakeElement::Id(id) => Some(id.id),
            _ => None,
        })
        .ok_or(BunqError::MissingElement("Id"))
}

fn find_token(elements: &[HandshakeElement]) -> Result<String> {
    elements
        .iter()
        .find_map(|element| match element {
            HandshakeElement::Token(token) => Some(token.token.clone()),
            _ => None,
        })
        .ok_or(BunqError::MissingElement("Token"))
}

/// Result of the installation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub id: u64,
    pub token: String,
    pub server_public_key: String,
}

impl TryFrom<Vec<HandshakeElement>> for Installation {
    type Error = BunqError;

    fn try_from(elements: Vec<HandshakeElement>) -> Result<Self> {
        let server_public_key = elements
            .iter()
            .find_map(|element| match element {
                HandshakeElement::ServerPublicKey(key) => Some(key.server_public_key.clone()),
                _ => None,
            })
            .ok_or(BunqError::MissingElement("ServerPublicKey"))?;

        Ok(Self {
            id: find_id(&elements)?,
            token: find_token(&elements)?,
            server_public_key,
        })
    }
}

/// Result of the device registration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceServer {
    pub id: u64,
}

impl TryFrom<Vec<HandshakeElement>> for DeviceServer {
    type Error = BunqError;

    fn try_from(elements: Vec<HandshakeElement>) -> Result<Self> {
        Ok(Self {
            id: find_id(&elements)?,
        })
    }
}

/// User object returned with a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUser {
    Person(UserPerson),
    Company(UserCompany),
    ApiKey(UserApiKey),
}

impl SessionUser {
    pub fn id(&self) -> u64 {
        match self {
            SessionUser::Person(user) => user.id,
            SessionUser::Company(user) => user.id,
            SessionUser::ApiKey(user) => user.id,
        }
    }

    pub fn kind(&self) -> UserKind {
        match self {
            SessionUser::Person(_) => UserKind::Person,
            SessionUser::Company(_) => UserKind::Company,
            SessionUser::ApiKey(_) => UserKind::ApiKey,
        }
    }
}

/// Result of the session creation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionServer {
    pub id: u64,
    pub token: String,
    pub user: SessionUser,
}

impl TryFrom<Vec<HandshakeElement>> for SessionServer {
    type Error = BunqError;

    fn try_from(elements: Vec<HandshakeElement>) -> Result<Self> {
        let id = find_id(&elements)?;
        let token = find_token(&elements)?;
        let user = elements
            .into_iter()
            .find_map(|element| match element {
                HandshakeElement::UserPerson(user) => Some(SessionUser::Person(user)),
                HandshakeElement::UserCompany(user) => Some(SessionUser::Company(user)),
                HandshakeElement::UserApiKey(user) => Some(SessionUser::ApiKey(user)),
                _ => None,
            })
            .ok_or(BunqError::MissingElement("User"))?;

        Ok(Self { id, token, user })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryAccountBankElement {
    #[serde(rename = "MonetaryAccountBank")]
    pub monetary_account_bank: MonetaryAccountBank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentElement {
    #[serde(rename = "Payment")]
    pub payment: Payment,
}

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub(crate) fn from_envelope<E>(envelope: ResponseEnvelope<E>, unwrap: impl Fn(E) -> T) -> Self {
        Self {
            items: envelope.response.into_iter().map(unwrap).collect(),
            pagination: envelope.pagination.unwrap_or_default(),
        }
    }
}
