/*
[INPUT]:  Random source or a stored PKCS#8 PEM private key
[OUTPUT]: RSA signing identity and its SPKI PEM public key
[POS]:    Auth layer - client identity used for installation and request signing
[UPDATE]: When changing key size or key encoding
*/

use std::fmt;
use std::sync::Arc;

use rand::rngs::OsRng;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::http::{BunqError, Result};

const KEY_BITS: usize = 2048;

/// Client RSA key pair. Cheap to clone; the private key never leaves the process.
#[derive(Clone)]
pub struct KeyPair {
    inner: Arc<KeyPairInner>,
}

struct KeyPairInner {
    signing_key: SigningKey<Sha256>,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyPair {
    /// Generate a new 2048-bit key pair
    pub fn generate() -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS).map_err(BunqError::crypto)?;
        Ok(Self::from_private_key(private_key))
    }

    /// Load a key pair from a PKCS#8 PEM private key
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(BunqError::crypto)?;
        Ok(Self::from_private_key(private_key))
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = private_key.to_public_key();
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        Self {
            inner: Arc::new(KeyPairInner {
                signing_key,
                private_key,
                public_key,
            }),
        }
    }

    /// Private key as PKCS#8 PEM, for the persisted context only
    pub fn private_key_pem(&self) -> Result<String> {
        let pem = self
            .inner
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(BunqError::crypto)?;
        Ok(pem.as_str().to_owned())
    }

    /// Public key as SPKI PEM, as sent during installation
    pub fn public_key_pem(&self) -> Result<String> {
        self.inner
            .public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(BunqError::crypto)
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.inner.public_key
    }

    /// RSA-SHA256 PKCS#1 v1.5 signature over `message`
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.inner.signing_key.sign(message).to_vec()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.inner.public_key)
            .finish_non_exhaustive()
    }
}

/// Server public key recorded during installation
#[derive(Clone, Debug)]
pub struct ServerPublicKey {
    pem: String,
    verifying_key: VerifyingKey<Sha256>,
}

impl ServerPublicKey {
    pub fn from_pem(pem: &str) -> Result<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(pem.trim()).map_err(BunqError::crypto)?;
        Ok(Self {
            pem: pem.to_string(),
            verifying_key: VerifyingKey::<Sha256>::new(public_key),
        })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Check an RSA-SHA256 PKCS#1 v1.5 signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.verifying_key.verify(message, &signature).is_ok()
    }
}
