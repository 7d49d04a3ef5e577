use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Client-supplied idempotency token.
///
/// Only the hyphenated 8-4-4-4-12 hexadecimal form is accepted; it is stored
/// lower-cased so that case variants of the same key collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IdempotencyKey {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        let hyphenated = s.len() == 36
            && s.char_indices().all(|(i, c)| match i {
                8 | 13 | 18 | 23 => c == '-',
                _ => c.is_ascii_hexdigit(),
            });
        if hyphenated && Uuid::try_parse(s).is_ok() {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(PaymentError::InvalidFormat(
                "idempotency key must be a valid UUID".to_string(),
            ))
        }
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response as it was produced for the first request carrying a key.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct StoredResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl StoredResponse {
    pub fn created<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            status: 201,
            body: serde_json::to_value(body)?,
        })
    }

    /// Reads the body back as the type it was produced from.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.body)?)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IdempotencyRecord {
    pub id: Uuid,
    pub key: IdempotencyKey,
    pub endpoint: String,
    pub request_hash: String,
    pub response: StoredResponse,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// SHA-256 over the JSON encoding of a request body, hex encoded.
pub fn request_hash<B: Serialize + ?Sized>(body: &B) -> Result<String> {
    let bytes = serde_json::to_vec(body)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
