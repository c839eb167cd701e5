//! The canonical user record and the credential rules applied to it.

use crate::models::admin::{KeySpec, UserInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: String,

    /// Display name; defaults to `id` when a user is created without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buckets: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("max_buckets", &self.max_buckets)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("user `{0}`: access_key and secret_key must be set together or not at all")]
pub struct PartialCredentials(pub String);

/// What to ask the gateway for when creating or modifying a user's keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyRequest {
    Generate,
    Explicit(KeySpec),
    /// Neither generate nor supply a key.
    Keep,
}

impl KeyRequest {
    pub fn generate_key(&self) -> bool {
        matches!(self, KeyRequest::Generate)
    }

    pub fn into_keys(self) -> Vec<KeySpec> {
        match self {
            KeyRequest::Explicit(key) => vec![key],
            KeyRequest::Generate | KeyRequest::Keep => Vec::new(),
        }
    }
}

impl User {
    /// Map admin metadata; the first key pair wins, and a user without keys
    /// gets empty strings rather than `None`.
    pub fn from_admin(info: &UserInfo) -> Self {
        let (access_key, secret_key) = info
            .keys
            .first()
            .map(|k| (k.access_key.clone(), k.secret_key.clone()))
            .unwrap_or_default();

        Self {
            id: info.user_id.clone(),
            name: Some(info.display_name.clone()),
            max_buckets: info.max_buckets,
            access_key: Some(access_key),
            secret_key: Some(secret_key),
        }
    }

    /// The declared key pair, if any.
    pub fn key_pair(&self) -> Result<Option<KeySpec>, PartialCredentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(KeySpec {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(PartialCredentials(self.id.clone())),
        }
    }

    pub fn has_key_pair(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }

    /// Key request for a new user: generated unless a pair is declared.
    pub fn create_key_request(&self) -> Result<KeyRequest, PartialCredentials> {
        Ok(match self.key_pair()? {
            Some(key) => KeyRequest::Explicit(key),
            None => KeyRequest::Generate,
        })
    }

    /// Key request for an existing user.
    ///
    /// Regenerates only when the desired pair is unset and the tracked pair is
    /// set, i.e. there is a key to rotate away from.
    pub fn update_key_request(&self, state: &User) -> Result<KeyRequest, PartialCredentials> {
        Ok(match self.key_pair()? {
            Some(key) => KeyRequest::Explicit(key),
            None if state.has_key_pair() => KeyRequest::Generate,
            None => KeyRequest::Keep,
        })
    }
}
