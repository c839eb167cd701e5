//! Wire shapes of the RGW admin-ops API (`/admin/bucket`, `/admin/user`).
//!
//! Only the fields the reconciler consumes are decoded; everything else the
//! gateway returns is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket metadata as returned by `GET /admin/bucket?bucket=<name>`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketInfo {
    pub bucket: String,

    #[serde(default)]
    pub placement_rule: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub zonegroup: String,
}

/// One S3 key pair attached to a user.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UserKey {
    #[serde(default)]
    pub user: String,
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserKey")
            .field("user", &self.user)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// User metadata as returned by `GET /admin/user?uid=<id>`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub max_buckets: Option<i32>,

    #[serde(default)]
    pub keys: Vec<UserKey>,
}

/// Explicit access/secret pair handed to create-user or modify-user.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySpec")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Arguments of create-user and modify-user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserSpec {
    pub id: String,
    pub display_name: Option<String>,
    pub max_buckets: Option<i32>,
    pub generate_key: bool,
    pub keys: Vec<KeySpec>,
}
