//! The canonical bucket record, and the merge of its independently-fetched
//! parts (admin metadata, versioning, policy, lifecycle) into one value.

use crate::{
    errors::TranslationError,
    models::{
        admin::BucketInfo,
        lifecycle::{LifecycleConfiguration, delete_rules_from_lifecycle},
        policy::{BucketPolicy, permissions_from_policy},
    },
};
use serde::{Deserialize, Serialize};

/// A bucket as declared by the operator and as tracked after each operation.
///
/// `name` and `placement_rule` are write-once. `owner` is reported by the
/// gateway and never declared.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Bucket {
    pub name: String,

    /// Placement target; `None` in a declaration means "gateway default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_rule: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default)]
    pub versioning_enabled: bool,

    /// Ordered as the statements of the stored policy document.
    #[serde(rename = "permission", default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub lifecycle_delete: Vec<LifecycleDelete>,

    #[serde(default)]
    pub lifecycle_delete_noncurrent: Vec<LifecycleDelete>,
}

/// Actions one user may perform on the bucket and its keys.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    pub user_id: String,
    pub permissions: Vec<String>,
}

/// Expire objects under `object_prefix` after `after_days`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LifecycleDelete {
    pub object_prefix: String,
    pub after_days: i32,
    pub id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersioningStatus {
    Enabled,
    Suspended,
}

impl VersioningStatus {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            VersioningStatus::Enabled
        } else {
            VersioningStatus::Suspended
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersioningStatus::Enabled => "Enabled",
            VersioningStatus::Suspended => "Suspended",
        }
    }
}

impl Bucket {
    /// Identity fields only; the data-plane fields are filled by [`BucketParts::merge`].
    pub fn from_admin(info: &BucketInfo) -> Self {
        Self {
            name: info.bucket.clone(),
            placement_rule: Some(info.placement_rule.clone()),
            owner: Some(info.owner.clone()).filter(|o| !o.is_empty()),
            ..Self::default()
        }
    }

    pub fn has_lifecycle_rules(&self) -> bool {
        !self.lifecycle_delete.is_empty() || !self.lifecycle_delete_noncurrent.is_empty()
    }
}

/// Partial reads of one bucket, gathered from the two remote APIs.
///
/// `policy` and `lifecycle` are `None` when the gateway reports that no
/// document is configured.
#[derive(Clone, Debug)]
pub struct BucketParts {
    pub info: BucketInfo,
    pub versioning: Option<VersioningStatus>,
    pub policy: Option<BucketPolicy>,
    pub lifecycle: Option<LifecycleConfiguration>,
}

impl BucketParts {
    pub fn merge(self) -> Result<Bucket, TranslationError> {
        let mut bucket = Bucket::from_admin(&self.info);

        bucket.versioning_enabled = self.versioning == Some(VersioningStatus::Enabled);

        if let Some(policy) = &self.policy {
            bucket.permissions = permissions_from_policy(policy)?;
        }

        if let Some(lifecycle) = &self.lifecycle {
            bucket.lifecycle_delete = delete_rules_from_lifecycle(lifecycle)?;
        }

        Ok(bucket)
    }
}
