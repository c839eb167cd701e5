//! Declarative manifest: the buckets and users an operator wants to exist.

use crate::models::{
    bucket::{Bucket, LifecycleDelete},
    user::User,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

const RULE_ID_MIN_LEN: usize = 10;
const RULE_ID_MAX_LEN: usize = 255;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Manifest {
    #[serde(default)]
    pub buckets: Vec<Bucket>,

    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("bucket name must not be empty")]
    EmptyBucketName,
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("bucket `{0}` is declared more than once")]
    DuplicateBucket(String),
    #[error("user `{0}` is declared more than once")]
    DuplicateUser(String),
    #[error("bucket `{bucket}`: lifecycle rule `{id}`: after_days must be at least 1, got {after_days}")]
    AfterDays {
        bucket: String,
        id: String,
        after_days: i32,
    },
    #[error("bucket `{bucket}`: lifecycle rule id `{id}` must be 10 to 255 characters")]
    RuleIdLength { bucket: String, id: String },
    #[error("user `{0}`: access_key and secret_key must be set together or not at all")]
    PartialCredentials(String),
}

impl Manifest {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let mut manifest: Manifest = serde_json::from_str(raw)?;
        manifest.normalize();
        manifest.validate()?;
        Ok(manifest)
    }

    /// Treat empty placement rules and owners as undeclared, so the gateway
    /// picks them and later applies inherit what it chose.
    pub fn normalize(&mut self) {
        for bucket in &mut self.buckets {
            if bucket.placement_rule.as_deref() == Some("") {
                bucket.placement_rule = None;
            }
            if bucket.owner.as_deref() == Some("") {
                bucket.owner = None;
            }
        }
    }

    /// Enforce the attribute constraints of the declarative schema.
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut names = HashSet::new();
        for bucket in &self.buckets {
            if bucket.name.is_empty() {
                return Err(ManifestError::EmptyBucketName);
            }
            if !names.insert(bucket.name.as_str()) {
                return Err(ManifestError::DuplicateBucket(bucket.name.clone()));
            }
            for rule in bucket
                .lifecycle_delete
                .iter()
                .chain(&bucket.lifecycle_delete_noncurrent)
            {
                validate_rule(&bucket.name, rule)?;
            }
        }

        let mut ids = HashSet::new();
        for user in &self.users {
            if user.id.is_empty() {
                return Err(ManifestError::EmptyUserId);
            }
            if !ids.insert(user.id.as_str()) {
                return Err(ManifestError::DuplicateUser(user.id.clone()));
            }
            if user.key_pair().is_err() {
                return Err(ManifestError::PartialCredentials(user.id.clone()));
            }
        }

        Ok(())
    }
}

fn validate_rule(bucket: &str, rule: &LifecycleDelete) -> Result<(), ManifestError> {
    if rule.after_days < 1 {
        return Err(ManifestError::AfterDays {
            bucket: bucket.to_string(),
            id: rule.id.clone(),
            after_days: rule.after_days,
        });
    }

    let len = rule.id.chars().count();
    if !(RULE_ID_MIN_LEN..=RULE_ID_MAX_LEN).contains(&len) {
        return Err(ManifestError::RuleIdLength {
            bucket: bucket.to_string(),
            id: rule.id.clone(),
        });
    }

    Ok(())
}
