//! Bucket permission set <-> S3 bucket-policy document.

use crate::{
    errors::TranslationError,
    models::bucket::{Bucket, Permission},
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

pub const POLICY_VERSION: &str = "2012-10-17";
const USER_ARN_PREFIX: &str = "arn:aws:iam:::user/";
const BUCKET_ARN_PREFIX: &str = "arn:aws:s3:::";

/// S3 bucket policy, as stored by the gateway.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketPolicy {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement", default)]
    pub statement: Vec<Statement>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    #[serde(rename = "Effect")]
    pub effect: String,

    /// Kept loose so foreign shapes (`"*"`, lists of ARNs) surface as a
    /// malformed principal rather than an undecodable document.
    #[serde(rename = "Principal")]
    pub principal: Value,

    #[serde(rename = "Action", deserialize_with = "one_or_many")]
    pub action: Vec<String>,

    #[serde(rename = "Resource", deserialize_with = "one_or_many")]
    pub resource: Vec<String>,
}

/// Policies written by other tools may use a bare string for a single entry.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl BucketPolicy {
    pub fn to_json(&self) -> Result<String, TranslationError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, TranslationError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Build the policy document for a bucket's permission set.
///
/// One `Allow` statement per permission entry, in list order, each scoped to
/// the bucket and every key under it. Returns `None` for an empty permission
/// set; the caller decides whether that means "never write" or "clear".
pub fn policy_for_bucket(bucket: &Bucket) -> Option<BucketPolicy> {
    if bucket.permissions.is_empty() {
        return None;
    }

    let resource = vec![
        format!("{BUCKET_ARN_PREFIX}{}", bucket.name),
        format!("{BUCKET_ARN_PREFIX}{}/*", bucket.name),
    ];

    let statement = bucket
        .permissions
        .iter()
        .map(|permission| Statement {
            effect: "Allow".into(),
            principal: json!({ "AWS": format!("{USER_ARN_PREFIX}{}", permission.user_id) }),
            action: permission.permissions.clone(),
            resource: resource.clone(),
        })
        .collect();

    Some(BucketPolicy {
        version: POLICY_VERSION.into(),
        statement,
    })
}

/// Recover the permission set from a stored policy.
///
/// The user id is the second `/`-separated segment of the `AWS` principal.
pub fn permissions_from_policy(policy: &BucketPolicy) -> Result<Vec<Permission>, TranslationError> {
    policy
        .statement
        .iter()
        .map(|statement| {
            let principal = statement
                .principal
                .as_object()
                .filter(|principal| principal.len() == 1)
                .and_then(|principal| principal.get("AWS"))
                .and_then(Value::as_str)
                .ok_or_else(|| TranslationError::MalformedPrincipal(statement.principal.to_string()))?;

            let user_id = principal
                .split('/')
                .nth(1)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| TranslationError::MalformedPrincipal(principal.to_string()))?;

            Ok(Permission {
                user_id: user_id.to_string(),
                permissions: statement.action.clone(),
            })
        })
        .collect()
}
