//! Bucket expiration rules <-> S3 lifecycle configuration.
//!
//! The data-plane adapter maps these shapes onto the SDK types; nothing here
//! performs I/O.

use crate::{errors::TranslationError, models::bucket::{Bucket, LifecycleDelete}};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LifecycleConfiguration {
    pub rules: Vec<LifecycleRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LifecycleRule {
    pub id: Option<String>,
    pub status: RuleStatus,
    #[serde(default)]
    pub filter: LifecycleFilter,
    #[serde(default)]
    pub expiration: Option<Expiration>,
    #[serde(default)]
    pub noncurrent_version_expiration: Option<NoncurrentVersionExpiration>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleStatus {
    Enabled,
    Disabled,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Enabled => "Enabled",
            RuleStatus::Disabled => "Disabled",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LifecycleFilter {
    pub prefix: Option<String>,
}

/// Current-version expiration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Expiration {
    pub days: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NoncurrentVersionExpiration {
    pub noncurrent_days: Option<i32>,
}

fn rule(entry: &LifecycleDelete) -> LifecycleRule {
    LifecycleRule {
        id: Some(entry.id.clone()),
        status: RuleStatus::Enabled,
        filter: LifecycleFilter {
            prefix: Some(entry.object_prefix.clone()),
        },
        expiration: None,
        noncurrent_version_expiration: None,
    }
}

/// Build the lifecycle configuration for a bucket.
///
/// Current-version rules come first, then noncurrent-version rules, each in
/// declaration order and all enabled. Returns `None` when both lists are
/// empty; the caller must then delete the remote configuration instead.
pub fn lifecycle_for_bucket(bucket: &Bucket) -> Option<LifecycleConfiguration> {
    if !bucket.has_lifecycle_rules() {
        return None;
    }

    let current = bucket.lifecycle_delete.iter().map(|entry| LifecycleRule {
        expiration: Some(Expiration {
            days: Some(entry.after_days),
        }),
        ..rule(entry)
    });

    let noncurrent = bucket
        .lifecycle_delete_noncurrent
        .iter()
        .map(|entry| LifecycleRule {
            noncurrent_version_expiration: Some(NoncurrentVersionExpiration {
                noncurrent_days: Some(entry.after_days),
            }),
            ..rule(entry)
        });

    Some(LifecycleConfiguration {
        rules: current.chain(noncurrent).collect(),
    })
}

/// Recover the current-version delete rules from a stored configuration.
///
/// Rules without a current-version expiration (including every
/// noncurrent-version rule) are skipped, so `lifecycle_delete_noncurrent` is
/// never reconstructed from the remote side.
pub fn delete_rules_from_lifecycle(
    configuration: &LifecycleConfiguration,
) -> Result<Vec<LifecycleDelete>, TranslationError> {
    configuration
        .rules
        .iter()
        .filter_map(|rule| {
            let days = rule.expiration.as_ref().and_then(|e| e.days)?;
            Some((rule, days))
        })
        .map(|(rule, days)| {
            let id = rule.id.clone().ok_or_else(|| {
                TranslationError::LifecycleRule(format!("expiration rule after {days} days has no id"))
            })?;

            Ok(LifecycleDelete {
                id,
                object_prefix: rule.filter.prefix.clone().unwrap_or_default(),
                after_days: days,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, prefix: &str, days: i32) -> LifecycleDelete {
        LifecycleDelete {
            id: id.into(),
            object_prefix: prefix.into(),
            after_days: days,
        }
    }

    #[test]
    fn no_rules_means_no_configuration() {
        assert!(lifecycle_for_bucket(&Bucket::default()).is_none());
    }

    #[test]
    fn emits_current_then_noncurrent_rules_all_enabled() {
        let bucket = Bucket {
            name: "b".into(),
            lifecycle_delete: vec![entry("expire-logs", "logs/", 30)],
            lifecycle_delete_noncurrent: vec![entry("expire-old-versions", "", 7)],
            ..Bucket::default()
        };

        let configuration = lifecycle_for_bucket(&bucket).unwrap();

        assert_eq!(configuration.rules.len(), 2);
        assert!(configuration.rules.iter().all(|r| r.status == RuleStatus::Enabled));

        let current = &configuration.rules[0];
        assert_eq!(current.id.as_deref(), Some("expire-logs"));
        assert_eq!(current.filter.prefix.as_deref(), Some("logs/"));
        assert_eq!(current.expiration, Some(Expiration { days: Some(30) }));
        assert!(current.noncurrent_version_expiration.is_none());

        let noncurrent = &configuration.rules[1];
        assert!(noncurrent.expiration.is_none());
        assert_eq!(
            noncurrent.noncurrent_version_expiration,
            Some(NoncurrentVersionExpiration {
                noncurrent_days: Some(7)
            })
        );
    }

    #[test]
    fn noncurrent_only_configuration_is_still_written() {
        let bucket = Bucket {
            lifecycle_delete_noncurrent: vec![entry("expire-old-versions", "", 7)],
            ..Bucket::default()
        };
        assert!(lifecycle_for_bucket(&bucket).is_some());
    }

    #[test]
    fn current_version_rules_round_trip() {
        let rules = vec![entry("expire-logs-30", "logs/", 30), entry("expire-tmp-1", "", 1)];
        let bucket = Bucket {
            lifecycle_delete: rules.clone(),
            ..Bucket::default()
        };

        let configuration = lifecycle_for_bucket(&bucket).unwrap();

        assert_eq!(delete_rules_from_lifecycle(&configuration).unwrap(), rules);
    }

    #[test]
    fn noncurrent_rules_are_not_read_back() {
        let bucket = Bucket {
            lifecycle_delete: vec![entry("expire-logs-30", "logs/", 30)],
            lifecycle_delete_noncurrent: vec![entry("expire-old-versions", "", 7)],
            ..Bucket::default()
        };

        let read = delete_rules_from_lifecycle(&lifecycle_for_bucket(&bucket).unwrap()).unwrap();

        assert_eq!(read, vec![entry("expire-logs-30", "logs/", 30)]);
    }

    #[test]
    fn missing_prefix_reads_as_empty_string() {
        let configuration = LifecycleConfiguration {
            rules: vec![LifecycleRule {
                id: Some("expire-everything".into()),
                status: RuleStatus::Enabled,
                filter: LifecycleFilter::default(),
                expiration: Some(Expiration { days: Some(3) }),
                noncurrent_version_expiration: None,
            }],
        };

        let read = delete_rules_from_lifecycle(&configuration).unwrap();
        assert_eq!(read[0].object_prefix, "");
    }

    #[test]
    fn expiration_rule_without_id_is_rejected() {
        let configuration = LifecycleConfiguration {
            rules: vec![LifecycleRule {
                id: None,
                status: RuleStatus::Enabled,
                filter: LifecycleFilter::default(),
                expiration: Some(Expiration { days: Some(3) }),
                noncurrent_version_expiration: None,
            }],
        };

        assert!(matches!(
            delete_rules_from_lifecycle(&configuration),
            Err(TranslationError::LifecycleRule(_))
        ));
    }
}
