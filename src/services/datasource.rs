//! Read-only lookups that never touch tracked state.
//!
//! Unlike the service reads, a missing bucket or user is an error here:
//! there is nothing to drop, the caller asked about something that does not
//! exist.

use crate::{
    clients::RemoteClients,
    errors::{ReconcileError, ReconcileResult, StepContext},
    models::{admin::BucketInfo, bucket::Bucket, user::User},
    services::bucket_service::BucketService,
};
use serde::Serialize;
use tracing::debug;

const MASK: &str = "********";

/// Admin-side summary of one bucket, as listed by [`DataSources::list_buckets`].
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    pub placement_rule: String,
    pub owner: String,
}

impl From<BucketInfo> for BucketSummary {
    fn from(info: BucketInfo) -> Self {
        Self {
            name: info.bucket,
            placement_rule: info.placement_rule,
            owner: info.owner,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BucketFilter {
    /// Keep buckets whose name contains this substring.
    pub name: Option<String>,
    /// Keep buckets owned by exactly this user.
    pub owner: Option<String>,
}

impl BucketFilter {
    fn matches(&self, info: &BucketInfo) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|needle| info.bucket.contains(needle));
        let owner_ok = self.owner.as_deref().is_none_or(|owner| info.owner == owner);
        name_ok && owner_ok
    }
}

#[derive(Clone)]
pub struct DataSources {
    clients: RemoteClients,
    buckets: BucketService,
}

impl DataSources {
    pub fn new(clients: RemoteClients) -> Self {
        Self {
            buckets: BucketService::new(clients.clone()),
            clients,
        }
    }

    /// Full bucket record, merged the same way a tracked bucket is read.
    pub async fn show_bucket(&self, name: &str) -> ReconcileResult<Bucket> {
        let info = self
            .clients
            .admin
            .get_bucket_info(name)
            .await
            .step("GetBucketInfo")?;
        self.buckets.observe(info).await
    }

    /// Every bucket matching `filter`; metadata is fetched one bucket at a time.
    pub async fn list_buckets(&self, filter: &BucketFilter) -> ReconcileResult<Vec<BucketSummary>> {
        let admin = &self.clients.admin;
        let names = admin.list_buckets().await.step("ListBuckets")?;
        debug!(count = names.len(), ?filter, "listing buckets");

        let mut summaries = Vec::new();
        for name in names {
            let info = admin.get_bucket_info(&name).await.step("GetBucketInfo")?;
            if filter.matches(&info) {
                summaries.push(info.into());
            }
        }
        Ok(summaries)
    }

    pub async fn show_user(&self, id: &str) -> ReconcileResult<User> {
        if id.is_empty() {
            return Err(ReconcileError::InvalidInput("user id must not be empty".into()));
        }
        let info = self.clients.admin.get_user(id).await.step("GetUser")?;
        Ok(User::from_admin(&info))
    }
}

/// Hide the secret key for display.
pub fn mask_secret(user: User) -> User {
    User {
        secret_key: user.secret_key.map(|_| MASK.to_string()),
        ..user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::fake::{FakeBucket, FakeGateway},
        models::admin::{UserInfo, UserKey},
    };
    use std::sync::Arc;

    fn seeded() -> (Arc<FakeGateway>, DataSources) {
        let gateway = FakeGateway::new();
        for (bucket, owner) in [("logs-app", "alice"), ("logs-web", "bob"), ("media", "alice")] {
            gateway.seed_bucket(FakeBucket {
                info: BucketInfo {
                    bucket: bucket.into(),
                    placement_rule: "default-placement".into(),
                    owner: owner.into(),
                    ..BucketInfo::default()
                },
                ..FakeBucket::default()
            });
        }
        let sources = DataSources::new(gateway.clients());
        (gateway, sources)
    }

    fn names(summaries: &[BucketSummary]) -> Vec<&str> {
        summaries.iter().map(|s| s.name.as_str()).collect()
    }

    #[tokio::test]
    async fn list_applies_name_and_owner_filters() {
        let (_, sources) = seeded();

        let all = sources.list_buckets(&BucketFilter::default()).await.unwrap();
        assert_eq!(names(&all), ["logs-app", "logs-web", "media"]);

        let logs = sources
            .list_buckets(&BucketFilter {
                name: Some("logs".into()),
                owner: None,
            })
            .await
            .unwrap();
        assert_eq!(names(&logs), ["logs-app", "logs-web"]);

        let alice_logs = sources
            .list_buckets(&BucketFilter {
                name: Some("logs".into()),
                owner: Some("alice".into()),
            })
            .await
            .unwrap();
        assert_eq!(names(&alice_logs), ["logs-app"]);
    }

    #[tokio::test]
    async fn list_fetches_metadata_sequentially_per_bucket() {
        let (gateway, sources) = seeded();
        sources.list_buckets(&BucketFilter::default()).await.unwrap();

        assert_eq!(
            gateway.calls(),
            ["ListBuckets", "GetBucketInfo", "GetBucketInfo", "GetBucketInfo"]
        );
    }

    #[tokio::test]
    async fn show_bucket_reports_missing_bucket_as_error() {
        let (_, sources) = seeded();

        let err = sources.show_bucket("absent").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Remote { step: "GetBucketInfo", .. }));

        let media = sources.show_bucket("media").await.unwrap();
        assert_eq!(media.owner.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn show_user_requires_an_id_and_an_existing_user() {
        let (gateway, sources) = seeded();
        gateway.seed_user(UserInfo {
            user_id: "alice".into(),
            display_name: "Alice".into(),
            max_buckets: Some(1000),
            keys: vec![UserKey {
                user: "alice".into(),
                access_key: "ALICEKEY".into(),
                secret_key: "alice-secret".into(),
            }],
        });

        assert!(matches!(
            sources.show_user("").await,
            Err(ReconcileError::InvalidInput(_))
        ));
        assert!(sources.show_user("mallory").await.is_err());

        let alice = mask_secret(sources.show_user("alice").await.unwrap());
        assert_eq!(alice.access_key.as_deref(), Some("ALICEKEY"));
        assert_eq!(alice.secret_key.as_deref(), Some(MASK));
    }
}
