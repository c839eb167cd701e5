//! BucketService: create, read, update and delete one bucket across the
//! admin API and the data plane.
//!
//! Every operation is a strict sequence of remote calls; the first failure
//! aborts it with the failing step named, and earlier side effects are left
//! in place.

use crate::{
    clients::RemoteClients,
    errors::{ReconcileError, ReconcileResult, StepContext, optional},
    models::{
        admin::BucketInfo,
        bucket::{Bucket, BucketParts, VersioningStatus},
        lifecycle::lifecycle_for_bucket,
        mutability::{BUCKET_FIELDS, validate_transition},
        policy::{BucketPolicy, policy_for_bucket},
    },
};
use tracing::{debug, info};

#[derive(Clone)]
pub struct BucketService {
    clients: RemoteClients,
}

impl BucketService {
    pub fn new(clients: RemoteClients) -> Self {
        Self { clients }
    }

    /// `<region>:<placement>` when a placement rule is declared.
    fn location_constraint(&self, bucket: &Bucket) -> Option<String> {
        bucket
            .placement_rule
            .as_deref()
            .filter(|placement| !placement.is_empty())
            .map(|placement| format!("{}:{placement}", self.clients.s3.region()))
    }

    /// Create the bucket, apply its data-plane configuration and return the
    /// record as re-read from the gateway.
    pub async fn create(&self, desired: &Bucket) -> ReconcileResult<Bucket> {
        if desired.name.is_empty() {
            return Err(ReconcileError::InvalidInput("bucket name must not be empty".into()));
        }
        let name = desired.name.as_str();
        let s3 = &self.clients.s3;

        let location = self.location_constraint(desired);
        s3.create_bucket(name, location.as_deref())
            .await
            .step("CreateBucket")?;

        s3.put_bucket_versioning(name, VersioningStatus::from_enabled(desired.versioning_enabled))
            .await
            .step("PutBucketVersioning")?;

        if let Some(policy) = policy_for_bucket(desired) {
            self.put_policy(name, &policy).await?;
        }

        if let Some(lifecycle) = lifecycle_for_bucket(desired) {
            s3.put_bucket_lifecycle(name, &lifecycle)
                .await
                .step("PutBucketLifecycle")?;
        }

        let info = self
            .clients
            .admin
            .get_bucket_info(name)
            .await
            .step("GetBucketInfo")?;

        let created = self.observe(info).await?;
        info!(bucket = name, placement = ?created.placement_rule, "bucket created");
        Ok(created)
    }

    /// Current remote record, or `None` when the gateway no longer knows the
    /// bucket and it must be dropped from tracked state.
    pub async fn read(&self, name: &str) -> ReconcileResult<Option<Bucket>> {
        let Some(info) = optional(self.clients.admin.get_bucket_info(name).await).step("GetBucketInfo")?
        else {
            debug!(bucket = name, "bucket not found, dropping from state");
            return Ok(None);
        };

        self.observe(info).await.map(Some)
    }

    /// Converge a tracked bucket onto `desired`.
    ///
    /// Immutable fields are checked before any remote call. The returned
    /// record takes the desired data-plane values without re-reading them.
    pub async fn update(&self, state: &Bucket, desired: &Bucket) -> ReconcileResult<Bucket> {
        validate_transition("bucket", BUCKET_FIELDS, state, desired)?;

        let name = state.name.as_str();
        let s3 = &self.clients.s3;

        s3.put_bucket_versioning(name, VersioningStatus::from_enabled(desired.versioning_enabled))
            .await
            .step("PutBucketVersioning")?;

        match policy_for_bucket(desired) {
            Some(policy) => self.put_policy(name, &policy).await?,
            None => {
                debug!(bucket = name, "no permissions declared, clearing bucket policy");
                s3.delete_bucket_policy(name)
                    .await
                    .step("DeleteBucketPolicy")?;
            }
        }

        match lifecycle_for_bucket(desired) {
            Some(lifecycle) => s3
                .put_bucket_lifecycle(name, &lifecycle)
                .await
                .step("PutBucketLifecycle")?,
            None => {
                debug!(bucket = name, "no lifecycle rules declared, clearing lifecycle");
                s3.delete_bucket_lifecycle(name)
                    .await
                    .step("DeleteBucketLifecycle")?;
            }
        }

        info!(bucket = name, "bucket updated");
        Ok(Bucket {
            versioning_enabled: desired.versioning_enabled,
            permissions: desired.permissions.clone(),
            lifecycle_delete: desired.lifecycle_delete.clone(),
            lifecycle_delete_noncurrent: desired.lifecycle_delete_noncurrent.clone(),
            ..state.clone()
        })
    }

    pub async fn delete(&self, name: &str) -> ReconcileResult<()> {
        self.clients
            .admin
            .remove_bucket(name)
            .await
            .step("RemoveBucket")?;
        info!(bucket = name, "bucket deleted");
        Ok(())
    }

    /// Fetch the data-plane parts of a bucket whose admin metadata is known
    /// and merge them into one record.
    pub(crate) async fn observe(&self, info: BucketInfo) -> ReconcileResult<Bucket> {
        let name = info.bucket.clone();
        let s3 = &self.clients.s3;

        let versioning = s3
            .get_bucket_versioning(&name)
            .await
            .step("GetBucketVersioning")?;

        let policy = match optional(s3.get_bucket_policy(&name).await).step("GetBucketPolicy")? {
            Some(raw) => Some(BucketPolicy::from_json(&raw).step("GetBucketPolicy")?),
            None => None,
        };

        let lifecycle = optional(s3.get_bucket_lifecycle(&name).await).step("GetBucketLifecycle")?;

        debug!(
            bucket = %name,
            versioning = ?versioning,
            has_policy = policy.is_some(),
            has_lifecycle = lifecycle.is_some(),
            "merging bucket parts"
        );

        BucketParts {
            info,
            versioning,
            policy,
            lifecycle,
        }
        .merge()
        .step("MergeBucket")
    }

    async fn put_policy(&self, name: &str, policy: &BucketPolicy) -> ReconcileResult<()> {
        let document = policy.to_json().step("PutBucketPolicy")?;
        self.clients
            .s3
            .put_bucket_policy(name, &document)
            .await
            .step("PutBucketPolicy")
    }
}
