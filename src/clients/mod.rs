//! The two remote collaborators: the RGW admin-ops API and the S3-compatible
//! data-plane API.
//!
//! Services only see the traits, so they can run against the real adapters
//! or the in-memory fake used by the tests.

pub mod admin;
pub mod s3;
pub mod signing;

#[cfg(test)]
pub(crate) mod fake;

use crate::{
    errors::RemoteResult,
    models::{
        admin::{BucketInfo, UserInfo, UserSpec},
        bucket::VersioningStatus,
        lifecycle::LifecycleConfiguration,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Bucket and user metadata operations.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn get_bucket_info(&self, name: &str) -> RemoteResult<BucketInfo>;

    async fn list_buckets(&self) -> RemoteResult<Vec<String>>;

    async fn remove_bucket(&self, name: &str) -> RemoteResult<()>;

    async fn get_user(&self, id: &str) -> RemoteResult<UserInfo>;

    async fn create_user(&self, spec: &UserSpec) -> RemoteResult<UserInfo>;

    async fn modify_user(&self, spec: &UserSpec) -> RemoteResult<UserInfo>;

    async fn remove_key(&self, user_id: &str, access_key: &str) -> RemoteResult<()>;

    async fn remove_user(&self, id: &str) -> RemoteResult<()>;
}

/// Bucket-level data-plane operations.
///
/// `get_bucket_policy` and `get_bucket_lifecycle` return
/// [`RemoteError::NotFound`](crate::errors::RemoteError::NotFound) when the
/// bucket has no such document.
#[async_trait]
pub trait ObjectApi: Send + Sync {
    /// Region the client signs for; prefixes the placement constraint.
    fn region(&self) -> &str;

    async fn create_bucket(&self, name: &str, location_constraint: Option<&str>) -> RemoteResult<()>;

    async fn put_bucket_versioning(&self, name: &str, status: VersioningStatus) -> RemoteResult<()>;

    /// `None` when versioning was never configured.
    async fn get_bucket_versioning(&self, name: &str) -> RemoteResult<Option<VersioningStatus>>;

    async fn put_bucket_policy(&self, name: &str, policy: &str) -> RemoteResult<()>;

    async fn get_bucket_policy(&self, name: &str) -> RemoteResult<String>;

    async fn delete_bucket_policy(&self, name: &str) -> RemoteResult<()>;

    async fn put_bucket_lifecycle(
        &self,
        name: &str,
        configuration: &LifecycleConfiguration,
    ) -> RemoteResult<()>;

    async fn get_bucket_lifecycle(&self, name: &str) -> RemoteResult<LifecycleConfiguration>;

    async fn delete_bucket_lifecycle(&self, name: &str) -> RemoteResult<()>;
}

/// A configured pair of remote clients, shared by every service.
#[derive(Clone)]
pub struct RemoteClients {
    pub admin: Arc<dyn AdminApi>,
    pub s3: Arc<dyn ObjectApi>,
}

impl RemoteClients {
    pub fn new(admin: Arc<dyn AdminApi>, s3: Arc<dyn ObjectApi>) -> Self {
        Self { admin, s3 }
    }
}
