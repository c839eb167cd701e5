//! In-memory gateway implementing both remote APIs, recording every call.

use crate::{
    clients::{AdminApi, ObjectApi, RemoteClients, admin::error_from_response},
    errors::{RemoteError, RemoteResult},
    models::{
        admin::{BucketInfo, UserInfo, UserKey, UserSpec},
        bucket::VersioningStatus,
        lifecycle::LifecycleConfiguration,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

pub const REGION: &str = "default";
pub const DEFAULT_PLACEMENT: &str = "default-placement";

#[derive(Clone, Debug, Default)]
pub struct FakeBucket {
    pub info: BucketInfo,
    pub versioning: Option<VersioningStatus>,
    pub policy: Option<String>,
    pub lifecycle: Option<LifecycleConfiguration>,
}

#[derive(Default)]
struct Inner {
    calls: Vec<String>,
    buckets: BTreeMap<String, FakeBucket>,
    users: BTreeMap<String, UserInfo>,
    issued_keys: u32,
    failing: BTreeMap<&'static str, (StatusCode, String)>,
}

#[derive(Default)]
pub struct FakeGateway {
    inner: Mutex<Inner>,
}

fn not_found(code: &str) -> RemoteError {
    RemoteError::NotFound { code: code.into() }
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn clients(self: &Arc<Self>) -> RemoteClients {
        RemoteClients::new(self.clone(), self.clone())
    }

    /// Operation names called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Make every later call of `op` fail with an `InternalError`.
    pub fn fail_on(&self, op: &'static str) {
        let body = format!(r#"{{"Code":"InternalError","Message":"{op} injected failure"}}"#);
        self.respond_with(op, StatusCode::INTERNAL_SERVER_ERROR, &body);
    }

    /// Make every later call of `op` fail as if the gateway answered with
    /// `status` and `body`.
    pub fn respond_with(&self, op: &'static str, status: StatusCode, body: &str) {
        self.inner.lock().unwrap().failing.insert(op, (status, body.to_string()));
    }

    pub fn seed_bucket(&self, bucket: FakeBucket) {
        let mut inner = self.inner.lock().unwrap();
        inner.buckets.insert(bucket.info.bucket.clone(), bucket);
    }

    pub fn seed_user(&self, user: UserInfo) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.insert(user.user_id.clone(), user);
    }

    pub fn bucket(&self, name: &str) -> Option<FakeBucket> {
        self.inner.lock().unwrap().buckets.get(name).cloned()
    }

    pub fn user(&self, id: &str) -> Option<UserInfo> {
        self.inner.lock().unwrap().users.get(id).cloned()
    }

    /// Record the call and apply `f` to the state, unless `op` is set to fail.
    fn record<T>(&self, op: &'static str, f: impl FnOnce(&mut Inner) -> RemoteResult<T>) -> RemoteResult<T> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(op.to_string());
        if let Some((status, body)) = inner.failing.get(op) {
            return Err(error_from_response(*status, body));
        }
        f(&mut inner)
    }

    fn with_bucket<T>(
        &self,
        op: &'static str,
        name: &str,
        f: impl FnOnce(&mut FakeBucket) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        self.record(op, |inner| {
            let bucket = inner
                .buckets
                .get_mut(name)
                .ok_or_else(|| not_found("NoSuchBucket"))?;
            f(bucket)
        })
    }
}

impl Inner {
    fn issue_key(&mut self, user: &str) -> UserKey {
        self.issued_keys += 1;
        UserKey {
            user: user.to_string(),
            access_key: format!("GENERATEDAK{:04}", self.issued_keys),
            secret_key: format!("generated-secret-{:04}", self.issued_keys),
        }
    }

    fn apply_keys(&mut self, user_id: &str, spec: &UserSpec) -> Vec<UserKey> {
        let mut added = Vec::new();
        if spec.generate_key {
            added.push(self.issue_key(user_id));
        }
        added.extend(spec.keys.iter().map(|k| UserKey {
            user: user_id.to_string(),
            access_key: k.access_key.clone(),
            secret_key: k.secret_key.clone(),
        }));
        added
    }
}

#[async_trait]
impl AdminApi for FakeGateway {
    async fn get_bucket_info(&self, name: &str) -> RemoteResult<BucketInfo> {
        self.with_bucket("GetBucketInfo", name, |b| Ok(b.info.clone()))
    }

    async fn list_buckets(&self) -> RemoteResult<Vec<String>> {
        self.record("ListBuckets", |inner| Ok(inner.buckets.keys().cloned().collect()))
    }

    async fn remove_bucket(&self, name: &str) -> RemoteResult<()> {
        self.record("RemoveBucket", |inner| {
            inner
                .buckets
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| not_found("NoSuchBucket"))
        })
    }

    async fn get_user(&self, id: &str) -> RemoteResult<UserInfo> {
        self.record("GetUser", |inner| {
            inner.users.get(id).cloned().ok_or_else(|| not_found("NoSuchUser"))
        })
    }

    async fn create_user(&self, spec: &UserSpec) -> RemoteResult<UserInfo> {
        self.record("CreateUser", |inner| {
            if inner.users.contains_key(&spec.id) {
                return Err(RemoteError::Api {
                    status: 409,
                    code: "UserAlreadyExists".into(),
                    message: String::new(),
                });
            }
            let keys = inner.apply_keys(&spec.id, spec);
            let user = UserInfo {
                user_id: spec.id.clone(),
                display_name: spec.display_name.clone().unwrap_or_default(),
                max_buckets: spec.max_buckets.or(Some(1000)),
                keys,
            };
            inner.users.insert(spec.id.clone(), user.clone());
            Ok(user)
        })
    }

    async fn modify_user(&self, spec: &UserSpec) -> RemoteResult<UserInfo> {
        self.record("ModifyUser", |inner| {
            let added = inner.apply_keys(&spec.id, spec);
            let user = inner
                .users
                .get_mut(&spec.id)
                .ok_or_else(|| not_found("NoSuchUser"))?;
            if let Some(name) = &spec.display_name {
                user.display_name = name.clone();
            }
            if spec.max_buckets.is_some() {
                user.max_buckets = spec.max_buckets;
            }
            user.keys.extend(added);
            Ok(user.clone())
        })
    }

    async fn remove_key(&self, user_id: &str, access_key: &str) -> RemoteResult<()> {
        self.record("RemoveKey", |inner| {
            let user = inner
                .users
                .get_mut(user_id)
                .ok_or_else(|| not_found("NoSuchUser"))?;
            let before = user.keys.len();
            user.keys.retain(|k| k.access_key != access_key);
            if user.keys.len() == before {
                return Err(not_found("NoSuchKey"));
            }
            Ok(())
        })
    }

    async fn remove_user(&self, id: &str) -> RemoteResult<()> {
        self.record("RemoveUser", |inner| {
            inner
                .users
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| not_found("NoSuchUser"))
        })
    }
}

#[async_trait]
impl ObjectApi for FakeGateway {
    fn region(&self) -> &str {
        REGION
    }

    async fn create_bucket(&self, name: &str, location_constraint: Option<&str>) -> RemoteResult<()> {
        self.record("CreateBucket", |inner| {
            if inner.buckets.contains_key(name) {
                return Err(RemoteError::Api {
                    status: 409,
                    code: "BucketAlreadyExists".into(),
                    message: String::new(),
                });
            }
            let placement_rule = location_constraint
                .and_then(|c| c.split_once(':'))
                .map(|(_, placement)| placement.to_string())
                .unwrap_or_else(|| DEFAULT_PLACEMENT.to_string());
            inner.buckets.insert(
                name.to_string(),
                FakeBucket {
                    info: BucketInfo {
                        bucket: name.to_string(),
                        placement_rule,
                        owner: "admin".into(),
                        ..BucketInfo::default()
                    },
                    ..FakeBucket::default()
                },
            );
            Ok(())
        })
    }

    async fn put_bucket_versioning(&self, name: &str, status: VersioningStatus) -> RemoteResult<()> {
        self.with_bucket("PutBucketVersioning", name, |b| {
            b.versioning = Some(status);
            Ok(())
        })
    }

    async fn get_bucket_versioning(&self, name: &str) -> RemoteResult<Option<VersioningStatus>> {
        self.with_bucket("GetBucketVersioning", name, |b| Ok(b.versioning))
    }

    async fn put_bucket_policy(&self, name: &str, policy: &str) -> RemoteResult<()> {
        self.with_bucket("PutBucketPolicy", name, |b| {
            b.policy = Some(policy.to_string());
            Ok(())
        })
    }

    async fn get_bucket_policy(&self, name: &str) -> RemoteResult<String> {
        self.with_bucket("GetBucketPolicy", name, |b| {
            b.policy.clone().ok_or_else(|| not_found("NoSuchBucketPolicy"))
        })
    }

    async fn delete_bucket_policy(&self, name: &str) -> RemoteResult<()> {
        self.with_bucket("DeleteBucketPolicy", name, |b| {
            b.policy = None;
            Ok(())
        })
    }

    async fn put_bucket_lifecycle(
        &self,
        name: &str,
        configuration: &LifecycleConfiguration,
    ) -> RemoteResult<()> {
        self.with_bucket("PutBucketLifecycle", name, |b| {
            b.lifecycle = Some(configuration.clone());
            Ok(())
        })
    }

    async fn get_bucket_lifecycle(&self, name: &str) -> RemoteResult<LifecycleConfiguration> {
        self.with_bucket("GetBucketLifecycle", name, |b| {
            b.lifecycle
                .clone()
                .ok_or_else(|| not_found("NoSuchLifecycleConfiguration"))
        })
    }

    async fn delete_bucket_lifecycle(&self, name: &str) -> RemoteResult<()> {
        self.with_bucket("DeleteBucketLifecycle", name, |b| {
            b.lifecycle = None;
            Ok(())
        })
    }
}
