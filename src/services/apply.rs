//! Orchestration over the services: converge a manifest, refresh or destroy
//! everything tracked, import existing entities and rotate user keys.
//!
//! Entities of one kind are reconciled concurrently; nothing coordinates two
//! operations on the same entity. Users are converged before buckets because
//! bucket policies name users, and deleted after them for the same reason.

use crate::{
    errors::ReconcileError,
    models::{bucket::Bucket, manifest::Manifest, user::User},
    services::{
        bucket_service::BucketService,
        state_store::{StateError, StateStore},
        user_service::UserService,
    },
};
use futures::{StreamExt, stream};
use serde::Serialize;
use std::{collections::BTreeSet, fmt, future::Future};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bucket,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Bucket => "bucket",
            EntityKind::User => "user",
        })
    }
}

/// What happened to one entity.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    Unchanged,
    Refreshed,
    /// Gone from the gateway; no longer tracked.
    Dropped,
    Deleted,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("tracked state: {0}")]
    State(#[from] StateError),
    #[error("{kind} `{key}` is not tracked")]
    NotTracked { kind: EntityKind, key: String },
    #[error("{kind} `{key}` does not exist on the gateway")]
    Missing { kind: EntityKind, key: String },
}

pub type ApplyResult<T> = Result<T, ApplyError>;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub kind: EntityKind,
    pub key: String,
    pub action: Action,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: EntityKind,
    pub key: String,
    pub error: String,
}

/// Per-entity results of one run, in completion order.
#[derive(Serialize, Clone, Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    pub failures: Vec<Failure>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, kind: EntityKind, key: String, result: ApplyResult<Action>) {
        match result {
            Ok(action) => self.outcomes.push(Outcome { kind, key, action }),
            Err(err) => {
                warn!(%kind, key = %key, error = %err, "reconciliation failed");
                self.failures.push(Failure {
                    kind,
                    key,
                    error: err.to_string(),
                });
            }
        }
    }

    /// Action recorded for one entity, if it succeeded.
    pub fn action(&self, kind: EntityKind, key: &str) -> Option<Action> {
        self.outcomes
            .iter()
            .find(|o| o.kind == kind && o.key == key)
            .map(|o| o.action)
    }
}

/// Desired bucket with the gateway-computed fields filled from `observed`.
pub fn plan_bucket(desired: &Bucket, observed: &Bucket) -> Bucket {
    Bucket {
        placement_rule: desired
            .placement_rule
            .clone()
            .or_else(|| observed.placement_rule.clone()),
        owner: desired.owner.clone().or_else(|| observed.owner.clone()),
        ..desired.clone()
    }
}

/// Desired user with undeclared fields inherited from `observed`.
///
/// An undeclared key pair keeps the observed one, so only an explicit
/// rotation regenerates keys. A user with no keys at all gets new ones.
pub fn plan_user(desired: &User, observed: &User) -> User {
    let (access_key, secret_key) = if desired.has_key_pair() {
        (desired.access_key.clone(), desired.secret_key.clone())
    } else {
        let issued = |key: &Option<String>| key.clone().filter(|k| !k.is_empty());
        match (issued(&observed.access_key), issued(&observed.secret_key)) {
            (Some(access), Some(secret)) => (Some(access), Some(secret)),
            _ => (None, None),
        }
    };

    User {
        id: desired.id.clone(),
        name: desired.name.clone().or_else(|| observed.name.clone()),
        max_buckets: desired.max_buckets.or(observed.max_buckets),
        access_key,
        secret_key,
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    buckets: BucketService,
    users: UserService,
    store: StateStore,
    parallelism: usize,
}

impl Orchestrator {
    pub fn new(buckets: BucketService, users: UserService, store: StateStore, parallelism: usize) -> Self {
        Self {
            buckets,
            users,
            store,
            parallelism: parallelism.max(1),
        }
    }

    /// Run `work` over `items` with bounded concurrency, recording each result.
    async fn run_all<T, F, Fut>(&self, report: &mut Report, kind: EntityKind, items: Vec<T>, work: F)
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = (String, ApplyResult<Action>)>,
    {
        let results = stream::iter(items.into_iter().map(work))
            .buffer_unordered(self.parallelism)
            .collect::<Vec<_>>()
            .await;

        for (key, result) in results {
            report.record(kind, key, result);
        }
    }

    /// Converge the gateway onto `manifest` and delete what it no longer declares.
    pub async fn apply(&self, manifest: &Manifest) -> ApplyResult<Report> {
        let mut report = Report::default();

        let users: Vec<&User> = manifest.users.iter().collect();
        self.run_all(&mut report, EntityKind::User, users, |desired| async move {
            (desired.id.clone(), self.converge_user(desired).await)
        })
        .await;

        let buckets: Vec<&Bucket> = manifest.buckets.iter().collect();
        self.run_all(&mut report, EntityKind::Bucket, buckets, |desired| async move {
            (desired.name.clone(), self.converge_bucket(desired).await)
        })
        .await;

        let declared: BTreeSet<&str> = manifest.buckets.iter().map(|b| b.name.as_str()).collect();
        let stale_buckets: Vec<String> = self
            .store
            .list_buckets()
            .await?
            .into_iter()
            .map(|b| b.name)
            .filter(|name| !declared.contains(name.as_str()))
            .collect();
        self.run_all(&mut report, EntityKind::Bucket, stale_buckets, |name| async move {
            let result = self.delete_bucket(&name).await;
            (name, result)
        })
        .await;

        let declared: BTreeSet<&str> = manifest.users.iter().map(|u| u.id.as_str()).collect();
        let stale_users: Vec<String> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|u| u.id)
            .filter(|id| !declared.contains(id.as_str()))
            .collect();
        self.run_all(&mut report, EntityKind::User, stale_users, |id| async move {
            let result = self.delete_user(&id).await;
            (id, result)
        })
        .await;

        info!(
            succeeded = report.outcomes.len(),
            failed = report.failures.len(),
            "apply finished"
        );
        Ok(report)
    }

    /// Re-read every tracked entity, dropping those the gateway no longer has.
    pub async fn refresh(&self) -> ApplyResult<Report> {
        let mut report = Report::default();

        let users: Vec<String> = self.store.list_users().await?.into_iter().map(|u| u.id).collect();
        self.run_all(&mut report, EntityKind::User, users, |id| async move {
            let result = self.refresh_user(&id).await;
            (id, result)
        })
        .await;

        let buckets: Vec<String> = self.store.list_buckets().await?.into_iter().map(|b| b.name).collect();
        self.run_all(&mut report, EntityKind::Bucket, buckets, |name| async move {
            let result = self.refresh_bucket(&name).await;
            (name, result)
        })
        .await;

        Ok(report)
    }

    /// Delete every tracked bucket, then every tracked user.
    pub async fn destroy(&self) -> ApplyResult<Report> {
        let mut report = Report::default();

        let buckets: Vec<String> = self.store.list_buckets().await?.into_iter().map(|b| b.name).collect();
        self.run_all(&mut report, EntityKind::Bucket, buckets, |name| async move {
            let result = self.delete_bucket(&name).await;
            (name, result)
        })
        .await;

        let users: Vec<String> = self.store.list_users().await?.into_iter().map(|u| u.id).collect();
        self.run_all(&mut report, EntityKind::User, users, |id| async move {
            let result = self.delete_user(&id).await;
            (id, result)
        })
        .await;

        Ok(report)
    }

    /// Start tracking an existing bucket.
    pub async fn import_bucket(&self, name: &str) -> ApplyResult<Bucket> {
        let bucket = self.buckets.read(name).await?.ok_or_else(|| ApplyError::Missing {
            kind: EntityKind::Bucket,
            key: name.to_string(),
        })?;
        self.store.put_bucket(&bucket).await?;
        info!(bucket = name, "bucket imported");
        Ok(bucket)
    }

    /// Start tracking an existing user.
    pub async fn import_user(&self, id: &str) -> ApplyResult<User> {
        let user = self.users.read(id).await?.ok_or_else(|| ApplyError::Missing {
            kind: EntityKind::User,
            key: id.to_string(),
        })?;
        self.store.put_user(&user).await?;
        info!(user = id, "user imported");
        Ok(user)
    }

    /// Regenerate the key pair of a tracked user.
    pub async fn rotate_keys(&self, id: &str) -> ApplyResult<User> {
        let state = self.store.get_user(id).await?.ok_or_else(|| ApplyError::NotTracked {
            kind: EntityKind::User,
            key: id.to_string(),
        })?;
        let rotated = self.users.rotate_keys(&state).await?;
        self.store.put_user(&rotated).await?;
        Ok(rotated)
    }

    async fn converge_bucket(&self, desired: &Bucket) -> ApplyResult<Action> {
        let name = desired.name.as_str();
        let observed = match self.store.get_bucket(name).await? {
            Some(_) => self.buckets.read(name).await?,
            None => None,
        };

        let Some(observed) = observed else {
            if self.store.remove_bucket(name).await? {
                info!(bucket = name, "tracked bucket is gone, recreating");
            }
            let created = self.buckets.create(desired).await?;
            self.store.put_bucket(&created).await?;
            return Ok(Action::Created);
        };

        let planned = plan_bucket(desired, &observed);
        if planned == observed {
            self.store.put_bucket(&observed).await?;
            return Ok(Action::Unchanged);
        }

        let updated = self.buckets.update(&observed, &planned).await?;
        self.store.put_bucket(&updated).await?;
        Ok(Action::Updated)
    }

    async fn converge_user(&self, desired: &User) -> ApplyResult<Action> {
        let id = desired.id.as_str();
        let observed = match self.store.get_user(id).await? {
            Some(_) => self.users.read(id).await?,
            None => None,
        };

        let Some(observed) = observed else {
            if self.store.remove_user(id).await? {
                info!(user = id, "tracked user is gone, recreating");
            }
            let created = self.users.create(desired).await?;
            self.store.put_user(&created).await?;
            return Ok(Action::Created);
        };

        let planned = plan_user(desired, &observed);
        if planned == observed {
            self.store.put_user(&observed).await?;
            return Ok(Action::Unchanged);
        }

        let updated = self.users.update(&observed, &planned).await?;
        self.store.put_user(&updated).await?;
        Ok(Action::Updated)
    }

    async fn refresh_bucket(&self, name: &str) -> ApplyResult<Action> {
        match self.buckets.read(name).await? {
            Some(bucket) => {
                self.store.put_bucket(&bucket).await?;
                Ok(Action::Refreshed)
            }
            None => {
                self.store.remove_bucket(name).await?;
                Ok(Action::Dropped)
            }
        }
    }

    async fn refresh_user(&self, id: &str) -> ApplyResult<Action> {
        match self.users.read(id).await? {
            Some(user) => {
                self.store.put_user(&user).await?;
                Ok(Action::Refreshed)
            }
            None => {
                self.store.remove_user(id).await?;
                Ok(Action::Dropped)
            }
        }
    }

    async fn delete_bucket(&self, name: &str) -> ApplyResult<Action> {
        self.buckets.delete(name).await?;
        self.store.remove_bucket(name).await?;
        Ok(Action::Deleted)
    }

    async fn delete_user(&self, id: &str) -> ApplyResult<Action> {
        self.users.delete(id).await?;
        self.store.remove_user(id).await?;
        Ok(Action::Deleted)
    }
}
