//! Data-plane adapter over `aws-sdk-s3`: versioning, bucket policy and
//! lifecycle configuration.

use crate::{
    clients::ObjectApi,
    errors::{RemoteError, RemoteResult},
    models::{
        bucket::VersioningStatus,
        lifecycle::{
            Expiration, LifecycleConfiguration, LifecycleFilter, LifecycleRule,
            NoncurrentVersionExpiration, RuleStatus,
        },
    },
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, http::HttpResponse},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{
        BucketLifecycleConfiguration, BucketLocationConstraint, BucketVersioningStatus,
        CreateBucketConfiguration, ExpirationStatus, LifecycleExpiration, LifecycleRuleFilter,
        VersioningConfiguration,
    },
};
use tracing::debug;

const NO_SUCH_BUCKET_POLICY: &str = "NoSuchBucketPolicy";
const NO_SUCH_LIFECYCLE_CONFIGURATION: &str = "NoSuchLifecycleConfiguration";

#[derive(Clone, Debug)]
pub struct S3ObjectClient {
    client: Client,
    region: String,
}

impl S3ObjectClient {
    /// Path-style client with static credentials; `zone` doubles as region.
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, zone: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "rgw-provider");

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(zone.to_string()))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            region: zone.to_string(),
        }
    }
}

/// Map an SDK failure; `not_found_code` is the service code that means
/// "no such document" for this call, if any.
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, not_found_code: Option<&str>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let code = err.code().map(str::to_string);
    if let Some(code) = code.as_deref().filter(|c| Some(*c) == not_found_code) {
        return RemoteError::NotFound {
            code: code.to_string(),
        };
    }

    match (err, code) {
        (SdkError::ServiceError(service), Some(code)) => RemoteError::Api {
            status: service.raw().status().as_u16(),
            code,
            message: service.err().message().unwrap_or_default().to_string(),
        },
        (err, _) => RemoteError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

fn to_sdk_rule(rule: &LifecycleRule) -> RemoteResult<aws_sdk_s3::types::LifecycleRule> {
    let mut filter = LifecycleRuleFilter::builder();
    if let Some(prefix) = &rule.filter.prefix {
        filter = filter.prefix(prefix);
    }

    let mut builder = aws_sdk_s3::types::LifecycleRule::builder()
        .set_id(rule.id.clone())
        .status(ExpirationStatus::from(rule.status.as_str()))
        .filter(filter.build());

    if let Some(days) = rule.expiration.as_ref().and_then(|e| e.days) {
        builder = builder.expiration(LifecycleExpiration::builder().days(days).build());
    }

    if let Some(days) = rule
        .noncurrent_version_expiration
        .as_ref()
        .and_then(|e| e.noncurrent_days)
    {
        builder = builder.noncurrent_version_expiration(
            aws_sdk_s3::types::NoncurrentVersionExpiration::builder()
                .noncurrent_days(days)
                .build(),
        );
    }

    builder
        .build()
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

fn from_sdk_rule(rule: &aws_sdk_s3::types::LifecycleRule) -> LifecycleRule {
    let status = if rule.status() == &ExpirationStatus::Enabled {
        RuleStatus::Enabled
    } else {
        RuleStatus::Disabled
    };

    LifecycleRule {
        id: rule.id().map(str::to_string),
        status,
        filter: LifecycleFilter {
            prefix: rule
                .filter()
                .and_then(|f| f.prefix())
                .map(str::to_string),
        },
        expiration: rule.expiration().map(|e| Expiration { days: e.days() }),
        noncurrent_version_expiration: rule
            .noncurrent_version_expiration()
            .map(|e| NoncurrentVersionExpiration {
                noncurrent_days: e.noncurrent_days(),
            }),
    }
}

#[async_trait]
impl ObjectApi for S3ObjectClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create_bucket(&self, name: &str, location_constraint: Option<&str>) -> RemoteResult<()> {
        let mut request = self.client.create_bucket().bucket(name);
        if let Some(location) = location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(location))
                    .build(),
            );
        }

        debug!(bucket = name, location = ?location_constraint, "creating bucket");
        request
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, None))
    }

    async fn put_bucket_versioning(&self, name: &str, status: VersioningStatus) -> RemoteResult<()> {
        self.client
            .put_bucket_versioning()
            .bucket(name)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::from(status.as_str()))
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, None))
    }

    async fn get_bucket_versioning(&self, name: &str) -> RemoteResult<Option<VersioningStatus>> {
        let response = self
            .client
            .get_bucket_versioning()
            .bucket(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, None))?;

        Ok(response.status().map(|status| match status {
            BucketVersioningStatus::Enabled => VersioningStatus::Enabled,
            _ => VersioningStatus::Suspended,
        }))
    }

    async fn put_bucket_policy(&self, name: &str, policy: &str) -> RemoteResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(name)
            .policy(policy)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, None))
    }

    async fn get_bucket_policy(&self, name: &str) -> RemoteResult<String> {
        let response = self
            .client
            .get_bucket_policy()
            .bucket(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(NO_SUCH_BUCKET_POLICY)))?;

        response
            .policy()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::NotFound {
                code: NO_SUCH_BUCKET_POLICY.into(),
            })
    }

    async fn delete_bucket_policy(&self, name: &str) -> RemoteResult<()> {
        self.client
            .delete_bucket_policy()
            .bucket(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, None))
    }

    async fn put_bucket_lifecycle(
        &self,
        name: &str,
        configuration: &LifecycleConfiguration,
    ) -> RemoteResult<()> {
        let rules = configuration
            .rules
            .iter()
            .map(to_sdk_rule)
            .collect::<RemoteResult<Vec<_>>>()?;

        let lifecycle = BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(name)
            .lifecycle_configuration(lifecycle)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, None))
    }

    async fn get_bucket_lifecycle(&self, name: &str) -> RemoteResult<LifecycleConfiguration> {
        let response = self
            .client
            .get_bucket_lifecycle_configuration()
            .bucket(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(NO_SUCH_LIFECYCLE_CONFIGURATION)))?;

        Ok(LifecycleConfiguration {
            rules: response.rules().iter().map(from_sdk_rule).collect(),
        })
    }

    async fn delete_bucket_lifecycle(&self, name: &str) -> RemoteResult<()> {
        self.client
            .delete_bucket_lifecycle()
            .bucket(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, None))
    }
}
