//! RGW admin-ops client over HTTP.
//!
//! Every call hits `/admin/bucket` or `/admin/user` with `format=json` and a
//! SigV2 `Authorization` header. Error bodies look like
//! `{"Code": "NoSuchUser", ...}`; the codes listed in [`NOT_FOUND_CODES`]
//! become [`RemoteError::NotFound`]. A 404 without one of those codes is an
//! ordinary API error, since it may come from a misrouted endpoint.

use crate::{
    clients::{AdminApi, signing::{SigV2Signer, http_date}},
    errors::{RemoteError, RemoteResult},
    models::admin::{BucketInfo, UserInfo, UserSpec},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Method, StatusCode,
    header::{AUTHORIZATION, DATE},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

const BUCKET_PATH: &str = "/admin/bucket";
const USER_PATH: &str = "/admin/user";
const KEY_PATH: &str = "/admin/user?key";

pub const NOT_FOUND_CODES: [&str; 3] = ["NoSuchBucket", "NoSuchUser", "NoSuchKey"];

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Clone, Debug)]
pub struct RgwAdminClient {
    http: reqwest::Client,
    endpoint: String,
    signer: SigV2Signer,
}

impl RgwAdminClient {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            signer: SigV2Signer::new(access_key, secret_key),
        })
    }

    /// Send a signed request and return the raw body of a 2xx response.
    async fn send(&self, method: Method, path: &str, query: &[(&str, String)]) -> RemoteResult<String> {
        let resource = path.split('?').next().unwrap_or(path);
        let date = http_date(Utc::now());
        let authorization = self.signer.authorization(method.as_str(), &date, resource);

        debug!(method = %method, path = resource, "admin request");

        let response = self
            .http
            .request(method, format!("{}{}", self.endpoint, path))
            .query(query)
            .query(&[("format", "json")])
            .header(DATE, date)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(error_from_response(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        let body = self.send(method, path, query).await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

pub(crate) fn error_from_response(status: StatusCode, body: &str) -> RemoteError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) if NOT_FOUND_CODES.contains(&error.code.as_str()) => {
            RemoteError::NotFound { code: error.code }
        }
        Ok(error) => RemoteError::Api {
            status: status.as_u16(),
            code: error.code,
            message: error.message,
        },
        Err(_) => RemoteError::Api {
            status: status.as_u16(),
            code: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: body.to_string(),
        },
    }
}

fn user_query(spec: &UserSpec) -> Vec<(&'static str, String)> {
    let mut query = vec![("uid", spec.id.clone())];
    if let Some(name) = &spec.display_name {
        query.push(("display-name", name.clone()));
    }
    if let Some(max_buckets) = spec.max_buckets {
        query.push(("max-buckets", max_buckets.to_string()));
    }
    query.push(("generate-key", spec.generate_key.to_string()));
    if let Some(key) = spec.keys.first() {
        query.push(("access-key", key.access_key.clone()));
        query.push(("secret-key", key.secret_key.clone()));
    }
    query
}

#[async_trait]
impl AdminApi for RgwAdminClient {
    async fn get_bucket_info(&self, name: &str) -> RemoteResult<BucketInfo> {
        self.send_json(Method::GET, BUCKET_PATH, &[("bucket", name.to_string())])
            .await
    }

    async fn list_buckets(&self) -> RemoteResult<Vec<String>> {
        self.send_json(Method::GET, BUCKET_PATH, &[]).await
    }

    async fn remove_bucket(&self, name: &str) -> RemoteResult<()> {
        self.send(Method::DELETE, BUCKET_PATH, &[("bucket", name.to_string())])
            .await
            .map(|_| ())
    }

    async fn get_user(&self, id: &str) -> RemoteResult<UserInfo> {
        self.send_json(Method::GET, USER_PATH, &[("uid", id.to_string())])
            .await
    }

    async fn create_user(&self, spec: &UserSpec) -> RemoteResult<UserInfo> {
        self.send_json(Method::PUT, USER_PATH, &user_query(spec)).await
    }

    async fn modify_user(&self, spec: &UserSpec) -> RemoteResult<UserInfo> {
        self.send_json(Method::POST, USER_PATH, &user_query(spec)).await
    }

    async fn remove_key(&self, user_id: &str, access_key: &str) -> RemoteResult<()> {
        self.send(
            Method::DELETE,
            KEY_PATH,
            &[
                ("uid", user_id.to_string()),
                ("access-key", access_key.to_string()),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn remove_user(&self, id: &str) -> RemoteResult<()> {
        self.send(Method::DELETE, USER_PATH, &[("uid", id.to_string())])
            .await
            .map(|_| ())
    }
}
