//! AWS signature version 2 for admin-ops requests.
//!
//! ```text
//! Authorization: AWS <AccessKeyId>:Base64(HMAC-SHA1(SecretKey, StringToSign))
//!
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedResource
//! ```
//!
//! Admin requests carry no body and no `x-amz-*` headers, so the MD5, type
//! and amz-header parts are always empty. The canonical resource is the path
//! alone: none of the admin query parameters are signed sub-resources.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub struct SigV2Signer {
    access_key: String,
    secret_key: String,
}

impl fmt::Debug for SigV2Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV2Signer")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl SigV2Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Value for the `Authorization` header of a bodiless request.
    pub fn authorization(&self, method: &str, date: &str, path: &str) -> String {
        let string_to_sign = format!("{method}\n\n\n{date}\n{path}");
        format!(
            "AWS {}:{}",
            self.access_key,
            sign(&self.secret_key, &string_to_sign)
        )
    }
}

/// RFC 1123 date as expected in the `Date` header.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn sign(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC can accept any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
