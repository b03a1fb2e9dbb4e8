//! Object-store upload of the upload-ready folder.
//!
//! Talks to S3 (or an S3-compatible endpoint) directly over the REST API
//! with AWS Signature V4 authentication. Credentials come from the standard
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` environment variables
//! (`AWS_SESSION_TOKEN` optional).
//!
//! The sync walks the upload folder recursively and PUTs every file under a
//! POSIX-style key of `{folder name}/{relative path}`. No retry, no
//! integrity check; overwrite semantics are the bucket's.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::infrastructure::config::S3Config;

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// S3 client for the bucket upload sink.
pub struct ObjectStoreClient {
    config: S3Config,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl ObjectStoreClient {
    /// Build a client for the configured bucket, reading credentials from
    /// the environment.
    pub fn from_env(config: S3Config) -> Result<Self> {
        Ok(Self {
            config,
            creds: AwsCredentials::from_env()?,
            client: reqwest::Client::new(),
        })
    }

    /// Upload a single object with a SigV4-signed PUT.
    pub async fn put_object(&self, key: &str, body: &[u8]) -> Result<()> {
        let RequestTarget {
            url,
            host,
            canonical_uri,
        } = request_target(&self.config, key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = hex_sha256(body);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "PUT\n{}\n\n{}\n{}\n{}",
            canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut request = self
            .client
            .put(&url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date)
            .body(body.to_vec());

        if let Some(ref token) = self.creds.session_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.send().await.with_context(|| {
            format!("Failed to put s3://{}/{}", self.config.bucket, key)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!(
                "S3 PutObject failed (HTTP {}) for key '{}': {}",
                status,
                key,
                body.chars().take(500).collect::<String>()
            );
        }

        debug!("Uploaded s3://{}/{}", self.config.bucket, key);
        Ok(())
    }

    /// Walk `folder` recursively and upload every file, keyed by its
    /// relative path under the folder's name. Returns the upload count.
    pub async fn upload_folder(&self, folder: &Path) -> Result<usize> {
        let mut uploaded = 0;
        for entry in WalkDir::new(folder) {
            let entry = entry.context("Failed to walk upload folder")?;
            if !entry.file_type().is_file() {
                continue;
            }

            let key = object_key_for(folder, entry.path())
                .with_context(|| format!("Unkeyable path: {}", entry.path().display()))?;
            let body = tokio::fs::read(entry.path()).await.with_context(|| {
                format!("Failed to read upload file: {}", entry.path().display())
            })?;
            self.put_object(&key, &body).await?;
            uploaded += 1;
        }

        info!(
            "Uploaded {} file(s) to bucket '{}'",
            uploaded, self.config.bucket
        );
        Ok(uploaded)
    }
}

/// Build the POSIX-style object key for a file inside the upload folder:
/// `{folder name}/{relative path with '/' separators}`.
fn object_key_for(folder: &Path, file: &Path) -> Option<String> {
    let folder_name = folder.file_name()?.to_str()?;
    let relative = file.strip_prefix(folder).ok()?;
    let mut parts = vec![folder_name.to_string()];
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("/"))
}

/// Where a signed request goes: the full URL, the `host` header value, and
/// the canonical URI the signature covers.
struct RequestTarget {
    url: String,
    host: String,
    canonical_uri: String,
}

/// Compute the request target for an object key.
///
/// Without a custom endpoint this is the standard virtual-hosted address
/// (`https://{bucket}.s3.{region}.amazonaws.com/{key}`). A custom endpoint
/// (MinIO, LocalStack) switches to path-style addressing, keeping the
/// endpoint's scheme and putting the bucket on the path:
/// `{scheme}://{endpoint}/{bucket}/{key}`.
fn request_target(config: &S3Config, key: &str) -> RequestTarget {
    let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");

    match config.endpoint_url {
        Some(ref endpoint) => {
            let scheme = if endpoint.starts_with("http://") {
                "http"
            } else {
                "https"
            };
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string();
            let canonical_uri = format!("/{}/{}", uri_encode(&config.bucket), encoded_key);
            RequestTarget {
                url: format!("{scheme}://{host}{canonical_uri}"),
                host,
                canonical_uri,
            }
        }
        None => {
            let host = format!("{}.s3.{}.amazonaws.com", config.bucket, config.region);
            let canonical_uri = format!("/{encoded_key}");
            RequestTarget {
                url: format!("https://{host}{canonical_uri}"),
                host,
                canonical_uri,
            }
        }
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key:
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode per RFC 3986, leaving only unreserved characters.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
