//! Backblaze B2 object storage over its native HTTP API.
//!
//! Publishing: authorize → get upload url → upload (one upload url per file,
//! so concurrent uploads never share one).
//! Playback: authorize → get download authorization → ranged GET.
//!
//! Both the account authorization and the download authorization are held in
//! TTL caches. Concurrent misses on the same key coalesce into one refresh;
//! a 401 from B2 evicts the cached token so the next call re-authorizes.

mod api;

use crate::ports::storage::{StorageError, StoragePort, StoredObject};
use api::{
    encode_file_name, ApiError, AuthorizeAccountResponse, GetDownloadAuthorizationRequest,
    GetDownloadAuthorizationResponse, GetUploadUrlRequest, GetUploadUrlResponse,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use moka::future::Cache;
use reqwest::{header, Client, Response, StatusCode};
use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.backblazeb2.com";
/// Account tokens are valid for 24 hours.
const ACCOUNT_TTL: Duration = Duration::from_secs(23 * 60 * 60);
/// Refresh download tokens this long before B2 would reject them.
const DOWNLOAD_MARGIN_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct B2Config {
    pub key_id: String,
    pub application_key: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub api_url: String,
    pub download_auth_secs: u64,
}

#[derive(Debug, Clone)]
struct AccountAuth {
    token: String,
    api_url: String,
    download_url: String,
}

#[derive(Clone)]
pub struct B2Storage {
    http: Client,
    config: Arc<B2Config>,
    accounts: Cache<String, Arc<AccountAuth>>,
    downloads: Cache<String, Arc<String>>,
}

impl B2Storage {
    pub fn new(config: B2Config) -> Self {
        let download_ttl = config.download_auth_secs.saturating_sub(DOWNLOAD_MARGIN_SECS).max(1);
        Self {
            http: Client::new(),
            accounts: Cache::builder().time_to_live(ACCOUNT_TTL).max_capacity(4).build(),
            downloads: Cache::builder()
                .time_to_live(Duration::from_secs(download_ttl))
                .max_capacity(1_000)
                .build(),
            config: Arc::new(config),
        }
    }

    #[tracing::instrument(name = "b2_authorize_account", skip(self))]
    async fn authorize(&self) -> Result<AccountAuth, StorageError> {
        let url = format!("{}/b2api/v2/b2_authorize_account", self.config.api_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.application_key))
            .send()
            .await?;
        let body: AuthorizeAccountResponse = decode(response).await?;
        tracing::info!(account_id = %body.account_id, "authorized against object storage");
        Ok(AccountAuth {
            token: body.authorization_token,
            api_url: body.api_url,
            download_url: body.download_url,
        })
    }

    async fn account(&self) -> Result<Arc<AccountAuth>, StorageError> {
        self.accounts
            .try_get_with(self.config.key_id.clone(), async { self.authorize().await.map(Arc::new) })
            .await
            .map_err(|e| StorageError::Unauthorized(e.to_string()))
    }

    async fn forget_account(&self) {
        self.accounts.invalidate(&self.config.key_id).await;
    }

    async fn upload_url(&self, account: &AccountAuth) -> Result<GetUploadUrlResponse, StorageError> {
        let response = self
            .http
            .post(format!("{}/b2api/v2/b2_get_upload_url", account.api_url))
            .header(header::AUTHORIZATION, &account.token)
            .json(&GetUploadUrlRequest {
                bucket_id: &self.config.bucket_id,
            })
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.forget_account().await;
        }
        decode(response).await
    }

    #[tracing::instrument(name = "b2_get_download_authorization", skip(self))]
    async fn authorize_download(&self, prefix: &str) -> Result<String, StorageError> {
        let account = self.account().await?;
        let response = self
            .http
            .post(format!("{}/b2api/v2/b2_get_download_authorization", account.api_url))
            .header(header::AUTHORIZATION, &account.token)
            .json(&GetDownloadAuthorizationRequest {
                bucket_id: &self.config.bucket_id,
                file_name_prefix: prefix,
                valid_duration_in_seconds: self.config.download_auth_secs,
            })
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.forget_account().await;
        }
        let body: GetDownloadAuthorizationResponse = decode(response).await?;
        Ok(body.authorization_token)
    }

    async fn download_token(&self, prefix: &str) -> Result<Arc<String>, StorageError> {
        self.downloads
            .try_get_with(prefix.to_string(), async { self.authorize_download(prefix).await.map(Arc::new) })
            .await
            .map_err(|e| StorageError::Unauthorized(e.to_string()))
    }
}

/// Download tokens are scoped to the top-level folder of the key.
fn download_prefix(key: &str) -> String {
    match key.split_once('/') {
        Some((folder, _)) => format!("{}/", folder),
        None => String::new(),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    let error = ApiError::from_body(&body);
    if status == StatusCode::UNAUTHORIZED {
        return Err(StorageError::Unauthorized(error.describe()));
    }
    Err(StorageError::Upstream {
        status: status.as_u16(),
        message: error.describe(),
    })
}

fn header_str(response: &Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl StoragePort for B2Storage {
    #[tracing::instrument(name = "b2_upload", skip(self, local_path))]
    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<(), StorageError> {
        let data = tokio::fs::read(local_path).await?;
        let sha1 = hex::encode(Sha1::digest(&data));

        let account = self.account().await?;
        let target = self.upload_url(&account).await?;

        let response = self
            .http
            .post(&target.upload_url)
            .header(header::AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", encode_file_name(key))
            .header(header::CONTENT_TYPE, content_type)
            .header("X-Bz-Content-Sha1", sha1)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ApiError::from_body(&body);
            if status == StatusCode::UNAUTHORIZED {
                self.forget_account().await;
                return Err(StorageError::Unauthorized(error.describe()));
            }
            return Err(StorageError::Upstream {
                status: status.as_u16(),
                message: error.describe(),
            });
        }
        tracing::debug!("uploaded {}", key);
        Ok(())
    }

    #[tracing::instrument(name = "b2_fetch", skip(self))]
    async fn fetch(&self, key: &str, range: Option<String>) -> Result<StoredObject, StorageError> {
        let account = self.account().await?;
        let prefix = download_prefix(key);
        let token = self.download_token(&prefix).await?;

        let url = format!(
            "{}/file/{}/{}",
            account.download_url.trim_end_matches('/'),
            self.config.bucket_name,
            encode_file_name(key)
        );
        let mut request = self.http.get(url).header(header::AUTHORIZATION, token.as_str());
        if let Some(range) = &range {
            request = request.header(header::RANGE, range);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(key.to_string())),
            StatusCode::RANGE_NOT_SATISFIABLE => return Err(StorageError::RangeNotSatisfiable(key.to_string())),
            StatusCode::UNAUTHORIZED => {
                self.downloads.invalidate(&prefix).await;
                let body = response.text().await.unwrap_or_default();
                return Err(StorageError::Unauthorized(ApiError::from_body(&body).describe()));
            }
            other => {
                let body = response.text().await.unwrap_or_default();
                return Err(StorageError::Upstream {
                    status: other.as_u16(),
                    message: ApiError::from_body(&body).describe(),
                });
            }
        }

        let accept_ranges = header_str(&response, header::ACCEPT_RANGES).is_some_and(|v| v == "bytes");
        Ok(StoredObject {
            status: response.status().as_u16(),
            content_type: header_str(&response, header::CONTENT_TYPE),
            content_length: response.content_length(),
            content_range: header_str(&response, header::CONTENT_RANGE),
            accept_ranges,
            body: Box::pin(response.bytes_stream().map_err(std::io::Error::other)),
        })
    }
}
