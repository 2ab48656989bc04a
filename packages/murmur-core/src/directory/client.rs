//! HTTP client for the key directory.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{
    error_types, prepare_batch, ApiErrorResponse, ApiResponse, BatchRequest, BatchResponse,
    KeyDirectory, PublicKeyEntry, PublicKeyRecord, PublishRequest, MAX_BATCH_SIZE,
};
use crate::config::DirectoryClientConfig;
use crate::crypto::PublicKey;
use crate::error::{Error, Result};

/// Key directory reached over HTTP
#[derive(Clone)]
pub struct HttpKeyDirectory {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpKeyDirectory {
    /// Build a client from configuration
    pub fn new(config: &DirectoryClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        Ok(self.authorize(request).send().await?)
    }
}

#[async_trait]
impl KeyDirectory for HttpKeyDirectory {
    async fn publish(&self, public_key: &PublicKey) -> Result<()> {
        let body = PublishRequest {
            public_key: public_key.to_encoded(),
        };
        let response = self
            .send(self.client.put(self.url("/api/encryption/public-key")).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, None, None).await);
        }

        tracing::info!(fingerprint = %public_key.fingerprint(), "Published public key");
        Ok(())
    }

    async fn fetch_one(&self, user_id: &str) -> Result<PublicKeyRecord> {
        let path = format!(
            "/api/encryption/public-key/{}",
            urlencoding::encode(user_id)
        );
        let response = self.send(self.client.get(self.url(&path))).await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, Some(user_id), None).await);
        }

        let entry: PublicKeyEntry = parse_data(response).await?;
        if entry.user_id != user_id {
            return Err(Error::ProtocolError(format!(
                "Asked for user {} but the directory answered for {}",
                user_id, entry.user_id
            )));
        }
        let record = PublicKeyRecord::try_from(entry)?;
        tracing::debug!(
            user_id,
            fingerprint = %record.public_key.fingerprint(),
            "Fetched public key"
        );
        Ok(record)
    }

    async fn fetch_batch(&self, user_ids: &[String]) -> Result<HashMap<String, PublicKeyRecord>> {
        let unique = prepare_batch(user_ids)?;
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let requested = unique.len();
        let body = BatchRequest { user_ids: unique };
        let response = self
            .send(self.client.post(self.url("/api/encryption/public-keys")).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, None, Some(requested)).await);
        }

        let batch: BatchResponse = parse_data(response).await?;
        let mut records = HashMap::with_capacity(batch.public_keys.len());
        for entry in batch.public_keys {
            let user_id = entry.user_id.clone();
            match PublicKeyRecord::try_from(entry) {
                Ok(record) => {
                    records.insert(user_id, record);
                }
                // Omitted like a keyless user.
                Err(e) => tracing::warn!(
                    user_id = user_id.as_str(),
                    error = %e,
                    "Skipping undecodable public key in batch"
                ),
            }
        }

        tracing::debug!(requested, found = records.len(), "Fetched public key batch");
        Ok(records)
    }
}

async fn parse_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body: ApiResponse<T> = response.json().await?;
    Ok(body.data)
}

async fn error_from_response(
    response: Response,
    user_id: Option<&str>,
    requested: Option<usize>,
) -> Error {
    let status = response.status();
    let detail = response.json::<ApiErrorResponse>().await.ok().map(|b| b.error);
    let error_type = detail.as_ref().map(|d| d.error_type.as_str());
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .unwrap_or_else(|| status.to_string());

    tracing::warn!(%status, error_type = ?error_type, "Directory request failed");

    let subject = || user_id.unwrap_or_default().to_string();
    match error_type {
        Some(error_types::USER_NOT_FOUND) => Error::UserNotFound(subject()),
        Some(error_types::NO_PUBLIC_KEY) => Error::NoPublicKeySet(subject()),
        Some(error_types::INVALID_PUBLIC_KEY) => Error::InvalidKeyFormat(message),
        Some(error_types::TOO_MANY_USERS) => Error::TooManyUsers {
            requested: requested.unwrap_or_default(),
            max: MAX_BATCH_SIZE,
        },
        _ if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            Error::NetworkError(format!("{}: {}", status, message))
        }
        _ => Error::ProtocolError(format!("{}: {}", status, message)),
    }
}
