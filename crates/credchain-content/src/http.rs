//! HTTP implementation of the ContentStore trait.
//!
//! Balance and price come from an Arweave-style gateway
//! (`GET /wallet/{address}/balance`, `GET /price/{size}`, both answering a
//! plain decimal amount). Uploads go to a bundler endpoint that signs and
//! posts the data on the wallet's behalf.

use std::time::Duration;

use async_trait::async_trait;
use credchain_core::ContentLocator;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{ContentError, Result};
use crate::traits::{ContentStore, CostEstimate, Tag};

/// Configuration for [`HttpContentStore`].
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Gateway used for balance and price queries.
    pub gateway_url: String,
    /// Bundler endpoint accepting uploads.
    pub upload_url: String,
    /// Address of the wallet paying for uploads.
    pub wallet_address: String,
    /// Bearer token for the bundler, if it requires one.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            gateway_url: "https://arweave.net".into(),
            upload_url: "http://127.0.0.1:7700/upload".into(),
            wallet_address: String::new(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for ContentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentConfig")
            .field("gateway_url", &self.gateway_url)
            .field("upload_url", &self.upload_url)
            .field("wallet_address", &self.wallet_address)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    data: String,
    tags: &'a [Tag],
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Content store client over HTTP.
pub struct HttpContentStore {
    client: reqwest::Client,
    config: ContentConfig,
}

impl HttpContentStore {
    /// Build a client with the configured timeout.
    pub fn new(config: ContentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    fn gateway(&self, path: &str) -> String {
        format!("{}{}", self.config.gateway_url.trim_end_matches('/'), path)
    }

    /// GET an endpoint answering a bare decimal amount.
    async fn get_amount(&self, url: &str) -> Result<u128> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ContentError::Transport(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let body = resp.text().await?;
        body.trim().parse::<u128>().map_err(|e| {
            ContentError::Transport(format!("malformed amount {:?} from {}: {}", body, url, e))
        })
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn precheck_cost(&self, size: usize) -> Result<CostEstimate> {
        let balance = self
            .get_amount(&self.gateway(&format!(
                "/wallet/{}/balance",
                self.config.wallet_address
            )))
            .await?;
        let estimated_cost = self
            .get_amount(&self.gateway(&format!("/price/{}", size)))
            .await?;

        tracing::debug!(size, balance, estimated_cost, "content store cost precheck");

        Ok(CostEstimate {
            balance,
            estimated_cost,
        })
    }

    async fn upload(&self, data: &[u8], tags: &[Tag]) -> Result<ContentLocator> {
        let body = UploadRequest {
            data: base64::encode(data),
            tags,
        };

        let mut req = self.client.post(&self.config.upload_url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::PAYMENT_REQUIRED {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ContentError::InsufficientFunds(detail));
        }
        if status.is_client_error() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ContentError::UploadRejected(format!("{}: {}", status, detail)));
        }
        if !status.is_success() {
            return Err(ContentError::Transport(format!(
                "upload returned {}",
                status
            )));
        }

        let UploadResponse { id } = resp.json().await?;
        let locator = id
            .and_then(|id| ContentLocator::new(id).ok())
            .ok_or_else(|| ContentError::UploadRejected("store returned no locator".into()))?;

        tracing::info!(%locator, size = data.len(), "document uploaded");
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};

    fn store_for(wallet: &str) -> HttpContentStore {
        HttpContentStore::new(ContentConfig {
            gateway_url: mockito::server_url(),
            upload_url: format!("{}/upload/{}", mockito::server_url(), wallet),
            wallet_address: wallet.into(),
            api_key: Some("secret".into()),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_precheck_reads_balance_and_price() {
        let _balance = mock("GET", "/wallet/precheck-ok/balance")
            .with_body("5000\n")
            .create();
        let _price = mock("GET", "/price/1234").with_body("1200").create();

        let estimate = store_for("precheck-ok").precheck_cost(1234).await.unwrap();
        assert_eq!(estimate.balance, 5000);
        assert_eq!(estimate.estimated_cost, 1200);
        assert!(estimate.is_sufficient());
    }

    #[tokio::test]
    async fn test_precheck_failure_is_transport() {
        let _balance = mock("GET", "/wallet/precheck-down/balance")
            .with_status(503)
            .create();

        let err = store_for("precheck-down").precheck_cost(10).await.unwrap_err();
        assert!(matches!(err, ContentError::Transport(_)));
    }

    #[tokio::test]
    async fn test_precheck_malformed_amount_is_transport() {
        let _balance = mock("GET", "/wallet/precheck-bad/balance")
            .with_body("lots")
            .create();

        let err = store_for("precheck-bad").precheck_cost(10).await.unwrap_err();
        assert!(matches!(err, ContentError::Transport(_)));
    }

    #[tokio::test]
    async fn test_upload_returns_locator() {
        let m = mock("POST", "/upload/upload-ok")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "data": base64::encode(b"%PDF-1.7"),
                "tags": [{"name": "App-Name", "value": "DiplomaVerification"}],
            })))
            .with_status(200)
            .with_body(r#"{"id":"cs-loc-1"}"#)
            .create();

        let locator = store_for("upload-ok")
            .upload(b"%PDF-1.7", &[Tag::new("App-Name", "DiplomaVerification")])
            .await
            .unwrap();

        assert_eq!(locator.as_str(), "cs-loc-1");
        m.assert();
    }

    #[tokio::test]
    async fn test_upload_status_mapping() {
        let _payment = mock("POST", "/upload/upload-402").with_status(402).create();
        let _rejected = mock("POST", "/upload/upload-400")
            .with_status(400)
            .with_body("bad tags")
            .create();
        let _down = mock("POST", "/upload/upload-500").with_status(500).create();

        assert!(matches!(
            store_for("upload-402").upload(b"x", &[]).await,
            Err(ContentError::InsufficientFunds(_))
        ));
        assert!(matches!(
            store_for("upload-400").upload(b"x", &[]).await,
            Err(ContentError::UploadRejected(_))
        ));
        assert!(matches!(
            store_for("upload-500").upload(b"x", &[]).await,
            Err(ContentError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_locator_is_rejected() {
        let _m = mock("POST", "/upload/upload-empty")
            .with_body(r#"{"id":"  "}"#)
            .create();

        assert!(matches!(
            store_for("upload-empty").upload(b"x", &[]).await,
            Err(ContentError::UploadRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_locator_is_rejected() {
        let _m = mock("POST", "/upload/upload-no-id")
            .with_body(r#"{"status":"ok"}"#)
            .create();
        let _n = mock("POST", "/upload/upload-null-id")
            .with_body(r#"{"id":null}"#)
            .create();

        assert!(matches!(
            store_for("upload-no-id").upload(b"x", &[]).await,
            Err(ContentError::UploadRejected(_))
        ));
        assert!(matches!(
            store_for("upload-null-id").upload(b"x", &[]).await,
            Err(ContentError::UploadRejected(_))
        ));
    }
}
