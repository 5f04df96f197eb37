//! HTTP implementation of [`PurgeClient`] for a CCU-v3 style purge API.
//!
//! `POST {base}/ccu/v3/{action}/url/{network}` with `{"objects": [...]}`; the
//! API acknowledges an accepted purge with HTTP 201 and a JSON body whose
//! `httpStatus` is also 201.


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::PurgeAction;
use crate::PurgeClient;
use crate::PurgeNetwork;
use crate::UpstreamConfig;
use crate::UpstreamError;
use crate::UpstreamTarget;

#[derive(Debug, Serialize)]
pub(crate) struct PurgeRequestBody<'a> {
    pub objects: &'a [String],
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PurgeResponseBody {
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub purge_id: Option<String>,
    #[serde(default)]
    pub estimated_seconds: Option<u64>,
    #[serde(default)]
    pub detail: Option<String>,
}

pub struct HttpPurgeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpPurgeClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        action: PurgeAction,
        network: PurgeNetwork,
    ) -> Self {
        Self {
            http,
            endpoint: purge_endpoint(base_url, action, network),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub(crate) fn purge_endpoint(
    base_url: &str,
    action: PurgeAction,
    network: PurgeNetwork,
) -> String {
    format!(
        "{}/ccu/v3/{}/url/{}",
        base_url.trim_end_matches('/'),
        action.as_str(),
        network.as_str()
    )
}

#[async_trait]
impl PurgeClient for HttpPurgeClient {
    async fn submit(
        &self,
        urls: &[String],
    ) -> std::result::Result<(), UpstreamError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&PurgeRequestBody { objects: urls })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: PurgeResponseBody = serde_json::from_str(&text).unwrap_or_default();

        if status != StatusCode::CREATED {
            return Err(UpstreamError::UnexpectedStatus {
                status: status.as_u16(),
                detail: body.detail.unwrap_or(text),
            });
        }

        if let Some(reported) = body.http_status {
            if reported != StatusCode::CREATED.as_u16() {
                return Err(UpstreamError::UnexpectedStatus {
                    status: reported,
                    detail: body.detail.unwrap_or_default(),
                });
            }
        }

        debug!(
            "[upstream] purge accepted by {}: purge_id={:?} estimated_seconds={:?}",
            self.endpoint, body.purge_id, body.estimated_seconds
        );
        Ok(())
    }
}

/// Builds one [`UpstreamTarget`] per configured base URL, sharing a single
/// connection pool. Per-request timeouts are enforced by the submitter.
pub fn http_targets(
    config: &UpstreamConfig,
    connect_timeout: Duration,
) -> std::result::Result<Vec<UpstreamTarget>, UpstreamError> {
    let http = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;

    Ok(config
        .targets
        .iter()
        .map(|base| {
            let client = HttpPurgeClient::new(http.clone(), base, config.action, config.network);
            UpstreamTarget::new(base.clone(), Arc::new(client))
        })
        .collect())
}
