use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{single_status, RequestStore};
use crate::errors::StoreError;
use crate::models::{AccessCode, AccessRequest, RequestStatus};

const TABLE_PATH: &str = "/rest/v1/access_requests";

/// `access_requests` over a PostgREST API (Supabase and friends).
#[derive(Clone)]
pub struct RestRequestStore {
    client: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl RestRequestStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            table_url: format!("{}{}", base_url.trim_end_matches('/'), TABLE_PATH),
            api_key: api_key.into(),
        })
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[derive(Deserialize)]
struct StatusRow {
    status: String,
}

async fn reject_unless_success(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RequestStore for RestRequestStore {
    async fn insert(&self, request: &AccessRequest) -> Result<(), StoreError> {
        let resp = self
            .authed(self.client.post(&self.table_url))
            .header("Prefer", "return=minimal")
            .json(&[request])
            .send()
            .await?;

        reject_unless_success(resp).await?;
        Ok(())
    }

    async fn fetch_status(&self, code: &AccessCode) -> Result<Option<RequestStatus>, StoreError> {
        let resp = self
            .authed(self.client.get(&self.table_url))
            .query(&[("code", format!("eq.{}", code)), ("select", "status".to_string())])
            .send()
            .await?;

        let body = reject_unless_success(resp).await?.text().await?;
        let rows: Vec<StatusRow> = serde_json::from_str(&body)?;

        single_status(
            code,
            rows.into_iter().map(|r| RequestStatus::from(r.status)).collect(),
        )
    }
}
